//! Typed ID wrappers for function, invocation, and request identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Typed ID wrappers keep function ids and invocation ids from being
/// swapped at call sites. The host decides the format; the worker only
/// compares them for equality.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new typed ID from anything that converts to String.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the inner string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

typed_id!(FunctionId, "Host-assigned identifier of a loaded function.");
typed_id!(InvocationId, "Unique identifier for one invocation of a function.");
typed_id!(RequestId, "Correlation identifier carried on every streaming message.");
