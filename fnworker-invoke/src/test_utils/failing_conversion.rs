//! FailingConversion — an input conversion feature that always errors.

use crate::convert::{ConversionContext, InputConversion};
use crate::value::BindingValue;
use fnworker_proto::{BindingDescriptor, HandlerError, WireValue, WorkerError};

/// Fails every conversion with a raised handler error of the given kind
/// and message.
#[derive(Debug, Clone)]
pub struct FailingConversion {
    kind: String,
    message: String,
}

impl FailingConversion {
    /// Fail with `kind` and `message`.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl InputConversion for FailingConversion {
    fn convert_input(
        &self,
        _raw: &WireValue,
        _binding: &BindingDescriptor,
        _ctx: &ConversionContext<'_>,
    ) -> Result<BindingValue, WorkerError> {
        Err(HandlerError::raised(self.kind.clone(), self.message.clone()).into())
    }
}
