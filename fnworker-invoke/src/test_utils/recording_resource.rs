//! RecordingResource — records teardown calls.

use crate::context::{ScopedResource, TeardownError};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};

/// Shared log of teardown calls, in the order they happened.
#[derive(Debug, Clone, Default)]
pub struct DisposalLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl DisposalLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of the entries, e.g. `["async db", "sync db"]`.
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn push(&self, entry: String) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).push(entry);
    }
}

/// A scoped resource that records its teardown into a [`DisposalLog`].
#[derive(Debug)]
pub struct RecordingResource {
    name: String,
    log: DisposalLog,
    fail: bool,
}

impl RecordingResource {
    /// A resource that tears down cleanly.
    pub fn new(name: impl Into<String>, log: &DisposalLog) -> Self {
        Self {
            name: name.into(),
            log: log.clone(),
            fail: false,
        }
    }

    /// A resource whose asynchronous teardown fails.
    pub fn failing(name: impl Into<String>, log: &DisposalLog) -> Self {
        Self {
            fail: true,
            ..Self::new(name, log)
        }
    }
}

#[async_trait]
impl ScopedResource for RecordingResource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn dispose_async(&mut self) -> Result<(), TeardownError> {
        self.log.push(format!("async {}", self.name));
        if self.fail {
            return Err(format!("{} refused to close", self.name).into());
        }
        Ok(())
    }

    fn dispose(&mut self) -> Result<(), TeardownError> {
        self.log.push(format!("sync {}", self.name));
        Ok(())
    }
}
