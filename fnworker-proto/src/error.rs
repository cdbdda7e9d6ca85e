//! Error taxonomy and its rendering into wire failures.

use crate::message::{FailureKind, RpcException};
use std::fmt;
use thiserror::Error;

/// Errors surfaced by user handlers.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler observed its cancellation signal and stopped.
    #[error("the invocation was cancelled")]
    Cancelled,

    /// The handler raised a named error.
    #[error("{message}")]
    Raised {
        /// Short error type name reported to the host.
        kind: String,
        /// Error message.
        message: String,
    },

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    /// Create a [`HandlerError::Raised`].
    pub fn raised(kind: impl Into<String>, message: impl Into<String>) -> Self {
        HandlerError::Raised {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Error type name reported in failure messages.
    pub fn type_name(&self) -> &str {
        match self {
            HandlerError::Cancelled => "OperationCanceled",
            HandlerError::Raised { kind, .. } => kind.as_str(),
            HandlerError::Other(_) => "HandlerException",
        }
    }
}

/// Every error the worker can report back to the host.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum WorkerError {
    /// A function with this id is already registered.
    #[error("function '{0}' is already registered")]
    DuplicateDefinition(String),

    /// The entry point did not resolve, or its signature does not match
    /// the declared bindings.
    #[error("invalid definition for '{function}': {reason}")]
    InvalidDefinition {
        /// Function id or name.
        function: String,
        /// What was wrong.
        reason: String,
    },

    /// No function is registered under this id.
    #[error("function not found: {0}")]
    NotFound(String),

    /// No converter could produce the value a binding expects.
    #[error("cannot convert binding '{binding}' to {target_type}: {reason}")]
    ConversionFailure {
        /// Binding name.
        binding: String,
        /// Target type the binding declared.
        target_type: String,
        /// Why conversion failed.
        reason: String,
    },

    /// An error escaped user code.
    #[error("{0}")]
    Handler(#[from] HandlerError),

    /// Context teardown failed.
    #[error("disposal failed: {0}")]
    DisposalFailure(String),

    /// Function metadata was malformed.
    #[error("{0}")]
    Format(String),

    /// A capability was requested from a feature store that has none.
    #[error("feature not found: {0}")]
    FeatureNotFound(String),
}

impl WorkerError {
    /// Failure classification sent to the host.
    pub fn kind(&self) -> FailureKind {
        match self {
            WorkerError::DuplicateDefinition(_) => FailureKind::DuplicateDefinition,
            WorkerError::InvalidDefinition { .. } => FailureKind::InvalidDefinition,
            WorkerError::NotFound(_) => FailureKind::NotFound,
            WorkerError::ConversionFailure { .. } => FailureKind::ConversionFailure,
            WorkerError::Handler(HandlerError::Cancelled) => FailureKind::Cancelled,
            WorkerError::Handler(_) => FailureKind::HandlerException,
            WorkerError::DisposalFailure(_) => FailureKind::DisposalFailure,
            WorkerError::Format(_) => FailureKind::Format,
            WorkerError::FeatureNotFound(_) => FailureKind::FeatureNotFound,
        }
    }

    /// Error type name reported in failure messages.
    pub fn type_name(&self) -> &str {
        match self {
            WorkerError::DuplicateDefinition(_) => "DuplicateDefinition",
            WorkerError::InvalidDefinition { .. } => "InvalidDefinition",
            WorkerError::NotFound(_) => "NotFound",
            WorkerError::ConversionFailure { .. } => "ConversionFailure",
            WorkerError::Handler(e) => e.type_name(),
            WorkerError::DisposalFailure(_) => "DisposalFailure",
            WorkerError::Format(_) => "FormatError",
            WorkerError::FeatureNotFound(_) => "FeatureNotFound",
        }
    }
}

/// The step of message handling an error came from.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Registering a function from a load request.
    LoadFunction,
    /// Looking up the function an invocation targets.
    ResolveFunction,
    /// Building the invocation context.
    CreateContext,
    /// Converting input bindings.
    ConvertInput,
    /// Running the user handler.
    InvokeFunction,
    /// Rendering outputs and the return value.
    CollectOutputs,
    /// Tearing down the invocation context.
    DisposeContext,
    /// Answering a metadata request.
    FunctionMetadata,
}

impl Phase {
    /// Name used in failure messages and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::LoadFunction => "LoadFunction",
            Phase::ResolveFunction => "ResolveFunction",
            Phase::CreateContext => "CreateContext",
            Phase::ConvertInput => "ConvertInput",
            Phase::InvokeFunction => "InvokeFunction",
            Phase::CollectOutputs => "CollectOutputs",
            Phase::DisposeContext => "DisposeContext",
            Phase::FunctionMetadata => "FunctionMetadata",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A [`WorkerError`] tagged with the phase it escaped from.
///
/// Displays as `"{phase}: {type}: {message}"`, which is exactly the
/// message the host receives.
#[derive(Debug, Error)]
#[error("{phase}: {}: {error}", .error.type_name())]
pub struct PhaseError {
    /// Where the error happened.
    pub phase: Phase,
    /// What happened.
    #[source]
    pub error: WorkerError,
}

impl PhaseError {
    /// Tag `error` with `phase`.
    pub fn new(phase: Phase, error: impl Into<WorkerError>) -> Self {
        Self {
            phase,
            error: error.into(),
        }
    }

    /// Closure form of [`PhaseError::new`] for `map_err`.
    pub fn at<E: Into<WorkerError>>(phase: Phase) -> impl FnOnce(E) -> Self {
        move |error| Self::new(phase, error)
    }

    /// Render as a wire exception. With `include_stack_trace`, the
    /// error's source chain becomes the stack trace text.
    pub fn to_exception(&self, include_stack_trace: bool) -> RpcException {
        let stack_trace = if include_stack_trace {
            let mut lines = vec![format!("at {}", self.phase)];
            let mut source = std::error::Error::source(&self.error);
            while let Some(cause) = source {
                lines.push(format!("caused by: {cause}"));
                source = cause.source();
            }
            lines.join("\n")
        } else {
            String::new()
        };

        RpcException {
            kind: self.error.kind(),
            source: self.phase.to_string(),
            message: self.to_string(),
            stack_trace,
        }
    }
}
