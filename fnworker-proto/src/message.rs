//! Protocol messages exchanged with the host over the streaming channel.

use crate::binding::BindingDescriptor;
use crate::duration::DurationMs;
use crate::id::{FunctionId, InvocationId, RequestId};
use crate::value::{ParameterBinding, WireValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// The request failed; an [`RpcException`] describes why.
    Failure,
    /// The request succeeded.
    Success,
}

/// Classification of a failure, so the host can react without parsing
/// the message text.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    /// A function with the same id is already loaded.
    DuplicateDefinition,
    /// The entry point could not be resolved or does not fit the bindings.
    InvalidDefinition,
    /// No function is registered under the requested id.
    NotFound,
    /// An input binding could not be converted.
    ConversionFailure,
    /// The handler returned an error.
    HandlerException,
    /// The handler observed cancellation and gave up.
    Cancelled,
    /// Tearing down the invocation context failed.
    DisposalFailure,
    /// Function metadata was malformed.
    Format,
    /// A required per-invocation feature was unavailable.
    FeatureNotFound,
}

/// Structured error attached to a failed [`StatusResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcException {
    /// Failure classification.
    pub kind: FailureKind,
    /// Phase that produced the failure (`LoadFunction`, `InvokeFunction`, ...).
    pub source: String,
    /// `"{phase}: {type}: {message}"`.
    pub message: String,
    /// Rendered error source chain. Empty when stack traces are disabled.
    #[serde(default)]
    pub stack_trace: String,
}

/// Status plus optional failure detail, carried by every response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResult {
    /// Outcome.
    pub status: Status,
    /// Failure detail, present iff `status` is [`Status::Failure`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<RpcException>,
}

impl StatusResult {
    /// A successful result.
    pub fn success() -> Self {
        Self {
            status: Status::Success,
            exception: None,
        }
    }

    /// A failed result carrying `exception`.
    pub fn failure(exception: RpcException) -> Self {
        Self {
            status: Status::Failure,
            exception: Some(exception),
        }
    }

    /// Whether the status is [`Status::Success`].
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

/// First message from the host: capability and version handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkerInitRequest {
    /// Version of the host process.
    pub host_version: String,
    /// Capabilities the host advertises.
    pub capabilities: BTreeMap<String, String>,
    /// Directory the worker was started from.
    pub worker_directory: String,
}

/// Identification of this worker, for host-side diagnostics only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerMetadata {
    /// Language runtime name.
    pub runtime_name: String,
    /// Language runtime version.
    pub runtime_version: String,
    /// Worker package version.
    pub worker_version: String,
    /// Process architecture.
    pub worker_bitness: String,
    /// Free-form extra properties.
    #[serde(default)]
    pub custom_properties: BTreeMap<String, String>,
}

/// Reply to [`WorkerInitRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerInitResponse {
    /// Worker package version.
    pub worker_version: String,
    /// Capabilities this worker supports.
    pub capabilities: BTreeMap<String, String>,
    /// Identification details.
    pub worker_metadata: WorkerMetadata,
    /// Outcome.
    pub result: StatusResult,
}

/// Function metadata as carried by load requests and metadata responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcFunctionMetadata {
    /// Function id, when the worker assigns it during indexing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_id: Option<FunctionId>,
    /// Logical function name.
    pub name: String,
    /// Entry point reference, e.g. `"Orders.Api.Create"`.
    pub entry_point: String,
    /// Module or assembly the entry point lives in.
    #[serde(default)]
    pub script_file: String,
    /// Declared bindings, in declaration order.
    #[serde(default)]
    pub bindings: Vec<BindingDescriptor>,
    /// Whether the function is a host-side proxy.
    #[serde(default)]
    pub is_proxy: bool,
}

/// Asks the worker to register a function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionLoadRequest {
    /// Id the host will use in later invocations.
    pub function_id: FunctionId,
    /// What to load.
    pub metadata: RpcFunctionMetadata,
}

/// Reply to [`FunctionLoadRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionLoadResponse {
    /// Echo of the requested id.
    pub function_id: FunctionId,
    /// Outcome.
    pub result: StatusResult,
}

/// W3C trace correlation for an invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TraceContext {
    /// `traceparent` header value.
    pub trace_parent: String,
    /// `tracestate` header value.
    pub trace_state: String,
    /// Extra attributes the host wants echoed into logs.
    pub attributes: BTreeMap<String, String>,
}

/// Retry bookkeeping for triggers with host-side retry policies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryContext {
    /// Zero-based attempt number.
    pub retry_count: u32,
    /// Maximum number of retries the policy allows.
    pub max_retry_count: u32,
}

/// Asks the worker to run a loaded function once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationRequest {
    /// Unique id of this invocation.
    pub invocation_id: InvocationId,
    /// Function to run.
    pub function_id: FunctionId,
    /// Input values by binding name. Later duplicates win.
    #[serde(default)]
    pub input_data: Vec<ParameterBinding>,
    /// Trigger-specific metadata (e.g. queue dequeue count).
    #[serde(default)]
    pub trigger_metadata: BTreeMap<String, WireValue>,
    /// Trace correlation.
    #[serde(default)]
    pub trace_context: TraceContext,
    /// Retry bookkeeping, if the trigger has a retry policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_context: Option<RetryContext>,
    /// Time after which the invocation's cancellation signal fires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DurationMs>,
}

impl InvocationRequest {
    /// Create a request with no inputs.
    pub fn new(invocation_id: impl Into<InvocationId>, function_id: impl Into<FunctionId>) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            function_id: function_id.into(),
            input_data: Vec::new(),
            trigger_metadata: BTreeMap::new(),
            trace_context: TraceContext::default(),
            retry_context: None,
            deadline: None,
        }
    }

    /// Append an input value.
    pub fn with_input(mut self, name: impl Into<String>, data: impl Into<WireValue>) -> Self {
        self.input_data.push(ParameterBinding::new(name, data));
        self
    }

    /// Attach retry bookkeeping.
    pub fn with_retry(mut self, retry_count: u32, max_retry_count: u32) -> Self {
        self.retry_context = Some(RetryContext {
            retry_count,
            max_retry_count,
        });
        self
    }

    /// Attach a deadline.
    pub fn with_deadline(mut self, deadline: DurationMs) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Reply to [`InvocationRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResponse {
    /// Echo of the invocation id.
    pub invocation_id: InvocationId,
    /// Collected output bindings, in declaration order.
    #[serde(default)]
    pub output_data: Vec<ParameterBinding>,
    /// Rendered return value, if the function declares one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_value: Option<WireValue>,
    /// Outcome.
    pub result: StatusResult,
}

/// Host asks the worker to cancel an in-flight invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationCancel {
    /// Invocation to cancel.
    pub invocation_id: InvocationId,
    /// How long the host will wait for the reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grace_period: Option<DurationMs>,
}

/// Host asks the worker to shut down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerTerminate {
    /// How long in-flight invocations may keep running.
    pub grace_period: DurationMs,
}

/// Host asks the worker to describe its functions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FunctionsMetadataRequest {
    /// Root directory of the function app.
    pub function_app_directory: String,
}

/// Reply to [`FunctionsMetadataRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionMetadataResponse {
    /// Functions found.
    #[serde(default)]
    pub function_metadata_results: Vec<RpcFunctionMetadata>,
    /// Outcome.
    pub result: StatusResult,
    /// When true the host should index functions itself.
    #[serde(default)]
    pub use_default_metadata_indexing: bool,
}

/// The payload of a [`StreamingMessage`].
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "camelCase")]
pub enum Content {
    /// See [`WorkerInitRequest`].
    WorkerInitRequest(WorkerInitRequest),
    /// See [`WorkerInitResponse`].
    WorkerInitResponse(WorkerInitResponse),
    /// See [`FunctionsMetadataRequest`].
    FunctionsMetadataRequest(FunctionsMetadataRequest),
    /// See [`FunctionMetadataResponse`].
    FunctionMetadataResponse(FunctionMetadataResponse),
    /// See [`FunctionLoadRequest`].
    FunctionLoadRequest(FunctionLoadRequest),
    /// See [`FunctionLoadResponse`].
    FunctionLoadResponse(FunctionLoadResponse),
    /// See [`InvocationRequest`].
    InvocationRequest(InvocationRequest),
    /// See [`InvocationResponse`].
    InvocationResponse(InvocationResponse),
    /// See [`InvocationCancel`].
    InvocationCancel(InvocationCancel),
    /// See [`WorkerTerminate`].
    WorkerTerminate(WorkerTerminate),
}

/// Envelope for every message on the streaming channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingMessage {
    /// Correlates a response with its request.
    pub request_id: RequestId,
    /// The payload.
    pub content: Content,
}

impl StreamingMessage {
    /// Wrap a payload.
    pub fn new(request_id: impl Into<RequestId>, content: impl Into<Content>) -> Self {
        Self {
            request_id: request_id.into(),
            content: content.into(),
        }
    }
}

macro_rules! content_from {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Content {
                fn from(m: $variant) -> Self {
                    Content::$variant(m)
                }
            }
        )*
    };
}

content_from!(
    WorkerInitRequest,
    WorkerInitResponse,
    FunctionsMetadataRequest,
    FunctionMetadataResponse,
    FunctionLoadRequest,
    FunctionLoadResponse,
    InvocationRequest,
    InvocationResponse,
    InvocationCancel,
    WorkerTerminate,
);
