//! # fnworker-proto — wire protocol for the fnworker execution engine
//!
//! This crate defines everything that crosses the boundary between the
//! host process and the worker: the streaming message envelope, the
//! typed values carried inside it, the binding descriptors that declare
//! a function's inputs and outputs, and the error taxonomy that turns
//! every failure into a well-formed reply.
//!
//! | Module | What it holds |
//! |--------|---------------|
//! | [`message`] | Load / invoke / init / cancel / terminate messages |
//! | [`value`] | [`WireValue`], [`RpcHttp`], [`ParameterBinding`] |
//! | [`binding`] | [`BindingDescriptor`], [`Direction`], [`DataShape`] |
//! | [`error`] | [`WorkerError`], [`HandlerError`], [`Phase`], [`PhaseError`] |
//! | [`id`] | [`FunctionId`], [`InvocationId`], [`RequestId`] |
//!
//! The crate has no runtime: it is pure data plus serde. Transport
//! (gRPC, pipes, in-process channels) is somebody else's concern.

#![deny(missing_docs)]

pub mod binding;
pub mod duration;
pub mod error;
pub mod id;
pub mod message;
pub mod value;

pub use binding::{BindingDescriptor, DataShape, Direction, ParseEnumError, RETURN_BINDING_NAME};
pub use duration::DurationMs;
pub use error::{HandlerError, Phase, PhaseError, WorkerError};
pub use id::{FunctionId, InvocationId, RequestId};
pub use message::{
    Content, FailureKind, FunctionLoadRequest, FunctionLoadResponse, FunctionMetadataResponse,
    FunctionsMetadataRequest, InvocationCancel, InvocationRequest, InvocationResponse,
    RetryContext, RpcException, RpcFunctionMetadata, Status, StatusResult, StreamingMessage,
    TraceContext, WorkerInitRequest, WorkerInitResponse, WorkerMetadata, WorkerTerminate,
};
pub use value::{ParameterBinding, RpcHttp, WireValue};
