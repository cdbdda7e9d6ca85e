#![deny(missing_docs)]
//! # fnworker — umbrella crate
//!
//! One import surface for the worker: the wire protocol is always
//! available, the invocation pieces and the dispatch engine sit behind
//! feature flags, and [`prelude`] covers the usual startup code.
//!
//! ```no_run
//! use fnworker::prelude::*;
//!
//! # async fn run() -> Result<(), DispatchError> {
//! let echo = handler_fn(Signature::new(["msg"]).returning(), |mut args, _ctx| {
//!     Box::pin(async move { Ok::<_, HandlerError>(Some(args.take(0))) })
//! });
//! let worker = Worker::new(
//!     Dispatcher::builder(HandlerCatalog::new().with("App.Echo", echo))
//!         .options(WorkerOptions::from_env()?)
//!         .build(),
//! );
//! let (_to_worker, inbound) = worker.inbound_channel();
//! let (outbound, _from_worker) = tokio::sync::mpsc::channel(128);
//! worker.run(inbound, outbound).await
//! # }
//! ```

pub use fnworker_proto as proto;

#[cfg(feature = "invoke")]
pub use fnworker_invoke as invoke;

#[cfg(feature = "dispatch")]
pub use fnworker_dispatch as dispatch;

/// Happy-path imports for wiring up a worker.
pub mod prelude {
    pub use fnworker_proto::{
        BindingDescriptor, DataShape, Direction, FunctionId, HandlerError, InvocationId, StreamingMessage,
        WireValue, WorkerError,
    };

    #[cfg(feature = "invoke")]
    pub use fnworker_invoke::{
        Arguments, BindingValue, ConversionResult, EntryPointLocator, FunctionHandler, HandlerCatalog,
        HttpRequestData, HttpResponseData, InputConverter, InvocationContext, ScopedResource, Signature,
        handler_fn,
    };

    #[cfg(feature = "dispatch")]
    pub use fnworker_dispatch::{DispatchError, Dispatcher, Worker, WorkerOptions};
}
