//! # fnworker-dispatch — the invocation dispatch engine
//!
//! Turns inbound protocol messages into replies: the init handshake,
//! function loads, metadata requests, and invocations.
//!
//! | Module | What it does |
//! |--------|-------------|
//! | [`dispatch`] | [`Dispatcher`]: load, invoke, cancel, metadata; phase-tagged failures |
//! | [`worker`] | [`Worker`]: receive loop with graceful terminate |
//! | [`init`] | Capabilities and worker metadata for the handshake |
//! | [`metadata`] | [`FunctionMetadataProvider`]s and binding validation |
//! | [`config`] | [`WorkerOptions`] with environment overlay |
//! | [`error`] | [`DispatchError`] |
//!
//! ```no_run
//! use fnworker_dispatch::{Dispatcher, Worker, WorkerOptions};
//! use fnworker_invoke::HandlerCatalog;
//!
//! # async fn run() -> Result<(), fnworker_dispatch::DispatchError> {
//! let dispatcher = Dispatcher::builder(HandlerCatalog::new())
//!     .options(WorkerOptions::from_env()?)
//!     .build();
//! let worker = Worker::new(dispatcher);
//! let (_to_worker, inbound) = worker.inbound_channel();
//! let (outbound, _from_worker) = tokio::sync::mpsc::channel(128);
//! worker.run(inbound, outbound).await
//! # }
//! ```

#![deny(missing_docs)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod init;
pub mod metadata;
pub mod worker;

pub use config::{ENV_PREFIX, WorkerOptions};
pub use dispatch::{Dispatcher, DispatcherBuilder};
pub use error::DispatchError;
pub use init::{DISPATCH_VERSION_PROPERTY, WORKER_VERSION, capabilities, init_response, worker_metadata};
pub use metadata::{
    FileMetadataProvider, FunctionMetadataProvider, METADATA_FILE_NAME, RawFunctionMetadata, StaticMetadataProvider,
    parse_binding,
};
pub use worker::Worker;
