//! # fnworker-invoke — everything scoped to one function invocation
//!
//! | Module | What it does |
//! |--------|-------------|
//! | [`feature`] | Capability-keyed [`FeatureStore`] with default providers |
//! | [`convert`] | Input conversion chain and user [`InputConverter`]s |
//! | [`handler`] | Object-safe [`FunctionHandler`] and [`handler_fn`] |
//! | [`definition`] | Validated [`FunctionDefinition`] built from a load request |
//! | [`registry`] | [`HandlerRegistry`] and [`EntryPointLocator`]s |
//! | [`context`] | [`InvocationContext`], scoped resources, [`ContextFactory`] |
//! | [`output`] | [`OutputBinder`] rendering declared outputs |
//! | [`http`] | Typed HTTP request / response payloads |
//!
//! The dispatcher in `fnworker-dispatch` drives these pieces; nothing
//! here knows about the transport.

#![deny(missing_docs)]

pub mod context;
pub mod convert;
pub mod definition;
pub mod feature;
pub mod handler;
pub mod http;
pub mod output;
pub mod registry;
pub mod value;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use context::{ContextFactory, DefaultContextFactory, InvocationContext, ScopedResource, TeardownError};
pub use convert::{
    ConversionContext, ConversionResult, ConversionTarget, ConverterRegistry, DefaultInputConversion,
    InputConversion, InputConverter,
};
pub use definition::FunctionDefinition;
pub use feature::{FeatureFactory, FeatureProvider, FeatureStore, provide};
pub use handler::{Arguments, BoxFuture, FnHandler, FunctionHandler, Signature, handler_fn};
pub use http::{HttpRequestData, HttpResponseData};
pub use output::{DeclaredOutputBinder, OutputBinder};
pub use registry::{EntryPointLocator, HandlerCatalog, HandlerRegistry, RegisteredFunction, check_signature};
pub use value::BindingValue;
