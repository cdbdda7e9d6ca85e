//! The per-invocation context.
//!
//! An [`InvocationContext`] is created for exactly one invocation and
//! owns everything scoped to it: the feature store, converted inputs,
//! outputs written by the handler, the cancellation token, and any
//! resources that need teardown. [`InvocationContext::dispose`] consumes
//! the context, so teardown runs at most once.

use crate::convert::{ConversionContext, ConverterRegistry, DefaultInputConversion, InputConversion};
use crate::definition::FunctionDefinition;
use crate::feature::{FeatureProvider, FeatureStore, provide};
use crate::output::{DeclaredOutputBinder, OutputBinder};
use crate::value::BindingValue;
use async_trait::async_trait;
use fnworker_proto::{
    FunctionId, InvocationId, InvocationRequest, RetryContext, TraceContext, WireValue, WorkerError,
};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Error type returned by resource teardown.
pub type TeardownError = Box<dyn std::error::Error + Send + Sync>;

/// A resource owned by an invocation and torn down with it.
///
/// Asynchronous teardown of every resource runs before any synchronous
/// teardown. Both default to doing nothing.
#[async_trait]
pub trait ScopedResource: Send {
    /// Name used in disposal failures.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Asynchronous teardown.
    async fn dispose_async(&mut self) -> Result<(), TeardownError> {
        Ok(())
    }

    /// Synchronous teardown.
    fn dispose(&mut self) -> Result<(), TeardownError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct BindingData {
    inputs: HashMap<String, BindingValue>,
    outputs: HashMap<String, BindingValue>,
    return_value: Option<BindingValue>,
}

/// Everything scoped to one invocation.
pub struct InvocationContext {
    invocation_id: InvocationId,
    function: Arc<FunctionDefinition>,
    cancellation: CancellationToken,
    features: FeatureStore,
    bindings: BindingData,
    trigger_metadata: BTreeMap<String, WireValue>,
    span: tracing::Span,
    resources: Vec<Box<dyn ScopedResource>>,
}

impl InvocationContext {
    /// A bare context. The current tracing span becomes the context's
    /// span, so create it from inside the invocation span.
    pub fn new(
        invocation_id: InvocationId,
        function: Arc<FunctionDefinition>,
        cancellation: CancellationToken,
        features: FeatureStore,
    ) -> Self {
        Self {
            invocation_id,
            function,
            cancellation,
            features,
            bindings: BindingData::default(),
            trigger_metadata: BTreeMap::new(),
            span: tracing::Span::current(),
            resources: Vec::new(),
        }
    }

    /// Attach trigger metadata, builder style.
    pub fn with_trigger_metadata(mut self, trigger_metadata: BTreeMap<String, WireValue>) -> Self {
        self.trigger_metadata = trigger_metadata;
        self
    }

    /// The invocation id.
    pub fn invocation_id(&self) -> &InvocationId {
        &self.invocation_id
    }

    /// The id of the function being invoked.
    pub fn function_id(&self) -> &FunctionId {
        &self.function.id
    }

    /// The function being invoked.
    pub fn definition(&self) -> &Arc<FunctionDefinition> {
        &self.function
    }

    /// The invocation's cancellation signal. Cancellation is cooperative:
    /// handlers should watch it and return [`HandlerError::Cancelled`](fnworker_proto::HandlerError::Cancelled)
    /// or their own response.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// The feature store.
    pub fn features(&self) -> &FeatureStore {
        &self.features
    }

    /// The feature store, mutably.
    pub fn features_mut(&mut self) -> &mut FeatureStore {
        &mut self.features
    }

    /// Retry information, when the host sent any.
    pub fn retry_context(&self) -> Option<Arc<RetryContext>> {
        self.features.try_get::<RetryContext>()
    }

    /// Trace correlation for this invocation.
    pub fn trace_context(&self) -> Option<Arc<TraceContext>> {
        self.features.try_get::<TraceContext>()
    }

    /// Trigger metadata sent with the request.
    pub fn trigger_metadata(&self) -> &BTreeMap<String, WireValue> {
        &self.trigger_metadata
    }

    /// Span the invocation runs in. Handlers log through it.
    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    /// Borrowed view handed to converters.
    pub fn conversion_context(&self) -> ConversionContext<'_> {
        ConversionContext {
            invocation_id: &self.invocation_id,
            function_id: &self.function.id,
            trigger_metadata: &self.trigger_metadata,
        }
    }

    /// A converted input binding.
    pub fn input(&self, name: &str) -> Option<&BindingValue> {
        self.bindings.inputs.get(name)
    }

    /// Store a converted input binding.
    pub fn set_input(&mut self, name: impl Into<String>, value: BindingValue) {
        self.bindings.inputs.insert(name.into(), value);
    }

    /// A value written to an output binding.
    pub fn output(&self, name: &str) -> Option<&BindingValue> {
        self.bindings.outputs.get(name)
    }

    /// Write an output binding. Only declared outputs are collected.
    pub fn set_output(&mut self, name: impl Into<String>, value: impl Into<BindingValue>) {
        self.bindings.outputs.insert(name.into(), value.into());
    }

    /// The handler's return value, once it has produced one.
    pub fn return_value(&self) -> Option<&BindingValue> {
        self.bindings.return_value.as_ref()
    }

    /// Record the handler's return value.
    pub fn set_return_value(&mut self, value: BindingValue) {
        self.bindings.return_value = Some(value);
    }

    /// Hand a resource to the context for teardown at disposal.
    pub fn add_resource(&mut self, resource: impl ScopedResource + 'static) {
        self.resources.push(Box::new(resource));
    }

    /// Tear down every scoped resource: all asynchronous teardown first,
    /// then all synchronous teardown, each in reverse registration order.
    /// Every resource is attempted even if an earlier one fails.
    pub async fn dispose(mut self) -> Result<(), WorkerError> {
        let mut failures = Vec::new();

        for resource in self.resources.iter_mut().rev() {
            if let Err(e) = resource.dispose_async().await {
                failures.push(format!("{}: {e}", resource.name()));
            }
        }
        for resource in self.resources.iter_mut().rev() {
            if let Err(e) = resource.dispose() {
                failures.push(format!("{}: {e}", resource.name()));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(WorkerError::DisposalFailure(failures.join("; ")))
        }
    }
}

impl fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("invocation_id", &self.invocation_id)
            .field("function_id", &self.function.id)
            .field("cancelled", &self.cancellation.is_cancelled())
            .field("features", &self.features)
            .field("bindings", &self.bindings)
            .field("resources", &self.resources.len())
            .finish()
    }
}

/// Builds invocation contexts.
pub trait ContextFactory: Send + Sync {
    /// Create the context for `request`.
    fn create(
        &self,
        request: &InvocationRequest,
        function: Arc<FunctionDefinition>,
        cancellation: CancellationToken,
    ) -> Result<InvocationContext, WorkerError>;
}

/// The stock factory.
///
/// Each context gets a fresh feature store whose providers are the
/// user-supplied ones followed by the built-in conversion and output
/// binding defaults, so a user provider for `dyn InputConversion` or
/// `dyn OutputBinder` replaces the default. Retry and trace context are
/// set as features.
pub struct DefaultContextFactory {
    providers: Vec<Arc<dyn FeatureProvider>>,
}

impl DefaultContextFactory {
    /// A factory whose default conversion consults `converters`.
    pub fn new(converters: Arc<ConverterRegistry>) -> Self {
        Self::with_providers(converters, Vec::new())
    }

    /// A factory with extra feature providers, consulted before the
    /// built-in defaults.
    pub fn with_providers(
        converters: Arc<ConverterRegistry>,
        mut providers: Vec<Arc<dyn FeatureProvider>>,
    ) -> Self {
        let conversion = DefaultInputConversion::new(converters);
        providers.push(Arc::new(provide::<dyn InputConversion>(move || {
            Arc::new(conversion.clone())
        })));
        providers.push(Arc::new(provide::<dyn OutputBinder>(|| Arc::new(DeclaredOutputBinder))));
        Self { providers }
    }
}

impl Default for DefaultContextFactory {
    fn default() -> Self {
        Self::new(Arc::default())
    }
}

impl fmt::Debug for DefaultContextFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultContextFactory")
            .field("providers", &self.providers.len())
            .finish()
    }
}

impl ContextFactory for DefaultContextFactory {
    fn create(
        &self,
        request: &InvocationRequest,
        function: Arc<FunctionDefinition>,
        cancellation: CancellationToken,
    ) -> Result<InvocationContext, WorkerError> {
        let mut features = FeatureStore::with_providers(self.providers.clone());
        features.set(Arc::new(request.trace_context.clone()));
        if let Some(retry) = &request.retry_context {
            features.set(Arc::new(retry.clone()));
        }

        Ok(
            InvocationContext::new(request.invocation_id.clone(), function, cancellation, features)
                .with_trigger_metadata(request.trigger_metadata.clone()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fnworker_proto::{BindingDescriptor, Direction};
    use std::sync::Mutex;

    fn definition() -> Arc<FunctionDefinition> {
        Arc::new(
            FunctionDefinition::new(
                "F1",
                "Queue",
                "App.Queue.Run",
                vec![BindingDescriptor::new("msg", "queueTrigger", Direction::In)],
            )
            .unwrap(),
        )
    }

    struct Step {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail_sync: bool,
    }

    #[async_trait]
    impl ScopedResource for Step {
        fn name(&self) -> &str {
            self.name
        }

        async fn dispose_async(&mut self) -> Result<(), TeardownError> {
            self.log.lock().unwrap().push(format!("async {}", self.name));
            Ok(())
        }

        fn dispose(&mut self) -> Result<(), TeardownError> {
            self.log.lock().unwrap().push(format!("sync {}", self.name));
            if self.fail_sync {
                return Err("boom".into());
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn async_teardown_runs_before_sync() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut ctx = DefaultContextFactory::default()
            .create(&InvocationRequest::new("i1", "F1"), definition(), CancellationToken::new())
            .unwrap();
        for name in ["a", "b"] {
            ctx.add_resource(Step {
                name,
                log: log.clone(),
                fail_sync: false,
            });
        }

        ctx.dispose().await.unwrap();
        assert_eq!(*log.lock().unwrap(), ["async b", "async a", "sync b", "sync a"]);
    }

    #[tokio::test]
    async fn failed_teardown_still_runs_the_rest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut ctx = DefaultContextFactory::default()
            .create(&InvocationRequest::new("i1", "F1"), definition(), CancellationToken::new())
            .unwrap();
        ctx.add_resource(Step {
            name: "first",
            log: log.clone(),
            fail_sync: false,
        });
        ctx.add_resource(Step {
            name: "second",
            log: log.clone(),
            fail_sync: true,
        });

        let err = ctx.dispose().await.unwrap_err();
        assert_eq!(err.to_string(), "disposal failed: second: boom");
        assert_eq!(log.lock().unwrap().len(), 4);
    }

    #[test]
    fn factory_attaches_retry_and_defaults() {
        let request = InvocationRequest::new("i1", "F1").with_retry(2, 5);
        let mut ctx = DefaultContextFactory::default()
            .create(&request, definition(), CancellationToken::new())
            .unwrap();

        let retry = ctx.retry_context().unwrap();
        assert_eq!((retry.retry_count, retry.max_retry_count), (2, 5));
        assert!(ctx.trace_context().is_some());
        assert!(ctx.features_mut().get::<dyn InputConversion>().is_ok());
        assert!(ctx.features_mut().get::<dyn OutputBinder>().is_ok());
    }

    #[test]
    fn no_retry_context_when_absent() {
        let ctx = DefaultContextFactory::default()
            .create(&InvocationRequest::new("i1", "F1"), definition(), CancellationToken::new())
            .unwrap();
        assert!(ctx.retry_context().is_none());
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn outputs_and_return_value() {
        let mut ctx = DefaultContextFactory::default()
            .create(&InvocationRequest::new("i1", "F1"), definition(), CancellationToken::new())
            .unwrap();
        ctx.set_output("audit", "done");
        ctx.set_return_value(BindingValue::Int(1));

        assert_eq!(ctx.output("audit").and_then(|v| v.as_str()), Some("done"));
        assert_eq!(ctx.return_value().map(|v| v.type_name()), Some("int"));
        assert!(ctx.output("missing").is_none());
    }
}
