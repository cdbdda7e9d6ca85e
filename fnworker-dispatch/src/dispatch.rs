//! The dispatch engine.
//!
//! [`Dispatcher`] turns one inbound protocol message into at most one
//! reply. Loads register a function; invocations run the pipeline
//!
//! ```text
//! ResolveFunction → CreateContext → ConvertInput → InvokeFunction
//!     → CollectOutputs → DisposeContext
//! ```
//!
//! and every error on the way is rendered into a failure result tagged
//! with the phase it came from. Nothing here panics the worker or leaves
//! an invocation without a reply.

use crate::config::WorkerOptions;
use crate::init;
use crate::metadata::FunctionMetadataProvider;
use futures_util::FutureExt;
use fnworker_invoke::{
    Arguments, BindingValue, ContextFactory, ConverterRegistry, DefaultContextFactory, EntryPointLocator,
    FeatureProvider, FunctionDefinition, HandlerRegistry, InputConversion, InputConverter, InvocationContext,
    OutputBinder, RegisteredFunction,
};
use fnworker_proto::{
    Content, FunctionLoadRequest, FunctionLoadResponse, FunctionMetadataResponse, FunctionsMetadataRequest,
    HandlerError, InvocationCancel, InvocationId, InvocationRequest, InvocationResponse, ParameterBinding, Phase,
    PhaseError, RpcFunctionMetadata, StatusResult, StreamingMessage, WireValue, WorkerError, WorkerInitRequest,
    WorkerInitResponse,
};
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

type Outputs = (Vec<ParameterBinding>, Option<WireValue>);

/// Handles protocol messages against a shared handler registry.
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    locator: Arc<dyn EntryPointLocator>,
    context_factory: Arc<dyn ContextFactory>,
    metadata_provider: Option<Arc<dyn FunctionMetadataProvider>>,
    options: WorkerOptions,
    in_flight: Mutex<HashMap<InvocationId, InFlight>>,
}

/// Invocations running under one id share a cancellation token; each
/// gets a child of it so its own deadline stays its own.
#[derive(Debug)]
struct InFlight {
    token: CancellationToken,
    running: usize,
}

impl Dispatcher {
    /// Start building a dispatcher that resolves entry points through
    /// `locator`.
    pub fn builder(locator: impl EntryPointLocator + 'static) -> DispatcherBuilder {
        DispatcherBuilder::new(Arc::new(locator))
    }

    /// The handler registry.
    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// The options this dispatcher was built with.
    pub fn options(&self) -> &WorkerOptions {
        &self.options
    }

    /// Number of invocations currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|entry| entry.running)
            .sum()
    }

    /// Answer the init handshake.
    pub fn init(&self, request: &WorkerInitRequest) -> WorkerInitResponse {
        init::init_response(request)
    }

    fn failure(&self, error: &PhaseError) -> StatusResult {
        StatusResult::failure(error.to_exception(self.options.include_stack_trace))
    }

    /// Register the function described by `request`.
    pub fn load_function(&self, request: &FunctionLoadRequest) -> FunctionLoadResponse {
        let span = tracing::info_span!(
            "load_function",
            function_id = %request.function_id,
            name = %request.metadata.name,
        );
        let _enter = span.enter();

        let registered = guarded(Phase::LoadFunction, || {
            FunctionDefinition::from_load(request)
                .and_then(|definition| self.registry.register(definition, self.locator.as_ref()))
        });

        let result = match registered {
            Ok(function) => {
                tracing::info!(
                    phase = %Phase::LoadFunction,
                    outcome = "success",
                    entry_point = %function.definition.entry_point,
                    "function loaded"
                );
                StatusResult::success()
            }
            Err(e) => {
                tracing::warn!(phase = %e.phase, outcome = "failure", error = %e, "function load failed");
                self.failure(&e)
            }
        };

        FunctionLoadResponse {
            function_id: request.function_id.clone(),
            result,
        }
    }

    /// Run one invocation to completion and build its reply.
    pub async fn invoke(&self, request: InvocationRequest) -> InvocationResponse {
        let span = tracing::info_span!(
            "invocation",
            invocation_id = %request.invocation_id,
            function_id = %request.function_id,
            trace_parent = %request.trace_context.trace_parent,
        );
        self.invoke_in_span(request).instrument(span).await
    }

    async fn invoke_in_span(&self, request: InvocationRequest) -> InvocationResponse {
        let started = Instant::now();
        let invocation_id = request.invocation_id.clone();
        let (_tracked, token) = self.track(&invocation_id);

        // Stops the deadline timer when the invocation ends.
        let finished = CancellationToken::new();
        let _finished_guard = finished.clone().drop_guard();
        if let Some(deadline) = request.deadline {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(deadline.to_std()) => {
                        tracing::debug!(deadline = %deadline, "invocation deadline elapsed");
                        token.cancel();
                    }
                    _ = finished.cancelled() => {}
                }
            });
        }

        let outcome = self.run(&request, token).await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok((output_data, return_value)) => {
                tracing::info!(outcome = "success", elapsed_ms, "invocation completed");
                InvocationResponse {
                    invocation_id,
                    output_data,
                    return_value,
                    result: StatusResult::success(),
                }
            }
            Err(e) => {
                tracing::warn!(phase = %e.phase, outcome = "failure", elapsed_ms, error = %e, "invocation failed");
                InvocationResponse {
                    invocation_id,
                    output_data: Vec::new(),
                    return_value: None,
                    result: self.failure(&e),
                }
            }
        }
    }

    async fn run(&self, request: &InvocationRequest, token: CancellationToken) -> Result<Outputs, PhaseError> {
        let function = self
            .registry
            .resolve(&request.function_id)
            .map_err(PhaseError::at(Phase::ResolveFunction))?;

        let mut ctx = guarded(Phase::CreateContext, || {
            self.context_factory
                .create(request, Arc::clone(&function.definition), token)
        })?;

        let outcome = execute(&function, request, &mut ctx).await;
        let disposal = AssertUnwindSafe(ctx.dispose())
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(panicked(panic.as_ref())));

        match (outcome, disposal) {
            (Ok(outputs), Ok(())) => Ok(outputs),
            (Ok(_), Err(e)) => Err(PhaseError::new(Phase::DisposeContext, e)),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(disposal)) => {
                tracing::warn!(
                    phase = %Phase::DisposeContext,
                    error = %disposal,
                    "context disposal failed after an earlier failure"
                );
                Err(e)
            }
        }
    }

    /// Signal cancellation to a running invocation. Returns whether it
    /// was found.
    pub fn cancel(&self, request: &InvocationCancel) -> bool {
        let token = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&request.invocation_id)
            .map(|entry| entry.token.clone());

        match token {
            Some(token) => {
                tracing::info!(invocation_id = %request.invocation_id, "cancelling invocation");
                token.cancel();
                true
            }
            None => {
                tracing::debug!(invocation_id = %request.invocation_id, "cancel for unknown invocation ignored");
                false
            }
        }
    }

    /// Answer a metadata request from the configured provider. Without a
    /// provider the host is asked to index functions itself.
    pub async fn function_metadata(&self, request: &FunctionsMetadataRequest) -> FunctionMetadataResponse {
        let Some(provider) = &self.metadata_provider else {
            return FunctionMetadataResponse {
                function_metadata_results: Vec::new(),
                result: StatusResult::success(),
                use_default_metadata_indexing: true,
            };
        };

        let directory = if request.function_app_directory.is_empty() {
            &self.options.function_app_directory
        } else {
            &request.function_app_directory
        };

        let listed = AssertUnwindSafe(list_metadata(provider.as_ref(), directory))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(panicked(panic.as_ref())))
            .map_err(PhaseError::at(Phase::FunctionMetadata));

        match listed {
            Ok(functions) => {
                tracing::info!(count = functions.len(), directory = %directory, "function metadata listed");
                FunctionMetadataResponse {
                    function_metadata_results: functions,
                    result: StatusResult::success(),
                    use_default_metadata_indexing: false,
                }
            }
            Err(e) => {
                tracing::warn!(phase = %e.phase, outcome = "failure", error = %e, "function metadata failed");
                FunctionMetadataResponse {
                    function_metadata_results: Vec::new(),
                    result: self.failure(&e),
                    use_default_metadata_indexing: false,
                }
            }
        }
    }

    /// Handle one inbound message, returning the reply if it has one.
    ///
    /// Cancels and terminates produce no reply; terminate is acted on by
    /// the receive loop, not here.
    pub async fn handle(&self, message: StreamingMessage) -> Option<StreamingMessage> {
        let StreamingMessage { request_id, content } = message;
        let reply: Content = match content {
            Content::WorkerInitRequest(r) => self.init(&r).into(),
            Content::FunctionLoadRequest(r) => self.load_function(&r).into(),
            Content::InvocationRequest(r) => self.invoke(r).await.into(),
            Content::FunctionsMetadataRequest(r) => self.function_metadata(&r).await.into(),
            Content::InvocationCancel(c) => {
                self.cancel(&c);
                return None;
            }
            Content::WorkerTerminate(_) => return None,
            other => {
                tracing::debug!(content = ?other, "ignoring message the worker does not handle");
                return None;
            }
        };
        Some(StreamingMessage { request_id, content: reply })
    }

    fn track(&self, id: &InvocationId) -> (Tracked<'_>, CancellationToken) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = in_flight.entry(id.clone()).or_insert_with(|| InFlight {
            token: CancellationToken::new(),
            running: 0,
        });
        if entry.running > 0 {
            tracing::warn!(invocation_id = %id, "invocation id reused while still running");
        }
        entry.running += 1;
        let token = entry.token.child_token();

        let tracked = Tracked {
            in_flight: &self.in_flight,
            id: id.clone(),
        };
        (tracked, token)
    }
}

/// Releases an invocation's slot in the in-flight table when dropped,
/// including when the invocation's task is aborted. The entry goes away
/// with the last invocation running under its id.
struct Tracked<'a> {
    in_flight: &'a Mutex<HashMap<InvocationId, InFlight>>,
    id: InvocationId,
}

impl Drop for Tracked<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = in_flight.get_mut(&self.id) {
            entry.running = entry.running.saturating_sub(1);
            if entry.running == 0 {
                in_flight.remove(&self.id);
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("options", &self.options)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

async fn execute(
    function: &RegisteredFunction,
    request: &InvocationRequest,
    ctx: &mut InvocationContext,
) -> Result<Outputs, PhaseError> {
    let definition = Arc::clone(&function.definition);

    let conversion = guarded(Phase::ConvertInput, || ctx.features_mut().get::<dyn InputConversion>())?;
    let mut args = Vec::with_capacity(definition.parameters.len());
    for binding in &definition.parameters {
        // Later duplicates win.
        let raw = request
            .input_data
            .iter()
            .rev()
            .find(|p| p.name.eq_ignore_ascii_case(&binding.name));
        let value = match raw {
            Some(raw) => guarded(Phase::ConvertInput, || {
                conversion.convert_input(&raw.data, binding, &ctx.conversion_context())
            })?,
            None => BindingValue::Absent,
        };
        ctx.set_input(binding.name.clone(), value.clone());
        args.push((binding.name.clone(), value));
    }
    tracing::debug!(phase = %Phase::ConvertInput, count = args.len(), "inputs converted");

    let returned = AssertUnwindSafe(function.handler.call(Arguments::new(args), ctx))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(panic_error(panic.as_ref())))
        .map_err(PhaseError::at(Phase::InvokeFunction))?;
    if let Some(value) = returned {
        ctx.set_return_value(value);
    }
    tracing::debug!(phase = %Phase::InvokeFunction, "handler returned");

    let binder = guarded(Phase::CollectOutputs, || ctx.features_mut().get::<dyn OutputBinder>())?;
    let outputs = guarded(Phase::CollectOutputs, || binder.collect(ctx, &definition))?;
    let return_value = guarded(Phase::CollectOutputs, || binder.collect_return(ctx, &definition))?;

    Ok((outputs, return_value))
}

async fn list_metadata(
    provider: &dyn FunctionMetadataProvider,
    directory: &str,
) -> Result<Vec<RpcFunctionMetadata>, WorkerError> {
    provider
        .get_function_metadata(directory)
        .await?
        .iter()
        .map(|raw| raw.to_rpc())
        .collect()
}

/// Run one step of user-pluggable code, turning both its error and a
/// panic into a failure for `phase`.
fn guarded<T, E>(phase: Phase, step: impl FnOnce() -> Result<T, E>) -> Result<T, PhaseError>
where
    E: Into<WorkerError>,
{
    match std::panic::catch_unwind(AssertUnwindSafe(step)) {
        Ok(result) => result.map_err(PhaseError::at(phase)),
        Err(panic) => Err(PhaseError::new(phase, panicked(panic.as_ref()))),
    }
}

fn panicked(panic: &(dyn Any + Send)) -> WorkerError {
    WorkerError::Handler(panic_error(panic))
}

fn panic_error(panic: &(dyn Any + Send)) -> HandlerError {
    let message = if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panicked".to_string()
    };
    HandlerError::raised("Panic", message)
}

/// Builder for [`Dispatcher`].
pub struct DispatcherBuilder {
    locator: Arc<dyn EntryPointLocator>,
    registry: Option<Arc<HandlerRegistry>>,
    context_factory: Option<Arc<dyn ContextFactory>>,
    converters: ConverterRegistry,
    feature_providers: Vec<Arc<dyn FeatureProvider>>,
    metadata_provider: Option<Arc<dyn FunctionMetadataProvider>>,
    options: WorkerOptions,
}

impl DispatcherBuilder {
    fn new(locator: Arc<dyn EntryPointLocator>) -> Self {
        Self {
            locator,
            registry: None,
            context_factory: None,
            converters: ConverterRegistry::new(),
            feature_providers: Vec::new(),
            metadata_provider: None,
            options: WorkerOptions::default(),
        }
    }

    /// Share an existing registry instead of creating one.
    pub fn registry(mut self, registry: Arc<HandlerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Register an input converter for one binding type.
    pub fn converter(mut self, binding_type: impl Into<String>, converter: impl InputConverter + 'static) -> Self {
        self.converters.register(binding_type, converter);
        self
    }

    /// Register an input converter for every binding type.
    pub fn any_converter(mut self, converter: impl InputConverter + 'static) -> Self {
        self.converters.register_any(converter);
        self
    }

    /// Add a default feature provider, consulted before the built-ins.
    pub fn feature_provider(mut self, provider: impl FeatureProvider + 'static) -> Self {
        self.feature_providers.push(Arc::new(provider));
        self
    }

    /// Replace the context factory. Converters and feature providers
    /// added to this builder are then ignored.
    pub fn context_factory(mut self, factory: impl ContextFactory + 'static) -> Self {
        self.context_factory = Some(Arc::new(factory));
        self
    }

    /// Answer metadata requests from `provider`.
    pub fn metadata_provider(mut self, provider: impl FunctionMetadataProvider + 'static) -> Self {
        self.metadata_provider = Some(Arc::new(provider));
        self
    }

    /// Set worker options.
    pub fn options(mut self, options: WorkerOptions) -> Self {
        self.options = options;
        self
    }

    /// Build the dispatcher.
    pub fn build(self) -> Dispatcher {
        let context_factory = self.context_factory.unwrap_or_else(|| {
            Arc::new(DefaultContextFactory::with_providers(
                Arc::new(self.converters),
                self.feature_providers,
            ))
        });

        Dispatcher {
            registry: self.registry.unwrap_or_default(),
            locator: self.locator,
            context_factory,
            metadata_provider: self.metadata_provider,
            options: self.options,
            in_flight: Mutex::new(HashMap::new()),
        }
    }
}
