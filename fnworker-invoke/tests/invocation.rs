//! Drives the invocation pieces by hand, the way the dispatcher does.

use fnworker_invoke::test_utils::{DisposalLog, EchoHandler, FailingConversion, RecordingResource};
use fnworker_invoke::*;
use fnworker_proto::{
    BindingDescriptor, DataShape, Direction, HandlerError, InvocationRequest, RETURN_BINDING_NAME, RpcHttp, WireValue,
    WorkerError,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn definition() -> Arc<FunctionDefinition> {
    Arc::new(
        FunctionDefinition::new(
            "F1",
            "Echo",
            "App.Echo.Run",
            vec![
                BindingDescriptor::new("msg", "queueTrigger", Direction::InOut),
                BindingDescriptor::new(RETURN_BINDING_NAME, "queue", Direction::Out).with_shape(DataShape::String),
            ],
        )
        .unwrap(),
    )
}

fn convert_all(ctx: &mut InvocationContext, request: &InvocationRequest) -> Result<Arguments, WorkerError> {
    let conversion = ctx.features_mut().get::<dyn InputConversion>()?;
    let definition = ctx.definition().clone();
    let null = WireValue::Null;
    let mut args = Vec::new();
    for binding in &definition.parameters {
        let raw = request
            .input_data
            .iter()
            .rev()
            .find(|p| p.name == binding.name)
            .map(|p| &p.data)
            .unwrap_or(&null);
        let value = conversion.convert_input(raw, binding, &ctx.conversion_context())?;
        ctx.set_input(binding.name.clone(), value.clone());
        args.push((binding.name.clone(), value));
    }
    Ok(Arguments::new(args))
}

// --- Happy path ---

#[tokio::test]
async fn echo_round_trip() {
    let request = InvocationRequest::new("inv-1", "F1").with_input("msg", "hello");
    let mut ctx = DefaultContextFactory::default()
        .create(&request, definition(), CancellationToken::new())
        .unwrap();

    let args = convert_all(&mut ctx, &request).unwrap();
    let handler = EchoHandler::new(["msg"]);
    let returned = handler.call(args, &mut ctx).await.unwrap();
    ctx.set_return_value(returned.unwrap_or_default());

    let binder = ctx.features_mut().get::<dyn OutputBinder>().unwrap();
    let def = ctx.definition().clone();
    let outputs = binder.collect(&ctx, &def).unwrap();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].data, WireValue::from("hello"));
    assert_eq!(binder.collect_return(&ctx, &def).unwrap(), Some(WireValue::from("hello")));

    ctx.dispose().await.unwrap();
}

#[tokio::test]
async fn missing_and_duplicate_inputs() {
    let request = InvocationRequest::new("inv-1", "F1")
        .with_input("unrelated", "ignored")
        .with_input("msg", "first")
        .with_input("msg", "second");
    let mut ctx = DefaultContextFactory::default()
        .create(&request, definition(), CancellationToken::new())
        .unwrap();
    let args = convert_all(&mut ctx, &request).unwrap();
    assert_eq!(args.get(0).and_then(|v| v.as_str()), Some("second"));
    assert!(ctx.input("unrelated").is_none());

    let empty = InvocationRequest::new("inv-2", "F1");
    let mut ctx = DefaultContextFactory::default()
        .create(&empty, definition(), CancellationToken::new())
        .unwrap();
    let args = convert_all(&mut ctx, &empty).unwrap();
    assert!(args.get(0).unwrap().is_absent());
}

// --- Replaced features ---

#[tokio::test]
async fn user_provider_replaces_default_conversion() {
    let factory = DefaultContextFactory::with_providers(
        Arc::default(),
        vec![Arc::new(provide::<dyn InputConversion>(|| {
            Arc::new(FailingConversion::new("InvalidOperation", "whoops"))
        }))],
    );
    let request = InvocationRequest::new("inv-1", "F1").with_input("msg", "hello");
    let log = DisposalLog::new();
    let mut ctx = factory.create(&request, definition(), CancellationToken::new()).unwrap();
    ctx.add_resource(RecordingResource::new("db", &log));

    let err = convert_all(&mut ctx, &request).unwrap_err();
    assert_eq!(err.type_name(), "InvalidOperation");
    assert_eq!(err.to_string(), "whoops");

    ctx.dispose().await.unwrap();
    assert_eq!(log.entries(), ["async db", "sync db"]);
}

#[tokio::test]
async fn user_converter_sees_trigger_metadata() {
    struct FromMetadata;
    impl InputConverter for FromMetadata {
        fn try_convert(&self, _: &WireValue, _: &BindingDescriptor, ctx: &ConversionContext<'_>) -> ConversionResult {
            match ctx.trigger_metadata.get("DequeueCount") {
                Some(WireValue::Int(n)) => ConversionResult::Converted(BindingValue::Int(*n)),
                _ => ConversionResult::Unhandled,
            }
        }
    }

    let mut converters = ConverterRegistry::new();
    converters.register("queueTrigger", FromMetadata);
    let factory = DefaultContextFactory::new(Arc::new(converters));

    let mut request = InvocationRequest::new("inv-1", "F1").with_input("msg", WireValue::Int(0));
    request.trigger_metadata.insert("DequeueCount".into(), WireValue::Int(4));
    let mut ctx = factory.create(&request, definition(), CancellationToken::new()).unwrap();

    let args = convert_all(&mut ctx, &request).unwrap();
    assert!(matches!(args.get(0), Some(BindingValue::Int(4))));
}

// --- Cancellation ---

#[tokio::test]
async fn handler_observes_cancellation() {
    let handler = handler_fn(Signature::new(["msg"]).returning(), |_args, ctx| {
        Box::pin(async move {
            let token = ctx.cancellation_token().clone();
            token.cancelled().await;
            Err::<Option<BindingValue>, _>(HandlerError::Cancelled)
        })
    });

    let token = CancellationToken::new();
    let request = InvocationRequest::new("inv-1", "F1");
    let mut ctx = DefaultContextFactory::default()
        .create(&request, definition(), token.clone())
        .unwrap();
    let args = convert_all(&mut ctx, &request).unwrap();

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        token.cancel();
    });
    let err = handler.call(args, &mut ctx).await.unwrap_err();
    canceller.await.unwrap();

    assert!(matches!(err, HandlerError::Cancelled));
    assert!(ctx.is_cancelled());
}

// --- HTTP ---

#[tokio::test]
async fn http_trigger_builds_request_and_response() {
    let def = Arc::new(
        FunctionDefinition::new(
            "H1",
            "Http",
            "App.Http.Run",
            vec![
                BindingDescriptor::new("req", "httpTrigger", Direction::In),
                BindingDescriptor::new(RETURN_BINDING_NAME, "http", Direction::Out),
            ],
        )
        .unwrap(),
    );
    let handler = handler_fn(Signature::new(["req"]).returning(), |args, _ctx| {
        Box::pin(async move {
            let req = args.get(0).and_then(|v| v.as_http_request()).cloned().unwrap_or_default();
            let mut res = req.create_response(200);
            res.write_string(&format!("{} {}", req.method, req.query_param("name").unwrap_or("anon")));
            Ok::<_, HandlerError>(Some(BindingValue::from(res)))
        })
    });

    let rpc = RpcHttp {
        method: "GET".into(),
        query: [("name".to_string(), "ada".to_string())].into(),
        ..RpcHttp::default()
    };
    let request = InvocationRequest::new("inv-1", "H1").with_input("req", rpc);
    let mut ctx = DefaultContextFactory::default()
        .create(&request, def.clone(), CancellationToken::new())
        .unwrap();
    let args = convert_all(&mut ctx, &request).unwrap();
    let returned = handler.call(args, &mut ctx).await.unwrap().unwrap();
    ctx.set_return_value(returned);

    let rendered = DeclaredOutputBinder.collect_return(&ctx, &def).unwrap().unwrap();
    let WireValue::Http(http) = rendered else {
        panic!("expected http response, got {rendered:?}");
    };
    assert_eq!(http.status_code.as_deref(), Some("200"));
    assert_eq!(http.body.as_deref(), Some(&WireValue::Bytes(b"GET ada".to_vec())));
}
