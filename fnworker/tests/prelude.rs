//! The prelude is enough to wire a worker and run one invocation.

use fnworker::prelude::*;
use fnworker::proto::{FunctionLoadRequest, InvocationRequest, RETURN_BINDING_NAME, RpcFunctionMetadata};

// --- Helpers ---

fn upper() -> impl FunctionHandler {
    handler_fn(Signature::new(["msg"]).returning(), |args, ctx| {
        Box::pin(async move {
            let text = args.get(0).and_then(|v| v.as_str()).unwrap_or_default().to_uppercase();
            ctx.set_output("copy", text.clone());
            Ok::<_, HandlerError>(Some(BindingValue::from(text)))
        })
    })
}

fn load() -> FunctionLoadRequest {
    FunctionLoadRequest {
        function_id: FunctionId::new("U1"),
        metadata: RpcFunctionMetadata {
            name: "Upper".into(),
            entry_point: "App.Upper".into(),
            bindings: vec![
                BindingDescriptor::new("msg", "queueTrigger", Direction::In),
                BindingDescriptor::new("copy", "queue", Direction::Out).with_shape(DataShape::Binary),
                BindingDescriptor::new(RETURN_BINDING_NAME, "queue", Direction::Out),
            ],
            ..RpcFunctionMetadata::default()
        },
    }
}

// --- Tests ---

#[tokio::test]
async fn prelude_wires_a_dispatcher() {
    let dispatcher = Dispatcher::builder(HandlerCatalog::new().with("App.Upper", upper())).build();
    assert!(dispatcher.load_function(&load()).result.is_success());

    let response = dispatcher
        .invoke(InvocationRequest::new("inv-1", "U1").with_input("msg", "shout"))
        .await;

    assert!(response.result.is_success());
    assert_eq!(response.return_value, Some(WireValue::from("SHOUT")));
    assert_eq!(response.output_data.len(), 1);
    assert_eq!(response.output_data[0].name, "copy");
    assert_eq!(response.output_data[0].data, WireValue::Bytes(b"SHOUT".to_vec()));
}

#[test]
fn worker_options_default() {
    let options = WorkerOptions::default();
    assert_eq!(options.worker_id, "fnworker");
    assert!(!options.include_stack_trace);
}
