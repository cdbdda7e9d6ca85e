use fnworker_invoke::test_utils::EchoHandler;
use fnworker_invoke::*;
use fnworker_proto::{BindingDescriptor, Direction, FunctionId, HandlerError, RETURN_BINDING_NAME, WorkerError};
use std::sync::Arc;

fn http_function(id: &str, entry_point: &str) -> FunctionDefinition {
    FunctionDefinition::new(
        id,
        "HttpHello",
        entry_point,
        vec![
            BindingDescriptor::new("req", "httpTrigger", Direction::In),
            BindingDescriptor::new(RETURN_BINDING_NAME, "http", Direction::Out),
        ],
    )
    .unwrap()
}

fn catalog() -> HandlerCatalog {
    HandlerCatalog::new().with("App.Http.Hello", EchoHandler::new(["req"]))
}

// --- Registration ---

#[test]
fn register_then_resolve() {
    let registry = HandlerRegistry::new();
    let registered = registry
        .register(http_function("F1", "App.Http.Hello"), &catalog())
        .unwrap();
    assert_eq!(registered.definition.name, "HttpHello");

    let resolved = registry.resolve(&FunctionId::new("F1")).unwrap();
    assert!(Arc::ptr_eq(&resolved.definition, &registered.definition));
    assert!(Arc::ptr_eq(&resolved.handler, &registered.handler));
    assert_eq!(registry.ids(), vec![FunctionId::new("F1")]);
}

#[test]
fn duplicate_registration_is_rejected() {
    let registry = HandlerRegistry::new();
    registry
        .register(http_function("F1", "App.Http.Hello"), &catalog())
        .unwrap();

    let err = registry
        .register(http_function("F1", "App.Http.Hello"), &catalog())
        .unwrap_err();
    assert!(matches!(err, WorkerError::DuplicateDefinition(ref id) if id == "F1"));
    assert_eq!(registry.len(), 1);
}

#[test]
fn unknown_id_is_not_found() {
    let registry = HandlerRegistry::new();
    let err = registry.resolve(&FunctionId::new("nope")).unwrap_err();
    assert_eq!(err.to_string(), "function not found: nope");
}

// --- Entry point validation ---

#[test]
fn unresolvable_entry_point_is_invalid() {
    let registry = HandlerRegistry::new();
    let err = registry
        .register(http_function("F1", "App.Http.Missing"), &catalog())
        .unwrap_err();
    assert!(matches!(err, WorkerError::InvalidDefinition { .. }));
    assert!(err.to_string().contains("App.Http.Missing"));
    assert!(registry.is_empty());
}

#[test]
fn arity_mismatch_is_invalid() {
    let registry = HandlerRegistry::new();
    let catalog = HandlerCatalog::new().with("App.Http.Hello", EchoHandler::new(["req", "extra"]));
    let err = registry
        .register(http_function("F1", "App.Http.Hello"), &catalog)
        .unwrap_err();
    assert!(err.to_string().contains("takes 2 parameter(s) but 1 input binding(s)"));
}

#[test]
fn parameter_position_must_match_binding() {
    let registry = HandlerRegistry::new();
    let catalog = HandlerCatalog::new().with("App.Http.Hello", EchoHandler::new(["request"]));
    let err = registry
        .register(http_function("F1", "App.Http.Hello"), &catalog)
        .unwrap_err();
    assert!(err.to_string().contains("parameter 0"));
}

#[test]
fn parameter_names_match_bindings_ignoring_case() {
    let registry = HandlerRegistry::new();
    let catalog = HandlerCatalog::new().with("App.Http.Hello", EchoHandler::new(["Req"]));
    let registered = registry
        .register(http_function("F1", "App.Http.Hello"), &catalog)
        .unwrap();
    assert_eq!(registered.handler.signature().parameters, ["Req"]);
}

#[test]
fn return_binding_requires_returning_handler() {
    let handler = handler_fn(Signature::new(["req"]), |_args, _ctx| {
        Box::pin(async { Ok::<Option<BindingValue>, HandlerError>(None) })
    });
    let catalog = HandlerCatalog::new().with("App.Http.Hello", handler);

    let err = HandlerRegistry::new()
        .register(http_function("F1", "App.Http.Hello"), &catalog)
        .unwrap_err();
    assert!(err.to_string().contains("returns nothing"));
}

// --- Custom locators ---

struct RefusingLocator;

impl EntryPointLocator for RefusingLocator {
    fn locate(&self, script_file: &str, _entry_point: &str) -> Result<Arc<dyn FunctionHandler>, WorkerError> {
        Err(WorkerError::InvalidDefinition {
            function: script_file.to_string(),
            reason: "module is not loaded".into(),
        })
    }
}

#[test]
fn locator_errors_propagate() {
    let def = http_function("F1", "App.Http.Hello").with_script_file("app.wasm");
    let err = HandlerRegistry::new().register(def, &RefusingLocator).unwrap_err();
    assert_eq!(err.to_string(), "invalid definition for 'app.wasm': module is not loaded");
}
