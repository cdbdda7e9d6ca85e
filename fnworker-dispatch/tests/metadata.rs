//! Metadata requests answered by the dispatcher.

use fnworker_dispatch::{Dispatcher, FileMetadataProvider, RawFunctionMetadata, StaticMetadataProvider, WorkerOptions};
use fnworker_invoke::HandlerCatalog;
use fnworker_proto::{DataShape, Direction, FailureKind, FunctionId, FunctionsMetadataRequest};
use serde_json::json;

fn hello() -> RawFunctionMetadata {
    RawFunctionMetadata {
        name: "Hello".into(),
        entry_point: "App.Hello.Run".into(),
        script_file: "app.so".into(),
        raw_bindings: vec![
            json!({ "Name": "req", "Type": "httpTrigger", "Direction": "In", "DataType": "String" }),
            json!({ "name": "$return", "type": "http", "direction": "out" }),
        ],
        ..RawFunctionMetadata::default()
    }
}

#[tokio::test]
async fn without_provider_host_indexes() {
    let dispatcher = Dispatcher::builder(HandlerCatalog::new()).build();

    let response = dispatcher.function_metadata(&FunctionsMetadataRequest::default()).await;

    assert!(response.result.is_success());
    assert!(response.use_default_metadata_indexing);
    assert!(response.function_metadata_results.is_empty());
}

#[tokio::test]
async fn static_provider_lists_functions() {
    let dispatcher = Dispatcher::builder(HandlerCatalog::new())
        .metadata_provider(StaticMetadataProvider::new(vec![hello()]))
        .build();

    let response = dispatcher.function_metadata(&FunctionsMetadataRequest::default()).await;

    assert!(response.result.is_success());
    assert!(!response.use_default_metadata_indexing);
    let functions = response.function_metadata_results;
    assert_eq!(functions.len(), 1);
    assert_eq!(functions[0].function_id, Some(FunctionId::new("Hello")));
    assert_eq!(functions[0].bindings[0].direction, Direction::In);
    assert_eq!(functions[0].bindings[0].data_shape, Some(DataShape::String));
    assert!(functions[0].bindings[1].is_return());
}

#[tokio::test]
async fn bad_binding_fails_the_request() {
    let mut broken = hello();
    broken.raw_bindings.push(json!({ "name": "out", "type": "queue" }));
    let dispatcher = Dispatcher::builder(HandlerCatalog::new())
        .metadata_provider(StaticMetadataProvider::new(vec![broken]))
        .build();

    let response = dispatcher.function_metadata(&FunctionsMetadataRequest::default()).await;

    let exception = response.result.exception.unwrap();
    assert_eq!(exception.kind, FailureKind::Format);
    assert_eq!(
        exception.message,
        "FunctionMetadata: FormatError: Bindings must declare a direction and type."
    );
    assert!(response.function_metadata_results.is_empty());
}

#[tokio::test]
async fn file_provider_reads_configured_directory() {
    let dir = tempfile::tempdir().unwrap();
    let text = serde_json::to_string(&vec![hello()]).unwrap();
    std::fs::write(dir.path().join("functions.metadata"), text).unwrap();

    let options = WorkerOptions {
        function_app_directory: dir.path().display().to_string(),
        ..WorkerOptions::default()
    };
    let dispatcher = Dispatcher::builder(HandlerCatalog::new())
        .metadata_provider(FileMetadataProvider::new())
        .options(options)
        .build();

    let response = dispatcher.function_metadata(&FunctionsMetadataRequest::default()).await;

    assert!(response.result.is_success());
    assert_eq!(response.function_metadata_results[0].name, "Hello");
}

#[tokio::test]
async fn file_provider_missing_file_is_format_error() {
    let dir = tempfile::tempdir().unwrap();
    let dispatcher = Dispatcher::builder(HandlerCatalog::new())
        .metadata_provider(FileMetadataProvider::with_file_name("absent.json"))
        .build();
    let request = FunctionsMetadataRequest {
        function_app_directory: dir.path().display().to_string(),
    };

    let response = dispatcher.function_metadata(&request).await;

    let exception = response.result.exception.unwrap();
    assert_eq!(exception.kind, FailureKind::Format);
    assert!(exception.message.starts_with("FunctionMetadata: FormatError: cannot read function metadata"));
}
