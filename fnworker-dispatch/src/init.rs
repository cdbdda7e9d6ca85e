//! Worker init handshake.

use fnworker_proto::{StatusResult, WorkerInitRequest, WorkerInitResponse, WorkerMetadata};
use std::collections::BTreeMap;

/// Version of this crate, reported as the worker version.
pub const WORKER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Custom property carrying the dispatch crate version.
pub const DISPATCH_VERSION_PROPERTY: &str = "fnworker.dispatch.version";

/// Capabilities this worker advertises to the host.
pub fn capabilities() -> BTreeMap<String, String> {
    [
        "RawHttpBodyBytes",
        "TypedDataCollection",
        "HandlesInvocationCancelMessage",
        "HandlesWorkerTerminateMessage",
        "IncludeEmptyEntriesInMessagePayload",
    ]
    .into_iter()
    .map(|name| (name.to_string(), "true".to_string()))
    .collect()
}

/// Describe the running worker.
pub fn worker_metadata() -> WorkerMetadata {
    let mut custom_properties = BTreeMap::new();
    custom_properties.insert(DISPATCH_VERSION_PROPERTY.to_string(), WORKER_VERSION.to_string());

    WorkerMetadata {
        runtime_name: "rust".into(),
        runtime_version: env!("CARGO_PKG_RUST_VERSION").into(),
        worker_version: WORKER_VERSION.into(),
        worker_bitness: std::env::consts::ARCH.into(),
        custom_properties,
    }
}

/// Answer a [`WorkerInitRequest`].
pub fn init_response(request: &WorkerInitRequest) -> WorkerInitResponse {
    tracing::info!(
        host_version = %request.host_version,
        worker_directory = %request.worker_directory,
        "worker init"
    );

    WorkerInitResponse {
        worker_version: WORKER_VERSION.into(),
        capabilities: capabilities(),
        worker_metadata: worker_metadata(),
        result: StatusResult::success(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_reports_runtime_and_dispatch_version() {
        let meta = worker_metadata();
        assert_eq!(meta.runtime_name, "rust");
        assert_eq!(meta.worker_version, WORKER_VERSION);
        assert_eq!(meta.worker_bitness, std::env::consts::ARCH);
        assert_eq!(
            meta.custom_properties.get(DISPATCH_VERSION_PROPERTY).map(String::as_str),
            Some(WORKER_VERSION)
        );
    }

    #[test]
    fn init_response_succeeds() {
        let res = init_response(&WorkerInitRequest::default());
        assert!(res.result.is_success());
        assert_eq!(res.capabilities.get("HandlesInvocationCancelMessage").map(String::as_str), Some("true"));
    }
}
