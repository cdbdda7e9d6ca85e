//! Function metadata discovery.
//!
//! A [`FunctionMetadataProvider`] answers the host's metadata request
//! with raw metadata whose bindings are loose JSON objects. Binding field
//! names are matched case-insensitively; `direction` and `type` are
//! required, `dataType` is optional but must name a known shape.

use async_trait::async_trait;
use fnworker_proto::{BindingDescriptor, DataShape, Direction, FunctionId, RpcFunctionMetadata, WorkerError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// File the [`FileMetadataProvider`] reads by default.
pub const METADATA_FILE_NAME: &str = "functions.metadata";

/// One function as a provider reports it, before binding validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFunctionMetadata {
    /// Explicit id. The function name is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_id: Option<FunctionId>,
    /// Function name.
    pub name: String,
    /// Entry point reference.
    pub entry_point: String,
    /// Module or assembly holding the entry point.
    #[serde(default)]
    pub script_file: String,
    /// Whether the host proxies this function.
    #[serde(default)]
    pub is_proxy: bool,
    /// Bindings as JSON objects, or as strings containing JSON objects.
    #[serde(default)]
    pub raw_bindings: Vec<Value>,
}

impl RawFunctionMetadata {
    /// Validate the bindings and produce wire metadata.
    pub fn to_rpc(&self) -> Result<RpcFunctionMetadata, WorkerError> {
        if self.raw_bindings.is_empty() {
            return Err(WorkerError::Format(
                "At least one binding must be declared in a Function.".into(),
            ));
        }

        let bindings = self
            .raw_bindings
            .iter()
            .map(parse_binding)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RpcFunctionMetadata {
            function_id: Some(
                self.function_id
                    .clone()
                    .unwrap_or_else(|| FunctionId::new(self.name.clone())),
            ),
            name: self.name.clone(),
            entry_point: self.entry_point.clone(),
            script_file: self.script_file.clone(),
            bindings,
            is_proxy: self.is_proxy,
        })
    }
}

fn field<'a>(object: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    object
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value)
        .filter(|value| !value.is_null())
}

/// Parse one raw binding.
pub fn parse_binding(raw: &Value) -> Result<BindingDescriptor, WorkerError> {
    let parsed;
    let raw = match raw {
        Value::String(text) => {
            parsed = serde_json::from_str::<Value>(text)
                .map_err(|e| WorkerError::Format(format!("Binding is not valid JSON: {e}")))?;
            &parsed
        }
        other => other,
    };
    let Some(object) = raw.as_object() else {
        return Err(WorkerError::Format("Bindings must be JSON objects.".into()));
    };

    let direction = field(object, "direction")
        .and_then(Value::as_str)
        .and_then(|d| d.parse::<Direction>().ok());
    let binding_type = field(object, "type").and_then(Value::as_str);
    let (Some(direction), Some(binding_type)) = (direction, binding_type) else {
        return Err(WorkerError::Format("Bindings must declare a direction and type.".into()));
    };

    let Some(name) = field(object, "name").and_then(Value::as_str) else {
        return Err(WorkerError::Format("Bindings must declare a name.".into()));
    };

    let mut binding = BindingDescriptor::new(name, binding_type, direction);
    if let Some(data_type) = field(object, "dataType") {
        let shape = data_type
            .as_str()
            .and_then(|s| s.parse::<DataShape>().ok())
            .ok_or_else(|| WorkerError::Format("Invalid DataType for a binding.".into()))?;
        binding = binding.with_shape(shape);
    }

    Ok(binding)
}

/// Source of function metadata for the host's metadata request.
#[async_trait]
pub trait FunctionMetadataProvider: Send + Sync {
    /// List the functions found under `directory`.
    async fn get_function_metadata(&self, directory: &str) -> Result<Vec<RawFunctionMetadata>, WorkerError>;
}

/// Metadata fixed at startup, e.g. generated at build time.
#[derive(Debug, Clone, Default)]
pub struct StaticMetadataProvider {
    functions: Vec<RawFunctionMetadata>,
}

impl StaticMetadataProvider {
    /// Serve `functions` regardless of directory.
    pub fn new(functions: Vec<RawFunctionMetadata>) -> Self {
        Self { functions }
    }
}

#[async_trait]
impl FunctionMetadataProvider for StaticMetadataProvider {
    async fn get_function_metadata(&self, _directory: &str) -> Result<Vec<RawFunctionMetadata>, WorkerError> {
        Ok(self.functions.clone())
    }
}

/// Reads a JSON array of [`RawFunctionMetadata`] from a file in the
/// requested directory.
#[derive(Debug, Clone)]
pub struct FileMetadataProvider {
    file_name: String,
}

impl FileMetadataProvider {
    /// Read [`METADATA_FILE_NAME`].
    pub fn new() -> Self {
        Self::with_file_name(METADATA_FILE_NAME)
    }

    /// Read `file_name` instead.
    pub fn with_file_name(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }
}

impl Default for FileMetadataProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FunctionMetadataProvider for FileMetadataProvider {
    async fn get_function_metadata(&self, directory: &str) -> Result<Vec<RawFunctionMetadata>, WorkerError> {
        let path = Path::new(directory).join(&self.file_name);
        tracing::debug!(path = %path.display(), "reading function metadata");

        let text = tokio::fs::read_to_string(&path).await.map_err(|e| {
            WorkerError::Format(format!("cannot read function metadata from {}: {e}", path.display()))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            WorkerError::Format(format!("malformed function metadata in {}: {e}", path.display()))
        })
    }
}
