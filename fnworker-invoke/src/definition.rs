//! Function definitions built from load requests.

use fnworker_proto::{BindingDescriptor, FunctionId, FunctionLoadRequest, WorkerError};
use std::collections::HashSet;

/// An immutable, validated view of one loaded function.
///
/// Bindings are split by role: `parameters` are the in / in-out bindings
/// in declared order (the handler's arguments), `outputs` are the out /
/// in-out bindings the output binder collects, and `return_binding` is
/// the `$return` binding if one was declared.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDefinition {
    /// Host-assigned identifier.
    pub id: FunctionId,
    /// Function name.
    pub name: String,
    /// Entry point reference (`"Namespace.Type.Method"`).
    pub entry_point: String,
    /// Assembly or module the entry point lives in.
    pub script_file: String,
    /// Input bindings in declared order.
    pub parameters: Vec<BindingDescriptor>,
    /// Output bindings, excluding the return binding.
    pub outputs: Vec<BindingDescriptor>,
    /// The `$return` binding.
    pub return_binding: Option<BindingDescriptor>,
}

impl FunctionDefinition {
    /// Build a definition from loose parts, validating the bindings.
    pub fn new(
        id: impl Into<FunctionId>,
        name: impl Into<String>,
        entry_point: impl Into<String>,
        bindings: Vec<BindingDescriptor>,
    ) -> Result<Self, WorkerError> {
        let id = id.into();
        let mut seen = HashSet::new();
        let mut parameters = Vec::new();
        let mut outputs = Vec::new();
        let mut return_binding = None;

        for binding in bindings {
            if !seen.insert(binding.name.to_ascii_lowercase()) {
                return Err(WorkerError::InvalidDefinition {
                    function: id.to_string(),
                    reason: format!("binding '{}' is declared more than once", binding.name),
                });
            }

            if binding.is_return() {
                if !binding.direction.is_output() || binding.direction.is_input() {
                    return Err(WorkerError::InvalidDefinition {
                        function: id.to_string(),
                        reason: format!("the '{}' binding must have direction out", binding.name),
                    });
                }
                return_binding = Some(binding);
                continue;
            }

            if binding.direction.is_input() {
                parameters.push(binding.clone());
            }
            if binding.direction.is_output() {
                outputs.push(binding);
            }
        }

        Ok(Self {
            id,
            name: name.into(),
            entry_point: entry_point.into(),
            script_file: String::new(),
            parameters,
            outputs,
            return_binding,
        })
    }

    /// Build a definition from a load request.
    pub fn from_load(request: &FunctionLoadRequest) -> Result<Self, WorkerError> {
        let metadata = &request.metadata;
        let mut definition = Self::new(
            request.function_id.clone(),
            metadata.name.clone(),
            metadata.entry_point.clone(),
            metadata.bindings.clone(),
        )?;
        definition.script_file = metadata.script_file.clone();
        Ok(definition)
    }

    /// Set the script file, builder style.
    pub fn with_script_file(mut self, script_file: impl Into<String>) -> Self {
        self.script_file = script_file.into();
        self
    }

    /// Look up a declared binding by name, across every role.
    pub fn binding(&self, name: &str) -> Option<&BindingDescriptor> {
        self.parameters
            .iter()
            .chain(&self.outputs)
            .chain(&self.return_binding)
            .find(|b| b.name == name)
    }
}
