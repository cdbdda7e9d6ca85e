//! Handler registry: register, resolve, and locate entry points.

use crate::definition::FunctionDefinition;
use crate::handler::{FunctionHandler, Signature};
use fnworker_proto::{FunctionId, WorkerError};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Resolves an entry point reference to a callable.
pub trait EntryPointLocator: Send + Sync {
    /// Find the handler for `entry_point` inside `script_file`.
    fn locate(&self, script_file: &str, entry_point: &str) -> Result<Arc<dyn FunctionHandler>, WorkerError>;
}

/// Entry points registered by application code at startup.
///
/// Keys are the full entry point reference (`"Namespace.Type.Method"`);
/// the script file is ignored.
#[derive(Default, Clone)]
pub struct HandlerCatalog {
    handlers: HashMap<String, Arc<dyn FunctionHandler>>,
}

impl HandlerCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler under `entry_point`.
    pub fn register(&mut self, entry_point: impl Into<String>, handler: impl FunctionHandler + 'static) -> &mut Self {
        self.handlers.insert(entry_point.into(), Arc::new(handler));
        self
    }

    /// Add a handler, builder style.
    pub fn with(mut self, entry_point: impl Into<String>, handler: impl FunctionHandler + 'static) -> Self {
        self.register(entry_point, handler);
        self
    }

    /// Add an already shared handler.
    pub fn register_dyn(&mut self, entry_point: impl Into<String>, handler: Arc<dyn FunctionHandler>) -> &mut Self {
        self.handlers.insert(entry_point.into(), handler);
        self
    }

    /// Number of entry points.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entry_points: Vec<_> = self.handlers.keys().collect();
        entry_points.sort();
        f.debug_struct("HandlerCatalog")
            .field("entry_points", &entry_points)
            .finish()
    }
}

impl EntryPointLocator for HandlerCatalog {
    fn locate(&self, _script_file: &str, entry_point: &str) -> Result<Arc<dyn FunctionHandler>, WorkerError> {
        self.handlers
            .get(entry_point)
            .cloned()
            .ok_or_else(|| WorkerError::InvalidDefinition {
                function: entry_point.to_string(),
                reason: format!("entry point '{entry_point}' could not be resolved"),
            })
    }
}

/// A function together with its resolved entry point.
#[derive(Clone)]
pub struct RegisteredFunction {
    /// The validated definition.
    pub definition: Arc<FunctionDefinition>,
    /// The resolved handler.
    pub handler: Arc<dyn FunctionHandler>,
}

impl fmt::Debug for RegisteredFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredFunction")
            .field("definition", &self.definition)
            .field("signature", self.handler.signature())
            .finish()
    }
}

/// Check that `signature` can serve `definition`: one parameter per
/// input binding, in the same positions, and a return value when a
/// return binding is declared. Parameter names match binding names
/// ignoring ASCII case, the same rule binding names are unique under.
pub fn check_signature(definition: &FunctionDefinition, signature: &Signature) -> Result<(), WorkerError> {
    let invalid = |reason: String| WorkerError::InvalidDefinition {
        function: definition.id.to_string(),
        reason,
    };

    if signature.parameters.len() != definition.parameters.len() {
        return Err(invalid(format!(
            "entry point '{}' takes {} parameter(s) but {} input binding(s) are declared",
            definition.entry_point,
            signature.parameters.len(),
            definition.parameters.len()
        )));
    }

    for (position, (parameter, binding)) in signature.parameters.iter().zip(&definition.parameters).enumerate() {
        if !parameter.eq_ignore_ascii_case(&binding.name) {
            return Err(invalid(format!(
                "parameter {position} of '{}' is '{parameter}' but binding '{}' is declared there",
                definition.entry_point, binding.name
            )));
        }
    }

    if definition.return_binding.is_some() && !signature.returns {
        return Err(invalid(format!(
            "a return binding is declared but '{}' returns nothing",
            definition.entry_point
        )));
    }

    Ok(())
}

/// Function id to registered function, for the life of the worker.
///
/// Lookups are read-mostly; writes only happen while loading functions.
#[derive(Default)]
pub struct HandlerRegistry {
    functions: RwLock<HashMap<FunctionId, RegisteredFunction>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the entry point through `locator`, check it against the
    /// declared bindings, and cache it next to the definition.
    pub fn register(
        &self,
        definition: FunctionDefinition,
        locator: &dyn EntryPointLocator,
    ) -> Result<RegisteredFunction, WorkerError> {
        if self.contains(&definition.id) {
            return Err(WorkerError::DuplicateDefinition(definition.id.to_string()));
        }

        let handler = locator.locate(&definition.script_file, &definition.entry_point)?;
        check_signature(&definition, handler.signature())?;

        let registered = RegisteredFunction {
            definition: Arc::new(definition),
            handler,
        };

        let mut functions = self.functions.write().unwrap_or_else(PoisonError::into_inner);
        match functions.entry(registered.definition.id.clone()) {
            Entry::Occupied(entry) => Err(WorkerError::DuplicateDefinition(entry.key().to_string())),
            Entry::Vacant(entry) => {
                entry.insert(registered.clone());
                Ok(registered)
            }
        }
    }

    /// Look up a registered function.
    pub fn resolve(&self, id: &FunctionId) -> Result<RegisteredFunction, WorkerError> {
        self.functions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| WorkerError::NotFound(id.to_string()))
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &FunctionId) -> bool {
        self.functions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// Ids of every registered function, sorted.
    pub fn ids(&self) -> Vec<FunctionId> {
        let mut ids: Vec<_> = self
            .functions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Number of registered functions.
    pub fn len(&self) -> usize {
        self.functions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("functions", &self.ids())
            .finish()
    }
}
