//! Input conversion: wire values to the values handlers receive.
//!
//! Conversion is an ordered chain. An exact-shape fast path runs first,
//! then user converters registered for the binding's type (or for every
//! type) in registration order, then the built-in converters. The first
//! converter that produces a value wins; a converter that fails ends the
//! chain.

use crate::http::HttpRequestData;
use crate::value::BindingValue;
use fnworker_proto::{BindingDescriptor, DataShape, FunctionId, InvocationId, WireValue, WorkerError};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// What a binding wants its value converted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionTarget {
    /// Raw bytes.
    Bytes,
    /// Text.
    String,
    /// An HTTP request.
    Http,
    /// Whatever the wire value naturally is.
    Natural,
}

impl ConversionTarget {
    /// Derive the target from a descriptor. The shape hint wins over the
    /// declared type.
    pub fn for_binding(binding: &BindingDescriptor) -> Self {
        match binding.data_shape {
            Some(DataShape::Binary | DataShape::Stream) => ConversionTarget::Bytes,
            Some(DataShape::String) => ConversionTarget::String,
            _ if binding.is_http() => ConversionTarget::Http,
            _ => ConversionTarget::Natural,
        }
    }

    /// Name used in conversion failures.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversionTarget::Bytes => "bytes",
            ConversionTarget::String => "string",
            ConversionTarget::Http => "http request",
            ConversionTarget::Natural => "any",
        }
    }
}

impl fmt::Display for ConversionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view of the invocation handed to converters.
#[derive(Debug, Clone, Copy)]
pub struct ConversionContext<'a> {
    /// Invocation being converted.
    pub invocation_id: &'a InvocationId,
    /// Function the invocation targets.
    pub function_id: &'a FunctionId,
    /// Trigger metadata sent with the request.
    pub trigger_metadata: &'a BTreeMap<String, WireValue>,
}

/// Outcome of a single converter.
#[derive(Debug, Clone)]
pub enum ConversionResult {
    /// The converter produced a value.
    Converted(BindingValue),
    /// The converter does not handle this input; try the next one.
    Unhandled,
    /// The converter recognised the input but could not convert it.
    Failed(String),
}

/// A user-pluggable converter.
pub trait InputConverter: Send + Sync {
    /// Attempt to convert `raw` for `binding`.
    fn try_convert(
        &self,
        raw: &WireValue,
        binding: &BindingDescriptor,
        ctx: &ConversionContext<'_>,
    ) -> ConversionResult;
}

struct Registration {
    binding_type: Option<String>,
    converter: Arc<dyn InputConverter>,
}

/// User converters in registration order.
#[derive(Default)]
pub struct ConverterRegistry {
    converters: Vec<Registration>,
}

impl ConverterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a converter for bindings of `binding_type` (matched
    /// case-insensitively).
    pub fn register(&mut self, binding_type: impl Into<String>, converter: impl InputConverter + 'static) {
        self.converters.push(Registration {
            binding_type: Some(binding_type.into()),
            converter: Arc::new(converter),
        });
    }

    /// Register a converter consulted for every binding type.
    pub fn register_any(&mut self, converter: impl InputConverter + 'static) {
        self.converters.push(Registration {
            binding_type: None,
            converter: Arc::new(converter),
        });
    }

    /// Converters applicable to `binding_type`, in registration order.
    pub fn matching<'a>(&'a self, binding_type: &'a str) -> impl Iterator<Item = &'a dyn InputConverter> + 'a {
        self.converters
            .iter()
            .filter(move |r| {
                r.binding_type
                    .as_deref()
                    .is_none_or(|t| t.eq_ignore_ascii_case(binding_type))
            })
            .map(|r| r.converter.as_ref())
    }

    /// Number of registered converters.
    pub fn len(&self) -> usize {
        self.converters.len()
    }

    /// Whether no converter is registered.
    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("converters", &self.converters.len())
            .finish()
    }
}

/// The conversion capability the dispatcher resolves from each
/// invocation's feature store.
pub trait InputConversion: Send + Sync {
    /// Convert one declared input binding.
    fn convert_input(
        &self,
        raw: &WireValue,
        binding: &BindingDescriptor,
        ctx: &ConversionContext<'_>,
    ) -> Result<BindingValue, WorkerError>;
}

/// Fast path, then user converters, then built-ins.
#[derive(Debug, Default, Clone)]
pub struct DefaultInputConversion {
    converters: Arc<ConverterRegistry>,
}

impl DefaultInputConversion {
    /// Conversion backed by `converters`.
    pub fn new(converters: Arc<ConverterRegistry>) -> Self {
        Self { converters }
    }
}

impl InputConversion for DefaultInputConversion {
    fn convert_input(
        &self,
        raw: &WireValue,
        binding: &BindingDescriptor,
        ctx: &ConversionContext<'_>,
    ) -> Result<BindingValue, WorkerError> {
        let target = ConversionTarget::for_binding(binding);
        let failure = |reason: String| WorkerError::ConversionFailure {
            binding: binding.name.clone(),
            target_type: target.to_string(),
            reason,
        };

        if let Some(value) = fast_path(raw, target) {
            return Ok(value);
        }

        for converter in self.converters.matching(&binding.binding_type) {
            match converter.try_convert(raw, binding, ctx) {
                ConversionResult::Converted(value) => return Ok(value),
                ConversionResult::Unhandled => continue,
                ConversionResult::Failed(reason) => return Err(failure(reason)),
            }
        }

        match builtin(raw, target) {
            ConversionResult::Converted(value) => Ok(value),
            ConversionResult::Failed(reason) => Err(failure(reason)),
            ConversionResult::Unhandled => Err(failure(format!(
                "no converter handles a {} value",
                raw.kind()
            ))),
        }
    }
}

fn fast_path(raw: &WireValue, target: ConversionTarget) -> Option<BindingValue> {
    match (raw, target) {
        (WireValue::Bytes(b), ConversionTarget::Bytes) => Some(BindingValue::Bytes(b.clone())),
        (WireValue::String(s), ConversionTarget::String) => Some(BindingValue::String(s.clone())),
        _ => None,
    }
}

fn builtin(raw: &WireValue, target: ConversionTarget) -> ConversionResult {
    use ConversionResult::*;

    if raw.is_null() {
        return Converted(BindingValue::Absent);
    }

    match target {
        ConversionTarget::Bytes => match raw {
            WireValue::Bytes(b) => Converted(BindingValue::Bytes(b.clone())),
            WireValue::String(s) | WireValue::Json(s) => Converted(BindingValue::Bytes(s.clone().into_bytes())),
            _ => Unhandled,
        },
        ConversionTarget::String => match raw {
            WireValue::String(s) | WireValue::Json(s) => Converted(BindingValue::String(s.clone())),
            WireValue::Bytes(b) => match String::from_utf8(b.clone()) {
                Ok(s) => Converted(BindingValue::String(s)),
                Err(e) => Failed(format!("bytes are not utf-8: {e}")),
            },
            WireValue::Int(i) => Converted(BindingValue::String(i.to_string())),
            WireValue::Double(d) => Converted(BindingValue::String(d.to_string())),
            _ => Unhandled,
        },
        ConversionTarget::Http => match raw {
            WireValue::Http(rpc) => match HttpRequestData::from_rpc(rpc) {
                Ok(request) => Converted(BindingValue::HttpRequest(request)),
                Err(reason) => Failed(reason),
            },
            _ => Unhandled,
        },
        ConversionTarget::Natural => match raw {
            WireValue::String(s) => Converted(BindingValue::String(s.clone())),
            WireValue::Json(text) => match serde_json::from_str(text) {
                Ok(value) => Converted(BindingValue::Json(value)),
                Err(e) => Failed(format!("invalid json: {e}")),
            },
            WireValue::Bytes(b) => Converted(BindingValue::Bytes(b.clone())),
            WireValue::Int(i) => Converted(BindingValue::Int(*i)),
            WireValue::Double(d) => Converted(BindingValue::Double(*d)),
            WireValue::Http(rpc) => match HttpRequestData::from_rpc(rpc) {
                Ok(request) => Converted(BindingValue::HttpRequest(request)),
                Err(reason) => Failed(reason),
            },
            WireValue::CollectionString(l) => Converted(BindingValue::StringList(l.clone())),
            WireValue::CollectionBytes(l) => Converted(BindingValue::BytesList(l.clone())),
            _ => Unhandled,
        },
    }
}
