//! Handler-side binding values.

use crate::http::{HttpRequestData, HttpResponseData};
use fnworker_proto::{DataShape, WireValue};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A binding value after input conversion, or before output rendering.
///
/// `Custom` carries whatever a user converter produced; handlers get it
/// back with [`BindingValue::downcast_ref`].
#[derive(Clone, Default)]
pub enum BindingValue {
    /// No value was supplied for the binding.
    #[default]
    Absent,
    /// Text.
    String(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Structured JSON.
    Json(serde_json::Value),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Double(f64),
    /// A list of strings.
    StringList(Vec<String>),
    /// A list of byte blobs.
    BytesList(Vec<Vec<u8>>),
    /// An incoming HTTP request.
    HttpRequest(HttpRequestData),
    /// An HTTP response.
    HttpResponse(HttpResponseData),
    /// A value produced by a user converter.
    Custom(Arc<dyn Any + Send + Sync>),
}

impl BindingValue {
    /// Wrap a user value.
    pub fn custom<T: Any + Send + Sync>(value: T) -> Self {
        BindingValue::Custom(Arc::new(value))
    }

    /// Whether no value was supplied.
    pub fn is_absent(&self) -> bool {
        matches!(self, BindingValue::Absent)
    }

    /// Short name of the variant, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            BindingValue::Absent => "absent",
            BindingValue::String(_) => "string",
            BindingValue::Bytes(_) => "bytes",
            BindingValue::Json(_) => "json",
            BindingValue::Int(_) => "int",
            BindingValue::Double(_) => "double",
            BindingValue::StringList(_) => "string list",
            BindingValue::BytesList(_) => "bytes list",
            BindingValue::HttpRequest(_) => "http request",
            BindingValue::HttpResponse(_) => "http response",
            BindingValue::Custom(_) => "custom",
        }
    }

    /// Borrow as text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            BindingValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow as bytes.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            BindingValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Borrow as JSON.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            BindingValue::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Borrow as an HTTP request.
    pub fn as_http_request(&self) -> Option<&HttpRequestData> {
        match self {
            BindingValue::HttpRequest(r) => Some(r),
            _ => None,
        }
    }

    /// Borrow a custom value as `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            BindingValue::Custom(v) => v.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Render for the wire, honouring the binding's shape hint.
    ///
    /// Custom values have no wire form and are rejected.
    pub fn to_wire(&self, shape: Option<DataShape>) -> Result<WireValue, String> {
        let wire = match (self, shape) {
            (BindingValue::Absent, _) => WireValue::Null,
            (BindingValue::String(s), Some(DataShape::Binary | DataShape::Stream)) => {
                WireValue::Bytes(s.clone().into_bytes())
            }
            (BindingValue::String(s), _) => WireValue::String(s.clone()),
            (BindingValue::Bytes(b), Some(DataShape::String)) => WireValue::String(
                String::from_utf8(b.clone()).map_err(|e| format!("bytes are not utf-8: {e}"))?,
            ),
            (BindingValue::Bytes(b), _) => WireValue::Bytes(b.clone()),
            (BindingValue::Json(v), Some(DataShape::Binary | DataShape::Stream)) => {
                WireValue::Bytes(v.to_string().into_bytes())
            }
            (BindingValue::Json(v), Some(DataShape::String)) => WireValue::String(v.to_string()),
            (BindingValue::Json(v), _) => WireValue::json(v),
            (BindingValue::Int(i), _) => WireValue::Int(*i),
            (BindingValue::Double(d), _) => WireValue::Double(*d),
            (BindingValue::StringList(l), _) => WireValue::CollectionString(l.clone()),
            (BindingValue::BytesList(l), _) => WireValue::CollectionBytes(l.clone()),
            (BindingValue::HttpRequest(r), _) => WireValue::from(r.to_rpc()),
            (BindingValue::HttpResponse(r), _) => WireValue::from(r.to_rpc()),
            (BindingValue::Custom(_), _) => {
                return Err("custom values have no wire representation".into());
            }
        };
        Ok(wire)
    }
}

impl fmt::Debug for BindingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingValue::Absent => f.write_str("Absent"),
            BindingValue::String(s) => f.debug_tuple("String").field(s).finish(),
            BindingValue::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            BindingValue::Json(v) => f.debug_tuple("Json").field(v).finish(),
            BindingValue::Int(i) => f.debug_tuple("Int").field(i).finish(),
            BindingValue::Double(d) => f.debug_tuple("Double").field(d).finish(),
            BindingValue::StringList(l) => f.debug_tuple("StringList").field(l).finish(),
            BindingValue::BytesList(l) => f.debug_tuple("BytesList").field(&l.len()).finish(),
            BindingValue::HttpRequest(r) => f.debug_tuple("HttpRequest").field(r).finish(),
            BindingValue::HttpResponse(r) => f.debug_tuple("HttpResponse").field(r).finish(),
            BindingValue::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl From<&str> for BindingValue {
    fn from(s: &str) -> Self {
        BindingValue::String(s.to_owned())
    }
}

impl From<String> for BindingValue {
    fn from(s: String) -> Self {
        BindingValue::String(s)
    }
}

impl From<Vec<u8>> for BindingValue {
    fn from(b: Vec<u8>) -> Self {
        BindingValue::Bytes(b)
    }
}

impl From<serde_json::Value> for BindingValue {
    fn from(v: serde_json::Value) -> Self {
        BindingValue::Json(v)
    }
}

impl From<i64> for BindingValue {
    fn from(i: i64) -> Self {
        BindingValue::Int(i)
    }
}

impl From<f64> for BindingValue {
    fn from(d: f64) -> Self {
        BindingValue::Double(d)
    }
}

impl From<HttpResponseData> for BindingValue {
    fn from(r: HttpResponseData) -> Self {
        BindingValue::HttpResponse(r)
    }
}
