//! Wire-level values exchanged with the host.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A typed datum as it travels over the protocol, before input
/// conversion or after output rendering.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum WireValue {
    /// No value was supplied.
    Null,
    /// Plain text.
    String(String),
    /// JSON document carried as text.
    Json(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Double(f64),
    /// An HTTP request or response.
    Http(Box<RpcHttp>),
    /// A list of strings.
    CollectionString(Vec<String>),
    /// A list of byte blobs.
    CollectionBytes(Vec<Vec<u8>>),
}

impl WireValue {
    /// Short name of the wire representation, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            WireValue::Null => "null",
            WireValue::String(_) => "string",
            WireValue::Json(_) => "json",
            WireValue::Bytes(_) => "bytes",
            WireValue::Int(_) => "int",
            WireValue::Double(_) => "double",
            WireValue::Http(_) => "http",
            WireValue::CollectionString(_) => "collectionString",
            WireValue::CollectionBytes(_) => "collectionBytes",
        }
    }

    /// Whether this is [`WireValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, WireValue::Null)
    }

    /// Create a JSON value from any serializable document.
    pub fn json(value: &serde_json::Value) -> Self {
        WireValue::Json(value.to_string())
    }
}

impl From<&str> for WireValue {
    fn from(s: &str) -> Self {
        WireValue::String(s.to_owned())
    }
}

impl From<String> for WireValue {
    fn from(s: String) -> Self {
        WireValue::String(s)
    }
}

impl From<Vec<u8>> for WireValue {
    fn from(b: Vec<u8>) -> Self {
        WireValue::Bytes(b)
    }
}

impl From<RpcHttp> for WireValue {
    fn from(h: RpcHttp) -> Self {
        WireValue::Http(Box::new(h))
    }
}

/// HTTP payload on the wire. Requests carry `method`/`url`; responses
/// carry `status_code`. Both may carry headers and a body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcHttp {
    /// Request method (`GET`, `POST`, ...). Empty on responses.
    #[serde(default)]
    pub method: String,
    /// Request URL. Empty on responses.
    #[serde(default)]
    pub url: String,
    /// Header map. Keys are compared case-insensitively by consumers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Query string parameters.
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    /// Body, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Box<WireValue>>,
    /// Response status code as text (`"200"`). `None` on requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<String>,
}

/// A named wire value: one input or one output binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterBinding {
    /// Binding name as declared in the function metadata.
    pub name: String,
    /// The value.
    pub data: WireValue,
}

impl ParameterBinding {
    /// Create a new binding.
    pub fn new(name: impl Into<String>, data: impl Into<WireValue>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}
