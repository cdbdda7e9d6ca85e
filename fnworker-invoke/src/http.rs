//! Typed HTTP payloads built from and rendered into [`RpcHttp`].

use fnworker_proto::{RpcHttp, WireValue};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

/// An HTTP request as seen by a handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpRequestData {
    /// Request method.
    pub method: String,
    /// Request URL.
    pub url: String,
    /// Request headers.
    pub headers: BTreeMap<String, String>,
    /// Query string parameters.
    pub query: BTreeMap<String, String>,
    /// Buffered body.
    pub body: Vec<u8>,
}

impl HttpRequestData {
    /// Build from the wire representation. Fails if the body is not a
    /// textual or binary value.
    pub fn from_rpc(rpc: &RpcHttp) -> Result<Self, String> {
        let body = match rpc.body.as_deref() {
            None | Some(WireValue::Null) => Vec::new(),
            Some(WireValue::String(s)) | Some(WireValue::Json(s)) => s.clone().into_bytes(),
            Some(WireValue::Bytes(b)) => b.clone(),
            Some(other) => return Err(format!("unsupported http body type '{}'", other.kind())),
        };

        Ok(Self {
            method: rpc.method.clone(),
            url: rpc.url.clone(),
            headers: rpc.headers.clone(),
            query: rpc.query.clone(),
            body,
        })
    }

    /// Get a header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get a query parameter by name.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(|s| s.as_str())
    }

    /// The body as UTF-8 text, if it is valid UTF-8.
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Start a response for this request.
    pub fn create_response(&self, status_code: u16) -> HttpResponseData {
        HttpResponseData::new(status_code)
    }

    /// Render back to the wire representation.
    pub fn to_rpc(&self) -> RpcHttp {
        RpcHttp {
            method: self.method.clone(),
            url: self.url.clone(),
            headers: self.headers.clone(),
            query: self.query.clone(),
            body: Some(Box::new(WireValue::Bytes(self.body.clone()))),
            status_code: None,
        }
    }
}

/// An HTTP response produced by a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponseData {
    /// Status code.
    pub status_code: u16,
    /// Response headers.
    pub headers: BTreeMap<String, String>,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponseData {
    /// An empty response with the given status.
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code,
            headers: BTreeMap::new(),
            body: Vec::new(),
        }
    }

    /// Append text to the body.
    pub fn write_string(&mut self, text: &str) {
        self.body.extend_from_slice(text.as_bytes());
    }

    /// Set a header, builder style.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// The body as UTF-8 text, if it is valid UTF-8.
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// Build from the wire representation.
    pub fn from_rpc(rpc: &RpcHttp) -> Result<Self, String> {
        let status_code = match rpc.status_code.as_deref() {
            None => 200,
            Some(code) => code
                .parse()
                .map_err(|_| format!("invalid http status code '{code}'"))?,
        };
        let request = HttpRequestData::from_rpc(rpc)?;
        Ok(Self {
            status_code,
            headers: request.headers,
            body: request.body,
        })
    }

    /// Render to the wire representation.
    pub fn to_rpc(&self) -> RpcHttp {
        RpcHttp {
            headers: self.headers.clone(),
            body: Some(Box::new(WireValue::Bytes(self.body.clone()))),
            status_code: Some(self.status_code.to_string()),
            ..RpcHttp::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rpc_request() -> RpcHttp {
        RpcHttp {
            method: "POST".into(),
            url: "https://example.test/api/orders".into(),
            headers: [("Content-Type".to_string(), "application/json".to_string())].into(),
            query: [("dryRun".to_string(), "true".to_string())].into(),
            body: Some(Box::new(WireValue::String(r#"{"qty":3}"#.into()))),
            status_code: None,
        }
    }

    #[test]
    fn headers_are_case_insensitive() {
        let req = HttpRequestData::from_rpc(&rpc_request()).unwrap();
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.query_param("dryRun"), Some("true"));
    }

    #[test]
    fn json_body_deserializes() {
        let req = HttpRequestData::from_rpc(&rpc_request()).unwrap();
        let body: serde_json::Value = req.json().unwrap();
        assert_eq!(body["qty"], 3);
    }

    #[test]
    fn unsupported_body_is_rejected() {
        let mut rpc = rpc_request();
        rpc.body = Some(Box::new(WireValue::Int(4)));
        let err = HttpRequestData::from_rpc(&rpc).unwrap_err();
        assert!(err.contains("int"));
    }

    #[test]
    fn response_renders_status_as_text() {
        let req = HttpRequestData::from_rpc(&rpc_request()).unwrap();
        let mut res = req.create_response(201);
        res.write_string("created");

        let rpc = res.to_rpc();
        assert_eq!(rpc.status_code.as_deref(), Some("201"));
        assert_eq!(rpc.body.as_deref(), Some(&WireValue::Bytes(b"created".to_vec())));

        let back = HttpResponseData::from_rpc(&rpc).unwrap();
        assert_eq!(back.body_str(), Some("created"));
    }
}
