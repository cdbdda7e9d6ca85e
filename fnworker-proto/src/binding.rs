//! Binding descriptors: the declared inputs and outputs of a function.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Name reserved for the binding that receives the handler's return value.
pub const RETURN_BINDING_NAME: &str = "$return";

/// A binding direction or data shape string that names no known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {what}: '{value}'")]
pub struct ParseEnumError {
    /// Which enum was being parsed.
    pub what: &'static str,
    /// The rejected input.
    pub value: String,
}

/// Which way a binding's data flows relative to the function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Direction {
    /// Host supplies the value.
    In,
    /// Function produces the value.
    Out,
    /// Host supplies a value and the function may replace it.
    InOut,
}

impl Direction {
    /// Whether the handler receives this binding as a parameter.
    pub fn is_input(self) -> bool {
        matches!(self, Direction::In | Direction::InOut)
    }

    /// Whether the output binder collects this binding.
    pub fn is_output(self) -> bool {
        matches!(self, Direction::Out | Direction::InOut)
    }
}

impl FromStr for Direction {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "in" => Ok(Direction::In),
            "out" => Ok(Direction::Out),
            "inout" => Ok(Direction::InOut),
            _ => Err(ParseEnumError {
                what: "binding direction",
                value: s.to_owned(),
            }),
        }
    }
}

impl TryFrom<String> for Direction {
    type Error = ParseEnumError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::In => "in",
            Direction::Out => "out",
            Direction::InOut => "inout",
        })
    }
}

/// Hint about the raw shape a binding expects, independent of its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum DataShape {
    /// No preference; use the value's natural shape.
    Undefined,
    /// Text.
    String,
    /// Raw bytes.
    Binary,
    /// Streamed bytes; buffered to bytes by this worker.
    Stream,
}

impl FromStr for DataShape {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "undefined" => Ok(DataShape::Undefined),
            "string" => Ok(DataShape::String),
            "binary" => Ok(DataShape::Binary),
            "stream" => Ok(DataShape::Stream),
            _ => Err(ParseEnumError {
                what: "binding data type",
                value: s.to_owned(),
            }),
        }
    }
}

impl TryFrom<String> for DataShape {
    type Error = ParseEnumError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for DataShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DataShape::Undefined => "undefined",
            DataShape::String => "string",
            DataShape::Binary => "binary",
            DataShape::Stream => "stream",
        })
    }
}

/// One declared binding of a function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingDescriptor {
    /// Binding name; matched against wire parameter names.
    pub name: String,
    /// Declared binding type (`httpTrigger`, `queue`, `blob`, ...).
    #[serde(rename = "type")]
    pub binding_type: String,
    /// Direction of the binding.
    pub direction: Direction,
    /// Optional shape hint.
    #[serde(default, rename = "dataType", skip_serializing_if = "Option::is_none")]
    pub data_shape: Option<DataShape>,
}

impl BindingDescriptor {
    /// Create a descriptor without a shape hint.
    pub fn new(name: impl Into<String>, binding_type: impl Into<String>, direction: Direction) -> Self {
        Self {
            name: name.into(),
            binding_type: binding_type.into(),
            direction,
            data_shape: None,
        }
    }

    /// Attach a data shape hint.
    pub fn with_shape(mut self, shape: DataShape) -> Self {
        self.data_shape = Some(shape);
        self
    }

    /// Whether this descriptor is the return-value binding.
    pub fn is_return(&self) -> bool {
        self.name == RETURN_BINDING_NAME
    }

    /// Whether the declared type is an HTTP type (`http`, `httpTrigger`).
    pub fn is_http(&self) -> bool {
        self.binding_type.to_ascii_lowercase().starts_with("http")
    }
}
