//! BACnet object model
//!
//! Object identities, registered object metadata, present values and read results.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ReaderError;

/// BACnet object types supported by the reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ObjectType {
    AnalogInput,
    AnalogOutput,
    AnalogValue,
    BinaryInput,
    BinaryOutput,
    BinaryValue,
    MultiStateInput,
    MultiStateOutput,
    MultiStateValue,
    StringValue,
    Device,
}

impl ObjectType {
    pub const ALL: [ObjectType; 11] = [
        ObjectType::AnalogInput,
        ObjectType::AnalogOutput,
        ObjectType::AnalogValue,
        ObjectType::BinaryInput,
        ObjectType::BinaryOutput,
        ObjectType::BinaryValue,
        ObjectType::MultiStateInput,
        ObjectType::MultiStateOutput,
        ObjectType::MultiStateValue,
        ObjectType::StringValue,
        ObjectType::Device,
    ];

    /// Canonical BACnet name (e.g. "analogInput")
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::AnalogInput => "analogInput",
            ObjectType::AnalogOutput => "analogOutput",
            ObjectType::AnalogValue => "analogValue",
            ObjectType::BinaryInput => "binaryInput",
            ObjectType::BinaryOutput => "binaryOutput",
            ObjectType::BinaryValue => "binaryValue",
            ObjectType::MultiStateInput => "multiStateInput",
            ObjectType::MultiStateOutput => "multiStateOutput",
            ObjectType::MultiStateValue => "multiStateValue",
            ObjectType::StringValue => "stringValue",
            ObjectType::Device => "device",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = ReaderError;

    /// Accepts "analogInput", "analog-input", "analog_input" and any casing
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();

        ObjectType::ALL
            .into_iter()
            .find(|t| t.as_str().to_ascii_lowercase() == normalized)
            .ok_or_else(|| ReaderError::Config(format!("Unknown object type: {}", s)))
    }
}

/// Object identity: type + instance number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectIdentity {
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    pub instance: u32,
}

impl ObjectIdentity {
    pub fn new(object_type: ObjectType, instance: u32) -> Self {
        Self {
            object_type,
            instance,
        }
    }

    /// Registry key, e.g. "analogInput_1"
    pub fn key(&self) -> String {
        format!("{}_{}", self.object_type, self.instance)
    }
}

impl fmt::Display for ObjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_type, self.instance)
    }
}

/// A registered BACnet object (point) and its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacnetObject {
    #[serde(flatten)]
    pub identity: ObjectIdentity,
    /// Human-readable name
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Engineering unit (e.g. "degC")
    #[serde(default)]
    pub unit: String,
    /// Extra properties carried through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, serde_json::Value>>,
}

impl BacnetObject {
    pub fn new(
        object_type: ObjectType,
        instance: u32,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            identity: ObjectIdentity::new(object_type, instance),
            name: name.into(),
            description: description.into(),
            unit: String::new(),
            properties: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value);
        self
    }

    /// Registry key derived from the identity
    pub fn key(&self) -> String {
        self.identity.key()
    }
}

/// Present value of an object, as seen by callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PresentValue {
    Number(f64),
    Boolean(bool),
    Text(String),
}

impl fmt::Display for PresentValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresentValue::Number(n) => write!(f, "{}", n),
            PresentValue::Boolean(b) => write!(f, "{}", b),
            PresentValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for PresentValue {
    fn from(value: f64) -> Self {
        PresentValue::Number(value)
    }
}

impl From<f32> for PresentValue {
    fn from(value: f32) -> Self {
        PresentValue::Number(f64::from(value))
    }
}

impl From<i32> for PresentValue {
    fn from(value: i32) -> Self {
        PresentValue::Number(f64::from(value))
    }
}

impl From<u32> for PresentValue {
    fn from(value: u32) -> Self {
        PresentValue::Number(f64::from(value))
    }
}

impl From<bool> for PresentValue {
    fn from(value: bool) -> Self {
        PresentValue::Boolean(value)
    }
}

impl From<String> for PresentValue {
    fn from(value: String) -> Self {
        PresentValue::Text(value)
    }
}

impl From<&str> for PresentValue {
    fn from(value: &str) -> Self {
        PresentValue::Text(value.to_string())
    }
}

/// Coerce an untyped JSON value. Only numbers, booleans and strings convert.
impl TryFrom<serde_json::Value> for PresentValue {
    type Error = ReaderError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Number(n) => n.as_f64().map(PresentValue::Number).ok_or_else(|| {
                ReaderError::TypeConversion(format!("Number {} is not representable as real", n))
            }),
            serde_json::Value::Bool(b) => Ok(PresentValue::Boolean(b)),
            serde_json::Value::String(s) => Ok(PresentValue::Text(s)),
            other => Err(ReaderError::TypeConversion(format!(
                "Cannot write {} as a present value",
                other
            ))),
        }
    }
}

/// Read result quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Good,
    Failed,
}

/// Result of a successful object read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadResult {
    pub value: PresentValue,
    pub unit: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub quality: Quality,
}

impl ReadResult {
    /// Wrap a freshly read value with the object's metadata
    pub fn good(object: &BacnetObject, value: PresentValue) -> Self {
        Self {
            value,
            unit: object.unit.clone(),
            description: object.description.clone(),
            timestamp: Utc::now(),
            quality: Quality::Good,
        }
    }
}
