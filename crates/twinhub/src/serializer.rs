use alloc::format;
use alloc::string::String;

use serde::Serialize;
use serde::de::DeserializeOwned;

use serde_json::Value;

use crate::error::{Error, ErrorKind, Result};

/// Content type of every `JSON` payload.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Default payload encoding.
pub const UTF8_ENCODING: &str = "utf-8";

/// A payload serializer.
///
/// Devices and the registry choose one serializer at construction time and
/// use it for every payload. Implementations must preserve round-trip
/// fidelity: deserializing a serialized value returns the same value.
pub trait PayloadSerializer: Send + Sync {
    /// Returns the content type of the produced payloads.
    fn content_type(&self) -> &'static str;

    /// Returns the content encoding of the produced payloads.
    fn content_encoding(&self) -> &'static str {
        UTF8_ENCODING
    }

    /// Serializes a value into a payload.
    ///
    /// # Errors
    ///
    /// The value cannot be represented by the serializer.
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<String>;

    /// Deserializes a payload into a value.
    ///
    /// # Errors
    ///
    /// The payload is malformed or does not match the shape of `T`.
    fn deserialize<T: DeserializeOwned>(&self, payload: &str) -> Result<T>;

    /// Converts a value into its wire-level [`Value`] representation.
    ///
    /// # Errors
    ///
    /// The value cannot be serialized.
    fn to_value<T: Serialize + ?Sized>(&self, value: &T) -> Result<Value> {
        self.deserialize(&self.serialize(value)?)
    }

    /// Converts a wire-level [`Value`] into a typed value.
    ///
    /// # Errors
    ///
    /// The value does not match the shape of `T`.
    fn from_value<T: DeserializeOwned>(&self, value: &Value) -> Result<T> {
        self.deserialize(&self.serialize(value)?)
    }
}

fn serialization_error(e: &serde_json::Error) -> Error {
    Error::new(
        ErrorKind::Serialization,
        format!("Unable to serialize value: {e}"),
    )
}

fn deserialization_error(e: &serde_json::Error) -> Error {
    Error::new(
        ErrorKind::Deserialization,
        format!("Unable to deserialize payload: {e}"),
    )
}

// Removes every `null` object field, at any depth.
//
// Array elements are kept as they are, otherwise positions would shift.
fn strip_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, field| !field.is_null());
            for field in map.values_mut() {
                strip_nulls(field);
            }
        }
        Value::Array(items) => {
            for item in items {
                strip_nulls(item);
            }
        }
        _ => {}
    }
}

/// A `JSON` serializer omitting `null` object fields.
///
/// Optional fields which are not set disappear from the payload and are
/// restored as [`None`] when deserializing.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CompactJson;

impl PayloadSerializer for CompactJson {
    fn content_type(&self) -> &'static str {
        JSON_CONTENT_TYPE
    }

    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        let mut value = serde_json::to_value(value).map_err(|e| serialization_error(&e))?;
        strip_nulls(&mut value);
        serde_json::to_string(&value).map_err(|e| serialization_error(&e))
    }

    fn deserialize<T: DeserializeOwned>(&self, payload: &str) -> Result<T> {
        serde_json::from_str(payload).map_err(|e| deserialization_error(&e))
    }
}

/// A `JSON` serializer which always emits `null` fields.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VerboseJson;

impl PayloadSerializer for VerboseJson {
    fn content_type(&self) -> &'static str {
        JSON_CONTENT_TYPE
    }

    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        serde_json::to_string(value).map_err(|e| serialization_error(&e))
    }

    fn deserialize<T: DeserializeOwned>(&self, payload: &str) -> Result<T> {
        serde_json::from_str(payload).map_err(|e| deserialization_error(&e))
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use alloc::vec;
    use alloc::vec::Vec;

    use serde::{Deserialize, Serialize};
    use serde_json::{Value, json};

    use crate::error::ErrorKind;

    use super::{CompactJson, PayloadSerializer, VerboseJson};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Range {
        min: f64,
        max: f64,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Thermostat {
        name: String,
        target: Option<f64>,
        range: Range,
        history: Vec<Option<i32>>,
        #[serde(default)]
        enabled: bool,
    }

    fn thermostats() -> [Thermostat; 2] {
        [
            Thermostat {
                name: "thermostat1".into(),
                target: Some(21.5),
                range: Range { min: 10., max: 30. },
                history: vec![Some(1), None, Some(3)],
                enabled: true,
            },
            Thermostat {
                name: "thermostat2".into(),
                target: None,
                range: Range { min: -5., max: 5. },
                history: Vec::new(),
                enabled: false,
            },
        ]
    }

    fn round_trip<S: PayloadSerializer>(serializer: &S) {
        for thermostat in thermostats() {
            let payload = serializer.serialize(&thermostat).unwrap();
            assert_eq!(
                serializer.deserialize::<Thermostat>(&payload).unwrap(),
                thermostat
            );
        }

        let payload = serializer.serialize(&42_u32).unwrap();
        assert_eq!(serializer.deserialize::<u32>(&payload).unwrap(), 42);

        let payload = serializer.serialize("a string").unwrap();
        assert_eq!(
            serializer.deserialize::<String>(&payload).unwrap(),
            "a string"
        );

        let payload = serializer.serialize(&Option::<u8>::None).unwrap();
        assert_eq!(serializer.deserialize::<Option<u8>>(&payload).unwrap(), None);

        let nested = json!({"a": {"b": [1, {"c": true}]}});
        let payload = serializer.serialize(&nested).unwrap();
        assert_eq!(serializer.deserialize::<Value>(&payload).unwrap(), nested);
    }

    #[test]
    fn compact_round_trip() {
        round_trip(&CompactJson);
    }

    #[test]
    fn verbose_round_trip() {
        round_trip(&VerboseJson);
    }

    #[test]
    fn compact_omits_nulls() {
        let [_, thermostat] = thermostats();

        let compact: Value = serde_json::from_str(&CompactJson.serialize(&thermostat).unwrap())
            .unwrap();
        assert!(compact.get("target").is_none());

        let verbose: Value = serde_json::from_str(&VerboseJson.serialize(&thermostat).unwrap())
            .unwrap();
        assert_eq!(verbose.get("target"), Some(&Value::Null));

        // Nulls inside arrays keep their position.
        let history = json!({"history": [1, null, 3]});
        assert_eq!(CompactJson.to_value(&history).unwrap(), history);
    }

    #[test]
    fn malformed_payload() {
        let error = CompactJson.deserialize::<Range>("{\"min\": 1").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Deserialization);

        let error = VerboseJson
            .from_value::<Range>(&json!({"min": "low", "max": 1}))
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Deserialization);
    }
}
