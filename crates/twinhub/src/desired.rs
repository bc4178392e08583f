use serde_json::Value;

use crate::error::{Error, ErrorKind, Result};
use crate::patch::PropertyPatch;
use crate::serializer::PayloadSerializer;

/// Key of the desired-properties version.
pub const VERSION_KEY: &str = "$version";

/// Key of the desired-properties metadata.
pub const METADATA_KEY: &str = "$metadata";

/// A desired-property set.
///
/// An immutable snapshot of the desired properties sent by the service,
/// along with the version the service assigned to it. Versions strictly
/// increase for a device.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredPropertySet {
    version: i64,
    entries: PropertyPatch,
}

impl DesiredPropertySet {
    /// Creates a [`DesiredPropertySet`].
    #[must_use]
    pub const fn new(version: i64, entries: PropertyPatch) -> Self {
        Self { version, entries }
    }

    /// Creates a [`DesiredPropertySet`] from a desired-properties document.
    ///
    /// The `$version` key becomes the set version, `$metadata` is discarded.
    ///
    /// # Errors
    ///
    /// The document is not an object or `$version` is missing or
    /// not an integer.
    pub fn from_value(value: Value) -> Result<Self> {
        let mut entries = PropertyPatch::from_value(value)?;

        let version = entries
            .remove(VERSION_KEY)
            .as_ref()
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::InvalidPatch,
                    "Desired properties without a valid `$version`",
                )
            })?;

        entries.remove(METADATA_KEY);

        Ok(Self { version, entries })
    }

    /// Creates a [`DesiredPropertySet`] from a twin document.
    ///
    /// Both `{"properties": {"desired": ...}}` and `{"desired": ...}` shapes
    /// are accepted.
    ///
    /// # Errors
    ///
    /// The document does not contain desired properties or they are not
    /// valid.
    pub fn from_twin(mut twin: Value) -> Result<Self> {
        let desired = twin
            .pointer_mut("/properties/desired")
            .map(Value::take)
            .or_else(|| twin.get_mut("desired").map(Value::take))
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::InvalidPatch,
                    "The twin document does not contain desired properties",
                )
            })?;

        Self::from_value(desired)
    }

    /// Parses a desired-properties payload with the given serializer.
    ///
    /// # Errors
    ///
    /// The payload is malformed or not a valid desired-properties document.
    pub fn from_payload<S: PayloadSerializer>(serializer: &S, payload: &str) -> Result<Self> {
        Self::from_value(serializer.deserialize(payload)?)
    }

    /// Returns the version assigned by the service.
    #[must_use]
    pub const fn version(&self) -> i64 {
        self.version
    }

    /// Returns the desired entries.
    #[must_use]
    pub const fn entries(&self) -> &PropertyPatch {
        &self.entries
    }

    /// Returns the value of a desired property.
    #[must_use]
    #[inline]
    pub fn property(&self, name: &str, component: Option<&str>) -> Option<&Value> {
        self.entries.property(name, component)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::error::ErrorKind;
    use crate::serializer::CompactJson;

    use super::DesiredPropertySet;

    #[test]
    fn desired_document() {
        let desired = DesiredPropertySet::from_value(json!({
            "thermostat1": {
                "__t": "c",
                "targetTemperature": 22,
            },
            "$version": 7,
            "$metadata": {"$lastUpdated": "2021-04-12T10:00:00Z"},
        }))
        .unwrap();

        assert_eq!(desired.version(), 7);
        assert_eq!(desired.entries().len(), 1);
        assert_eq!(
            desired.property("targetTemperature", Some("thermostat1")),
            Some(&json!(22))
        );
    }

    #[test]
    fn twin_document() {
        let twin = json!({
            "deviceId": "device1",
            "properties": {
                "desired": {"fanSpeed": 3, "$version": 12},
                "reported": {"fanSpeed": 2, "$version": 40},
            },
        });
        let desired = DesiredPropertySet::from_twin(twin).unwrap();
        assert_eq!(desired.version(), 12);
        assert_eq!(desired.property("fanSpeed", None), Some(&json!(3)));

        let desired = DesiredPropertySet::from_twin(json!({
            "desired": {"fanSpeed": 1, "$version": 2},
        }))
        .unwrap();
        assert_eq!(desired.version(), 2);

        assert_eq!(
            DesiredPropertySet::from_twin(json!({"reported": {}}))
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidPatch
        );
    }

    #[test]
    fn missing_version() {
        for document in [json!({"fanSpeed": 3}), json!({"$version": "7"}), json!(3)] {
            assert_eq!(
                DesiredPropertySet::from_value(document).unwrap_err().kind(),
                ErrorKind::InvalidPatch
            );
        }
    }

    #[test]
    fn desired_payload() {
        let desired = DesiredPropertySet::from_payload(
            &CompactJson,
            r#"{"brightness": 80, "$version": 4}"#,
        )
        .unwrap();
        assert_eq!(desired.version(), 4);

        assert_eq!(
            DesiredPropertySet::from_payload(&CompactJson, "{")
                .unwrap_err()
                .kind(),
            ErrorKind::Deserialization
        );
    }
}
