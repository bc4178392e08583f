use serde::Serialize;

use twinhub::serializer::PayloadSerializer;

use crate::error::Result;

/// Message property naming the component which sent a telemetry message.
pub const COMPONENT_PROPERTY: &str = "$.sub";

/// A telemetry message sent by a device.
///
/// The payload is serialized once, when the message is created, by the
/// serializer the device has been configured with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryMessage {
    payload: String,
    content_type: &'static str,
    content_encoding: &'static str,
    properties: Vec<(String, String)>,
}

impl TelemetryMessage {
    /// Creates a [`TelemetryMessage`] sent by the root interface.
    ///
    /// # Errors
    ///
    /// The telemetry cannot be serialized.
    pub fn new<S, T>(serializer: &S, telemetry: &T) -> Result<Self>
    where
        S: PayloadSerializer,
        T: Serialize + ?Sized,
    {
        Ok(Self {
            payload: serializer.serialize(telemetry)?,
            content_type: serializer.content_type(),
            content_encoding: serializer.content_encoding(),
            properties: Vec::new(),
        })
    }

    /// Marks the message as sent by a component.
    ///
    /// An empty name leaves the message to the root interface.
    #[must_use]
    pub fn component(self, component: &str) -> Self {
        if component.is_empty() {
            return self;
        }
        self.property(COMPONENT_PROPERTY, component)
    }

    /// Adds an application property.
    ///
    /// A property with the same name is replaced.
    #[must_use]
    pub fn property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let (name, value) = (name.into(), value.into());
        match self.properties.iter_mut().find(|(key, _)| *key == name) {
            Some((_, current)) => *current = value,
            None => self.properties.push((name, value)),
        }
        self
    }

    /// Returns the serialized payload.
    #[must_use]
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Returns the content type of the payload.
    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        self.content_type
    }

    /// Returns the content encoding of the payload.
    #[must_use]
    pub const fn content_encoding(&self) -> &'static str {
        self.content_encoding
    }

    /// Returns the name of the component which sent the message.
    #[must_use]
    pub fn component_name(&self) -> Option<&str> {
        self.property_value(COMPONENT_PROPERTY)
    }

    /// Returns the value of a message property.
    #[must_use]
    pub fn property_value(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Returns all message properties.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use serde::Serialize;
    use serde_json::json;

    use twinhub::serializer::{CompactJson, VerboseJson};

    use super::{COMPONENT_PROPERTY, TelemetryMessage};

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Reading {
        temperature: f64,
        humidity: Option<u8>,
    }

    #[test]
    fn root_telemetry() {
        let message = TelemetryMessage::new(&CompactJson, &json!({"workingSet": 1024})).unwrap();

        assert_eq!(message.payload(), r#"{"workingSet":1024}"#);
        assert_eq!(message.content_type(), "application/json");
        assert_eq!(message.content_encoding(), "utf-8");
        assert_eq!(message.component_name(), None);
        assert_eq!(message.properties().count(), 0);
    }

    #[test]
    fn component_telemetry() {
        let reading = Reading {
            temperature: 21.5,
            humidity: None,
        };

        let message = TelemetryMessage::new(&CompactJson, &reading)
            .unwrap()
            .component("thermostat1")
            .property("alert", "false")
            .property("alert", "true");
        assert_eq!(message.payload(), r#"{"temperature":21.5}"#);
        assert_eq!(message.component_name(), Some("thermostat1"));
        assert_eq!(message.property_value(COMPONENT_PROPERTY), Some("thermostat1"));
        assert_eq!(message.property_value("alert"), Some("true"));
        assert_eq!(message.properties().count(), 2);

        let message = TelemetryMessage::new(&VerboseJson, &reading)
            .unwrap()
            .component("");
        assert_eq!(message.payload(), r#"{"temperature":21.5,"humidity":null}"#);
        assert_eq!(message.component_name(), None);
    }
}
