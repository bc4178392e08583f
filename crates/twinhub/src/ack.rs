use alloc::format;
use alloc::string::String;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, ErrorKind, Result};

/// Acknowledgement status code of a writable property.
///
/// Codes mirror `HTTP` statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum AckCode {
    /// The requested value has been applied.
    Completed,
    /// The request has been received and is being applied.
    InProgress,
    /// The requested value is malformed or not acceptable.
    BadRequest,
    /// The requested property does not exist on the device.
    NotFound,
}

impl AckCode {
    /// Returns the numeric status of an [`AckCode`].
    #[must_use]
    pub const fn status(self) -> u16 {
        match self {
            Self::Completed => 200,
            Self::InProgress => 202,
            Self::BadRequest => 400,
            Self::NotFound => 404,
        }
    }

    /// Creates an [`AckCode`] from a numeric status.
    ///
    /// If [`None`], the status is not a known acknowledgement code.
    #[must_use]
    pub const fn from_status(status: u16) -> Option<Self> {
        match status {
            200 => Some(Self::Completed),
            202 => Some(Self::InProgress),
            400 => Some(Self::BadRequest),
            404 => Some(Self::NotFound),
            _ => None,
        }
    }

    /// Checks whether the code closes a writable-property exchange.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress)
    }

    const fn description(self) -> &'static str {
        match self {
            Self::Completed => "Completed",
            Self::InProgress => "In Progress",
            Self::BadRequest => "Bad Request",
            Self::NotFound => "Not Found",
        }
    }
}

impl core::fmt::Display for AckCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} ({})", self.description(), self.status())
    }
}

impl From<AckCode> for u16 {
    fn from(code: AckCode) -> Self {
        code.status()
    }
}

impl TryFrom<u16> for AckCode {
    type Error = Error;

    fn try_from(status: u16) -> Result<Self> {
        Self::from_status(status).ok_or_else(|| {
            Error::new(
                ErrorKind::Deserialization,
                format!("`{status}` is not an acknowledgement code"),
            )
        })
    }
}

/// Wire convention used to encode a writable-property acknowledgement.
///
/// The two conventions are not wire-compatible, so a deployment must stick
/// to exactly one of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AckConvention {
    /// Twin-collection keys: `value`, `ac`, `av`, `ad`.
    #[default]
    TwinCollection,
    /// Structured-property keys: `value`, `ackCode`, `ackVersion`,
    /// `ackDescription`.
    Structured,
}

impl AckConvention {
    /// Key of the acknowledged value.
    #[must_use]
    pub const fn value_key(self) -> &'static str {
        "value"
    }

    /// Key of the acknowledgement code.
    #[must_use]
    pub const fn code_key(self) -> &'static str {
        match self {
            Self::TwinCollection => "ac",
            Self::Structured => "ackCode",
        }
    }

    /// Key of the acknowledgement version.
    #[must_use]
    pub const fn version_key(self) -> &'static str {
        match self {
            Self::TwinCollection => "av",
            Self::Structured => "ackVersion",
        }
    }

    /// Key of the acknowledgement description.
    #[must_use]
    pub const fn description_key(self) -> &'static str {
        match self {
            Self::TwinCollection => "ad",
            Self::Structured => "ackDescription",
        }
    }

    // Encodes the envelope of an acknowledgement whose value has already
    // been converted into its wire representation.
    pub(crate) fn encode(self, ack: &WritablePropertyAck<Value>) -> Value {
        let mut envelope = Map::new();
        envelope.insert(self.value_key().into(), ack.value.clone());
        envelope.insert(self.code_key().into(), ack.ack_code.status().into());
        envelope.insert(self.version_key().into(), ack.ack_version.into());
        if let Some(description) = &ack.ack_description {
            envelope.insert(self.description_key().into(), description.as_str().into());
        }
        Value::Object(envelope)
    }

    pub(crate) fn decode(self, envelope: &Value) -> Result<WritablePropertyAck<Value>> {
        let Some(envelope) = envelope.as_object() else {
            return Err(envelope_error("an acknowledgement must be a JSON object"));
        };

        let value = envelope
            .get(self.value_key())
            .cloned()
            .ok_or_else(|| envelope_error(format!("missing `{}`", self.value_key())))?;

        let ack_code = envelope
            .get(self.code_key())
            .and_then(Value::as_u64)
            .and_then(|status| u16::try_from(status).ok())
            .and_then(AckCode::from_status)
            .ok_or_else(|| envelope_error(format!("invalid `{}`", self.code_key())))?;

        let ack_version = envelope
            .get(self.version_key())
            .and_then(Value::as_i64)
            .ok_or_else(|| envelope_error(format!("invalid `{}`", self.version_key())))?;

        let ack_description = envelope
            .get(self.description_key())
            .and_then(Value::as_str)
            .map(String::from);

        Ok(WritablePropertyAck {
            value,
            ack_code,
            ack_version,
            ack_description,
        })
    }
}

fn envelope_error(message: impl Into<alloc::borrow::Cow<'static, str>>) -> Error {
    Error::new(ErrorKind::Deserialization, message)
}

/// A writable-property acknowledgement.
///
/// Created by a device when answering a desired-property update. The
/// acknowledgement version is the version of the desired-property set which
/// triggered it.
#[derive(Debug, Clone, PartialEq)]
pub struct WritablePropertyAck<T> {
    value: T,
    ack_code: AckCode,
    ack_version: i64,
    ack_description: Option<String>,
}

impl<T> WritablePropertyAck<T> {
    /// Creates a [`WritablePropertyAck`].
    #[must_use]
    pub const fn new(value: T, ack_code: AckCode, ack_version: i64) -> Self {
        Self {
            value,
            ack_code,
            ack_version,
            ack_description: None,
        }
    }

    /// Sets the acknowledgement description.
    #[must_use]
    #[inline]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.ack_description = Some(description.into());
        self
    }

    /// Returns the acknowledged value.
    #[must_use]
    pub const fn value(&self) -> &T {
        &self.value
    }

    /// Returns the [`AckCode`].
    #[must_use]
    pub const fn ack_code(&self) -> AckCode {
        self.ack_code
    }

    /// Returns the acknowledgement version.
    #[must_use]
    pub const fn ack_version(&self) -> i64 {
        self.ack_version
    }

    /// Returns the acknowledgement description.
    #[must_use]
    pub fn ack_description(&self) -> Option<&str> {
        self.ack_description.as_deref()
    }

    /// Consumes the acknowledgement, returning its value.
    #[must_use]
    pub fn into_value(self) -> T {
        self.value
    }

    pub(crate) fn map_value<U>(self, value: U) -> WritablePropertyAck<U> {
        WritablePropertyAck {
            value,
            ack_code: self.ack_code,
            ack_version: self.ack_version,
            ack_description: self.ack_description,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::error::ErrorKind;
    use crate::{deserialize, serialize};

    use super::{AckCode, AckConvention, WritablePropertyAck};

    #[test]
    fn ack_codes() {
        for code in [
            AckCode::Completed,
            AckCode::InProgress,
            AckCode::BadRequest,
            AckCode::NotFound,
        ] {
            assert_eq!(AckCode::from_status(code.status()), Some(code));
        }

        assert_eq!(AckCode::from_status(500), None);
        assert!(!AckCode::InProgress.is_terminal());
        assert!(AckCode::BadRequest.is_terminal());

        assert_eq!(serialize(AckCode::InProgress), json!(202));
        assert_eq!(deserialize::<AckCode>(json!(404)), AckCode::NotFound);
    }

    #[test]
    fn twin_collection_envelope() {
        let ack = WritablePropertyAck::new(json!(21.5), AckCode::Completed, 7)
            .description("Target reached");

        let envelope = AckConvention::TwinCollection.encode(&ack);
        assert_eq!(
            envelope,
            json!({"value": 21.5, "ac": 200, "av": 7, "ad": "Target reached"})
        );
        assert_eq!(AckConvention::TwinCollection.decode(&envelope), Ok(ack));
    }

    #[test]
    fn structured_envelope() {
        let ack = WritablePropertyAck::new(json!({"min": 1}), AckCode::InProgress, 3);

        let envelope = AckConvention::Structured.encode(&ack);
        assert_eq!(
            envelope,
            json!({"value": {"min": 1}, "ackCode": 202, "ackVersion": 3})
        );
        assert_eq!(AckConvention::Structured.decode(&envelope), Ok(ack));
    }

    #[test]
    fn conventions_are_not_interchangeable() {
        let ack = WritablePropertyAck::new(json!(1), AckCode::Completed, 1);
        let envelope = AckConvention::TwinCollection.encode(&ack);

        assert_eq!(
            AckConvention::Structured
                .decode(&envelope)
                .unwrap_err()
                .kind(),
            ErrorKind::Deserialization
        );
    }
}
