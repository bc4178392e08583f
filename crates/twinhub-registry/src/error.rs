use std::borrow::Cow;

use tracing::error;

use crate::error_code::ErrorCode;

/// All possible error kinds.
///
/// The first four kinds are produced locally, all the others are produced by
/// classifying a service response.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// An argument is not valid. Detected before contacting the service.
    ArgumentInvalid,
    /// The operation is not valid in the current state.
    InvalidOperation,
    /// A successful response body could not be deserialized.
    ResponseDeserialization,
    /// The service could not be reached or did not answer in time.
    IotHubCommunication,
    /// The request is malformed.
    BadFormat,
    /// The protocol version is not supported.
    InvalidProtocolVersion,
    /// A bulk request contains the same device more than once.
    DeviceDefinedMultipleTimes,
    /// A bulk registry operation failed.
    BulkRegistryOperationFailure,
    /// The credentials are missing, invalid or expired.
    Unauthorized,
    /// A service quota has been exceeded.
    QuotaExceeded,
    /// The cloud-to-device queue of a device is full.
    DeviceMaximumQueueDepthExceeded,
    /// The service has been suspended.
    IotHubSuspended,
    /// A generic resource has not been found.
    NotFound,
    /// The device does not exist.
    DeviceNotFound,
    /// The module does not exist.
    ModuleNotFound,
    /// The configuration does not exist.
    ConfigurationNotFound,
    /// The job does not exist.
    JobNotFound,
    /// A generic conflict.
    Conflict,
    /// The device already exists.
    DeviceAlreadyExists,
    /// The module already exists on the device.
    ModuleAlreadyExists,
    /// The configuration already exists.
    ConfigurationAlreadyExists,
    /// The supplied `ETag` is stale.
    PreconditionFailed,
    /// The lock on a cloud-to-device message has been lost.
    DeviceMessageLockLost,
    /// The request is too large.
    MessageTooLarge,
    /// The service contains too many devices.
    TooManyDevices,
    /// The device contains too many modules.
    TooManyModulesOnDevice,
    /// The request rate exceeds the service limits.
    Throttling,
    /// The throttling backlog is full.
    ThrottleBacklogLimitExceeded,
    /// An internal service error.
    ServerError,
    /// The service is temporarily unavailable.
    ServerBusy,
    /// A gateway timed out while contacting the service.
    GatewayTimeout,
    /// The service reported an unknown or non-authoritative error code.
    InvalidErrorCode,
}

impl ErrorKind {
    pub(crate) const fn description(self) -> &'static str {
        match self {
            Self::ArgumentInvalid => "Argument Invalid",
            Self::InvalidOperation => "Invalid Operation",
            Self::ResponseDeserialization => "Response Deserialization",
            Self::IotHubCommunication => "IoT Hub Communication",
            Self::BadFormat => "Bad Format",
            Self::InvalidProtocolVersion => "Invalid Protocol Version",
            Self::DeviceDefinedMultipleTimes => "Device Defined Multiple Times",
            Self::BulkRegistryOperationFailure => "Bulk Registry Operation Failure",
            Self::Unauthorized => "Unauthorized",
            Self::QuotaExceeded => "Quota Exceeded",
            Self::DeviceMaximumQueueDepthExceeded => "Device Maximum Queue Depth Exceeded",
            Self::IotHubSuspended => "IoT Hub Suspended",
            Self::NotFound => "Not Found",
            Self::DeviceNotFound => "Device Not Found",
            Self::ModuleNotFound => "Module Not Found",
            Self::ConfigurationNotFound => "Configuration Not Found",
            Self::JobNotFound => "Job Not Found",
            Self::Conflict => "Conflict",
            Self::DeviceAlreadyExists => "Device Already Exists",
            Self::ModuleAlreadyExists => "Module Already Exists",
            Self::ConfigurationAlreadyExists => "Configuration Already Exists",
            Self::PreconditionFailed => "Precondition Failed",
            Self::DeviceMessageLockLost => "Device Message Lock Lost",
            Self::MessageTooLarge => "Message Too Large",
            Self::TooManyDevices => "Too Many Devices",
            Self::TooManyModulesOnDevice => "Too Many Modules On Device",
            Self::Throttling => "Throttling",
            Self::ThrottleBacklogLimitExceeded => "Throttle Backlog Limit Exceeded",
            Self::ServerError => "Server Error",
            Self::ServerBusy => "Server Busy",
            Self::GatewayTimeout => "Gateway Timeout",
            Self::InvalidErrorCode => "Invalid Error Code",
        }
    }

    /// Checks whether errors of this kind are transient by default, hence
    /// safe to retry without changing the request.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(
            self,
            Self::IotHubCommunication
                | Self::QuotaExceeded
                | Self::Throttling
                | Self::ThrottleBacklogLimitExceeded
                | Self::ServerError
                | Self::ServerBusy
                | Self::GatewayTimeout
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.description().fmt(f)
    }
}

/// Registry error.
///
/// Every failed registry operation produces exactly one [`Error`], either
/// locally or by classifying the service response. It is never
/// re-classified afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    code: ErrorCode,
    description: Cow<'static, str>,
    transient: bool,
    tracking_id: Option<String>,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.format(f)
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.format(f)
    }
}

impl Error {
    /// Creates an [`Error`] from an [`ErrorKind`] and a description.
    ///
    /// The error code is [`ErrorCode::InvalidErrorCode`] and the transience
    /// is the default one of the kind.
    #[inline]
    pub fn new(kind: ErrorKind, description: impl Into<Cow<'static, str>>) -> Self {
        Self::init(
            kind,
            ErrorCode::InvalidErrorCode,
            kind.is_transient(),
            description,
        )
    }

    pub(crate) fn init(
        kind: ErrorKind,
        code: ErrorCode,
        transient: bool,
        description: impl Into<Cow<'static, str>>,
    ) -> Self {
        let description = description.into();
        error!("{}", description.as_ref());
        Self {
            kind,
            code,
            description,
            transient,
            tracking_id: None,
        }
    }

    /// Attaches a tracking identifier.
    #[must_use]
    #[inline]
    pub fn with_tracking_id(mut self, tracking_id: impl Into<String>) -> Self {
        self.tracking_id = Some(tracking_id.into());
        self
    }

    /// Returns the [`ErrorKind`].
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the [`ErrorCode`].
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.description
    }

    /// Checks whether the failed operation can be retried as is.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        self.transient
    }

    /// Returns the tracking identifier assigned by the service.
    ///
    /// If [`None`], the service did not provide it.
    #[must_use]
    pub fn tracking_id(&self) -> Option<&str> {
        self.tracking_id.as_deref()
    }

    fn format(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        if self.code != ErrorCode::InvalidErrorCode {
            write!(f, " ({})", self.code.value())?;
        }
        write!(f, ": {}", self.description)?;
        if let Some(tracking_id) = &self.tracking_id {
            write!(f, " [tracking id: {tracking_id}]")?;
        }
        Ok(())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        let description = if e.is_timeout() {
            format!("Request timed out: {e}")
        } else {
            format!("Unable to reach the service: {e}")
        };
        Self::new(ErrorKind::IotHubCommunication, description)
    }
}

impl From<twinhub::error::Error> for Error {
    fn from(e: twinhub::error::Error) -> Self {
        let kind = match e.kind() {
            twinhub::error::ErrorKind::Deserialization => ErrorKind::ResponseDeserialization,
            _ => ErrorKind::ArgumentInvalid,
        };
        Self::new(kind, e.to_string())
    }
}

impl std::error::Error for Error {}

/// A specialized [`Result`] type for [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use crate::error_code::ErrorCode;

    use super::{Error, ErrorKind};

    #[test]
    fn registry_error() {
        let error = Error::new(ErrorKind::ArgumentInvalid, "Missing device identifier.");

        assert_eq!(
            error.to_string(),
            "Argument Invalid: Missing device identifier."
        );
        assert!(!error.is_transient());
        assert_eq!(error.code(), ErrorCode::InvalidErrorCode);
    }

    #[test]
    fn service_error() {
        let error = Error::init(
            ErrorKind::DeviceNotFound,
            ErrorCode::DeviceNotFound,
            false,
            "Device `thermostat` not found.",
        )
        .with_tracking_id("b2a1");

        assert_eq!(
            error.to_string(),
            "Device Not Found (404001): Device `thermostat` not found. [tracking id: b2a1]"
        );
        assert_eq!(error.tracking_id(), Some("b2a1"));
    }

    #[test]
    fn communication_errors_are_transient() {
        assert!(Error::new(ErrorKind::IotHubCommunication, "Timeout").is_transient());
        assert!(!Error::new(ErrorKind::ResponseDeserialization, "Bad body").is_transient());
    }
}
