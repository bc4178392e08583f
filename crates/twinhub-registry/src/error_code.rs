use crate::error::ErrorKind;

// Generates the error-code table.
//
// Each entry lists the variant, its numeric code, the name used on the wire,
// its kind and its default transience.
macro_rules! error_codes {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $value:literal, $wire:literal => $kind:ident, $transient:literal;
        )*
    ) => {
        /// A service error code.
        ///
        /// Codes have the `<httpStatus><3-digit subcode>` shape.
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
        pub enum ErrorCode {
            $(
                $(#[$doc])*
                $name,
            )*
            /// The service code is absent, unknown or not authoritative.
            InvalidErrorCode,
        }

        impl ErrorCode {
            const ALL: &'static [Self] = &[$(Self::$name,)*];

            /// Returns the numeric value.
            ///
            /// [`ErrorCode::InvalidErrorCode`] has value `0`.
            #[must_use]
            pub const fn value(self) -> u32 {
                match self {
                    $(Self::$name => $value,)*
                    Self::InvalidErrorCode => 0,
                }
            }

            /// Returns the name used by the service.
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$name => $wire,)*
                    Self::InvalidErrorCode => "InvalidErrorCode",
                }
            }

            /// Returns the [`ErrorKind`] associated with the code.
            #[must_use]
            pub const fn kind(self) -> ErrorKind {
                match self {
                    $(Self::$name => ErrorKind::$kind,)*
                    Self::InvalidErrorCode => ErrorKind::InvalidErrorCode,
                }
            }

            /// Checks whether errors with this code are transient.
            #[must_use]
            pub const fn is_transient(self) -> bool {
                match self {
                    $(Self::$name => $transient,)*
                    Self::InvalidErrorCode => false,
                }
            }
        }
    };
}

error_codes! {
    /// The protocol version is not supported.
    InvalidProtocolVersion = 400_001, "InvalidProtocolVersion" => InvalidProtocolVersion, false;
    /// The operation is not valid.
    InvalidOperation = 400_003, "InvalidOperation" => InvalidOperation, false;
    /// An argument is not valid.
    ArgumentInvalid = 400_004, "ArgumentInvalid" => ArgumentInvalid, false;
    /// A mandatory argument is missing.
    ArgumentNull = 400_005, "ArgumentNull" => ArgumentInvalid, false;
    /// The request is malformed.
    IotHubFormatError = 400_006, "IotHubFormatError" => BadFormat, false;
    /// A bulk request contains the same device more than once.
    DeviceDefinedMultipleTimes = 400_011, "DeviceDefinedMultipleTimes" => DeviceDefinedMultipleTimes, false;
    /// The request body cannot be deserialized.
    DeserializationError = 400_012, "DeserializationError" => BadFormat, false;
    /// A bulk registry operation failed.
    BulkRegistryOperationFailure = 400_013, "BulkRegistryOperationFailure" => BulkRegistryOperationFailure, false;
    /// The credentials are missing, invalid or expired.
    IotHubUnauthorizedAccess = 401_002, "IotHubUnauthorizedAccess" => Unauthorized, false;
    /// The daily message quota has been exceeded.
    IotHubQuotaExceeded = 403_002, "IotHubQuotaExceeded" => QuotaExceeded, true;
    /// The cloud-to-device queue of a device is full.
    DeviceMaximumQueueDepthExceeded = 403_004, "DeviceMaximumQueueDepthExceeded" => DeviceMaximumQueueDepthExceeded, false;
    /// The service has been suspended.
    IotHubSuspended = 403_005, "IotHubSuspended" => IotHubSuspended, false;
    /// The device does not exist.
    DeviceNotFound = 404_001, "DeviceNotFound" => DeviceNotFound, false;
    /// The job does not exist.
    JobNotFound = 404_002, "JobNotFound" => JobNotFound, false;
    /// The partition does not exist. Not authoritative.
    PartitionNotFound = 404_003, "PartitionNotFound" => InvalidErrorCode, false;
    /// The module does not exist.
    ModuleNotFound = 404_010, "ModuleNotFound" => ModuleNotFound, false;
    /// The configuration does not exist.
    ConfigurationNotFound = 404_016, "ConfigurationNotFound" => ConfigurationNotFound, false;
    /// The device already exists.
    DeviceAlreadyExists = 409_001, "DeviceAlreadyExists" => DeviceAlreadyExists, false;
    /// The configuration already exists.
    ConfigurationAlreadyExists = 409_005, "ConfigurationAlreadyExists" => ConfigurationAlreadyExists, false;
    /// The module already exists on the device.
    ModuleAlreadyExistsOnDevice = 409_301, "ModuleAlreadyExistsOnDevice" => ModuleAlreadyExists, false;
    /// The supplied `ETag` is stale.
    PreconditionFailed = 412_001, "PreconditionFailed" => PreconditionFailed, false;
    /// The lock on a cloud-to-device message has been lost.
    DeviceMessageLockLost = 412_002, "DeviceMessageLockLost" => DeviceMessageLockLost, false;
    /// The request is too large.
    MessageTooLarge = 413_001, "MessageTooLarge" => MessageTooLarge, false;
    /// The service contains too many devices.
    TooManyDevices = 413_002, "TooManyDevices" => TooManyDevices, false;
    /// The device contains too many modules.
    TooManyModulesOnDevice = 413_003, "TooManyModulesOnDevice" => TooManyModulesOnDevice, false;
    /// The request rate exceeds the service limits.
    ThrottlingException = 429_001, "ThrottlingException" => Throttling, true;
    /// The throttling backlog is full.
    ThrottleBacklogLimitExceeded = 429_002, "ThrottleBacklogLimitExceeded" => ThrottleBacklogLimitExceeded, true;
    /// An internal service error.
    ServerError = 500_001, "ServerError" => ServerError, true;
    /// The service is temporarily unavailable.
    ServiceUnavailable = 503_001, "ServiceUnavailable" => ServerBusy, true;
    /// The legacy partition-not-found code. Not authoritative.
    PartitionNotFoundLegacy = 503_003, "PartitionNotFound" => InvalidErrorCode, false;
    /// A gateway timed out while contacting the service.
    GatewayTimeout = 504_101, "GatewayTimeout" => GatewayTimeout, true;
}

impl ErrorCode {
    /// Looks up a code by its numeric value.
    ///
    /// Unknown values return [`ErrorCode::InvalidErrorCode`].
    #[must_use]
    pub fn from_value(value: u32) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|code| code.value() == value)
            .unwrap_or(Self::InvalidErrorCode)
    }

    /// Looks up a code by its service name, ignoring case.
    ///
    /// Unknown names return [`ErrorCode::InvalidErrorCode`].
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|code| code.name().eq_ignore_ascii_case(name))
            .unwrap_or(Self::InvalidErrorCode)
    }

    /// Returns the HTTP status family of the code.
    ///
    /// [`ErrorCode::InvalidErrorCode`] has no family and returns `0`.
    #[must_use]
    pub const fn status(self) -> u16 {
        (self.value() / 1000) as u16
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.value())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;

    use super::ErrorCode;

    #[test]
    fn lookup() {
        assert_eq!(ErrorCode::from_value(404_001), ErrorCode::DeviceNotFound);
        assert_eq!(ErrorCode::from_value(404_999), ErrorCode::InvalidErrorCode);
        assert_eq!(ErrorCode::from_value(0), ErrorCode::InvalidErrorCode);

        assert_eq!(
            ErrorCode::from_name("deviceAlreadyExists"),
            ErrorCode::DeviceAlreadyExists
        );
        assert_eq!(ErrorCode::from_name("Unknown"), ErrorCode::InvalidErrorCode);

        // Both partition codes share a name, the first one wins.
        assert_eq!(
            ErrorCode::from_name("PartitionNotFound"),
            ErrorCode::PartitionNotFound
        );
    }

    #[test]
    fn values_match_status_family() {
        for code in ErrorCode::ALL {
            assert!((400..600).contains(&code.status()), "{code}");
            assert_eq!(ErrorCode::from_value(code.value()).value(), code.value());
        }
        assert_eq!(ErrorCode::PreconditionFailed.status(), 412);
    }

    #[test]
    fn partition_not_found_is_not_authoritative() {
        for code in [ErrorCode::PartitionNotFound, ErrorCode::PartitionNotFoundLegacy] {
            assert_eq!(code.kind(), ErrorKind::InvalidErrorCode);
            assert!(!code.is_transient());
        }
    }

    #[test]
    fn transient_codes() {
        let transient = ErrorCode::ALL
            .iter()
            .filter(|code| code.is_transient())
            .map(|code| code.name())
            .collect::<Vec<_>>();

        assert_eq!(
            transient,
            [
                "IotHubQuotaExceeded",
                "ThrottlingException",
                "ThrottleBacklogLimitExceeded",
                "ServerError",
                "ServiceUnavailable",
                "GatewayTimeout",
            ]
        );
    }
}
