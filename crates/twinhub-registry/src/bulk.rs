use hashbrown::HashSet;

use serde::{Deserialize, Serialize};

use tracing::{info, warn};

use twinhub::serializer::PayloadSerializer;

use crate::client::RegistryClient;
use crate::device::{
    AuthenticationMechanism, DEVICES_ROUTE, Device, DeviceCapabilities, DeviceStatus,
};
use crate::error::{Error, ErrorKind, Result};
use crate::error_code::ErrorCode;
use crate::request::check_id;
use crate::transport::{HttpTransport, RestKind};

/// Maximum number of devices in a bulk request.
pub const MAX_BULK_DEVICES: usize = 100;

/// What a bulk request does with each entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImportMode {
    /// Creates the device, failing if it exists.
    Create,
    /// Updates the device whatever its version.
    Update,
    /// Updates the device only if its entity tag matches.
    UpdateIfMatchETag,
    /// Deletes the device whatever its version.
    Delete,
    /// Deletes the device only if its entity tag matches.
    DeleteIfMatchETag,
}

impl ImportMode {
    const fn requires_etag(self) -> bool {
        matches!(self, Self::UpdateIfMatchETag | Self::DeleteIfMatchETag)
    }
}

/// An entry of a bulk request or of an import/export blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportImportDevice {
    /// Device identifier.
    pub id: String,
    /// Module identifier, for module entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,
    /// Entity tag of the device.
    #[serde(default, rename = "eTag", skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Import mode.
    pub import_mode: ImportMode,
    /// Device status.
    #[serde(default)]
    pub status: DeviceStatus,
    /// Reason of the status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,
    /// Authentication mechanism.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<AuthenticationMechanism>,
    /// Capabilities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<DeviceCapabilities>,
    /// Device scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_scope: Option<String>,
}

impl ExportImportDevice {
    /// Creates an [`ExportImportDevice`] from a [`Device`].
    #[must_use]
    pub fn new(device: &Device, import_mode: ImportMode) -> Self {
        Self {
            id: device.id.clone(),
            module_id: None,
            etag: device.etag.clone(),
            import_mode,
            status: device.status,
            status_reason: device.status_reason.clone(),
            authentication: device.authentication.clone(),
            capabilities: device.capabilities,
            device_scope: device.device_scope.clone(),
        }
    }

    // Validates a batch of devices locally and converts it into bulk entries.
    pub(crate) fn batch(devices: &[Device], import_mode: ImportMode) -> Result<Vec<Self>> {
        if devices.is_empty() || devices.len() > MAX_BULK_DEVICES {
            return Err(Error::new(
                ErrorKind::ArgumentInvalid,
                format!(
                    "A bulk request needs between 1 and {MAX_BULK_DEVICES} devices, found {}",
                    devices.len()
                ),
            ));
        }

        let mut ids = HashSet::with_capacity(devices.len());
        devices
            .iter()
            .map(|device| {
                check_id(&device.id, "device")?;
                if !ids.insert(device.id.as_str()) {
                    return Err(Error::new(
                        ErrorKind::ArgumentInvalid,
                        format!("Device `{}` appears more than once", device.id),
                    ));
                }
                if import_mode.requires_etag()
                    && device.etag.as_deref().is_none_or(|etag| etag.trim().is_empty())
                {
                    return Err(Error::new(
                        ErrorKind::ArgumentInvalid,
                        format!(
                            "Device `{}` has no ETag, set it or force the operation",
                            device.id
                        ),
                    ));
                }
                Ok(Self::new(device, import_mode))
            })
            .collect()
    }
}

/// An entry which failed in a bulk request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRegistryOperationError {
    /// Device identifier.
    pub device_id: String,
    /// Module identifier, for module entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,
    /// Service error code name.
    pub error_code: String,
    /// Error description.
    #[serde(default)]
    pub error_status: String,
}

impl DeviceRegistryOperationError {
    /// Returns the [`ErrorCode`] of the failure.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        ErrorCode::from_name(&self.error_code)
    }
}

/// An entry which succeeded with a warning in a bulk request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRegistryOperationWarning {
    /// Device identifier.
    pub device_id: String,
    /// Warning code.
    pub warning_code: String,
    /// Warning description.
    #[serde(default)]
    pub warning_status: String,
}

/// The outcome of a bulk request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkRegistryOperationResult {
    /// Whether every entry succeeded.
    pub is_successful: bool,
    /// Failed entries.
    #[serde(default)]
    pub errors: Vec<DeviceRegistryOperationError>,
    /// Entries which succeeded with a warning.
    #[serde(default)]
    pub warnings: Vec<DeviceRegistryOperationWarning>,
}

impl<T, S> RegistryClient<T, S>
where
    T: HttpTransport,
    S: PayloadSerializer,
{
    pub(crate) async fn bulk_operation(
        &self,
        entries: &[ExportImportDevice],
    ) -> Result<BulkRegistryOperationResult> {
        let request = self.with_body(self.request(RestKind::Post, [DEVICES_ROUTE]), entries)?;
        let result: BulkRegistryOperationResult = self.execute_parse(request, 200).await?;

        if result.is_successful {
            info!("Bulk operation on {} devices succeeded", entries.len());
        } else {
            warn!(
                "Bulk operation on {} devices failed for {} of them",
                entries.len(),
                result.errors.len()
            );
        }

        Ok(result)
    }
}
