use std::future::Future;

use serde::{Deserialize, Serialize};

use tracing::info;

use twinhub::serializer::PayloadSerializer;

use crate::bulk::{BulkRegistryOperationResult, ExportImportDevice, ImportMode};
use crate::client::RegistryClient;
use crate::error::{Error, ErrorKind, Result};
use crate::request::{WILDCARD_ETAG, check_id, if_match};
use crate::statistics::{RegistryStatistics, ServiceStatistics};
use crate::transport::{HttpTransport, RestKind};

pub(crate) const DEVICES_ROUTE: &str = "devices";

/// Device status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceStatus {
    /// The device can connect.
    #[default]
    Enabled,
    /// The device cannot connect.
    Disabled,
}

/// Device connection state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// The device is not connected.
    #[default]
    Disconnected,
    /// The device is connected.
    Connected,
}

/// How a device or a module authenticates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthenticationType {
    /// Symmetric keys.
    #[default]
    Sas,
    /// Self-signed X.509 certificates.
    SelfSigned,
    /// X.509 certificates signed by a certificate authority.
    CertificateAuthority,
    /// No authentication.
    None,
}

/// A pair of symmetric keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymmetricKey {
    /// Primary key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,
    /// Secondary key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_key: Option<String>,
}

/// A pair of X.509 thumbprints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct X509Thumbprint {
    /// Primary thumbprint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_thumbprint: Option<String>,
    /// Secondary thumbprint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_thumbprint: Option<String>,
}

/// Authentication mechanism of a device or a module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationMechanism {
    /// Symmetric keys, when the type is [`AuthenticationType::Sas`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symmetric_key: Option<SymmetricKey>,
    /// Thumbprints, when the type is [`AuthenticationType::SelfSigned`].
    #[serde(
        default,
        rename = "x509Thumbprint",
        skip_serializing_if = "Option::is_none"
    )]
    pub x509_thumbprint: Option<X509Thumbprint>,
    /// Authentication type.
    #[serde(default, rename = "type")]
    pub kind: AuthenticationType,
}

impl AuthenticationMechanism {
    /// Creates an [`AuthenticationMechanism`] with symmetric keys.
    ///
    /// Keys left unset are generated by the service.
    #[must_use]
    pub const fn symmetric_key(symmetric_key: SymmetricKey) -> Self {
        Self {
            symmetric_key: Some(symmetric_key),
            x509_thumbprint: None,
            kind: AuthenticationType::Sas,
        }
    }

    /// Creates an [`AuthenticationMechanism`] with self-signed thumbprints.
    #[must_use]
    pub const fn self_signed(x509_thumbprint: X509Thumbprint) -> Self {
        Self {
            symmetric_key: None,
            x509_thumbprint: Some(x509_thumbprint),
            kind: AuthenticationType::SelfSigned,
        }
    }
}

/// Device capabilities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCapabilities {
    /// Whether the device is an edge device.
    #[serde(default)]
    pub iot_edge: bool,
}

/// A device identity in the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Device identifier.
    #[serde(rename = "deviceId")]
    pub id: String,
    /// Identifier distinguishing devices re-created with the same id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_id: Option<String>,
    /// Entity tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Status.
    #[serde(default)]
    pub status: DeviceStatus,
    /// Reason of the current status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,
    /// Last time the status changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_updated_time: Option<String>,
    /// Connection state. Read-only.
    #[serde(default)]
    pub connection_state: ConnectionState,
    /// Last time the connection state changed. Read-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_state_updated_time: Option<String>,
    /// Last time the device connected, received or sent a message. Read-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity_time: Option<String>,
    /// Number of cloud-to-device messages waiting. Read-only.
    #[serde(default)]
    pub cloud_to_device_message_count: u64,
    /// Authentication mechanism.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<AuthenticationMechanism>,
    /// Capabilities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<DeviceCapabilities>,
    /// Scope of the device, set for devices managed by an edge device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_scope: Option<String>,
}

impl Device {
    /// Creates an enabled [`Device`] with the given identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Sets the entity tag.
    #[must_use]
    pub fn etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    /// Sets the status.
    #[must_use]
    pub fn status(mut self, status: DeviceStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the authentication mechanism.
    #[must_use]
    pub fn authentication(mut self, authentication: AuthenticationMechanism) -> Self {
        self.authentication = Some(authentication);
        self
    }

    /// Marks the device as an edge device.
    #[must_use]
    pub fn edge(mut self) -> Self {
        self.capabilities = Some(DeviceCapabilities { iot_edge: true });
        self
    }
}

/// Device registry operations.
///
/// Mutating operations require the entity tag of the device unless they are
/// forced, in which case the wildcard tag overwrites any version.
pub trait DevicesClient {
    /// Creates a device.
    ///
    /// # Errors
    ///
    /// The device has no identifier or already carries an entity tag, or the
    /// service rejects the request.
    fn create_device(&self, device: &Device) -> impl Future<Output = Result<Device>> + Send;

    /// Retrieves a device.
    ///
    /// # Errors
    ///
    /// The identifier is empty or the service rejects the request.
    fn get_device(&self, device_id: &str) -> impl Future<Output = Result<Device>> + Send;

    /// Retrieves up to `max_count` devices.
    ///
    /// # Errors
    ///
    /// The service rejects the request.
    fn get_devices(&self, max_count: u32) -> impl Future<Output = Result<Vec<Device>>> + Send;

    /// Replaces a device.
    ///
    /// # Errors
    ///
    /// The device has no entity tag and the operation is not forced, or the
    /// service rejects the request.
    fn replace_device(
        &self,
        device: &Device,
        force: bool,
    ) -> impl Future<Output = Result<Device>> + Send;

    /// Deletes a device.
    ///
    /// # Errors
    ///
    /// The device has no entity tag and the operation is not forced, or the
    /// service rejects the request.
    fn delete_device(&self, device: &Device, force: bool)
    -> impl Future<Output = Result<()>> + Send;

    /// Deletes a device whatever its version.
    ///
    /// # Errors
    ///
    /// The identifier is empty or the service rejects the request.
    fn delete_device_by_id(&self, device_id: &str) -> impl Future<Output = Result<()>> + Send;

    /// Creates up to 100 devices in a single request.
    ///
    /// # Errors
    ///
    /// The batch is empty, too large or contains invalid devices, or the
    /// service rejects the request.
    fn add_devices(
        &self,
        devices: &[Device],
    ) -> impl Future<Output = Result<BulkRegistryOperationResult>> + Send;

    /// Updates up to 100 devices in a single request.
    ///
    /// # Errors
    ///
    /// The batch is empty, too large or contains invalid devices, or the
    /// service rejects the request.
    fn update_devices(
        &self,
        devices: &[Device],
        force: bool,
    ) -> impl Future<Output = Result<BulkRegistryOperationResult>> + Send;

    /// Deletes up to 100 devices in a single request.
    ///
    /// # Errors
    ///
    /// The batch is empty, too large or contains invalid devices, or the
    /// service rejects the request.
    fn remove_devices(
        &self,
        devices: &[Device],
        force: bool,
    ) -> impl Future<Output = Result<BulkRegistryOperationResult>> + Send;

    /// Retrieves the device counters of the registry.
    ///
    /// # Errors
    ///
    /// The service rejects the request.
    fn get_registry_statistics(&self) -> impl Future<Output = Result<RegistryStatistics>> + Send;

    /// Retrieves the connection counters of the service.
    ///
    /// # Errors
    ///
    /// The service rejects the request.
    fn get_service_statistics(&self) -> impl Future<Output = Result<ServiceStatistics>> + Send;
}

impl<T, S> DevicesClient for RegistryClient<T, S>
where
    T: HttpTransport,
    S: PayloadSerializer,
{
    async fn create_device(&self, device: &Device) -> Result<Device> {
        check_id(&device.id, "device")?;
        if device.etag.is_some() {
            return Err(Error::new(
                ErrorKind::ArgumentInvalid,
                "A device to be created must not carry an ETag",
            ));
        }

        let request = self.request(RestKind::Put, [DEVICES_ROUTE, device.id.as_str()]);
        let device: Device = self.execute_parse(self.with_body(request, device)?, 200).await?;

        info!("Device `{}` created", device.id);
        Ok(device)
    }

    async fn get_device(&self, device_id: &str) -> Result<Device> {
        check_id(device_id, "device")?;
        self.execute_parse(self.request(RestKind::Get, [DEVICES_ROUTE, device_id]), 200)
            .await
    }

    async fn get_devices(&self, max_count: u32) -> Result<Vec<Device>> {
        let request = self
            .request(RestKind::Get, [DEVICES_ROUTE])
            .query("top", max_count.to_string());
        self.execute_parse(request, 200).await
    }

    async fn replace_device(&self, device: &Device, force: bool) -> Result<Device> {
        check_id(&device.id, "device")?;
        let etag = if_match(device.etag.as_deref(), force, "device")?;

        let request = self
            .request(RestKind::Put, [DEVICES_ROUTE, device.id.as_str()])
            .header("If-Match", etag);
        let device: Device = self.execute_parse(self.with_body(request, device)?, 200).await?;

        info!("Device `{}` replaced", device.id);
        Ok(device)
    }

    async fn delete_device(&self, device: &Device, force: bool) -> Result<()> {
        check_id(&device.id, "device")?;
        let etag = if_match(device.etag.as_deref(), force, "device")?;

        let request = self
            .request(RestKind::Delete, [DEVICES_ROUTE, device.id.as_str()])
            .header("If-Match", etag);
        self.execute(request, 204).await?;

        info!("Device `{}` deleted", device.id);
        Ok(())
    }

    async fn delete_device_by_id(&self, device_id: &str) -> Result<()> {
        check_id(device_id, "device")?;

        let request = self
            .request(RestKind::Delete, [DEVICES_ROUTE, device_id])
            .header("If-Match", WILDCARD_ETAG);
        self.execute(request, 204).await?;

        info!("Device `{device_id}` deleted");
        Ok(())
    }

    async fn add_devices(&self, devices: &[Device]) -> Result<BulkRegistryOperationResult> {
        let entries = ExportImportDevice::batch(devices, ImportMode::Create)?;
        self.bulk_operation(&entries).await
    }

    async fn update_devices(
        &self,
        devices: &[Device],
        force: bool,
    ) -> Result<BulkRegistryOperationResult> {
        let mode = if force {
            ImportMode::Update
        } else {
            ImportMode::UpdateIfMatchETag
        };
        let entries = ExportImportDevice::batch(devices, mode)?;
        self.bulk_operation(&entries).await
    }

    async fn remove_devices(
        &self,
        devices: &[Device],
        force: bool,
    ) -> Result<BulkRegistryOperationResult> {
        let mode = if force {
            ImportMode::Delete
        } else {
            ImportMode::DeleteIfMatchETag
        };
        let entries = ExportImportDevice::batch(devices, mode)?;
        self.bulk_operation(&entries).await
    }

    async fn get_registry_statistics(&self) -> Result<RegistryStatistics> {
        self.execute_parse(self.request(RestKind::Get, ["statistics", "devices"]), 200)
            .await
    }

    async fn get_service_statistics(&self) -> Result<ServiceStatistics> {
        self.execute_parse(self.request(RestKind::Get, ["statistics", "service"]), 200)
            .await
    }
}
