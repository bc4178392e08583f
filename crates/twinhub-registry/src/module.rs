use std::future::Future;

use serde::{Deserialize, Serialize};

use tracing::info;

use twinhub::serializer::PayloadSerializer;

use crate::client::RegistryClient;
use crate::device::{AuthenticationMechanism, ConnectionState, DEVICES_ROUTE};
use crate::error::{Error, ErrorKind, Result};
use crate::request::{check_id, if_match};
use crate::transport::{HttpTransport, RestKind};

const MODULES_ROUTE: &str = "modules";

/// A module identity, hosted by a device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    /// Identifier of the hosting device.
    pub device_id: String,
    /// Module identifier.
    #[serde(rename = "moduleId")]
    pub id: String,
    /// Identifier of whoever manages the module.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_by: Option<String>,
    /// Identifier distinguishing modules re-created with the same id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_id: Option<String>,
    /// Entity tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Connection state. Read-only.
    #[serde(default)]
    pub connection_state: ConnectionState,
    /// Last time the connection state changed. Read-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_state_updated_time: Option<String>,
    /// Last activity time. Read-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity_time: Option<String>,
    /// Number of cloud-to-module messages waiting. Read-only.
    #[serde(default)]
    pub cloud_to_device_message_count: u64,
    /// Authentication mechanism.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<AuthenticationMechanism>,
}

impl Module {
    /// Creates a [`Module`] hosted by the given device.
    #[must_use]
    pub fn new(device_id: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
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

    /// Sets who manages the module.
    #[must_use]
    pub fn managed_by(mut self, managed_by: impl Into<String>) -> Self {
        self.managed_by = Some(managed_by.into());
        self
    }

    fn check_ids(&self) -> Result<()> {
        check_id(&self.device_id, "device")?;
        check_id(&self.id, "module")
    }

    fn route(&self) -> [&str; 4] {
        [DEVICES_ROUTE, &self.device_id, MODULES_ROUTE, &self.id]
    }
}

/// Module registry operations.
pub trait ModulesClient {
    /// Creates a module.
    ///
    /// # Errors
    ///
    /// An identifier is empty, the module already carries an entity tag, or
    /// the service rejects the request.
    fn create_module(&self, module: &Module) -> impl Future<Output = Result<Module>> + Send;

    /// Retrieves a module.
    ///
    /// # Errors
    ///
    /// An identifier is empty or the service rejects the request.
    fn get_module(
        &self,
        device_id: &str,
        module_id: &str,
    ) -> impl Future<Output = Result<Module>> + Send;

    /// Retrieves every module of a device.
    ///
    /// # Errors
    ///
    /// The identifier is empty or the service rejects the request.
    fn get_modules_on_device(
        &self,
        device_id: &str,
    ) -> impl Future<Output = Result<Vec<Module>>> + Send;

    /// Replaces a module.
    ///
    /// # Errors
    ///
    /// The module has no entity tag and the operation is not forced, or the
    /// service rejects the request.
    fn replace_module(
        &self,
        module: &Module,
        force: bool,
    ) -> impl Future<Output = Result<Module>> + Send;

    /// Deletes a module.
    ///
    /// # Errors
    ///
    /// The module has no entity tag and the operation is not forced, or the
    /// service rejects the request.
    fn delete_module(&self, module: &Module, force: bool)
    -> impl Future<Output = Result<()>> + Send;
}

impl<T, S> ModulesClient for RegistryClient<T, S>
where
    T: HttpTransport,
    S: PayloadSerializer,
{
    async fn create_module(&self, module: &Module) -> Result<Module> {
        module.check_ids()?;
        if module.etag.is_some() {
            return Err(Error::new(
                ErrorKind::ArgumentInvalid,
                "A module to be created must not carry an ETag",
            ));
        }

        let request = self.request(RestKind::Put, module.route());
        let created: Module = self.execute_parse(self.with_body(request, module)?, 200).await?;

        info!("Module `{}/{}` created", created.device_id, created.id);
        Ok(created)
    }

    async fn get_module(&self, device_id: &str, module_id: &str) -> Result<Module> {
        check_id(device_id, "device")?;
        check_id(module_id, "module")?;

        let request = self.request(
            RestKind::Get,
            [DEVICES_ROUTE, device_id, MODULES_ROUTE, module_id],
        );
        self.execute_parse(request, 200).await
    }

    async fn get_modules_on_device(&self, device_id: &str) -> Result<Vec<Module>> {
        check_id(device_id, "device")?;

        let request = self.request(RestKind::Get, [DEVICES_ROUTE, device_id, MODULES_ROUTE]);
        self.execute_parse(request, 200).await
    }

    async fn replace_module(&self, module: &Module, force: bool) -> Result<Module> {
        module.check_ids()?;
        let etag = if_match(module.etag.as_deref(), force, "module")?;

        let request = self
            .request(RestKind::Put, module.route())
            .header("If-Match", etag);
        let replaced: Module = self.execute_parse(self.with_body(request, module)?, 200).await?;

        info!("Module `{}/{}` replaced", replaced.device_id, replaced.id);
        Ok(replaced)
    }

    async fn delete_module(&self, module: &Module, force: bool) -> Result<()> {
        module.check_ids()?;
        let etag = if_match(module.etag.as_deref(), force, "module")?;

        let request = self
            .request(RestKind::Delete, module.route())
            .header("If-Match", etag);
        self.execute(request, 204).await?;

        info!("Module `{}/{}` deleted", module.device_id, module.id);
        Ok(())
    }
}
