use std::future::Future;

use indexmap::IndexMap;

use serde::{Deserialize, Serialize};

use serde_json::Value;

use tracing::info;

use twinhub::serializer::PayloadSerializer;

use crate::client::RegistryClient;
use crate::device::DEVICES_ROUTE;
use crate::error::{Error, ErrorKind, Result};
use crate::request::{check_id, if_match};
use crate::transport::{HttpTransport, RestKind};

const CONFIGURATIONS_ROUTE: &str = "configurations";
const SCHEMA_VERSION: &str = "1.0";

/// Content a configuration applies to its targets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationContent {
    /// Device twin content, keyed by property path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_content: Option<IndexMap<String, Value>>,
    /// Edge deployment content, keyed by module.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modules_content: Option<IndexMap<String, Value>>,
    /// Module twin content, keyed by property path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_content: Option<IndexMap<String, Value>>,
}

/// Metrics of a configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationMetrics {
    /// Results, keyed by metric name.
    #[serde(default)]
    pub results: IndexMap<String, i64>,
    /// Queries, keyed by metric name.
    #[serde(default)]
    pub queries: IndexMap<String, String>,
}

/// An automatic configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    /// Configuration identifier.
    pub id: String,
    /// Schema version.
    pub schema_version: String,
    /// Labels.
    #[serde(default)]
    pub labels: IndexMap<String, String>,
    /// Applied content.
    #[serde(default)]
    pub content: ConfigurationContent,
    /// Query selecting the targets.
    #[serde(default)]
    pub target_condition: String,
    /// Creation time. Read-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time_utc: Option<String>,
    /// Last update time. Read-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated_time_utc: Option<String>,
    /// Priority, higher values win over lower ones.
    #[serde(default)]
    pub priority: i32,
    /// Metrics computed by the service. Read-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_metrics: Option<ConfigurationMetrics>,
    /// Custom metrics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<ConfigurationMetrics>,
    /// Entity tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl Configuration {
    /// Creates an empty [`Configuration`].
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            schema_version: SCHEMA_VERSION.into(),
            labels: IndexMap::new(),
            content: ConfigurationContent::default(),
            target_condition: String::new(),
            created_time_utc: None,
            last_updated_time_utc: None,
            priority: 0,
            system_metrics: None,
            metrics: None,
            etag: None,
        }
    }

    /// Sets the content.
    #[must_use]
    pub fn content(mut self, content: ConfigurationContent) -> Self {
        self.content = content;
        self
    }

    /// Sets the target condition.
    #[must_use]
    pub fn target_condition(mut self, target_condition: impl Into<String>) -> Self {
        self.target_condition = target_condition.into();
        self
    }

    /// Sets the priority.
    #[must_use]
    pub const fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Adds a label.
    #[must_use]
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Sets the entity tag.
    #[must_use]
    pub fn etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }
}

/// Configuration operations.
pub trait ConfigurationsClient {
    /// Creates a configuration.
    ///
    /// # Errors
    ///
    /// The identifier is empty, the configuration already carries an entity
    /// tag, or the service rejects the request.
    fn create_configuration(
        &self,
        configuration: &Configuration,
    ) -> impl Future<Output = Result<Configuration>> + Send;

    /// Retrieves a configuration.
    ///
    /// # Errors
    ///
    /// The identifier is empty or the service rejects the request.
    fn get_configuration(
        &self,
        configuration_id: &str,
    ) -> impl Future<Output = Result<Configuration>> + Send;

    /// Retrieves up to `max_count` configurations.
    ///
    /// # Errors
    ///
    /// The service rejects the request.
    fn get_configurations(
        &self,
        max_count: u32,
    ) -> impl Future<Output = Result<Vec<Configuration>>> + Send;

    /// Replaces a configuration.
    ///
    /// # Errors
    ///
    /// The configuration has no entity tag and the operation is not forced,
    /// or the service rejects the request.
    fn replace_configuration(
        &self,
        configuration: &Configuration,
        force: bool,
    ) -> impl Future<Output = Result<Configuration>> + Send;

    /// Deletes a configuration.
    ///
    /// # Errors
    ///
    /// The configuration has no entity tag and the operation is not forced,
    /// or the service rejects the request.
    fn delete_configuration(
        &self,
        configuration: &Configuration,
        force: bool,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Applies a configuration content to an edge device.
    ///
    /// # Errors
    ///
    /// The identifier is empty or the service rejects the request.
    fn apply_configuration_on_edge_device(
        &self,
        device_id: &str,
        content: &ConfigurationContent,
    ) -> impl Future<Output = Result<()>> + Send;
}

impl<T, S> ConfigurationsClient for RegistryClient<T, S>
where
    T: HttpTransport,
    S: PayloadSerializer,
{
    async fn create_configuration(&self, configuration: &Configuration) -> Result<Configuration> {
        check_id(&configuration.id, "configuration")?;
        if configuration.etag.is_some() {
            return Err(Error::new(
                ErrorKind::ArgumentInvalid,
                "A configuration to be created must not carry an ETag",
            ));
        }

        let request = self.request(
            RestKind::Put,
            [CONFIGURATIONS_ROUTE, configuration.id.as_str()],
        );
        let created: Configuration = self
            .execute_parse(self.with_body(request, configuration)?, 200)
            .await?;

        info!("Configuration `{}` created", created.id);
        Ok(created)
    }

    async fn get_configuration(&self, configuration_id: &str) -> Result<Configuration> {
        check_id(configuration_id, "configuration")?;
        self.execute_parse(
            self.request(RestKind::Get, [CONFIGURATIONS_ROUTE, configuration_id]),
            200,
        )
        .await
    }

    async fn get_configurations(&self, max_count: u32) -> Result<Vec<Configuration>> {
        let request = self
            .request(RestKind::Get, [CONFIGURATIONS_ROUTE])
            .query("top", max_count.to_string());
        self.execute_parse(request, 200).await
    }

    async fn replace_configuration(
        &self,
        configuration: &Configuration,
        force: bool,
    ) -> Result<Configuration> {
        check_id(&configuration.id, "configuration")?;
        let etag = if_match(configuration.etag.as_deref(), force, "configuration")?;

        let request = self
            .request(
                RestKind::Put,
                [CONFIGURATIONS_ROUTE, configuration.id.as_str()],
            )
            .header("If-Match", etag);
        let replaced: Configuration = self
            .execute_parse(self.with_body(request, configuration)?, 200)
            .await?;

        info!("Configuration `{}` replaced", replaced.id);
        Ok(replaced)
    }

    async fn delete_configuration(&self, configuration: &Configuration, force: bool) -> Result<()> {
        check_id(&configuration.id, "configuration")?;
        let etag = if_match(configuration.etag.as_deref(), force, "configuration")?;

        let request = self
            .request(
                RestKind::Delete,
                [CONFIGURATIONS_ROUTE, configuration.id.as_str()],
            )
            .header("If-Match", etag);
        self.execute(request, 204).await?;

        info!("Configuration `{}` deleted", configuration.id);
        Ok(())
    }

    async fn apply_configuration_on_edge_device(
        &self,
        device_id: &str,
        content: &ConfigurationContent,
    ) -> Result<()> {
        check_id(device_id, "device")?;

        let request = self.request(
            RestKind::Post,
            [DEVICES_ROUTE, device_id, "applyConfigurationContent"],
        );
        self.execute(self.with_body(request, content)?, 204).await?;

        info!("Configuration content applied on `{device_id}`");
        Ok(())
    }
}
