use std::borrow::Cow;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, ErrorKind, Result};

/// Default service API version.
pub const DEFAULT_API_VERSION: &str = "2021-04-12";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(100);

/// Default user agent.
pub const DEFAULT_USER_AGENT: &str = concat!("twinhub-registry/", env!("CARGO_PKG_VERSION"));

/// Registry client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    host_name: Cow<'static, str>,
    endpoint: Option<Cow<'static, str>>,
    pub(crate) api_version: Cow<'static, str>,
    pub(crate) timeout: Duration,
    pub(crate) user_agent: Cow<'static, str>,
}

impl RegistryConfig {
    /// Creates a [`RegistryConfig`] for the given service host name.
    #[must_use]
    pub fn new(host_name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            host_name: host_name.into(),
            endpoint: None,
            api_version: Cow::Borrowed(DEFAULT_API_VERSION),
            timeout: DEFAULT_TIMEOUT,
            user_agent: Cow::Borrowed(DEFAULT_USER_AGENT),
        }
    }

    /// Sets a different API version.
    #[must_use]
    pub fn api_version(mut self, api_version: impl Into<Cow<'static, str>>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Sets a different request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets a different user agent.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<Cow<'static, str>>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the endpoint requests are sent to, in place of
    /// `https://<host name>`.
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<Cow<'static, str>>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Returns the service host name.
    #[must_use]
    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    /// Returns the base address of every request.
    #[must_use]
    pub fn base_url(&self) -> Cow<'_, str> {
        match &self.endpoint {
            Some(endpoint) => Cow::Borrowed(endpoint.trim_end_matches('/')),
            None => Cow::Owned(format!("https://{}", self.host_name)),
        }
    }
}

/// A parsed service connection string.
///
/// The accepted shape is
/// `HostName=<host>;SharedAccessKeyName=<name>;SharedAccessKey=<key>`,
/// with keys in any order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    host_name: String,
    shared_access_key_name: String,
    shared_access_key: String,
}

impl ConnectionString {
    /// Returns the service host name.
    #[must_use]
    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    /// Returns the name of the shared access policy.
    #[must_use]
    pub fn shared_access_key_name(&self) -> &str {
        &self.shared_access_key_name
    }

    /// Returns the base64-encoded shared access key.
    #[must_use]
    pub fn shared_access_key(&self) -> &str {
        &self.shared_access_key
    }

    /// Creates a [`RegistryConfig`] with the connection string host name.
    #[must_use]
    pub fn config(&self) -> RegistryConfig {
        RegistryConfig::new(self.host_name.clone())
    }
}

impl FromStr for ConnectionString {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut host_name = None;
        let mut shared_access_key_name = None;
        let mut shared_access_key = None;

        for pair in s.split(';').map(str::trim).filter(|pair| !pair.is_empty()) {
            // Keys may contain `=` padding, so only the first one separates.
            let Some((key, value)) = pair.split_once('=') else {
                return Err(connection_string_error(format!(
                    "Malformed connection string segment `{pair}`"
                )));
            };

            let slot = match key.trim() {
                "HostName" => &mut host_name,
                "SharedAccessKeyName" => &mut shared_access_key_name,
                "SharedAccessKey" => &mut shared_access_key,
                _ => continue,
            };
            *slot = Some(value.trim().to_string()).filter(|value| !value.is_empty());
        }

        Ok(Self {
            host_name: host_name.ok_or_else(|| missing("HostName"))?,
            shared_access_key_name: shared_access_key_name
                .ok_or_else(|| missing("SharedAccessKeyName"))?,
            shared_access_key: shared_access_key.ok_or_else(|| missing("SharedAccessKey"))?,
        })
    }
}

fn missing(key: &str) -> Error {
    connection_string_error(format!("Connection string without `{key}`"))
}

fn connection_string_error(description: String) -> Error {
    Error::new(ErrorKind::ArgumentInvalid, description)
}
