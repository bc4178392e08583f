use std::borrow::Cow;

use serde::Serialize;
use serde::de::DeserializeOwned;

use tracing::debug;

use twinhub::serializer::{CompactJson, PayloadSerializer};

use crate::auth::{Credential, SharedAccessKeyCredential};
use crate::config::{ConnectionString, DEFAULT_API_VERSION, RegistryConfig};
use crate::error::{Error, ErrorKind, Result};
use crate::request::check_status;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, RestKind};

const API_VERSION_KEY: &str = "api-version";

/// The registry client.
///
/// Implements [`DevicesClient`](crate::device::DevicesClient),
/// [`ModulesClient`](crate::module::ModulesClient) and
/// [`ConfigurationsClient`](crate::configuration::ConfigurationsClient) on
/// top of an [`HttpTransport`], serializing bodies with a
/// [`PayloadSerializer`].
///
/// Every operation validates the response against exactly one expected
/// status and classifies any other status once.
#[derive(Debug, Clone)]
pub struct RegistryClient<T, S = CompactJson>
where
    T: HttpTransport,
    S: PayloadSerializer,
{
    transport: T,
    serializer: S,
    api_version: Cow<'static, str>,
}

impl RegistryClient<ReqwestTransport, CompactJson> {
    /// Creates a [`RegistryClient`] from a service connection string,
    /// signing requests with its shared access key.
    ///
    /// # Errors
    ///
    /// The connection string is malformed or the client cannot be built.
    pub fn from_connection_string(connection_string: &str) -> Result<Self> {
        let connection_string: ConnectionString = connection_string.parse()?;
        let credential = SharedAccessKeyCredential::from_connection_string(&connection_string)?;
        Self::from_config(&connection_string.config(), credential)
    }

    /// Creates a [`RegistryClient`] from a [`RegistryConfig`] and a
    /// [`Credential`].
    ///
    /// # Errors
    ///
    /// The client cannot be built.
    pub fn from_config(config: &RegistryConfig, credential: impl Credential) -> Result<Self> {
        let transport = ReqwestTransport::new(config, credential)?;
        Ok(Self::new(transport).api_version(config.api_version.clone()))
    }
}

impl<T> RegistryClient<T, CompactJson>
where
    T: HttpTransport,
{
    /// Creates a [`RegistryClient`] with the [`CompactJson`] serializer.
    #[must_use]
    #[inline]
    pub fn new(transport: T) -> Self {
        Self::with_serializer(transport, CompactJson)
    }
}

impl<T, S> RegistryClient<T, S>
where
    T: HttpTransport,
    S: PayloadSerializer,
{
    /// Creates a [`RegistryClient`] with the given serializer.
    #[must_use]
    pub const fn with_serializer(transport: T, serializer: S) -> Self {
        Self {
            transport,
            serializer,
            api_version: Cow::Borrowed(DEFAULT_API_VERSION),
        }
    }

    /// Sets a different API version.
    #[must_use]
    pub fn api_version(mut self, api_version: impl Into<Cow<'static, str>>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Returns the transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    pub(crate) fn request<I, P>(&self, kind: RestKind, segments: I) -> HttpRequest
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        HttpRequest::new(kind, segments).query(API_VERSION_KEY, self.api_version.as_ref())
    }

    pub(crate) fn with_body<B: Serialize + ?Sized>(
        &self,
        request: HttpRequest,
        body: &B,
    ) -> Result<HttpRequest> {
        let payload = self.serializer.serialize(body)?;
        Ok(request
            .header(
                "Content-Type",
                format!(
                    "{}; charset={}",
                    self.serializer.content_type(),
                    self.serializer.content_encoding()
                ),
            )
            .body(payload))
    }

    pub(crate) async fn execute(&self, request: HttpRequest, expected: u16) -> Result<HttpResponse> {
        debug!("{} {}", request.kind(), request.path());
        let response = self.transport.send(request).await?;
        check_status(response, expected)
    }

    pub(crate) async fn execute_parse<R: DeserializeOwned>(
        &self,
        request: HttpRequest,
        expected: u16,
    ) -> Result<R> {
        let response = self.execute(request, expected).await?;
        self.parse(&response)
    }

    pub(crate) fn parse<R: DeserializeOwned>(&self, response: &HttpResponse) -> Result<R> {
        let text = std::str::from_utf8(response.body()).map_err(|e| {
            Error::new(
                ErrorKind::ResponseDeserialization,
                format!("Response body is not valid UTF-8: {e}"),
            )
        })?;

        self.serializer.deserialize(text).map_err(|e| {
            Error::new(
                ErrorKind::ResponseDeserialization,
                format!("Unable to deserialize the response body: {e}"),
            )
        })
    }
}
