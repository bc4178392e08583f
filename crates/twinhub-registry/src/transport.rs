use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;

use hashbrown::HashMap;

use tracing::debug;

use url::Url;

use crate::auth::Credential;
use crate::config::RegistryConfig;
use crate::error::{Error, ErrorKind, Result};

/// `REST` method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RestKind {
    /// `GET` method.
    Get,
    /// `PUT` method.
    Put,
    /// `POST` method.
    Post,
    /// `DELETE` method.
    Delete,
}

impl std::fmt::Display for RestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
        .fmt(f)
    }
}

/// A transport-agnostic registry request.
///
/// The path is kept as a list of segments, each one is percent-encoded by
/// the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    kind: RestKind,
    segments: Vec<String>,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Option<String>,
}

impl HttpRequest {
    /// Creates an [`HttpRequest`].
    #[must_use]
    pub fn new<I, P>(kind: RestKind, segments: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            kind,
            segments: segments.into_iter().map(Into::into).collect(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Adds a query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Returns the [`RestKind`].
    #[must_use]
    pub const fn kind(&self) -> RestKind {
        self.kind
    }

    /// Returns the path segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns the path, with segments joined but not encoded.
    #[must_use]
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }

    /// Returns the query parameters.
    #[must_use]
    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    /// Returns the value of a query parameter.
    #[must_use]
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find_map(|(k, v)| (k == key).then_some(v.as_str()))
    }

    /// Returns the headers.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Returns the value of a header, ignoring the name case.
    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find_map(|(k, v)| k.eq_ignore_ascii_case(name).then_some(v.as_str()))
    }

    /// Returns the body.
    ///
    /// If [`None`], the request has no body.
    #[must_use]
    pub fn body_value(&self) -> Option<&str> {
        self.body.as_deref()
    }
}

/// A transport-agnostic registry response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    status: u16,
    headers: HashMap<String, String>,
    body: Bytes,
}

impl HttpResponse {
    /// Creates an [`HttpResponse`].
    #[must_use]
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Adds a header. Header names are stored in lowercase.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Returns the status.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Returns the value of a header, ignoring the name case.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name.to_ascii_lowercase().as_str())
            .map(String::as_str)
    }

    /// Returns the raw body.
    #[must_use]
    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body as text, replacing invalid `UTF-8` sequences.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// The seam between registry operations and the network.
///
/// A transport only moves requests and responses: status validation and
/// error classification are performed by the registry client.
pub trait HttpTransport: Send + Sync {
    /// Sends a request and returns the response, whatever its status.
    ///
    /// # Errors
    ///
    /// The service cannot be reached or it does not answer in time.
    fn send(&self, request: HttpRequest) -> impl Future<Output = Result<HttpResponse>> + Send;
}

/// An [`HttpTransport`] backed by a connection-pooled [`reqwest::Client`].
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: Url,
    credential: Arc<dyn Credential>,
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl ReqwestTransport {
    /// Creates a [`ReqwestTransport`].
    ///
    /// # Errors
    ///
    /// The base address is not valid or the client cannot be built.
    pub fn new(config: &RegistryConfig, credential: impl Credential) -> Result<Self> {
        let base_url = Url::parse(&config.base_url()).map_err(|e| {
            Error::new(
                ErrorKind::ArgumentInvalid,
                format!("Invalid registry address `{}`: {e}", config.base_url()),
            )
        })?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_ref())
            .build()?;

        Ok(Self {
            client,
            base_url,
            credential: Arc::new(credential),
        })
    }

    fn url(&self, request: &HttpRequest) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                Error::new(
                    ErrorKind::ArgumentInvalid,
                    format!("`{}` cannot be a base address", self.base_url),
                )
            })?
            .pop_if_empty()
            .extend(&request.segments);

        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }

        Ok(url)
    }
}

impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = self.url(&request)?;
        debug!("{} {url}", request.kind);

        let method = match request.kind {
            RestKind::Get => reqwest::Method::GET,
            RestKind::Put => reqwest::Method::PUT,
            RestKind::Post => reqwest::Method::POST,
            RestKind::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self
            .client
            .request(method, url)
            .header("Authorization", self.credential.authorization()?);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.bytes().await?;

        debug!("Response status {status}");

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
