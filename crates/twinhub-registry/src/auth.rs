use std::borrow::Cow;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use hmac::{Hmac, Mac};

use sha2::Sha256;

use url::form_urlencoded::byte_serialize;

use crate::config::ConnectionString;
use crate::error::{Error, ErrorKind, Result};

type HmacSha256 = Hmac<Sha256>;

/// Default time-to-live of a shared access signature.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(3600);

/// A source of `Authorization` header values.
pub trait Credential: Send + Sync + 'static {
    /// Returns the value of the `Authorization` header of the next request.
    ///
    /// # Errors
    ///
    /// The token cannot be produced.
    fn authorization(&self) -> Result<String>;
}

/// A pre-built token, sent as is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticToken(Cow<'static, str>);

impl StaticToken {
    /// Creates a [`StaticToken`].
    #[must_use]
    pub fn new(token: impl Into<Cow<'static, str>>) -> Self {
        Self(token.into())
    }
}

impl Credential for StaticToken {
    fn authorization(&self) -> Result<String> {
        Ok(self.0.to_string())
    }
}

/// Signs shared access signatures with a shared access key.
///
/// A new signature, valid for the configured time-to-live, is produced for
/// every request.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedAccessKeyCredential {
    resource: String,
    key_name: String,
    key: Vec<u8>,
    ttl: Duration,
}

impl std::fmt::Debug for SharedAccessKeyCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The key is never printed.
        f.debug_struct("SharedAccessKeyCredential")
            .field("resource", &self.resource)
            .field("key_name", &self.key_name)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl SharedAccessKeyCredential {
    /// Creates a [`SharedAccessKeyCredential`].
    ///
    /// # Errors
    ///
    /// The key is not valid base64.
    pub fn new(
        host_name: impl Into<String>,
        key_name: impl Into<String>,
        key: &str,
    ) -> Result<Self> {
        let key = STANDARD.decode(key.trim()).map_err(|e| {
            Error::new(
                ErrorKind::ArgumentInvalid,
                format!("Shared access key is not valid base64: {e}"),
            )
        })?;

        Ok(Self {
            resource: host_name.into(),
            key_name: key_name.into(),
            key,
            ttl: DEFAULT_TOKEN_TTL,
        })
    }

    /// Creates a [`SharedAccessKeyCredential`] from a [`ConnectionString`].
    ///
    /// # Errors
    ///
    /// The key is not valid base64.
    pub fn from_connection_string(connection_string: &ConnectionString) -> Result<Self> {
        Self::new(
            connection_string.host_name(),
            connection_string.shared_access_key_name(),
            connection_string.shared_access_key(),
        )
    }

    /// Sets a different time-to-live.
    #[must_use]
    pub const fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Builds a shared access signature expiring at the given Unix time.
    ///
    /// # Errors
    ///
    /// The signing key is rejected.
    pub fn sign(&self, expiry: u64) -> Result<String> {
        let resource: String = byte_serialize(self.resource.as_bytes()).collect();
        let to_sign = format!("{resource}\n{expiry}");

        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| Error::new(ErrorKind::ArgumentInvalid, e.to_string()))?;
        mac.update(to_sign.as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());
        let signature: String = byte_serialize(signature.as_bytes()).collect();

        Ok(format!(
            "SharedAccessSignature sr={resource}&sig={signature}&se={expiry}&skn={}",
            self.key_name
        ))
    }
}

impl Credential for SharedAccessKeyCredential {
    fn authorization(&self) -> Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| Error::new(ErrorKind::InvalidOperation, e.to_string()))?;
        self.sign((now + self.ttl).as_secs())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    use crate::config::ConnectionString;
    use crate::error::ErrorKind;

    use super::{Credential, SharedAccessKeyCredential, StaticToken};

    const KEY: &str = "c2VjcmV0a2V5MQ==";

    fn query_value<'a>(token: &'a str, key: &str) -> &'a str {
        token
            .trim_start_matches("SharedAccessSignature ")
            .split('&')
            .find_map(|pair| pair.strip_prefix(key)?.strip_prefix('='))
            .unwrap()
    }

    #[test]
    fn static_token() {
        assert_eq!(
            StaticToken::new("SharedAccessSignature sr=a&sig=b")
                .authorization()
                .unwrap(),
            "SharedAccessSignature sr=a&sig=b"
        );
    }

    #[test]
    fn signature_shape() {
        let credential = SharedAccessKeyCredential::new("hub.example.net", "iothubowner", KEY)
            .unwrap()
            .ttl(Duration::from_secs(60));

        let token = credential.sign(1_700_000_000).unwrap();

        assert!(token.starts_with("SharedAccessSignature "));
        assert_eq!(query_value(&token, "sr"), "hub.example.net");
        assert_eq!(query_value(&token, "se"), "1700000000");
        assert_eq!(query_value(&token, "skn"), "iothubowner");

        // HMAC-SHA256 signatures are 32 bytes long.
        let signature: String = url::form_urlencoded::parse(
            format!("sig={}", query_value(&token, "sig")).as_bytes(),
        )
        .map(|(_, value)| value.into_owned())
        .collect();
        assert_eq!(STANDARD.decode(signature).unwrap().len(), 32);
    }

    #[test]
    fn signature_is_deterministic() {
        let credential =
            SharedAccessKeyCredential::new("hub.example.net", "iothubowner", KEY).unwrap();
        let other =
            SharedAccessKeyCredential::new("hub.example.net", "iothubowner", "b3RoZXJrZXk=")
                .unwrap();

        assert_eq!(credential.sign(42).unwrap(), credential.sign(42).unwrap());
        assert_ne!(credential.sign(42).unwrap(), credential.sign(43).unwrap());
        assert_ne!(credential.sign(42).unwrap(), other.sign(42).unwrap());
    }

    #[test]
    fn from_connection_string() {
        let connection_string: ConnectionString =
            format!("HostName=hub.example.net;SharedAccessKeyName=iothubowner;SharedAccessKey={KEY}")
                .parse()
                .unwrap();
        let credential = SharedAccessKeyCredential::from_connection_string(&connection_string)
            .unwrap();

        let token = credential.authorization().unwrap();
        assert_eq!(query_value(&token, "skn"), "iothubowner");
        assert!(!format!("{credential:?}").contains(KEY));
    }

    #[test]
    fn invalid_key() {
        assert_eq!(
            SharedAccessKeyCredential::new("hub.example.net", "iothubowner", "not base64!")
                .unwrap_err()
                .kind(),
            ErrorKind::ArgumentInvalid
        );
    }
}
