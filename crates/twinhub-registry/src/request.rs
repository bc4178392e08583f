use std::future::Future;

use tokio_util::sync::CancellationToken;

use tracing::{debug, warn};

use crate::classifier::classify_response;
use crate::error::{Error, ErrorKind, Result};
use crate::transport::HttpResponse;

/// Wildcard `ETag`, matching any version of an entity.
pub const WILDCARD_ETAG: &str = "*";

/// Races a registry operation against a [`CancellationToken`].
///
/// When the token is cancelled first, the operation future is dropped,
/// aborting any in-flight transport call, and [`None`] is returned.
/// Cancellation is never reported as an [`Error`].
pub async fn cancellable<F: Future>(token: &CancellationToken, future: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        () = token.cancelled() => {
            debug!("Registry operation cancelled");
            None
        }
        output = future => Some(output),
    }
}

pub(crate) fn check_id(id: &str, what: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(Error::new(
            ErrorKind::ArgumentInvalid,
            format!("The {what} identifier must not be empty"),
        ));
    }
    Ok(())
}

// Computes the `If-Match` header of a mutating operation.
pub(crate) fn if_match(etag: Option<&str>, force: bool, what: &str) -> Result<String> {
    if force {
        return Ok(WILDCARD_ETAG.into());
    }

    match etag.map(str::trim).filter(|etag| !etag.is_empty()) {
        Some(etag) if etag.starts_with('"') && etag.ends_with('"') && etag.len() > 1 => {
            Ok(etag.into())
        }
        Some(etag) => Ok(format!("\"{etag}\"")),
        None => Err(Error::new(
            ErrorKind::ArgumentInvalid,
            format!("The {what} has no ETag, set it or force the operation"),
        )),
    }
}

// Validates a response against the single expected status. Any other status
// is classified.
pub(crate) fn check_status(response: HttpResponse, expected: u16) -> Result<HttpResponse> {
    if response.status() == expected {
        return Ok(response);
    }

    warn!(
        "Expected status {expected}, the service returned {}",
        response.status()
    );
    Err(classify_response(&response))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_util::sync::CancellationToken;

    use crate::error::ErrorKind;
    use crate::transport::HttpResponse;

    use super::{cancellable, check_id, check_status, if_match};

    #[test]
    fn if_match_header() {
        assert_eq!(if_match(Some("AAAA"), false, "device").unwrap(), "\"AAAA\"");
        assert_eq!(
            if_match(Some("\"AAAA\""), false, "device").unwrap(),
            "\"AAAA\""
        );
        assert_eq!(if_match(None, true, "device").unwrap(), "*");
        assert_eq!(if_match(Some("AAAA"), true, "device").unwrap(), "*");

        for etag in [None, Some(""), Some("  ")] {
            assert_eq!(
                if_match(etag, false, "device").unwrap_err().kind(),
                ErrorKind::ArgumentInvalid
            );
        }
    }

    #[test]
    fn identifiers() {
        assert!(check_id("thermostat", "device").is_ok());
        assert_eq!(
            check_id(" ", "device").unwrap_err().kind(),
            ErrorKind::ArgumentInvalid
        );
    }

    #[test]
    fn single_expected_status() {
        assert!(check_status(HttpResponse::new(204, ""), 204).is_ok());

        // A success status other than the expected one is still a failure.
        let error = check_status(HttpResponse::new(200, ""), 204).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidErrorCode);

        let error = check_status(HttpResponse::new(404, ""), 200).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn cancellation_yields_none() {
        let token = CancellationToken::new();

        assert_eq!(cancellable(&token, async { 42 }).await, Some(42));

        token.cancel();
        let pending = async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            42
        };
        assert_eq!(cancellable(&token, pending).await, None);
    }
}
