use serde_json::{Map, Value};

use crate::error::{Error, ErrorKind};
use crate::error_code::ErrorCode;
use crate::transport::HttpResponse;

/// Response header which may carry the service error code name.
pub const ERROR_CODE_HEADER: &str = "iothub-errorcode";
/// Response header carrying the request identifier, used as tracking
/// identifier when the body does not provide one.
pub const REQUEST_ID_HEADER: &str = "x-ms-request-id";

const ERROR_CODE_PREFIX: &str = "ErrorCode:";
const TRACKING_ID_PREFIX: &str = "Tracking ID:";

/// Classifies a failed response from its status and body.
///
/// The function is total: every input produces exactly one [`Error`].
#[must_use]
pub fn classify(status: u16, body: &str) -> Error {
    classify_parts(status, body, None, None)
}

/// Classifies a failed [`HttpResponse`], taking its headers into account.
#[must_use]
pub fn classify_response(response: &HttpResponse) -> Error {
    classify_parts(
        response.status(),
        &response.text(),
        response.header(ERROR_CODE_HEADER),
        response.header(REQUEST_ID_HEADER),
    )
}

/// Returns the [`ErrorKind`] and the transience deduced from an HTTP status
/// alone.
#[must_use]
pub const fn status_fallback(status: u16) -> (ErrorKind, bool) {
    match status {
        400 => (ErrorKind::ArgumentInvalid, false),
        401 => (ErrorKind::Unauthorized, false),
        403 => (ErrorKind::Unauthorized, false),
        404 => (ErrorKind::NotFound, false),
        409 => (ErrorKind::Conflict, false),
        412 => (ErrorKind::PreconditionFailed, false),
        413 => (ErrorKind::MessageTooLarge, false),
        429 => (ErrorKind::Throttling, true),
        503 => (ErrorKind::ServerBusy, true),
        504 => (ErrorKind::GatewayTimeout, true),
        500..=599 => (ErrorKind::ServerError, true),
        _ => (ErrorKind::InvalidErrorCode, false),
    }
}

fn classify_parts(
    status: u16,
    body: &str,
    header_code: Option<&str>,
    request_id: Option<&str>,
) -> Error {
    let failure = ServiceFailure::parse(body);

    let code = failure.code.or_else(|| header_code.and_then(code_from_str));
    let message = failure
        .message
        .unwrap_or_else(|| status_message(status));

    let error = match code {
        Some(code) => Error::init(code.kind(), code, code.is_transient(), message),
        None => {
            let (kind, transient) = status_fallback(status);
            Error::init(kind, ErrorCode::InvalidErrorCode, transient, message)
        }
    };

    match failure
        .tracking_id
        .or_else(|| request_id.map(String::from))
    {
        Some(tracking_id) => error.with_tracking_id(tracking_id),
        None => error,
    }
}

fn status_message(status: u16) -> String {
    match reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|status| status.canonical_reason())
    {
        Some(reason) => format!("Service returned status {status} ({reason})"),
        None => format!("Service returned status {status}"),
    }
}

// The information extracted from an error body. Every field is optional.
#[derive(Debug, Default, PartialEq)]
struct ServiceFailure {
    code: Option<ErrorCode>,
    message: Option<String>,
    tracking_id: Option<String>,
}

impl ServiceFailure {
    fn parse(body: &str) -> Self {
        let body = body.trim();
        if body.is_empty() {
            return Self::default();
        }

        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(object)) => Self::from_object(&object),
            Ok(Value::String(text)) => Self::from_text(&text),
            _ => Self::from_text(body),
        }
    }

    fn from_object(object: &Map<String, Value>) -> Self {
        let mut failure = Self {
            code: object.get("errorCode").and_then(code_from_value),
            message: string_field(object, "message"),
            tracking_id: string_field(object, "trackingId"),
        };

        // Legacy shape.
        if let Some(legacy) = string_field(object, "Message") {
            failure.merge(Self::from_text(&legacy));
        }
        if let Some(exception) = string_field(object, "ExceptionMessage") {
            failure.tracking_id = failure
                .tracking_id
                .or_else(|| tracking_id_from_text(&exception));
        }

        failure
    }

    fn from_text(text: &str) -> Self {
        // A JSON document embedded in the text takes precedence over the
        // text preceding it.
        if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}'))
            && start < end
            && let Ok(Value::Object(object)) = serde_json::from_str::<Value>(&text[start..=end])
        {
            let mut failure = Self::from_object(&object);
            failure.merge(Self::from_tokens(&text[..start]));
            return failure;
        }

        Self::from_tokens(text)
    }

    fn from_tokens(text: &str) -> Self {
        let tracking_id = tracking_id_from_text(text);

        if let Some(index) = text.find(ERROR_CODE_PREFIX) {
            let rest = &text[index + ERROR_CODE_PREFIX.len()..];
            let (name, message) = rest.split_once(';').unwrap_or((rest, ""));
            return Self {
                code: code_from_str(name),
                message: non_empty(message),
                tracking_id,
            };
        }

        Self {
            code: text
                .split(|c: char| !c.is_ascii_digit())
                .filter(|token| token.len() == 6)
                .find_map(code_from_str),
            message: non_empty(text),
            tracking_id,
        }
    }

    fn merge(&mut self, other: Self) {
        self.code = self.code.or(other.code);
        self.message = self.message.take().or(other.message);
        self.tracking_id = self.tracking_id.take().or(other.tracking_id);
    }
}

fn known(code: ErrorCode) -> Option<ErrorCode> {
    (code != ErrorCode::InvalidErrorCode).then_some(code)
}

fn code_from_str(text: &str) -> Option<ErrorCode> {
    let text = text.trim();
    match text.parse::<u32>() {
        Ok(value) => known(ErrorCode::from_value(value)),
        Err(_) => known(ErrorCode::from_name(text)),
    }
}

fn code_from_value(value: &Value) -> Option<ErrorCode> {
    match value {
        Value::Number(number) => number
            .as_u64()
            .and_then(|value| u32::try_from(value).ok())
            .and_then(|value| known(ErrorCode::from_value(value))),
        Value::String(text) => code_from_str(text),
        _ => None,
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).and_then(non_empty)
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn tracking_id_from_text(text: &str) -> Option<String> {
    let index = text.find(TRACKING_ID_PREFIX)?;
    let rest = text[index + TRACKING_ID_PREFIX.len()..].trim_start();
    let end = rest
        .find(|c: char| c.is_whitespace() || c == ';' || c == ',')
        .unwrap_or(rest.len());
    non_empty(&rest[..end])
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::error::ErrorKind;
    use crate::error_code::ErrorCode;
    use crate::transport::HttpResponse;

    use super::{classify, classify_response, status_fallback};

    const STATUSES: [u16; 10] = [400, 401, 403, 404, 409, 412, 413, 429, 500, 503];

    #[test]
    fn totality() {
        for status in STATUSES {
            let (kind, transient) = status_fallback(status);

            // Missing body.
            let error = classify(status, "");
            assert_eq!(error.kind(), kind, "{status}");
            assert_eq!(error.is_transient(), transient, "{status}");
            assert_eq!(error.code(), ErrorCode::InvalidErrorCode);
            assert!(!error.message().is_empty());

            // Well-formed body without a known code.
            let body = json!({"message": "Something happened", "trackingId": "t-1"});
            let error = classify(status, &body.to_string());
            assert_eq!(error.kind(), kind, "{status}");
            assert_eq!(error.is_transient(), transient, "{status}");
            assert_eq!(error.message(), "Something happened");
            assert_eq!(error.tracking_id(), Some("t-1"));

            // Garbage.
            let error = classify(status, "<html>oops</html>");
            assert_eq!(error.kind(), kind, "{status}");
        }
    }

    #[test]
    fn transience_table() {
        let transient = STATUSES
            .into_iter()
            .filter(|status| classify(*status, "").is_transient())
            .collect::<Vec<_>>();
        assert_eq!(transient, [429, 500, 503]);

        assert!(classify(504, "").is_transient());
        assert!(classify(502, "").is_transient());
        assert!(!classify(418, "").is_transient());
        assert_eq!(classify(418, "").kind(), ErrorKind::InvalidErrorCode);

        // A bare 403 is a client failure.
        let error = classify(403, "");
        assert_eq!(error.kind(), ErrorKind::Unauthorized);
        assert!(!error.is_transient());

        // Quota exceeded is transient despite its 403 family.
        let error = classify(403, r#"{"errorCode": 403002, "message": "Quota"}"#);
        assert_eq!(error.kind(), ErrorKind::QuotaExceeded);
        assert!(error.is_transient());

        let error = classify(412, r#"{"errorCode": 412001, "message": "Stale"}"#);
        assert_eq!(error.kind(), ErrorKind::PreconditionFailed);
        assert!(!error.is_transient());
    }

    #[test]
    fn json_body() {
        let body = json!({
            "errorCode": 409001,
            "message": "Device `thermostat` already exists",
            "trackingId": "abc123",
        });
        let error = classify(409, &body.to_string());

        assert_eq!(error.kind(), ErrorKind::DeviceAlreadyExists);
        assert_eq!(error.code(), ErrorCode::DeviceAlreadyExists);
        assert_eq!(error.message(), "Device `thermostat` already exists");
        assert_eq!(error.tracking_id(), Some("abc123"));
        assert!(!error.is_transient());

        // String codes are accepted as well.
        let error = classify(404, r#"{"errorCode": "404010", "message": "No module"}"#);
        assert_eq!(error.kind(), ErrorKind::ModuleNotFound);
    }

    #[test]
    fn legacy_body() {
        let body = json!({
            "Message": "ErrorCode:DeviceNotFound;Device `thermostat` not found.",
            "ExceptionMessage": "Tracking ID:1a2b3c-G:5",
        });
        let error = classify(404, &body.to_string());

        assert_eq!(error.kind(), ErrorKind::DeviceNotFound);
        assert_eq!(error.code(), ErrorCode::DeviceNotFound);
        assert_eq!(error.message(), "Device `thermostat` not found.");
        assert_eq!(error.tracking_id(), Some("1a2b3c-G:5"));
    }

    #[test]
    fn legacy_body_with_embedded_document() {
        let body = json!({
            "Message": "ErrorCode:ArgumentInvalid;{\"errorCode\":400004,\"message\":\"Bad id\",\"trackingId\":\"t1\"}",
            "ExceptionMessage": "Tracking ID:ignored",
        });
        let error = classify(400, &body.to_string());

        assert_eq!(error.kind(), ErrorKind::ArgumentInvalid);
        assert_eq!(error.code(), ErrorCode::ArgumentInvalid);
        assert_eq!(error.message(), "Bad id");
        assert_eq!(error.tracking_id(), Some("t1"));
    }

    #[test]
    fn free_text_body() {
        let error = classify(404, "DeviceNotFound code=404001");
        assert_eq!(error.code(), ErrorCode::DeviceNotFound);
        assert_eq!(error.message(), "DeviceNotFound code=404001");
        assert!(!error.is_transient());

        let error = classify(429, "ErrorCode:ThrottlingException;Slow down");
        assert_eq!(error.kind(), ErrorKind::Throttling);
        assert!(error.is_transient());
        assert_eq!(error.message(), "Slow down");
    }

    #[test]
    fn unknown_code_falls_back_to_status() {
        let error = classify(404, r#"{"errorCode": 404999, "message": "Unknown"}"#);

        assert_eq!(error.code(), ErrorCode::InvalidErrorCode);
        assert_eq!(error.kind(), ErrorKind::NotFound);
        assert!(!error.is_transient());

        let error = classify(503, r#"{"errorCode": 503999}"#);
        assert_eq!(error.kind(), ErrorKind::ServerBusy);
        assert!(error.is_transient());
    }

    #[test]
    fn partition_not_found_is_not_authoritative() {
        for (status, code) in [(404, 404_003), (503, 503_003)] {
            let error = classify(status, &json!({"errorCode": code}).to_string());
            assert_eq!(error.kind(), ErrorKind::InvalidErrorCode);
            assert!(!error.is_transient());
        }
    }

    #[test]
    fn headers() {
        let response = HttpResponse::new(404, "")
            .with_header("IotHub-ErrorCode", "DeviceNotFound")
            .with_header("x-ms-request-id", "req-42");
        let error = classify_response(&response);

        assert_eq!(error.kind(), ErrorKind::DeviceNotFound);
        assert_eq!(error.tracking_id(), Some("req-42"));

        // The body tracking identifier wins over the header.
        let response = HttpResponse::new(409, r#"{"errorCode": 409001, "trackingId": "body"}"#)
            .with_header("x-ms-request-id", "header");
        let error = classify_response(&response);

        assert_eq!(error.kind(), ErrorKind::DeviceAlreadyExists);
        assert_eq!(error.tracking_id(), Some("body"));

        // No tracking identifier at all.
        assert_eq!(classify_response(&HttpResponse::new(500, "")).tracking_id(), None);
    }
}
