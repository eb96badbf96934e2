// src/error.rs
//! Error types shared across the sync client.
//!
//! Library modules return these typed errors; `main` wraps them in `anyhow`
//! for presentation.

use serde::Deserialize;
use std::time::Duration;

/// Failures while normalizing a user-supplied RSA private key.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    /// Neither a PKCS#1 nor a PKCS#8 marker was found.
    #[error("not a valid key format: expected an RSA PRIVATE KEY or PRIVATE KEY block")]
    UnrecognizedFormat,

    #[error("key body is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    /// The converted DER was not accepted as an RSA private key.
    #[error("private key rejected: {0}")]
    Rejected(String),
}

/// Failures while importing, loading or persisting stored credentials.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("device id seems to be invalid: expected 36 characters, got {0}")]
    InvalidDeviceId(usize),

    #[error("private key seems to be invalid: {0}")]
    InvalidKey(#[from] KeyError),

    #[error("no stored credentials; run `dpt-sync register` first")]
    Missing,

    #[error("credential storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by the device client and the upload workflow.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// The request was aborted by its own deadline.
    #[error("request to {path} timed out after {after:?}")]
    Timeout { path: String, after: Duration },

    /// TLS handshake or certificate validation failed against the device.
    #[error(
        "could not connect securely to the device; its certificate may not be trusted \
         (set accept_invalid_certs to trust the device's self-signed certificate): {0}"
    )]
    Certificate(#[source] reqwest::Error),

    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Any non-success HTTP status. The raw body is kept for introspection.
    #[error("{}", describe_http_status(.status, .body))]
    HttpStatus { status: u16, body: String },

    /// The device refused the nonce/signature exchange.
    #[error("authentication failed: device answered HTTP {status}")]
    AuthFailed { status: u16 },

    /// Fetching the source document failed.
    #[error("could not download {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("{path} does not exist on the device")]
    NotFound { path: String },

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("malformed response from device: {0}")]
    Decode(#[from] serde_json::Error),
}

impl DeviceError {
    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            DeviceError::HttpStatus { status, .. } | DeviceError::AuthFailed { status } => {
                Some(*status)
            }
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// True when the stored credentials should be considered invalid.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, DeviceError::AuthFailed { .. }) || self.status() == Some(401)
    }
}

/// JSON error payload the device attaches to failed requests.
#[derive(Deserialize)]
struct DeviceErrorBody {
    #[serde(default)]
    error_code: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

fn describe_http_status(status: &u16, body: &str) -> String {
    match serde_json::from_str::<DeviceErrorBody>(body) {
        Ok(DeviceErrorBody {
            error_code,
            message: Some(message),
        }) => {
            let code = match error_code {
                Some(serde_json::Value::String(s)) => s,
                Some(other) => other.to_string(),
                None => "unknown".to_string(),
            };
            format!("HTTP {status} from device. Error {code}: {message}")
        }
        _ => format!("request returned status code: {status}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_uses_device_json_message() {
        let err = DeviceError::HttpStatus {
            status: 400,
            body: r#"{"error_code":"40001","message":"Invalid parameter"}"#.to_string(),
        };
        assert_eq!(
            err.to_string(),
            "HTTP 400 from device. Error 40001: Invalid parameter"
        );
    }

    #[test]
    fn http_error_without_json_body_falls_back_to_status() {
        let err = DeviceError::HttpStatus {
            status: 500,
            body: "<html>oops</html>".to_string(),
        };
        assert_eq!(err.to_string(), "request returned status code: 500");
    }

    #[test]
    fn numeric_error_code_is_rendered() {
        let err = DeviceError::HttpStatus {
            status: 404,
            body: r#"{"error_code":40401,"message":"Not found"}"#.to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 404 from device. Error 40401: Not found");
    }

    #[test]
    fn classification_helpers() {
        let missing = DeviceError::HttpStatus { status: 404, body: String::new() };
        assert!(missing.is_not_found());
        assert!(!missing.is_auth_failure());

        let unauthorized = DeviceError::HttpStatus { status: 401, body: String::new() };
        assert!(unauthorized.is_auth_failure());

        assert!(DeviceError::AuthFailed { status: 401 }.is_auth_failure());
        assert!(DeviceError::Validation("x".into()).status().is_none());
    }
}
