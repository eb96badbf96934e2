// src/device/transport.rs
//! Low-level HTTP access to the device.
//!
//! Owns the `reqwest` client (with its cookie jar, which carries the device's
//! session after `/auth`), turns transport failures into classified
//! [`DeviceError`]s, and enforces per-request deadlines.

use crate::config::Settings;
use crate::error::DeviceError;
use crate::utils::serialization::deserialize;
use log::debug;
use reqwest::{multipart::Form, Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error as StdError;
use std::future::Future;
use std::io;
use std::time::Duration;

/// Body and deadline for a single device request.
pub struct RequestOptions {
    method: Method,
    json: Option<serde_json::Value>,
    form: Option<Form>,
    timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            json: None,
            form: None,
            timeout: None,
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    pub fn put() -> Self {
        Self::new(Method::PUT)
    }

    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    /// Sends `payload` as a JSON body with `Content-Type: application/json`.
    pub fn json<T: Serialize>(mut self, payload: &T) -> Result<Self, DeviceError> {
        self.json = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    pub fn multipart(mut self, form: Form) -> Self {
        self.form = Some(form);
        self
    }

    /// Aborts the request after `timeout` and reports [`DeviceError::Timeout`].
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// HTTP access to one device.
///
/// Clones share the connection pool and the cookie jar; separately built
/// transports do not.
#[derive(Clone)]
pub struct DeviceTransport {
    http: Client,
    base_url: String,
    default_timeout: Option<Duration>,
    ping_timeout: Duration,
}

impl DeviceTransport {
    /// Builds a transport from settings.
    ///
    /// # Errors
    /// Returns [`DeviceError::Network`] if the TLS backend cannot be set up.
    pub fn new(settings: &Settings) -> Result<Self, DeviceError> {
        let http = Client::builder()
            .cookie_store(true)
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .build()
            .map_err(DeviceError::Network)?;

        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            default_timeout: settings.request_timeout(),
            ping_timeout: settings.ping_timeout(),
        })
    }

    /// Sends a request to `path` (relative to the device origin).
    ///
    /// # Errors
    /// - [`DeviceError::Timeout`] when the deadline fires
    /// - [`DeviceError::Certificate`] / [`DeviceError::Network`] for transport failures
    /// - [`DeviceError::HttpStatus`] for any non-2xx status
    pub async fn request(&self, path: &str, options: RequestOptions) -> Result<Response, DeviceError> {
        let deadline = self.deadline(&options);
        within(path, deadline, self.send(path, options)).await
    }

    /// Sends a request and decodes a JSON response body. The deadline covers
    /// the body as well as the headers.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, DeviceError> {
        let deadline = self.deadline(&options);
        within(path, deadline, async {
            let response = self.send(path, options).await?;
            let bytes = response
                .bytes()
                .await
                .map_err(|e| classify_transport_error(path, e))?;
            Ok(deserialize(&bytes)?)
        })
        .await
    }

    /// Liveness probe with a short fixed deadline.
    pub async fn ping(&self) -> Result<(), DeviceError> {
        self.request("/ping", RequestOptions::get().timeout(self.ping_timeout))
            .await
            .map(|_| ())
    }

    fn deadline(&self, options: &RequestOptions) -> Option<Duration> {
        options.timeout.or(self.default_timeout)
    }

    async fn send(&self, path: &str, options: RequestOptions) -> Result<Response, DeviceError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", options.method, url);

        let mut builder = self.http.request(options.method, &url);
        if let Some(json) = &options.json {
            builder = builder.json(json);
        }
        if let Some(form) = options.form {
            builder = builder.multipart(form);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify_transport_error(path, e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!("{} -> {}", path, status);
            return Err(DeviceError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

/// Runs `exchange`, turning an expired deadline into [`DeviceError::Timeout`].
async fn within<T, F>(path: &str, deadline: Option<Duration>, exchange: F) -> Result<T, DeviceError>
where
    F: Future<Output = Result<T, DeviceError>>,
{
    match deadline {
        Some(after) => tokio::time::timeout(after, exchange)
            .await
            .map_err(|_| DeviceError::Timeout {
                path: path.to_string(),
                after,
            })?,
        None => exchange.await,
    }
}

/// Sorts a `reqwest` failure into certificate trouble or a plain network
/// error. Deadlines are enforced by [`DeviceTransport::request`] itself.
pub fn classify_transport_error(path: &str, err: reqwest::Error) -> DeviceError {
    debug!("transport failure on {}: {}", path, err);
    if looks_like_certificate_failure(&err) {
        return DeviceError::Certificate(err);
    }
    DeviceError::Network(err)
}

/// The TLS connector reports handshake and trust failures as
/// `io::ErrorKind::InvalidData`; older stacks only say so in the message.
fn looks_like_certificate_failure(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(current) = source {
        if let Some(io) = current.downcast_ref::<io::Error>() {
            if io.kind() == io::ErrorKind::InvalidData {
                return true;
            }
        }
        let text = current.to_string().to_ascii_lowercase();
        if ["certificate", "tls", "handshake", "unknownissuer"]
            .iter()
            .any(|needle| text.contains(needle))
        {
            return true;
        }
        source = current.source();
    }
    false
}
