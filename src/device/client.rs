// src/device/client.rs
//! Authenticated device client.
//!
//! Wraps a [`DeviceTransport`] with the pairing credential and exposes the
//! document operations the upload workflow needs: resolve, upload, display
//! and delete. The client keeps no session object of its own; the device's
//! session lives in the transport's cookie jar and is refreshed by calling
//! [`DeviceApi::authenticate`] before each privileged flow.

use crate::config::Settings;
use crate::device::transport::{DeviceTransport, RequestOptions};
use crate::error::DeviceError;
use crate::models::credential::Credential;
use crate::models::document::{Blob, DocumentEntry, Identifier, PDF_CONTENT_TYPE};
use crate::utils::serialization::encode_uri_component;
use crate::wallet::key_management::NonceSigner;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use log::{debug, info};
use reqwest::multipart::{Form, Part};
use reqwest::Body;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Receives upload progress as a fraction in `0.0..=1.0`.
///
/// Called synchronously while the body is streamed; must not block.
pub type ProgressCallback = Arc<dyn Fn(f64) + Send + Sync>;

/// Size of each streamed upload chunk.
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Deserialize)]
struct NonceResponse {
    nonce: String,
}

#[derive(Serialize)]
struct AuthRequest<'a> {
    client_id: &'a str,
    nonce_signed: String,
}

#[derive(Serialize)]
struct CreateDocumentRequest<'a> {
    file_name: &'a str,
    parent_folder_id: Uuid,
    document_source: &'a str,
}

#[derive(Deserialize)]
struct CreateDocumentResponse {
    document_id: Uuid,
}

#[derive(Serialize)]
struct OpenDocumentRequest {
    document_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    page: Option<u32>,
}

/// Document operations the upload workflow depends on.
#[async_trait]
pub trait DeviceApi: Send + Sync {
    /// Runs the nonce/signature exchange.
    async fn authenticate(&self) -> Result<(), DeviceError>;

    /// Looks up `path`; `Ok(None)` when the device reports 404.
    async fn resolve_object(&self, path: &str) -> Result<Option<DocumentEntry>, DeviceError>;

    /// Creates a document in `directory` and transfers `blob` into it.
    async fn upload_blob(
        &self,
        directory: &Identifier,
        name: &str,
        blob: &Blob,
        progress: Option<ProgressCallback>,
    ) -> Result<Uuid, DeviceError>;

    /// Opens the document in the device's viewer.
    async fn display_document(&self, target: &Identifier, page: Option<u32>)
        -> Result<(), DeviceError>;

    /// Deletes the document; absent targets are not an error.
    async fn delete_document(&self, target: &Identifier) -> Result<(), DeviceError>;
}

/// Client for one paired device.
#[derive(Clone)]
pub struct DeviceClient {
    transport: DeviceTransport,
    credential: Credential,
    signer: NonceSigner,
}

impl DeviceClient {
    /// Builds a client from settings and a validated credential.
    ///
    /// # Errors
    /// - [`DeviceError::Key`] if the credential's key cannot sign
    /// - [`DeviceError::Network`] if the HTTP client cannot be built
    pub fn new(settings: &Settings, credential: Credential) -> Result<Self, DeviceError> {
        let transport = DeviceTransport::new(settings)?;
        Self::with_transport(transport, credential)
    }

    pub fn with_transport(
        transport: DeviceTransport,
        credential: Credential,
    ) -> Result<Self, DeviceError> {
        let signer = NonceSigner::new(&credential)?;
        Ok(Self {
            transport,
            credential,
            signer,
        })
    }

    pub async fn ping(&self) -> Result<(), DeviceError> {
        self.transport.ping().await
    }

    /// Resolves an identifier to a document id without touching the network
    /// when it already is one.
    ///
    /// # Returns
    /// - `Some(id)` for document ids and resolvable paths
    /// - `None` when the path does not exist on the device
    pub async fn get_object_id(&self, target: &Identifier) -> Result<Option<Uuid>, DeviceError> {
        match target {
            Identifier::DocumentId(id) => Ok(Some(*id)),
            Identifier::Path(path) => Ok(self.resolve_object(path).await?.map(|e| e.entry_id)),
        }
    }

    async fn require_object_id(&self, target: &Identifier) -> Result<Uuid, DeviceError> {
        self.get_object_id(target)
            .await?
            .ok_or_else(|| DeviceError::NotFound {
                path: target.to_string(),
            })
    }

    async fn fetch_nonce(&self) -> Result<String, DeviceError> {
        let path = format!("/auth/nonce/{}", self.credential.client_id());
        let response: NonceResponse = self
            .transport
            .request_json(&path, RequestOptions::get())
            .await
            .map_err(into_auth_failure)?;
        Ok(response.nonce)
    }
}

#[async_trait]
impl DeviceApi for DeviceClient {
    async fn authenticate(&self) -> Result<(), DeviceError> {
        let nonce = self.fetch_nonce().await?;
        let request = AuthRequest {
            client_id: self.credential.client_id(),
            nonce_signed: self.signer.sign_nonce(&nonce)?,
        };
        self.transport
            .request("/auth", RequestOptions::put().json(&request)?)
            .await
            .map_err(into_auth_failure)?;
        info!("Authenticated with device as {}", self.credential.client_id());
        Ok(())
    }

    async fn resolve_object(&self, path: &str) -> Result<Option<DocumentEntry>, DeviceError> {
        let url = format!("/resolve/entry/path/{}", encode_uri_component(path));
        match self.transport.request_json(&url, RequestOptions::get()).await {
            Ok(entry) => Ok(Some(entry)),
            Err(e) if e.is_not_found() => {
                debug!("{} is absent on the device", path);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn upload_blob(
        &self,
        directory: &Identifier,
        name: &str,
        blob: &Blob,
        progress: Option<ProgressCallback>,
    ) -> Result<Uuid, DeviceError> {
        if !blob.is_pdf() {
            return Err(DeviceError::Validation(format!(
                "Blob with invalid content type: {}",
                blob.content_type.as_deref().unwrap_or("<none>")
            )));
        }

        let parent_folder_id = self.require_object_id(directory).await?;
        let created: CreateDocumentResponse = self
            .transport
            .request_json(
                "/documents2",
                RequestOptions::post().json(&CreateDocumentRequest {
                    file_name: name,
                    parent_folder_id,
                    document_source: "",
                })?,
            )
            .await?;

        let part = Part::stream_with_length(
            progress_body(blob.bytes.clone(), progress.clone()),
            blob.len(),
        )
        .file_name(name.to_string())
        .mime_str(PDF_CONTENT_TYPE)
        .map_err(DeviceError::Network)?;

        self.transport
            .request(
                &format!("/documents/{}/file", created.document_id),
                RequestOptions::put().multipart(Form::new().part("file", part)),
            )
            .await?;

        if let Some(report) = &progress {
            report(1.0);
        }
        info!("Uploaded {} ({} bytes) as {}", name, blob.len(), created.document_id);
        Ok(created.document_id)
    }

    async fn display_document(
        &self,
        target: &Identifier,
        page: Option<u32>,
    ) -> Result<(), DeviceError> {
        let document_id = self.require_object_id(target).await?;
        self.transport
            .request(
                "/viewer/controls/open2",
                RequestOptions::put().json(&OpenDocumentRequest { document_id, page })?,
            )
            .await?;
        Ok(())
    }

    async fn delete_document(&self, target: &Identifier) -> Result<(), DeviceError> {
        match self.get_object_id(target).await? {
            Some(id) => {
                self.transport
                    .request(&format!("/documents/{id}"), RequestOptions::delete())
                    .await?;
                info!("Deleted {}", target);
            }
            None => debug!("Nothing to delete at {}", target),
        }
        Ok(())
    }
}

fn into_auth_failure(err: DeviceError) -> DeviceError {
    match err.status() {
        Some(status @ (401 | 403)) => DeviceError::AuthFailed { status },
        _ => err,
    }
}

/// Streams `content` in chunks, reporting `sent / total` as each chunk is
/// handed to the connection.
fn progress_body(content: Bytes, progress: Option<ProgressCallback>) -> Body {
    let total = content.len();
    let chunks: Vec<Bytes> = (0..total)
        .step_by(UPLOAD_CHUNK_SIZE)
        .map(|start| content.slice(start..usize::min(start + UPLOAD_CHUNK_SIZE, total)))
        .collect();

    let mut sent = 0usize;
    let events = chunks.into_iter().map(move |chunk| {
        sent += chunk.len();
        if let Some(report) = &progress {
            report(sent as f64 / total as f64);
        }
        Ok::<Bytes, std::io::Error>(chunk)
    });
    Body::wrap_stream(stream::iter(events))
}
