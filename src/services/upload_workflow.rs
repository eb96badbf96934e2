// src/services/upload_workflow.rs
//! Download → upload → show.
//!
//! The one high-level flow the CLI exposes: fetch a document from a URL, give
//! it a device-safe name, reuse or replace whatever already sits at the
//! target path, upload it, and open it on the device.
//!
//! # Process Flow
//! 1. Fetch the URL as a [`Blob`]
//! 2. Derive the file name and target path
//! 3. Authenticate with the device
//! 4. Resolve the target; same size means reuse, different size means delete
//! 5. Upload with progress
//! 6. Display
//!
//! Every step awaits the previous one; nothing is retried.

use crate::config::Settings;
use crate::device::{DeviceApi, ProgressCallback};
use crate::error::DeviceError;
use crate::models::document::{Blob, Identifier, UploadRequest};
use crate::services::filename::derive_file_name;
use log::info;
use reqwest::header::{HeaderName, CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::Client;
use uuid::Uuid;

/// What `download_upload_show` ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// A file of the same size was already on the device and was opened.
    Reused { document_id: Uuid, path: String },
    /// The document was uploaded, replacing `replaced` if it was stale.
    Uploaded {
        document_id: Uuid,
        path: String,
        replaced: Option<Uuid>,
    },
}

impl UploadOutcome {
    pub fn document_id(&self) -> Uuid {
        match self {
            UploadOutcome::Reused { document_id, .. }
            | UploadOutcome::Uploaded { document_id, .. } => *document_id,
        }
    }
}

/// Orchestrates one device through the download/upload/show flow.
pub struct UploadWorkflow<'a, D: DeviceApi> {
    device: &'a D,
    http: Client,
    received_dir: String,
}

impl<'a, D: DeviceApi> UploadWorkflow<'a, D> {
    pub fn new(device: &'a D, settings: &Settings) -> Self {
        Self::with_http_client(device, Client::new(), &settings.received_dir)
    }

    pub fn with_http_client(device: &'a D, http: Client, received_dir: &str) -> Self {
        Self {
            device,
            http,
            received_dir: received_dir.trim_end_matches('/').to_string(),
        }
    }

    /// Downloads `url` and builds the upload request for it.
    ///
    /// # Errors
    /// Returns [`DeviceError::Download`] when the source cannot be fetched,
    /// answers with a non-success status or sends no content.
    pub async fn fetch(&self, url: &str) -> Result<UploadRequest, DeviceError> {
        let download_error = |reason: String| DeviceError::Download {
            url: url.to_string(),
            reason,
        };

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| download_error(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(download_error(format!("HTTP {}", status.as_u16())));
        }

        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let content_type = header(CONTENT_TYPE);
        let file_name = derive_file_name(url, header(CONTENT_DISPOSITION).as_deref());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| download_error(e.to_string()))?;
        let content = Blob::new(bytes, content_type.as_deref());
        if content.is_empty() {
            return Err(download_error("empty response body".to_string()));
        }
        info!("Downloaded {} ({} bytes) as {}", url, content.len(), file_name);

        Ok(UploadRequest {
            source_url: url.to_string(),
            file_name,
            target_directory: self.received_dir.clone(),
            content,
        })
    }

    /// Runs the full flow for `url`.
    ///
    /// # Arguments
    /// * `url` - document to send to the device
    /// * `progress` - optional upload progress sink, fed fractions in `0..=1`
    pub async fn download_upload_show(
        &self,
        url: &str,
        progress: Option<ProgressCallback>,
    ) -> Result<UploadOutcome, DeviceError> {
        let request = self.fetch(url).await?;
        self.upload_and_show(&request, progress).await
    }

    /// Steps 3 to 6 for an already fetched document.
    pub async fn upload_and_show(
        &self,
        request: &UploadRequest,
        progress: Option<ProgressCallback>,
    ) -> Result<UploadOutcome, DeviceError> {
        let path = request.target_path();
        info!("Sending {} to {}", request.source_url, path);
        self.device.authenticate().await?;

        let mut replaced = None;
        if let Some(existing) = self.device.resolve_object(&path).await? {
            if existing.file_size == Some(request.content.len()) {
                info!("{} is already on the device; opening it", path);
                self.device
                    .display_document(&existing.entry_id.into(), None)
                    .await?;
                return Ok(UploadOutcome::Reused {
                    document_id: existing.entry_id,
                    path,
                });
            }
            info!(
                "Replacing {} ({:?} bytes on device, {} bytes downloaded)",
                path,
                existing.file_size,
                request.content.len()
            );
            self.device
                .delete_document(&existing.entry_id.into())
                .await?;
            replaced = Some(existing.entry_id);
        }

        let document_id = self
            .device
            .upload_blob(
                &Identifier::path(request.target_directory.as_str()),
                &request.file_name,
                &request.content,
                progress,
            )
            .await?;
        self.device
            .display_document(&document_id.into(), None)
            .await?;

        Ok(UploadOutcome::Uploaded {
            document_id,
            path,
            replaced,
        })
    }
}
