// src/models/document.rs
//! Document-side data model: entries the device reports, the identifiers
//! callers use to address them, and the payloads moving through an upload.

use crate::utils::serialization::lenient_size;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// MIME type the device accepts for uploads.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// A file or folder the device already knows about.
///
/// Returned by `GET /resolve/entry/path/...`. Never cached: each lookup is a
/// fresh request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentEntry {
    pub entry_id: Uuid,

    #[serde(rename = "entry_path", default)]
    pub path: String,

    /// Size in bytes. Folders have none.
    #[serde(default, deserialize_with = "lenient_size")]
    pub file_size: Option<u64>,

    /// `"document"` or `"folder"` when the device reports it.
    #[serde(default)]
    pub entry_type: Option<String>,

    #[serde(default)]
    pub entry_name: Option<String>,
}

/// How a caller addresses an object on the device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    /// Friendly path such as `Document/Received/paper.pdf`.
    Path(String),
    DocumentId(Uuid),
}

impl Identifier {
    /// Interprets user input: a 36-character UUID becomes a document id,
    /// anything else a path.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.len() == 36 {
            if let Ok(id) = Uuid::parse_str(trimmed) {
                return Identifier::DocumentId(id);
            }
        }
        Identifier::Path(trimmed.to_string())
    }

    pub fn path(path: impl Into<String>) -> Self {
        Identifier::Path(path.into())
    }
}

impl FromStr for Identifier {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Identifier::parse(s))
    }
}

impl From<Uuid> for Identifier {
    fn from(id: Uuid) -> Self {
        Identifier::DocumentId(id)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Path(p) => f.write_str(p),
            Identifier::DocumentId(id) => write!(f, "{}", id.hyphenated()),
        }
    }
}

/// Downloaded content with its declared type.
#[derive(Debug, Clone)]
pub struct Blob {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

impl Blob {
    pub fn new(bytes: impl Into<Bytes>, content_type: Option<&str>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.map(str::to_string),
        }
    }

    #[cfg(test)]
    pub fn pdf(bytes: impl Into<Bytes>) -> Self {
        Self::new(bytes, Some(PDF_CONTENT_TYPE))
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// True when the declared MIME essence is `application/pdf`, ignoring
    /// parameters and case.
    pub fn is_pdf(&self) -> bool {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(|essence| essence.trim().eq_ignore_ascii_case(PDF_CONTENT_TYPE))
            .unwrap_or(false)
    }
}

/// One invocation of the download/upload/show workflow.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub source_url: String,
    pub file_name: String,
    pub target_directory: String,
    pub content: Blob,
}

impl UploadRequest {
    /// Full device path of the uploaded file.
    pub fn target_path(&self) -> String {
        format!("{}/{}", self.target_directory.trim_end_matches('/'), self.file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_decodes_device_payload() {
        let json = r#"{
            "entry_id": "4f0c9a5e-7e1b-4c84-a0a5-7d7a2d6b1c11",
            "entry_path": "Document/Received/paper.pdf",
            "entry_name": "paper.pdf",
            "entry_type": "document",
            "file_size": "52344"
        }"#;
        let entry: DocumentEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.path, "Document/Received/paper.pdf");
        assert_eq!(entry.file_size, Some(52344));
        assert_eq!(entry.entry_type.as_deref(), Some("document"));
    }

    #[test]
    fn folder_entry_has_no_size() {
        let json = r#"{"entry_id": "4f0c9a5e-7e1b-4c84-a0a5-7d7a2d6b1c11", "entry_path": "Document", "entry_type": "folder"}"#;
        let entry: DocumentEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.file_size, None);
    }

    #[test]
    fn identifier_parse_distinguishes_ids_from_paths() {
        let id = "4f0c9a5e-7e1b-4c84-a0a5-7d7a2d6b1c11";
        assert_eq!(
            Identifier::parse(id),
            Identifier::DocumentId(Uuid::parse_str(id).unwrap())
        );
        assert_eq!(
            Identifier::parse("Document/Received/paper.pdf"),
            Identifier::Path("Document/Received/paper.pdf".into())
        );
        // 36 characters but not a UUID stays a path.
        let lookalike = "Document/Received/abcdefghijklmn.pdf";
        assert_eq!(lookalike.len(), 36);
        assert_eq!(Identifier::parse(lookalike), Identifier::Path(lookalike.into()));
    }

    #[test]
    fn identifier_parse_trims_paths_and_ids_alike() {
        assert_eq!(
            Identifier::parse("  Document/Received/paper.pdf\n"),
            Identifier::path("Document/Received/paper.pdf")
        );
        assert!(matches!(
            Identifier::parse(" 4f0c9a5e-7e1b-4c84-a0a5-7d7a2d6b1c11 "),
            Identifier::DocumentId(_)
        ));
    }

    #[test]
    fn identifier_display_round_trips() {
        let id = Uuid::parse_str("4f0c9a5e-7e1b-4c84-a0a5-7d7a2d6b1c11").unwrap();
        let ident = Identifier::from(id);
        assert_eq!(ident.to_string().parse::<Identifier>().unwrap(), ident);
    }

    #[test]
    fn pdf_detection_ignores_parameters_and_case() {
        assert!(Blob::new(vec![1u8], Some("application/pdf")).is_pdf());
        assert!(Blob::new(vec![1u8], Some("Application/PDF; charset=binary")).is_pdf());
        assert!(!Blob::new(vec![1u8], Some("text/html")).is_pdf());
        assert!(!Blob::new(vec![1u8], None).is_pdf());
    }

    #[test]
    fn target_path_joins_directory_and_name() {
        let request = UploadRequest {
            source_url: "https://x.org/a.pdf".into(),
            file_name: "a.pdf".into(),
            target_directory: "Document/Received/".into(),
            content: Blob::pdf(vec![0u8; 4]),
        };
        assert_eq!(request.target_path(), "Document/Received/a.pdf");
    }
}
