//! Attachment storage
//!
//! Uploaded attachment files live outside the XML store, in a directory tree
//! derived from the owning document's IRI. Descriptors on the document keep
//! the relative `storage_ref` of each file.

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::{Component, Path, PathBuf};

use crate::document::Attachment;
use crate::error::AttachmentError;
use crate::render::file_name_from_iri;

/// A file received with an upload request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    /// Multipart field the file arrived in, e.g. `file_0`
    pub field_name: String,
    pub file_name: String,
    #[serde(default)]
    pub mime_type: String,
    /// Raw bytes; base64 in JSON
    #[serde(serialize_with = "to_base64", deserialize_with = "from_base64")]
    pub content: Vec<u8>,
}

fn to_base64<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
}

fn from_base64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    base64::engine::general_purpose::STANDARD
        .decode(encoded.as_bytes())
        .map_err(serde::de::Error::custom)
}

#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Persist one file for the document `iri` and describe it
    async fn store(&self, iri: &str, index: u32, title: &str, file: &UploadedFile) -> Result<Attachment, AttachmentError>;

    /// Remove the files behind the descriptors; returns how many were removed
    async fn delete(&self, attachments: &[Attachment]) -> Result<usize, AttachmentError>;
}

/// Attachment store on the local filesystem
#[derive(Debug, Clone)]
pub struct FsAttachmentStore {
    root: PathBuf,
}

impl FsAttachmentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, storage_ref: &str) -> Result<PathBuf, AttachmentError> {
        let relative = Path::new(storage_ref);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if storage_ref.is_empty() || escapes {
            return Err(AttachmentError::InvalidReference(storage_ref.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

/// Relative directory for a document's attachments:
/// `/akn/ke/act/legge/1970-06-03/Cap_44/eng@/!main` maps to
/// `akn/ke/act/legge/1970-06-03/Cap_44/eng_/_main`.
pub fn storage_dir(iri: &str) -> Result<String, AttachmentError> {
    let segments: Vec<String> = iri
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.chars()
                .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
                .collect()
        })
        .collect();
    if segments.is_empty() {
        return Err(AttachmentError::InvalidIri(iri.to_string()));
    }
    Ok(segments.join("/"))
}

fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.chars().filter(|c| c.is_ascii_alphanumeric()).collect::<String>())
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| "bin".to_string())
}

#[async_trait]
impl AttachmentStore for FsAttachmentStore {
    async fn store(&self, iri: &str, index: u32, title: &str, file: &UploadedFile) -> Result<Attachment, AttachmentError> {
        let dir = storage_dir(iri)?;
        let extension = extension_of(&file.file_name);
        let stem = file_name_from_iri(iri, "");
        let file_name = format!("{}_{}.{}", stem.trim_end_matches('.'), index, extension);
        let storage_ref = format!("{}/{}", dir, file_name);

        let path = self.resolve(&storage_ref)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &file.content).await?;
        tracing::debug!(iri, path = %path.display(), bytes = file.content.len(), "Stored attachment");

        Ok(Attachment {
            id: uuid::Uuid::new_v4().to_string(),
            index,
            title: if title.is_empty() { file.file_name.clone() } else { title.to_string() },
            file_name,
            storage_ref,
            mime_type: file.mime_type.clone(),
        })
    }

    async fn delete(&self, attachments: &[Attachment]) -> Result<usize, AttachmentError> {
        let mut removed = 0;
        let mut failed = Vec::new();
        for attachment in attachments {
            let path = match self.resolve(&attachment.storage_ref) {
                Ok(path) => path,
                Err(e) => {
                    failed.push(e.to_string());
                    continue;
                }
            };
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!(path = %path.display(), "Attachment already gone");
                }
                Err(e) => failed.push(format!("{}: {}", path.display(), e)),
            }
        }
        if failed.is_empty() {
            Ok(removed)
        } else {
            Err(AttachmentError::Incomplete { removed, failed })
        }
    }
}
