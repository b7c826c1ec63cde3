//! Blob storage for uploaded document content
//!
//! The database only keeps document metadata and the public URL returned by the
//! blob API. Uploads are disabled (503) when no token is configured.

use crate::config::StorageConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

/// Result of a successful upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub url: String,
    pub pathname: String,
}

/// Anything that can persist bytes and hand back a URL
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, pathname: &str, content_type: &str, bytes: Vec<u8>) -> Result<StoredBlob>;

    /// Whether uploads can succeed at all
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Build the blob store described by the configuration
pub fn from_config(config: &StorageConfig) -> Result<Arc<dyn BlobStore>> {
    match config.blob_token.as_deref().filter(|t| !t.is_empty()) {
        Some(token) => Ok(Arc::new(HttpBlobStore::new(
            &config.blob_api_url,
            token,
            Duration::from_secs(config.timeout_secs),
        )?)),
        None => {
            info!("No blob token configured, document uploads are disabled");
            Ok(Arc::new(DisabledBlobStore))
        }
    }
}

/// Blob API client (bearer token, `PUT /{pathname}`)
pub struct HttpBlobStore {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    url: String,
    pathname: String,
}

impl HttpBlobStore {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn put(&self, pathname: &str, content_type: &str, bytes: Vec<u8>) -> Result<StoredBlob> {
        let response = self
            .client
            .put(format!("{}/{}", self.base_url, pathname))
            .bearer_auth(&self.token)
            .header("x-content-type", content_type)
            .header("x-add-random-suffix", "1")
            .header("x-api-version", "7")
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Storage {
                message: format!("Blob API returned {}: {}", status, body),
            });
        }

        let stored: PutResponse = response.json().await?;
        info!(pathname = %stored.pathname, "Blob stored");

        Ok(StoredBlob {
            url: stored.url,
            pathname: stored.pathname,
        })
    }
}

/// Store used when no token is configured
pub struct DisabledBlobStore;

#[async_trait]
impl BlobStore for DisabledBlobStore {
    async fn put(&self, _pathname: &str, _content_type: &str, _bytes: Vec<u8>) -> Result<StoredBlob> {
        Err(AppError::ServiceUnavailable {
            message: "Document storage is not configured".to_string(),
        })
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Hex sha256 of uploaded content
pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Reduce a client-supplied file name to a safe single path segment
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();

    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned
    }
}

/// Storage pathname for a document: `documents/{author}/{file}`
pub fn document_pathname(author_id: uuid::Uuid, file_name: &str) -> String {
    format!("documents/{}/{}", author_id, sanitize_file_name(file_name))
}

/// Best-effort MIME type from the file extension
pub fn guess_mime_type(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("rapport 2024.pdf"), "rapport_2024.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\docs\\facture.pdf"), "facture.pdf");
        assert_eq!(sanitize_file_name("..."), "document");
        assert_eq!(sanitize_file_name(""), "document");
    }

    #[test]
    fn test_document_pathname() {
        let author = uuid::Uuid::nil();
        assert_eq!(
            document_pathname(author, "a b.pdf"),
            "documents/00000000-0000-0000-0000-000000000000/a_b.pdf"
        );
    }

    #[test]
    fn test_guess_mime_type() {
        assert_eq!(guess_mime_type("x.PDF"), "application/pdf");
        assert_eq!(guess_mime_type("noext"), "application/octet-stream");
    }

    #[test]
    fn test_checksum() {
        assert_eq!(
            checksum(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_disabled_store_is_unavailable() {
        let store = from_config(&StorageConfig::default()).unwrap();
        assert!(!store.is_enabled());

        let err = store.put("a", "text/plain", vec![1]).await.unwrap_err();
        assert!(matches!(err, AppError::ServiceUnavailable { .. }));
    }
}
