// SPDX-License-Identifier: MIT OR Apache-2.0
//! Blob-store access: content-addressed remote uploads plus a local
//! filesystem artifact store.

use base64::Engine as _;
use chrono::Local;
use ino_core::{FileUploadResult, sha256_hex};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Errors from blob operations.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    /// The requested file does not exist.
    #[error("file not found: {path}")]
    NotFound {
        /// Relative path that was requested.
        path: String,
    },
    /// Filesystem failure.
    #[error("blob io error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Remote upload client
// ---------------------------------------------------------------------------

/// Client for the content-addressed remote blob store.
#[derive(Clone)]
pub struct BlobClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl BlobClient {
    /// Create a client for the configured blob store.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Upload bytes; returns `{ok, file_url, file_id, sha256}`.
    ///
    /// Upload failures come back as `ok = false` results so callers can
    /// fold them into the run state.
    pub async fn upload(
        &self,
        bytes: &[u8],
        filename: &str,
        content_type: &str,
        sha256: Option<String>,
    ) -> FileUploadResult {
        let sha256 = sha256.unwrap_or_else(|| sha256_hex(bytes));
        let body = json!({
            "filename": filename,
            "content_type": content_type,
            "sha256": sha256,
            "bytes_b64": base64::engine::general_purpose::STANDARD.encode(bytes),
        });

        let mut req = self
            .client
            .post(format!("{}/v1/files/upload", self.base_url))
            .json(&body);
        if !self.api_key.is_empty() {
            req = req.header("X-API-Key", &self.api_key);
        }

        let resp = match req.send().await {
            Ok(r) => r,
            Err(e) => return upload_failure(filename, &e.to_string()),
        };
        if !resp.status().is_success() {
            return upload_failure(filename, &format!("http {}", resp.status()));
        }
        let parsed: Value = match resp.json().await {
            Ok(v) => v,
            Err(e) => return upload_failure(filename, &e.to_string()),
        };

        FileUploadResult {
            ok: true,
            file_url: parsed
                .get("file_url")
                .and_then(Value::as_str)
                .map(str::to_string),
            file_id: parsed
                .get("file_id")
                .and_then(Value::as_str)
                .map(str::to_string),
            sha256: Some(sha256),
            errors: vec![],
        }
    }
}

fn upload_failure(filename: &str, reason: &str) -> FileUploadResult {
    FileUploadResult {
        ok: false,
        file_url: None,
        file_id: None,
        sha256: None,
        errors: vec![ino_core::ErrorInfo::with_details(
            ino_core::codes::FILE_UPLOAD_FAILED,
            format!("file upload failed: {reason}"),
            json!({"filename": filename}),
        )],
    }
}

// ---------------------------------------------------------------------------
// Local artifact store
// ---------------------------------------------------------------------------

/// Filesystem artifact store rooted at a base directory.
#[derive(Clone, Debug)]
pub struct LocalBlobStore {
    base_dir: PathBuf,
}

impl LocalBlobStore {
    /// Create a store rooted at `base_dir`.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// The store's base directory.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Write bytes under `{sub_dir}/{filename}`, resolving name collisions
    /// with a `_YYYYMMDD_HHMMSS` suffix before the extension. Returns the
    /// relative path written.
    ///
    /// # Errors
    ///
    /// Returns [`BlobError::Io`] on filesystem failures.
    pub async fn save(
        &self,
        bytes: &[u8],
        sub_dir: &str,
        filename: &str,
    ) -> Result<String, BlobError> {
        let sub_dir = sanitize_component(sub_dir);
        let filename = sanitize_component(filename);
        let dir = self.base_dir.join(&sub_dir);
        tokio::fs::create_dir_all(&dir).await?;

        let mut target = dir.join(&filename);
        let mut final_name = filename.clone();
        if tokio::fs::try_exists(&target).await? {
            let (stem, ext) = split_name(&filename);
            let stamp = Local::now().format("%Y%m%d_%H%M%S");
            final_name = match ext {
                Some(ext) => format!("{stem}_{stamp}.{ext}"),
                None => format!("{stem}_{stamp}"),
            };
            target = dir.join(&final_name);
        }

        tokio::fs::write(&target, bytes).await?;
        debug!(target: "ino.blob", path = %target.display(), "artifact saved");
        Ok(format!("{sub_dir}/{final_name}"))
    }

    /// Read a file previously written by [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// Returns [`BlobError::NotFound`] when the path does not exist.
    pub async fn read(&self, relative_path: &str) -> Result<Vec<u8>, BlobError> {
        let safe: PathBuf = relative_path
            .split('/')
            .map(sanitize_component)
            .collect();
        let full = self.base_dir.join(safe);
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(BlobError::NotFound {
                path: relative_path.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

fn sanitize_component(component: &str) -> String {
    component
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '@') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_matches('.')
        .to_string()
}

fn split_name(filename: &str) -> (&str, Option<&str>) {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (filename, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn upload_success_carries_url_and_hash() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/files/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "file_url": "https://files.corp/v1/blobs/abc",
                "file_id": "abc"
            })))
            .mount(&server)
            .await;

        let client = BlobClient::new(reqwest::Client::new(), server.uri(), "k");
        let result = client
            .upload(b"pdf bytes", "contract.pdf", "application/pdf", None)
            .await;
        assert!(result.ok);
        assert_eq!(result.file_id.as_deref(), Some("abc"));
        assert_eq!(result.sha256.as_deref(), Some(sha256_hex(b"pdf bytes").as_str()));
    }

    #[tokio::test]
    async fn upload_failure_is_soft() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let client = BlobClient::new(reqwest::Client::new(), server.uri(), "");
        let result = client
            .upload(b"x", "contract.pdf", "application/pdf", None)
            .await;
        assert!(!result.ok);
        assert_eq!(result.errors[0].code, ino_core::codes::FILE_UPLOAD_FAILED);
    }

    #[tokio::test]
    async fn save_and_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        let path = store.save(b"content", "m1@host", "contract.pdf").await.unwrap();
        assert_eq!(path, "m1@host/contract.pdf");
        assert_eq!(store.read(&path).await.unwrap(), b"content");
    }

    #[tokio::test]
    async fn collision_gets_timestamp_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        let first = store.save(b"a", "m1", "contract.pdf").await.unwrap();
        let second = store.save(b"b", "m1", "contract.pdf").await.unwrap();
        assert_eq!(first, "m1/contract.pdf");
        assert_ne!(first, second);
        assert!(second.starts_with("m1/contract_"));
        assert!(second.ends_with(".pdf"));
        assert_eq!(store.read(&second).await.unwrap(), b"b");
    }

    #[tokio::test]
    async fn read_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        assert!(matches!(
            store.read("nope/missing.pdf").await.unwrap_err(),
            BlobError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn traversal_components_are_neutralized() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        let path = store.save(b"x", "../escape", "f.pdf").await.unwrap();
        assert!(!path.contains(".."));
        assert!(store.read(&path).await.is_ok());
    }
}
