use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use reqwest::Client;
use thiserror::Error;
use tracing::{error, info};

use crate::config::StorageConfig;
use crate::llm::{truncate, MAX_ERROR_CHARS};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BlobError {
    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),
    #[error("upload of {path} failed: {reason}")]
    Upload { path: String, reason: String },
}

/// Object storage that hands back a public URL for everything it stores.
#[async_trait]
pub trait BlobStore: Send + Sync {
    fn ensure_configured(&self) -> Result<(), BlobError> {
        Ok(())
    }

    async fn put(&self, path: &str, bytes: Bytes, content_type: &str) -> Result<String, BlobError>;

    fn public_url(&self, path: &str) -> Result<String, BlobError>;
}

#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub bytes: Bytes,
    pub content_type: String,
}

/// Process-local blob store for development and tests.
pub struct MemoryBlobStore {
    base_url: String,
    objects: RwLock<HashMap<String, StoredBlob>>,
}

impl MemoryBlobStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), objects: RwLock::default() }
    }

    pub fn get(&self, path: &str) -> Option<StoredBlob> {
        self.objects.read().get(path).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.objects.read().keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new("memory://blobs")
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, path: &str, bytes: Bytes, content_type: &str) -> Result<String, BlobError> {
        self.objects.write().insert(path.to_string(), StoredBlob { bytes, content_type: content_type.to_string() });
        self.public_url(path)
    }

    fn public_url(&self, path: &str) -> Result<String, BlobError> {
        Ok(format!("{}/{}", self.base_url.trim_end_matches('/'), path))
    }
}

/// Supabase-style storage REST API (`/storage/v1/object/{bucket}/{path}`).
pub struct HttpBlobStore {
    http: Client,
    base_url: Option<String>,
    bucket: Option<String>,
    service_key: Option<String>,
}

impl HttpBlobStore {
    pub fn new(config: &StorageConfig) -> Result<Self, BlobError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BlobError::Upload { path: String::new(), reason: e.to_string() })?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            bucket: config.bucket.clone(),
            service_key: config.service_key.clone(),
        })
    }

    fn target(&self) -> Result<(&str, &str), BlobError> {
        let base = self.base_url.as_deref().ok_or(BlobError::MissingConfig("STORAGE_BASE_URL"))?;
        let bucket = self.bucket.as_deref().ok_or(BlobError::MissingConfig("STORAGE_BUCKET"))?;
        Ok((base.trim_end_matches('/'), bucket))
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    fn ensure_configured(&self) -> Result<(), BlobError> {
        self.target().map(|_| ())
    }

    async fn put(&self, path: &str, bytes: Bytes, content_type: &str) -> Result<String, BlobError> {
        let (base, bucket) = self.target()?;
        let url = format!("{base}/storage/v1/object/{bucket}/{path}");
        let size = bytes.len();

        let mut request = self.http
            .post(&url)
            .header("content-type", content_type)
            .header("x-upsert", "true")
            .body(bytes);
        if let Some(key) = &self.service_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| BlobError::Upload {
            path: path.to_string(),
            reason: truncate(&e.to_string(), MAX_ERROR_CHARS),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("❌ Storage upload {} failed with {}: {}", path, status, truncate(&body, MAX_ERROR_CHARS));
            return Err(BlobError::Upload {
                path: path.to_string(),
                reason: format!("HTTP {}: {}", status.as_u16(), truncate(&body, MAX_ERROR_CHARS)),
            });
        }

        info!("📦 Stored {} ({} bytes)", path, size);
        self.public_url(path)
    }

    fn public_url(&self, path: &str) -> Result<String, BlobError> {
        let (base, bucket) = self.target()?;
        Ok(format!("{base}/storage/v1/object/public/{bucket}/{path}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(base_url: Option<String>) -> HttpBlobStore {
        HttpBlobStore::new(&StorageConfig {
            base_url,
            bucket: Some("assets".into()),
            service_key: Some("service".into()),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn memory_store_keeps_bytes_and_issues_urls() {
        let blobs = MemoryBlobStore::new("https://cdn.test/");
        let url = blobs.put("g1/hero.png", Bytes::from_static(b"png"), "image/png").await.unwrap();
        assert_eq!(url, "https://cdn.test/g1/hero.png");
        let stored = blobs.get("g1/hero.png").unwrap();
        assert_eq!(stored.bytes.as_ref(), b"png");
        assert_eq!(stored.content_type, "image/png");
        assert_eq!(blobs.paths(), vec!["g1/hero.png".to_string()]);
    }

    #[tokio::test]
    async fn http_store_uploads_and_returns_public_url() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/object/assets/g1/hero.png"))
            .and(header("authorization", "Bearer service"))
            .and(header("content-type", "image/png"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let url = store(Some(mock_server.uri()))
            .put("g1/hero.png", Bytes::from_static(b"png"), "image/png")
            .await
            .unwrap();
        assert_eq!(url, format!("{}/storage/v1/object/public/assets/g1/hero.png", mock_server.uri()));
    }

    #[tokio::test]
    async fn http_store_surfaces_upload_failures() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(413).set_body_string("too large"))
            .mount(&mock_server)
            .await;

        let err = store(Some(mock_server.uri()))
            .put("g1/hero.png", Bytes::from_static(b"png"), "image/png")
            .await
            .unwrap_err();
        assert_eq!(err, BlobError::Upload { path: "g1/hero.png".into(), reason: "HTTP 413: too large".into() });
    }

    #[test]
    fn missing_base_url_is_reported() {
        assert_eq!(store(None).ensure_configured(), Err(BlobError::MissingConfig("STORAGE_BASE_URL")));
    }
}
