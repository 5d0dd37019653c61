//! Report store abstraction and its two backends.
//!
//! The pipeline persists exactly one artifact per successful job: the
//! markdown report, stored under `reports/{id}.md`. The store is an
//! external collaborator specified at its interface boundary — `put` and
//! `list` — with two backends selected by configuration: an HTTP blob
//! store producing public URLs, and an in-memory store for tests and
//! inline (no-object-store) deployments.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use delve_core::{Error, Result};

/// A stored object reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Path of the object within the store, e.g. `reports/{id}.md`.
    pub pathname: String,
    /// URL the object can be fetched from.
    pub url: String,
}

/// Object store interface the pipeline depends on.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Store content under the given path, returning its reference.
    async fn put(&self, path: &str, content: &str, content_type: &str) -> Result<StoredObject>;

    /// List stored objects whose path starts with the given prefix.
    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>>;
}

// =============================================================================
// HTTP BLOB BACKEND
// =============================================================================

#[derive(Debug, Deserialize)]
struct BlobPutResponse {
    url: String,
    #[serde(default)]
    pathname: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BlobListResponse {
    blobs: Vec<BlobEntry>,
}

#[derive(Debug, Deserialize)]
struct BlobEntry {
    pathname: String,
    url: String,
}

/// Blob-storage backend speaking a bearer-token HTTP API.
pub struct HttpBlobStore {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpBlobStore {
    /// Create a store against the given blob endpoint.
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Storage(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = base_url.into();
        info!(base_url = %base_url, "Initializing blob store");

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// Create from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `BLOB_BASE_URL` | Blob endpoint base URL (required) |
    /// | `BLOB_TOKEN` | Bearer token (optional) |
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("BLOB_BASE_URL")
            .map_err(|_| Error::Config("BLOB_BASE_URL is not set".to_string()))?;
        Self::new(base_url, std::env::var("BLOB_TOKEN").ok())
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token {
            Some(ref token) => req.header("Authorization", format!("Bearer {}", token)),
            None => req,
        }
    }
}

#[async_trait]
impl ReportStore for HttpBlobStore {
    async fn put(&self, path: &str, content: &str, content_type: &str) -> Result<StoredObject> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        let response = self
            .authorized(self.client.put(&url))
            .header("Content-Type", content_type)
            .body(content.to_string())
            .send()
            .await
            .map_err(|e| Error::Storage(format!("put failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Storage(format!(
                "blob endpoint returned {}",
                response.status()
            )));
        }

        let body: BlobPutResponse = response
            .json()
            .await
            .map_err(|e| Error::Storage(format!("unparseable put response: {}", e)))?;

        debug!(path, url = %body.url, "Report stored");
        Ok(StoredObject {
            pathname: body.pathname.unwrap_or_else(|| path.to_string()),
            url: body.url,
        })
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>> {
        let response = self
            .authorized(self.client.get(&self.base_url))
            .query(&[("prefix", prefix)])
            .send()
            .await
            .map_err(|e| Error::Storage(format!("list failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Storage(format!(
                "blob endpoint returned {}",
                response.status()
            )));
        }

        let body: BlobListResponse = response
            .json()
            .await
            .map_err(|e| Error::Storage(format!("unparseable list response: {}", e)))?;

        Ok(body
            .blobs
            .into_iter()
            .map(|b| StoredObject {
                pathname: b.pathname,
                url: b.url,
            })
            .collect())
    }
}

// =============================================================================
// IN-MEMORY BACKEND
// =============================================================================

#[derive(Debug, Clone)]
struct StoredRecord {
    content: String,
    #[allow(dead_code)]
    content_type: String,
}

/// In-process store backend for tests and inline deployments.
///
/// Produces `memory://` URLs, which are not publicly reachable — with this
/// backend the notifier falls back to the raw-identifier message.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    objects: Arc<Mutex<BTreeMap<String, StoredRecord>>>,
    put_error: Option<String>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose `put` always fails with the given message.
    pub fn with_put_error(message: impl Into<String>) -> Self {
        Self {
            objects: Arc::new(Mutex::new(BTreeMap::new())),
            put_error: Some(message.into()),
        }
    }

    /// Fetch stored content by path.
    pub fn content(&self, path: &str) -> Option<String> {
        self.objects
            .lock()
            .unwrap()
            .get(path)
            .map(|r| r.content.clone())
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ReportStore for InMemoryStore {
    async fn put(&self, path: &str, content: &str, content_type: &str) -> Result<StoredObject> {
        if let Some(ref message) = self.put_error {
            return Err(Error::Storage(message.clone()));
        }

        self.objects.lock().unwrap().insert(
            path.to_string(),
            StoredRecord {
                content: content.to_string(),
                content_type: content_type.to_string(),
            },
        );

        Ok(StoredObject {
            pathname: path.to_string(),
            url: format!("memory://{}", path),
        })
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|path| path.starts_with(prefix))
            .map(|path| StoredObject {
                pathname: path.clone(),
                url: format!("memory://{}", path),
            })
            .collect())
    }
}
