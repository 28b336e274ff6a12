// SPDX-License-Identifier: MIT OR Apache-2.0
//! Versioned read-through cache over the master-data service.
//!
//! The cache hands out `Arc<MasterDataSnapshot>` handles; callers treat a
//! snapshot as immutable for the duration of a step. Within the TTL the
//! cached snapshot is served as-is; once stale, the provider's version is
//! consulted and the snapshot is reloaded only when the version moved.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;
use ino_core::MasterDataSnapshot;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Errors from master-data access.
#[derive(Debug, thiserror::Error)]
pub enum MasterDataError {
    /// The upstream service was unreachable or answered non-2xx.
    #[error("masterdata service error: {0}")]
    Service(String),
    /// The upstream payload could not be decoded.
    #[error("masterdata decode error: {0}")]
    Decode(String),
}

/// Source of master-data snapshots.
#[async_trait]
pub trait MasterDataProvider: Send + Sync {
    /// Current version of the upstream data set.
    async fn version(&self) -> Result<u64, MasterDataError>;

    /// Fetch the full snapshot.
    async fn fetch(&self) -> Result<MasterDataSnapshot, MasterDataError>;
}

// ---------------------------------------------------------------------------
// HTTP provider
// ---------------------------------------------------------------------------

/// Provider backed by the master-data CRUD service.
pub struct HttpMasterDataProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(serde::Deserialize)]
struct VersionBody {
    version: u64,
}

impl HttpMasterDataProvider {
    /// Create a provider for the given service.
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.get(format!("{}{path}", self.base_url));
        if !self.api_key.is_empty() {
            req = req.header("X-API-Key", &self.api_key);
        }
        req
    }
}

#[async_trait]
impl MasterDataProvider for HttpMasterDataProvider {
    async fn version(&self) -> Result<u64, MasterDataError> {
        let resp = self
            .request("/v1/masterdata/version")
            .send()
            .await
            .map_err(|e| MasterDataError::Service(e.to_string()))?
            .error_for_status()
            .map_err(|e| MasterDataError::Service(e.to_string()))?;
        let body: VersionBody = resp
            .json()
            .await
            .map_err(|e| MasterDataError::Decode(e.to_string()))?;
        Ok(body.version)
    }

    async fn fetch(&self) -> Result<MasterDataSnapshot, MasterDataError> {
        let resp = self
            .request("/v1/masterdata")
            .send()
            .await
            .map_err(|e| MasterDataError::Service(e.to_string()))?
            .error_for_status()
            .map_err(|e| MasterDataError::Service(e.to_string()))?;
        resp.json()
            .await
            .map_err(|e| MasterDataError::Decode(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Static provider
// ---------------------------------------------------------------------------

/// Fixed-snapshot provider for tests and offline runs.
#[derive(Default)]
pub struct StaticMasterDataProvider {
    snapshot: Mutex<Arc<MasterDataSnapshot>>,
}

impl StaticMasterDataProvider {
    /// Create a provider serving the given snapshot.
    #[must_use]
    pub fn new(snapshot: MasterDataSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(Arc::new(snapshot)),
        }
    }

    /// Replace the served snapshot (advancing its version is the caller's
    /// responsibility).
    pub async fn set(&self, snapshot: MasterDataSnapshot) {
        *self.snapshot.lock().await = Arc::new(snapshot);
    }
}

#[async_trait]
impl MasterDataProvider for StaticMasterDataProvider {
    async fn version(&self) -> Result<u64, MasterDataError> {
        Ok(self.snapshot.lock().await.version)
    }

    async fn fetch(&self) -> Result<MasterDataSnapshot, MasterDataError> {
        Ok((**self.snapshot.lock().await).clone())
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

struct CacheEntry {
    snapshot: Arc<MasterDataSnapshot>,
    fetched_at: Instant,
}

/// Process-local read-through cache.
pub struct MasterDataCache {
    provider: Arc<dyn MasterDataProvider>,
    ttl: Duration,
    entry: RwLock<Option<CacheEntry>>,
}

impl MasterDataCache {
    /// Create a cache over `provider` with the given TTL.
    #[must_use]
    pub fn new(provider: Arc<dyn MasterDataProvider>, ttl: Duration) -> Self {
        Self {
            provider,
            ttl,
            entry: RwLock::new(None),
        }
    }

    /// Get the current snapshot, reloading when stale.
    ///
    /// # Errors
    ///
    /// Returns [`MasterDataError`] when a reload is needed and the provider
    /// fails.
    pub async fn get(&self) -> Result<Arc<MasterDataSnapshot>, MasterDataError> {
        {
            let guard = self.entry.read().await;
            if let Some(entry) = guard.as_ref()
                && entry.fetched_at.elapsed() < self.ttl
            {
                return Ok(entry.snapshot.clone());
            }
        }

        let mut guard = self.entry.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(entry) = guard.as_ref()
            && entry.fetched_at.elapsed() < self.ttl
        {
            return Ok(entry.snapshot.clone());
        }

        let upstream_version = self.provider.version().await?;
        if let Some(entry) = guard.as_mut()
            && entry.snapshot.version == upstream_version
        {
            // Unchanged upstream: extend the entry's lease.
            entry.fetched_at = Instant::now();
            return Ok(entry.snapshot.clone());
        }

        debug!(target: "ino.masterdata", version = upstream_version, "reloading snapshot");
        let snapshot = Arc::new(self.provider.fetch().await?);
        let handle = snapshot.clone();
        *guard = Some(CacheEntry {
            snapshot,
            fetched_at: Instant::now(),
        });
        Ok(handle)
    }

    /// Drop the cached entry; the next [`get`](Self::get) reloads.
    pub async fn invalidate(&self) {
        *self.entry.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ino_core::{Contact, Customer};
    use std::sync::atomic::{AtomicU64, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn snapshot(version: u64) -> MasterDataSnapshot {
        MasterDataSnapshot::new(
            version,
            vec![Customer {
                customer_id: "C1".into(),
                customer_num: "1001".into(),
                name: "Acme".into(),
                company_id: None,
            }],
            vec![Contact {
                contact_id: "P1".into(),
                email: "buyer@example.com".into(),
                name: "Buyer".into(),
                customer_id: "C1".into(),
                telephone: None,
            }],
            vec![],
            vec![],
        )
    }

    struct CountingProvider {
        inner: StaticMasterDataProvider,
        fetches: AtomicU64,
    }

    #[async_trait]
    impl MasterDataProvider for CountingProvider {
        async fn version(&self) -> Result<u64, MasterDataError> {
            self.inner.version().await
        }

        async fn fetch(&self) -> Result<MasterDataSnapshot, MasterDataError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch().await
        }
    }

    #[tokio::test]
    async fn serves_cached_within_ttl() {
        let provider = Arc::new(CountingProvider {
            inner: StaticMasterDataProvider::new(snapshot(1)),
            fetches: AtomicU64::new(0),
        });
        let cache = MasterDataCache::new(provider.clone(), Duration::from_secs(300));

        let a = cache.get().await.unwrap();
        let b = cache.get().await.unwrap();
        assert_eq!(a.version, 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(provider.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_entry_with_same_version_extends_lease() {
        let provider = Arc::new(CountingProvider {
            inner: StaticMasterDataProvider::new(snapshot(1)),
            fetches: AtomicU64::new(0),
        });
        let cache = MasterDataCache::new(provider.clone(), Duration::ZERO);

        let _ = cache.get().await.unwrap();
        let _ = cache.get().await.unwrap();
        // Version unchanged, so only the first get fetched the body.
        assert_eq!(provider.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn version_bump_triggers_reload() {
        let provider = Arc::new(CountingProvider {
            inner: StaticMasterDataProvider::new(snapshot(1)),
            fetches: AtomicU64::new(0),
        });
        let cache = MasterDataCache::new(provider.clone(), Duration::ZERO);

        assert_eq!(cache.get().await.unwrap().version, 1);
        provider.inner.set(snapshot(2)).await;
        assert_eq!(cache.get().await.unwrap().version, 2);
        assert_eq!(provider.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_fetch() {
        let provider = Arc::new(CountingProvider {
            inner: StaticMasterDataProvider::new(snapshot(1)),
            fetches: AtomicU64::new(0),
        });
        let cache = MasterDataCache::new(provider.clone(), Duration::from_secs(300));
        let _ = cache.get().await.unwrap();
        cache.invalidate().await;
        let _ = cache.get().await.unwrap();
        assert_eq!(provider.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn http_provider_fetches_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/masterdata/version"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "version": 5
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/masterdata"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::to_value(snapshot(5)).unwrap()),
            )
            .mount(&server)
            .await;

        let provider =
            HttpMasterDataProvider::new(reqwest::Client::new(), server.uri(), "key");
        assert_eq!(provider.version().await.unwrap(), 5);
        let snap = provider.fetch().await.unwrap();
        assert_eq!(snap.version, 5);
        assert!(snap.get_contact_by_email("BUYER@example.com").is_some());
    }

    #[tokio::test]
    async fn http_provider_maps_5xx_to_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/masterdata/version"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let provider =
            HttpMasterDataProvider::new(reqwest::Client::new(), server.uri(), "");
        assert!(matches!(
            provider.version().await.unwrap_err(),
            MasterDataError::Service(_)
        ));
    }
}
