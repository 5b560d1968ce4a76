//! Release catalog: version string to downloadable artifact.
//!
//! The catalog is a single cached snapshot stored under a fixed key. A cache
//! hit is returned as-is; staleness is the cache owner's problem. On a miss
//! the version-check endpoint is read once and the single release it
//! describes becomes a one-entry map. Fetch or parse failures produce an
//! empty map, which is a valid (if useless) catalog rather than an error.
//!
//! Two resolutions racing on a miss may both hit the endpoint; the read is
//! idempotent so no lock is taken.

pub mod cache;
pub mod source;

use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::DeployError;
use crate::types::{Release, ReleaseMap};

pub use cache::{FileCache, MemoryCache, VersionCache};
pub use source::{HttpVersionSource, VersionSource};

#[derive(Clone)]
pub struct ReleaseCatalog {
    cache: Arc<dyn VersionCache>,
    source: Arc<dyn VersionSource>,
    cache_key: String,
}

impl std::fmt::Debug for ReleaseCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseCatalog")
            .field("cache_key", &self.cache_key)
            .finish_non_exhaustive()
    }
}

impl ReleaseCatalog {
    pub fn new(
        cache: Arc<dyn VersionCache>,
        source: Arc<dyn VersionSource>,
        cache_key: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            source,
            cache_key: cache_key.into(),
        }
    }

    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    /// Current release snapshot, fetched on a cache miss.
    pub fn releases(&self) -> ReleaseMap {
        if let Some(releases) = self.cache.get(&self.cache_key) {
            tracing::debug!(key = %self.cache_key, count = releases.len(), "release cache hit");
            return releases;
        }

        tracing::debug!(key = %self.cache_key, "release cache miss, querying version endpoint");
        let document = match self.source.fetch_latest() {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "version check failed");
                return ReleaseMap::new();
            }
        };

        let release: Release = match serde_json::from_value(document) {
            Ok(release) => release,
            Err(e) => {
                tracing::warn!(error = %e, "version check returned an unusable document");
                return ReleaseMap::new();
            }
        };

        let mut releases = ReleaseMap::new();
        releases.insert(release.version.clone(), release);

        if let Err(e) = self.cache.set(&self.cache_key, &releases) {
            tracing::warn!(error = %format!("{:#}", e), "failed to store release snapshot");
        }
        releases
    }

    /// Look up a version; unknown versions are a resolution failure.
    pub fn resolve(&self, version: &str) -> Result<Release, DeployError> {
        self.releases().remove(version).ok_or_else(|| {
            DeployError::resolution(format!("version {} is not in the release catalog", version))
        })
    }

    /// Known versions, oldest first.
    pub fn list_versions(&self) -> Vec<String> {
        let mut versions: Vec<String> = self.releases().into_keys().collect();
        versions.sort_by(|a, b| compare_versions(a, b));
        versions
    }

    /// Newest known version.
    pub fn latest(&self) -> Option<String> {
        self.list_versions().pop()
    }

    pub fn invalidate(&self) -> anyhow::Result<()> {
        self.cache.invalidate(&self.cache_key)
    }
}

/// Semver order when both sides parse, lexical otherwise.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (semver::Version::parse(a), semver::Version::parse(b)) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}
