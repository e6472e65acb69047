//! Role definition id → grant set cache

use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use super::CacheStats;
use crate::error::ProviderError;
use crate::types::GrantSet;

/// Cache of role definition grant sets
///
/// Ids are compared case-insensitively. The map is a `DashMap`, so the
/// cache can be shared between tasks; two tasks missing on the same id at
/// once may both fetch it, and the last insert wins.
pub struct RoleDefinitionCache {
    entries: Arc<DashMap<String, Arc<GrantSet>>>,
    stats: Arc<DashMap<&'static str, usize>>,
}

impl RoleDefinitionCache {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            stats: Arc::new(DashMap::new()),
        }
    }

    fn key(id: &str) -> String {
        id.trim().to_ascii_lowercase()
    }

    /// Returns the cached grant set, fetching and storing it on a miss
    ///
    /// A failed fetch is returned as-is and nothing is cached.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        role_definition_id: &str,
        fetch: F,
    ) -> Result<Arc<GrantSet>, ProviderError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<GrantSet, ProviderError>>,
    {
        let key = Self::key(role_definition_id);

        if let Some(grants) = self.entries.get(&key) {
            self.increment_stat("hits");
            return Ok(Arc::clone(grants.value()));
        }

        self.increment_stat("misses");
        debug!("Role definition cache miss: {}", role_definition_id);

        let grants = Arc::new(fetch().await?);
        self.entries.insert(key, Arc::clone(&grants));
        Ok(grants)
    }

    /// Cached grant set, without fetching
    pub fn get(&self, role_definition_id: &str) -> Option<Arc<GrantSet>> {
        self.entries
            .get(&Self::key(role_definition_id))
            .map(|g| Arc::clone(g.value()))
    }

    /// Seed the cache with a known grant set
    pub fn insert(&self, role_definition_id: &str, grants: GrantSet) {
        self.entries.insert(Self::key(role_definition_id), Arc::new(grants));
    }

    /// Empties the cache; the next lookup of every id refetches
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.get_stat("hits"),
            misses: self.get_stat("misses"),
            entries: self.entries.len(),
        }
    }

    fn increment_stat(&self, key: &'static str) {
        self.stats
            .entry(key)
            .and_modify(|count| *count += 1)
            .or_insert(1);
    }

    fn get_stat(&self, key: &str) -> usize {
        self.stats.get(key).map(|v| *v).unwrap_or(0)
    }
}

impl Default for RoleDefinitionCache {
    fn default() -> Self {
        Self::new()
    }
}
