//! Evaluator-owned caches
//!
//! Both caches are created empty with their evaluator, filled on first use,
//! and only emptied by an explicit clear. Nothing expires on its own: stale
//! entries are tolerated because evaluation is read-only and advisory.

mod privileged;
mod role_definitions;

pub use privileged::{canonicalize_principal, PrivilegedPrincipalRegistry, DEFAULT_PRIVILEGED_ROLES};
pub use role_definitions::RoleDefinitionCache;

/// Statistics about cache usage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of lookups served from the cache
    pub hits: usize,
    /// Number of lookups that went to the provider
    pub misses: usize,
    /// Number of entries currently cached
    pub entries: usize,
}

impl CacheStats {
    /// Calculates the cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
