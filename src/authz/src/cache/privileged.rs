//! Classic administrator registry
//!
//! Classic (co-)administrators hold a legacy bypass over everything under
//! one subscription root. They show up in the subscription's role
//! assignments with a `;`-delimited role name such as
//! `ServiceAdministrator;AccountAdministrator`.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::ProviderError;
use crate::scope::ResourceScope;
use crate::types::RoleAssignment;

/// Role names that mark a classic administrator
pub const DEFAULT_PRIVILEGED_ROLES: [&str; 2] = ["CoAdministrator", "ServiceAdministrator"];

const EXTERNAL_MARKER: &str = "#ext#";

/// Normalizes a principal name for membership comparison
///
/// Guest accounts appear in two forms: `alice_contoso.com#EXT#@tenant.onmicrosoft.com`
/// and `alice@contoso.com`. Both canonicalize to `alice@contoso.com`.
/// Comparison is case-insensitive, so the canonical form is lower-cased.
///
/// ```
/// use azfiles_authz::cache::canonicalize_principal;
///
/// assert_eq!(
///     canonicalize_principal("Alice_Contoso.com#EXT#@fabrikam.onmicrosoft.com"),
///     canonicalize_principal("alice@contoso.com"),
/// );
/// ```
pub fn canonicalize_principal(principal: &str) -> String {
    let lowered = principal.trim().to_lowercase();
    if !lowered.contains(EXTERNAL_MARKER) {
        return lowered;
    }

    let local = lowered.split('@').next().unwrap_or_default();
    let stripped = local.replace(EXTERNAL_MARKER, "");

    // The guest's own domain follows the last `_`; the local part may contain more.
    match stripped.rfind('_') {
        Some(idx) => format!("{}@{}", &stripped[..idx], &stripped[idx + 1..]),
        None => stripped,
    }
}

/// Canonical principals holding the classic administrator bypass, per subscription
///
/// Each subscription root has its own set. While a subscription's set is
/// empty, [`ensure_populated`](Self::ensure_populated) queries the provider
/// again; once it holds members it is reused until [`clear`](Self::clear).
pub struct PrivilegedPrincipalRegistry {
    principals: RwLock<HashMap<String, HashSet<String>>>,
    role_names: Vec<String>,
}

impl PrivilegedPrincipalRegistry {
    /// Registry recognizing the default classic administrator role names
    pub fn new() -> Self {
        Self::with_role_names(DEFAULT_PRIVILEGED_ROLES.iter().map(|s| s.to_string()).collect())
    }

    /// Registry recognizing a custom set of role names
    pub fn with_role_names(role_names: Vec<String>) -> Self {
        Self {
            principals: RwLock::new(HashMap::new()),
            role_names,
        }
    }

    fn key(subscription_root: &ResourceScope) -> String {
        subscription_root.format().to_ascii_lowercase()
    }

    fn is_privileged_assignment(&self, assignment: &RoleAssignment) -> bool {
        assignment
            .role_names()
            .any(|name| self.role_names.iter().any(|r| r.eq_ignore_ascii_case(name)))
    }

    /// Rebuilds one subscription's set from its root role assignments
    ///
    /// Returns the number of privileged principals found.
    pub async fn populate(&self, subscription_root: &ResourceScope, assignments: &[RoleAssignment]) -> usize {
        let rebuilt: HashSet<String> = assignments
            .iter()
            .filter(|a| self.is_privileged_assignment(a))
            .map(|a| canonicalize_principal(&a.principal))
            .collect();

        let count = rebuilt.len();
        self.principals
            .write()
            .await
            .insert(Self::key(subscription_root), rebuilt);

        debug!("Privileged principals for {}: {}", subscription_root, count);
        count
    }

    /// Populates `subscription_root` through `fetch` unless it already has members
    pub async fn ensure_populated<F, Fut>(&self, subscription_root: &ResourceScope, fetch: F) -> Result<(), ProviderError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<RoleAssignment>, ProviderError>>,
    {
        if self.is_populated(subscription_root).await {
            return Ok(());
        }

        let assignments = fetch().await?;
        let count = self.populate(subscription_root, &assignments).await;
        info!(
            "Discovered {} classic administrator(s) in {} assignments at {}",
            count,
            assignments.len(),
            subscription_root
        );
        Ok(())
    }

    /// Whether the canonical form of `principal` is privileged in `subscription_root`
    pub async fn contains(&self, subscription_root: &ResourceScope, principal: &str) -> bool {
        self.principals
            .read()
            .await
            .get(&Self::key(subscription_root))
            .is_some_and(|set| set.contains(&canonicalize_principal(principal)))
    }

    pub async fn is_populated(&self, subscription_root: &ResourceScope) -> bool {
        self.principals
            .read()
            .await
            .get(&Self::key(subscription_root))
            .is_some_and(|set| !set.is_empty())
    }

    /// Number of privileged principals known for `subscription_root`
    pub async fn len(&self, subscription_root: &ResourceScope) -> usize {
        self.principals
            .read()
            .await
            .get(&Self::key(subscription_root))
            .map_or(0, HashSet::len)
    }

    /// Empties every subscription's set; the next evaluation re-populates
    pub async fn clear(&self) {
        self.principals.write().await.clear();
    }
}

impl Default for PrivilegedPrincipalRegistry {
    fn default() -> Self {
        Self::new()
    }
}
