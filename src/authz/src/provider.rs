//! Directory provider boundary
//!
//! The evaluator never talks to an identity backend directly. Everything it
//! needs comes through [`DirectoryProvider`]; [`InMemoryDirectory`] is a
//! provider backed by a [`DirectorySnapshot`], used by the CLI and tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

use crate::cache::canonicalize_principal;
use crate::error::{AuthzError, ProviderError, Result};
use crate::scope::ResourceScope;
use crate::types::{DenyAssignment, GrantSet, RoleAssignment};

/// Result type for provider calls
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Source of role and deny assignment data
#[async_trait]
pub trait DirectoryProvider: Send + Sync {
    /// Role assignments granting `principal` access at `scope`
    async fn fetch_role_assignments(
        &self,
        scope: &ResourceScope,
        principal: &str,
    ) -> ProviderResult<Vec<RoleAssignment>>;

    /// Grant set of a role definition
    async fn fetch_role_definition_grant_set(&self, role_definition_id: &str) -> ProviderResult<GrantSet>;

    /// Deny assignments applying to `principal` at `scope`
    async fn fetch_deny_assignments(
        &self,
        scope: &ResourceScope,
        principal: &str,
    ) -> ProviderResult<Vec<DenyAssignment>>;

    /// Every role assignment at a subscription root, classic administrators included
    async fn fetch_subscription_root_role_assignments(
        &self,
        subscription_root: &ResourceScope,
    ) -> ProviderResult<Vec<RoleAssignment>>;
}

/// Serializable directory contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DirectorySnapshot {
    /// Role definition id → grant set
    #[serde(default)]
    pub role_definitions: HashMap<String, GrantSet>,

    #[serde(default)]
    pub role_assignments: Vec<RoleAssignment>,

    #[serde(default)]
    pub deny_assignments: Vec<DenyAssignment>,
}

impl DirectorySnapshot {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| AuthzError::Snapshot(e.to_string()))
    }

    /// Loads a snapshot from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| AuthzError::Snapshot(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&contents)
    }
}

/// Number of calls served by each provider method
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchCounts {
    pub role_assignments: usize,
    pub role_definitions: usize,
    pub deny_assignments: usize,
    pub subscription_root: usize,
}

#[derive(Default)]
struct Counters {
    role_assignments: AtomicUsize,
    role_definitions: AtomicUsize,
    deny_assignments: AtomicUsize,
    subscription_root: AtomicUsize,
}

/// In-memory directory provider
///
/// An assignment applies to its own scope and every scope beneath it.
/// Principals are compared in canonical form.
#[derive(Clone, Default)]
pub struct InMemoryDirectory {
    snapshot: Arc<RwLock<DirectorySnapshot>>,
    counters: Arc<Counters>,
}

impl InMemoryDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: DirectorySnapshot) -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(snapshot)),
            counters: Arc::new(Counters::default()),
        }
    }

    pub async fn add_role_definition(&self, id: impl Into<String>, grants: GrantSet) {
        self.snapshot.write().await.role_definitions.insert(id.into(), grants);
    }

    pub async fn add_role_assignment(&self, assignment: RoleAssignment) {
        self.snapshot.write().await.role_assignments.push(assignment);
    }

    pub async fn add_deny_assignment(&self, assignment: DenyAssignment) {
        self.snapshot.write().await.deny_assignments.push(assignment);
    }

    /// Copy of the current directory contents
    pub async fn snapshot(&self) -> DirectorySnapshot {
        self.snapshot.read().await.clone()
    }

    pub fn fetch_counts(&self) -> FetchCounts {
        FetchCounts {
            role_assignments: self.counters.role_assignments.load(Ordering::Relaxed),
            role_definitions: self.counters.role_definitions.load(Ordering::Relaxed),
            deny_assignments: self.counters.deny_assignments.load(Ordering::Relaxed),
            subscription_root: self.counters.subscription_root.load(Ordering::Relaxed),
        }
    }

    /// Whether an assignment made at `assigned` applies to `requested`
    fn applies(assigned: &str, requested: &ResourceScope) -> bool {
        match ResourceScope::parse(assigned) {
            Ok(assigned) => requested.is_within(&assigned),
            Err(e) => {
                warn!("Skipping assignment with unparseable scope: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl DirectoryProvider for InMemoryDirectory {
    async fn fetch_role_assignments(
        &self,
        scope: &ResourceScope,
        principal: &str,
    ) -> ProviderResult<Vec<RoleAssignment>> {
        self.counters.role_assignments.fetch_add(1, Ordering::Relaxed);
        let principal = canonicalize_principal(principal);

        let snapshot = self.snapshot.read().await;
        Ok(snapshot
            .role_assignments
            .iter()
            .filter(|a| canonicalize_principal(&a.principal) == principal)
            .filter(|a| Self::applies(&a.scope, scope))
            .cloned()
            .collect())
    }

    async fn fetch_role_definition_grant_set(&self, role_definition_id: &str) -> ProviderResult<GrantSet> {
        self.counters.role_definitions.fetch_add(1, Ordering::Relaxed);

        let snapshot = self.snapshot.read().await;
        snapshot
            .role_definitions
            .iter()
            .find(|(id, _)| id.eq_ignore_ascii_case(role_definition_id))
            .map(|(_, grants)| grants.clone())
            .ok_or_else(|| ProviderError::NotFound(format!("role definition {}", role_definition_id)))
    }

    async fn fetch_deny_assignments(
        &self,
        scope: &ResourceScope,
        principal: &str,
    ) -> ProviderResult<Vec<DenyAssignment>> {
        self.counters.deny_assignments.fetch_add(1, Ordering::Relaxed);
        let principal = canonicalize_principal(principal);

        let snapshot = self.snapshot.read().await;
        Ok(snapshot
            .deny_assignments
            .iter()
            .filter(|d| canonicalize_principal(&d.principal) == principal)
            .filter(|d| Self::applies(&d.scope, scope))
            .cloned()
            .collect())
    }

    async fn fetch_subscription_root_role_assignments(
        &self,
        subscription_root: &ResourceScope,
    ) -> ProviderResult<Vec<RoleAssignment>> {
        self.counters.subscription_root.fetch_add(1, Ordering::Relaxed);

        let snapshot = self.snapshot.read().await;
        Ok(snapshot
            .role_assignments
            .iter()
            .filter(|a| Self::applies(&a.scope, subscription_root))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROUP: &str = "/subscriptions/S/resourceGroups/G";
    const ACCOUNT: &str = "/subscriptions/S/resourceGroups/G/providers/Microsoft.Storage/storageAccounts/A";

    fn scope(s: &str) -> ResourceScope {
        ResourceScope::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_assignments_inherit_downwards() {
        let directory = InMemoryDirectory::new();
        directory
            .add_role_assignment(RoleAssignment::new("reader", "Reader", GROUP, "alice@contoso.com"))
            .await;

        let at_account = directory
            .fetch_role_assignments(&scope(ACCOUNT), "alice@contoso.com")
            .await
            .unwrap();
        assert_eq!(at_account.len(), 1);

        let at_subscription = directory
            .fetch_role_assignments(&scope("/subscriptions/S"), "alice@contoso.com")
            .await
            .unwrap();
        assert!(at_subscription.is_empty());

        let other_principal = directory
            .fetch_role_assignments(&scope(ACCOUNT), "bob@contoso.com")
            .await
            .unwrap();
        assert!(other_principal.is_empty());
    }

    #[tokio::test]
    async fn test_guest_principal_matches_classic_form() {
        let directory = InMemoryDirectory::new();
        directory
            .add_deny_assignment(DenyAssignment::new(
                GROUP,
                "alice_contoso.com#EXT#@fabrikam.onmicrosoft.com",
                GrantSet::with_actions(["*"]),
            ))
            .await;

        let denies = directory
            .fetch_deny_assignments(&scope(ACCOUNT), "Alice@contoso.com")
            .await
            .unwrap();
        assert_eq!(denies.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_role_definition() {
        let directory = InMemoryDirectory::new();
        directory.add_role_definition("Reader", GrantSet::with_actions(["*/read"])).await;

        assert!(directory.fetch_role_definition_grant_set("reader").await.is_ok());
        let err = directory.fetch_role_definition_grant_set("owner").await.unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
        assert_eq!(directory.fetch_counts().role_definitions, 2);
    }

    #[tokio::test]
    async fn test_subscription_root_assignments() {
        let directory = InMemoryDirectory::new();
        directory
            .add_role_assignment(RoleAssignment::new("", "ServiceAdministrator", "/subscriptions/S", "admin@contoso.com"))
            .await;
        directory
            .add_role_assignment(RoleAssignment::new("reader", "Reader", GROUP, "alice@contoso.com"))
            .await;
        directory
            .add_role_assignment(RoleAssignment::new("", "CoAdministrator", "/subscriptions/T", "other@contoso.com"))
            .await;

        let root = directory
            .fetch_subscription_root_role_assignments(&scope("/subscriptions/S"))
            .await
            .unwrap();
        assert_eq!(root.len(), 1);
        assert_eq!(root[0].principal, "admin@contoso.com");
    }

    #[test]
    fn test_snapshot_from_json() {
        let json = r#"{
            "RoleDefinitions": {
                "17d1049b": { "Actions": ["Microsoft.Storage/storageAccounts/*"] }
            },
            "RoleAssignments": [
                {
                    "RoleDefinitionId": "17d1049b",
                    "RoleDefinitionName": "Storage Account Contributor",
                    "Scope": "/subscriptions/S",
                    "SignInName": "alice@contoso.com"
                }
            ]
        }"#;

        let snapshot = DirectorySnapshot::from_json(json).unwrap();
        assert_eq!(snapshot.role_definitions.len(), 1);
        assert_eq!(snapshot.role_assignments[0].role_definition_id, "17d1049b");
        assert!(snapshot.deny_assignments.is_empty());

        assert!(matches!(
            DirectorySnapshot::from_json("{ not json"),
            Err(AuthzError::Snapshot(_))
        ));
    }

    #[test]
    fn test_snapshot_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = DirectorySnapshot::load(dir.path().join("absent.json")).unwrap_err();
        match err {
            AuthzError::Snapshot(msg) => assert!(msg.contains("absent.json")),
            other => panic!("expected snapshot error, got {:?}", other),
        }
    }
}
