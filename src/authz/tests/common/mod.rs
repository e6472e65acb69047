//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use azfiles_authz::provider::ProviderResult;
use azfiles_authz::{
    DenyAssignment, DirectoryProvider, GrantSet, InMemoryDirectory, ProviderError, ResourceScope,
    RoleAssignment,
};
use std::time::Duration;

pub const SUBSCRIPTION: &str = "/subscriptions/S";
pub const ACCOUNT_SCOPE: &str =
    "/subscriptions/S/resourceGroups/G/providers/Microsoft.Storage/storageAccounts/A";
pub const LISTKEYS: &str = "Microsoft.Storage/storageAccounts/listkeys/action";

pub const ALICE: &str = "alice@contoso.com";
pub const ADMIN: &str = "admin@contoso.com";

/// Directory with one storage contributor assignment for alice at the account
/// and one classic service administrator at the subscription root
pub async fn storage_directory() -> InMemoryDirectory {
    let directory = InMemoryDirectory::new();

    directory
        .add_role_definition(
            "storage-contributor",
            GrantSet::with_actions(["Microsoft.Storage/storageAccounts/*"]),
        )
        .await;
    directory
        .add_role_assignment(RoleAssignment::new(
            "storage-contributor",
            "Storage Account Contributor",
            ACCOUNT_SCOPE,
            ALICE,
        ))
        .await;
    directory
        .add_role_assignment(RoleAssignment::new(
            "",
            "ServiceAdministrator;AccountAdministrator",
            SUBSCRIPTION,
            ADMIN,
        ))
        .await;

    directory
}

pub fn listkeys_deny(principal: &str) -> DenyAssignment {
    DenyAssignment::new(ACCOUNT_SCOPE, principal, GrantSet::with_actions([LISTKEYS]))
        .with_name("block listkeys")
}

/// Which provider call should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    SubscriptionRoot,
    RoleAssignments,
    RoleDefinition,
    DenyAssignments,
}

/// Provider delegating to an in-memory directory, failing at one call
pub struct FailingDirectory {
    pub inner: InMemoryDirectory,
    pub fail_at: FailAt,
}

impl FailingDirectory {
    fn fail(&self, at: FailAt) -> ProviderResult<()> {
        if self.fail_at == at {
            Err(ProviderError::Unavailable(format!("{:?} backend down", at)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DirectoryProvider for FailingDirectory {
    async fn fetch_role_assignments(
        &self,
        scope: &ResourceScope,
        principal: &str,
    ) -> ProviderResult<Vec<RoleAssignment>> {
        self.fail(FailAt::RoleAssignments)?;
        self.inner.fetch_role_assignments(scope, principal).await
    }

    async fn fetch_role_definition_grant_set(&self, id: &str) -> ProviderResult<GrantSet> {
        self.fail(FailAt::RoleDefinition)?;
        self.inner.fetch_role_definition_grant_set(id).await
    }

    async fn fetch_deny_assignments(
        &self,
        scope: &ResourceScope,
        principal: &str,
    ) -> ProviderResult<Vec<DenyAssignment>> {
        self.fail(FailAt::DenyAssignments)?;
        self.inner.fetch_deny_assignments(scope, principal).await
    }

    async fn fetch_subscription_root_role_assignments(
        &self,
        root: &ResourceScope,
    ) -> ProviderResult<Vec<RoleAssignment>> {
        self.fail(FailAt::SubscriptionRoot)?;
        self.inner.fetch_subscription_root_role_assignments(root).await
    }
}

/// Provider that sleeps before answering role assignment queries
pub struct SlowDirectory {
    pub inner: InMemoryDirectory,
    pub delay: Duration,
}

#[async_trait]
impl DirectoryProvider for SlowDirectory {
    async fn fetch_role_assignments(
        &self,
        scope: &ResourceScope,
        principal: &str,
    ) -> ProviderResult<Vec<RoleAssignment>> {
        tokio::time::sleep(self.delay).await;
        self.inner.fetch_role_assignments(scope, principal).await
    }

    async fn fetch_role_definition_grant_set(&self, id: &str) -> ProviderResult<GrantSet> {
        self.inner.fetch_role_definition_grant_set(id).await
    }

    async fn fetch_deny_assignments(
        &self,
        scope: &ResourceScope,
        principal: &str,
    ) -> ProviderResult<Vec<DenyAssignment>> {
        self.inner.fetch_deny_assignments(scope, principal).await
    }

    async fn fetch_subscription_root_role_assignments(
        &self,
        root: &ResourceScope,
    ) -> ProviderResult<Vec<RoleAssignment>> {
        self.inner.fetch_subscription_root_role_assignments(root).await
    }
}
