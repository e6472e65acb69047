//! Pass/fail gate over the evaluator

use std::sync::Arc;
use tracing::{debug, warn};

use super::PermissionEvaluator;
use crate::error::{AuthzError, Result};
use crate::types::Operation;

/// Turns an evaluation into a single pass/fail outcome
///
/// A failed assertion reports every missing operation at once, in request
/// order, so callers can surface the whole list in one message.
#[derive(Clone)]
pub struct AssertionGate {
    evaluator: Arc<PermissionEvaluator>,
}

impl AssertionGate {
    pub fn new(evaluator: Arc<PermissionEvaluator>) -> Self {
        Self { evaluator }
    }

    pub fn evaluator(&self) -> &Arc<PermissionEvaluator> {
        &self.evaluator
    }

    /// Succeeds iff `principal` holds every operation at `scope`
    ///
    /// Fails with [`AuthzError::InsufficientPermission`] listing all missing
    /// operations; any evaluation error is returned unchanged.
    pub async fn assert_permissions(&self, scope: &str, operations: &[Operation], principal: &str) -> Result<()> {
        self.check(scope, operations, principal, false).await
    }

    /// Same as [`assert_permissions`](Self::assert_permissions), clearing the
    /// evaluator caches first
    pub async fn assert_permissions_with_refresh(
        &self,
        scope: &str,
        operations: &[Operation],
        principal: &str,
    ) -> Result<()> {
        self.check(scope, operations, principal, true).await
    }

    async fn check(&self, scope: &str, operations: &[Operation], principal: &str, refresh: bool) -> Result<()> {
        let result = self.evaluator.evaluate(scope, operations, principal, refresh).await?;

        let missing = result.missing();
        if missing.is_empty() {
            debug!("{} holds all {} requested operations on {}", principal, result.len(), scope);
            return Ok(());
        }

        warn!(
            "{} is missing {} of {} operations on {}: {}",
            principal,
            missing.len(),
            result.len(),
            scope,
            missing.join(", ")
        );

        Err(AuthzError::InsufficientPermission {
            principal: principal.to_string(),
            scope: result.scope,
            missing,
        })
    }
}

impl From<Arc<PermissionEvaluator>> for AssertionGate {
    fn from(evaluator: Arc<PermissionEvaluator>) -> Self {
        Self::new(evaluator)
    }
}
