//! Effective-permission evaluator
//!
//! Combines the classic administrator bypass, role assignment grants and
//! deny assignments into one verdict per requested operation.

pub mod gate;
pub mod metrics;

pub use gate::AssertionGate;
pub use metrics::{EvaluatorMetrics, MetricsCollector};

use crate::cache::{CacheStats, PrivilegedPrincipalRegistry, RoleDefinitionCache};
use crate::config::EvaluatorConfig;
use crate::error::{AuthzError, Result};
use crate::pattern::{PatternMatcher, WildcardMatcher};
use crate::provider::DirectoryProvider;
use crate::scope::ResourceScope;
use crate::types::{EvaluationResult, GrantSet, Operation, Verdict};

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Whether `grants` covers `operation`
///
/// True iff some allow pattern matches and no exclusion pattern does. The
/// lists are chosen by [`Operation::is_data_action`].
pub fn operation_granted(matcher: &dyn PatternMatcher, grants: &GrantSet, operation: &Operation) -> bool {
    let (allow, exclude) = grants.lists_for(operation);
    matcher.matches_any(&operation.name, allow) && !matcher.matches_any(&operation.name, exclude)
}

/// Permission evaluator
///
/// # Pipeline
///
/// ```text
/// scope, operations, principal
///   → PrivilegedPrincipalRegistry ──(privileged)──→ all allowed
///   → role assignments → RoleDefinitionCache → PatternMatcher  (OR of grants)
///   → deny assignments → PatternMatcher                        (deny wins)
///   → EvaluationResult
/// ```
///
/// Both caches belong to the evaluator; separate evaluators never share
/// cached state.
pub struct PermissionEvaluator {
    /// Identity backend
    provider: Arc<dyn DirectoryProvider>,

    matcher: Arc<dyn PatternMatcher>,

    role_definitions: RoleDefinitionCache,

    privileged: PrivilegedPrincipalRegistry,

    metrics: Option<Arc<MetricsCollector>>,

    config: EvaluatorConfig,
}

impl PermissionEvaluator {
    /// Create an evaluator with default configuration
    pub fn new(provider: Arc<dyn DirectoryProvider>) -> Self {
        Self::with_config(provider, EvaluatorConfig::default())
    }

    pub fn with_config(provider: Arc<dyn DirectoryProvider>, config: EvaluatorConfig) -> Self {
        let metrics = if config.enable_metrics {
            Some(Arc::new(MetricsCollector::new()))
        } else {
            None
        };

        info!(
            "PermissionEvaluator initialized with deadline={:?}, privileged_roles={:?}, metrics={}",
            config.deadline(),
            config.privileged_role_names,
            config.enable_metrics
        );

        Self {
            provider,
            matcher: Arc::new(WildcardMatcher::new()),
            role_definitions: RoleDefinitionCache::new(),
            privileged: PrivilegedPrincipalRegistry::with_role_names(config.privileged_role_names.clone()),
            metrics,
            config,
        }
    }

    /// Replace the pattern matching rule
    pub fn with_matcher(mut self, matcher: Arc<dyn PatternMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    /// Evaluate `operations` for `principal` at the scope string `scope`
    ///
    /// With `refresh_cache` both caches are emptied first.
    pub async fn evaluate(
        &self,
        scope: &str,
        operations: &[Operation],
        principal: &str,
        refresh_cache: bool,
    ) -> Result<EvaluationResult> {
        let scope = ResourceScope::parse(scope)?;
        self.evaluate_scope(&scope, operations, principal, refresh_cache).await
    }

    /// Evaluate against an already parsed scope, under the configured deadline
    pub async fn evaluate_scope(
        &self,
        scope: &ResourceScope,
        operations: &[Operation],
        principal: &str,
        refresh_cache: bool,
    ) -> Result<EvaluationResult> {
        match self.config.deadline() {
            Some(deadline) => {
                self.evaluate_with_deadline(scope, operations, principal, refresh_cache, deadline)
                    .await
            }
            None => self.run(scope, operations, principal, refresh_cache).await,
        }
    }

    /// Evaluate, failing with [`AuthzError::DeadlineExceeded`] after `deadline`
    ///
    /// Provider calls in flight when the deadline passes are dropped.
    pub async fn evaluate_with_deadline(
        &self,
        scope: &ResourceScope,
        operations: &[Operation],
        principal: &str,
        refresh_cache: bool,
        deadline: Duration,
    ) -> Result<EvaluationResult> {
        match tokio::time::timeout(deadline, self.run(scope, operations, principal, refresh_cache)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!("Permission evaluation for {} on {} exceeded {:?}", principal, scope, deadline);
                if let Some(metrics) = &self.metrics {
                    metrics.record_deadline_exceeded().await;
                }
                Err(AuthzError::DeadlineExceeded(deadline))
            }
        }
    }

    /// Empty both caches
    pub async fn refresh_caches(&self) {
        self.privileged.clear().await;
        self.role_definitions.clear();
        info!("Permission caches cleared");
    }

    /// Role definition cache statistics
    pub fn role_definition_stats(&self) -> CacheStats {
        self.role_definitions.stats()
    }

    pub fn privileged_registry(&self) -> &PrivilegedPrincipalRegistry {
        &self.privileged
    }

    /// Metrics snapshot, if metrics are enabled
    pub async fn get_metrics(&self) -> Option<EvaluatorMetrics> {
        match &self.metrics {
            Some(metrics) => Some(metrics.get_metrics().await),
            None => None,
        }
    }

    pub fn metrics_collector(&self) -> Option<Arc<MetricsCollector>> {
        self.metrics.clone()
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    async fn run(
        &self,
        scope: &ResourceScope,
        operations: &[Operation],
        principal: &str,
        refresh_cache: bool,
    ) -> Result<EvaluationResult> {
        if operations.is_empty() {
            return Err(AuthzError::NoOperations);
        }

        let evaluation_id = Uuid::new_v4();
        let span = info_span!(
            "evaluate",
            %evaluation_id,
            principal = %principal,
            scope = %scope,
            refresh = refresh_cache
        );

        let start = Instant::now();
        let outcome = self
            .evaluate_inner(evaluation_id, scope, operations, principal, refresh_cache)
            .instrument(span)
            .await;

        if let Some(metrics) = &self.metrics {
            match &outcome {
                Ok(result) => {
                    let allowed = result.iter().filter(|e| e.allowed()).count();
                    let privileged = result.iter().all(|e| e.verdict == Verdict::Privileged);
                    metrics
                        .record_evaluation(allowed, result.len() - allowed, privileged)
                        .await;
                    metrics.record_latency(start.elapsed()).await;
                }
                Err(AuthzError::Provider(_)) => metrics.record_provider_error().await,
                Err(_) => {}
            }
        }

        outcome
    }

    async fn evaluate_inner(
        &self,
        evaluation_id: Uuid,
        scope: &ResourceScope,
        operations: &[Operation],
        principal: &str,
        refresh_cache: bool,
    ) -> Result<EvaluationResult> {
        let subscription_root = scope.subscription_root()?;

        if refresh_cache {
            self.refresh_caches().await;
        }

        // Step 1: classic administrator bypass
        self.privileged
            .ensure_populated(&subscription_root, || {
                self.provider
                    .fetch_subscription_root_role_assignments(&subscription_root)
            })
            .await?;

        let mut result = EvaluationResult::new(evaluation_id, principal, scope.to_string(), operations);

        if self.privileged.contains(&subscription_root, principal).await {
            info!("Principal {} holds the classic administrator bypass", principal);
            result.set_all(Verdict::Privileged);
            return Ok(result);
        }

        // Step 2: role assignment grants
        let assignments = self.provider.fetch_role_assignments(scope, principal).await?;
        debug!("Found {} role assignments", assignments.len());

        for assignment in &assignments {
            let role_definition_id = assignment.role_definition_id.as_str();
            let grants = self
                .role_definitions
                .get_or_fetch(role_definition_id, || {
                    self.provider.fetch_role_definition_grant_set(role_definition_id)
                })
                .await?;

            for entry in result.entries_mut() {
                if entry.verdict == Verdict::Granted {
                    continue;
                }
                if operation_granted(self.matcher.as_ref(), &grants, &entry.operation) {
                    debug!(
                        "{} granted by role '{}' at {}",
                        entry.operation.name, assignment.role_definition_name, assignment.scope
                    );
                    entry.verdict = Verdict::Granted;
                }
            }
        }

        // Step 3: deny assignments override any grant
        let denies = self.provider.fetch_deny_assignments(scope, principal).await?;
        debug!("Found {} deny assignments", denies.len());

        let mut overrides = 0;
        for deny in &denies {
            for entry in result.entries_mut() {
                if entry.verdict == Verdict::Denied {
                    continue;
                }
                if operation_granted(self.matcher.as_ref(), &deny.grants, &entry.operation) {
                    if entry.verdict == Verdict::Granted {
                        overrides += 1;
                    }
                    debug!(
                        "{} revoked by deny assignment '{}' at {}",
                        entry.operation.name, deny.name, deny.scope
                    );
                    entry.verdict = Verdict::Denied;
                }
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_deny_overrides(overrides).await;
        }

        Ok(result)
    }
}
