//! Evaluator metrics collection

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Evaluator counters and latency summary
#[derive(Debug, Clone, Default)]
pub struct EvaluatorMetrics {
    /// Evaluations that produced a result
    pub evaluations: u64,

    /// Evaluations answered by the classic administrator bypass
    pub privileged_short_circuits: u64,

    /// Operations reported allowed / not allowed
    pub operations_allowed: u64,
    pub operations_denied: u64,

    /// Allowed operations revoked by a deny assignment
    pub deny_overrides: u64,

    /// Evaluations aborted by a provider error
    pub provider_errors: u64,

    /// Evaluations aborted by their deadline
    pub deadlines_exceeded: u64,

    pub latency_p50_ms: f64,
    pub latency_p99_ms: f64,
    pub avg_latency_ms: f64,
}

impl EvaluatorMetrics {
    /// Share of evaluations answered by the bypass
    pub fn short_circuit_rate(&self) -> f64 {
        if self.evaluations == 0 {
            0.0
        } else {
            self.privileged_short_circuits as f64 / self.evaluations as f64
        }
    }
}

/// Metrics collector
///
/// Recording a latency only appends to the sample window; percentiles are
/// computed when a snapshot is taken.
pub struct MetricsCollector {
    metrics: Arc<RwLock<EvaluatorMetrics>>,

    /// Recent latency samples (ms) for percentile calculation
    latency_samples: Arc<RwLock<VecDeque<f64>>>,

    max_samples: usize,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(RwLock::new(EvaluatorMetrics::default())),
            latency_samples: Arc::new(RwLock::new(VecDeque::with_capacity(1_024))),
            max_samples: 10_000,
        }
    }

    /// Record a completed evaluation
    pub async fn record_evaluation(&self, allowed: usize, denied: usize, privileged: bool) {
        let mut metrics = self.metrics.write().await;
        metrics.evaluations += 1;
        metrics.operations_allowed += allowed as u64;
        metrics.operations_denied += denied as u64;
        if privileged {
            metrics.privileged_short_circuits += 1;
        }
    }

    pub async fn record_deny_overrides(&self, count: usize) {
        if count == 0 {
            return;
        }
        self.metrics.write().await.deny_overrides += count as u64;
    }

    pub async fn record_provider_error(&self) {
        self.metrics.write().await.provider_errors += 1;
    }

    pub async fn record_deadline_exceeded(&self) {
        self.metrics.write().await.deadlines_exceeded += 1;
    }

    /// Record evaluation latency
    pub async fn record_latency(&self, latency: Duration) {
        let mut samples = self.latency_samples.write().await;
        if samples.len() == self.max_samples {
            samples.pop_front();
        }
        samples.push_back(latency.as_secs_f64() * 1000.0);
    }

    /// Get current metrics snapshot
    pub async fn get_metrics(&self) -> EvaluatorMetrics {
        let mut sorted: Vec<f64> = self.latency_samples.read().await.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let mut snapshot = self.metrics.read().await.clone();
        if !sorted.is_empty() {
            snapshot.avg_latency_ms = sorted.iter().sum::<f64>() / sorted.len() as f64;
            snapshot.latency_p50_ms = Self::percentile(&sorted, 0.50);
            snapshot.latency_p99_ms = Self::percentile(&sorted, 0.99);
        }
        snapshot
    }

    /// Reset all metrics
    pub async fn reset(&self) {
        *self.metrics.write().await = EvaluatorMetrics::default();
        self.latency_samples.write().await.clear();
    }

    /// Export metrics in Prometheus text format
    pub async fn export_prometheus(&self) -> String {
        let metrics = self.get_metrics().await;

        format!(
            r#"# HELP azperm_evaluations_total Completed permission evaluations
# TYPE azperm_evaluations_total counter
azperm_evaluations_total {}

# HELP azperm_privileged_short_circuits_total Evaluations answered by the classic administrator bypass
# TYPE azperm_privileged_short_circuits_total counter
azperm_privileged_short_circuits_total {}

# HELP azperm_operations_total Evaluated operations by outcome
# TYPE azperm_operations_total counter
azperm_operations_total{{outcome="allowed"}} {}
azperm_operations_total{{outcome="denied"}} {}

# HELP azperm_deny_overrides_total Allowed operations revoked by deny assignments
# TYPE azperm_deny_overrides_total counter
azperm_deny_overrides_total {}

# HELP azperm_errors_total Aborted evaluations by cause
# TYPE azperm_errors_total counter
azperm_errors_total{{cause="provider"}} {}
azperm_errors_total{{cause="deadline"}} {}

# HELP azperm_latency_seconds Evaluation latency percentiles
# TYPE azperm_latency_seconds summary
azperm_latency_seconds{{quantile="0.5"}} {}
azperm_latency_seconds{{quantile="0.99"}} {}
"#,
            metrics.evaluations,
            metrics.privileged_short_circuits,
            metrics.operations_allowed,
            metrics.operations_denied,
            metrics.deny_overrides,
            metrics.provider_errors,
            metrics.deadlines_exceeded,
            metrics.latency_p50_ms / 1000.0,
            metrics.latency_p99_ms / 1000.0,
        )
    }

    fn percentile(sorted: &[f64], p: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }

        let idx = ((sorted.len() as f64) * p) as usize;
        sorted[idx.min(sorted.len() - 1)]
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
