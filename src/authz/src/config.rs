//! Evaluator configuration loading and validation

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::cache::DEFAULT_PRIVILEGED_ROLES;
use crate::error::{AuthzError, Result};

/// Permission evaluator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    /// Upper bound on a whole evaluation, provider calls included
    #[serde(default)]
    pub deadline_ms: Option<u64>,

    /// Role names marking a classic administrator
    #[serde(default = "default_privileged_roles")]
    pub privileged_role_names: Vec<String>,

    /// Enable metrics collection
    #[serde(default = "default_true")]
    pub enable_metrics: bool,
}

fn default_privileged_roles() -> Vec<String> {
    DEFAULT_PRIVILEGED_ROLES.iter().map(|s| s.to_string()).collect()
}

fn default_true() -> bool {
    true
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            deadline_ms: None,
            privileged_role_names: default_privileged_roles(),
            enable_metrics: true,
        }
    }
}

impl EvaluatorConfig {
    /// Reads overrides from the environment
    ///
    /// - `AZPERM_DEADLINE_MS` - evaluation deadline in milliseconds
    /// - `AZPERM_PRIVILEGED_ROLES` - comma-separated classic administrator role names
    /// - `AZPERM_ENABLE_METRICS` - `true` / `false`
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("AZPERM_DEADLINE_MS") {
            let ms = raw
                .parse()
                .map_err(|_| AuthzError::Config(format!("AZPERM_DEADLINE_MS is not a number: {}", raw)))?;
            config.deadline_ms = Some(ms);
        }

        if let Ok(raw) = std::env::var("AZPERM_PRIVILEGED_ROLES") {
            config.privileged_role_names = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Ok(raw) = std::env::var("AZPERM_ENABLE_METRICS") {
            config.enable_metrics = raw
                .parse()
                .map_err(|_| AuthzError::Config(format!("AZPERM_ENABLE_METRICS is not a bool: {}", raw)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents).map_err(|e| AuthzError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates configuration values
    pub fn validate(&self) -> Result<()> {
        if self.deadline_ms == Some(0) {
            return Err(AuthzError::Config("deadline_ms must be greater than zero".to_string()));
        }

        if self.privileged_role_names.iter().any(|r| r.trim().is_empty() || r.contains(';')) {
            return Err(AuthzError::Config(
                "privileged_role_names entries must be non-empty single role names".to_string(),
            ));
        }

        Ok(())
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }

    /// Sets the deadline, rounded up to whole milliseconds (at least 1 ms)
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        let ms = deadline.as_nanos().div_ceil(1_000_000).max(1);
        self.deadline_ms = Some(u64::try_from(ms).unwrap_or(u64::MAX));
        self
    }
}
