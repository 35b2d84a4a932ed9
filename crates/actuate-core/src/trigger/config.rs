//! Trigger configuration, loadable from YAML or JSON.
//!
//! ```yaml
//! parallel_limit: 4
//! streaming: false
//! show_progress: true
//! max_retries: 2
//! retry_delay_secs: 0.5
//! timeout_secs: 30
//! ```
//!
//! Every key is optional; missing keys take the defaults below.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TriggerError;
use crate::trigger::policy::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Maximum elements in flight at once (>= 1)
    #[serde(default = "default_parallel_limit")]
    pub parallel_limit: usize,

    /// Drive the leaf node's streaming entry point instead of the single-shot one
    #[serde(default)]
    pub streaming: bool,

    /// Log per-element progress
    #[serde(default = "default_show_progress")]
    pub show_progress: bool,

    /// Extra attempts after a failed one (non-streaming only)
    #[serde(default)]
    pub max_retries: u32,

    /// Pause between attempts, in seconds
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: f64,

    /// Per-attempt timeout in seconds
    #[serde(default)]
    pub timeout_secs: Option<f64>,
}

fn default_parallel_limit() -> usize {
    1
}

fn default_show_progress() -> bool {
    true
}

fn default_retry_delay() -> f64 {
    1.0
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            parallel_limit: default_parallel_limit(),
            streaming: false,
            show_progress: default_show_progress(),
            max_retries: 0,
            retry_delay_secs: default_retry_delay(),
            timeout_secs: None,
        }
    }
}

impl TriggerConfig {
    /// Parse a trigger configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, TriggerError> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|e| {
            TriggerError::Configuration(format!("Failed to parse trigger YAML: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a trigger configuration from a file path.
    pub fn from_file(path: &str) -> Result<Self, TriggerError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TriggerError::Configuration(format!("Failed to read trigger file '{}': {}", path, e))
        })?;
        Self::from_yaml(&content)
    }

    pub fn validate(&self) -> Result<(), TriggerError> {
        self.retry_policy().map(|_| ())
    }

    /// Retry/timeout snapshot for one trigger run.
    pub fn retry_policy(&self) -> Result<RetryPolicy, TriggerError> {
        if self.parallel_limit == 0 {
            return Err(TriggerError::Configuration(
                "parallel_limit must be at least 1".to_string(),
            ));
        }
        let retry_delay = Duration::try_from_secs_f64(self.retry_delay_secs).map_err(|_| {
            TriggerError::Configuration(format!(
                "retry_delay_secs must be a non-negative number, got {}",
                self.retry_delay_secs
            ))
        })?;
        let timeout = match self.timeout_secs {
            Some(secs) if secs > 0.0 => Some(Duration::try_from_secs_f64(secs).map_err(|_| {
                TriggerError::Configuration(format!("invalid timeout_secs: {}", secs))
            })?),
            Some(secs) => {
                return Err(TriggerError::Configuration(format!(
                    "timeout_secs must be positive, got {}",
                    secs
                )))
            }
            None => None,
        };
        Ok(RetryPolicy {
            max_retries: self.max_retries,
            retry_delay,
            timeout,
        })
    }
}
