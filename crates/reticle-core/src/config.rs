//! Network configuration
//!
//! Settings can be built in code, read from `RETICLE_*` environment variables,
//! or loaded from a YAML document. Missing keys fall back to [`NetworkConfig::default`].

use crate::error::{ReteError, ReteResult};
use serde::{Deserialize, Serialize};

/// Tunable behaviour of a [`crate::ReteNetwork`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Reject retraction of facts that are not in working memory
    pub strict_retraction: bool,
    /// Cycle limit applied by `run(None)`; `None` runs until quiescence
    pub max_run_cycles: Option<usize>,
    /// Emit a debug event for every new activation
    pub log_activations: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self { strict_retraction: true, max_run_cycles: None, log_activations: false }
    }
}

impl NetworkConfig {
    /// Create configuration from environment variables
    pub fn from_environment() -> Self {
        let defaults = Self::default();
        Self {
            strict_retraction: std::env::var("RETICLE_STRICT_RETRACTION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.strict_retraction),
            max_run_cycles: std::env::var("RETICLE_MAX_RUN_CYCLES")
                .ok()
                .and_then(|v| v.parse().ok())
                .or(defaults.max_run_cycles),
            log_activations: std::env::var("RETICLE_LOG_ACTIVATIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.log_activations),
        }
    }

    /// Parse configuration from a YAML document
    pub fn from_yaml_str(yaml: &str) -> ReteResult<Self> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|e| ReteError::Configuration {
            message: format!("failed to parse network configuration: {e}"),
            setting: None,
            actual: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the settings are usable
    pub fn validate(&self) -> ReteResult<()> {
        if self.max_run_cycles == Some(0) {
            return Err(ReteError::configuration(
                "max_run_cycles",
                "0",
                "max_run_cycles must be at least 1 when set",
            ));
        }
        Ok(())
    }

    /// Builder-style setter for `strict_retraction`
    pub fn with_strict_retraction(mut self, strict: bool) -> Self {
        self.strict_retraction = strict;
        self
    }

    /// Builder-style setter for `max_run_cycles`
    pub fn with_max_run_cycles(mut self, cycles: Option<usize>) -> Self {
        self.max_run_cycles = cycles;
        self
    }

    /// Builder-style setter for `log_activations`
    pub fn with_log_activations(mut self, enabled: bool) -> Self {
        self.log_activations = enabled;
        self
    }
}
