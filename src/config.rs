//! Orchestrator configuration

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};

/// Tuning knobs for the controller, tracker and executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Interval between collaboration controller ticks
    pub tick_interval_ms: u64,
    /// Number of recent events used to compute the success rate
    pub success_window: usize,
    /// Success rate below which the controller falls back to autonomous mode
    pub success_threshold: f32,
    /// System load above which the controller falls back to autonomous mode
    pub high_load_threshold: f32,
    /// System load below which the controller promotes to unified mode
    pub low_load_threshold: f32,
    /// Maximum number of collaboration events retained
    pub history_capacity: usize,
    /// Age after which an in-flight request record is swept
    pub stale_after_secs: u64,
    /// Confidence of the "processing started" placeholder
    pub placeholder_confidence: f32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 10_000,
            success_window: 10,
            success_threshold: 0.7,
            high_load_threshold: 0.8,
            low_load_threshold: 0.6,
            history_capacity: 1000,
            stale_after_secs: 300,
            placeholder_confidence: 0.1,
        }
    }
}

impl OrchestratorConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        let unit = |name: &str, v: f32| {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(OrchestratorError::Config(format!("{name} must be within [0, 1], got {v}")))
            }
        };
        unit("success_threshold", self.success_threshold)?;
        unit("high_load_threshold", self.high_load_threshold)?;
        unit("low_load_threshold", self.low_load_threshold)?;
        unit("placeholder_confidence", self.placeholder_confidence)?;

        if self.low_load_threshold >= self.high_load_threshold {
            return Err(OrchestratorError::Config(
                "low_load_threshold must be below high_load_threshold".into(),
            ));
        }
        if self.success_window == 0 {
            return Err(OrchestratorError::Config("success_window must be non-zero".into()));
        }
        if self.history_capacity < self.success_window {
            return Err(OrchestratorError::Config(
                "history_capacity must hold at least one success window".into(),
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err(OrchestratorError::Config("tick_interval_ms must be non-zero".into()));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn stale_after(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.stale_after_secs as i64)
    }
}
