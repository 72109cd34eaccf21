//! Health-loop configuration loaded from `.drover/config.toml`.
//!
//! All fields are optional; the loop runs with defaults if the file is
//! missing:
//!
//! ```toml
//! # Seconds between health-loop ticks (default: 60).
//! check_interval_secs = 60
//!
//! # Seconds of activity-file silence before a worker or the controller
//! # counts as stale (default: 600).
//! staleness_threshold_secs = 600
//!
//! # Minimum seconds between controller restarts (default: 60).
//! restart_cooldown_secs = 60
//! ```

use color_eyre::eyre::{Result, WrapErr};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Health & restart loop configuration. Passed explicitly into each call —
/// there are no process-wide defaults hiding behind it.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthConfig {
    /// Seconds between health-loop ticks.
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    /// Seconds of inactivity before a session counts as stale.
    #[serde(default = "default_staleness_threshold")]
    pub staleness_threshold_secs: u64,

    /// Minimum seconds between controller restarts.
    #[serde(default = "default_restart_cooldown")]
    pub restart_cooldown_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval(),
            staleness_threshold_secs: default_staleness_threshold(),
            restart_cooldown_secs: default_restart_cooldown(),
        }
    }
}

impl HealthConfig {
    /// Load from `{root}/.drover/config.toml`, falling back to defaults
    /// when the file does not exist.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(".drover").join("config.toml");
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path)
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&contents).wrap_err_with(|| format!("failed to parse {}", path.display()))
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn staleness_threshold(&self) -> Duration {
        Duration::from_secs(self.staleness_threshold_secs)
    }

    pub fn restart_cooldown(&self) -> Duration {
        Duration::from_secs(self.restart_cooldown_secs)
    }
}

fn default_check_interval() -> u64 {
    60
}

fn default_staleness_threshold() -> u64 {
    600
}

fn default_restart_cooldown() -> u64 {
    60
}
