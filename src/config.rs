use crate::agent::oracle::RetryPolicy;
use crate::error::Error;
use crate::market::geometry::PositionMatcher;
use crate::market::types::{AwardPolicy, DynamicAllocation, RoundSetting, WinnerDetermination};
use anyhow::{Context, Result, bail};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;
use std::time::Duration;
use tracing::error;

/// Settings shared by sellers and buyers of one market run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub winner_determination: WinnerDetermination,
    pub dynamic_allocation: DynamicAllocation,
    pub award_policy: AwardPolicy,
    /// Tasks released per reallocation round (SSI slice size).
    pub tasks_per_round: usize,
    pub response_timeout_ms: u64,
    /// Trigger ticks an auction may stay open before a new one can start.
    pub max_wait_cycles: u32,
    pub trigger_period_ms: u64,
    /// Consecutive auctions without awards before a round gives up.
    pub max_stalled_auctions: u32,
    pub clear_timeout_ms: u64,
    /// Positional tolerance in metres.
    pub close_enough: f64,
    pub bundle_size: usize,
    pub max_bundles: usize,
    pub oracle_timeout_ms: u64,
    pub oracle_max_retries: u32,
    pub oracle_backoff_ms: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            winner_determination: WinnerDetermination::MinCost,
            dynamic_allocation: DynamicAllocation::Ssi,
            award_policy: AwardPolicy::PerTask,
            tasks_per_round: 4,
            response_timeout_ms: 2000,
            max_wait_cycles: 3,
            trigger_period_ms: 500,
            max_stalled_auctions: 3,
            clear_timeout_ms: 2000,
            close_enough: 0.01,
            bundle_size: 1,
            max_bundles: 15,
            oracle_timeout_ms: 1000,
            oracle_max_retries: 2,
            oracle_backoff_ms: 100,
        }
    }
}

impl MarketConfig {
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.tasks_per_round == 0 {
            return Err(Error::Configuration("tasks_per_round must be at least 1".into()));
        }
        if self.bundle_size == 0 {
            return Err(Error::Configuration("bundle_size must be at least 1".into()));
        }
        if self.max_bundles == 0 {
            return Err(Error::Configuration("max_bundles must be at least 1".into()));
        }
        if self.max_stalled_auctions == 0 {
            return Err(Error::Configuration("max_stalled_auctions must be at least 1".into()));
        }
        PositionMatcher::new(self.close_enough)?;
        Ok(())
    }

    pub fn setting(&self) -> RoundSetting {
        RoundSetting {
            winner_determination: self.winner_determination,
            dynamic_allocation: self.dynamic_allocation,
        }
    }

    pub fn matcher(&self) -> crate::error::Result<PositionMatcher> {
        PositionMatcher::new(self.close_enough)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn trigger_period(&self) -> Duration {
        Duration::from_millis(self.trigger_period_ms.max(1))
    }

    pub fn clear_timeout(&self) -> Duration {
        Duration::from_millis(self.clear_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_millis(self.oracle_timeout_ms),
            max_retries: self.oracle_max_retries,
            backoff: Duration::from_millis(self.oracle_backoff_ms),
        }
    }
}

/// Evaluates a pkl module with the `pkl` CLI and returns its JSON rendering.
fn eval_pkl(config_path: &Path) -> Result<String> {
    let output = Command::new("pkl")
        .args(["eval", "-f", "json"])
        .arg(config_path)
        .output()
        .with_context(|| format!("Failed to run pkl on {}", config_path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!("pkl eval of {} failed: {}", config_path.display(), stderr.trim());
        bail!("pkl eval of {} failed: {}", config_path.display(), stderr.trim());
    }
    String::from_utf8(output.stdout).context("pkl printed non-UTF-8 output")
}

pub fn load_pkl<T: DeserializeOwned>(config_path: impl AsRef<Path>) -> Result<T> {
    let config_path = config_path.as_ref();
    let json = eval_pkl(config_path)?;
    serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse pkl output of {}", config_path.display()))
}

pub fn load_json<T: DeserializeOwned>(config_path: impl AsRef<Path>) -> Result<T> {
    let config_path = config_path.as_ref();
    let text = std::fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read {}", config_path.display()))?;
    serde_json::from_str(&text).context("Failed to parse config json")
}

/// Loads and validates a market configuration from `.json` or `.pkl`.
pub fn load_config(config_path: impl AsRef<Path>) -> Result<MarketConfig> {
    let config_path = config_path.as_ref();
    let config: MarketConfig = match config_path.extension().and_then(|e| e.to_str()) {
        Some("pkl") => load_pkl(config_path)?,
        _ => load_json(config_path)?,
    };
    config
        .validate()
        .with_context(|| format!("Invalid market configuration in {}", config_path.display()))?;
    Ok(config)
}
