use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Initial transient backoff in milliseconds; doubles after every wait.
    pub base_delay_ms: u64,
    /// Lower bound of the rate-limit wait in milliseconds.
    pub rate_limit_min_ms: u64,
    /// Upper bound of the rate-limit wait in milliseconds.
    pub rate_limit_max_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 2000,
            rate_limit_min_ms: 5000,
            rate_limit_max_ms: 8000,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries.saturating_add(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
            rate_limit_min: Duration::from_millis(self.rate_limit_min_ms),
            rate_limit_max: Duration::from_millis(self.rate_limit_max_ms),
        }
    }
}

/// Global configuration loaded from `~/.config/examq/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamqConfig {
    /// Maximum number of tasks calling the service at once.
    pub concurrency: usize,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for ExamqConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            retry: None,
        }
    }
}

impl ExamqConfig {
    /// Retry policy from the `[retry]` section, or the defaults.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.clone().unwrap_or_default().to_policy()
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        if let Some(retry) = &self.retry {
            if retry.rate_limit_min_ms > retry.rate_limit_max_ms {
                bail!(
                    "rate_limit_min_ms ({}) exceeds rate_limit_max_ms ({})",
                    retry.rate_limit_min_ms,
                    retry.rate_limit_max_ms
                );
            }
        }
        Ok(())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("examq")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load and validate configuration from an explicit path.
pub fn load_from_path(path: &Path) -> Result<ExamqConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let cfg: ExamqConfig =
        toml::from_str(&data).with_context(|| format!("parsing config {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<ExamqConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = ExamqConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    load_from_path(&path)
}
