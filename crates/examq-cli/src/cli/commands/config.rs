//! `examq config` – print the effective configuration.

use anyhow::Result;
use examq_core::config::{self, ExamqConfig};
use std::path::Path;

pub fn run_config(cfg: &ExamqConfig, explicit: Option<&Path>) -> Result<()> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => config::config_path()?,
    };
    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(cfg)?);

    let policy = cfg.retry_policy();
    println!();
    println!("# effective retry policy");
    println!("#   attempts: {}", policy.max_attempts);
    println!("#   transient base delay: {} ms", policy.base_delay.as_millis());
    println!(
        "#   rate-limit wait: {}-{} ms",
        policy.rate_limit_min.as_millis(),
        policy.rate_limit_max.as_millis()
    );
    Ok(())
}
