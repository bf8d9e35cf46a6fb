//! `examq simulate` – replay a scripted scenario through the scheduler.

use anyhow::{bail, Result};
use examq_core::config::ExamqConfig;
use examq_core::scenario::{run_scenario, Scenario};
use examq_core::scheduler::Scheduler;
use std::path::Path;

pub async fn run_simulate(
    cfg: &ExamqConfig,
    path: &Path,
    concurrency: Option<usize>,
) -> Result<()> {
    let scenario = Scenario::load(path)?;
    let limit = concurrency
        .or(scenario.concurrency)
        .unwrap_or(cfg.concurrency);
    if limit == 0 {
        bail!("concurrency must be at least 1");
    }

    let scheduler = Scheduler::new(limit, cfg.retry_policy());
    tracing::info!(
        tasks = scenario.tasks.len(),
        limit = scheduler.limit(),
        max_attempts = scheduler.policy().max_attempts,
        "starting scenario {}",
        path.display()
    );
    let report = run_scenario(&scenario, &scheduler).await?;

    println!("Start order: {}", report.started.join(", "));
    println!("{:<24} {:<8} {:<9} {:<10} {}", "TASK", "RESULT", "ATTEMPTS", "AT(ms)", "DETAIL");
    for s in &report.settled {
        println!(
            "{:<24} {:<8} {:<9} {:<10} {}",
            s.name,
            if s.ok { "ok" } else { "failed" },
            s.attempts,
            s.at.as_millis(),
            s.detail
        );
    }

    let stats = scheduler.stats();
    println!(
        "{} succeeded, {} failed (limit {}, up to {} attempts each)",
        stats.succeeded,
        stats.failed,
        scheduler.limit(),
        scheduler.policy().max_attempts
    );
    Ok(())
}
