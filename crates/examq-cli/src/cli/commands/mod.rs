//! CLI command handlers, one file per command.

mod classify;
mod config;
mod simulate;

pub use classify::run_classify;
pub use config::run_config;
pub use simulate::run_simulate;
