pub mod config;
pub mod logging;

pub mod client;
pub mod retry;
pub mod scenario;
pub mod scheduler;
