//! Concrete job executors for the wosrewards worker.
//!
//! This crate provides implementations of the
//! [`JobExecutor`](wosrewards_job_queue::JobExecutor) trait. The worker runs
//! exactly one of them, chosen from configuration by [`executor_from_config`].
//!
//! # Usage
//!
//! ```rust,no_run
//! use wosrewards_config::Config;
//! use wosrewards_jobs::executor_from_config;
//!
//! let config = Config::default();
//! let executor = executor_from_config(&config.executor);
//! println!("using executor {}", executor.name());
//! ```

mod command;
mod error;
mod report;

use std::sync::Arc;

pub use command::CommandExecutor;
pub use error::JobError;
pub use report::{ExecutorReport, ReportStatus};

use wosrewards_config::ExecutorConfig;
use wosrewards_job_queue::{JobExecutor, NoOpExecutor};

/// Builds the executor named by the configuration.
///
/// Without a command configured the worker still runs, using the no-op
/// executor that only writes an empty status sheet.
pub fn executor_from_config(config: &ExecutorConfig) -> Arc<dyn JobExecutor> {
    match config
        .command
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
    {
        Some(command) => Arc::new(CommandExecutor::new(command, config.args.clone())),
        None => {
            tracing::warn!("no executor command configured; jobs will only produce an empty status sheet");
            Arc::new(NoOpExecutor)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_selects_command_executor() {
        let config = ExecutorConfig {
            command: Some("python3".into()),
            args: vec!["automation.py".into()],
        };
        assert_eq!(executor_from_config(&config).name(), CommandExecutor::NAME);
    }

    #[test]
    fn blank_command_falls_back_to_noop() {
        let config = ExecutorConfig {
            command: Some("  ".into()),
            args: Vec::new(),
        };
        assert_eq!(executor_from_config(&config).name(), NoOpExecutor::NAME);
    }
}
