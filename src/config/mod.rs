pub mod loader;

use std::path::PathBuf;
use std::time::Duration;

use duration_str::deserialize_duration;
use serde::Deserialize;

use crate::supervisor::failure::{
    FailureTracker, BACKOFF_WAIT, MAX_FAIL_COUNT, MIN_FAIL_INTERVAL,
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Everything one supervisor instance needs, read once at startup.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SupervisorConfig {
    /// Backend endpoint whose reachability gates whether the worker may run.
    pub backend_endpoint: String,

    /// Identifies the worker channel in logs and state reports.
    pub channel_name: String,

    /// Local port the worker binds to.
    pub channel_port: u16,

    /// Program spawned as the worker process.
    pub worker_program_path: PathBuf,

    #[serde(
        default = "default_poll_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub poll_interval: Duration,

    #[serde(default)]
    pub restart: RestartConfig,
}

/// Overrides for the failure-gating defaults.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RestartConfig {
    #[serde(deserialize_with = "deserialize_duration")]
    pub min_fail_interval: Duration,

    pub max_fail_count: u32,

    #[serde(deserialize_with = "deserialize_duration")]
    pub backoff: Duration,
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            min_fail_interval: MIN_FAIL_INTERVAL,
            max_fail_count: MAX_FAIL_COUNT,
            backoff: BACKOFF_WAIT,
        }
    }
}

impl From<&RestartConfig> for FailureTracker {
    fn from(config: &RestartConfig) -> Self {
        FailureTracker::new()
            .with_min_fail_interval(config.min_fail_interval)
            .with_max_fail_count(config.max_fail_count)
            .with_backoff_wait(config.backoff)
    }
}

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restart_defaults_match_the_failure_policy() {
        let restart = RestartConfig::default();

        assert_eq!(MIN_FAIL_INTERVAL, restart.min_fail_interval);
        assert_eq!(MAX_FAIL_COUNT, restart.max_fail_count);
        assert_eq!(BACKOFF_WAIT, restart.backoff);
    }
}
