//! Configuration structs for benchmark runs.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{HarnessError, Result};

/// Number of distinct users exercised by the functional load check
pub const LOAD_CHECK_USERS: usize = 100;

/// Limits shared by every driver: warm-up, read timeout and skip window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessLimits {
    /// Pause after the handshake before measured traffic, in milliseconds
    pub warmup_ms: u64,
    /// Upper bound on a single blocking read, in milliseconds
    pub response_timeout_ms: u64,
    /// Non-matching lines the classifier will skip before giving up
    pub max_skipped_lines: usize,
}

impl Default for HarnessLimits {
    fn default() -> Self {
        Self {
            warmup_ms: 1000,
            response_timeout_ms: 5000,
            max_skipped_lines: 256,
        }
    }
}

impl HarnessLimits {
    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.response_timeout_ms == 0 {
            return Err(HarnessError::InvalidConfig(
                "response timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the gatekeeper RTT benchmark
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatekeeperBenchConfig {
    /// Path to the gatekeeper executable
    pub executable: PathBuf,
    /// Extra command-line arguments for the target
    pub args: Vec<String>,
    /// Total `check` commands to send
    pub requests: usize,
    /// Distinct users the requests are spread across
    pub users: usize,
    /// Handshake: requests allowed per user per window
    pub max_requests: u32,
    /// Handshake: window length in seconds
    pub time_window_secs: u32,
    pub limits: HarnessLimits,
}

impl Default for GatekeeperBenchConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("../API-project/gatekeeper"),
            args: Vec::new(),
            requests: 1000,
            users: 150,
            // High allowance so the run measures speed, not rejection
            max_requests: 10_000,
            time_window_secs: 60,
            limits: HarnessLimits::default(),
        }
    }
}

impl GatekeeperBenchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.requests == 0 {
            return Err(HarnessError::InvalidConfig(
                "request count must be at least 1".to_string(),
            ));
        }
        if self.users == 0 {
            return Err(HarnessError::InvalidConfig(
                "user count must be at least 1".to_string(),
            ));
        }
        self.limits.validate()
    }
}

/// Configuration for the health-monitor benchmark
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthMonitorBenchConfig {
    /// Path to the health-monitor executable
    pub executable: PathBuf,
    /// Extra command-line arguments for the target
    pub args: Vec<String>,
    /// Value exported as `MONITOR_KEY` at launch
    pub monitor_key: String,
    /// Alert log handed to the monitor; created before launch, deleted after
    pub log_file: PathBuf,
    /// Handshake: alert sensitivity threshold
    pub threshold: f64,
    /// Handshake: poll interval in seconds
    pub poll_interval_secs: u32,
    /// How long to watch the running monitor, in milliseconds
    pub observe_ms: u64,
    pub limits: HarnessLimits,
}

impl Default for HealthMonitorBenchConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("../Health-Monitoring-Service/deepguard"),
            args: Vec::new(),
            monitor_key: "BenchmarkKey".to_string(),
            log_file: PathBuf::from("benchmark_alerts.log"),
            threshold: 0.1,
            poll_interval_secs: 1,
            observe_ms: 3000,
            limits: HarnessLimits {
                warmup_ms: 2000,
                ..Default::default()
            },
        }
    }
}

impl HealthMonitorBenchConfig {
    pub fn observe(&self) -> Duration {
        Duration::from_millis(self.observe_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(HarnessError::InvalidConfig(
                "poll interval must be at least 1 second".to_string(),
            ));
        }
        self.limits.validate()
    }
}

/// Configuration for the 100-user functional load check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadCheckConfig {
    pub executable: PathBuf,
    pub args: Vec<String>,
    /// Distinct users, each sent exactly one `check`
    pub users: usize,
    pub max_requests: u32,
    pub time_window_secs: u32,
    pub limits: HarnessLimits,
}

impl Default for LoadCheckConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("../API-project/gatekeeper"),
            args: Vec::new(),
            users: LOAD_CHECK_USERS,
            max_requests: 100,
            time_window_secs: 60,
            limits: HarnessLimits::default(),
        }
    }
}

impl LoadCheckConfig {
    pub fn validate(&self) -> Result<()> {
        if self.users == 0 {
            return Err(HarnessError::InvalidConfig(
                "user count must be at least 1".to_string(),
            ));
        }
        self.limits.validate()
    }
}

/// Both per-target configs for one suite invocation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuiteConfig {
    pub gatekeeper: GatekeeperBenchConfig,
    pub health_monitor: HealthMonitorBenchConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_run() {
        let config = GatekeeperBenchConfig::default();
        assert_eq!(config.requests, 1000);
        assert_eq!(config.users, 150);
        assert_eq!(config.max_requests, 10_000);
        assert_eq!(config.limits.warmup(), Duration::from_secs(1));

        let monitor = HealthMonitorBenchConfig::default();
        assert_eq!(monitor.monitor_key, "BenchmarkKey");
        assert_eq!(monitor.limits.warmup(), Duration::from_secs(2));
        assert_eq!(monitor.observe(), Duration::from_secs(3));

        assert_eq!(LoadCheckConfig::default().users, LOAD_CHECK_USERS);
    }

    #[test]
    fn test_zero_users_rejected() {
        let config = GatekeeperBenchConfig {
            users: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(HarnessError::InvalidConfig(_))
        ));

        let config = LoadCheckConfig {
            users: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = GatekeeperBenchConfig {
            limits: HarnessLimits {
                response_timeout_ms: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
