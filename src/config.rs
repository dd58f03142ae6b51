use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::bench::config::{
    GatekeeperBenchConfig, HarnessLimits, HealthMonitorBenchConfig, LoadCheckConfig, SuiteConfig,
    LOAD_CHECK_USERS,
};

/// Latency and load harness for the gatekeeper and health-monitor services
#[derive(Parser, Debug)]
#[command(name = "stdio-bench", author, version, about, long_about = None)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format (pretty, json)
    #[arg(long, global = true, env = "LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Benchmark gatekeeper RTT and health-monitor liveness
    Bench(BenchArgs),

    /// Send one check per fresh user and expect every one to be allowed
    LoadCheck(LoadCheckArgs),
}

/// Limits shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct LimitArgs {
    /// Pause after the handshake before measured traffic (ms)
    #[arg(long)]
    pub warmup_ms: Option<u64>,

    /// Upper bound on each blocking read (ms)
    #[arg(long, env = "RESPONSE_TIMEOUT_MS", default_value = "5000")]
    pub response_timeout_ms: u64,
}

impl LimitArgs {
    fn into_limits(self, defaults: HarnessLimits) -> HarnessLimits {
        HarnessLimits {
            warmup_ms: self.warmup_ms.unwrap_or(defaults.warmup_ms),
            response_timeout_ms: self.response_timeout_ms,
            ..defaults
        }
    }
}

#[derive(Args, Debug)]
pub struct BenchArgs {
    /// Path to the gatekeeper binary
    #[arg(long, env = "GATEKEEPER_PATH", default_value = "../API-project/gatekeeper")]
    pub gatekeeper_path: PathBuf,

    /// Path to the health-monitor binary
    #[arg(
        long,
        env = "HEALTH_MONITOR_PATH",
        default_value = "../Health-Monitoring-Service/deepguard"
    )]
    pub monitor_path: PathBuf,

    /// Number of requests for the throughput test
    #[arg(long, default_value = "1000")]
    pub requests: usize,

    /// Number of unique users
    #[arg(long, default_value = "150")]
    pub users: usize,

    /// Key exported to the health monitor as MONITOR_KEY
    #[arg(long, env = "MONITOR_KEY", default_value = "BenchmarkKey", hide_env_values = true)]
    pub monitor_key: String,

    /// Alert log handed to the health monitor (deleted after the run)
    #[arg(long, default_value = "benchmark_alerts.log")]
    pub log_file: PathBuf,

    /// How long to observe the health monitor (ms)
    #[arg(long, default_value = "3000")]
    pub observe_ms: u64,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub limits: LimitArgs,
}

impl BenchArgs {
    pub fn into_suite_config(self) -> SuiteConfig {
        let gatekeeper_defaults = GatekeeperBenchConfig::default();
        let monitor_defaults = HealthMonitorBenchConfig::default();

        SuiteConfig {
            gatekeeper: GatekeeperBenchConfig {
                executable: self.gatekeeper_path,
                requests: self.requests,
                users: self.users,
                limits: self.limits.clone().into_limits(gatekeeper_defaults.limits.clone()),
                ..gatekeeper_defaults
            },
            health_monitor: HealthMonitorBenchConfig {
                executable: self.monitor_path,
                monitor_key: self.monitor_key,
                log_file: self.log_file,
                observe_ms: self.observe_ms,
                limits: self.limits.into_limits(monitor_defaults.limits.clone()),
                ..monitor_defaults
            },
        }
    }
}

#[derive(Args, Debug)]
pub struct LoadCheckArgs {
    /// Path to the gatekeeper binary
    #[arg(long, env = "GATEKEEPER_PATH", default_value = "../API-project/gatekeeper")]
    pub gatekeeper_path: PathBuf,

    /// Requests allowed per user per window
    #[arg(long, default_value = "100")]
    pub max_requests: u32,

    /// Rate-limit window in seconds
    #[arg(long, default_value = "60")]
    pub time_window: u32,

    /// Unrelated lines tolerated before a user's answer; past this the user
    /// and every later one count as dropped
    #[arg(long, default_value = "256")]
    pub max_skipped_lines: usize,

    #[command(flatten)]
    pub limits: LimitArgs,
}

impl LoadCheckArgs {
    pub fn into_config(self) -> LoadCheckConfig {
        let defaults = LoadCheckConfig::default();
        LoadCheckConfig {
            executable: self.gatekeeper_path,
            users: LOAD_CHECK_USERS,
            max_requests: self.max_requests,
            time_window_secs: self.time_window,
            limits: HarnessLimits {
                max_skipped_lines: self.max_skipped_lines,
                ..self.limits.into_limits(defaults.limits.clone())
            },
            ..defaults
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Cli {
    /// Parse arguments after loading `.env`, so ENV fallbacks see its values
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Ok(Cli::parse())
    }

    pub fn log_format(&self) -> LogFormat {
        parse_log_format(&self.log_format)
    }
}

/// Parse log format from string
fn parse_log_format(s: &str) -> LogFormat {
    match s.to_lowercase().as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Pretty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_format() {
        assert_eq!(parse_log_format("json"), LogFormat::Json);
        assert_eq!(parse_log_format("JSON"), LogFormat::Json);
        assert_eq!(parse_log_format("pretty"), LogFormat::Pretty);
        assert_eq!(parse_log_format("anything"), LogFormat::Pretty);
    }

    #[test]
    fn test_bench_args_into_suite_config() {
        let cli = Cli::try_parse_from([
            "stdio-bench",
            "bench",
            "--gatekeeper-path",
            "/opt/gatekeeper",
            "--monitor-path",
            "/opt/deepguard",
            "--monitor-key",
            "k",
            "--requests",
            "50",
            "--users",
            "7",
            "--response-timeout-ms",
            "250",
        ])
        .unwrap();

        let Commands::Bench(args) = cli.command else {
            panic!("expected bench subcommand");
        };
        let suite = args.into_suite_config();

        assert_eq!(suite.gatekeeper.executable, PathBuf::from("/opt/gatekeeper"));
        assert_eq!(suite.gatekeeper.requests, 50);
        assert_eq!(suite.gatekeeper.users, 7);
        assert_eq!(suite.gatekeeper.max_requests, 10_000);
        assert_eq!(suite.gatekeeper.limits.response_timeout_ms, 250);
        assert_eq!(suite.gatekeeper.limits.warmup_ms, 1000);
        assert_eq!(suite.health_monitor.limits.warmup_ms, 2000);
        assert_eq!(suite.health_monitor.monitor_key, "k");
    }

    #[test]
    fn test_warmup_override_applies_to_both_targets() {
        let cli = Cli::try_parse_from([
            "stdio-bench",
            "bench",
            "--monitor-key",
            "k",
            "--warmup-ms",
            "10",
        ])
        .unwrap();

        let Commands::Bench(args) = cli.command else {
            panic!("expected bench subcommand");
        };
        let suite = args.into_suite_config();
        assert_eq!(suite.gatekeeper.limits.warmup_ms, 10);
        assert_eq!(suite.health_monitor.limits.warmup_ms, 10);
    }

    #[test]
    fn test_load_check_args() {
        let cli = Cli::try_parse_from([
            "stdio-bench",
            "load-check",
            "--gatekeeper-path",
            "./gk",
            "--max-requests",
            "10",
        ])
        .unwrap();

        let Commands::LoadCheck(args) = cli.command else {
            panic!("expected load-check subcommand");
        };
        let config = args.into_config();
        assert_eq!(config.users, 100);
        assert_eq!(config.max_requests, 10);
        assert_eq!(config.time_window_secs, 60);
        assert_eq!(config.limits.max_skipped_lines, 256);
    }

    #[test]
    fn test_skip_bound_is_load_check_only() {
        let cli = Cli::try_parse_from([
            "stdio-bench",
            "load-check",
            "--max-skipped-lines",
            "1000",
        ])
        .unwrap();
        let Commands::LoadCheck(args) = cli.command else {
            panic!("expected load-check subcommand");
        };
        assert_eq!(args.into_config().limits.max_skipped_lines, 1000);

        let result = Cli::try_parse_from([
            "stdio-bench",
            "bench",
            "--monitor-key",
            "k",
            "--max-skipped-lines",
            "1000",
        ]);
        assert!(result.is_err());
    }
}
