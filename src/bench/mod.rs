//! Benchmark harness for line-oriented stdio services.
//!
//! This module provides tools for measuring target performance including:
//! - Process control with guaranteed termination
//! - Startup handshake and the sequential request pump
//! - Outcome classification with a bounded skip window
//! - RTT aggregation (mean, p95, throughput) and report generation
//! - The 100-user functional load check

pub mod classify;
pub mod config;
pub mod load_check;
pub mod metrics;
pub mod process;
pub mod protocol;
pub mod pump;
pub mod report;
pub mod runner;

pub use classify::{Classification, Outcome, OutcomeTally, ResponseClassifier};
pub use config::{
    GatekeeperBenchConfig, HarnessLimits, HealthMonitorBenchConfig, LoadCheckConfig, SuiteConfig,
};
pub use load_check::{run_load_check, LoadCheckResult};
pub use metrics::{LatencyStats, MetricsCollector, MetricsSnapshot};
pub use process::{TargetProcess, TargetSpec};
pub use protocol::ConfigHandshake;
pub use pump::{send_and_time, RequestSample};
pub use report::{BenchmarkReport, SuiteReport, TargetFailure};
pub use runner::BenchmarkRunner;
