//! Benchmark runner: drives each target through handshake, traffic and teardown.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::classify::{OutcomeTally, ResponseClassifier};
use super::config::{GatekeeperBenchConfig, HealthMonitorBenchConfig, SuiteConfig};
use super::metrics::MetricsCollector;
use super::process::{TargetProcess, TargetSpec};
use super::protocol::ConfigHandshake;
use super::pump::{check_command, send_and_time, user_for_request, user_id};
use super::report::{BenchmarkReport, SuiteReport, TargetFailure};
use crate::error::{HarnessError, Result};

pub const GATEKEEPER: &str = "Gatekeeper";
pub const HEALTH_MONITOR: &str = "Health Monitor";

/// Runs the gatekeeper and health-monitor benchmarks, isolating failures per target
pub struct BenchmarkRunner {
    config: SuiteConfig,
}

impl BenchmarkRunner {
    pub fn new(config: SuiteConfig) -> Self {
        Self { config }
    }

    /// Run both benchmarks. A failing target is recorded and does not stop the other.
    pub async fn run(&self) -> SuiteReport {
        let mut report = SuiteReport::new();

        let result = run_gatekeeper_benchmark(&self.config.gatekeeper).await;
        record(&mut report, GATEKEEPER, result);

        let result = run_health_monitor_benchmark(&self.config.health_monitor).await;
        record(&mut report, HEALTH_MONITOR, result);

        report
    }
}

fn record(report: &mut SuiteReport, component: &str, result: Result<BenchmarkReport>) {
    match result {
        Ok(component_report) => report.components.push(component_report),
        Err(e) => {
            tracing::error!("{} benchmark failed: {}", component, e);
            report.failures.push(TargetFailure::new(component, &e));
        }
    }
}

/// Sequential RTT benchmark against the gatekeeper
pub async fn run_gatekeeper_benchmark(config: &GatekeeperBenchConfig) -> Result<BenchmarkReport> {
    config.validate()?;
    tracing::info!(
        "Gatekeeper benchmark: {} requests across {} users",
        config.requests,
        config.users
    );

    let spec = TargetSpec::new(GATEKEEPER, &config.executable).args(&config.args);
    let mut target = TargetProcess::start(&spec).await?;
    let result = drive_gatekeeper(&mut target, config).await;
    target.terminate().await;
    result
}

async fn drive_gatekeeper(
    target: &mut TargetProcess,
    config: &GatekeeperBenchConfig,
) -> Result<BenchmarkReport> {
    ConfigHandshake::gatekeeper(config.max_requests, config.time_window_secs)
        .send(target, config.limits.warmup())
        .await?;

    let classifier = ResponseClassifier::new(config.limits.max_skipped_lines);
    let timeout = config.limits.response_timeout();
    let mut metrics = MetricsCollector::new();
    let mut tally = OutcomeTally::default();

    metrics.start();
    for i in 0..config.requests {
        let command = check_command(&user_id(user_for_request(i, config.users)));
        match send_and_time(target, &command, timeout).await {
            Ok(sample) => {
                tally.record(classifier.classify(&sample.response));
                metrics.record_sample(&sample);
            }
            Err(HarnessError::StreamClosed) => {
                // Every later read would hit the same closed stream
                metrics.record_drop();
                tracing::warn!(
                    "{} closed its output after {} of {} requests",
                    target.name(),
                    i,
                    config.requests
                );
                break;
            }
            Err(e) => return Err(e),
        }
    }
    metrics.stop();

    let snapshot = metrics.snapshot();
    tracing::info!(
        "  RPS: {:.1}, avg: {:.3}ms, p95: {:.3}ms, completed: {}/{}",
        snapshot.latency.throughput,
        snapshot.latency.mean_ms,
        snapshot.latency.p95_ms,
        snapshot.completed,
        config.requests
    );

    Ok(BenchmarkReport::from_latency(
        GATEKEEPER,
        &snapshot,
        &tally,
        config.requests,
    ))
}

/// Alert log handed to the monitor; removed when dropped
struct AlertLog {
    path: PathBuf,
}

impl AlertLog {
    /// Create or truncate the file and resolve it to an absolute path
    fn create(path: &Path) -> Result<Self> {
        std::fs::File::create(path)?;
        let path = std::fs::canonicalize(path)?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for AlertLog {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::debug!("Could not remove {}: {}", self.path.display(), e);
        }
    }
}

/// Launch the health monitor, watch it for a fixed window, and report liveness
pub async fn run_health_monitor_benchmark(
    config: &HealthMonitorBenchConfig,
) -> Result<BenchmarkReport> {
    config.validate()?;
    tracing::info!("Health monitor benchmark");

    let alert_log = AlertLog::create(&config.log_file)?;
    let spec = TargetSpec::new(HEALTH_MONITOR, &config.executable)
        .args(&config.args)
        .env("MONITOR_KEY", &config.monitor_key);

    let launched = Instant::now();
    let mut target = TargetProcess::start(&spec).await?;
    let result = drive_health_monitor(&mut target, config, alert_log.path(), launched).await;
    target.terminate().await;
    result
}

async fn drive_health_monitor(
    target: &mut TargetProcess,
    config: &HealthMonitorBenchConfig,
    log_file: &Path,
    launched: Instant,
) -> Result<BenchmarkReport> {
    ConfigHandshake::health_monitor(config.threshold, log_file, config.poll_interval_secs)
        .send(target, Duration::ZERO)
        .await?;
    let handshake_time = launched.elapsed();

    // Warm-up and observation both drain stdout so the monitor never blocks on it
    let window = config.limits.warmup() + config.observe();
    let deadline = Instant::now() + window;
    let mut output_lines = 0u64;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match target.read_line(remaining).await {
            Ok(Some(line)) => {
                output_lines += 1;
                tracing::debug!("{}: {}", target.name(), line);
            }
            Ok(None) => {
                tracing::warn!("{} closed its output", target.name());
                tokio::time::sleep(remaining).await;
                break;
            }
            Err(HarnessError::ResponseTimeout { .. }) => break,
            Err(e) => return Err(e),
        }
    }

    let status = match target.exit_status() {
        None => "Operational".to_string(),
        Some(status) => format!("Exited ({})", status),
    };
    tracing::info!("{} status after {:.1}s: {}", target.name(), window.as_secs_f64(), status);

    Ok(BenchmarkReport::new(HEALTH_MONITOR)
        .with_metric("Status", status)
        .with_metric(
            "Handshake Time (ms)",
            format!("{:.3}", handshake_time.as_secs_f64() * 1000.0),
        )
        .with_metric("Output Lines", output_lines)
        .with_metric("Observed (s)", format!("{:.2}", window.as_secs_f64())))
}
