//! Report generation for benchmark results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::classify::OutcomeTally;
use super::metrics::MetricsSnapshot;
use crate::error::HarnessError;

/// A single named, already formatted value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: String,
}

/// Metric name to formatted value, in insertion order, for one target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub component: String,
    pub metrics: Vec<Metric>,
}

impl BenchmarkReport {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            metrics: Vec::new(),
        }
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.metrics.push(Metric {
            name: name.into(),
            value: value.to_string(),
        });
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.metrics
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.value.as_str())
    }

    /// Gatekeeper RTT report from a finished batch
    pub fn from_latency(
        component: impl Into<String>,
        snapshot: &MetricsSnapshot,
        tally: &OutcomeTally,
        requested: usize,
    ) -> Self {
        let stats = &snapshot.latency;
        let dropped = (requested as u64).saturating_sub(snapshot.completed);

        Self::new(component)
            .with_metric("Total Time (s)", format!("{:.2}", stats.total_secs))
            .with_metric("Throughput (req/s)", format!("{:.2}", stats.throughput))
            .with_metric("Avg Latency (ms)", format!("{:.3}", stats.mean_ms))
            .with_metric("P95 Latency (ms)", format!("{:.3}", stats.p95_ms))
            .with_metric("Min Latency (ms)", format!("{:.3}", stats.min_ms))
            .with_metric("Max Latency (ms)", format!("{:.3}", stats.max_ms))
            .with_metric("Completed", snapshot.completed)
            .with_metric("Dropped", dropped)
            .with_metric("Allowed", tally.allowed)
            .with_metric("Denied", tally.denied)
            .with_metric("Unrecognized", tally.unrecognized)
    }
}

/// A target whose benchmark could not complete
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetFailure {
    pub component: String,
    pub kind: String,
    pub message: String,
}

impl TargetFailure {
    pub fn new(component: impl Into<String>, error: &HarnessError) -> Self {
        Self {
            component: component.into(),
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}

/// Everything one suite invocation produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub components: Vec<BenchmarkReport>,
    pub failures: Vec<TargetFailure>,
}

impl Default for SuiteReport {
    fn default() -> Self {
        Self::new()
    }
}

impl SuiteReport {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            components: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn component(&self, name: &str) -> Option<&BenchmarkReport> {
        self.components.iter().find(|c| c.component == name)
    }

    pub fn failure(&self, name: &str) -> Option<&TargetFailure> {
        self.failures.iter().find(|f| f.component == name)
    }

    /// Render as a markdown table
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("### Benchmark Results\n");
        out.push_str("| Component | Metric | Value |\n");
        out.push_str("|---|---|---|\n");
        for report in &self.components {
            for metric in &report.metrics {
                out.push_str(&format!(
                    "| {} | {} | {} |\n",
                    report.component, metric.name, metric.value
                ));
            }
        }

        if !self.failures.is_empty() {
            out.push_str("\n### Failures\n");
            for failure in &self.failures {
                out.push_str(&format!(
                    "- {} ({}): {}\n",
                    failure.component, failure.kind, failure.message
                ));
            }
        }
        out
    }

    pub fn print_table(&self) {
        println!();
        println!("{}", self.to_markdown());
    }

    /// Export the report as JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::metrics::LatencyStats;

    fn snapshot() -> MetricsSnapshot {
        MetricsSnapshot {
            completed: 998,
            dropped: 2,
            latency: LatencyStats {
                samples: 998,
                mean_ms: 0.04213,
                p95_ms: 0.0871,
                min_ms: 0.02,
                max_ms: 1.5,
                throughput: 21034.567,
                total_secs: 0.04754,
            },
        }
    }

    #[test]
    fn test_latency_report_formatting() {
        let tally = OutcomeTally {
            allowed: 998,
            denied: 0,
            unrecognized: 0,
        };
        let report = BenchmarkReport::from_latency("Gatekeeper", &snapshot(), &tally, 1000);

        assert_eq!(report.get("Total Time (s)"), Some("0.05"));
        assert_eq!(report.get("Throughput (req/s)"), Some("21034.57"));
        assert_eq!(report.get("Avg Latency (ms)"), Some("0.042"));
        assert_eq!(report.get("P95 Latency (ms)"), Some("0.087"));
        assert_eq!(report.get("Dropped"), Some("2"));
        assert_eq!(report.get("Allowed"), Some("998"));
        assert_eq!(report.metrics[0].name, "Total Time (s)");
    }

    #[test]
    fn test_markdown_table() {
        let mut suite = SuiteReport::new();
        suite.components.push(
            BenchmarkReport::new("DeepGuard")
                .with_metric("Status", "Operational")
                .with_metric("Output Lines", 4),
        );
        suite.failures.push(TargetFailure::new(
            "Gatekeeper",
            &HarnessError::launch("./gatekeeper", "executable not found"),
        ));

        let table = suite.to_markdown();
        assert!(table.contains("| Component | Metric | Value |"));
        assert!(table.contains("| DeepGuard | Status | Operational |"));
        assert!(table.contains("| DeepGuard | Output Lines | 4 |"));
        assert!(table.contains("- Gatekeeper (launch_error): Failed to launch ./gatekeeper"));
    }

    #[test]
    fn test_json_export() {
        let mut suite = SuiteReport::new();
        suite
            .components
            .push(BenchmarkReport::new("Gatekeeper").with_metric("Completed", 10));

        let json: serde_json::Value = serde_json::from_str(&suite.to_json()).unwrap();
        assert_eq!(json["components"][0]["component"], "Gatekeeper");
        assert_eq!(json["components"][0]["metrics"][0]["value"], "10");
        assert!(json["run_id"].is_string());
        assert!(suite.component("Gatekeeper").is_some());
        assert!(suite.failure("Gatekeeper").is_none());
    }
}
