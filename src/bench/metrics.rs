//! Latency aggregation: mean, p95, throughput and wall-clock batch time.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::pump::RequestSample;

/// Below this many samples p95 falls back to the mean
pub const MIN_SAMPLES_FOR_P95: usize = 20;

/// Cut points of `sorted` into `n` equal-probability groups.
///
/// Exclusive method: position `i * (len + 1) / n`, linearly interpolated and
/// clamped to the data. Returns `n - 1` values.
pub fn quantiles(sorted: &[f64], n: usize) -> Vec<f64> {
    let len = sorted.len();
    if len == 0 || n < 2 {
        return Vec::new();
    }
    if len == 1 {
        return vec![sorted[0]; n - 1];
    }

    let m = len + 1;
    (1..n)
        .map(|i| {
            let j = (i * m / n).clamp(1, len - 1);
            let (lo, hi) = (sorted[j - 1], sorted[j]);
            if lo == hi {
                return lo;
            }
            let delta = (i * m) as f64 - (j * n) as f64;
            let n = n as f64;
            (lo * (n - delta) + hi * delta) / n
        })
        .collect()
}

/// Aggregate statistics for one batch of RTTs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub samples: usize,
    pub mean_ms: f64,
    pub p95_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    /// Requests per second over the whole batch
    pub throughput: f64,
    pub total_secs: f64,
}

impl LatencyStats {
    /// Reduce RTTs (ms) to summary statistics.
    ///
    /// `requests` and `total_time` cover the whole batch, including dropped
    /// requests and the time between them.
    pub fn aggregate(rtts_ms: &[f64], requests: usize, total_time: Duration) -> Self {
        let samples = rtts_ms.len();
        let mut sorted = rtts_ms.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        // Offsets from the minimum, so a batch of equal RTTs averages to exactly that RTT
        let mean_ms = match sorted.first() {
            Some(&min) => min + sorted.iter().map(|x| x - min).sum::<f64>() / samples as f64,
            None => 0.0,
        };

        // 19th of 19 cut points when splitting into 20 bins
        let p95_ms = if samples >= MIN_SAMPLES_FOR_P95 {
            quantiles(&sorted, 20)[18]
        } else {
            mean_ms
        };

        let total_secs = total_time.as_secs_f64();
        let throughput = if total_secs > 0.0 {
            requests as f64 / total_secs
        } else {
            0.0
        };

        Self {
            samples,
            mean_ms,
            p95_ms,
            min_ms: sorted.first().copied().unwrap_or(0.0),
            max_ms: sorted.last().copied().unwrap_or(0.0),
            throughput,
            total_secs,
        }
    }
}

/// Single-owner collector for one benchmark batch
#[derive(Debug, Default)]
pub struct MetricsCollector {
    /// Completed RTTs in milliseconds
    rtts_ms: Vec<f64>,
    /// Requests sent that produced no sample
    dropped: u64,
    start_time: Option<Instant>,
    end_time: Option<Instant>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the start of the batch
    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
        self.end_time = None;
    }

    /// Mark the end of the batch
    pub fn stop(&mut self) {
        self.end_time = Some(Instant::now());
    }

    pub fn record_sample(&mut self, sample: &RequestSample) {
        self.rtts_ms.push(sample.rtt_ms());
    }

    pub fn record_drop(&mut self) {
        self.dropped += 1;
    }

    pub fn completed(&self) -> u64 {
        self.rtts_ms.len() as u64
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Requests issued so far, answered or not
    pub fn total_requests(&self) -> u64 {
        self.completed() + self.dropped
    }

    pub fn elapsed(&self) -> Duration {
        match (self.start_time, self.end_time) {
            (Some(s), Some(e)) => e.duration_since(s),
            (Some(s), None) => s.elapsed(),
            _ => Duration::ZERO,
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            completed: self.completed(),
            dropped: self.dropped,
            latency: LatencyStats::aggregate(
                &self.rtts_ms,
                self.total_requests() as usize,
                self.elapsed(),
            ),
        }
    }
}

/// Collector state at the end of a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub completed: u64,
    pub dropped: u64,
    pub latency: LatencyStats,
}
