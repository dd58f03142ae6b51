//! Startup handshake: the fixed parameter lines a target reads before any command.

use std::path::Path;
use std::time::Duration;

use super::process::TargetProcess;
use crate::error::Result;

/// Ordered configuration values sent once, before measured traffic
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigHandshake {
    values: Vec<String>,
}

impl ConfigHandshake {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Gatekeeper: max requests per user, then window length in seconds
    pub fn gatekeeper(max_requests: u32, time_window_secs: u32) -> Self {
        Self::new([max_requests.to_string(), time_window_secs.to_string()])
    }

    /// Health monitor: threshold, alert log path, poll interval in seconds
    pub fn health_monitor(threshold: f64, log_file: &Path, poll_interval_secs: u32) -> Self {
        Self::new([
            threshold.to_string(),
            log_file.display().to_string(),
            poll_interval_secs.to_string(),
        ])
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Write every value in order, flush once, then hold for `warmup`.
    ///
    /// Nothing is read back; the pause lets the target finish its own startup.
    pub async fn send(&self, target: &mut TargetProcess, warmup: Duration) -> Result<()> {
        for value in &self.values {
            target.write_line(value).await?;
        }
        target.flush().await?;
        tracing::debug!(
            "Sent {}-line handshake to {}, warming up for {}ms",
            self.values.len(),
            target.name(),
            warmup.as_millis()
        );

        if !warmup.is_zero() {
            tokio::time::sleep(warmup).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gatekeeper_handshake() {
        let handshake = ConfigHandshake::gatekeeper(10_000, 60);
        assert_eq!(handshake.values(), ["10000", "60"]);
    }

    #[test]
    fn test_health_monitor_handshake() {
        let handshake =
            ConfigHandshake::health_monitor(0.1, Path::new("/var/log/alerts.log"), 1);
        assert_eq!(handshake.values(), ["0.1", "/var/log/alerts.log", "1"]);
    }

    #[test]
    fn test_order_is_preserved() {
        let handshake = ConfigHandshake::new(["c", "a", "b"]);
        assert_eq!(handshake.values(), ["c", "a", "b"]);
    }
}
