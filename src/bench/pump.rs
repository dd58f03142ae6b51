//! Request pump: one command out, one line back, timed on the monotonic clock.

use std::time::{Duration, Instant};

use super::process::TargetProcess;
use crate::error::{HarnessError, Result};

/// One measured request/response exchange
#[derive(Debug, Clone)]
pub struct RequestSample {
    pub command: String,
    pub response: String,
    pub started_at: Instant,
    pub finished_at: Instant,
}

impl RequestSample {
    pub fn rtt(&self) -> Duration {
        self.finished_at.duration_since(self.started_at)
    }

    /// Round-trip time in milliseconds
    pub fn rtt_ms(&self) -> f64 {
        self.rtt().as_secs_f64() * 1000.0
    }
}

/// User index for request `i` when spreading over `users` users
pub fn user_for_request(request: usize, users: usize) -> usize {
    request % users
}

pub fn user_id(index: usize) -> String {
    format!("user_{}", index)
}

/// Gatekeeper command line for a user (without the trailing newline)
pub fn check_command(user: &str) -> String {
    format!("check {}", user)
}

/// Send `command` and block for exactly one response line.
///
/// Assumes the target answers in FIFO order with one line per command; a
/// target that breaks this produces misattributed RTTs which cannot be
/// detected here. End of stream yields `StreamClosed` and no sample.
pub async fn send_and_time(
    target: &mut TargetProcess,
    command: &str,
    timeout: Duration,
) -> Result<RequestSample> {
    let started_at = Instant::now();
    target.write_line(command).await?;
    target.flush().await?;

    let line = target.read_line(timeout).await?;
    let finished_at = Instant::now();

    match line {
        Some(response) => Ok(RequestSample {
            command: command.to_string(),
            response,
            started_at,
            finished_at,
        }),
        None => Err(HarnessError::StreamClosed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_round_robin_assignment() {
        let users: Vec<usize> = (0..10).map(|i| user_for_request(i, 3)).collect();
        assert_eq!(users, vec![0, 1, 2, 0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_check_command_format() {
        assert_eq!(check_command(&user_id(42)), "check user_42");
    }

    #[test]
    fn test_rtt_ms() {
        let started_at = Instant::now();
        let sample = RequestSample {
            command: "check user_0".to_string(),
            response: "Request allowed".to_string(),
            started_at,
            finished_at: started_at + Duration::from_micros(1500),
        };
        assert!((sample.rtt_ms() - 1.5).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn prop_round_robin_is_balanced(requests in 1usize..2000, users in 1usize..200) {
            let mut counts = vec![0usize; users];
            for i in 0..requests {
                let user = user_for_request(i, users);
                prop_assert!(user < users);
                counts[user] += 1;
            }
            let max = counts.iter().max().copied().unwrap_or(0);
            let min = counts.iter().min().copied().unwrap_or(0);
            prop_assert!(max - min <= 1);
        }
    }
}
