// Error handling module
// Defines the harness error taxonomy shared by every benchmark driver

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while driving a target process
#[derive(Error, Debug)]
pub enum HarnessError {
    /// Target executable is missing, not executable, or failed to spawn
    #[error("Failed to launch {}: {reason}", path.display())]
    Launch { path: PathBuf, reason: String },

    /// No known outcome marker within the skip window
    #[error("Protocol mismatch: no outcome marker after skipping {skipped} lines")]
    ProtocolMismatch { skipped: usize },

    /// Target closed its stdout (or stdin) before answering
    #[error("Stream closed by target")]
    StreamClosed,

    /// Target did not answer within the bounded wait
    #[error("No response within {}ms", timeout.as_millis())]
    ResponseTimeout { timeout: Duration },

    /// Harness configuration rejected before launch
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Any other I/O failure on the target's streams
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    /// Helper for launch failures
    pub fn launch(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        HarnessError::Launch {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Map a write/flush failure, treating a broken pipe as a closed stream
    pub fn from_write(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset => {
                HarnessError::StreamClosed
            }
            _ => HarnessError::Io(err),
        }
    }

    /// Short stable name used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            HarnessError::Launch { .. } => "launch_error",
            HarnessError::ProtocolMismatch { .. } => "protocol_mismatch",
            HarnessError::StreamClosed => "stream_closed",
            HarnessError::ResponseTimeout { .. } => "response_timeout",
            HarnessError::InvalidConfig(_) => "invalid_config",
            HarnessError::Io(_) => "io_error",
        }
    }
}

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = HarnessError::launch("/opt/gatekeeper", "not found");
        assert_eq!(err.to_string(), "Failed to launch /opt/gatekeeper: not found");

        let err = HarnessError::ProtocolMismatch { skipped: 64 };
        assert_eq!(
            err.to_string(),
            "Protocol mismatch: no outcome marker after skipping 64 lines"
        );

        let err = HarnessError::ResponseTimeout {
            timeout: Duration::from_millis(250),
        };
        assert_eq!(err.to_string(), "No response within 250ms");
    }

    #[test]
    fn test_broken_pipe_maps_to_stream_closed() {
        let err = HarnessError::from_write(std::io::Error::from(std::io::ErrorKind::BrokenPipe));
        assert!(matches!(err, HarnessError::StreamClosed));

        let err = HarnessError::from_write(std::io::Error::from(std::io::ErrorKind::Other));
        assert!(matches!(err, HarnessError::Io(_)));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(HarnessError::StreamClosed.kind(), "stream_closed");
        assert_eq!(
            HarnessError::InvalidConfig("users".to_string()).kind(),
            "invalid_config"
        );
        assert_eq!(
            HarnessError::ResponseTimeout {
                timeout: Duration::from_secs(1)
            }
            .kind(),
            "response_timeout"
        );
    }
}
