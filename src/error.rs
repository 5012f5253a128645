//! Error types for triggerd
//!
//! Raw event handling never fails: every event entry point returns a block
//! decision and treats bad input as a no-op. Errors only exist at the edges
//! (settings files, device probing, replay scripts, condition evaluation)
//! and are propagated with `?` or swallowed through [`log_error`].

use std::fmt;

/// Main error type for triggerd operations
#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    /// Settings or device rule error
    #[error("Invalid settings: {0}")]
    Config(String),

    /// Device could not be opened, probed or grabbed
    #[error("Device error: {0}")]
    Device(String),

    /// Event refers to a device the backend does not know about
    #[error("Unknown device {0}")]
    UnknownDevice(String),

    /// A condition could not be evaluated
    #[error("Condition evaluation failed: {0}")]
    Condition(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for triggerd operations
pub type TriggerResult<T> = Result<T, TriggerError>;

/// Log a failed result at error level and drop it
///
/// For edges where the caller can carry on without the value, such as a
/// transcript line that failed to serialize.
pub fn log_error<T, E: fmt::Display>(result: Result<T, E>) -> Option<T> {
    result
        .map_err(|err| tracing::error!(error = %err, "operation failed"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            TriggerError::UnknownDevice("touchpad".into()).to_string(),
            "Unknown device touchpad"
        );
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(TriggerError::from(io).to_string(), "IO error: gone");
    }

    #[test]
    fn test_log_error_keeps_ok_values() {
        assert_eq!(log_error(Ok::<_, TriggerError>(5)), Some(5));
        let failed: Result<u32, TriggerError> = Err(TriggerError::Condition("boom".into()));
        assert_eq!(log_error(failed), None);
    }
}
