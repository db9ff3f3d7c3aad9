//! Error classification for vehicle commands

use thiserror::Error;

/// Markers the backend uses when it rejects a request as a duplicate
const BUSY_MARKERS: &[&str] = &["4004", "Duplicate request"];

/// How a failed vehicle command is reported
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandFailure {
    /// The vehicle is already processing another request. Reported to the
    /// caller as a soft success with a warning.
    #[error("vehicle busy: {detail}")]
    VehicleBusy { detail: String },

    /// Any other upstream error, with the raw detail kept for display
    #[error("{detail}")]
    Failed { detail: String },
}

impl CommandFailure {
    pub fn is_busy(&self) -> bool {
        matches!(self, CommandFailure::VehicleBusy { .. })
    }

    pub fn detail(&self) -> &str {
        match self {
            CommandFailure::VehicleBusy { detail } | CommandFailure::Failed { detail } => detail,
        }
    }
}

/// Classify an upstream error; the whole cause chain is inspected
pub fn classify_failure(err: &anyhow::Error) -> CommandFailure {
    let detail = format!("{:#}", err);
    if BUSY_MARKERS.iter().any(|marker| detail.contains(marker)) {
        CommandFailure::VehicleBusy { detail }
    } else {
        CommandFailure::Failed { detail }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_duplicate_request_is_busy() {
        let failure = classify_failure(&anyhow!("Duplicate request"));
        assert!(failure.is_busy());
    }

    #[test]
    fn test_error_code_4004_is_busy() {
        let err = anyhow!("resCode 4004").context("remote lock failed");
        let failure = classify_failure(&err);
        assert!(failure.is_busy());
        assert!(failure.detail().contains("remote lock failed"));
    }

    #[test]
    fn test_other_errors_are_hard_failures() {
        let failure = classify_failure(&anyhow!("session expired"));
        assert_eq!(
            failure,
            CommandFailure::Failed {
                detail: "session expired".to_string()
            }
        );
        assert_eq!(failure.to_string(), "session expired");
    }
}
