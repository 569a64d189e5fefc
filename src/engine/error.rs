use crate::storage::entities::LogRecord;

use super::session::ActivityName;

/// Errors returned by session transitions. Validation errors leave the session untouched.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Please select an activity, {0:?} can't be tracked")]
    InvalidActivity(String),

    #[error("{0} is already running. Stop it first")]
    AlreadyRunning(ActivityName),

    #[error("No activity is currently running")]
    NoActiveSession,

    /// The session has ended, but its record didn't make it into the log.
    #[error("{} ended but couldn't be saved: {source}", .record.activity_name)]
    WriteFailure {
        record: LogRecord,
        #[source]
        source: anyhow::Error,
    },
}
