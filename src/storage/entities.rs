use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One finished session, as it is stored on disk. Dates are calendar dates in the user's
/// timezone, so reports never have to guess which day a timestamp belongs to.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct LogRecord {
    pub date: NaiveDate,
    #[serde(rename = "activity")]
    pub activity_name: Arc<str>,
    #[serde(rename = "seconds")]
    pub duration_seconds: u64,
    #[serde(rename = "owner")]
    pub owner_identity: Arc<str>,
}

impl LogRecord {
    pub fn new(
        date: NaiveDate,
        activity_name: impl Into<Arc<str>>,
        duration_seconds: u64,
        owner_identity: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            date,
            activity_name: activity_name.into(),
            duration_seconds,
            owner_identity: owner_identity.into(),
        }
    }

    pub fn is_owned_by(&self, owner: &str) -> bool {
        &*self.owner_identity == owner
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::LogRecord;

    #[test]
    fn record_line_format() -> anyhow::Result<()> {
        let record = LogRecord::new(
            NaiveDate::from_ymd_opt(2024, 4, 5).unwrap(),
            "STUDY",
            300,
            "student@example.com",
        );
        let line = serde_json::to_string(&record)?;
        assert_eq!(
            line,
            r#"{"date":"2024-04-05","activity":"STUDY","seconds":300,"owner":"student@example.com"}"#
        );
        assert_eq!(serde_json::from_str::<LogRecord>(&line)?, record);
        Ok(())
    }

    #[test]
    fn negative_duration_is_rejected() {
        let line = r#"{"date":"2024-04-05","activity":"STUDY","seconds":-3,"owner":"guest"}"#;
        assert!(serde_json::from_str::<LogRecord>(line).is_err());
    }
}
