use std::{fmt::Display, path::PathBuf, sync::Arc};

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, ValueEnum};

use crate::{
    engine::identity::{IdentityProvider, StaticIdentity},
    report::{self, Digest},
    storage::{
        activity_log::{ActivityLog, JsonLinesLog},
        entities::LogRecord,
    },
};

use super::Args;

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ReportKind {
    Today,
    Week,
    Month,
    /// Today's report with a header naming the user, ready to be sent to someone.
    Digest,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Parser)]
pub struct ReportCommand {
    #[arg(value_enum, default_value_t = ReportKind::Today)]
    kind: ReportKind,
    #[arg(
        long,
        short,
        help = "Day to report on, defaults to today. Examples are \"yesterday\", \"last friday\", \"15/03/2025\""
    )]
    date: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
}

/// Command to process `report` command. Reads the history of the current user and prints the
/// requested summary as of `date`.
pub async fn process_report_command(
    ReportCommand {
        kind,
        date,
        date_style,
    }: ReportCommand,
    app_dir: PathBuf,
    identity: StaticIdentity,
) -> Result<()> {
    let today = parse_anchor_date(date, date_style, Local::now())?;
    let owner = identity.current_identity();

    let log = JsonLinesLog::new(app_dir)?;
    let records = log.read_all(&owner).await?;

    println!("{}", render_report(kind, &records, today, owner));
    Ok(())
}

fn parse_anchor_date(
    date: Option<String>,
    date_style: DateStyle,
    now: DateTime<Local>,
) -> Result<NaiveDate> {
    match date.map(|s| parse_date_string(&s, now, date_style.into())) {
        Some(Ok(v)) => Ok(v.date_naive()),
        Some(Err(e)) => Err(Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                format!("Failed to validate date {e}"),
            )
            .into()),
        None => Ok(now.date_naive()),
    }
}

fn render_report(
    kind: ReportKind,
    records: &[LogRecord],
    today: NaiveDate,
    owner: Arc<str>,
) -> String {
    match kind {
        ReportKind::Today => report::daily(records, today).to_string(),
        ReportKind::Week => report::weekly(records, today).to_string(),
        ReportKind::Month => report::monthly(records, today).to_string(),
        ReportKind::Digest => Digest {
            identity: owner,
            date: today,
            report: report::daily(records, today),
        }
        .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Local, NaiveDate, TimeZone};

    use crate::storage::entities::LogRecord;

    use super::{parse_anchor_date, render_report, DateStyle, ReportKind};

    const TEST_DATE: NaiveDate = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();

    #[test]
    fn test_anchor_date_defaults_to_today() {
        let now = Local.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap();
        assert_eq!(parse_anchor_date(None, DateStyle::Uk, now).unwrap(), TEST_DATE);
    }

    #[test]
    fn test_anchor_date_styles() {
        let now = Local.with_ymd_and_hms(2025, 4, 1, 12, 0, 0).unwrap();
        assert_eq!(
            parse_anchor_date(Some("15/03/2025".into()), DateStyle::Uk, now).unwrap(),
            TEST_DATE
        );
        assert_eq!(
            parse_anchor_date(Some("03/15/2025".into()), DateStyle::Us, now).unwrap(),
            TEST_DATE
        );
        assert!(parse_anchor_date(Some("not a date".into()), DateStyle::Uk, now).is_err());
    }

    #[test]
    fn test_render_report_kinds() {
        let records = vec![LogRecord::new(TEST_DATE, "STUDY", 300, "alice")];
        assert!(render_report(ReportKind::Today, &records, TEST_DATE, "alice".into())
            .starts_with("# Today's Report - March 15, 2025"));
        assert!(render_report(ReportKind::Week, &records, TEST_DATE, "alice".into())
            .starts_with("# This Week's Report\n\n**Week:** March 10 - March 15, 2025"));
        assert!(render_report(ReportKind::Month, &records, TEST_DATE, "alice".into())
            .starts_with("# This Month's Report - March 2025"));
        assert!(render_report(ReportKind::Digest, &records, TEST_DATE, "alice".into())
            .contains("User: alice\n"));

        let next_month = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
        assert!(render_report(ReportKind::Month, &records, next_month, "alice".into())
            .contains("No activities tracked this month."));
    }
}
