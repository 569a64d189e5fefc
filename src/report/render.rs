use std::{
    fmt::{Display, Formatter, Result},
    sync::Arc,
};

use chrono::NaiveDate;

use crate::utils::time::format_duration;

use super::aggregate::{Breakdown, DailyReport, MonthlyReport, Report, WeeklyReport};

const BAR_CELLS: usize = 20;

/// Report kinds that know how to introduce themselves when there is nothing to show.
pub trait ReportSection: Display {
    fn heading() -> &'static str;

    fn empty_message() -> &'static str;
}

impl<T: ReportSection> Display for Report<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Report::NoData => write!(f, "# {}\n\n_{}_\n", T::heading(), T::empty_message()),
            Report::Data(report) => Display::fmt(report, f),
        }
    }
}

fn write_activities(f: &mut Formatter<'_>, breakdown: &Breakdown, with_bars: bool) -> Result {
    for share in &breakdown.activities {
        writeln!(
            f,
            "**{}:** {} ({})",
            share.activity,
            format_duration(share.seconds),
            share.percentage
        )?;
        if with_bars {
            let filled = ((*share.percentage / 5.) as usize).min(BAR_CELLS);
            writeln!(
                f,
                "{}{}\n",
                "█".repeat(filled),
                "░".repeat(BAR_CELLS - filled)
            )?;
        }
    }
    Ok(())
}

impl ReportSection for DailyReport {
    fn heading() -> &'static str {
        "Today's Report"
    }

    fn empty_message() -> &'static str {
        "No activities tracked yet today. Start tracking to see your report!"
    }
}

impl Display for DailyReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        writeln!(
            f,
            "# {} - {}\n",
            Self::heading(),
            self.date.format("%B %d, %Y")
        )?;
        writeln!(
            f,
            "**Total Time Tracked:** {}\n",
            format_duration(self.breakdown.total_seconds)
        )?;
        writeln!(f, "## Activities Breakdown:\n")?;
        write_activities(f, &self.breakdown, true)
    }
}

impl ReportSection for WeeklyReport {
    fn heading() -> &'static str {
        "This Week's Report"
    }

    fn empty_message() -> &'static str {
        "No activities tracked this week."
    }
}

impl Display for WeeklyReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        writeln!(f, "# {}\n", Self::heading())?;
        writeln!(
            f,
            "**Week:** {} - {}",
            self.start.format("%B %d"),
            self.end.format("%B %d, %Y")
        )?;
        writeln!(
            f,
            "**Total Time:** {}\n",
            format_duration(self.breakdown.total_seconds)
        )?;

        writeln!(f, "## Daily Summary:\n")?;
        for day in &self.days {
            writeln!(
                f,
                "**{} ({}):** {}",
                day.date.format("%A"),
                day.date.format("%b %d"),
                format_duration(day.seconds)
            )?;
        }

        writeln!(f, "\n## Activities:\n")?;
        write_activities(f, &self.breakdown, false)
    }
}

impl ReportSection for MonthlyReport {
    fn heading() -> &'static str {
        "This Month's Report"
    }

    fn empty_message() -> &'static str {
        "No activities tracked this month."
    }
}

impl Display for MonthlyReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        writeln!(
            f,
            "# {} - {}\n",
            Self::heading(),
            self.end.format("%B %Y")
        )?;
        writeln!(
            f,
            "**Total Time:** {}\n",
            format_duration(self.breakdown.total_seconds)
        )?;
        writeln!(f, "## Activities:\n")?;
        write_activities(f, &self.breakdown, false)
    }
}

/// Daily report addressed to someone else, for example a parent. Sending it is up to the caller.
pub struct Digest {
    pub identity: Arc<str>,
    pub date: NaiveDate,
    pub report: Report<DailyReport>,
}

impl Display for Digest {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        writeln!(f, "Daily Activity Report\n")?;
        writeln!(f, "User: {}", self.identity)?;
        writeln!(f, "Date: {}\n", self.date.format("%B %d, %Y"))?;
        Display::fmt(&self.report, f)
    }
}
