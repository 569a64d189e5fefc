//! Summaries of the activity log. Everything here is a pure function of the records of one user
//! and the date considered "today", so reports can be computed for any day.

pub mod aggregate;
pub mod render;

pub use aggregate::{
    daily, monthly, today_total, weekly, ActivityShare, Breakdown, DailyReport, DayTotal,
    MonthlyReport, Report, WeeklyReport,
};
pub use render::Digest;
