//!  History of finished sessions is kept by an [activity_log::ActivityLog].
//!  The basic idea is:
//!   - Every stopped session becomes exactly one [entities::LogRecord].
//!   - Records are only ever appended, never rewritten or removed.
//!   - All users share one log, reads filter it down to a single owner.

pub mod activity_log;
pub mod entities;
