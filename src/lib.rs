//! Small terminal tracker for the time you spend studying, sleeping, exercising and so on.
//! A session is started, paused and stopped from the console while a background clock keeps the
//! elapsed time on screen. Every stopped session lands in an append-only log that daily, weekly
//! and monthly reports are computed from.
//!

pub mod cli;
pub mod engine;
pub mod report;
pub mod storage;
pub mod utils;
