use std::{fmt::Display, sync::Arc, time::Duration};

use anyhow::Result;
use chrono::{DateTime, Utc};
use error::SessionError;
use identity::IdentityProvider;
use session::{ActivityName, Session, SessionState, SessionStatus};
use ticker::{ClockTicker, DisplayPublisher, DisplayState};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    report::{self, DailyReport, Digest, MonthlyReport, Report, WeeklyReport},
    storage::{activity_log::ActivityLog, entities::LogRecord},
    utils::{clock::Clock, time::format_duration},
};

pub mod error;
pub mod identity;
pub mod session;
pub mod shutdown;
pub mod ticker;

const DEFAULT_TICK_PERIOD: Duration = Duration::from_secs(1);
const DEFAULT_WRITE_RETRIES: u32 = 2;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How often the displayed clock is refreshed.
    pub tick_period: Duration,
    /// Extra attempts at saving a stopped session before giving up on it.
    pub write_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_period: DEFAULT_TICK_PERIOD,
            write_retries: DEFAULT_WRITE_RETRIES,
        }
    }
}

/// Successful outcome of a transition, meant to be shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    Started {
        activity: ActivityName,
        started_at: DateTime<Utc>,
    },
    Stopped(LogRecord),
    Paused(ActivityName),
    Resumed(ActivityName),
}

impl Display for Ack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ack::Started { activity, .. } => write!(f, "Started tracking {activity}"),
            Ack::Stopped(record) => write!(
                f,
                "Stopped {}. Duration: {}",
                record.activity_name,
                format_duration(record.duration_seconds)
            ),
            Ack::Paused(activity) => write!(f, "Paused {activity}"),
            Ack::Resumed(activity) => write!(f, "Resumed {activity}"),
        }
    }
}

/// Entry point for everything that drives or observes the tracker. Owns the single session, the
/// log it writes into and the display shared with the [ClockTicker].
pub struct ActivityEngine<L: ActivityLog> {
    session: Arc<SessionState>,
    log: L,
    identity: Box<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    display: Arc<DisplayPublisher>,
    write_retries: u32,
}

/// Creates the engine together with its ticker. The ticker has to be run by the caller, it stops
/// once `shutdown` is cancelled.
pub fn create_engine<L: ActivityLog>(
    config: EngineConfig,
    log: L,
    identity: Box<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    shutdown: &CancellationToken,
) -> (ActivityEngine<L>, ClockTicker) {
    let session = Arc::new(SessionState::new());
    let display = Arc::new(DisplayPublisher::new());

    let ticker = ClockTicker::new(
        session.clone(),
        clock.clone(),
        display.clone(),
        config.tick_period,
        shutdown.clone(),
    );

    let engine = ActivityEngine {
        session,
        log,
        identity,
        clock,
        display,
        write_retries: config.write_retries,
    };

    (engine, ticker)
}

impl<L: ActivityLog> ActivityEngine<L> {
    pub fn start(&self, activity: &str) -> Result<Ack, SessionError> {
        let mut session = self.session.lock();
        let now = self.clock.time();
        let ack = match session.start(activity, now) {
            Ok(active) => Ack::Started {
                activity: active.activity.clone(),
                started_at: active.started_at,
            },
            Err(e) => {
                debug!("Rejected start of {activity:?}: {e}");
                return Err(e);
            }
        };
        self.refresh_display(&session, now);
        info!("{ack} at {now}");
        Ok(ack)
    }

    /// Ends the session and records it. The session ends even when the record can't be saved,
    /// in which case [SessionError::WriteFailure] hands the lost record back.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<Ack, SessionError> {
        let (ended, now, today) = {
            let mut session = self.session.lock();
            let ended = session.stop().inspect_err(|e| debug!("Rejected stop: {e}"))?;
            let now = self.clock.time();
            self.refresh_display(&session, now);
            (ended, now, self.clock.today())
        };

        // Pauses only freeze the display, the whole wall clock span is recorded.
        let seconds = u64::try_from(ended.elapsed_at(now).num_seconds()).unwrap_or_else(|_| {
            warn!("Clock went backwards during {}, saving 0s", ended.activity);
            0
        });

        let record = LogRecord::new(
            today,
            ended.activity.as_arc(),
            seconds,
            self.identity.current_identity(),
        );

        match self.append_with_retries(record.clone()).await {
            Ok(()) => {
                info!("Stopped {record:?}");
                Ok(Ack::Stopped(record))
            }
            Err(source) => {
                error!("Failed to save {record:?}: {source:?}");
                Err(SessionError::WriteFailure { record, source })
            }
        }
    }

    async fn append_with_retries(&self, record: LogRecord) -> Result<()> {
        let mut attempt = 0;
        loop {
            match self.log.append(record.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.write_retries => {
                    attempt += 1;
                    warn!("Saving {record:?} failed, retrying ({attempt}): {e:?}");
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub fn toggle_pause(&self) -> Result<Ack, SessionError> {
        let mut session = self.session.lock();
        let status = session
            .toggle_pause()
            .inspect_err(|e| debug!("Rejected pause: {e}"))?;
        let activity = session
            .active()
            .map(|v| v.activity.clone())
            .ok_or(SessionError::NoActiveSession)?;
        let ack = match status {
            SessionStatus::Paused => Ack::Paused(activity),
            _ => Ack::Resumed(activity),
        };
        self.refresh_display(&session, self.clock.time());
        info!("{ack}");
        Ok(ack)
    }

    pub fn status(&self) -> SessionStatus {
        self.session.lock().status()
    }

    /// Display as of the latest tick or transition, whichever came last.
    pub fn display_state(&self) -> DisplayState {
        self.display.current()
    }

    /// Stream yielding the current display and then every change of it.
    pub fn subscribe_display(&self) -> WatchStream<DisplayState> {
        WatchStream::new(self.display.subscribe())
    }

    /// Called with the session lock held, right after a transition.
    fn refresh_display(&self, session: &Session, now: DateTime<Utc>) {
        if let Err(e) = self.display.refresh(session, now) {
            warn!("Display not refreshed after a transition {e:?}");
        }
    }

    async fn history(&self, identity: &str) -> Result<Vec<LogRecord>> {
        self.log.read_all(identity).await
    }

    pub async fn daily_report(&self, identity: &str) -> Result<Report<DailyReport>> {
        Ok(report::daily(&self.history(identity).await?, self.clock.today()))
    }

    pub async fn weekly_report(&self, identity: &str) -> Result<Report<WeeklyReport>> {
        Ok(report::weekly(&self.history(identity).await?, self.clock.today()))
    }

    pub async fn monthly_report(&self, identity: &str) -> Result<Report<MonthlyReport>> {
        Ok(report::monthly(&self.history(identity).await?, self.clock.today()))
    }

    /// Seconds tracked today, the headline figure of a dashboard.
    pub async fn today_total(&self, identity: &str) -> Result<u64> {
        Ok(report::today_total(
            &self.history(identity).await?,
            self.clock.today(),
        ))
    }

    pub async fn digest(&self, identity: &str) -> Result<Digest> {
        Ok(Digest {
            identity: identity.into(),
            date: self.clock.today(),
            report: self.daily_report(identity).await?,
        })
    }

    pub fn current_identity(&self) -> Arc<str> {
        self.identity.current_identity()
    }
}
