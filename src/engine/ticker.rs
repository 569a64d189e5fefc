use std::{
    fmt::Display,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, trace, warn};

use crate::utils::{clock::Clock, time::format_clock};

use super::session::{ActivityName, Session, SessionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayStatus {
    Live,
    Paused,
    Ready,
}

impl Display for DisplayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisplayStatus::Live => write!(f, "LIVE"),
            DisplayStatus::Paused => write!(f, "PAUSED"),
            DisplayStatus::Ready => write!(f, "READY"),
        }
    }
}

/// What the presentation layer shows. Derived from the session on every tick, never the other
/// way around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayState {
    pub clock: String,
    pub elapsed_seconds: u64,
    pub status: DisplayStatus,
    pub activity: Option<ActivityName>,
}

impl DisplayState {
    pub fn ready() -> Self {
        Self {
            clock: format_clock(0),
            elapsed_seconds: 0,
            status: DisplayStatus::Ready,
            activity: None,
        }
    }

    fn with_elapsed(elapsed_seconds: u64, status: DisplayStatus, activity: ActivityName) -> Self {
        Self {
            clock: format_clock(elapsed_seconds),
            elapsed_seconds,
            status,
            activity: Some(activity),
        }
    }
}

impl Default for DisplayState {
    fn default() -> Self {
        Self::ready()
    }
}

impl Display for DisplayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.activity {
            Some(activity) => write!(f, "{}  {}: {}", self.clock, self.status, activity),
            None => write!(f, "{}  {}", self.clock, self.status),
        }
    }
}

/// Owner of the published [DisplayState]. Refreshed by every tick and by every session
/// transition, always while the caller holds the session lock, so a stale tick can't overwrite
/// a newer transition.
pub struct DisplayPublisher {
    sender: watch::Sender<DisplayState>,
    /// Last elapsed value shown for a running session, keyed by its start. Paused sessions keep
    /// showing it.
    held: Mutex<Option<(DateTime<Utc>, u64)>>,
}

impl DisplayPublisher {
    pub fn new() -> Self {
        Self {
            sender: watch::Sender::new(DisplayState::ready()),
            held: Mutex::new(None),
        }
    }

    pub fn current(&self) -> DisplayState {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DisplayState> {
        self.sender.subscribe()
    }

    /// Computes the display of `session` at `now` and publishes it.
    pub fn refresh(&self, session: &Session, now: DateTime<Utc>) -> Result<DisplayState> {
        let state = self.compute(session, now)?;
        self.sender.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state.clone();
                true
            }
        });
        Ok(state)
    }

    fn compute(&self, session: &Session, now: DateTime<Utc>) -> Result<DisplayState> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(active) = session.active() else {
            *held = None;
            return Ok(DisplayState::ready());
        };

        if active.running {
            let elapsed = active.elapsed_at(now);
            let elapsed = u64::try_from(elapsed.num_seconds()).map_err(|_| {
                anyhow!(
                    "Clock reads {now}, which is before the session start {}",
                    active.started_at
                )
            })?;
            *held = Some((active.started_at, elapsed));
            Ok(DisplayState::with_elapsed(
                elapsed,
                DisplayStatus::Live,
                active.activity.clone(),
            ))
        } else {
            let elapsed = match *held {
                Some((started_at, elapsed)) if started_at == active.started_at => elapsed,
                // Paused before anything was shown for this session.
                _ => 0,
            };
            Ok(DisplayState::with_elapsed(
                elapsed,
                DisplayStatus::Paused,
                active.activity.clone(),
            ))
        }
    }
}

impl Default for DisplayPublisher {
    fn default() -> Self {
        Self::new()
    }
}

/// Background producer of [DisplayState]. Reads the session once per period and refreshes the
/// [DisplayPublisher], the only thing it ever writes.
pub struct ClockTicker {
    session: Arc<SessionState>,
    clock: Arc<dyn Clock>,
    display: Arc<DisplayPublisher>,
    period: Duration,
    shutdown: CancellationToken,
}

impl ClockTicker {
    pub fn new(
        session: Arc<SessionState>,
        clock: Arc<dyn Clock>,
        display: Arc<DisplayPublisher>,
        period: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            session,
            clock,
            display,
            period,
            shutdown,
        }
    }

    /// Publishes the display for the current moment.
    fn tick(&self) -> Result<DisplayState> {
        let session = self.session.lock();
        self.display.refresh(&session, self.clock.time())
    }

    /// Executes the ticker loop until shutdown. Failing ticks are logged and skipped.
    pub async fn run(self) {
        let mut tick_point = self.clock.instant();
        loop {
            match self.tick() {
                Ok(state) => trace!("Tick {state}"),
                Err(e) => {
                    error!("Skipping clock tick {e:?}")
                }
            }

            // Ticks are scheduled from a fixed origin. If we fell behind, the missed ones are
            // dropped instead of being fired in a burst.
            tick_point += self.period;
            let now = self.clock.instant();
            if tick_point <= now {
                let mut skipped = 0u32;
                while tick_point <= now {
                    tick_point += self.period;
                    skipped += 1;
                }
                warn!("Clock ticker fell behind, skipped {skipped} ticks");
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    return
                }
                _ = self.clock.sleep_until(tick_point) => ()
            }
        }
    }
}
