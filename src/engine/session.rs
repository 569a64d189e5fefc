use std::{
    fmt::Display,
    ops::Deref,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, Utc};

use super::error::SessionError;

/// Activities offered to the user. Any other non-empty name is accepted as well.
pub const SUGGESTED_ACTIVITIES: [&str; 9] = [
    "STUDY",
    "HOMEWORK",
    "REVISION",
    "SCREENTIME",
    "EXERCISE",
    "SLEEP",
    "BREAK",
    "READING",
    "PRACTICE",
];

/// Normalized activity name. Always trimmed, upper case and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActivityName(Arc<str>);

impl ActivityName {
    pub fn parse(raw: &str) -> Result<Self, SessionError> {
        let name = raw.trim();
        if name.is_empty() || name.chars().any(char::is_control) {
            return Err(SessionError::InvalidActivity(raw.to_string()));
        }
        Ok(Self(name.to_uppercase().into()))
    }

    pub fn as_arc(&self) -> Arc<str> {
        self.0.clone()
    }
}

impl Deref for ActivityName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ActivityName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Ready,
    Running,
    Paused,
}

/// An activity being tracked. A name can't exist without its start time and vice versa.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    pub activity: ActivityName,
    pub started_at: DateTime<Utc>,
    pub running: bool,
}

impl ActiveSession {
    /// Wall clock time since the start. Pauses are not subtracted.
    pub fn elapsed_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.started_at
    }
}

/// The state machine itself. `READY -> RUNNING <-> PAUSED -> READY`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    active: Option<ActiveSession>,
}

impl Session {
    pub fn status(&self) -> SessionStatus {
        match &self.active {
            None => SessionStatus::Ready,
            Some(v) if v.running => SessionStatus::Running,
            Some(_) => SessionStatus::Paused,
        }
    }

    pub fn active(&self) -> Option<&ActiveSession> {
        self.active.as_ref()
    }

    pub fn start(&mut self, activity: &str, now: DateTime<Utc>) -> Result<&ActiveSession, SessionError> {
        if let Some(active) = &self.active {
            return Err(SessionError::AlreadyRunning(active.activity.clone()));
        }
        let activity = ActivityName::parse(activity)?;
        Ok(&*self.active.insert(ActiveSession {
            activity,
            started_at: now,
            running: true,
        }))
    }

    /// Ends the session and hands it back so the caller can record it.
    pub fn stop(&mut self) -> Result<ActiveSession, SessionError> {
        self.active.take().ok_or(SessionError::NoActiveSession)
    }

    /// Freezes or unfreezes the displayed clock. Returns the status after the toggle.
    pub fn toggle_pause(&mut self) -> Result<SessionStatus, SessionError> {
        let active = self.active.as_mut().ok_or(SessionError::NoActiveSession)?;
        active.running = !active.running;
        Ok(self.status())
    }
}

/// Shared owner of the [Session]. Every read and write goes through the same lock, so nobody can
/// observe a half applied transition.
#[derive(Debug, Default)]
pub struct SessionState {
    inner: Mutex<Session>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transitions never leave the session half updated, so a poisoned lock still holds a valid
    /// state.
    pub fn lock(&self) -> MutexGuard<'_, Session> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

    use crate::engine::error::SessionError;

    use super::{ActivityName, Session, SessionStatus};

    const TEST_START_DATE: NaiveDateTime =
        NaiveDateTime::new(NaiveDate::from_ymd_opt(2018, 7, 4).unwrap(), NaiveTime::MIN);

    #[test]
    fn test_activity_name_normalization() {
        assert_eq!(&*ActivityName::parse(" study ").unwrap(), "STUDY");
        assert_eq!(&*ActivityName::parse("Deep Work").unwrap(), "DEEP WORK");
        assert!(matches!(
            ActivityName::parse("   "),
            Err(SessionError::InvalidActivity(_))
        ));
        assert!(matches!(
            ActivityName::parse("STU\nDY"),
            Err(SessionError::InvalidActivity(_))
        ));
    }

    #[test]
    fn test_session_cycle() {
        let now = Utc.from_utc_datetime(&TEST_START_DATE);
        let mut session = Session::default();
        assert_eq!(session.status(), SessionStatus::Ready);

        session.start("study", now).unwrap();
        assert_eq!(session.status(), SessionStatus::Running);

        assert_eq!(session.toggle_pause().unwrap(), SessionStatus::Paused);
        assert_eq!(session.toggle_pause().unwrap(), SessionStatus::Running);
        assert_eq!(session.toggle_pause().unwrap(), SessionStatus::Paused);

        let ended = session.stop().unwrap();
        assert_eq!(&*ended.activity, "STUDY");
        assert_eq!(ended.started_at, now);
        assert_eq!(session.status(), SessionStatus::Ready);
        assert!(session.active().is_none());
    }

    #[test]
    fn test_rejected_transitions_leave_state_untouched() {
        let now = Utc.from_utc_datetime(&TEST_START_DATE);
        let mut session = Session::default();

        assert!(matches!(session.stop(), Err(SessionError::NoActiveSession)));
        assert!(matches!(
            session.toggle_pause(),
            Err(SessionError::NoActiveSession)
        ));
        assert!(matches!(
            session.start("", now),
            Err(SessionError::InvalidActivity(_))
        ));
        assert_eq!(session, Session::default());

        session.start("study", now).unwrap();
        session.toggle_pause().unwrap();
        let before = session.clone();
        let err = session
            .start("sleep", now + Duration::seconds(5))
            .unwrap_err();
        assert!(matches!(err, SessionError::AlreadyRunning(ref name) if &**name == "STUDY"));
        // Busy wins over an invalid name.
        assert!(matches!(
            session.start("", now),
            Err(SessionError::AlreadyRunning(_))
        ));
        assert_eq!(session, before);
    }

    #[test]
    fn test_pause_keeps_start_time() {
        let now = Utc.from_utc_datetime(&TEST_START_DATE);
        let mut session = Session::default();
        session.start("study", now).unwrap();
        session.toggle_pause().unwrap();
        session.toggle_pause().unwrap();
        let active = session.active().unwrap();
        assert_eq!(active.started_at, now);
        assert_eq!(
            active.elapsed_at(now + Duration::seconds(50)),
            Duration::seconds(50)
        );
    }
}
