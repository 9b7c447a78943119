//! Execution state kept per session key.

use std::time::{Duration, Instant};

use crate::value::ScriptValue;

/// The latest state of one session: its backend handle and last result.
///
/// A `SessionState` is never merged. Each execution under a key replaces it
/// with a new one that owns the (possibly same) backend session; the backend
/// session itself is what accumulates bindings.
#[derive(Debug)]
pub struct SessionState<S> {
    session: S,
    last_value: Option<ScriptValue>,
    submissions: u64,
    created_at: Instant,
    last_activity: Instant,
}

impl<S> SessionState<S> {
    /// Wrap a freshly created backend session.
    pub fn new(session: S) -> Self {
        let now = Instant::now();
        Self {
            session,
            last_value: None,
            submissions: 0,
            created_at: now,
            last_activity: now,
        }
    }

    /// Build the state that follows this one after another submission.
    ///
    /// `last_value` is `None` when the submission faulted.
    pub fn advance(self, last_value: Option<ScriptValue>) -> Self {
        Self {
            session: self.session,
            last_value,
            submissions: self.submissions + 1,
            created_at: self.created_at,
            last_activity: Instant::now(),
        }
    }

    /// Backend session handle.
    pub fn session(&self) -> &S {
        &self.session
    }

    /// Mutable backend session handle.
    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    /// Give up the backend session.
    pub fn into_session(self) -> S {
        self.session
    }

    /// Value of the most recent submission, if it completed.
    pub fn last_value(&self) -> Option<&ScriptValue> {
        self.last_value.as_ref()
    }

    /// Number of submissions executed against this session.
    pub fn submissions(&self) -> u64 {
        self.submissions
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Get the idle duration since last activity.
    pub fn idle_duration(&self) -> Duration {
        self.last_activity.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state() {
        let state = SessionState::new("handle");
        assert_eq!(*state.session(), "handle");
        assert!(state.last_value().is_none());
        assert_eq!(state.submissions(), 0);
    }

    #[test]
    fn test_advance_replaces_value() {
        let state = SessionState::new(1u8);
        let created = state.created_at();

        let state = state.advance(Some(ScriptValue::Int(2)));
        assert_eq!(state.last_value(), Some(&ScriptValue::Int(2)));
        assert_eq!(state.submissions(), 1);

        let state = state.advance(None);
        assert!(state.last_value().is_none());
        assert_eq!(state.submissions(), 2);
        assert_eq!(state.created_at(), created);
    }

    #[test]
    fn test_idle_duration_resets_on_advance() {
        let state = SessionState::new(());
        std::thread::sleep(Duration::from_millis(20));
        assert!(state.idle_duration() >= Duration::from_millis(20));

        let state = state.advance(None);
        assert!(state.idle_duration() < Duration::from_millis(20));
    }

    #[test]
    fn test_session_mut_and_into_session() {
        let mut state = SessionState::new(vec![1]);
        state.session_mut().push(2);
        assert_eq!(state.into_session(), vec![1, 2]);
    }
}
