//! In-memory emitter for tests/dev.

use std::sync::Mutex;

use tracing::debug;

use crate::emitter::{EmitError, EventEmitter};
use crate::event::{DomainEvent, EventName};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum FailureMode {
    #[default]
    Never,
    Next,
    Always,
}

#[derive(Debug, Default)]
struct State {
    events: Vec<DomainEvent>,
    failure: FailureMode,
    closed: bool,
}

/// Emitter that keeps accepted events in memory.
///
/// - No IO
/// - Failure injection (`fail_next`, `fail_always`) for exercising rollback paths
/// - Rejected events are never recorded
#[derive(Debug, Default)]
pub struct RecordingEmitter {
    state: Mutex<State>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject exactly the next `send_event` call.
    pub fn fail_next(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.failure = FailureMode::Next;
        }
    }

    /// Reject every `send_event` call until turned off again.
    pub fn fail_always(&self, enabled: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.failure = if enabled {
                FailureMode::Always
            } else {
                FailureMode::Never
            };
        }
    }

    /// Snapshot of all accepted events, in publish order.
    pub fn events(&self) -> Vec<DomainEvent> {
        self.state
            .lock()
            .map(|s| s.events.clone())
            .unwrap_or_default()
    }

    pub fn events_named(&self, name: EventName) -> Vec<DomainEvent> {
        self.events().into_iter().filter(|e| e.name == name).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().map(|s| s.closed).unwrap_or(true)
    }
}

impl EventEmitter for RecordingEmitter {
    fn send_event(&self, name: EventName, payload: &[u8]) -> Result<(), EmitError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| EmitError::Connection("lock poisoned".to_string()))?;

        if state.closed {
            return Err(EmitError::Closed);
        }

        match state.failure {
            FailureMode::Never => {}
            FailureMode::Next => {
                state.failure = FailureMode::Never;
                return Err(EmitError::Rejected("injected failure".to_string()));
            }
            FailureMode::Always => {
                return Err(EmitError::Rejected("injected failure".to_string()));
            }
        }

        debug!(event_name = %name, data = %String::from_utf8_lossy(payload), "Sending event");
        state.events.push(DomainEvent::new(name, payload));
        Ok(())
    }

    fn close(&self) -> Result<(), EmitError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| EmitError::Connection("lock poisoned".to_string()))?;
        state.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_accepted_events_in_order() {
        let emitter = RecordingEmitter::new();
        emitter.send_event(EventName::CompanyCreated, b"{\"id\":1}").unwrap();
        emitter.send_event(EventName::CompanyDeleted, b"{\"id\":1}").unwrap();

        let names: Vec<_> = emitter.events().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec![EventName::CompanyCreated, EventName::CompanyDeleted]);
    }

    #[test]
    fn fail_next_rejects_once() {
        let emitter = RecordingEmitter::new();
        emitter.fail_next();

        assert!(matches!(
            emitter.send_event(EventName::CompanyUpdated, b"{}"),
            Err(EmitError::Rejected(_))
        ));
        assert!(emitter.events().is_empty());

        emitter.send_event(EventName::CompanyUpdated, b"{}").unwrap();
        assert_eq!(emitter.events_named(EventName::CompanyUpdated).len(), 1);
    }

    #[test]
    fn fail_always_until_disabled() {
        let emitter = RecordingEmitter::new();
        emitter.fail_always(true);
        assert!(emitter.send_event(EventName::CompanyCreated, b"{}").is_err());
        assert!(emitter.send_event(EventName::CompanyCreated, b"{}").is_err());

        emitter.fail_always(false);
        assert!(emitter.send_event(EventName::CompanyCreated, b"{}").is_ok());
    }

    #[test]
    fn closed_emitter_rejects_sends() {
        let emitter = RecordingEmitter::new();
        emitter.close().unwrap();
        assert!(emitter.is_closed());
        assert_eq!(
            emitter.send_event(EventName::CompanyCreated, b"{}"),
            Err(EmitError::Closed)
        );
    }
}
