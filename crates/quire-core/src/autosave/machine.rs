//! Pure autosave state machine.
//!
//! [`AutosaveMachine::handle`] takes one [`Event`] and returns the
//! [`Effect`]s the driver must carry out. It owns no timers and performs no
//! I/O, so every transition can be tested synchronously.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persistence status of the session's content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SaveStatus {
    /// Everything is persisted.
    #[default]
    Saved,
    /// Changes are waiting for the next save.
    Unsaved,
    /// A persistence call is in flight.
    Saving,
}

impl std::fmt::Display for SaveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Saved => f.write_str("SAVED"),
            Self::Unsaved => f.write_str("UNSAVED"),
            Self::Saving => f.write_str("SAVING"),
        }
    }
}

/// Observable save state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveState {
    /// Current status.
    pub status: SaveStatus,
    /// When the last successful save completed.
    pub last_saved_at: Option<DateTime<Utc>>,
    /// A change arrived while a save was in flight.
    pub pending_retry: bool,
    /// Message from the most recent failed save, cleared on success.
    pub last_error: Option<String>,
    /// Identifier assigned by the store, once known.
    pub article_id: Option<String>,
    /// Version of the last stored snapshot.
    pub version: u64,
}

impl SaveState {
    /// Whether there are changes not yet persisted.
    pub fn has_unsaved_changes(&self) -> bool {
        self.status != SaveStatus::Saved || self.pending_retry
    }
}

/// Inputs to the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Content, title, tags, status or metadata changed.
    Mutated,
    /// The debounce interval passed with no further mutation.
    DebounceElapsed,
    /// The host asked to save right now.
    SaveNow,
    /// The in-flight persistence call succeeded.
    PersistSucceeded {
        /// Identifier returned by a create, if that is what ran.
        created_id: Option<String>,
        /// Version assigned by the store.
        version: u64,
        /// Completion time.
        at: DateTime<Utc>,
    },
    /// The in-flight persistence call failed or timed out.
    PersistFailed {
        /// Human-readable cause.
        error: String,
    },
}

/// Work the driver must do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Start the debounce timer, replacing any pending one.
    ScheduleDebounce,
    /// Cancel any pending debounce timer.
    CancelDebounce,
    /// Snapshot canonical content and start a persistence call.
    Persist,
}

/// The autosave transition function plus its state.
#[derive(Debug, Clone, Default)]
pub struct AutosaveMachine {
    state: SaveState,
}

impl AutosaveMachine {
    /// Start in `SAVED` for a freshly loaded article.
    pub fn new(article_id: Option<String>, version: u64) -> Self {
        Self {
            state: SaveState {
                article_id,
                version,
                ..SaveState::default()
            },
        }
    }

    /// Current state.
    pub fn state(&self) -> &SaveState {
        &self.state
    }

    /// Apply one event.
    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        let from = self.state.status;
        let effects = match event {
            Event::Mutated => match self.state.status {
                SaveStatus::Saved | SaveStatus::Unsaved => {
                    self.state.status = SaveStatus::Unsaved;
                    vec![Effect::ScheduleDebounce]
                }
                SaveStatus::Saving => {
                    self.state.pending_retry = true;
                    Vec::new()
                }
            },
            Event::DebounceElapsed => match self.state.status {
                SaveStatus::Unsaved => {
                    self.state.status = SaveStatus::Saving;
                    vec![Effect::Persist]
                }
                // A timer that raced a manual save or a completion.
                SaveStatus::Saved | SaveStatus::Saving => Vec::new(),
            },
            Event::SaveNow => match self.state.status {
                SaveStatus::Saving => {
                    self.state.pending_retry = true;
                    vec![Effect::CancelDebounce]
                }
                SaveStatus::Saved | SaveStatus::Unsaved => {
                    self.state.status = SaveStatus::Saving;
                    vec![Effect::CancelDebounce, Effect::Persist]
                }
            },
            Event::PersistSucceeded {
                created_id,
                version,
                at,
            } => {
                if created_id.is_some() {
                    self.state.article_id = created_id;
                }
                self.state.version = version;
                self.state.last_saved_at = Some(at);
                self.state.last_error = None;
                self.retry_or(SaveStatus::Saved)
            }
            Event::PersistFailed { error } => {
                self.state.last_error = Some(error);
                self.state.pending_retry = false;
                self.state.status = SaveStatus::Unsaved;
                vec![Effect::ScheduleDebounce]
            }
        };

        if from != self.state.status {
            tracing::debug!(from = %from, to = %self.state.status, "Save state changed");
        }
        effects
    }

    /// After a successful save: one more cycle if a change came in while
    /// saving, otherwise settle in `settled`.
    fn retry_or(&mut self, settled: SaveStatus) -> Vec<Effect> {
        if self.state.pending_retry {
            self.state.pending_retry = false;
            self.state.status = SaveStatus::Unsaved;
            vec![Effect::ScheduleDebounce]
        } else {
            self.state.status = settled;
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn succeeded() -> Event {
        Event::PersistSucceeded {
            created_id: None,
            version: 2,
            at: Utc::now(),
        }
    }

    #[test]
    fn test_initial_state() {
        let machine = AutosaveMachine::new(Some("a".into()), 1);
        assert_eq!(machine.state().status, SaveStatus::Saved);
        assert!(!machine.state().has_unsaved_changes());
    }

    #[test]
    fn test_mutation_schedules_debounce() {
        let mut m = AutosaveMachine::default();
        assert_eq!(m.handle(Event::Mutated), vec![Effect::ScheduleDebounce]);
        assert_eq!(m.state().status, SaveStatus::Unsaved);
        assert_eq!(m.handle(Event::Mutated), vec![Effect::ScheduleDebounce]);
        assert_eq!(m.state().status, SaveStatus::Unsaved);
    }

    #[test]
    fn test_debounce_starts_save() {
        let mut m = AutosaveMachine::default();
        m.handle(Event::Mutated);
        assert_eq!(m.handle(Event::DebounceElapsed), vec![Effect::Persist]);
        assert_eq!(m.state().status, SaveStatus::Saving);
    }

    #[test]
    fn test_stale_debounce_ignored() {
        let mut m = AutosaveMachine::default();
        assert!(m.handle(Event::DebounceElapsed).is_empty());
        assert_eq!(m.state().status, SaveStatus::Saved);
    }

    #[test]
    fn test_success_settles() {
        let mut m = AutosaveMachine::default();
        m.handle(Event::Mutated);
        m.handle(Event::DebounceElapsed);
        assert!(m.handle(succeeded()).is_empty());
        assert_eq!(m.state().status, SaveStatus::Saved);
        assert_eq!(m.state().version, 2);
        assert!(m.state().last_saved_at.is_some());
    }

    #[test]
    fn test_mutation_while_saving_sets_pending_retry() {
        let mut m = AutosaveMachine::default();
        m.handle(Event::Mutated);
        m.handle(Event::DebounceElapsed);
        assert!(m.handle(Event::Mutated).is_empty());
        assert!(m.state().pending_retry);
        assert_eq!(m.state().status, SaveStatus::Saving);

        assert_eq!(m.handle(succeeded()), vec![Effect::ScheduleDebounce]);
        assert!(!m.state().pending_retry);
        assert_eq!(m.state().status, SaveStatus::Unsaved);
    }

    #[test]
    fn test_failure_reverts_to_unsaved() {
        let mut m = AutosaveMachine::default();
        m.handle(Event::SaveNow);
        let effects = m.handle(Event::PersistFailed {
            error: "503".into(),
        });
        assert_eq!(effects, vec![Effect::ScheduleDebounce]);
        assert_eq!(m.state().status, SaveStatus::Unsaved);
        assert_eq!(m.state().last_error.as_deref(), Some("503"));

        m.handle(Event::DebounceElapsed);
        m.handle(succeeded());
        assert!(m.state().last_error.is_none());
    }

    #[test]
    fn test_manual_save() {
        let mut m = AutosaveMachine::default();
        m.handle(Event::Mutated);
        assert_eq!(
            m.handle(Event::SaveNow),
            vec![Effect::CancelDebounce, Effect::Persist]
        );
        assert_eq!(m.state().status, SaveStatus::Saving);

        assert_eq!(m.handle(Event::SaveNow), vec![Effect::CancelDebounce]);
        assert!(m.state().pending_retry);
    }

    #[test]
    fn test_create_records_id() {
        let mut m = AutosaveMachine::default();
        m.handle(Event::SaveNow);
        m.handle(Event::PersistSucceeded {
            created_id: Some("article-1".into()),
            version: 1,
            at: Utc::now(),
        });
        assert_eq!(m.state().article_id.as_deref(), Some("article-1"));
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&SaveStatus::Unsaved).unwrap_or_default();
        assert_eq!(json, "\"UNSAVED\"");
    }
}
