use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::completion::SinkFailure;
use crate::timer::Mode;

/// Every state change of the engine produces an Event.
/// Hosts print or forward them; the completion sinks see `CompletionEvent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TimerStarted {
        mode: Mode,
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    TimerStopped {
        mode: Mode,
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    TimerReset {
        mode: Mode,
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    ModeSwitched {
        from: Mode,
        to: Mode,
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    /// A countdown reached zero or was skipped. Side effects have already run
    /// when this is returned; `failures` lists the sinks that errored.
    SessionCompleted {
        finished_mode: Mode,
        next_mode: Mode,
        completed_work_sessions: u64,
        skipped: bool,
        auto_started: bool,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        failures: Vec<SinkFailure>,
        at: DateTime<Utc>,
    },
    /// Emitted by the driver whenever the displayed time changes.
    TimerTick {
        mode: Mode,
        remaining_ms: u64,
        formatted: String,
    },
    SettingsUpdated {
        applied_now: bool,
        at: DateTime<Utc>,
    },
    SessionsReset {
        at: DateTime<Utc>,
    },
    StateSnapshot {
        mode: Mode,
        running: bool,
        remaining_ms: u64,
        formatted: String,
        total_ms: u64,
        progress: f64,
        completed_work_sessions: u64,
        at: DateTime<Utc>,
    },
}

/// The instant a countdown finished, handed to the completion sinks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub finished_mode: Mode,
    pub occurred_at: DateTime<Utc>,
    /// Full length of the finished countdown.
    pub duration_ms: u64,
    /// Work-session count including this completion.
    pub completed_work_sessions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged_snake_case() {
        let ev = Event::TimerTick {
            mode: Mode::Work,
            remaining_ms: 1000,
            formatted: "00:01".into(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "timer_tick");
        assert_eq!(json["mode"], "work");
    }

    #[test]
    fn completion_omits_empty_failures() {
        let ev = Event::SessionCompleted {
            finished_mode: Mode::Work,
            next_mode: Mode::ShortBreak,
            completed_work_sessions: 1,
            skipped: false,
            auto_started: false,
            failures: Vec::new(),
            at: Utc::now(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert!(json.get("failures").is_none());
        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back, ev);
    }
}
