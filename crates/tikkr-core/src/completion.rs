//! Completion side effects.
//!
//! When a countdown finishes the engine hands a [`CompletionEvent`] to a
//! [`CompletionHandler`]. [`CompletionDispatcher`] is the standard handler: it
//! records work sessions in a [`HistorySink`], bumps the active task through
//! the [`TaskPort`] and finally calls the [`Notifier`]. Each step runs even if
//! an earlier one failed.

use std::sync::{Arc, Mutex};

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::events::CompletionEvent;
use crate::timer::{format_remaining, Mode};

/// One row of the completed-session log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// RFC 3339 instant of completion.
    pub store_time: String,
    /// Local calendar date, `YYYY-MM-DD`.
    pub date: String,
    /// Session length label, e.g. `25:00`.
    pub time: String,
    pub session_type: String,
    pub task_title: String,
}

impl HistoryEntry {
    pub fn for_work_session(event: &CompletionEvent, task_title: Option<&str>) -> Self {
        Self {
            store_time: event.occurred_at.to_rfc3339(),
            date: event
                .occurred_at
                .with_timezone(&Local)
                .format("%Y-%m-%d")
                .to_string(),
            time: format_remaining(event.duration_ms),
            session_type: Mode::Work.label().to_string(),
            task_title: task_title.unwrap_or_default().to_string(),
        }
    }
}

/// The task currently in focus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveTask {
    pub id: String,
    pub title: String,
}

pub trait HistorySink {
    fn append(&mut self, entry: &HistoryEntry) -> Result<()>;
}

pub trait TaskPort {
    fn active_task(&self) -> Result<Option<ActiveTask>>;
    fn increment_completed_sessions(&mut self, task_id: &str) -> Result<()>;
}

pub trait Notifier {
    fn announce(&mut self, event: &CompletionEvent) -> Result<()>;
}

impl<T: HistorySink> HistorySink for Arc<Mutex<T>> {
    fn append(&mut self, entry: &HistoryEntry) -> Result<()> {
        self.lock()?.append(entry)
    }
}

impl<T: TaskPort> TaskPort for Arc<Mutex<T>> {
    fn active_task(&self) -> Result<Option<ActiveTask>> {
        self.lock()?.active_task()
    }

    fn increment_completed_sessions(&mut self, task_id: &str) -> Result<()> {
        self.lock()?.increment_completed_sessions(task_id)
    }
}

impl<T: Notifier> Notifier for Arc<Mutex<T>> {
    fn announce(&mut self, event: &CompletionEvent) -> Result<()> {
        self.lock()?.announce(event)
    }
}

/// Which side effect failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    History,
    Task,
    Notifier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkFailure {
    pub sink: SinkKind,
    pub message: String,
}

/// Receives every completion before the next mode becomes visible.
pub trait CompletionHandler {
    /// Run side effects for `event`, returning the sinks that failed.
    fn on_completion(&mut self, event: &CompletionEvent) -> Vec<SinkFailure>;
}

/// Handler for hosts that do not care about side effects.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandler;

impl CompletionHandler for NoopHandler {
    fn on_completion(&mut self, _event: &CompletionEvent) -> Vec<SinkFailure> {
        Vec::new()
    }
}

/// Notifier that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn announce(&mut self, _event: &CompletionEvent) -> Result<()> {
        Ok(())
    }
}

/// Fans a completion out to history, task and notifier, in that order.
pub struct CompletionDispatcher<H, T, N> {
    history: H,
    tasks: T,
    notifier: N,
}

impl<H, T, N> CompletionDispatcher<H, T, N>
where
    H: HistorySink,
    T: TaskPort,
    N: Notifier,
{
    pub fn new(history: H, tasks: T, notifier: N) -> Self {
        Self {
            history,
            tasks,
            notifier,
        }
    }

    pub fn into_parts(self) -> (H, T, N) {
        (self.history, self.tasks, self.notifier)
    }

    fn record_work_session(&mut self, event: &CompletionEvent, failures: &mut Vec<SinkFailure>) {
        let active = match self.tasks.active_task() {
            Ok(active) => active,
            Err(e) => {
                failures.push(failure(SinkKind::Task, &e));
                None
            }
        };

        let title = active.as_ref().map(|t| t.title.as_str());
        let entry = HistoryEntry::for_work_session(event, title);
        if let Err(e) = self.history.append(&entry) {
            failures.push(failure(SinkKind::History, &e));
        }

        if let Some(task) = active {
            if let Err(e) = self.tasks.increment_completed_sessions(&task.id) {
                failures.push(failure(SinkKind::Task, &e));
            }
        }
    }
}

impl<H, T, N> CompletionHandler for CompletionDispatcher<H, T, N>
where
    H: HistorySink,
    T: TaskPort,
    N: Notifier,
{
    fn on_completion(&mut self, event: &CompletionEvent) -> Vec<SinkFailure> {
        let mut failures = Vec::new();

        if event.finished_mode == Mode::Work {
            self.record_work_session(event, &mut failures);
        }

        if let Err(e) = self.notifier.announce(event) {
            failures.push(failure(SinkKind::Notifier, &e));
        }

        failures
    }
}

fn failure(sink: SinkKind, err: &crate::error::CoreError) -> SinkFailure {
    tracing::warn!(?sink, error = %err, "completion side effect failed");
    SinkFailure {
        sink,
        message: err.to_string(),
    }
}
