//! # Tikkr Core Library
//!
//! This library provides the core logic for the Tikkr pomodoro timer. All
//! operations live here; the `tikkr` CLI binary is a thin host over it.
//!
//! ## Architecture
//!
//! - **Timer Engine**: A wall-clock-based state machine over Work, Short
//!   Break and Long Break that requires the caller to periodically invoke
//!   `tick()`
//! - **Driver**: A tokio task that owns the engine and supplies the wake-ups
//! - **Completion**: Side effects for finished sessions (history, task
//!   counter, notification)
//! - **Storage**: SQLite history/task storage and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core timer state machine
//! - [`TimerDriver`]: Periodic tick scheduling and command handling
//! - [`CompletionDispatcher`]: Fans a completion out to the sinks
//! - [`Database`]: History and task persistence
//! - [`Config`]: Application configuration management

pub mod completion;
pub mod error;
pub mod events;
pub mod storage;
pub mod timer;

pub use completion::{
    ActiveTask, CompletionDispatcher, CompletionHandler, HistoryEntry, HistorySink, NoopHandler,
    Notifier, SilentNotifier, SinkFailure, SinkKind, TaskPort,
};
pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use events::{CompletionEvent, Event};
pub use storage::{Config, Database, HistoryStats, NotificationsConfig, TaskRecord};
pub use timer::{
    format_remaining, Clock, DriverCommand, DriverHandle, ManualClock, Mode, SystemClock,
    TimerDriver, TimerEngine, TimerSettings,
};
