//! Periodic wake-ups for the engine.
//!
//! [`TimerDriver`] owns the engine and its completion handler on one tokio
//! task. Commands arrive over an mpsc channel; while the engine runs a single
//! `Interval` wakes the task to call `tick()`. The interval is dropped after
//! every command and completion and only re-armed if the engine is running,
//! so at most one wake-up is ever pending and stop/reset cancel it.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::debug;

use super::clock::{Clock, SystemClock};
use super::engine::TimerEngine;
use super::mode::{Mode, TimerSettings};
use crate::completion::CompletionHandler;
use crate::events::Event;

/// Default wake-up period.
pub const DEFAULT_TICK_MS: u64 = 250;

#[derive(Debug)]
pub enum DriverCommand {
    Start,
    Stop,
    Reset,
    Skip,
    SwitchMode(Mode),
    UpdateSettings(TimerSettings),
    ResetSessions,
    Snapshot(oneshot::Sender<Event>),
    Shutdown,
}

/// Cloneable handle for sending commands to a running driver.
#[derive(Debug, Clone)]
pub struct DriverHandle {
    commands: mpsc::Sender<DriverCommand>,
}

impl DriverHandle {
    /// Queue a command. Returns `false` once the driver has shut down.
    pub async fn send(&self, command: DriverCommand) -> bool {
        self.commands.send(command).await.is_ok()
    }

    /// Ask the driver for a state snapshot.
    pub async fn snapshot(&self) -> Option<Event> {
        let (tx, rx) = oneshot::channel();
        if !self.send(DriverCommand::Snapshot(tx)).await {
            return None;
        }
        rx.await.ok()
    }
}

/// Command channel with the given buffer, for use with [`TimerDriver::run`].
pub fn command_channel(buffer: usize) -> (DriverHandle, mpsc::Receiver<DriverCommand>) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (DriverHandle { commands: tx }, rx)
}

pub struct TimerDriver<H, C: Clock = SystemClock> {
    engine: TimerEngine<C>,
    handler: H,
    tick_period: Duration,
    events: mpsc::UnboundedSender<Event>,
    last_formatted: String,
}

enum Wake {
    Command(Option<DriverCommand>),
    Tick,
}

impl<H, C> TimerDriver<H, C>
where
    H: CompletionHandler,
    C: Clock,
{
    /// Build a driver plus the receiving end of its event stream.
    pub fn new(
        engine: TimerEngine<C>,
        handler: H,
        tick_period: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (events, rx) = mpsc::unbounded_channel();
        let last_formatted = engine.formatted_remaining();
        let driver = Self {
            engine,
            handler,
            tick_period: tick_period.max(Duration::from_millis(1)),
            events,
            last_formatted,
        };
        (driver, rx)
    }

    /// Process commands and wake-ups until `Shutdown` arrives or every
    /// handle is dropped. Hands the engine and handler back at the end.
    pub async fn run(mut self, mut commands: mpsc::Receiver<DriverCommand>) -> (TimerEngine<C>, H) {
        let mut wakeup: Option<Interval> = None;

        loop {
            let wake = tokio::select! {
                cmd = commands.recv() => Wake::Command(cmd),
                _ = next_wakeup(&mut wakeup) => Wake::Tick,
            };

            match wake {
                Wake::Command(None) | Wake::Command(Some(DriverCommand::Shutdown)) => break,
                Wake::Command(Some(DriverCommand::Snapshot(reply))) => {
                    self.engine.refresh();
                    let _ = reply.send(self.engine.snapshot());
                }
                Wake::Command(Some(cmd)) => {
                    self.apply(cmd);
                    wakeup = self.arm();
                }
                Wake::Tick => {
                    if let Some(event) = self.engine.tick(&mut self.handler) {
                        self.emit_completion(event);
                        wakeup = self.arm();
                    }
                    self.emit_tick_if_changed();
                }
            }
        }

        debug!("timer driver stopped");
        (self.engine, self.handler)
    }

    fn apply(&mut self, cmd: DriverCommand) {
        // A deadline that passed since the last wake-up completes first.
        if matches!(
            cmd,
            DriverCommand::Stop | DriverCommand::Reset | DriverCommand::SwitchMode(_)
        ) {
            self.catch_up();
        }

        let event = match cmd {
            DriverCommand::Start => self.engine.start(),
            DriverCommand::Stop => self.engine.stop(),
            DriverCommand::Reset => self.engine.reset(),
            DriverCommand::Skip => {
                let event = self.engine.skip(&mut self.handler);
                self.emit_completion(event);
                None
            }
            DriverCommand::SwitchMode(mode) => self.engine.switch_mode(mode),
            DriverCommand::ResetSessions => self.engine.reset_sessions(),
            DriverCommand::UpdateSettings(settings) => match self.engine.update_settings(settings) {
                Ok(event) => Some(event),
                Err(e) => {
                    tracing::warn!(error = %e, "rejected settings update");
                    None
                }
            },
            DriverCommand::Snapshot(_) | DriverCommand::Shutdown => None,
        };
        if let Some(event) = event {
            self.emit(event);
        }
        self.emit_tick_if_changed();
    }

    fn catch_up(&mut self) {
        if let Some(event) = self.engine.tick(&mut self.handler) {
            self.emit_completion(event);
        }
    }

    /// A fresh interval if the engine is counting down.
    fn arm(&self) -> Option<Interval> {
        if !self.engine.is_running() {
            return None;
        }
        let mut interval = tokio::time::interval_at(
            tokio::time::Instant::now() + self.tick_period,
            self.tick_period,
        );
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Some(interval)
    }

    fn emit(&self, event: Event) {
        // A dropped receiver only means nobody is listening.
        let _ = self.events.send(event);
    }

    /// The completion, followed by `TimerStarted` if the next mode
    /// auto-started.
    fn emit_completion(&self, event: Event) {
        self.emit(event);
        if self.engine.is_running() {
            self.emit_started();
        }
    }

    fn emit_started(&self) {
        self.emit(Event::TimerStarted {
            mode: self.engine.mode(),
            remaining_ms: self.engine.remaining_ms(),
            at: self.engine.clock().wall_time(),
        });
    }

    fn emit_tick_if_changed(&mut self) {
        let formatted = self.engine.formatted_remaining();
        if formatted != self.last_formatted {
            self.emit(Event::TimerTick {
                mode: self.engine.mode(),
                remaining_ms: self.engine.remaining_ms(),
                formatted: formatted.clone(),
            });
            self.last_formatted = formatted;
        }
    }
}

async fn next_wakeup(wakeup: &mut Option<Interval>) {
    match wakeup {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
