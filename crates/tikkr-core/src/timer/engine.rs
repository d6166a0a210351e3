//! Pomodoro engine implementation.
//!
//! The engine is a wall-clock-based state machine over three modes. It does
//! not use internal threads - something (usually [`super::TimerDriver`]) has
//! to call `tick()` periodically.
//!
//! ## State Transitions
//!
//! ```text
//! Idle(m) --start--> Running(m) --stop--> Idle(m)
//! Running(m) --tick at 0 / skip--> Idle(next) or Running(next) if auto-start
//! any --switch_mode(t)--> Idle(t)
//! any --reset--> Idle(m), full duration
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(TimerSettings::default())?;
//! engine.start();
//! // In a loop:
//! engine.tick(&mut handler); // Some(Event::SessionCompleted) when a mode ends
//! ```

use tracing::{debug, info};

use super::clock::{Clock, SystemClock};
use super::format::format_remaining;
use super::mode::{Mode, TimerSettings};
use crate::completion::CompletionHandler;
use crate::error::ValidationError;
use crate::events::{CompletionEvent, Event};

/// Core pomodoro engine.
///
/// Remaining time is always derived from the anchor captured at the last
/// start, never decremented per tick, so the wake-up cadence has no effect
/// on accuracy.
#[derive(Debug, Clone)]
pub struct TimerEngine<C: Clock = SystemClock> {
    settings: TimerSettings,
    clock: C,
    mode: Mode,
    running: bool,
    /// Full duration of the current countdown, captured at mode entry.
    total_ms: u64,
    /// Remaining time in milliseconds; exact while idle, as of the last
    /// tick while running.
    remaining_ms: u64,
    /// `(clock ms, remaining ms)` at the last start.
    anchor: Option<(u64, u64)>,
    completed_work_sessions: u64,
}

impl TimerEngine<SystemClock> {
    /// Create an engine in `Idle(Work)` with the full work duration.
    ///
    /// # Errors
    /// Returns an error if any duration or the long-break threshold is zero.
    pub fn new(settings: TimerSettings) -> Result<Self, ValidationError> {
        Self::with_clock(settings, SystemClock::new())
    }
}

impl<C: Clock> TimerEngine<C> {
    /// Same as [`TimerEngine::new`] with an explicit time source.
    ///
    /// # Errors
    /// Returns an error if any duration or the long-break threshold is zero.
    pub fn with_clock(settings: TimerSettings, clock: C) -> Result<Self, ValidationError> {
        settings.validate()?;
        let total_ms = settings.duration_ms(Mode::Work);
        Ok(Self {
            settings,
            clock,
            mode: Mode::Work,
            running: false,
            total_ms,
            remaining_ms: total_ms,
            anchor: None,
            completed_work_sessions: 0,
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn remaining_ms(&self) -> u64 {
        self.remaining_ms
    }

    pub fn formatted_remaining(&self) -> String {
        format_remaining(self.remaining_ms)
    }

    pub fn total_ms(&self) -> u64 {
        self.total_ms
    }

    pub fn completed_work_sessions(&self) -> u64 {
        self.completed_work_sessions
    }

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// 0.0 .. 1.0 progress within the current countdown.
    pub fn progress(&self) -> f64 {
        if self.total_ms == 0 {
            return 0.0;
        }
        1.0 - (self.remaining_ms as f64 / self.total_ms as f64)
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        Event::StateSnapshot {
            mode: self.mode,
            running: self.running,
            remaining_ms: self.remaining_ms,
            formatted: self.formatted_remaining(),
            total_ms: self.total_ms,
            progress: self.progress(),
            completed_work_sessions: self.completed_work_sessions,
            at: self.clock.wall_time(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin or resume the countdown. No-op while running or once the
    /// countdown has hit zero.
    pub fn start(&mut self) -> Option<Event> {
        if self.running || self.remaining_ms == 0 {
            return None;
        }
        self.running = true;
        self.anchor = Some((self.clock.now_ms(), self.remaining_ms));
        debug!(mode = %self.mode, remaining_ms = self.remaining_ms, "timer started");
        Some(Event::TimerStarted {
            mode: self.mode,
            remaining_ms: self.remaining_ms,
            at: self.clock.wall_time(),
        })
    }

    /// Freeze the countdown at the exact elapsed time.
    ///
    /// A countdown that already reached zero keeps running so the next
    /// `tick()` still completes it.
    pub fn stop(&mut self) -> Option<Event> {
        if !self.running {
            return None;
        }
        self.flush_elapsed();
        if self.remaining_ms == 0 {
            return None;
        }
        self.running = false;
        self.anchor = None;
        debug!(mode = %self.mode, remaining_ms = self.remaining_ms, "timer stopped");
        Some(Event::TimerStopped {
            mode: self.mode,
            remaining_ms: self.remaining_ms,
            at: self.clock.wall_time(),
        })
    }

    /// Back to the full duration of the current mode, idle.
    pub fn reset(&mut self) -> Option<Event> {
        self.enter(self.mode);
        debug!(mode = %self.mode, "timer reset");
        Some(Event::TimerReset {
            mode: self.mode,
            remaining_ms: self.remaining_ms,
            at: self.clock.wall_time(),
        })
    }

    /// Jump to `target` with its full duration, idle. The session counter is
    /// left alone.
    pub fn switch_mode(&mut self, target: Mode) -> Option<Event> {
        let from = self.mode;
        self.enter(target);
        debug!(%from, to = %target, "mode switched");
        Some(Event::ModeSwitched {
            from,
            to: target,
            remaining_ms: self.remaining_ms,
            at: self.clock.wall_time(),
        })
    }

    /// Finish the current countdown now, exactly as if it had expired.
    pub fn skip(&mut self, handler: &mut dyn CompletionHandler) -> Event {
        if self.running {
            self.flush_elapsed();
        }
        self.complete(handler, true)
    }

    /// Call periodically. Returns `Some(Event::SessionCompleted)` when the
    /// countdown reaches zero.
    pub fn tick(&mut self, handler: &mut dyn CompletionHandler) -> Option<Event> {
        if !self.running {
            return None;
        }
        self.flush_elapsed();
        if self.remaining_ms == 0 {
            return Some(self.complete(handler, false));
        }
        None
    }

    /// Replace the settings snapshot.
    ///
    /// While idle the current mode is re-entered so the new duration shows
    /// at once. A running countdown keeps its duration; the new values apply
    /// at the next mode entry.
    ///
    /// # Errors
    /// Returns an error, leaving the engine untouched, if the settings are
    /// invalid.
    pub fn update_settings(&mut self, settings: TimerSettings) -> Result<Event, ValidationError> {
        settings.validate()?;
        self.settings = settings;
        let applied_now = !self.running;
        if applied_now {
            self.enter(self.mode);
        }
        debug!(applied_now, "settings updated");
        Ok(Event::SettingsUpdated {
            applied_now,
            at: self.clock.wall_time(),
        })
    }

    /// Zero the completed-session counter.
    pub fn reset_sessions(&mut self) -> Option<Event> {
        self.completed_work_sessions = 0;
        debug!("session counter reset");
        Some(Event::SessionsReset {
            at: self.clock.wall_time(),
        })
    }

    /// Bring `remaining_ms` up to date with the clock without completing.
    /// Reaching zero is left for the next `tick()`.
    pub fn refresh(&mut self) {
        if self.running {
            self.flush_elapsed();
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn flush_elapsed(&mut self) {
        if let Some((anchor_ms, anchor_remaining)) = self.anchor {
            let elapsed = self.clock.now_ms().saturating_sub(anchor_ms);
            self.remaining_ms = anchor_remaining.saturating_sub(elapsed);
        }
    }

    fn enter(&mut self, mode: Mode) {
        self.mode = mode;
        self.running = false;
        self.anchor = None;
        self.total_ms = self.settings.duration_ms(mode);
        self.remaining_ms = self.total_ms;
    }

    /// Shared by expiry and skip so both land in the same state.
    fn complete(&mut self, handler: &mut dyn CompletionHandler, skipped: bool) -> Event {
        let finished = self.mode;
        self.running = false;
        self.anchor = None;

        if finished == Mode::Work {
            self.completed_work_sessions += 1;
        }

        let completion = CompletionEvent {
            finished_mode: finished,
            occurred_at: self.clock.wall_time(),
            duration_ms: self.total_ms,
            completed_work_sessions: self.completed_work_sessions,
        };
        let failures = handler.on_completion(&completion);

        let next = self.settings.next_mode(finished, self.completed_work_sessions);
        self.enter(next);

        let auto_started = self.settings.auto_starts_after(finished) && self.start().is_some();

        info!(
            finished = %finished,
            next = %next,
            sessions = self.completed_work_sessions,
            skipped,
            auto_started,
            "session completed"
        );

        Event::SessionCompleted {
            finished_mode: finished,
            next_mode: next,
            completed_work_sessions: self.completed_work_sessions,
            skipped,
            auto_started,
            failures,
            at: completion.occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{NoopHandler, SinkFailure};
    use crate::timer::ManualClock;

    #[derive(Default)]
    struct Recorder {
        seen: Vec<CompletionEvent>,
    }

    impl CompletionHandler for Recorder {
        fn on_completion(&mut self, event: &CompletionEvent) -> Vec<SinkFailure> {
            self.seen.push(event.clone());
            Vec::new()
        }
    }

    fn settings(work: u32, short: u32, long: u32, n: u32) -> TimerSettings {
        TimerSettings {
            work_minutes: work,
            short_break_minutes: short,
            long_break_minutes: long,
            sessions_before_long_break: n,
            ..TimerSettings::default()
        }
    }

    fn engine(settings: TimerSettings) -> (TimerEngine<ManualClock>, ManualClock) {
        let clock = ManualClock::default();
        let engine = TimerEngine::with_clock(settings, clock.clone()).unwrap();
        (engine, clock)
    }

    /// Start and let the whole current countdown elapse.
    fn run_out(
        engine: &mut TimerEngine<ManualClock>,
        clock: &ManualClock,
        handler: &mut dyn CompletionHandler,
    ) -> Event {
        engine.start();
        clock.advance_ms(engine.remaining_ms());
        engine.tick(handler).expect("countdown should complete")
    }

    #[test]
    fn starts_idle_in_work() {
        let (e, _) = engine(settings(25, 5, 15, 4));
        assert_eq!(e.mode(), Mode::Work);
        assert!(!e.is_running());
        assert_eq!(e.remaining_ms(), 25 * 60_000);
        assert_eq!(e.completed_work_sessions(), 0);
        assert_eq!(e.formatted_remaining(), "25:00");
    }

    #[test]
    fn rejects_invalid_settings() {
        let clock = ManualClock::default();
        assert!(TimerEngine::with_clock(settings(0, 5, 15, 4), clock.clone()).is_err());
        assert!(TimerEngine::with_clock(settings(25, 5, 15, 0), clock).is_err());
    }

    #[test]
    fn start_stop_freezes_elapsed() {
        let (mut e, clock) = engine(settings(25, 5, 15, 4));
        assert!(e.start().is_some());
        assert!(e.start().is_none());
        clock.advance_ms(61_500);
        assert!(e.stop().is_some());
        assert!(e.stop().is_none());
        assert_eq!(e.remaining_ms(), 25 * 60_000 - 61_500);

        // Time passing while stopped is not counted.
        clock.advance_secs(600);
        assert!(e.tick(&mut NoopHandler).is_none());
        assert_eq!(e.remaining_ms(), 25 * 60_000 - 61_500);

        e.start();
        clock.advance_ms(500);
        e.tick(&mut NoopHandler);
        assert_eq!(e.remaining_ms(), 25 * 60_000 - 62_000);
    }

    #[test]
    fn irregular_ticks_do_not_drift() {
        let (mut e, clock) = engine(settings(25, 5, 15, 4));
        e.start();
        for step in [1013, 987, 1500, 2, 3000, 999] {
            clock.advance_ms(step);
            e.tick(&mut NoopHandler);
        }
        assert_eq!(e.remaining_ms(), 25 * 60_000 - 7501);
    }

    #[test]
    fn reset_restores_current_mode_duration() {
        let (mut e, clock) = engine(settings(25, 5, 15, 4));
        e.switch_mode(Mode::ShortBreak);
        e.start();
        clock.advance_secs(30);
        e.tick(&mut NoopHandler);
        e.reset();
        assert_eq!(e.mode(), Mode::ShortBreak);
        assert!(!e.is_running());
        assert_eq!(e.remaining_ms(), 5 * 60_000);
    }

    #[test]
    fn switch_mode_keeps_session_count() {
        let (mut e, clock) = engine(settings(1, 1, 1, 4));
        run_out(&mut e, &clock, &mut NoopHandler);
        assert_eq!(e.completed_work_sessions(), 1);
        e.switch_mode(Mode::LongBreak);
        assert_eq!(e.completed_work_sessions(), 1);
        assert_eq!(e.remaining_ms(), 60_000);
        assert!(!e.is_running());
    }

    #[test]
    fn completion_fires_once() {
        let (mut e, clock) = engine(settings(1, 1, 1, 4));
        let mut rec = Recorder::default();
        e.start();
        clock.advance_secs(90);
        assert!(e.tick(&mut rec).is_some());
        assert!(e.tick(&mut rec).is_none());
        assert!(e.tick(&mut rec).is_none());
        assert_eq!(rec.seen.len(), 1);
        assert_eq!(rec.seen[0].finished_mode, Mode::Work);
        assert_eq!(rec.seen[0].completed_work_sessions, 1);
        assert_eq!(rec.seen[0].duration_ms, 60_000);
    }

    #[test]
    fn fourth_work_session_earns_long_break() {
        let (mut e, clock) = engine(settings(25, 5, 15, 4));
        let mut rec = Recorder::default();
        for n in 1..=4 {
            run_out(&mut e, &clock, &mut rec);
            let expected = if n == 4 { Mode::LongBreak } else { Mode::ShortBreak };
            assert_eq!(e.mode(), expected, "after work session {n}");
            run_out(&mut e, &clock, &mut rec);
            assert_eq!(e.mode(), Mode::Work);
        }
        assert_eq!(e.completed_work_sessions(), 4);
        let work = rec.seen.iter().filter(|c| c.finished_mode == Mode::Work).count();
        assert_eq!(work, 4);
    }

    #[test]
    fn auto_start_breaks_runs_next_mode() {
        let (mut e, clock) = engine(TimerSettings {
            auto_start_breaks: true,
            ..settings(1, 1, 1, 4)
        });
        match run_out(&mut e, &clock, &mut NoopHandler) {
            Event::SessionCompleted { auto_started, next_mode, .. } => {
                assert!(auto_started);
                assert_eq!(next_mode, Mode::ShortBreak);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(e.mode(), Mode::ShortBreak);
        assert!(e.is_running());

        // Break -> Work does not auto-start without auto_start_pomodoros.
        clock.advance_secs(60);
        e.tick(&mut NoopHandler);
        assert_eq!(e.mode(), Mode::Work);
        assert!(!e.is_running());
    }

    #[test]
    fn manual_policy_waits_after_work() {
        let (mut e, clock) = engine(settings(1, 1, 1, 4));
        run_out(&mut e, &clock, &mut NoopHandler);
        assert_eq!(e.mode(), Mode::ShortBreak);
        assert!(!e.is_running());
        assert_eq!(e.remaining_ms(), 60_000);
    }

    #[test]
    fn auto_start_pomodoros_runs_work() {
        let (mut e, clock) = engine(TimerSettings {
            auto_start_pomodoros: true,
            ..settings(1, 1, 1, 4)
        });
        e.switch_mode(Mode::ShortBreak);
        run_out(&mut e, &clock, &mut NoopHandler);
        assert_eq!(e.mode(), Mode::Work);
        assert!(e.is_running());
    }

    #[test]
    fn skip_matches_natural_expiry() {
        let s = TimerSettings {
            auto_start_breaks: true,
            ..settings(25, 5, 15, 2)
        };
        let (mut natural, clock_a) = engine(s.clone());
        let (mut skipped, _clock_b) = engine(s);

        for _ in 0..3 {
            run_out(&mut natural, &clock_a, &mut NoopHandler);
            natural.stop();
            natural.switch_mode(Mode::Work);

            skipped.skip(&mut NoopHandler);
            skipped.stop();
            skipped.switch_mode(Mode::Work);
        }
        run_out(&mut natural, &clock_a, &mut NoopHandler);
        skipped.skip(&mut NoopHandler);

        assert_eq!(natural.mode(), skipped.mode());
        assert_eq!(natural.is_running(), skipped.is_running());
        assert_eq!(natural.remaining_ms(), skipped.remaining_ms());
        assert_eq!(
            natural.completed_work_sessions(),
            skipped.completed_work_sessions()
        );
        assert_eq!(natural.completed_work_sessions(), 4);
        assert_eq!(natural.mode(), Mode::LongBreak);
    }

    #[test]
    fn skip_from_idle_break_goes_to_work() {
        let (mut e, _) = engine(settings(25, 5, 15, 4));
        e.switch_mode(Mode::LongBreak);
        let ev = e.skip(&mut NoopHandler);
        assert!(matches!(
            ev,
            Event::SessionCompleted { finished_mode: Mode::LongBreak, skipped: true, .. }
        ));
        assert_eq!(e.mode(), Mode::Work);
        assert_eq!(e.completed_work_sessions(), 0);
    }

    #[test]
    fn settings_change_waits_for_idle_countdown() {
        let (mut e, clock) = engine(settings(25, 5, 15, 4));
        e.start();
        clock.advance_secs(60);
        let ev = e.update_settings(settings(50, 10, 30, 4)).unwrap();
        assert!(matches!(ev, Event::SettingsUpdated { applied_now: false, .. }));
        e.tick(&mut NoopHandler);
        assert_eq!(e.total_ms(), 25 * 60_000);
        assert_eq!(e.remaining_ms(), 24 * 60_000);

        e.reset();
        assert_eq!(e.remaining_ms(), 50 * 60_000);
    }

    #[test]
    fn settings_change_applies_when_idle() {
        let (mut e, _) = engine(settings(25, 5, 15, 4));
        e.update_settings(settings(40, 5, 15, 4)).unwrap();
        assert_eq!(e.remaining_ms(), 40 * 60_000);
        assert!(e.update_settings(settings(40, 0, 15, 4)).is_err());
        assert_eq!(e.settings().short_break_minutes, 5);
    }

    #[test]
    fn snapshot_reports_state() {
        let (mut e, clock) = engine(settings(25, 5, 15, 4));
        e.start();
        clock.advance_ms(125_000);
        e.tick(&mut NoopHandler);
        match e.snapshot() {
            Event::StateSnapshot {
                mode,
                running,
                remaining_ms,
                formatted,
                ..
            } => {
                assert_eq!(mode, Mode::Work);
                assert!(running);
                assert_eq!(remaining_ms, 25 * 60_000 - 125_000);
                assert_eq!(formatted, "22:55");
            }
            other => panic!("Expected StateSnapshot, got {other:?}"),
        }
    }

    #[test]
    fn progress_tracks_elapsed_fraction() {
        let (mut e, clock) = engine(settings(10, 5, 15, 4));
        assert_eq!(e.progress(), 0.0);
        e.start();
        clock.advance_secs(5 * 60);
        e.tick(&mut NoopHandler);
        assert!((e.progress() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn reset_sessions_zeroes_counter() {
        let (mut e, clock) = engine(settings(1, 1, 1, 4));
        run_out(&mut e, &clock, &mut NoopHandler);
        assert!(matches!(e.reset_sessions(), Some(Event::SessionsReset { .. })));
        assert_eq!(e.completed_work_sessions(), 0);
    }

    #[test]
    fn stop_after_deadline_still_completes_on_next_tick() {
        let (mut e, clock) = engine(settings(25, 5, 15, 4));
        let mut rec = Recorder::default();
        e.start();
        clock.advance_ms(25 * 60_000 + 100);

        assert!(e.stop().is_none());
        assert!(e.is_running());
        assert_eq!(e.remaining_ms(), 0);

        match e.tick(&mut rec) {
            Some(Event::SessionCompleted {
                finished_mode,
                next_mode,
                completed_work_sessions,
                skipped,
                ..
            }) => {
                assert_eq!(finished_mode, Mode::Work);
                assert_eq!(next_mode, Mode::ShortBreak);
                assert_eq!(completed_work_sessions, 1);
                assert!(!skipped);
            }
            other => panic!("Expected SessionCompleted, got {other:?}"),
        }
        assert_eq!(rec.seen.len(), 1);
        assert!(e.tick(&mut rec).is_none());
        assert_eq!(rec.seen.len(), 1);
    }

    #[test]
    fn refresh_catches_up_without_completing() {
        let (mut e, clock) = engine(settings(1, 1, 1, 4));
        e.start();
        clock.advance_ms(20_400);
        e.refresh();
        assert_eq!(e.remaining_ms(), 60_000 - 20_400);

        clock.advance_secs(60);
        e.refresh();
        assert_eq!(e.remaining_ms(), 0);
        assert_eq!(e.mode(), Mode::Work);
        assert!(e.is_running());
        assert!(matches!(
            e.tick(&mut NoopHandler),
            Some(Event::SessionCompleted { .. })
        ));
    }
}
