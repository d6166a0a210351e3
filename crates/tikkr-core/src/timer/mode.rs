use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Work,
    ShortBreak,
    LongBreak,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Work, Mode::ShortBreak, Mode::LongBreak];

    pub fn label(&self) -> &'static str {
        match self {
            Mode::Work => "Work",
            Mode::ShortBreak => "Short Break",
            Mode::LongBreak => "Long Break",
        }
    }

    pub fn is_break(&self) -> bool {
        !matches!(self, Mode::Work)
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Mode {
    type Err = ValidationError;

    /// Accepts the serialized names plus the short CLI aliases.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "work" | "focus" => Ok(Mode::Work),
            "short_break" | "short" | "shortbreak" => Ok(Mode::ShortBreak),
            "long_break" | "long" | "longbreak" => Ok(Mode::LongBreak),
            other => Err(ValidationError::InvalidValue {
                field: "mode".into(),
                message: format!("unknown mode '{other}'"),
            }),
        }
    }
}

/// Durations and auto-start policy read by the engine.
///
/// The engine only reads this at mode-entry points, so edits made while a
/// countdown runs do not touch the in-flight countdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSettings {
    #[serde(default = "default_work_minutes")]
    pub work_minutes: u32,
    #[serde(default = "default_short_break_minutes")]
    pub short_break_minutes: u32,
    #[serde(default = "default_long_break_minutes")]
    pub long_break_minutes: u32,
    #[serde(default = "default_sessions_before_long_break")]
    pub sessions_before_long_break: u32,
    #[serde(default)]
    pub auto_start_breaks: bool,
    #[serde(default)]
    pub auto_start_pomodoros: bool,
}

fn default_work_minutes() -> u32 {
    25
}
fn default_short_break_minutes() -> u32 {
    5
}
fn default_long_break_minutes() -> u32 {
    15
}
fn default_sessions_before_long_break() -> u32 {
    4
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            work_minutes: default_work_minutes(),
            short_break_minutes: default_short_break_minutes(),
            long_break_minutes: default_long_break_minutes(),
            sessions_before_long_break: default_sessions_before_long_break(),
            auto_start_breaks: false,
            auto_start_pomodoros: false,
        }
    }
}

impl TimerSettings {
    /// Reject zero durations and a zero long-break threshold.
    ///
    /// # Errors
    /// Returns the first offending field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let fields = [
            ("work_minutes", self.work_minutes),
            ("short_break_minutes", self.short_break_minutes),
            ("long_break_minutes", self.long_break_minutes),
            ("sessions_before_long_break", self.sessions_before_long_break),
        ];
        for (field, value) in fields {
            if value == 0 {
                return Err(ValidationError::NonPositive { field, value });
            }
        }
        Ok(())
    }

    pub fn minutes_for(&self, mode: Mode) -> u32 {
        match mode {
            Mode::Work => self.work_minutes,
            Mode::ShortBreak => self.short_break_minutes,
            Mode::LongBreak => self.long_break_minutes,
        }
    }

    /// Duration of `mode` in milliseconds.
    pub fn duration_ms(&self, mode: Mode) -> u64 {
        u64::from(self.minutes_for(mode))
            .saturating_mul(60)
            .saturating_mul(1000)
    }

    /// Whether finishing `finished` starts the next countdown on its own.
    pub fn auto_starts_after(&self, finished: Mode) -> bool {
        if finished.is_break() {
            self.auto_start_pomodoros
        } else {
            self.auto_start_breaks
        }
    }

    /// Mode that follows `finished`, given the session count after any
    /// increment for a finished work session.
    pub fn next_mode(&self, finished: Mode, completed_work_sessions: u64) -> Mode {
        match finished {
            Mode::Work => {
                let threshold = u64::from(self.sessions_before_long_break.max(1));
                if completed_work_sessions % threshold == 0 {
                    Mode::LongBreak
                } else {
                    Mode::ShortBreak
                }
            }
            Mode::ShortBreak | Mode::LongBreak => Mode::Work,
        }
    }
}
