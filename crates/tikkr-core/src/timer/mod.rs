mod clock;
mod driver;
mod engine;
mod format;
mod mode;

pub use clock::{Clock, ManualClock, SystemClock};
pub use driver::{command_channel, DriverCommand, DriverHandle, TimerDriver, DEFAULT_TICK_MS};
pub use engine::TimerEngine;
pub use format::format_remaining;
pub use mode::{Mode, TimerSettings};
