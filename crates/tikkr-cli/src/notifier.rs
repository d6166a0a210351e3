//! Completion alerts for the terminal host.

use std::io::Write;

use tikkr_core::{CompletionEvent, CoreError, Mode, NotificationsConfig, Notifier};

pub struct TerminalNotifier {
    config: NotificationsConfig,
}

impl TerminalNotifier {
    pub fn new(config: NotificationsConfig) -> Self {
        Self { config }
    }
}

pub fn message(mode: Mode) -> &'static str {
    match mode {
        Mode::Work => "Work session complete. Time for a break.",
        Mode::ShortBreak => "Short break is over. Back to work.",
        Mode::LongBreak => "Long break is over. Back to work.",
    }
}

impl Notifier for TerminalNotifier {
    fn announce(&mut self, event: &CompletionEvent) -> Result<(), CoreError> {
        if self.config.sound_enabled {
            let mut stderr = std::io::stderr();
            stderr.write_all(b"\x07")?;
            stderr.flush()?;
        }

        if self.config.desktop {
            notify_rust::Notification::new()
                .summary("Tikkr")
                .body(message(event.finished_mode))
                .show()
                .map(|_| ())
                .map_err(|e| CoreError::Custom(format!("desktop notification failed: {e}")))?;
        }
        Ok(())
    }
}
