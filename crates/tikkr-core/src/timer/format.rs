//! Countdown display formatting.

/// Render a remaining duration as `MM:SS`, or `HH:MM:SS` once it reaches an
/// hour.
///
/// Partial seconds round up, so a countdown only shows `00:00` at expiry.
pub fn format_remaining(remaining_ms: u64) -> String {
    let total_secs = remaining_ms.div_ceil(1000);
    let h = total_secs / 3600;
    let m = (total_secs % 3600) / 60;
    let s = total_secs % 60;

    if h > 0 {
        format!("{h:02}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omits_hours_when_zero() {
        assert_eq!(format_remaining(125_000), "02:05");
        assert_eq!(format_remaining(25 * 60_000), "25:00");
        assert_eq!(format_remaining(0), "00:00");
    }

    #[test]
    fn shows_hours_from_sixty_minutes() {
        assert_eq!(format_remaining(3_600_000), "01:00:00");
        assert_eq!(format_remaining(90 * 60_000 + 5_000), "01:30:05");
        assert_eq!(format_remaining(3_599_000), "59:59");
    }

    #[test]
    fn partial_seconds_round_up() {
        assert_eq!(format_remaining(124_001), "02:05");
        assert_eq!(format_remaining(1), "00:01");
        assert_eq!(format_remaining(999), "00:01");
    }
}
