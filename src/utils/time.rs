//! Conversions of tracked seconds into the strings shown to the user.

const SECONDS_IN_HOUR: u64 = 3600;
const SECONDS_IN_MINUTE: u64 = 60;

/// `HH:MM:SS`. Hours keep growing past 24.
pub fn format_clock(seconds: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        seconds / SECONDS_IN_HOUR,
        (seconds % SECONDS_IN_HOUR) / SECONDS_IN_MINUTE,
        seconds % SECONDS_IN_MINUTE
    )
}

/// `HH:MM`, used by the small overlay readout.
pub fn format_compact(seconds: u64) -> String {
    format!(
        "{:02}:{:02}",
        seconds / SECONDS_IN_HOUR,
        (seconds % SECONDS_IN_HOUR) / SECONDS_IN_MINUTE
    )
}

/// Human summary such as `2h 5m` or `42m`. Seconds are dropped.
pub fn format_summary(seconds: u64) -> String {
    let hours = seconds / SECONDS_IN_HOUR;
    let minutes = (seconds % SECONDS_IN_HOUR) / SECONDS_IN_MINUTE;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

#[cfg(test)]
mod tests {
    use super::{format_clock, format_compact, format_summary};

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0), "00:00:00");
        assert_eq!(format_clock(65), "00:01:05");
        assert_eq!(format_clock(3600 * 26 + 61), "26:01:01");
    }

    #[test]
    fn test_format_compact_drops_seconds() {
        assert_eq!(format_compact(59), "00:00");
        assert_eq!(format_compact(3600 + 120 + 30), "01:02");
    }

    #[test]
    fn test_format_summary() {
        assert_eq!(format_summary(30), "0m");
        assert_eq!(format_summary(42 * 60 + 10), "42m");
        assert_eq!(format_summary(2 * 3600 + 5 * 60), "2h 5m");
        assert_eq!(format_summary(3600), "1h 0m");
    }
}
