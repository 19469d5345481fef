//! General time utility functions

use chrono;

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

/// Convert a period in seconds into a `std::time::Duration`, or `None` if the
/// period is negative, not finite or too long to be represented.
pub fn seconds_to_std(period_s: f64) -> Option<std::time::Duration> {
    if period_s.is_finite() && period_s >= 0.0 {
        std::time::Duration::try_from_secs_f64(period_s).ok()
    }
    else {
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_duration_to_seconds() {
        assert_eq!(
            duration_to_seconds(chrono::Duration::milliseconds(1500)),
            Some(1.5)
        );
    }

    #[test]
    fn test_seconds_to_std() {
        assert_eq!(
            seconds_to_std(0.25),
            Some(std::time::Duration::from_millis(250))
        );
        assert_eq!(seconds_to_std(-1.0), None);
        assert_eq!(seconds_to_std(f64::NAN), None);
        assert_eq!(seconds_to_std(1e20), None);
        assert!(seconds_to_std(1e9).is_some());
    }
}
