use std::time::{SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

/// A trait for time sources that return a wall-clock timestamp in
/// milliseconds since the Unix epoch.
///
/// This abstraction allows you to plug in a real clock or a mocked time source
/// in tests. Row timestamps, request start times and activity stamps all use
/// the same unit.
///
/// # Example
///
/// ```
/// use synthstream::TimeSource;
///
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn current_millis(&self) -> i64 {
///         1234
///     }
/// }
///
/// let time = FixedTime;
/// assert_eq!(time.current_millis(), 1234);
/// ```
pub trait TimeSource: Send + Sync {
    /// Returns the current time in milliseconds since the Unix epoch.
    fn current_millis(&self) -> i64;
}

/// A monotonic time source aligned to the wall clock at construction.
///
/// The wall-clock offset is read once from `SystemTime::now()`; afterwards the
/// clock only advances by the elapsed time of Tokio's [`Instant`]. Timestamps
/// therefore never go backward when the system clock is adjusted, and they
/// follow Tokio's paused clock in tests.
#[derive(Clone, Debug)]
pub struct MonotonicClock {
    start: Instant,
    epoch_offset: i64, // in milliseconds
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    /// Constructs a clock anchored to the current wall-clock time.
    ///
    /// A system clock set before 1970 anchors the clock at zero.
    pub fn new() -> Self {
        let start = Instant::now();
        let epoch_offset = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default();

        Self {
            start,
            epoch_offset,
        }
    }
}

impl TimeSource for MonotonicClock {
    fn current_millis(&self) -> i64 {
        self.epoch_offset + self.start.elapsed().as_millis() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn follows_the_paused_tokio_clock() {
        let clock = MonotonicClock::new();
        let before = clock.current_millis();
        tokio::time::advance(Duration::from_millis(250)).await;
        assert_eq!(clock.current_millis() - before, 250);
    }

    #[test]
    fn is_anchored_near_the_wall_clock() {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis() as i64;
        let clock = MonotonicClock::new();
        assert!((clock.current_millis() - wall).abs() < 1_000);
    }
}
