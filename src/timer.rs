//! Monotonic timing of a launch.

use std::time::{Duration, Instant};

/// Measures the time from spawn to wait completion.
///
/// Uses the monotonic clock, so wall-clock adjustments do not affect it.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start timing now.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Time since [`Timer::start`], or `None` if it cannot be determined.
    pub fn elapsed(&self) -> Option<Duration> {
        Instant::now().checked_duration_since(self.start)
    }
}

/// Render an elapsed duration as fractional seconds, e.g. `"1.250 seconds"`.
pub fn format_elapsed(elapsed: Option<Duration>) -> String {
    match elapsed {
        Some(d) => format!("{:.3} seconds", d.as_secs_f64()),
        None => "unknown".to_string(),
    }
}
