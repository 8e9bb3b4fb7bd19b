use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Free-running millisecond counter that wraps at `u32::MAX`.
pub trait Clock: Send {
    fn now_ms(&self) -> u32;
}

#[derive(Debug, Clone, Copy)]
pub struct TimeBase {
    start: Instant,
}

impl TimeBase {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Monotonic microseconds since start.
    pub fn now_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    /// Wall-clock microseconds since Unix epoch (for cross-process logs only).
    pub fn unix_us(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_micros() as u64
    }
}

impl Default for TimeBase {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TimeBase {
    // Truncation is the wraparound: the counter rolls over every ~49.7 days.
    fn now_ms(&self) -> u32 {
        self.start.elapsed().as_millis() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millisecond_counter_starts_near_zero() {
        let tb = TimeBase::new();
        assert!(tb.now_ms() < 1_000);
        assert!(tb.now_us() < 1_000_000);
    }
}
