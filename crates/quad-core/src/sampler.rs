use crate::hal::EncoderSource;

/// Periodically sums both encoders into one virtual axis and reports motion.
#[derive(Debug, Clone)]
pub struct Sampler {
    combined: i64,
    last_sample_ms: u32,
    interval_ms: u32,
}

impl Sampler {
    pub fn new(interval_ms: u32) -> Self {
        Self {
            combined: 0,
            last_sample_ms: 0,
            interval_ms,
        }
    }

    /// True once `interval_ms` has strictly elapsed, or the clock has wrapped
    /// behind the last sample.
    pub fn is_due(&self, now_ms: u32) -> bool {
        // Saturating: near the top of the range we wait for the wrap instead.
        now_ms > self.last_sample_ms.saturating_add(self.interval_ms)
            || now_ms < self.last_sample_ms
    }

    /// Take a sample if one is due and return the signed change in combined position.
    pub fn poll<A, B>(&mut self, now_ms: u32, first: &A, second: &B) -> Option<i64>
    where
        A: EncoderSource + ?Sized,
        B: EncoderSource + ?Sized,
    {
        if !self.is_due(now_ms) {
            return None;
        }
        // The two reads are not atomic with respect to each other.
        let combined = first.ticks().wrapping_add(second.ticks());
        let delta = combined.wrapping_sub(self.combined);
        self.combined = combined;
        self.last_sample_ms = now_ms;
        Some(delta)
    }

    pub fn combined_position(&self) -> i64 {
        self.combined
    }

    pub fn last_sample_ms(&self) -> u32 {
        self.last_sample_ms
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }
}
