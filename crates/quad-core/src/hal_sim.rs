use crate::hal::{EncoderSource, Level, Line, OutputSink};
use crate::timebase::Clock;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Encoder whose tick count lives in a shared atomic written by an outside producer.
#[derive(Debug, Clone)]
pub struct SharedEncoder {
    ticks: Arc<AtomicI64>,
    fail_init: bool,
    channel: Option<u8>,
}

/// Write side of a [`SharedEncoder`], handed to whatever updates the count.
#[derive(Debug, Clone)]
pub struct EncoderHandle {
    ticks: Arc<AtomicI64>,
}

impl SharedEncoder {
    pub fn new() -> (Self, EncoderHandle) {
        let ticks = Arc::new(AtomicI64::new(0));
        let handle = EncoderHandle {
            ticks: Arc::clone(&ticks),
        };
        (
            Self {
                ticks,
                fail_init: false,
                channel: None,
            },
            handle,
        )
    }

    /// Make `initialize` report failure.
    pub fn failing(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub fn channel(&self) -> Option<u8> {
        self.channel
    }
}

impl EncoderSource for SharedEncoder {
    fn initialize(&mut self, channel: u8) -> bool {
        if self.fail_init {
            return false;
        }
        self.channel = Some(channel);
        true
    }

    fn ticks(&self) -> i64 {
        self.ticks.load(Ordering::Relaxed)
    }
}

impl EncoderHandle {
    pub fn add(&self, delta: i64) {
        self.ticks.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn set(&self, ticks: i64) {
        self.ticks.store(ticks, Ordering::Relaxed);
    }

    pub fn get(&self) -> i64 {
        self.ticks.load(Ordering::Relaxed)
    }
}

/// Clock advanced by hand; clones share the same counter.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU32>,
}

impl ManualClock {
    pub fn new(start_ms: u32) -> Self {
        Self {
            now: Arc::new(AtomicU32::new(start_ms)),
        }
    }

    pub fn set(&self, ms: u32) {
        self.now.store(ms, Ordering::Relaxed);
    }

    /// Advance with wraparound.
    pub fn advance(&self, ms: u32) {
        let _ = self
            .now
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |t| {
                Some(t.wrapping_add(ms))
            });
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u32 {
        self.now.load(Ordering::Relaxed)
    }
}

/// Output sink that remembers every line write, in order.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    writes: Arc<Mutex<Vec<(Line, Level)>>>,
    stalled: Arc<AtomicBool>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<(Line, Level)> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }

    /// While stalled, `set_line` spins; used to hold the consumer in tests.
    pub fn stall(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::Release);
    }
}

impl OutputSink for RecordingSink {
    fn set_line(&mut self, line: Line, level: Level) {
        while self.stalled.load(Ordering::Acquire) {
            std::thread::yield_now();
        }
        if let Ok(mut writes) = self.writes.lock() {
            writes.push((line, level));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_writes_are_visible_to_reader() {
        let (enc, handle) = SharedEncoder::new();
        handle.add(5);
        handle.add(-2);
        assert_eq!(enc.ticks(), 3);
        handle.set(-40);
        assert_eq!(enc.ticks(), -40);
    }

    #[test]
    fn failing_encoder_refuses_init() {
        let (enc, _handle) = SharedEncoder::new();
        let mut enc = enc.failing();
        assert!(!enc.initialize(0));
        assert_eq!(enc.channel(), None);
    }

    #[test]
    fn manual_clock_wraps() {
        let clock = ManualClock::new(u32::MAX - 1);
        clock.advance(3);
        assert_eq!(clock.now_ms(), 1);
    }

    #[test]
    fn recording_sink_keeps_order() {
        let mut sink = RecordingSink::new();
        sink.set_line(Line::B, Level::High);
        sink.set_line(Line::A, Level::High);
        assert_eq!(
            sink.writes(),
            vec![(Line::B, Level::High), (Line::A, Level::High)]
        );
    }
}
