//! Background producer for encoder tick counts.
//!
//! Stands in for the interrupt-driven decoder: each encoder gets its own task
//! on a private runtime that bumps the shared count at a signed rate. The
//! sampling context only ever reads those counts.

use quad_core::EncoderHandle;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FeedProfile {
    /// Ticks per second; negative runs the encoder backwards.
    pub rate_per_sec: i64,
    /// Flip direction on this period, if set.
    pub reverse_every: Option<Duration>,
}

impl FeedProfile {
    pub fn constant(rate_per_sec: i64) -> Self {
        Self {
            rate_per_sec,
            reverse_every: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.rate_per_sec == 0
    }
}

/// Splits a per-second rate into whole ticks per update, carrying the remainder.
#[derive(Debug, Clone)]
struct TickAccumulator {
    rate_per_sec: i64,
    carry_micro: i64,
}

impl TickAccumulator {
    fn new(rate_per_sec: i64) -> Self {
        Self {
            rate_per_sec,
            carry_micro: 0,
        }
    }

    fn reverse(&mut self) {
        self.rate_per_sec = -self.rate_per_sec;
        self.carry_micro = 0;
    }

    fn advance(&mut self, elapsed: Duration) -> i64 {
        let elapsed_us = i64::try_from(elapsed.as_micros()).unwrap_or(i64::MAX);
        self.carry_micro = self
            .carry_micro
            .saturating_add(self.rate_per_sec.saturating_mul(elapsed_us));
        let whole = self.carry_micro / 1_000_000;
        self.carry_micro -= whole * 1_000_000;
        whole
    }
}

pub struct EncoderFeed {
    runtime: Option<Runtime>,
}

impl EncoderFeed {
    /// Start one task per `(handle, profile)` pair, updating every `period`.
    pub fn spawn(
        feeds: Vec<(EncoderHandle, FeedProfile)>,
        period: Duration,
    ) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("encoder-feed")
            .enable_time()
            .build()?;

        for (index, (handle, profile)) in feeds.into_iter().enumerate() {
            if profile.is_idle() {
                debug!(encoder = index, "Encoder feed idle");
                continue;
            }
            info!(
                encoder = index,
                rate_per_sec = profile.rate_per_sec,
                reverse_every_ms = profile.reverse_every.map(|d| d.as_millis() as u64),
                "Starting encoder feed"
            );
            runtime.spawn(run_feed(handle, profile, period));
        }

        Ok(Self {
            runtime: Some(runtime),
        })
    }

    /// Stop all feed tasks. Counts keep their last value.
    pub fn stop(mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_timeout(Duration::from_millis(100));
        }
    }
}

impl Drop for EncoderFeed {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

async fn run_feed(handle: EncoderHandle, profile: FeedProfile, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut acc = TickAccumulator::new(profile.rate_per_sec);
    let mut last = Instant::now();
    let mut last_reverse = last;

    loop {
        ticker.tick().await;
        let now = Instant::now();
        let ticks = acc.advance(now - last);
        last = now;

        // One add per tick, as a decoder interrupt would.
        let unit = ticks.signum();
        for _ in 0..ticks.unsigned_abs() {
            handle.add(unit);
        }

        if let Some(every) = profile.reverse_every {
            if now - last_reverse >= every {
                acc.reverse();
                last_reverse = now;
            }
        }
    }
}
