use crate::dispatch::{DispatchError, StepSink};
use crate::error::SynthError;
use crate::gray::{GrayPhase, Sequencer};
use crate::hal::EncoderSource;
use crate::resolver::{resolve, Motion};
use crate::sampler::Sampler;
use crate::sync::{SynthSnapshot, TelemetryExchange};
use crate::timebase::Clock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info};

#[derive(Clone, Debug)]
pub struct SynthConfig {
    pub sample_interval_ms: u32,
    /// Pause between sampler checks in [`Synthesizer::run`].
    pub poll_interval: Duration,
    pub channel_capacity: usize,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 10,
            poll_interval: Duration::from_millis(1),
            channel_capacity: 32,
        }
    }
}

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct SynthStats {
    pub samples_taken: u64,
    pub steps_emitted: u64,
    pub max_steps_per_sample: u64,
    pub phase: GrayPhase,
}

/// Outcome of one sample that fired.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CycleReport {
    pub delta: i64,
    pub motion: Motion,
}

/// Sampling context: owns the combined position, sample clock and Gray phase.
pub struct Synthesizer<A: EncoderSource, B: EncoderSource, C: Clock> {
    first: A,
    second: B,
    clock: C,
    config: SynthConfig,
    sampler: Sampler,
    sequencer: Sequencer,
    stats: SynthStats,
    exchange: Option<Arc<TelemetryExchange>>,
}

impl<A: EncoderSource, B: EncoderSource, C: Clock> Synthesizer<A, B, C> {
    /// Initialize both encoders on channels 0 and 1. Any failure is final.
    pub fn start(
        mut first: A,
        mut second: B,
        clock: C,
        config: SynthConfig,
    ) -> Result<Self, SynthError> {
        init_encoder(&mut first, 0)?;
        init_encoder(&mut second, 1)?;

        Ok(Self {
            first,
            second,
            clock,
            sampler: Sampler::new(config.sample_interval_ms),
            config,
            sequencer: Sequencer::new(),
            stats: SynthStats::default(),
            exchange: None,
        })
    }

    pub fn with_exchange(mut self, exchange: Arc<TelemetryExchange>) -> Self {
        self.exchange = Some(exchange);
        self
    }

    /// Check the sampler once. When it fires, every step of the resolved
    /// motion is posted to `sink` in order before returning.
    pub fn poll<S: StepSink + ?Sized>(
        &mut self,
        sink: &mut S,
    ) -> Result<Option<CycleReport>, DispatchError> {
        let now_ms = self.clock.now_ms();
        let Some(delta) = self.sampler.poll(now_ms, &self.first, &self.second) else {
            return Ok(None);
        };
        self.stats.samples_taken += 1;

        let motion = resolve(delta);
        if !motion.is_still() {
            debug!(
                delta,
                direction = ?motion.direction,
                steps = motion.steps,
                from_phase = self.sequencer.phase().index(),
                "Emitting steps"
            );
        }

        let result = self.emit(motion, sink);
        self.stats.phase = self.sequencer.phase();
        self.publish(now_ms, delta);
        result?;

        Ok(Some(CycleReport { delta, motion }))
    }

    fn emit<S: StepSink + ?Sized>(
        &mut self,
        motion: Motion,
        sink: &mut S,
    ) -> Result<(), DispatchError> {
        let mut emitted = 0u64;
        let mut outcome = Ok(());
        for event in self.sequencer.walk(motion) {
            if let Err(err) = sink.post(event) {
                outcome = Err(err);
                break;
            }
            emitted += 1;
        }
        self.stats.steps_emitted += emitted;
        self.stats.max_steps_per_sample = self.stats.max_steps_per_sample.max(emitted);
        outcome
    }

    fn publish(&self, now_ms: u32, delta: i64) {
        if let Some(exchange) = &self.exchange {
            exchange.publish_synth(SynthSnapshot {
                timestamp_ms: now_ms,
                samples_taken: self.stats.samples_taken,
                combined_position: self.sampler.combined_position(),
                last_delta: delta,
                phase: self.stats.phase,
                steps_emitted: self.stats.steps_emitted,
            });
        }
    }

    /// Poll until `stop` is raised or the consumer disappears.
    pub fn run<S: StepSink + ?Sized>(
        &mut self,
        sink: &mut S,
        stop: &AtomicBool,
    ) -> Result<(), SynthError> {
        self.run_with(sink, stop, |_| {})
    }

    /// As [`Synthesizer::run`], calling `on_sample` in the sampling context
    /// once for every sample that fired.
    pub fn run_with<S, F>(
        &mut self,
        sink: &mut S,
        stop: &AtomicBool,
        mut on_sample: F,
    ) -> Result<(), SynthError>
    where
        S: StepSink + ?Sized,
        F: FnMut(&CycleReport),
    {
        while !stop.load(Ordering::Relaxed) {
            if let Some(report) = self.poll(sink)? {
                on_sample(&report);
            }
            if self.config.poll_interval.is_zero() {
                thread::yield_now();
            } else {
                thread::sleep(self.config.poll_interval);
            }
        }
        Ok(())
    }

    pub fn stats(&self) -> &SynthStats {
        &self.stats
    }

    pub fn phase(&self) -> GrayPhase {
        self.sequencer.phase()
    }

    pub fn combined_position(&self) -> i64 {
        self.sampler.combined_position()
    }
}

fn init_encoder<E: EncoderSource>(encoder: &mut E, channel: u8) -> Result<(), SynthError> {
    if !encoder.initialize(channel) {
        error!(channel, "Encoder initialization failed");
        return Err(SynthError::EncoderInit { channel });
    }
    info!(channel, "Encoder initialization OK");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{channel, DEFAULT_TOPIC};
    use crate::event::StepEvent;
    use crate::hal_sim::{EncoderHandle, ManualClock, RecordingSink, SharedEncoder};
    use crate::output::{LineAction, OutputLines, OutputMapper};
    use crate::resolver::Direction;

    type TestSynth = Synthesizer<SharedEncoder, SharedEncoder, ManualClock>;

    fn synth() -> (TestSynth, EncoderHandle, EncoderHandle, ManualClock) {
        let (a, ha) = SharedEncoder::new();
        let (b, hb) = SharedEncoder::new();
        let clock = ManualClock::new(0);
        let synth = Synthesizer::start(a, b, clock.clone(), SynthConfig::default()).unwrap();
        (synth, ha, hb, clock)
    }

    fn phases(events: &[StepEvent]) -> Vec<u8> {
        events.iter().map(|e| e.phase.index()).collect()
    }

    #[test]
    fn init_failure_names_the_channel() {
        let (a, _ha) = SharedEncoder::new();
        let (b, _hb) = SharedEncoder::new();
        let err = Synthesizer::start(
            a,
            b.failing(),
            ManualClock::new(0),
            SynthConfig::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, SynthError::EncoderInit { channel: 1 }));
        assert_eq!(err.to_string(), "encoder 1 failed to initialize");
    }

    #[test]
    fn nothing_happens_before_interval() {
        let (mut synth, ha, _hb, clock) = synth();
        ha.add(3);
        clock.set(10);
        let mut out: Vec<StepEvent> = Vec::new();
        assert_eq!(synth.poll(&mut out).unwrap(), None);
        assert!(out.is_empty());
    }

    #[test]
    fn combined_motion_up_three() {
        let (mut synth, ha, hb, clock) = synth();
        ha.add(5);
        hb.add(-2);
        clock.set(11);
        let mut out: Vec<StepEvent> = Vec::new();
        let report = synth.poll(&mut out).unwrap().unwrap();
        assert_eq!(report.delta, 3);
        assert_eq!(phases(&out), vec![1, 2, 3]);
        assert!(out.iter().all(|e| e.direction == Direction::Up));
        assert_eq!(synth.phase(), GrayPhase::P3);
        assert_eq!(synth.combined_position(), 3);
    }

    #[test]
    fn down_after_up_and_still_cycle() {
        let (mut synth, ha, _hb, clock) = synth();
        let mut out: Vec<StepEvent> = Vec::new();

        ha.add(1);
        clock.set(11);
        synth.poll(&mut out).unwrap();
        assert_eq!(synth.phase(), GrayPhase::P1);

        out.clear();
        ha.add(-2);
        clock.set(22);
        synth.poll(&mut out).unwrap();
        assert_eq!(phases(&out), vec![0, 3]);
        assert!(out.iter().all(|e| e.direction == Direction::Down));

        out.clear();
        clock.set(33);
        let report = synth.poll(&mut out).unwrap().unwrap();
        assert!(report.motion.is_still());
        assert!(out.is_empty());
        assert_eq!(synth.phase(), GrayPhase::P3);
        assert_eq!(synth.stats().samples_taken, 3);
        assert_eq!(synth.stats().steps_emitted, 3);
    }

    #[test]
    fn wrapped_clock_samples_on_next_check() {
        let (mut synth, ha, _hb, clock) = synth();
        let mut out: Vec<StepEvent> = Vec::new();
        clock.set(u32::MAX - 2);
        synth.poll(&mut out).unwrap().unwrap();

        ha.add(1);
        clock.advance(4);
        assert!(synth.poll(&mut out).unwrap().is_some());
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn closed_channel_stops_emission() {
        let (mut synth, ha, _hb, clock) = synth();
        let (mut tx, rx) = channel(DEFAULT_TOPIC, 2).unwrap();
        drop(rx);
        ha.add(3);
        clock.set(11);
        assert_eq!(synth.poll(&mut tx), Err(DispatchError::Closed));
        assert_eq!(synth.stats().steps_emitted, 0);
        // The walk advanced once before the post was refused.
        assert_eq!(synth.phase(), GrayPhase::P1);
    }

    #[test]
    fn end_to_end_through_channel_and_mapper() {
        let (mut synth, ha, hb, clock) = synth();
        let (mut tx, rx) = channel(DEFAULT_TOPIC, 2).unwrap();
        let sink = RecordingSink::new();
        let mut mapper = OutputMapper::new(sink.clone());

        let consumer = std::thread::spawn(move || {
            let mut actions = Vec::new();
            rx.run(|event| actions.push(mapper.apply(event)));
            (actions, mapper.stats())
        });

        ha.add(3);
        clock.set(11);
        synth.poll(&mut tx).unwrap();
        hb.add(-2);
        clock.set(22);
        synth.poll(&mut tx).unwrap();
        drop(tx);

        let (actions, stats) = consumer.join().unwrap();
        assert_eq!(
            actions,
            vec![
                LineAction::SetB,
                LineAction::SetA,
                LineAction::ClearB,
                LineAction::SetB,
                LineAction::ClearA,
            ]
        );
        assert_eq!(stats.applied, 5);
        assert_eq!(stats.lines, OutputLines::from(GrayPhase::P1));
    }

    #[test]
    fn exchange_sees_latest_sample() {
        let exchange = Arc::new(TelemetryExchange::new());
        let (synth, ha, _hb, clock) = synth();
        let mut synth = synth.with_exchange(Arc::clone(&exchange));
        ha.add(-6);
        clock.set(11);
        synth.poll(&mut Vec::<StepEvent>::new()).unwrap();
        let snap = exchange.read_synth();
        assert_eq!(snap.combined_position, -6);
        assert_eq!(snap.last_delta, -6);
        assert_eq!(snap.steps_emitted, 6);
        assert_eq!(snap.phase, GrayPhase::P2);
        assert_eq!(snap.timestamp_ms, 11);
    }

    #[test]
    fn run_with_reports_every_fired_sample() {
        let (a, ha) = SharedEncoder::new();
        let (b, _hb) = SharedEncoder::new();
        let clock = ManualClock::new(11);
        let config = SynthConfig {
            poll_interval: Duration::ZERO,
            ..SynthConfig::default()
        };
        let mut synth = Synthesizer::start(a, b, clock.clone(), config).unwrap();
        let stop = AtomicBool::new(false);
        let mut reports = Vec::new();
        ha.add(3);

        synth
            .run_with(&mut Vec::<StepEvent>::new(), &stop, |report| {
                reports.push(*report);
                if reports.len() == 20 {
                    stop.store(true, Ordering::Relaxed);
                } else {
                    ha.add(3);
                    clock.advance(11);
                }
            })
            .unwrap();

        assert_eq!(reports.len(), 20);
        assert!(reports.iter().all(|r| r.delta == 3 && r.motion.steps == 3));
        assert_eq!(synth.stats().samples_taken, 20);
        assert_eq!(synth.stats().steps_emitted, 60);
    }

    #[test]
    fn stalled_consumer_holds_the_sampler() {
        let (mut synth, ha, _hb, clock) = synth();
        let (mut tx, rx) = channel(DEFAULT_TOPIC, 1).unwrap();
        let observer = tx.clone();
        let sink = RecordingSink::new();
        sink.stall(true);

        let consumer_sink = sink.clone();
        let consumer = std::thread::spawn(move || {
            let mut mapper = OutputMapper::new(consumer_sink);
            rx.run(|event| {
                mapper.apply(event);
            });
            mapper.stats()
        });

        ha.add(3);
        clock.set(11);
        let producer = std::thread::spawn(move || {
            let report = synth.poll(&mut tx);
            (report, synth.phase())
        });

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while observer.stats().backpressure_waits == 0 {
            assert!(std::time::Instant::now() < deadline, "sampler never blocked");
            std::thread::yield_now();
        }
        assert!(!producer.is_finished());
        assert!(sink.writes().is_empty());

        sink.stall(false);
        let (report, phase) = producer.join().unwrap();
        assert_eq!(report.unwrap().unwrap().motion.steps, 3);
        assert_eq!(phase, GrayPhase::P3);
        drop(observer);

        let stats = consumer.join().unwrap();
        assert_eq!(stats.applied, 3);
        assert_eq!(stats.lines, OutputLines::from(GrayPhase::P3));
        // Both lines driven low on start, then one write per step.
        assert_eq!(sink.writes().len(), 5);
    }

    #[test]
    fn run_stops_on_flag() {
        let (mut synth, _ha, _hb, _clock) = synth();
        let stop = AtomicBool::new(true);
        synth.run(&mut Vec::<StepEvent>::new(), &stop).unwrap();
        assert_eq!(synth.stats().samples_taken, 0);
    }
}
