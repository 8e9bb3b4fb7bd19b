use quad_core::{CycleReport, TelemetryExchange};
use quad_io::metrics::{
    init_metrics, serve_metrics, COMBINED_POSITION, GRAY_PHASE, SAMPLES_TAKEN, STEPS_APPLIED,
    STEPS_EMITTED, STEPS_PER_SAMPLE, UNKNOWN_EVENTS,
};
use std::sync::{atomic::AtomicBool, Arc};
use std::thread;
use std::time::Duration;
use tracing::info;

pub fn init() {
    init_metrics();
}

pub fn start_metrics_server(addr: &Option<String>) -> Option<thread::JoinHandle<()>> {
    addr.as_ref().map(|addr| {
        info!(addr = %addr, "Starting metrics server");
        serve_metrics(addr.clone())
    })
}

/// Runs in the sampling context, once per fired sample.
pub fn record_sample(report: &CycleReport) {
    STEPS_PER_SAMPLE.observe(report.motion.steps as f64);
}

/// Mirror the exchange into Prometheus until `stop` is raised.
pub fn start_metrics_updater(
    exchange: Arc<TelemetryExchange>,
    stop: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut last_samples = 0u64;
        let mut last_emitted = 0u64;
        let mut last_applied = 0u64;
        let mut last_unknown = 0u64;
        while !stop.load(std::sync::atomic::Ordering::Relaxed) {
            let synth = exchange.read_synth();
            COMBINED_POSITION.set(synth.combined_position as f64);
            GRAY_PHASE.set(f64::from(synth.phase.index()));
            if synth.samples_taken > last_samples {
                SAMPLES_TAKEN.inc_by(synth.samples_taken - last_samples);
                last_samples = synth.samples_taken;
            }
            if synth.steps_emitted > last_emitted {
                STEPS_EMITTED.inc_by(synth.steps_emitted - last_emitted);
                last_emitted = synth.steps_emitted;
            }

            let output = exchange.read_output();
            if output.applied > last_applied {
                STEPS_APPLIED.inc_by(output.applied - last_applied);
                last_applied = output.applied;
            }
            if output.unknown_dropped > last_unknown {
                UNKNOWN_EVENTS.inc_by(output.unknown_dropped - last_unknown);
                last_unknown = output.unknown_dropped;
            }

            thread::sleep(Duration::from_millis(200));
        }
    })
}
