use crate::infra::audit::{AuditEventType, AuditLogger};
use crate::runtime::config::RuntimeConfig;
use crate::runtime::logging::init_tracing;
use crate::runtime::telemetry;
use quad_core::dispatch::DEFAULT_TOPIC;
use quad_core::{
    channel, DispatchError, DispatchStats, OutputMapper, OutputSink, OutputStats, SharedEncoder,
    Subscriber, SynthError, SynthStats, Synthesizer, TelemetryExchange, TimeBase,
};
use quad_io::metrics::BACKPRESSURE_WAITS;
use quad_io::{EncoderFeed, FeedProfile, TraceSink};
use std::path::PathBuf;
use std::sync::{atomic::AtomicBool, Arc};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Synth(#[from] SynthError),
    #[error("step channel: {0}")]
    Channel(#[from] DispatchError),
    #[error("audit log {path}: {source}")]
    Audit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("encoder feed: {0}")]
    Feed(#[source] std::io::Error),
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} thread panicked")]
    ThreadPanic(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    pub synth: SynthStats,
    pub dispatch: DispatchStats,
    pub output: OutputStats,
}

pub fn run_from_args() -> Result<(), AppError> {
    let config = RuntimeConfig::from_env();
    if config.show_help {
        RuntimeConfig::print_help();
        return Ok(());
    }
    init_tracing(config.json_logs);
    run(config).map(|_| ())
}

pub fn run(config: RuntimeConfig) -> Result<Option<RunSummary>, AppError> {
    telemetry::init();
    let _metrics_handle = telemetry::start_metrics_server(&config.metrics_addr);

    let timebase = TimeBase::new();
    let audit = init_audit_logger(config.audit_path.as_ref())?;
    let audit_event = |event_type: AuditEventType, details: serde_json::Value| {
        if let Some(logger) = &audit {
            let logged =
                logger.log_event(timebase.now_us(), timebase.unix_us(), event_type, details);
            if let Err(e) = logged {
                warn!(error = %e, "Failed to write audit entry");
            }
        }
    };

    let synth_config = config.synth_config();
    audit_event(
        AuditEventType::SystemStart,
        serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "sample_interval_ms": synth_config.sample_interval_ms,
            "channel_capacity": synth_config.channel_capacity,
        }),
    );

    let (first, first_handle) = SharedEncoder::new();
    let (second, second_handle) = SharedEncoder::new();
    let (first, second) = match config.fail_encoder {
        Some(0) => (first.failing(), second),
        Some(1) => (first, second.failing()),
        None | Some(_) => (first, second),
    };

    let synth = match Synthesizer::start(first, second, timebase, synth_config.clone()) {
        Ok(synth) => synth,
        Err(e) => {
            error!(error = %e, "Refusing to run with an unverified encoder");
            if let SynthError::EncoderInit { channel } = &e {
                audit_event(
                    AuditEventType::EncoderInitFailed,
                    serde_json::json!({ "channel": channel }),
                );
            }
            return Err(e.into());
        }
    };
    audit_event(
        AuditEventType::EncoderInitialized,
        serde_json::json!({ "channels": [0, 1] }),
    );

    let exchange = Arc::new(TelemetryExchange::new());
    let mut synth = synth.with_exchange(Arc::clone(&exchange));
    let (mut publisher, subscriber) = channel(DEFAULT_TOPIC, synth_config.channel_capacity)?;

    let stop = Arc::new(AtomicBool::new(false));
    let _metrics_updater =
        telemetry::start_metrics_updater(Arc::clone(&exchange), Arc::clone(&stop));

    let exchange_output = Arc::clone(&exchange);
    let output_handle = thread::Builder::new()
        .name("quad-output".into())
        .spawn(move || run_output_stage(subscriber, TraceSink::new(), &exchange_output))
        .map_err(|source| AppError::Spawn {
            name: "output",
            source,
        })?;

    let reverse_every = config.reverse_every_ms.map(Duration::from_millis);
    let feed = EncoderFeed::spawn(
        vec![
            (
                first_handle,
                FeedProfile {
                    rate_per_sec: config.enc1_rate,
                    reverse_every,
                },
            ),
            (
                second_handle,
                FeedProfile {
                    rate_per_sec: config.enc2_rate,
                    reverse_every,
                },
            ),
        ],
        Duration::from_millis(config.feed_period_ms),
    )
    .map_err(AppError::Feed)?;

    info!(
        sample_interval_ms = synth_config.sample_interval_ms,
        channel_capacity = synth_config.channel_capacity,
        enc1_rate = config.enc1_rate,
        enc2_rate = config.enc2_rate,
        "Starting sampler"
    );

    let stop_sampler = Arc::clone(&stop);
    let sampler_handle = thread::Builder::new()
        .name("quad-sampler".into())
        .spawn(move || {
            let result =
                synth.run_with(&mut publisher, &stop_sampler, telemetry::record_sample);
            (result, *synth.stats(), publisher.stats())
        })
        .map_err(|source| AppError::Spawn {
            name: "sampler",
            source,
        })?;

    info!("quad-bridge running");

    let Some(seconds) = config.run_seconds else {
        // Runs until the sampler fails; the consumer outliving it is not an exit path.
        let (result, _, _) = sampler_handle
            .join()
            .map_err(|_| AppError::ThreadPanic("sampler"))?;
        result?;
        return Ok(None);
    };

    info!(seconds, "Running for limited duration");
    thread::sleep(Duration::from_secs(seconds));
    stop.store(true, std::sync::atomic::Ordering::Relaxed);

    let (result, synth_stats, dispatch) = sampler_handle
        .join()
        .map_err(|_| AppError::ThreadPanic("sampler"))?;
    feed.stop();
    if let Err(e) = &result {
        error!(error = %e, "Sampler stopped with error");
    }
    audit_event(
        AuditEventType::SamplingStopped,
        serde_json::json!({ "error": result.as_ref().err().map(|e| e.to_string()) }),
    );

    // The publisher went down with the sampler thread, so this drains and ends.
    let output = output_handle
        .join()
        .map_err(|_| AppError::ThreadPanic("output"))?;

    let summary = RunSummary {
        synth: synth_stats,
        dispatch,
        output,
    };
    info!(
        samples_taken = summary.synth.samples_taken,
        steps_emitted = summary.synth.steps_emitted,
        steps_applied = summary.output.applied,
        max_steps_per_sample = summary.synth.max_steps_per_sample,
        backpressure_waits = summary.dispatch.backpressure_waits,
        final_phase = summary.synth.phase.index(),
        "Run complete"
    );
    audit_event(
        AuditEventType::SystemShutdown,
        serde_json::json!({
            "samples_taken": summary.synth.samples_taken,
            "steps_emitted": summary.synth.steps_emitted,
            "steps_applied": summary.output.applied,
            "unknown_dropped": summary.output.unknown_dropped,
            "backpressure_waits": summary.dispatch.backpressure_waits,
            "final_phase": summary.synth.phase,
            "lines": summary.output.lines,
        }),
    );

    result?;
    Ok(Some(summary))
}

/// Dispatch/consumption context: apply every step in arrival order.
fn run_output_stage<S: OutputSink>(
    mut subscriber: Subscriber,
    sink: S,
    exchange: &TelemetryExchange,
) -> OutputStats {
    let mut mapper = OutputMapper::new(sink);
    let mut last_waits = 0u64;
    while let Some(event) = subscriber.recv() {
        mapper.apply(event);
        exchange.publish_output(mapper.stats());

        let waits = subscriber.stats().backpressure_waits;
        if waits > last_waits {
            BACKPRESSURE_WAITS.inc_by(waits - last_waits);
            last_waits = waits;
        }
    }
    info!(topic = subscriber.topic(), "Output stage drained");
    mapper.stats()
}

fn init_audit_logger(audit_path: Option<&PathBuf>) -> Result<Option<AuditLogger>, AppError> {
    let Some(path) = audit_path else {
        return Ok(None);
    };
    match AuditLogger::new(path) {
        Ok(logger) => {
            info!(path = %path.display(), "Audit logging enabled");
            Ok(Some(logger))
        }
        Err(source) => {
            warn!(error = %source, path = %path.display(), "Failed to initialize audit logger");
            Err(AppError::Audit {
                path: path.clone(),
                source,
            })
        }
    }
}
