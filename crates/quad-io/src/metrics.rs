//! Prometheus metrics for the quadrature bridge.

use prometheus::{Encoder, Gauge, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};
use quad_core::tags;
use std::sync::LazyLock;
use std::thread;
use tiny_http::{Response, Server};

/// Global metrics registry
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Sampling Metrics
// ============================================================================

pub static SAMPLES_TAKEN: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "quadbridge_samples_taken_total",
        "Combined encoder samples taken",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

pub static STEPS_EMITTED: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "quadbridge_steps_emitted_total",
        "Gray-code steps posted to the output channel",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Steps resolved per sample; large buckets mean the output is lagging motion
pub static STEPS_PER_SAMPLE: LazyLock<Histogram> = LazyLock::new(|| {
    let histogram = Histogram::with_opts(
        HistogramOpts::new(
            tags::STEPS_PER_SAMPLE.metric,
            "Absolute combined-position change per sample",
        )
        .buckets(vec![0.0, 1.0, 2.0, 4.0, 8.0, 16.0, 32.0, 64.0, 128.0]),
    )
    .unwrap();
    REGISTRY.register(Box::new(histogram.clone())).unwrap();
    histogram
});

pub static COMBINED_POSITION: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(
        tags::COMBINED_POSITION.metric,
        "Sum of both encoder tick counts at the last sample",
    )
    .unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

pub static GRAY_PHASE: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(tags::GRAY_PHASE.metric, "Current quadrature phase (0-3)").unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Output Metrics
// ============================================================================

pub static STEPS_APPLIED: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "quadbridge_steps_applied_total",
        "Steps applied to the output lines",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

pub static UNKNOWN_EVENTS: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "quadbridge_unknown_events_total",
        "Events dropped because their id named no phase",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

pub static BACKPRESSURE_WAITS: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "quadbridge_backpressure_waits_total",
        "Posts that blocked on a full step channel",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Output line A level (1 = high)
pub static LINE_A: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(tags::OUTPUT_LINE_A.metric, "Output line A level (1=high)").unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Output line B level (1 = high)
pub static LINE_B: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(tags::OUTPUT_LINE_B.metric, "Output line B level (1=high)").unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Metrics HTTP Server
// ============================================================================

/// Start the metrics HTTP server on the given address.
/// Returns a join handle for the server thread.
pub fn serve_metrics(bind_addr: String) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let server = match Server::http(&bind_addr) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Failed to start metrics server on {}: {}", bind_addr, e);
                return;
            }
        };

        tracing::info!("Metrics server listening on http://{}/metrics", bind_addr);

        for request in server.incoming_requests() {
            match request.url() {
                "/metrics" => {
                    let encoder = TextEncoder::new();
                    let mut buffer = Vec::new();

                    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
                        tracing::warn!("Failed to encode metrics: {}", e);
                        let _ = request.respond(
                            Response::from_string("Internal Server Error").with_status_code(500),
                        );
                        continue;
                    }

                    let mut response = Response::from_data(buffer);
                    if let Ok(header) = tiny_http::Header::from_bytes(
                        &b"Content-Type"[..],
                        &b"text/plain; version=0.0.4"[..],
                    ) {
                        response = response.with_header(header);
                    }
                    let _ = request.respond(response);
                }
                "/health" => {
                    let _ = request.respond(Response::from_string("OK"));
                }
                "/ready" => {
                    // Ready once the sampler has fired
                    if SAMPLES_TAKEN.get() > 0 {
                        let _ = request.respond(Response::from_string("Ready"));
                    } else {
                        let _ = request
                            .respond(Response::from_string("Not Ready").with_status_code(503));
                    }
                }
                _ => {
                    let _ =
                        request.respond(Response::from_string("Not Found").with_status_code(404));
                }
            }
        }
    })
}

/// Initialize all metrics (forces lazy initialization)
pub fn init_metrics() {
    let _ = SAMPLES_TAKEN.get();
    let _ = STEPS_EMITTED.get();
    let _ = STEPS_PER_SAMPLE.get_sample_count();
    let _ = COMBINED_POSITION.get();
    let _ = GRAY_PHASE.get();
    let _ = STEPS_APPLIED.get();
    let _ = UNKNOWN_EVENTS.get();
    let _ = BACKPRESSURE_WAITS.get();
    let _ = LINE_A.get();
    let _ = LINE_B.get();
}
