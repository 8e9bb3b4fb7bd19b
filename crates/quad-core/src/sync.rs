use crate::gray::GrayPhase;
use crate::output::OutputStats;
use std::sync::{Mutex, PoisonError};

/// What the sampling context last did, for observers only.
#[derive(Debug, Clone, Copy, Default)]
pub struct SynthSnapshot {
    pub timestamp_ms: u32,
    pub samples_taken: u64,
    pub combined_position: i64,
    pub last_delta: i64,
    pub phase: GrayPhase,
    pub steps_emitted: u64,
}

/// Latest-value slot. Writers replace, readers copy; neither holds the lock
/// longer than one copy of `T`.
struct Latest<T: Copy + Default> {
    slot: Mutex<T>,
}

impl<T: Copy + Default> Latest<T> {
    fn new() -> Self {
        Self {
            slot: Mutex::new(T::default()),
        }
    }

    fn write(&self, value: T) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = value;
    }

    fn read(&self) -> T {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Telemetry hand-off between contexts. Never carries step events.
pub struct TelemetryExchange {
    synth: Latest<SynthSnapshot>,
    output: Latest<OutputStats>,
}

impl TelemetryExchange {
    pub fn new() -> Self {
        Self {
            synth: Latest::new(),
            output: Latest::new(),
        }
    }

    /// Called by the sampling context after every sample.
    pub fn publish_synth(&self, snapshot: SynthSnapshot) {
        self.synth.write(snapshot);
    }

    /// Called by the output context after applying steps.
    pub fn publish_output(&self, stats: OutputStats) {
        self.output.write(stats);
    }

    pub fn read_synth(&self) -> SynthSnapshot {
        self.synth.read()
    }

    pub fn read_output(&self) -> OutputStats {
        self.output.read()
    }
}

impl Default for TelemetryExchange {
    fn default() -> Self {
        Self::new()
    }
}
