pub mod dispatch;
pub mod error;
pub mod event;
pub mod gray;
pub mod hal;
#[cfg(any(test, feature = "simulation"))]
pub mod hal_sim;
pub mod output;
pub mod resolver;
pub mod sampler;
pub mod sync;
pub mod synth;
pub mod tags;
pub mod timebase;

pub use dispatch::{channel, DispatchError, DispatchStats, Publisher, StepSink, Subscriber};
pub use error::SynthError;
pub use event::{StepEvent, UnknownPhase};
pub use gray::{GrayPhase, Sequencer};
pub use hal::{EncoderSource, Level, Line, OutputSink};
#[cfg(any(test, feature = "simulation"))]
pub use hal_sim::{EncoderHandle, ManualClock, RecordingSink, SharedEncoder};
pub use output::{LineAction, OutputLines, OutputMapper, OutputStats};
pub use resolver::{resolve, Direction, Motion};
pub use sampler::Sampler;
pub use sync::{SynthSnapshot, TelemetryExchange};
pub use synth::{CycleReport, SynthConfig, SynthStats, Synthesizer};
pub use timebase::{Clock, TimeBase};
