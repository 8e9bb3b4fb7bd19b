use crate::gray::GrayPhase;
use crate::resolver::Direction;
use serde::Serialize;
use thiserror::Error;

/// One unit of motion: the phase just entered and the direction taken to get there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepEvent {
    pub phase: GrayPhase,
    pub direction: Direction,
}

/// An event id that does not name one of the four phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown event id {0}")]
pub struct UnknownPhase(pub i64);

impl StepEvent {
    pub fn new(phase: GrayPhase, direction: Direction) -> Self {
        Self { phase, direction }
    }

    /// Decode an event arriving as a raw id from outside the typed pipeline.
    pub fn from_raw(id: i64, direction: Direction) -> Result<Self, UnknownPhase> {
        Ok(Self {
            phase: GrayPhase::try_from(id)?,
            direction,
        })
    }
}
