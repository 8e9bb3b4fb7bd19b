//! 2-bit Gray-code phase and the sequencer that walks it.
//!
//! The sequencer never jumps: a motion of `n` steps is always emitted as `n`
//! adjacent transitions so downstream consumers see every intermediate phase.

use crate::event::{StepEvent, UnknownPhase};
use crate::resolver::{Direction, Motion};
use serde::Serialize;

/// Quadrature phase. Line encoding (A, B): 0 = 00, 1 = 01, 2 = 11, 3 = 10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(into = "u8")]
pub enum GrayPhase {
    #[default]
    P0,
    P1,
    P2,
    P3,
}

impl GrayPhase {
    pub const ALL: [GrayPhase; 4] = [GrayPhase::P0, GrayPhase::P1, GrayPhase::P2, GrayPhase::P3];

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn next(self) -> Self {
        Self::ALL[usize::from((self.index() + 1) % 4)]
    }

    pub fn prev(self) -> Self {
        Self::ALL[usize::from((self.index() + 3) % 4)]
    }

    pub fn step(self, direction: Direction) -> Self {
        match direction {
            Direction::Up => self.next(),
            Direction::Down => self.prev(),
        }
    }

    /// Levels of lines (A, B) while resting in this phase.
    pub fn lines(self) -> (bool, bool) {
        match self {
            GrayPhase::P0 => (false, false),
            GrayPhase::P1 => (false, true),
            GrayPhase::P2 => (true, true),
            GrayPhase::P3 => (true, false),
        }
    }
}

impl From<GrayPhase> for u8 {
    fn from(phase: GrayPhase) -> Self {
        phase.index()
    }
}

impl TryFrom<i64> for GrayPhase {
    type Error = UnknownPhase;

    fn try_from(id: i64) -> Result<Self, Self::Error> {
        match id {
            0 => Ok(GrayPhase::P0),
            1 => Ok(GrayPhase::P1),
            2 => Ok(GrayPhase::P2),
            3 => Ok(GrayPhase::P3),
            other => Err(UnknownPhase(other)),
        }
    }
}

/// Owner of the current phase. Single writer.
#[derive(Debug, Clone, Default)]
pub struct Sequencer {
    phase: GrayPhase,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(phase: GrayPhase) -> Self {
        Self { phase }
    }

    pub fn phase(&self) -> GrayPhase {
        self.phase
    }

    /// Advance exactly one phase and return the resulting event.
    pub fn step(&mut self, direction: Direction) -> StepEvent {
        self.phase = self.phase.step(direction);
        StepEvent {
            phase: self.phase,
            direction,
        }
    }

    /// Lazily walk `motion.steps` transitions. The phase is updated as each
    /// event is yielded, so stopping early leaves it at the last emitted phase.
    pub fn walk(&mut self, motion: Motion) -> Walk<'_> {
        Walk {
            sequencer: self,
            direction: motion.direction,
            remaining: motion.steps,
        }
    }
}

#[derive(Debug)]
pub struct Walk<'a> {
    sequencer: &'a mut Sequencer,
    direction: Direction,
    remaining: u64,
}

impl Iterator for Walk<'_> {
    type Item = StepEvent;

    fn next(&mut self) -> Option<StepEvent> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(self.sequencer.step(self.direction))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match usize::try_from(self.remaining) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}
