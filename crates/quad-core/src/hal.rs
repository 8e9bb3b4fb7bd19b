use serde::Serialize;

/// One of the two quadrature output lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Line {
    A,
    B,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn is_high(self) -> bool {
        matches!(self, Level::High)
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

/// Read side of an externally decoded rotary encoder.
///
/// The tick count is updated by a context the core does not control, so
/// `ticks` must never block and may observe a count mid-update.
pub trait EncoderSource: Send {
    /// Bring up the encoder on the given hardware channel. `false` is fatal.
    fn initialize(&mut self, channel: u8) -> bool;
    fn ticks(&self) -> i64;
}

/// Physical output lines toward the readout device. Hot path: keep it cheap.
pub trait OutputSink: Send {
    fn set_line(&mut self, line: Line, level: Level);
}
