use crate::metrics::{LINE_A, LINE_B};
use quad_core::{Level, Line, OutputLines, OutputSink};
use tracing::trace;

/// Output sink for hosts without output pins: mirrors each line write into
/// the trace log and the line gauges.
#[derive(Debug, Default)]
pub struct TraceSink {
    lines: OutputLines,
    writes: u64,
}

impl TraceSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> OutputLines {
        self.lines
    }

    pub fn writes(&self) -> u64 {
        self.writes
    }
}

impl OutputSink for TraceSink {
    fn set_line(&mut self, line: Line, level: Level) {
        let high = level.is_high();
        let gauge_value = if high { 1.0 } else { 0.0 };
        match line {
            Line::A => {
                self.lines.a = high;
                LINE_A.set(gauge_value);
            }
            Line::B => {
                self.lines.b = high;
                LINE_B.set(gauge_value);
            }
        }
        self.writes += 1;
        trace!(line = ?line, level = ?level, a = self.lines.a, b = self.lines.b, "Output line set");
    }
}
