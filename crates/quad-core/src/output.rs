//! Maps step events onto the two output lines, one line change per step.

use crate::event::StepEvent;
use crate::gray::GrayPhase;
use crate::hal::{Level, Line, OutputSink};
use crate::resolver::Direction;
use serde::Serialize;
use tracing::{trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LineAction {
    SetA,
    ClearA,
    SetB,
    ClearB,
}

impl LineAction {
    /// The single line change that enters `phase` travelling in `direction`.
    pub fn for_step(phase: GrayPhase, direction: Direction) -> Self {
        match (phase, direction) {
            (GrayPhase::P0, Direction::Up) => LineAction::ClearA,
            (GrayPhase::P1, Direction::Up) => LineAction::SetB,
            (GrayPhase::P2, Direction::Up) => LineAction::SetA,
            (GrayPhase::P3, Direction::Up) => LineAction::ClearB,
            (GrayPhase::P0, Direction::Down) => LineAction::ClearB,
            (GrayPhase::P1, Direction::Down) => LineAction::ClearA,
            (GrayPhase::P2, Direction::Down) => LineAction::SetB,
            (GrayPhase::P3, Direction::Down) => LineAction::SetA,
        }
    }

    pub fn line(self) -> Line {
        match self {
            LineAction::SetA | LineAction::ClearA => Line::A,
            LineAction::SetB | LineAction::ClearB => Line::B,
        }
    }

    pub fn level(self) -> Level {
        match self {
            LineAction::SetA | LineAction::SetB => Level::High,
            LineAction::ClearA | LineAction::ClearB => Level::Low,
        }
    }
}

/// Last level written to each line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutputLines {
    pub a: bool,
    pub b: bool,
}

impl OutputLines {
    pub fn apply(&mut self, action: LineAction) {
        let high = action.level().is_high();
        match action.line() {
            Line::A => self.a = high,
            Line::B => self.b = high,
        }
    }

    pub fn get(&self, line: Line) -> bool {
        match line {
            Line::A => self.a,
            Line::B => self.b,
        }
    }

    pub fn hamming(&self, other: &OutputLines) -> u8 {
        u8::from(self.a != other.a) + u8::from(self.b != other.b)
    }
}

impl From<GrayPhase> for OutputLines {
    fn from(phase: GrayPhase) -> Self {
        let (a, b) = phase.lines();
        Self { a, b }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutputStats {
    pub applied: u64,
    pub unknown_dropped: u64,
    pub lines: OutputLines,
}

/// Drives an [`OutputSink`] from step events.
#[derive(Debug)]
pub struct OutputMapper<S: OutputSink> {
    sink: S,
    stats: OutputStats,
}

impl<S: OutputSink> OutputMapper<S> {
    /// Takes ownership of the sink and drives both lines low, the rest state of phase 0.
    pub fn new(mut sink: S) -> Self {
        sink.set_line(Line::A, Level::Low);
        sink.set_line(Line::B, Level::Low);
        Self {
            sink,
            stats: OutputStats::default(),
        }
    }

    pub fn apply(&mut self, event: StepEvent) -> LineAction {
        let action = LineAction::for_step(event.phase, event.direction);
        trace!(
            phase = event.phase.index(),
            direction = ?event.direction,
            action = ?action,
            "Applying step"
        );
        self.sink.set_line(action.line(), action.level());
        self.stats.lines.apply(action);
        self.stats.applied += 1;
        action
    }

    /// Entry point for ids that have not been checked yet. Unknown ids are
    /// logged and dropped without touching the lines.
    pub fn apply_raw(&mut self, id: i64, direction: Direction) -> Option<LineAction> {
        match StepEvent::from_raw(id, direction) {
            Ok(event) => Some(self.apply(event)),
            Err(err) => {
                warn!(id, error = %err, "Received unknown event ID, ignoring");
                self.stats.unknown_dropped += 1;
                None
            }
        }
    }

    pub fn lines(&self) -> OutputLines {
        self.stats.lines
    }

    pub fn stats(&self) -> OutputStats {
        self.stats
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gray::Sequencer;
    use crate::hal_sim::RecordingSink;
    use crate::resolver::resolve;

    #[test]
    fn action_table() {
        use Direction::{Down, Up};
        use GrayPhase::*;
        use LineAction::*;
        let expected = [
            (P0, Up, ClearA),
            (P1, Up, SetB),
            (P2, Up, SetA),
            (P3, Up, ClearB),
            (P0, Down, ClearB),
            (P1, Down, ClearA),
            (P2, Down, SetB),
            (P3, Down, SetA),
        ];
        for (phase, dir, action) in expected {
            assert_eq!(LineAction::for_step(phase, dir), action);
        }
    }

    #[test]
    fn new_mapper_drives_both_lines_low() {
        let sink = RecordingSink::new();
        let mapper = OutputMapper::new(sink.clone());
        assert_eq!(
            sink.writes(),
            vec![(Line::A, Level::Low), (Line::B, Level::Low)]
        );
        assert_eq!(mapper.lines(), OutputLines::default());
    }

    #[test]
    fn scenario_up_three_steps() {
        let sink = RecordingSink::new();
        let mut mapper = OutputMapper::new(sink.clone());
        let actions: Vec<_> = [GrayPhase::P1, GrayPhase::P2, GrayPhase::P3]
            .into_iter()
            .map(|p| mapper.apply(StepEvent::new(p, Direction::Up)))
            .collect();
        assert_eq!(
            actions,
            vec![LineAction::SetB, LineAction::SetA, LineAction::ClearB]
        );
        assert_eq!(mapper.lines(), OutputLines::from(GrayPhase::P3));
        assert_eq!(sink.writes().len(), 5);
    }

    #[test]
    fn scenario_down_two_from_phase_one() {
        let sink = RecordingSink::new();
        let mut mapper = OutputMapper::new(sink.clone());
        mapper.apply(StepEvent::new(GrayPhase::P1, Direction::Up));
        let mut sequencer = Sequencer::starting_at(GrayPhase::P1);

        let mut previous = mapper.lines();
        let mut actions = Vec::new();
        for event in sequencer.walk(resolve(-2)) {
            actions.push(mapper.apply(event));
            assert_eq!(mapper.lines().hamming(&previous), 1);
            assert_eq!(mapper.lines(), OutputLines::from(event.phase));
            previous = mapper.lines();
        }

        assert_eq!(actions, vec![LineAction::ClearB, LineAction::SetA]);
        assert_eq!(sequencer.phase(), GrayPhase::P3);
        assert_eq!(mapper.lines(), OutputLines::from(GrayPhase::P3));
        assert_eq!(sink.writes().len(), 5);
    }

    #[test]
    fn unknown_id_is_dropped() {
        let sink = RecordingSink::new();
        let mut mapper = OutputMapper::new(sink.clone());
        assert_eq!(mapper.apply_raw(4, Direction::Up), None);
        assert_eq!(mapper.apply_raw(-3, Direction::Down), None);
        assert_eq!(mapper.apply_raw(1, Direction::Up), Some(LineAction::SetB));

        let stats = mapper.stats();
        assert_eq!(stats.unknown_dropped, 2);
        assert_eq!(stats.applied, 1);
        // Two resets plus the one valid step.
        assert_eq!(sink.writes().len(), 3);
    }

    #[test]
    fn back_and_forth_toggles_one_line_each_step() {
        let mut mapper = OutputMapper::new(RecordingSink::new());
        mapper.apply(StepEvent::new(GrayPhase::P1, Direction::Up));
        let before = mapper.lines();
        mapper.apply(StepEvent::new(GrayPhase::P0, Direction::Down));
        assert_eq!(mapper.lines().hamming(&before), 1);
        mapper.apply(StepEvent::new(GrayPhase::P1, Direction::Up));
        assert_eq!(mapper.lines(), before);
    }
}
