use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
}

/// Direction plus the number of single steps to walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Motion {
    pub direction: Direction,
    pub steps: u64,
}

impl Motion {
    pub fn is_still(&self) -> bool {
        self.steps == 0
    }
}

/// Negative deltas walk down; zero resolves to `Up` with no steps.
pub fn resolve(delta: i64) -> Motion {
    if delta < 0 {
        Motion {
            direction: Direction::Down,
            steps: delta.unsigned_abs(),
        }
    } else {
        Motion {
            direction: Direction::Up,
            steps: delta as u64,
        }
    }
}
