use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Per-project batch counter.
///
/// A project starts at [`Step::ZERO`]. Every ingestion batch tags its items
/// with the project's current step and then advances the counter by exactly
/// one, so the step of an item names the batch that created it.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Step(u64);

impl Step {
    pub const ZERO: Step = Step(0);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// The step that follows this one.
    pub fn next(self) -> Result<Step, TypeError> {
        self.0.checked_add(1).map(Step).ok_or(TypeError::StepOverflow)
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Step({})", self.0)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
