//! Per-turn iteration bookkeeping. Every orchestrator step is recorded
//! here, even ones that never touched a tool, so the caller can show a
//! full timing trail and detect `maxReached`.

use otui_common::types::IterationStep;

#[derive(Debug, Clone, Default)]
pub struct IterationHistory {
    steps: Vec<IterationStep>,
    max_reached: bool,
}

impl IterationHistory {
    pub fn push(&mut self, step: IterationStep) {
        self.steps.push(step);
    }

    pub fn mark_max_reached(&mut self) {
        self.max_reached = true;
    }

    pub fn max_reached(&self) -> bool {
        self.max_reached
    }

    pub fn steps(&self) -> &[IterationStep] {
        &self.steps
    }

    pub fn into_steps(self) -> Vec<IterationStep> {
        self.steps
    }
}

pub(crate) fn now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
