use index_vec::IndexVec;

use crate::{Step, StepId};

/// A plan is a directed, acyclic graph of steps.
///
/// The plan is represented as an array of steps, with each step referencing
/// its inputs by index. The array is topologically sorted so that all inputs
/// have indices less than the step that references them.
#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct Plan {
    /// The steps in the plan.
    pub steps: IndexVec<StepId, Step>,
}

impl Plan {
    /// The id of the step producing the query output.
    pub fn last_step_id(&self) -> StepId {
        debug_assert!(!self.steps.is_empty(), "plan should have at least one step");
        self.steps.last_idx()
    }
}
