use arrow_schema::SchemaRef;

use crate::TeeSettings;

index_vec::define_index_type! {
    /// The identifier (index) of a step.
    pub struct StepId = u32;

    DISPLAY_FORMAT = "{}";
}

/// A single step in the physical plan.
///
/// Each step corresponds to a specific relational operator. During
/// execution, each step receives a partitioned stream of batches and
/// produces a partitioned stream of batches.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct Step {
    /// The id of this step.
    ///
    /// Equals the index of the step within the plan.
    pub id: StepId,
    /// The kind of step being performed.
    pub kind: StepKind,
    /// Inputs to this step.
    pub inputs: Vec<StepId>,
    /// The schema of batches this step produces.
    pub schema: SchemaRef,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.id, self.kind)
    }
}

/// The kinds of steps that can occur in the physical plan.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Scan the given table.
    Scan { table_name: String },
    /// Narrow and/or reorder the columns of the input.
    ///
    /// The output includes the same rows as the input, with the named
    /// columns in output order.
    Project { columns: Vec<String> },
    /// Buffer the input, run the configured side effects once the input
    /// is drained, then re-emit the buffered rows unchanged.
    Tee { settings: TeeSettings },
}

impl StepKind {
    /// Return true if this step applies a row-preserving transform that can
    /// be fused into a linear transform pipeline.
    ///
    /// Pipeline-breaking steps (and sources) return false and are executed
    /// as their own pipeline.
    pub fn is_transform(&self) -> bool {
        matches!(self, StepKind::Project { .. })
    }

    /// A short label for the step kind, used in messages.
    pub fn label(&self) -> &'static str {
        match self {
            StepKind::Scan { .. } => "scan",
            StepKind::Project { .. } => "project",
            StepKind::Tee { .. } => "tee",
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
