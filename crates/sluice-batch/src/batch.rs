use std::sync::Arc;

use arrow_array::{ArrayRef, RecordBatch};
use arrow_schema::SchemaRef;
use error_stack::{IntoReport, ResultExt};
use itertools::Itertools;

use crate::Error;

/// A batch to be processed by the system.
///
/// Thin wrapper around an Arrow [`RecordBatch`]. Cloning is cheap -- the
/// underlying columns are reference counted, which is what lets the tee
/// stage retain every batch for later replay without deep copies.
#[derive(Clone, PartialEq, Debug)]
pub struct Batch {
    data: RecordBatch,
}

impl Batch {
    pub fn new(data: RecordBatch) -> Self {
        Self { data }
    }

    pub fn num_rows(&self) -> usize {
        self.data.num_rows()
    }

    pub fn is_empty(&self) -> bool {
        self.data.num_rows() == 0
    }

    pub fn schema(&self) -> SchemaRef {
        self.data.schema()
    }

    pub fn data(&self) -> &RecordBatch {
        &self.data
    }

    pub fn into_record_batch(self) -> RecordBatch {
        self.data
    }

    /// Create a batch containing the given subset of columns.
    ///
    /// `indices` refer to columns of this batch, in output order.
    pub fn project(&self, indices: &[usize], schema: SchemaRef) -> error_stack::Result<Batch, Error> {
        let columns: Vec<ArrayRef> = indices
            .iter()
            .map(|index| self.data.column(*index).clone())
            .collect();
        let data = RecordBatch::try_new(schema, columns)
            .into_report()
            .change_context_lazy(|| {
                Error::internal_msg(format!(
                    "failed to project columns [{}]",
                    indices.iter().format(", ")
                ))
            })?;
        Ok(Batch { data })
    }
}

impl From<RecordBatch> for Batch {
    fn from(data: RecordBatch) -> Self {
        Self { data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::Int64Array;
    use arrow_schema::{DataType, Field, Schema};

    fn test_batch() -> Batch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("a", DataType::Int64, true),
            Field::new("b", DataType::Int64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![1, 2, 3])),
                Arc::new(Int64Array::from(vec![4, 5, 6])),
            ],
        )
        .unwrap();
        Batch::new(batch)
    }

    #[test]
    fn test_project_reorders_columns() {
        let batch = test_batch();
        let schema = Arc::new(Schema::new(vec![
            Field::new("b", DataType::Int64, true),
            Field::new("a", DataType::Int64, true),
        ]));
        let projected = batch.project(&[1, 0], schema).unwrap();
        assert_eq!(projected.num_rows(), 3);
        assert_eq!(projected.schema().field(0).name(), "b");
    }

    #[test]
    fn test_empty_batch() {
        let schema = Arc::new(Schema::new(vec![Field::new("a", DataType::Int64, true)]));
        let batch = Batch::new(RecordBatch::new_empty(schema));
        assert!(batch.is_empty());
        assert_eq!(batch.num_rows(), 0);
    }
}
