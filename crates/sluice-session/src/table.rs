use arrow_array::RecordBatch;
use arrow_schema::SchemaRef;

use crate::Error;

/// Maximum rows per stored batch.
///
/// Larger inputs are sliced on ingest so scans produce multi-batch streams,
/// matching the granularity batches flow through execution at.
pub(crate) const MAX_BATCH_ROWS: usize = 1024;

/// An in-memory table.
pub(crate) struct Table {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl Table {
    pub fn new(schema: SchemaRef) -> Self {
        Self {
            schema,
            batches: Vec::new(),
        }
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Append rows, slicing oversized batches.
    ///
    /// Slicing is zero-copy; the slices share the input's columns.
    pub fn add_batch(&mut self, name: &str, batch: RecordBatch) -> error_stack::Result<(), Error> {
        error_stack::ensure!(
            batch.schema() == self.schema,
            Error::BatchSchema(name.to_owned())
        );
        let mut offset = 0;
        while offset < batch.num_rows() {
            let length = MAX_BATCH_ROWS.min(batch.num_rows() - offset);
            self.batches.push(batch.slice(offset, length));
            offset += length;
        }
        Ok(())
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_testing::int64_batch;

    #[test]
    fn test_oversized_batch_is_sliced() {
        let batch = int64_batch(&[("a", (0..3000).collect())]);
        let mut table = Table::new(batch.schema());
        table.add_batch("t", batch).unwrap();

        assert_eq!(table.batches().len(), 3);
        assert_eq!(table.batches()[0].num_rows(), 1024);
        assert_eq!(table.batches()[2].num_rows(), 952);
        assert_eq!(table.num_rows(), 3000);
    }

    #[test]
    fn test_schema_mismatch_rejected() {
        let mut table = Table::new(int64_batch(&[("a", vec![1])]).schema());
        let result = table.add_batch("t", int64_batch(&[("b", vec![1])]));
        assert!(result.is_err());
        assert_eq!(table.num_rows(), 0);
    }
}
