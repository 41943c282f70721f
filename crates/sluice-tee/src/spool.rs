use arrow_array::RecordBatch;
use arrow_schema::SchemaRef;
use parking_lot::Mutex;
use sluice_batch::Batch;

use crate::Error;

/// The shared accumulation buffer of one tee stage.
///
/// An append-only sequence of batches with a declared schema. Appends are
/// safe under concurrent invocation from multiple producer threads; the
/// guard lock is held only for the insertion of a single batch. Batches are
/// never mutated or removed once appended.
///
/// One spool exists per tee pipeline instance per query execution, owned by
/// the pipeline. Readers scan it through independent [`SpoolCursor`]s in
/// append order.
#[derive(Debug)]
pub struct SpoolBuffer {
    schema: SchemaRef,
    batches: Mutex<Vec<Batch>>,
}

/// A scan position over a [`SpoolBuffer`].
///
/// Each consuming context holds its own cursor; cursors do not affect each
/// other or the underlying sequence.
#[derive(Debug, Default)]
pub struct SpoolCursor {
    position: usize,
}

impl SpoolBuffer {
    pub fn new(schema: SchemaRef) -> Self {
        Self {
            schema,
            batches: Mutex::new(Vec::new()),
        }
    }

    /// The declared schema every appended batch must match.
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Append a batch to the end of the sequence.
    ///
    /// Fails fast if the batch's schema does not match the declared schema,
    /// leaving the spool unchanged.
    pub fn append(&self, batch: Batch) -> error_stack::Result<(), Error> {
        error_stack::ensure!(batch.schema() == self.schema, Error::SchemaMismatch);
        self.batches.lock().push(batch);
        Ok(())
    }

    /// Create a cursor positioned at the start of the sequence.
    pub fn cursor(&self) -> SpoolCursor {
        SpoolCursor::default()
    }

    /// Yield the next batch in append order, or `None` at the end.
    pub fn scan(&self, cursor: &mut SpoolCursor) -> Option<Batch> {
        let batches = self.batches.lock();
        let batch = batches.get(cursor.position).cloned();
        if batch.is_some() {
            cursor.position += 1;
        }
        batch
    }

    pub fn num_batches(&self) -> usize {
        self.batches.lock().len()
    }

    pub fn num_rows(&self) -> usize {
        self.batches.lock().iter().map(Batch::num_rows).sum()
    }

    /// Snapshot the buffered contents as record batches.
    ///
    /// An empty spool yields a single empty batch so downstream formatting
    /// still sees the declared columns.
    pub fn record_batches(&self) -> Vec<RecordBatch> {
        let batches = self.batches.lock();
        if batches.is_empty() {
            vec![RecordBatch::new_empty(self.schema.clone())]
        } else {
            batches.iter().map(|batch| batch.data().clone()).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_testing::int64_batch;

    #[test]
    fn test_append_and_scan_in_order() {
        let first = int64_batch(&[("a", vec![1, 2])]);
        let spool = SpoolBuffer::new(first.schema());
        spool.append(Batch::new(first)).unwrap();
        spool
            .append(Batch::new(int64_batch(&[("a", vec![3])])))
            .unwrap();

        let mut cursor = spool.cursor();
        assert_eq!(spool.scan(&mut cursor).unwrap().num_rows(), 2);
        assert_eq!(spool.scan(&mut cursor).unwrap().num_rows(), 1);
        assert!(spool.scan(&mut cursor).is_none());
        assert_eq!(spool.num_rows(), 3);
    }

    #[test]
    fn test_independent_cursors() {
        let batch = int64_batch(&[("a", vec![1])]);
        let spool = SpoolBuffer::new(batch.schema());
        spool.append(Batch::new(batch)).unwrap();

        let mut first = spool.cursor();
        let mut second = spool.cursor();
        assert!(spool.scan(&mut first).is_some());
        assert!(spool.scan(&mut first).is_none());
        // The second cursor is unaffected by the first reaching the end.
        assert!(spool.scan(&mut second).is_some());
    }

    #[test]
    fn test_schema_mismatch_fails_fast() {
        let spool = SpoolBuffer::new(int64_batch(&[("a", vec![1])]).schema());
        let mismatched = Batch::new(int64_batch(&[("b", vec![1])]));
        assert!(spool.append(mismatched).is_err());
        assert_eq!(spool.num_batches(), 0);
    }

    #[test]
    fn test_empty_spool_snapshot_keeps_columns() {
        let schema = int64_batch(&[("a", vec![1])]).schema();
        let spool = SpoolBuffer::new(schema.clone());
        let batches = spool.record_batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].num_rows(), 0);
        assert_eq!(batches[0].schema(), schema);
    }
}
