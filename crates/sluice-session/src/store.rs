use std::sync::Arc;

use arrow_array::RecordBatch;
use arrow_schema::SchemaRef;
use error_stack::ResultExt;
use hashbrown::HashMap;
use parking_lot::RwLock;
use sluice_batch::Batch;
use sluice_tee::{StoreError, TableAppender, TableStore};

use crate::table::Table;
use crate::Error;

/// The session's in-memory catalog.
///
/// Shared between the session (which creates tables and serves scans) and
/// the tee stage's table-materialization side effect, which reaches it
/// through the [`TableStore`] boundary from worker threads.
#[derive(Default)]
pub struct CatalogStore {
    tables: Arc<RwLock<HashMap<String, Table>>>,
}

impl CatalogStore {
    /// Create a table, failing if one with the name exists.
    pub(crate) fn create_table(
        &self,
        name: &str,
        schema: SchemaRef,
    ) -> error_stack::Result<(), Error> {
        let mut tables = self.tables.write();
        error_stack::ensure!(
            !tables.contains_key(name),
            Error::TableExists(name.to_owned())
        );
        tables.insert(name.to_owned(), Table::new(schema));
        Ok(())
    }

    pub(crate) fn add_batch(
        &self,
        name: &str,
        batch: RecordBatch,
    ) -> error_stack::Result<(), Error> {
        let mut tables = self.tables.write();
        let table = tables
            .get_mut(name)
            .ok_or_else(|| error_stack::report!(Error::NoSuchTable(name.to_owned())))?;
        table.add_batch(name, batch)
    }

    pub(crate) fn schema(&self, name: &str) -> Option<SchemaRef> {
        self.tables.read().get(name).map(|t| t.schema().clone())
    }

    /// Snapshot a table's batches for scanning.
    pub(crate) fn scan_batches(&self, name: &str) -> Option<Vec<Batch>> {
        self.tables
            .read()
            .get(name)
            .map(|table| table.batches().iter().cloned().map(Batch::new).collect())
    }

    pub(crate) fn num_rows(&self, name: &str) -> Option<usize> {
        self.tables.read().get(name).map(Table::num_rows)
    }

    pub(crate) fn batches(&self, name: &str) -> Option<Vec<RecordBatch>> {
        self.tables
            .read()
            .get(name)
            .map(|table| table.batches().to_vec())
    }
}

impl TableStore for CatalogStore {
    fn create_table_if_absent(
        &self,
        name: &str,
        schema: SchemaRef,
    ) -> error_stack::Result<Box<dyn TableAppender>, StoreError> {
        let mut tables = self.tables.write();
        tables
            .entry(name.to_owned())
            .or_insert_with(|| Table::new(schema));

        Ok(Box::new(CatalogAppender {
            name: name.to_owned(),
            pending: Vec::new(),
            tables: self.tables.clone(),
        }))
    }
}

/// Appender buffering batches until closed, then bulk-inserting them.
struct CatalogAppender {
    name: String,
    pending: Vec<RecordBatch>,
    tables: Arc<RwLock<HashMap<String, Table>>>,
}

impl TableAppender for CatalogAppender {
    fn append(&mut self, batch: RecordBatch) -> error_stack::Result<(), StoreError> {
        self.pending.push(batch);
        Ok(())
    }

    fn close(self: Box<Self>) -> error_stack::Result<(), StoreError> {
        let Self {
            name,
            pending,
            tables,
        } = *self;
        let mut tables = tables.write();
        let Some(table) = tables.get_mut(&name) else {
            error_stack::bail!(StoreError::Append(name));
        };
        for batch in pending {
            table
                .add_batch(&name, batch)
                .change_context_lazy(|| StoreError::Append(name.clone()))?;
        }
        Ok(())
    }
}
