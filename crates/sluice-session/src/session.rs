use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arrow_array::RecordBatch;
use arrow_schema::SchemaRef;
use error_stack::ResultExt;
use hashbrown::HashMap;
use sluice_execution::{ExecutionOptions, PlanExecutor};
use sluice_physical::{Plan, StepKind};
use sluice_tee::TableStore;

use crate::binder::Binder;
use crate::store::CatalogStore;
use crate::Error;

/// An embedded sluice engine instance.
pub struct Session {
    store: Arc<CatalogStore>,
    options: ExecutionOptions,
    query_count: AtomicUsize,
}

impl Default for Session {
    fn default() -> Self {
        Self::with_options(ExecutionOptions::default())
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ExecutionOptions) -> Self {
        Self {
            store: Arc::new(CatalogStore::default()),
            options,
            query_count: AtomicUsize::new(0),
        }
    }

    /// Create a table, failing if one with the name exists.
    pub fn create_table(&self, name: &str, schema: SchemaRef) -> error_stack::Result<(), Error> {
        self.store.create_table(name, schema)
    }

    /// Append rows to a table.
    pub fn add_batch(&self, name: &str, batch: RecordBatch) -> error_stack::Result<(), Error> {
        self.store.add_batch(name, batch)
    }

    /// The number of rows in a table, if it exists.
    pub fn table_row_count(&self, name: &str) -> Option<usize> {
        self.store.num_rows(name)
    }

    /// Snapshot a table's contents, if it exists.
    pub fn table_batches(&self, name: &str) -> Option<Vec<RecordBatch>> {
        self.store.batches(name)
    }

    /// Execute a query, returning the output batches.
    ///
    /// The text first passes through the tee preprocessor, then is parsed,
    /// bound against the catalog and executed on the worker pool. Binding
    /// failures surface before execution starts; side-effect failures
    /// surface after the output rows have been produced.
    pub fn execute(&self, query: &str) -> error_stack::Result<Vec<RecordBatch>, Error> {
        let query_id = format!("query-{}", self.query_count.fetch_add(1, Ordering::Relaxed));
        tracing::info!(%query_id, "Executing {query:?}");

        let preprocessed = sluice_syntax::preprocess(query);
        let statements =
            sluice_syntax::parse_statements(&preprocessed).change_context(Error::Parse)?;
        let [statement] = statements.as_slice() else {
            error_stack::bail!(Error::NotASingleQuery);
        };

        let plan = Binder::new(&self.store).bind(statement)?;
        let sources = self.scan_sources(&plan)?;

        let (output_tx, mut output_rx) = tokio::sync::mpsc::unbounded_channel();
        let executor = PlanExecutor::try_new(
            query_id,
            &plan,
            &sources,
            Some(self.store.clone() as Arc<dyn TableStore>),
            output_tx,
            &self.options,
        )
        .change_context(Error::Compile)?;
        executor.execute().change_context(Error::ExecutionFailed)?;

        let mut batches = Vec::new();
        while let Ok(batch) = output_rx.try_recv() {
            batches.push(batch);
        }
        Ok(batches)
    }

    /// Snapshot the batches for every table the plan scans.
    fn scan_sources(
        &self,
        plan: &Plan,
    ) -> error_stack::Result<HashMap<String, Vec<sluice_batch::Batch>>, Error> {
        let mut sources = HashMap::new();
        for step in plan.steps.iter() {
            if let StepKind::Scan { table_name } = &step.kind {
                let batches = self
                    .store
                    .scan_batches(table_name)
                    .ok_or_else(|| error_stack::report!(Error::NoSuchTable(table_name.clone())))?;
                sources.insert(table_name.clone(), batches);
            }
        }
        Ok(sources)
    }
}
