use arrow_array::RecordBatch;
use arrow_schema::SchemaRef;

#[derive(derive_more::Display, Debug)]
pub enum StoreError {
    #[display(fmt = "failed to create table '{_0}'")]
    CreateTable(String),
    #[display(fmt = "failed to append to table '{_0}'")]
    Append(String),
}

impl error_stack::Context for StoreError {}

/// Host-engine boundary for the table-materialization side effect.
///
/// The tee stage does not own a catalog; whatever embeds it provides one
/// through this trait.
pub trait TableStore: Send + Sync {
    /// Create the named table if it does not exist, with the given schema,
    /// and return an appender for bulk-loading rows into it.
    fn create_table_if_absent(
        &self,
        name: &str,
        schema: SchemaRef,
    ) -> error_stack::Result<Box<dyn TableAppender>, StoreError>;
}

/// Bulk appender for one table materialization.
///
/// Rows become visible when the appender is closed; dropping an appender
/// without closing it discards the appended rows.
pub trait TableAppender: Send {
    fn append(&mut self, batch: RecordBatch) -> error_stack::Result<(), StoreError>;

    fn close(self: Box<Self>) -> error_stack::Result<(), StoreError>;
}
