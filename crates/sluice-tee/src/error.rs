#[derive(derive_more::Display, Debug)]
pub enum Error {
    #[display(fmt = "batch schema does not match the spool's declared schema")]
    SchemaMismatch,
    #[display(fmt = "failed to render buffered rows")]
    Render,
    #[display(fmt = "failed to pipe rendering through pager '{_0}'")]
    Pager(String),
    #[display(fmt = "failed to export buffered rows to '{_0}'")]
    FileExport(String),
    #[display(fmt = "failed to materialize buffered rows into table '{_0}'")]
    Materialize(String),
    #[display(fmt = "no table store available for table materialization")]
    NoTableStore,
    #[display(fmt = "{failed} of {configured} configured side effects failed")]
    SideEffects { failed: usize, configured: usize },
}

impl error_stack::Context for Error {}
