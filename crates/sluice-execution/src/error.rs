#[derive(derive_more::Display, Debug)]
pub enum Error {
    #[display(fmt = "error creating executor")]
    Creating,
    #[display(fmt = "error starting workers")]
    Starting,
    #[display(fmt = "error stopping workers")]
    Stopping,
    #[display(fmt = "error feeding source batches")]
    FeedingSource,
    #[display(fmt = "no table named '{table_name}'")]
    NoSuchTable { table_name: String },
}

impl error_stack::Context for Error {}
