use std::borrow::Cow;

#[derive(derive_more::Display, Debug)]
pub enum Error {
    #[display(fmt = "table '{_0}' already exists")]
    TableExists(String),
    #[display(fmt = "no table named '{_0}'")]
    NoSuchTable(String),
    #[display(fmt = "no table function named '{_0}'")]
    NoSuchFunction(String),
    #[display(fmt = "no column named '{_0}' in input")]
    NoSuchColumn(String),
    #[display(fmt = "batch schema does not match table '{_0}'")]
    BatchSchema(String),
    #[display(fmt = "unknown tee option '{_0}'")]
    UnknownOption(String),
    #[display(fmt = "invalid value for tee option '{_0}'")]
    InvalidOptionValue(String),
    #[display(fmt = "tee expects exactly one subquery argument")]
    TeeArguments,
    #[display(fmt = "unsupported query feature: {_0}")]
    Unsupported(Cow<'static, str>),
    #[display(fmt = "expected a single query statement")]
    NotASingleQuery,
    #[display(fmt = "failed to parse query")]
    Parse,
    #[display(fmt = "failed to compile query")]
    Compile,
    #[display(fmt = "failed to execute query")]
    Execute,
    #[display(fmt = "execution failed")]
    ExecutionFailed,
}

impl Error {
    pub(crate) fn unsupported(feature: impl Into<Cow<'static, str>>) -> Self {
        Error::Unsupported(feature.into())
    }
}

impl error_stack::Context for Error {}
