#[derive(derive_more::Display, Debug)]
pub enum Error {
    #[display(fmt = "internal error: {}", _0)]
    Internal(String),
    #[display(fmt = "batch schema does not match declared schema")]
    SchemaMismatch,
}

impl error_stack::Context for Error {}

impl Error {
    pub fn internal_msg(msg: String) -> Self {
        Error::Internal(msg)
    }
}
