use error_stack::{IntoReport, ResultExt};
use sqlparser::ast::Statement;
use sqlparser::dialect::DuckDbDialect;
use sqlparser::parser::Parser;

#[derive(derive_more::Display, Debug)]
pub enum Error {
    #[display(fmt = "failed to parse query")]
    Parse,
}

impl error_stack::Context for Error {}

/// Parse a query string into statements.
///
/// Uses the DuckDB dialect, which admits named call arguments (`:=`).
pub fn parse_statements(query: &str) -> error_stack::Result<Vec<Statement>, Error> {
    Parser::parse_sql(&DuckDbDialect {}, query)
        .into_report()
        .change_context(Error::Parse)
        .attach_printable_lazy(|| query.to_owned())
}
