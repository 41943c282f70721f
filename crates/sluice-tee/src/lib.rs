#![warn(
    rust_2018_idioms,
    nonstandard_style,
    future_incompatible,
    clippy::mod_module_files,
    clippy::print_stdout,
    clippy::print_stderr
)]

//! The buffering tee stage.
//!
//! Wherever a tee step is spliced into a query, all rows flowing through it
//! are forwarded unchanged to the rest of the query. The stage additionally
//! captures every row in a spool buffer and, once the upstream is fully
//! drained, runs the configured side effects exactly once -- render to the
//! terminal or a pager, export to a delimited file, materialize into a
//! table -- before re-emitting the buffered rows downstream.

mod dispatch;
mod error;
mod pipeline;
mod spool;
mod store;

pub use dispatch::dispatch;
pub use error::Error;
pub use pipeline::*;
pub use spool::*;
pub use store::*;
