#![warn(
    rust_2018_idioms,
    nonstandard_style,
    future_incompatible,
    clippy::mod_module_files,
    clippy::print_stdout,
    clippy::print_stderr
)]

//! Query-text preprocessing and parsing for sluice queries.
//!
//! The preprocessor runs before the real parser ever sees the query. It is
//! a narrowly scoped textual normalization; its only failure mode is to
//! abstain and let the query proceed through the normal parser unchanged.

mod parse;
mod rewrite;

pub use parse::*;
pub use rewrite::*;
