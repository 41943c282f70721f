#![warn(
    rust_2018_idioms,
    nonstandard_style,
    future_incompatible,
    clippy::mod_module_files,
    clippy::print_stdout,
    clippy::print_stderr
)]

//! The embedding surface for sluice.
//!
//! A [`Session`] owns an in-memory catalog of tables, binds SQL text to
//! physical plans and executes them on the worker pool. It implements just
//! enough of the host-engine boundary to exercise the tee stage: scans over
//! in-memory tables, projections, and the tee invocation surface with its
//! named options.

mod binder;
mod error;
mod session;
mod store;
mod table;

pub use error::Error;
pub use session::Session;
pub use store::CatalogStore;
