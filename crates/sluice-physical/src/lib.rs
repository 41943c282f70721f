#![warn(
    rust_2018_idioms,
    nonstandard_style,
    future_incompatible,
    clippy::mod_module_files,
    clippy::print_stdout,
    clippy::print_stderr
)]

//! Physical execution plans for sluice queries.

mod plan;
mod settings;
mod step;

pub use plan::*;
pub use settings::*;
pub use step::*;
