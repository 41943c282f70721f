#![warn(
    rust_2018_idioms,
    nonstandard_style,
    future_incompatible,
    clippy::mod_module_files,
    clippy::print_stdout,
    clippy::print_stderr
)]

//! Implementation of transforms and the pipeline running them.

mod project;
mod transform;
mod transform_pipeline;

pub use transform_pipeline::*;
