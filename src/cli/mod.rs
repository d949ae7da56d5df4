//! Command-line interface for the `harvest` binary.

mod commands;
mod helpers;

pub use commands::{is_verbose, run};
