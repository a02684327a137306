//! Command-line interface.

mod commands;
mod helpers;
mod progress;

pub use commands::{is_verbose, run, USAGE_EXIT_CODE};
