//! CLI module
//!
//! Provides command-line interface for:
//! - check: Validate a tree bundle
//! - replay: Print a scenario's projected state from the journal
//! - audit: Print a scenario's events as JSON lines
//! - serve: Install bundles and start the HTTP server

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{audit, check, replay, run, run_command, serve};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_lines, write_response};
