//! Scout CLI library.
//!
//! This library provides the core functionality for the Scout command-line interface,
//! including configuration loading, entity input, command execution, and output formatting.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod input;
pub mod output;

pub use cli::{Cli, Command};
pub use config::Config;
pub use error::{CliError, Result};
pub use output::Formatter;
