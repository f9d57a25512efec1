//! Command-line interface module.
//!
//! This module provides the CLI structure and command handlers for the minutes binary.

mod commands;
mod configure;
mod queue;
mod status;

pub use commands::{Cli, Commands, OutputFormat};
pub use configure::configure;
pub use queue::{clear_backoff, clear_queue, process, run_worker};
pub use status::{export, import, show_status, watch};
