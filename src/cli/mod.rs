//! Command Line Interface (CLI) layer of the LIDAR tools.
//!
//! This module defines argument parsing (`args`), error types (`errors`)
//! and the dispatch of every subcommand to `lidar_tools::api` (`runner`).
//!
//! To embed the tools into another application, call `lidar_tools::api`
//! directly instead of the CLI code.
pub mod args;
pub mod errors;
pub mod runner;

pub use args::CliArgs;
pub use runner::run;
