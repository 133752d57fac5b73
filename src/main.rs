//! # Bump Translations CLI
//!
//! This is the binary entry point for the `bump-translations` tool.
//!
//! Its primary responsibilities are:
//! - Parsing the environment and command-line arguments using `clap`.
//! - Running the update pipeline over every target repository.
//! - Translating the run's outcome into the process exit code.
//!
//! The core application logic is defined in the `lib.rs` library crate, ensuring
//! that the binary is a thin wrapper around the reusable library functionality.

mod cli;

use std::process::ExitCode;

use clap::Parser;

fn main() -> anyhow::Result<ExitCode> {
    let cli = cli::Cli::parse();
    cli.execute()
}
