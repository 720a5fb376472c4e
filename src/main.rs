//! # Profile Fragments CLI
//!
//! This is the binary entry point for the `profile-fragments` command-line tool.
//!
//! The binary parses arguments with `clap`, dispatches to one command module
//! and turns any error into a message on stderr plus a failing exit status.
//! Commands such as `init` write shell code to stdout that the caller
//! evaluates, so nothing else may ever be printed there on failure.
//!
//! All fragment logic lives in the `profile_fragments` library crate.

mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    match cli.execute() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
