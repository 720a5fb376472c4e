//! # Completions Command Implementation
//!
//! Prints a `clap_complete` completion script for the shells a fragment store
//! is sourced into. The script is static, so it can be generated once and
//! saved next to the `init` line rather than evaluated on every startup:
//!
//! ```bash
//! # ~/.bashrc
//! eval "$(profile-fragments init --lazy)"
//! . ~/.local/share/bash-completion/completions/profile-fragments
//!
//! profile-fragments completions bash > ~/.local/share/bash-completion/completions/profile-fragments
//! profile-fragments completions zsh > ~/.zfunc/_profile-fragments
//! ```

use std::io::{self, Write};

use anyhow::Result;
use clap::{Args, CommandFactory, ValueEnum};
use clap_complete::{generate, Shell};

use super::BINARY_NAME;
use crate::cli::Cli;

/// Shells a fragment store can be initialized in
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    /// Completions only; fragments themselves are POSIX shell
    Fish,
}

impl From<CompletionShell> for Shell {
    fn from(shell: CompletionShell) -> Self {
        match shell {
            CompletionShell::Bash => Shell::Bash,
            CompletionShell::Zsh => Shell::Zsh,
            CompletionShell::Fish => Shell::Fish,
        }
    }
}

/// Print a shell completion script
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    #[arg(value_enum)]
    pub shell: CompletionShell,
}

pub fn execute(args: CompletionsArgs) -> Result<()> {
    render(args.shell, &mut io::stdout().lock())
}

fn render(shell: CompletionShell, out: &mut impl Write) -> Result<()> {
    let mut cmd = Cli::command();
    generate(Shell::from(shell), &mut cmd, BINARY_NAME, out);
    out.flush()?;
    Ok(())
}
