//! Shell completion generation.

use crate::Cli;
use clap::CommandFactory;
use clap_complete::{Shell, generate};
use std::io;

/// Completions command.
pub fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "freshwire", &mut io::stdout());
}
