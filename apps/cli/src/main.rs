//! PromptSieve CLI: run prompt-based classification agents over text.
//!
//! Long content is split into word-aligned chunks and each chunk is sent to
//! a language-model backend; verdicts are printed in chunk order.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

// Backends block on their own I/O, so there is no async runtime here.
fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
