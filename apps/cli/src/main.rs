//! docbundle CLI — build documentation guides into a navigable bundle.
//!
//! Parses a directory of Markdown (or HTML) guides, builds a table of
//! contents, and renders a static site plus a single combined document.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
