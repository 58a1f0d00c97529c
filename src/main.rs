//! `xref`: check and repair cross-domain references in YAML data files.

use clap::Parser;

mod cli;

fn main() -> anyhow::Result<()> {
    cli::Cli::parse().run()
}
