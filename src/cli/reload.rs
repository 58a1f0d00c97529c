use clap::Parser;
use tracing::instrument;
use xref::ReferenceIndex;

use super::terminal::Colorize;

#[derive(Debug, Default, Parser)]
#[command(about = "Rebuild the reference index from the domain files")]
pub struct Reload {}

impl Reload {
    #[instrument(level = "debug", skip(self, index))]
    pub fn run(self, index: &ReferenceIndex) -> anyhow::Result<()> {
        let catalog = index.reload()?;

        for (domain, count) in catalog.counts() {
            println!("{domain:<14} {count:>6} records");
        }
        println!(
            "\n{}",
            format!(
                "✓ Indexed {} records from {}",
                catalog.len(),
                index.root().display()
            )
            .success()
        );
        Ok(())
    }
}
