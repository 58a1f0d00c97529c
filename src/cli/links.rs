use clap::Parser;
use tracing::instrument;
use xref::{LinkBuilder, ReferenceIndex};

#[derive(Debug, Parser)]
#[command(about = "Print link objects for a list of references")]
pub struct Links {
    /// The domain the references point into
    #[arg(long, short)]
    domain: String,

    /// The references to link (comma-separated)
    #[arg(long, value_delimiter = ',', required = true)]
    ids: Vec<String>,

    /// URL path segments placed between the domain prefix and the ID
    /// (comma-separated, e.g. 'metal,ferrous')
    #[arg(long, value_delimiter = ',')]
    path: Vec<String>,

    /// Leave out references that cannot be resolved instead of printing null
    #[arg(long)]
    skip_invalid: bool,
}

impl Links {
    #[instrument(level = "debug", skip(self, index), fields(domain = %self.domain))]
    pub fn run(self, index: &ReferenceIndex) -> anyhow::Result<()> {
        let catalog = index.catalog()?;
        let builder = LinkBuilder::new(&catalog);

        let links = if self.path.is_empty() {
            builder.links_for_batch(&self.domain, self.ids.as_slice(), self.skip_invalid)?
        } else {
            let segments: Vec<&str> = self.path.iter().map(String::as_str).collect();
            let mut links = Vec::with_capacity(self.ids.len());
            for id in &self.ids {
                let link = builder.link_for_path(&self.domain, id, &segments)?;
                if link.is_some() || !self.skip_invalid {
                    links.push(link);
                }
            }
            links
        };

        println!("{}", serde_json::to_string_pretty(&links)?);
        Ok(())
    }
}
