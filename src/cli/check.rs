use clap::Parser;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tracing::instrument;
use xref::{Catalog, FixOptions, ReferenceIndex, Validator};

use super::{
    report::{OutputFormat, Report},
    terminal::Colorize,
};

#[derive(Debug, Parser)]
#[command(about = "Validate every relationship field of every record")]
pub struct Check {
    /// Only check these domains (comma-separated); defaults to all
    #[arg(long, value_delimiter = ',')]
    domains: Vec<String>,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,
}

impl Check {
    #[instrument(level = "debug", skip(self, index))]
    pub fn run(self, index: &ReferenceIndex) -> anyhow::Result<()> {
        let catalog = index.catalog()?;

        let domains = if self.domains.is_empty() {
            catalog
                .schema()
                .domains()
                .map(|domain| domain.name().to_string())
                .collect()
        } else {
            for domain in &self.domains {
                catalog.schema().domain(domain)?;
            }
            self.domains.clone()
        };

        let passes = domains
            .par_iter()
            .map(|domain| check_domain(index, &catalog, domain))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let mut report = Report::default();
        for (domain, pass) in passes {
            if matches!(self.output, OutputFormat::Table) {
                let stats = pass.stats();
                let line = format!(
                    "{domain:<14} {:>6} references, {} unresolved",
                    stats.checked,
                    stats.kept_invalid()
                );
                if pass.is_clean() {
                    println!("{}", line.dim());
                } else {
                    println!("{}", line.warning());
                }
            }
            report.merge(pass);
        }

        if matches!(self.output, OutputFormat::Table) {
            println!();
        }
        report.print(self.output)?;
        report.exit();
        Ok(())
    }
}

/// Checks one domain with its own validator, so domains can be checked in
/// parallel and their reports merged afterwards.
fn check_domain(
    index: &ReferenceIndex,
    catalog: &Catalog,
    domain: &str,
) -> anyhow::Result<(String, Report)> {
    let options = FixOptions::default();
    let field_domains = catalog.schema().field_domains(domain)?;
    let document = index.document(domain)?;

    let mut validator = Validator::new(catalog);
    let mut report = Report::default();

    for id in document.ids() {
        let Some(relationships) = document.relationships(id) else {
            continue;
        };
        let validated = validator.validate_relationship_map(relationships, &field_domains, options)?;
        report.add_relationships(&format!("{domain}/{id}"), &validated, options);
    }

    report.add_stats(validator.stats());
    Ok((domain.to_string(), report))
}
