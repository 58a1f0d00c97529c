use clap::Parser;
use serde_json::json;
use tracing::instrument;
use xref::{ReferenceIndex, domain::RelationshipGraph};

use super::{
    report::{ISSUES_FOUND, OutputFormat},
    terminal::Colorize,
};

#[derive(Debug, Parser)]
#[command(about = "Report references whose reciprocal reference is missing")]
pub struct Reciprocal {
    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,
}

impl Reciprocal {
    #[instrument(level = "debug", skip(self, index))]
    pub fn run(self, index: &ReferenceIndex) -> anyhow::Result<()> {
        let catalog = index.catalog()?;
        let schema = catalog.schema();
        let mut graph = RelationshipGraph::new();

        for config in schema.domains() {
            let domain = config.name();
            let field_domains = schema.field_domains(domain)?;
            let document = index.document(domain)?;

            for id in document.ids() {
                if let Some(relationships) = document.relationships(id) {
                    graph.add_relationships(&catalog, domain, id, relationships, &field_domains)?;
                }
            }
        }

        let missing = graph.missing_reciprocals(schema)?;

        match self.output {
            OutputFormat::Table => {
                println!(
                    "Checked {} references: {} missing reciprocals",
                    graph.reference_count(),
                    missing.len()
                );
                for gap in &missing {
                    println!(
                        "  • {} → {} {}",
                        format!("{}/{}.{}", gap.source_domain, gap.source_id, gap.field).info(),
                        format!("{}/{}", gap.target_domain, gap.target_id).warning(),
                        format!("(no {} back-reference)", gap.reciprocal_field).dim()
                    );
                }
            }
            OutputFormat::Json => {
                let output = json!({
                    "references": graph.reference_count(),
                    "missing": missing,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
        }

        if !missing.is_empty() {
            std::process::exit(ISSUES_FOUND);
        }
        Ok(())
    }
}
