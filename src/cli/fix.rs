use std::collections::BTreeMap;

use anyhow::Context;
use clap::Parser;
use serde_yaml::Mapping;
use tracing::instrument;
use xref::{
    Catalog, FixOptions, ReferenceIndex, SchemaError, Validator, storage::DomainDocument,
};

use super::{
    report::{ISSUES_FOUND, OutputFormat, Report},
    terminal::Colorize,
};

#[derive(Debug, Parser)]
#[command(about = "Validate and repair one relationship field across a domain")]
pub struct Fix {
    /// The domain whose records hold the field
    #[arg(long, short)]
    domain: String,

    /// The relationship field to repair
    #[arg(long = "relationship-field", short = 'f', value_name = "FIELD")]
    field: String,

    /// Only repair these records (comma-separated); defaults to every record
    #[arg(long, value_delimiter = ',')]
    records: Vec<String>,

    /// Replace broken references by their best repair suggestion
    #[arg(long)]
    auto_fix: bool,

    /// Drop broken references that could not be fixed
    #[arg(long)]
    remove_invalid: bool,

    /// Write the repaired lists back to the domain file
    #[arg(long)]
    write: bool,

    /// Skip the confirmation prompt when writing
    #[arg(long, short)]
    yes: bool,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,
}

impl Fix {
    #[instrument(level = "debug", skip(self, index), fields(domain = %self.domain, field = %self.field))]
    pub fn run(self, index: &ReferenceIndex) -> anyhow::Result<()> {
        let options = FixOptions {
            auto_fix: self.auto_fix,
            remove_invalid: self.remove_invalid,
        };
        let fields = self.managed_field(index)?;

        let catalog = index.catalog()?;
        let mut document = index.document(&self.domain)?;
        let records = self.selected_records(&document)?;

        let mut validator = Validator::new(&catalog);
        let mut report = Report::default();
        let mut updates: Vec<(String, Mapping)> = Vec::new();

        for id in &records {
            let Some(relationships) = document.relationships(id) else {
                continue;
            };
            let validated = validator.validate_relationship_map(relationships, &fields, options)?;
            report.add_relationships(&format!("{}/{id}", self.domain), &validated, options);

            let changed = !validated.fixed.is_empty()
                || (options.remove_invalid && !validated.invalid.is_empty());
            if changed {
                updates.push((id.clone(), validated.relationships));
            }
        }

        report.add_stats(validator.stats());
        report.print(self.output)?;

        if !self.write || updates.is_empty() {
            report.exit();
            return Ok(());
        }

        if !self.confirm(&report, &document, updates.len())? {
            println!("Cancelled");
            // Nothing was written, so every broken reference is still on disk.
            if report.leaves_issues_unwritten() {
                std::process::exit(ISSUES_FOUND);
            }
            return Ok(());
        }

        for (id, relationships) in updates {
            document.set_relationships(&id, relationships);
        }
        document
            .save()
            .with_context(|| format!("failed to write {}", document.path().display()))?;
        tracing::info!(path = %document.path().display(), "wrote repaired references");

        // Check the written file against a fresh index.
        let catalog = index.reload()?;
        let written = index.document(&self.domain)?;
        let remaining = revalidate(&catalog, &written, &records, &fields)?;

        if matches!(self.output, OutputFormat::Table) {
            let message = format!(
                "Wrote {}; {remaining} unresolved references remain",
                written.path().display()
            );
            if remaining == 0 {
                println!("\n{}", message.success());
            } else {
                println!("\n{}", message.warning());
            }
        }

        if remaining > 0 {
            std::process::exit(ISSUES_FOUND);
        }
        Ok(())
    }

    fn managed_field(&self, index: &ReferenceIndex) -> Result<BTreeMap<String, String>, SchemaError> {
        let target = index
            .schema()
            .field_domains(&self.domain)?
            .remove(&self.field)
            .ok_or_else(|| SchemaError::UnknownField {
                domain: self.domain.clone(),
                field: self.field.clone(),
            })?;
        Ok(BTreeMap::from([(self.field.clone(), target)]))
    }

    fn selected_records(&self, document: &DomainDocument) -> anyhow::Result<Vec<String>> {
        if self.records.is_empty() {
            return Ok(document.ids().map(str::to_string).collect());
        }

        if let Some(missing) = self
            .records
            .iter()
            .find(|id| document.relationships(id).is_none())
        {
            anyhow::bail!(
                "{} has no record '{missing}' in {}",
                self.domain,
                document.path().display()
            );
        }
        Ok(self.records.clone())
    }

    fn confirm(
        &self,
        report: &Report,
        document: &DomainDocument,
        records: usize,
    ) -> anyhow::Result<bool> {
        if self.yes {
            return Ok(true);
        }

        let stats = report.stats();
        println!(
            "\nWill update {records} records in {} ({} fixed, {} removed):",
            document.path().display(),
            stats.fixed,
            stats.removed
        );
        report.print_changes();

        let proceed = dialoguer::Confirm::new()
            .with_prompt("Proceed?")
            .default(false)
            .interact()?;
        Ok(proceed)
    }
}

fn revalidate(
    catalog: &Catalog,
    document: &DomainDocument,
    records: &[String],
    fields: &BTreeMap<String, String>,
) -> Result<usize, SchemaError> {
    let mut validator = Validator::new(catalog);
    for id in records {
        if let Some(relationships) = document.relationships(id) {
            validator.validate_relationship_map(relationships, fields, FixOptions::default())?;
        }
    }
    let stats = validator.stats();
    tracing::debug!(checked = stats.checked, unresolved = stats.kept_invalid(), "re-validated");
    Ok(stats.kept_invalid())
}
