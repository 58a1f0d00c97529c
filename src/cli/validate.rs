use clap::Parser;
use tracing::instrument;
use xref::{FixOptions, ReferenceIndex, Validator};

use super::report::{OutputFormat, Report};

#[derive(Debug, Parser)]
#[command(about = "Validate a list of references into one domain")]
pub struct Validate {
    /// The domain the references point into
    #[arg(long, short)]
    domain: String,

    /// The references to validate (comma-separated)
    #[arg(long, value_delimiter = ',', required = true)]
    ids: Vec<String>,

    /// Replace broken references by their best repair suggestion
    #[arg(long)]
    auto_fix: bool,

    /// Drop broken references that could not be fixed
    #[arg(long)]
    remove_invalid: bool,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,
}

impl Validate {
    #[instrument(level = "debug", skip(self, index), fields(domain = %self.domain))]
    pub fn run(self, index: &ReferenceIndex) -> anyhow::Result<()> {
        let options = FixOptions {
            auto_fix: self.auto_fix,
            remove_invalid: self.remove_invalid,
        };

        let catalog = index.catalog()?;
        let mut validator = Validator::new(&catalog);
        let validated = validator.validate_and_fix(&self.domain, self.ids.as_slice(), options)?;

        let mut report = Report::default();
        report.add_stats(validator.stats());
        report.add_ids("", &validated, options);
        report.set_cleaned(validated.ids);

        report.print(self.output)?;
        report.exit();
        Ok(())
    }
}
