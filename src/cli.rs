use std::path::{Path, PathBuf};

mod check;
mod fix;
mod links;
mod reciprocal;
mod reload;
mod report;
mod terminal;
mod validate;

use check::Check;
use clap::ArgAction;
use fix::Fix;
use links::Links;
use reciprocal::Reciprocal;
use reload::Reload;
use tracing::instrument;
use validate::Validate;
use xref::{DomainSchema, ReferenceIndex};

/// Where the schema lives when `--schema` is not given, relative to the root.
const DEFAULT_SCHEMA: &str = ".xref/schema.toml";

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// The directory domain data files are resolved against
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    /// Path to the domain schema (defaults to <root>/.xref/schema.toml)
    ///
    /// If the file does not exist the built-in schema for the standard
    /// domains is used.
    #[arg(short, long, global = true)]
    schema: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        let index = open_index(&self.root, self.schema.as_deref())?;
        self.command.run(&index)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[instrument]
fn open_index(root: &Path, schema: Option<&Path>) -> anyhow::Result<ReferenceIndex> {
    let schema = match schema {
        // An explicit schema must exist.
        Some(path) => DomainSchema::load(path)?,
        None => DomainSchema::load_or_standard(&root.join(DEFAULT_SCHEMA))?,
    };
    Ok(ReferenceIndex::new(root, schema))
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Validate a list of references into one domain
    Validate(Validate),

    /// Validate and repair one relationship field across a domain's records
    Fix(Fix),

    /// Validate every relationship field of every record in every domain
    Check(Check),

    /// Rebuild the reference index and print per-domain record counts
    Reload(Reload),

    /// Report references whose reciprocal reference is missing
    ///
    /// Only fields the schema declares as bidirectional are checked.
    Reciprocal(Reciprocal),

    /// Print link objects for a list of references as JSON
    Links(Links),
}

impl Command {
    fn run(self, index: &ReferenceIndex) -> anyhow::Result<()> {
        match self {
            Self::Validate(command) => command.run(index)?,
            Self::Fix(command) => command.run(index)?,
            Self::Check(command) => command.run(index)?,
            Self::Reload(command) => command.run(index)?,
            Self::Reciprocal(command) => command.run(index)?,
            Self::Links(command) => command.run(index)?,
        }
        Ok(())
    }
}
