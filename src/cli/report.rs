use serde::Serialize;
use serde_json::json;
use xref::{
    FixOptions, ReferenceInfo, Stats,
    domain::workflow::{AppliedFix, ValidatedIds, ValidatedRelationships},
};

use super::terminal::Colorize;

/// Exit code for a run that finished with unresolved references.
pub const ISSUES_FOUND: i32 = 2;

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// A reference that was replaced.
#[derive(Debug, Clone, Serialize)]
pub struct Fixed {
    location: String,
    domain: String,
    from: String,
    to: String,
}

/// A reference that could not be fixed.
#[derive(Debug, Clone, Serialize)]
pub struct Broken {
    location: String,
    domain: String,
    id: String,
    suggestions: Vec<String>,
}

/// Everything one command found, collected across validation passes.
#[derive(Debug, Default)]
pub struct Report {
    cleaned: Option<Vec<String>>,
    stats: Stats,
    fixed: Vec<Fixed>,
    removed: Vec<Broken>,
    unresolved: Vec<Broken>,
}

impl Report {
    /// Adds the counters of a finished validator.
    pub fn add_stats(&mut self, stats: Stats) {
        self.stats += stats;
    }

    /// Attaches the cleaned list of a single-list validation.
    pub fn set_cleaned(&mut self, ids: Vec<String>) {
        self.cleaned = Some(ids);
    }

    /// Folds in the findings of another pass, keeping this report's cleaned
    /// list.
    pub fn merge(&mut self, other: Self) {
        self.stats += other.stats;
        self.fixed.extend(other.fixed);
        self.removed.extend(other.removed);
        self.unresolved.extend(other.unresolved);
    }

    pub fn add_ids(&mut self, location: &str, validated: &ValidatedIds, options: FixOptions) {
        self.add_fixes(location, &validated.fixed);
        self.add_invalid(location, &validated.invalid, options);
    }

    pub fn add_relationships(
        &mut self,
        location: &str,
        validated: &ValidatedRelationships,
        options: FixOptions,
    ) {
        for (field, fixes) in &validated.fixed {
            self.add_fixes(&format!("{location}.{field}"), fixes);
        }
        for (field, invalid) in &validated.invalid {
            self.add_invalid(&format!("{location}.{field}"), invalid, options);
        }
    }

    fn add_fixes(&mut self, location: &str, fixes: &[AppliedFix]) {
        self.fixed.extend(fixes.iter().map(|fix| Fixed {
            location: location.to_string(),
            domain: fix.domain.clone(),
            from: fix.from.clone(),
            to: fix.to.clone(),
        }));
    }

    fn add_invalid(&mut self, location: &str, invalid: &[ReferenceInfo], options: FixOptions) {
        let broken = invalid.iter().map(|info| Broken {
            location: location.to_string(),
            domain: info.domain.clone(),
            id: info.id.clone(),
            suggestions: info.suggestions.clone(),
        });

        // Invalid references the validator did not fix were dropped exactly
        // when removal was requested.
        if options.remove_invalid {
            self.removed.extend(broken);
        } else {
            self.unresolved.extend(broken);
        }
    }

    pub const fn stats(&self) -> Stats {
        self.stats
    }

    pub fn has_changes(&self) -> bool {
        !self.fixed.is_empty() || !self.removed.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        self.unresolved.is_empty()
    }

    pub fn print(&self, format: OutputFormat) -> anyhow::Result<()> {
        match format {
            OutputFormat::Table => {
                self.print_table();
                Ok(())
            }
            OutputFormat::Json => self.print_json(),
        }
    }

    /// Lists the pending changes without the summary line.
    pub fn print_changes(&self) {
        for fix in &self.fixed {
            println!(
                "  • {}{} → {}",
                location_label(&fix.location),
                fix.from,
                fix.to.success()
            );
        }
        for broken in &self.removed {
            println!(
                "  • {}{} {}",
                location_label(&broken.location),
                broken.id.warning(),
                "(removed)".dim()
            );
        }
    }

    fn print_table(&self) {
        let Stats {
            checked,
            valid,
            fixed,
            removed,
        } = self.stats;

        println!(
            "Checked {checked} references: {valid} valid, {fixed} fixed, {removed} removed, {} unresolved",
            self.stats.kept_invalid()
        );

        if let Some(ids) = &self.cleaned {
            println!("Result: [{}]", ids.join(", "));
        }

        if self.has_changes() {
            println!();
            self.print_changes();
        }

        if self.is_clean() {
            println!("\n{}", "✓ No unresolved references".success());
            return;
        }

        println!(
            "\n{}",
            format!("✗ {} unresolved references:", self.unresolved.len()).error()
        );
        for broken in &self.unresolved {
            let hint = if broken.suggestions.is_empty() {
                "no suggestions".to_string()
            } else {
                format!("did you mean {}?", broken.suggestions.join(", "))
            };
            println!(
                "  • {}{} {}",
                location_label(&broken.location),
                format!("{}/{}", broken.domain, broken.id).warning(),
                hint.dim()
            );
        }
    }

    fn print_json(&self) -> anyhow::Result<()> {
        let mut output = json!({
            "status": if self.is_clean() { "clean" } else { "issues_found" },
            "stats": {
                "checked": self.stats.checked,
                "valid": self.stats.valid,
                "fixed": self.stats.fixed,
                "removed": self.stats.removed,
                "unresolved": self.stats.kept_invalid(),
            },
            "fixed": self.fixed,
            "removed": self.removed,
            "unresolved": self.unresolved,
        });
        if let Some(ids) = &self.cleaned {
            output["ids"] = json!(ids);
        }

        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }

    /// Ends the process with [`ISSUES_FOUND`] if anything is unresolved.
    pub fn exit(&self) {
        if !self.is_clean() {
            std::process::exit(ISSUES_FOUND);
        }
    }

    /// Whether broken references stay on disk when this report's changes are
    /// not written. Fixed and removed references count as well as unresolved
    /// ones.
    pub fn leaves_issues_unwritten(&self) -> bool {
        !self.is_clean() || self.has_changes()
    }
}

fn location_label(location: &str) -> String {
    if location.is_empty() {
        String::new()
    } else {
        format!("{}: ", location.info())
    }
}
