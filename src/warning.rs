// Copyright 2025 Oxide Computer Company

//! Non-fatal decisions made during a merge, recorded for the caller.

use std::{collections::BTreeMap, fmt};

use serde::Serialize;

use crate::{category::Category, model::Location};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WarningCategory {
    CollisionResolved,
    Renamed,
    Deduplicated,
    MetadataOverride,
    HandlerFailed,
}

impl fmt::Display for WarningCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WarningCategory::CollisionResolved => "collision-resolved",
            WarningCategory::Renamed => "renamed",
            WarningCategory::Deduplicated => "deduplicated",
            WarningCategory::MetadataOverride => "metadata-override",
            WarningCategory::HandlerFailed => "handler-failed",
        };
        f.write_str(name)
    }
}

/// One entry of the warning log. Entries are created when a decision is
/// made and never modified afterwards.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Warning {
    pub category: WarningCategory,
    pub severity: Severity,
    /// JSON pointer of the affected entry.
    pub path: String,
    pub message: String,
    /// The source the affected entry came from.
    pub source: String,
    pub location: Option<Location>,
    pub context: BTreeMap<String, String>,
}

impl Warning {
    pub fn new(
        category: WarningCategory,
        severity: Severity,
        path: impl Into<String>,
        message: impl ToString,
        source: impl Into<String>,
    ) -> Self {
        Self {
            category,
            severity,
            path: path.into(),
            message: message.to_string(),
            source: source.into(),
            location: None,
            context: BTreeMap::new(),
        }
    }

    pub fn with_location(mut self, location: Option<Location>) -> Self {
        self.location = location;
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {} ({}", self.severity, self.category, self.path, self.source)?;
        if let Some(location) = self.location {
            write!(f, ":{location}")?;
        }
        write!(f, "): {}", self.message)
    }
}

/// How a collision ended up being resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    KeptLeft,
    KeptRight,
    Renamed,
    Deduplicated,
    Custom,
    Failed,
}

impl Outcome {
    pub fn label(self) -> &'static str {
        match self {
            Outcome::KeptLeft => "kept-left",
            Outcome::KeptRight => "kept-right",
            Outcome::Renamed => "renamed",
            Outcome::Deduplicated => "deduplicated",
            Outcome::Custom => "custom",
            Outcome::Failed => "failed",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CollisionEvent {
    pub category: Category,
    pub name: String,
    pub path: String,
    pub left_source: String,
    pub right_source: String,
    pub outcome: Outcome,
    /// The name the renamed side received, for renames.
    pub renamed_to: Option<String>,
    pub message: Option<String>,
}

impl fmt::Display for CollisionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} '{}' ({} vs {})",
            self.outcome, self.category, self.name, self.left_source, self.right_source
        )?;
        if let Some(renamed_to) = &self.renamed_to {
            write!(f, " -> '{renamed_to}'")?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

/// Per-collision detail, collected when collision reporting is enabled.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CollisionReport {
    pub total: usize,
    pub resolved_by_rename: usize,
    pub resolved_by_dedup: usize,
    pub resolved_by_accept: usize,
    pub resolved_by_custom: usize,
    pub failed: usize,
    pub events: Vec<CollisionEvent>,
}

impl CollisionReport {
    pub fn record(&mut self, event: CollisionEvent) {
        self.total += 1;
        match event.outcome {
            Outcome::KeptLeft | Outcome::KeptRight => self.resolved_by_accept += 1,
            Outcome::Renamed => self.resolved_by_rename += 1,
            Outcome::Deduplicated => self.resolved_by_dedup += 1,
            Outcome::Custom => self.resolved_by_custom += 1,
            Outcome::Failed => self.failed += 1,
        }
        self.events.push(event);
    }
}

impl fmt::Display for CollisionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} collisions: {} accepted, {} renamed, {} deduplicated, {} custom, {} failed",
            self.total,
            self.resolved_by_accept,
            self.resolved_by_rename,
            self.resolved_by_dedup,
            self.resolved_by_custom,
            self.failed,
        )?;
        for event in &self.events {
            writeln!(f, "  {event}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(outcome: Outcome) -> CollisionEvent {
        CollisionEvent {
            category: Category::Schema,
            name: "User".to_string(),
            path: "#/components/schemas/User".to_string(),
            left_source: "a.yaml".to_string(),
            right_source: "b.yaml".to_string(),
            outcome,
            renamed_to: None,
            message: None,
        }
    }

    #[test]
    fn report_counts_by_outcome() {
        let mut report = CollisionReport::default();
        report.record(event(Outcome::KeptLeft));
        report.record(event(Outcome::KeptRight));
        report.record(event(Outcome::Renamed));
        report.record(event(Outcome::Deduplicated));

        assert_eq!(report.total, 4);
        assert_eq!(report.resolved_by_accept, 2);
        assert_eq!(report.resolved_by_rename, 1);
        assert_eq!(report.resolved_by_dedup, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(report.events.len(), 4);
    }

    #[test]
    fn warning_display() {
        let warning = Warning::new(
            WarningCategory::CollisionResolved,
            Severity::Info,
            "#/paths/~1users",
            "kept the existing definition",
            "b.yaml",
        )
        .with_location(Some(Location { line: 4, column: 3 }));

        assert_eq!(
            warning.to_string(),
            "info [collision-resolved] #/paths/~1users (b.yaml:4:3): kept the existing definition"
        );
    }
}
