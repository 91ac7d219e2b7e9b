// Copyright 2025 Oxide Computer Company

//! Deciding what survives each collision within one collection.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::{
    category::{Category, Component},
    collision::{CollisionContext, Decision, RenameSide, Resolution},
    compare::Equivalence,
    config::{MergeConfig, RenameContext},
    error::MergeError,
    model::{Dialect, Location, LocationIndex},
    operations::OperationGraph,
    path::DocumentPath,
    warning::{CollisionEvent, CollisionReport, Outcome, Severity, Warning, WarningCategory},
};

/// Where an input document came from.
#[derive(Clone, Debug)]
pub(crate) struct Source {
    pub id: String,
    pub locations: Option<LocationIndex>,
}

impl Source {
    pub fn location(&self, pointer: &str) -> Option<Location> {
        self.locations.as_ref().and_then(|index| index.get(pointer))
    }
}

/// The running record of a merge.
#[derive(Debug, Default)]
pub(crate) struct Journal {
    pub collisions: usize,
    pub warnings: Vec<Warning>,
    pub report: Option<CollisionReport>,
}

impl Journal {
    pub fn new(report: bool) -> Self {
        Self {
            report: report.then(CollisionReport::default),
            ..Self::default()
        }
    }

    pub fn warn(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    fn event(&mut self, event: CollisionEvent) {
        if let Some(report) = &mut self.report {
            report.record(event);
        }
    }
}

/// The document each entry of the merged document came from, as an index
/// into the merge's sources.
pub(crate) type Origins = BTreeMap<(Category, String), usize>;

/// What happens to one colliding name.
#[derive(Debug)]
pub(crate) enum Action<T> {
    /// The incoming entry is dropped.
    KeepLeft,
    /// The incoming entry replaces the existing one.
    TakeRight,
    Rename { side: RenameSide, to: String },
    /// Both entries are replaced by a value supplied by a decision handler.
    Replace(T),
}

/// The actions for the colliding names of one collection, by name.
pub(crate) type Plan<T> = BTreeMap<String, Action<T>>;

pub(crate) struct Resolver<'a> {
    pub config: &'a MergeConfig,
    pub dialect: Dialect,
    pub sources: &'a [Source],
    pub origins: &'a Origins,
    /// Index of the incoming document in `sources`.
    pub incoming: usize,
    pub left_operations: Option<&'a OperationGraph>,
    pub right_operations: Option<&'a OperationGraph>,
    pub journal: &'a mut Journal,
}

impl<'a> Resolver<'a> {
    /// Decide every collision between the entries of one collection in the
    /// merged document (`left`) and in the incoming document (`right`).
    ///
    /// Nothing is modified: the returned plan is applied by the caller once
    /// every decision for the collection has been made. Collisions are
    /// visited in the incoming document's order, and each one produces
    /// exactly one warning and, if enabled, one report event.
    pub fn merge_category<T: Component>(
        &mut self,
        category: Category,
        left: &IndexMap<String, T>,
        right: &IndexMap<String, T>,
        mut equivalent: impl FnMut(&str, &T, &T) -> Equivalence,
    ) -> Result<Plan<T>, MergeError> {
        let config = self.config;
        let sources = self.sources;
        let strategy = config.strategy_for(category);

        let mut plan = Plan::new();
        let mut taken = BTreeSet::new();

        for (name, right_value) in right {
            let Some(left_value) = left.get(name) else {
                continue;
            };
            self.journal.collisions += 1;

            let left_index = self
                .origins
                .get(&(category, name.clone()))
                .copied()
                .unwrap_or_default();
            let left_source = sources.get(left_index);
            let right_source = sources.get(self.incoming);

            let path = category
                .collection_pointer(self.dialect)
                .map(|collection| DocumentPath::entry(collection, name))
                .unwrap_or_else(DocumentPath::root)
                .to_string();
            let locate =
                |source: Option<&Source>| source.and_then(|source| source.location(&path));
            let operations = |graph: Option<&OperationGraph>| {
                graph
                    .filter(|_| category == Category::Schema)
                    .and_then(|graph| graph.context(name, config.primary_operation()))
            };

            let collision = CollisionContext {
                category,
                name,
                path: path.clone(),
                left_source: left_source.map(|s| s.id.as_str()).unwrap_or_default(),
                right_source: right_source.map(|s| s.id.as_str()).unwrap_or_default(),
                left_location: locate(left_source),
                right_location: locate(right_source),
                left: left_value.view(),
                right: right_value.view(),
                strategy,
                left_operations: operations(self.left_operations),
                right_operations: operations(self.right_operations),
            };

            let Decision {
                resolution,
                message,
            } = self
                .consult(&collision)
                .unwrap_or_else(|| Decision::new(strategy.resolution()));

            let (action, outcome) = match resolution {
                Resolution::Continue | Resolution::AcceptLeft => {
                    (Action::KeepLeft, Outcome::KeptLeft)
                }
                Resolution::AcceptRight => (Action::TakeRight, Outcome::KeptRight),
                Resolution::Fail => {
                    self.record(&collision, Outcome::Failed, None, message.clone());
                    return Err(MergeError::Collision {
                        category,
                        name: name.clone(),
                        reason: message.unwrap_or_else(|| {
                            format!(
                                "defined in both {} and {}",
                                collision.left_source, collision.right_source
                            )
                        }),
                    });
                }
                Resolution::Rename(side) => {
                    if !category.supports_rename() {
                        self.record(&collision, Outcome::Failed, None, message);
                        return Err(MergeError::UnsupportedAction {
                            action: "rename",
                            category,
                        });
                    }
                    let to = self.new_name(&collision, side, left_index, left, right, &mut taken);
                    (Action::Rename { side, to }, Outcome::Renamed)
                }
                Resolution::Deduplicate => {
                    let result = equivalent(name, left_value, right_value);
                    if !result.equivalent {
                        self.record(&collision, Outcome::Failed, None, message);
                        return Err(MergeError::Collision {
                            category,
                            name: name.clone(),
                            reason: format!(
                                "definitions are not equivalent ({} differences)",
                                result.differences.len()
                            ),
                        });
                    }
                    (Action::KeepLeft, Outcome::Deduplicated)
                }
                Resolution::Custom(value) => match T::from_custom(value) {
                    Ok(value) => (Action::Replace(value), Outcome::Custom),
                    Err(value) => {
                        self.record(&collision, Outcome::Failed, None, message);
                        return Err(MergeError::CustomMismatch {
                            category,
                            name: name.clone(),
                            expected: T::KIND,
                            found: value.kind(),
                        });
                    }
                },
            };

            let renamed_to = match &action {
                Action::Rename { to, .. } => Some(to.as_str()),
                _ => None,
            };
            self.record(&collision, outcome, renamed_to, message);
            plan.insert(name.clone(), action);
        }

        Ok(plan)
    }

    /// Ask the decision handler, if any, about a collision. `None` means the
    /// configured strategy applies.
    fn consult(&mut self, collision: &CollisionContext<'_>) -> Option<Decision> {
        let handler = self.config.handler_for(collision.category)?;
        match handler.decide(collision) {
            Ok(decision) if decision.resolution == Resolution::Continue => None,
            Ok(decision) => Some(decision),
            Err(error) => {
                warn!(
                    "decision handler failed for {} '{}': {:#}; falling back to {}",
                    collision.category, collision.name, error, collision.strategy
                );
                self.journal.warn(
                    Warning::new(
                        WarningCategory::HandlerFailed,
                        Severity::Warning,
                        &collision.path,
                        format!(
                            "decision handler failed: {error:#}; falling back to {}",
                            collision.strategy
                        ),
                        collision.right_source,
                    )
                    .with_location(collision.right_location),
                );
                None
            }
        }
    }

    /// A name for the renamed side that is free in both collections.
    fn new_name<T>(
        &self,
        collision: &CollisionContext<'_>,
        side: RenameSide,
        left_index: usize,
        left: &IndexMap<String, T>,
        right: &IndexMap<String, T>,
        taken: &mut BTreeSet<String>,
    ) -> String {
        let (index, source, operations) = match side {
            RenameSide::Left => (
                left_index,
                collision.left_source,
                collision.left_operations.as_ref(),
            ),
            RenameSide::Right => (
                self.incoming,
                collision.right_source,
                collision.right_operations.as_ref(),
            ),
        };

        let base = match self.config.prefix_for(source) {
            Some(prefix) => format!("{prefix}{}", collision.name),
            None => self.config.name_generator().generate(
                collision.name,
                &RenameContext {
                    category: collision.category,
                    source,
                    index,
                    operations,
                },
            ),
        };

        let mut candidate = base.clone();
        let mut suffix = 2;
        while candidate.is_empty()
            || left.contains_key(&candidate)
            || right.contains_key(&candidate)
            || taken.contains(&candidate)
        {
            candidate = format!("{base}_{suffix}");
            suffix += 1;
        }
        taken.insert(candidate.clone());
        candidate
    }

    fn record(
        &mut self,
        collision: &CollisionContext<'_>,
        outcome: Outcome,
        renamed_to: Option<&str>,
        message: Option<String>,
    ) {
        let CollisionContext {
            category,
            name,
            left_source,
            right_source,
            ..
        } = collision;

        debug!("{category} collision on '{name}' ({left_source} vs {right_source}): {outcome}");

        if outcome != Outcome::Failed {
            let (warning_category, severity, text) = match outcome {
                Outcome::KeptLeft => (
                    WarningCategory::CollisionResolved,
                    Severity::Warning,
                    format!("kept the definition from {left_source}, discarded the one from {right_source}"),
                ),
                Outcome::KeptRight => (
                    WarningCategory::CollisionResolved,
                    Severity::Warning,
                    format!("replaced the definition from {left_source} with the one from {right_source}"),
                ),
                Outcome::Renamed => (
                    WarningCategory::Renamed,
                    Severity::Info,
                    format!("renamed to '{}'", renamed_to.unwrap_or_default()),
                ),
                Outcome::Deduplicated => (
                    WarningCategory::Deduplicated,
                    Severity::Info,
                    format!("definitions from {left_source} and {right_source} are equivalent"),
                ),
                Outcome::Custom | Outcome::Failed => (
                    WarningCategory::CollisionResolved,
                    Severity::Warning,
                    "replaced by the decision handler's value".to_string(),
                ),
            };

            let mut warning = Warning::new(
                warning_category,
                severity,
                &collision.path,
                text,
                *right_source,
            )
            .with_location(collision.right_location)
            .with_context("left_source", left_source)
            .with_context("resolution", outcome);
            if let Some(message) = &message {
                warning = warning.with_context("message", message);
            }
            self.journal.warn(warning);
        }

        self.journal.event(CollisionEvent {
            category: *category,
            name: name.to_string(),
            path: collision.path.clone(),
            left_source: left_source.to_string(),
            right_source: right_source.to_string(),
            outcome,
            renamed_to: renamed_to.map(str::to_string),
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        collision::Strategy,
        model::{Location, ReferenceOr, Schema},
    };

    fn schemas(value: serde_json::Value) -> IndexMap<String, ReferenceOr<Schema>> {
        serde_json::from_value(value).unwrap()
    }

    fn sources() -> Vec<Source> {
        let mut locations = LocationIndex::new();
        locations.insert(
            "#/components/schemas/User",
            Location { line: 12, column: 5 },
        );
        vec![
            Source {
                id: "users.yaml".to_string(),
                locations: None,
            },
            Source {
                id: "orders.yaml".to_string(),
                locations: Some(locations),
            },
        ]
    }

    fn resolve<T: Component>(
        config: &MergeConfig,
        journal: &mut Journal,
        category: Category,
        left: &IndexMap<String, T>,
        right: &IndexMap<String, T>,
    ) -> Result<Plan<T>, MergeError> {
        let sources = sources();
        let origins = Origins::new();
        let mut resolver = Resolver {
            config,
            dialect: Dialect::OpenApi3,
            sources: &sources,
            origins: &origins,
            incoming: 1,
            left_operations: None,
            right_operations: None,
            journal,
        };
        resolver.merge_category(category, left, right, |_, l, r| Equivalence {
            equivalent: l == r,
            differences: Vec::new(),
        })
    }

    #[test]
    fn accept_left_records_one_warning_per_collision() {
        let config = MergeConfig::default();
        let mut journal = Journal::new(true);
        let left = schemas(json!({ "User": { "type": "object" }, "Pet": { "type": "object" } }));
        let right = schemas(json!({ "User": { "type": "string" }, "Order": { "type": "object" } }));

        let plan = resolve(&config, &mut journal, Category::Schema, &left, &right).unwrap();
        assert!(matches!(plan.get("User"), Some(Action::KeepLeft)));
        assert_eq!(plan.len(), 1);
        assert_eq!(journal.collisions, 1);

        let [warning] = journal.warnings.as_slice() else {
            panic!("expected one warning, got {:?}", journal.warnings);
        };
        assert_eq!(warning.category, WarningCategory::CollisionResolved);
        assert_eq!(warning.path, "#/components/schemas/User");
        assert_eq!(warning.source, "orders.yaml");
        assert_eq!(warning.location, Some(Location { line: 12, column: 5 }));

        let report = journal.report.unwrap();
        assert_eq!(report.total, 1);
        assert_eq!(report.resolved_by_accept, 1);
        assert_eq!(report.events[0].outcome, Outcome::KeptLeft);
    }

    #[test]
    fn renamed_names_avoid_both_collections() {
        let config = MergeConfig::builder()
            .schema_strategy(Strategy::RenameRight)
            .build()
            .unwrap();
        let mut journal = Journal::new(false);
        let left = schemas(json!({
            "User": { "type": "object" },
            "User_orders": { "type": "object" },
        }));
        let right = schemas(json!({
            "User": { "type": "string" },
            "User_orders_2": { "type": "string" },
        }));

        let plan = resolve(&config, &mut journal, Category::Schema, &left, &right).unwrap();
        let Some(Action::Rename { side, to }) = plan.get("User") else {
            panic!("expected a rename, got {plan:?}");
        };
        assert_eq!(*side, RenameSide::Right);
        assert_eq!(to, "User_orders_3");
        assert_eq!(journal.warnings[0].category, WarningCategory::Renamed);
        assert_eq!(journal.warnings[0].severity, Severity::Info);
    }

    #[test]
    fn prefix_takes_precedence_over_the_template() {
        let config = MergeConfig::builder()
            .schema_strategy(Strategy::RenameLeft)
            .prefix("users.yaml", "Users")
            .build()
            .unwrap();
        let mut journal = Journal::new(false);
        let left = schemas(json!({ "User": { "type": "object" } }));
        let right = schemas(json!({ "User": { "type": "string" } }));

        let plan = resolve(&config, &mut journal, Category::Schema, &left, &right).unwrap();
        assert!(matches!(
            plan.get("User"),
            Some(Action::Rename { side: RenameSide::Left, to }) if to == "UsersUser"
        ));
    }

    #[test]
    fn failure_is_reported_without_a_warning() {
        let config = MergeConfig::builder().strategy(Strategy::Fail).build().unwrap();
        let mut journal = Journal::new(true);
        let left = schemas(json!({ "User": { "type": "object" } }));
        let right = schemas(json!({ "User": { "type": "object" } }));

        let err = resolve(&config, &mut journal, Category::Schema, &left, &right).unwrap_err();
        assert!(matches!(err, MergeError::Collision { ref name, .. } if name == "User"));
        assert!(journal.warnings.is_empty());
        assert_eq!(journal.report.unwrap().failed, 1);
    }

    #[test]
    fn handler_errors_fall_back_to_the_strategy() {
        let config = MergeConfig::builder()
            .strategy(Strategy::AcceptRight)
            .handler(
                |_: &CollisionContext<'_>| -> anyhow::Result<Decision> {
                    anyhow::bail!("lookup service unavailable")
                },
                Category::ALL,
            )
            .build()
            .unwrap();
        let mut journal = Journal::new(false);
        let left = schemas(json!({ "User": { "type": "object" } }));
        let right = schemas(json!({ "User": { "type": "string" } }));

        let plan = resolve(&config, &mut journal, Category::Schema, &left, &right).unwrap();
        assert!(matches!(plan.get("User"), Some(Action::TakeRight)));

        let categories: Vec<_> = journal.warnings.iter().map(|w| w.category).collect();
        assert_eq!(
            categories,
            [WarningCategory::HandlerFailed, WarningCategory::CollisionResolved]
        );
        assert!(journal.warnings[0].message.contains("lookup service unavailable"));
    }

    #[test]
    fn deduplication_requires_equivalence() {
        let config = MergeConfig::builder()
            .strategy(Strategy::DeduplicateIfEquivalent)
            .build()
            .unwrap();
        let left = schemas(json!({ "A": { "type": "string" }, "B": { "type": "string" } }));
        let right = schemas(json!({ "A": { "type": "string" }, "B": { "type": "integer" } }));

        let mut journal = Journal::new(true);
        let err = resolve(&config, &mut journal, Category::Schema, &left, &right).unwrap_err();
        assert!(matches!(err, MergeError::Collision { ref name, .. } if name == "B"));

        let report = journal.report.unwrap();
        assert_eq!(report.resolved_by_dedup, 1);
        assert_eq!(report.failed, 1);
    }

    #[test]
    fn custom_values_must_match_the_collection() {
        use crate::{
            category::{CustomValue, ValueKind},
            model::PathItem,
        };

        let config = MergeConfig::builder()
            .handler(
                |_: &CollisionContext<'_>| -> anyhow::Result<Decision> {
                    Ok(Resolution::Custom(CustomValue::PathItem(PathItem::default())).into())
                },
                [Category::Schema],
            )
            .build()
            .unwrap();
        let mut journal = Journal::new(false);
        let left = schemas(json!({ "User": { "type": "object" } }));
        let right = schemas(json!({ "User": { "type": "string" } }));

        let err = resolve(&config, &mut journal, Category::Schema, &left, &right).unwrap_err();
        assert!(matches!(
            err,
            MergeError::CustomMismatch { found: ValueKind::PathItem, .. }
        ));
    }
}
