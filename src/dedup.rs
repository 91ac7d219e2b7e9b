// Copyright 2025 Oxide Computer Company

use indexmap::IndexMap;

use crate::{
    alias::AliasTable,
    compare::Equivalence,
    model::{ReferenceOr, Schema},
};

/// The outcome of collapsing equivalent schemas.
#[derive(Clone, Debug, Default)]
pub struct Deduplication {
    /// The surviving schemas, in their original order.
    pub canonical: IndexMap<String, ReferenceOr<Schema>>,
    /// Each removed name and the canonical name that replaces it.
    pub aliases: AliasTable,
    pub removed: usize,
}

/// Partition named schemas into classes of equivalent schemas and keep one
/// per class: the alphabetically first name.
///
/// `equivalent` is called with pairs of names of `schemas`. Names are
/// visited in sorted order and each is compared against the canonical
/// member of every class found so far, so a schema that is never equivalent
/// to anything (see [`crate::Comparator`]) stays on its own. Schemas that
/// are themselves only a reference are aliases already and are left alone.
pub fn deduplicate<F>(
    schemas: &IndexMap<String, ReferenceOr<Schema>>,
    mut equivalent: F,
) -> Deduplication
where
    F: FnMut(&str, &str) -> Equivalence,
{
    let mut names: Vec<&str> = schemas
        .iter()
        .filter(|(_, schema)| schema.as_item().is_some())
        .map(|(name, _)| name.as_str())
        .collect();
    names.sort_unstable();

    let mut canonical_names: Vec<&str> = Vec::new();
    let mut aliases = AliasTable::new();
    for name in names {
        let class = canonical_names
            .iter()
            .copied()
            .find(|&canonical| equivalent(canonical, name).equivalent);
        match class {
            Some(canonical) => aliases.insert(name, canonical),
            None => canonical_names.push(name),
        }
    }

    let canonical: IndexMap<_, _> = schemas
        .iter()
        .filter(|(name, _)| aliases.get(name).is_none())
        .map(|(name, schema)| (name.clone(), schema.clone()))
        .collect();

    Deduplication {
        removed: schemas.len() - canonical.len(),
        canonical,
        aliases,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        compare::{Comparator, EquivalenceDepth},
        context::Scope,
        model::Dialect,
    };

    fn schemas(value: serde_json::Value) -> IndexMap<String, ReferenceOr<Schema>> {
        serde_json::from_value(value).unwrap()
    }

    fn run(schemas: &IndexMap<String, ReferenceOr<Schema>>) -> Deduplication {
        let mut comparator = Comparator::with_scopes(
            EquivalenceDepth::Deep,
            Scope::new(schemas, Dialect::OpenApi3),
            Scope::new(schemas, Dialect::OpenApi3),
        );
        deduplicate(schemas, |left, right| comparator.compare_named(left, right))
    }

    #[test]
    fn alphabetically_first_name_survives() {
        let input = schemas(json!({
            "Location": {
                "type": "object",
                "required": ["street"],
                "properties": { "street": { "type": "string" } },
            },
            "User": {
                "type": "object",
                "properties": { "home": { "$ref": "#/components/schemas/Location" } },
            },
            "Address": {
                "type": "object",
                "required": ["street"],
                "properties": { "street": { "type": "string", "description": "line 1" } },
            },
            "Anything": {},
            "Whatever": {},
        }));

        let result = run(&input);
        assert_eq!(result.removed, 1);
        assert_eq!(result.aliases.get("Location"), Some("Address"));
        // Canonical schemas keep their input order.
        assert_eq!(
            result.canonical.keys().collect::<Vec<_>>(),
            ["User", "Address", "Anything", "Whatever"]
        );
    }

    #[test]
    fn idempotent() {
        let input = schemas(json!({
            "B": { "type": "string", "format": "uuid" },
            "A": { "type": "string", "format": "uuid" },
            "C": { "type": "string", "format": "uuid" },
            "D": { "type": "integer" },
        }));

        let first = run(&input);
        assert_eq!(first.removed, 2);
        assert_eq!(first.aliases.get("B"), Some("A"));
        assert_eq!(first.aliases.get("C"), Some("A"));

        let second = run(&first.canonical);
        assert_eq!(second.removed, 0);
        assert!(second.aliases.is_empty());
    }

    #[test]
    fn references_are_not_deduplicated() {
        let input = schemas(json!({
            "Id": { "type": "string" },
            "AlsoId": { "$ref": "#/components/schemas/Id" },
        }));
        let result = run(&input);
        assert_eq!(result.removed, 0);
    }
}
