// Copyright 2025 Oxide Computer Company

use std::collections::BTreeSet;

use anyhow::{anyhow, bail};

use crate::{
    context::{NodeId, Scope},
    model::{ReferenceOr, Schema},
};

/// A schema with references followed to the item they name.
#[derive(Clone, Copy, Debug)]
pub struct Resolved<'a> {
    /// The named schema the last reference pointed at, if any reference was
    /// followed.
    pub node: Option<NodeId>,
    pub schema: &'a Schema,
}

pub trait SchemaResolver<'a> {
    fn resolve(&'a self, scope: &Scope<'a>) -> anyhow::Result<Resolved<'a>>;
}

impl<'a> SchemaResolver<'a> for ReferenceOr<Schema> {
    fn resolve(&'a self, scope: &Scope<'a>) -> anyhow::Result<Resolved<'a>> {
        let mut target = match self {
            ReferenceOr::Item(schema) => return Ok(Resolved { node: None, schema }),
            ReferenceOr::Reference { reference } => reference.as_str(),
        };

        // A reference may name a schema that is itself only a reference.
        let mut seen = BTreeSet::new();
        loop {
            let name = scope
                .name_of(target)
                .ok_or_else(|| anyhow!("reference {target} does not name a schema"))?;
            let (node, item_or_reference) = scope
                .get(&name)
                .ok_or_else(|| anyhow!("invalid reference {target}"))?;

            if !seen.insert(node) {
                bail!("reference {target} is part of a reference cycle");
            }

            match item_or_reference {
                ReferenceOr::Item(schema) => {
                    return Ok(Resolved {
                        node: Some(node),
                        schema,
                    });
                }
                ReferenceOr::Reference { reference } => {
                    target = reference.as_str();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;
    use serde_json::json;

    use super::*;
    use crate::{context::NodeId, model::Dialect};

    fn schemas(value: serde_json::Value) -> IndexMap<String, ReferenceOr<Schema>> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn follows_reference_chains() {
        let schemas = schemas(json!({
            "Alias": { "$ref": "#/components/schemas/User" },
            "User": { "type": "object" },
        }));
        let scope = Scope::new(&schemas, Dialect::OpenApi3);

        let start = ReferenceOr::<Schema>::reference("#/components/schemas/Alias");
        let resolved = start.resolve(&scope).unwrap();
        assert_eq!(resolved.node, Some(NodeId(1)));
        assert!(resolved.schema.schema_type.is_some());
    }

    #[test]
    fn dangling_and_cyclic_references_fail() {
        let schemas = schemas(json!({
            "A": { "$ref": "#/components/schemas/B" },
            "B": { "$ref": "#/components/schemas/A" },
        }));
        let scope = Scope::new(&schemas, Dialect::OpenApi3);

        assert!(
            ReferenceOr::<Schema>::reference("#/components/schemas/A")
                .resolve(&scope)
                .is_err()
        );
        assert!(
            ReferenceOr::<Schema>::reference("#/components/schemas/Missing")
                .resolve(&scope)
                .is_err()
        );
        assert!(
            ReferenceOr::<Schema>::reference("#/definitions/A")
                .resolve(&scope)
                .is_err()
        );
    }
}
