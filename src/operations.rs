// Copyright 2025 Oxide Computer Company

//! Which operations reach which named schemas.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::LazyLock,
};

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::{
    category::Category,
    model::{Document, METHODS},
    path::unescape_json_pointer_segment,
};

/// An operation that reaches a schema, and the response status through which
/// it does so, if any.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct OperationRef {
    pub path: String,
    pub method: String,
    pub operation_id: Option<String>,
    pub tags: Vec<String>,
    pub status_code: Option<String>,
}

impl OperationRef {
    /// How precisely this operation identifies itself: an operation id beats
    /// tags, and tags beat a path with fewer literal segments.
    fn specificity(&self) -> (bool, bool, usize) {
        // The names of path parameters say nothing about the route, so only
        // literal segments are counted.
        static PARAMETER: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"^\{[^}]*\}$").unwrap());
        let literal = self
            .path
            .split('/')
            .filter(|segment| !segment.is_empty() && !PARAMETER.is_match(segment))
            .count();
        (self.operation_id.is_some(), !self.tags.is_empty(), literal)
    }
}

/// How to pick the one operation that stands for a schema.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrimaryOperationPolicy {
    #[default]
    FirstEncountered,
    AlphabeticalOperationId,
    MostSpecific,
}

/// The operations that use a schema.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct OperationContext {
    pub primary: Option<OperationRef>,
    pub paths: BTreeSet<String>,
    pub methods: BTreeSet<String>,
    pub operation_ids: BTreeSet<String>,
    pub tags: BTreeSet<String>,
}

/// A map from schema name to the operations that reach it through
/// references, directly or through other schemas and components.
#[derive(Clone, Debug, Default)]
pub struct OperationGraph {
    reached_by: BTreeMap<String, Vec<OperationRef>>,
}

impl OperationGraph {
    pub fn build(document: &Document) -> anyhow::Result<Self> {
        let raw = document.to_value()?;
        let schema_prefix = Category::Schema
            .reference_prefix(document.dialect())
            .unwrap_or_default();

        let mut graph = Self::default();
        let Some(paths) = raw.get("paths").and_then(Value::as_object) else {
            return Ok(graph);
        };

        for (path, path_item) in paths {
            for method in METHODS {
                let Some(operation) = path_item.get(method) else {
                    continue;
                };
                let op = OperationRef {
                    path: path.clone(),
                    method: method.to_string(),
                    operation_id: operation
                        .get("operationId")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    tags: operation
                        .get("tags")
                        .and_then(Value::as_array)
                        .map(|tags| {
                            tags.iter()
                                .filter_map(Value::as_str)
                                .map(str::to_string)
                                .collect()
                        })
                        .unwrap_or_default(),
                    status_code: None,
                };

                let mut roots = vec![(None, path_item.get("parameters"))];
                for key in ["parameters", "requestBody", "callbacks"] {
                    roots.push((None, operation.get(key)));
                }
                if let Some(responses) = operation.get("responses").and_then(Value::as_object) {
                    for (status, response) in responses {
                        roots.push((Some(status.clone()), Some(response)));
                    }
                }

                // A schema is reported once per operation, through the first
                // root that reaches it.
                let mut reached = BTreeSet::new();
                for (status, root) in roots {
                    let Some(root) = root else {
                        continue;
                    };
                    for name in reachable_schemas(&raw, root, &schema_prefix) {
                        if reached.insert(name.clone()) {
                            graph.reached_by.entry(name).or_default().push(OperationRef {
                                status_code: status.clone(),
                                ..op.clone()
                            });
                        }
                    }
                }
            }
        }

        Ok(graph)
    }

    pub fn operations(&self, schema: &str) -> &[OperationRef] {
        self.reached_by
            .get(schema)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The context of a schema, or `None` if no operation reaches it.
    pub fn context(
        &self,
        schema: &str,
        policy: PrimaryOperationPolicy,
    ) -> Option<OperationContext> {
        let operations = self.reached_by.get(schema)?;

        let primary = match policy {
            PrimaryOperationPolicy::FirstEncountered => operations.first(),
            PrimaryOperationPolicy::AlphabeticalOperationId => operations
                .iter()
                .filter(|op| op.operation_id.is_some())
                .min_by(|a, b| a.operation_id.cmp(&b.operation_id))
                .or_else(|| operations.first()),
            // Ties go to the first encountered.
            PrimaryOperationPolicy::MostSpecific => operations
                .iter()
                .rev()
                .max_by_key(|op| op.specificity()),
        };

        Some(OperationContext {
            primary: primary.cloned(),
            paths: operations.iter().map(|op| op.path.clone()).collect(),
            methods: operations.iter().map(|op| op.method.clone()).collect(),
            operation_ids: operations
                .iter()
                .filter_map(|op| op.operation_id.clone())
                .collect(),
            tags: operations
                .iter()
                .flat_map(|op| op.tags.iter().cloned())
                .collect(),
        })
    }
}

/// Follow every `$ref` below `root`, through components and schemas alike,
/// returning the names of the schemas reached in the order they were first
/// seen.
fn reachable_schemas<'a>(raw: &'a Value, root: &'a Value, schema_prefix: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut seen = BTreeSet::new();
    let mut work = vec![root];

    while let Some(value) = work.pop() {
        let mut references = Vec::new();
        collect_references(value, &mut references);

        for reference in references {
            if !seen.insert(reference) {
                continue;
            }
            if let Some(name) = reference.strip_prefix(schema_prefix) {
                names.push(unescape_json_pointer_segment(name).into_owned());
            }
            if let Some(target) = reference.strip_prefix('#').and_then(|p| raw.pointer(p)) {
                work.push(target);
            }
        }
    }

    names
}

fn collect_references<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::Object(map) => {
            for (key, value) in map {
                match (key.as_str(), value) {
                    ("$ref", Value::String(reference)) => out.push(reference),
                    _ => collect_references(value, out),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_references(item, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn document() -> Document {
        Document::from_value(&json!({
            "openapi": "3.0.3",
            "info": { "title": "pets", "version": "1" },
            "paths": {
                "/pets": {
                    "get": {
                        "responses": {
                            "200": {
                                "description": "ok",
                                "content": { "application/json": {
                                    "schema": {
                                        "type": "array",
                                        "items": { "$ref": "#/components/schemas/Pet" },
                                    },
                                } },
                            },
                        },
                    },
                },
                "/pets/{id}": {
                    "parameters": [{ "$ref": "#/components/parameters/PetId" }],
                    "put": {
                        "operationId": "updatePet",
                        "tags": ["pets"],
                        "requestBody": { "$ref": "#/components/requestBodies/PetBody" },
                        "responses": { "204": { "description": "done" } },
                    },
                },
            },
            "components": {
                "schemas": {
                    "Pet": {
                        "type": "object",
                        "properties": {
                            "owner": { "$ref": "#/components/schemas/Owner" },
                            "self": { "$ref": "#/components/schemas/Pet" },
                        },
                    },
                    "Owner": { "type": "object" },
                    "Id": { "type": "string" },
                    "Unused": { "type": "string" },
                },
                "parameters": {
                    "PetId": {
                        "name": "id",
                        "in": "path",
                        "required": true,
                        "schema": { "$ref": "#/components/schemas/Id" },
                    },
                },
                "requestBodies": {
                    "PetBody": {
                        "content": { "application/json": {
                            "schema": { "$ref": "#/components/schemas/Pet" },
                        } },
                    },
                },
            },
        }))
        .unwrap()
    }

    #[test]
    fn schemas_are_reached_through_components_and_schemas() {
        let graph = OperationGraph::build(&document()).unwrap();

        let pet = graph.operations("Pet");
        assert_eq!(pet.len(), 2);
        assert_eq!(pet[0].path, "/pets");
        assert_eq!(pet[0].status_code.as_deref(), Some("200"));
        assert_eq!(pet[1].operation_id.as_deref(), Some("updatePet"));
        assert_eq!(pet[1].status_code, None);

        // Transitively, through Pet.
        assert_eq!(graph.operations("Owner").len(), 2);
        // Through a referenced path-level parameter.
        assert_eq!(graph.operations("Id").len(), 1);
        assert!(graph.operations("Unused").is_empty());
        assert!(graph.context("Unused", PrimaryOperationPolicy::default()).is_none());
    }

    #[test]
    fn primary_operation_policies() {
        let graph = OperationGraph::build(&document()).unwrap();

        let first = graph
            .context("Pet", PrimaryOperationPolicy::FirstEncountered)
            .unwrap();
        assert_eq!(first.primary.unwrap().path, "/pets");
        assert_eq!(first.methods, BTreeSet::from(["get".to_string(), "put".to_string()]));
        assert_eq!(first.tags, BTreeSet::from(["pets".to_string()]));

        let alphabetical = graph
            .context("Pet", PrimaryOperationPolicy::AlphabeticalOperationId)
            .unwrap();
        assert_eq!(
            alphabetical.primary.unwrap().operation_id.as_deref(),
            Some("updatePet")
        );

        let specific = graph
            .context("Pet", PrimaryOperationPolicy::MostSpecific)
            .unwrap();
        assert_eq!(specific.primary.unwrap().path, "/pets/{id}");
    }
}
