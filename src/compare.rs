// Copyright 2025 Oxide Computer Company

use std::{collections::HashSet, fmt};

use serde::Serialize;
use serde_json::Value;

use crate::{
    context::{NodeId, Scope},
    model::{ReferenceOr, Schema},
    path::DiffPath,
    resolve::SchemaResolver,
};

/// How far the comparator looks when deciding whether two schemas are
/// interchangeable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EquivalenceDepth {
    /// Never equivalent; nothing is compared.
    None,
    /// Type, format, required set, enum and property names only.
    Shallow,
    /// Every structural keyword, recursively.
    #[default]
    Deep,
}

impl fmt::Display for EquivalenceDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EquivalenceDepth::None => write!(f, "none"),
            EquivalenceDepth::Shallow => write!(f, "shallow"),
            EquivalenceDepth::Deep => write!(f, "deep"),
        }
    }
}

/// One structural difference between two schemas.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Difference {
    /// Dotted/bracketed location in the schema tree, empty at the root.
    pub path: String,
    pub left: Value,
    pub right: Value,
    pub description: String,
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() {
            "<root>"
        } else {
            &self.path
        };
        write!(
            f,
            "{}: {} ({} vs {})",
            path, self.description, self.left, self.right
        )
    }
}

/// The outcome of a comparison.
///
/// `equivalent` is authoritative: a structurally empty schema is reported as
/// not equivalent with no differences listed.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Equivalence {
    pub equivalent: bool,
    pub differences: Vec<Difference>,
}

impl Equivalence {
    fn equivalent() -> Self {
        Self {
            equivalent: true,
            differences: Vec::new(),
        }
    }

    fn not_equivalent() -> Self {
        Self {
            equivalent: false,
            differences: Vec::new(),
        }
    }
}

/// Compare two free-standing schemas. References are compared by their text;
/// use [`Comparator::with_scopes`] to follow them.
pub fn compare(
    left: Option<&ReferenceOr<Schema>>,
    right: Option<&ReferenceOr<Schema>>,
    depth: EquivalenceDepth,
) -> Equivalence {
    Comparator::new(depth).compare(left, right)
}

/// One side of a comparison after following references.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Side<'a> {
    Schema {
        node: Option<NodeId>,
        schema: &'a Schema,
    },
    /// A reference that could not be followed; compared by its text.
    Unresolved(&'a str),
}

/// Structural schema comparison.
///
/// All state other than the configuration is local to one top-level call:
/// the visited set of node pairs, the difference path stack and the
/// differences found so far.
pub struct Comparator<'a> {
    pub(crate) depth: EquivalenceDepth,
    left: Option<Scope<'a>>,
    right: Option<Scope<'a>>,
    /// Pairs of named schemas already descended into during this call.
    visited: HashSet<(NodeId, NodeId)>,
    pub(crate) path: DiffPath,
    differences: Vec<Difference>,
}

impl<'a> Comparator<'a> {
    pub fn new(depth: EquivalenceDepth) -> Self {
        Self {
            depth,
            left: None,
            right: None,
            visited: HashSet::new(),
            path: DiffPath::new(),
            differences: Vec::new(),
        }
    }

    /// A comparator that resolves references on each side against that
    /// side's named schemas.
    pub fn with_scopes(depth: EquivalenceDepth, left: Scope<'a>, right: Scope<'a>) -> Self {
        Self {
            left: Some(left),
            right: Some(right),
            ..Self::new(depth)
        }
    }

    pub fn depth(&self) -> EquivalenceDepth {
        self.depth
    }

    pub fn compare(
        &mut self,
        left: Option<&'a ReferenceOr<Schema>>,
        right: Option<&'a ReferenceOr<Schema>>,
    ) -> Equivalence {
        // Absence is settled before the depth is consulted.
        match (left, right) {
            (None, None) => Equivalence::equivalent(),
            (None, Some(right)) => {
                self.push_difference(
                    "",
                    Value::Null,
                    snapshot(right),
                    "schema missing on the left",
                );
                self.finish()
            }
            (Some(left), None) => {
                self.push_difference(
                    "",
                    snapshot(left),
                    Value::Null,
                    "schema missing on the right",
                );
                self.finish()
            }
            (Some(_), Some(_)) if self.depth == EquivalenceDepth::None => {
                Equivalence::not_equivalent()
            }
            (Some(left), Some(right)) => {
                let left = self.left_side(left);
                let right = self.right_side(right);
                self.compare_top(left, right)
            }
        }
    }

    /// Compare two named schemas of the scopes this comparator was built
    /// with. The named schemas themselves take part in cycle detection, so a
    /// property referring back to either is recognized on the first lap.
    pub fn compare_named(&mut self, left: &str, right: &str) -> Equivalence {
        let left = self.left.as_ref().and_then(|scope| scope.get(left));
        let right = self.right.as_ref().and_then(|scope| scope.get(right));

        match (left, right) {
            (Some(_), Some(_)) if self.depth == EquivalenceDepth::None => {
                Equivalence::not_equivalent()
            }
            (Some((left_node, left)), Some((right_node, right))) => {
                let left = self.left_side(left);
                let right = self.right_side(right);
                self.compare_top(with_node(left, left_node), with_node(right, right_node))
            }
            (left, right) => self.compare(left.map(|(_, s)| s), right.map(|(_, s)| s)),
        }
    }

    fn compare_top(&mut self, left: Side<'a>, right: Side<'a>) -> Equivalence {
        if let (Side::Schema { schema: l, .. }, Side::Schema { schema: r, .. }) = (left, right) {
            if l.is_structurally_empty() || r.is_structurally_empty() {
                return Equivalence::not_equivalent();
            }
        }

        self.compare_sides(left, right);
        self.finish()
    }

    /// Compare two resolved sides, descending at most once into any pair of
    /// named schemas.
    pub(crate) fn compare_sides(&mut self, left: Side<'a>, right: Side<'a>) {
        match (left, right) {
            (
                Side::Schema {
                    node: left_node,
                    schema: left,
                },
                Side::Schema {
                    node: right_node,
                    schema: right,
                },
            ) => {
                if let (Some(l), Some(r)) = (left_node, right_node) {
                    if !self.visited.insert((l, r)) {
                        return;
                    }
                }
                self.compare_schema(left, right);
            }
            (Side::Unresolved(left), Side::Unresolved(right)) => {
                if left != right {
                    self.push_difference(
                        self.path.as_str().to_string(),
                        Value::String(left.to_string()),
                        Value::String(right.to_string()),
                        "references differ",
                    );
                }
            }
            (left, right) => {
                self.push_difference(
                    self.path.as_str().to_string(),
                    side_snapshot(left),
                    side_snapshot(right),
                    "unresolvable reference compared with a schema",
                );
            }
        }
    }

    pub(crate) fn left_side(&self, schema: &'a ReferenceOr<Schema>) -> Side<'a> {
        side(self.left.as_ref(), schema)
    }

    pub(crate) fn right_side(&self, schema: &'a ReferenceOr<Schema>) -> Side<'a> {
        side(self.right.as_ref(), schema)
    }

    pub(crate) fn push_difference(
        &mut self,
        path: impl Into<String>,
        left: Value,
        right: Value,
        description: impl ToString,
    ) {
        self.differences.push(Difference {
            path: path.into(),
            left,
            right,
            description: description.to_string(),
        });
    }

    fn finish(&mut self) -> Equivalence {
        self.visited.clear();
        self.path = DiffPath::new();
        let differences = std::mem::take(&mut self.differences);
        Equivalence {
            equivalent: differences.is_empty(),
            differences,
        }
    }
}

fn side<'a>(scope: Option<&Scope<'a>>, schema: &'a ReferenceOr<Schema>) -> Side<'a> {
    match schema {
        ReferenceOr::Item(schema) => Side::Schema { node: None, schema },
        ReferenceOr::Reference { reference } => match scope.map(|scope| schema.resolve(scope)) {
            Some(Ok(resolved)) => Side::Schema {
                node: resolved.node,
                schema: resolved.schema,
            },
            Some(Err(_)) | None => Side::Unresolved(reference),
        },
    }
}

/// Give an inline named schema the identity of its collection entry.
fn with_node(side: Side<'_>, node: NodeId) -> Side<'_> {
    match side {
        Side::Schema { node: None, schema } => Side::Schema {
            node: Some(node),
            schema,
        },
        other => other,
    }
}

fn side_snapshot(side: Side<'_>) -> Value {
    match side {
        Side::Schema { schema, .. } => snapshot(schema),
        Side::Unresolved(reference) => Value::String(reference.to_string()),
    }
}

/// The JSON form of a value for reporting in a difference.
pub(crate) fn snapshot<T: Serialize + ?Sized>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
