// Copyright 2025 Oxide Computer Company

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ReferenceOr;

/// A schema object, covering the OpenAPI 3.0 / Swagger 2.0 subset of JSON
/// Schema as well as the 2020-12 keywords admitted by OpenAPI 3.1.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<SchemaType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    // Metadata; never part of structural equivalence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examples: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_only: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enumeration: Option<Vec<Value>>,
    #[serde(rename = "const", default, skip_serializing_if = "Option::is_none")]
    pub const_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusive_maximum: Option<ExclusiveBound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusive_minimum: Option<ExclusiveBound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<BoolOrSchema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_items: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_items: Option<Box<BoolOrSchema>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_properties: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_properties: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, ReferenceOr<Schema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Box<BoolOrSchema>>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub pattern_properties: IndexMap<String, ReferenceOr<Schema>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all_of: Vec<ReferenceOr<Schema>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub any_of: Vec<ReferenceOr<Schema>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub one_of: Vec<ReferenceOr<Schema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not: Option<Box<ReferenceOr<Schema>>>,
    #[serde(rename = "if", default, skip_serializing_if = "Option::is_none")]
    pub if_schema: Option<Box<ReferenceOr<Schema>>>,
    #[serde(rename = "then", default, skip_serializing_if = "Option::is_none")]
    pub then_schema: Option<Box<ReferenceOr<Schema>>>,
    #[serde(rename = "else", default, skip_serializing_if = "Option::is_none")]
    pub else_schema: Option<Box<ReferenceOr<Schema>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<Discriminator>,

    // JSON Schema 2020-12 (OpenAPI 3.1).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unevaluated_properties: Option<Box<BoolOrSchema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unevaluated_items: Option<Box<BoolOrSchema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_schema: Option<Box<ReferenceOr<Schema>>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prefix_items: Vec<ReferenceOr<Schema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains: Option<Box<ReferenceOr<Schema>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_names: Option<Box<ReferenceOr<Schema>>>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub dependent_schemas: IndexMap<String, ReferenceOr<Schema>>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub dependent_required: IndexMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_contains: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_contains: Option<u64>,
    /// Local definitions; a container, not a constraint.
    #[serde(rename = "$defs", default, skip_serializing_if = "IndexMap::is_empty")]
    pub defs: IndexMap<String, ReferenceOr<Schema>>,

    /// Extensions and any keyword not modelled above.
    #[serde(flatten)]
    pub extensions: IndexMap<String, Value>,
}

impl Schema {
    /// Return `true` if the schema places no structural constraint on a
    /// value. Metadata (title, description, examples, deprecation, access
    /// flags) does not count as a constraint.
    pub fn is_structurally_empty(&self) -> bool {
        let Schema {
            schema_type,
            format,
            title: _,
            description: _,
            default: _,
            example: _,
            examples: _,
            deprecated: _,
            read_only: _,
            write_only: _,
            nullable: _,
            enumeration,
            const_value,
            pattern,
            multiple_of,
            maximum,
            minimum,
            exclusive_maximum,
            exclusive_minimum,
            max_length,
            min_length,
            items,
            max_items,
            min_items,
            unique_items,
            additional_items,
            max_properties,
            min_properties,
            required,
            properties,
            additional_properties,
            pattern_properties,
            all_of,
            any_of,
            one_of,
            not,
            if_schema,
            then_schema,
            else_schema,
            discriminator: _,
            unevaluated_properties,
            unevaluated_items,
            content_encoding,
            content_media_type,
            content_schema,
            prefix_items,
            contains,
            property_names,
            dependent_schemas,
            dependent_required,
            max_contains,
            min_contains,
            defs: _,
            extensions,
        } = self;

        schema_type.is_none()
            && format.is_none()
            && enumeration.is_none()
            && const_value.is_none()
            && pattern.is_none()
            && multiple_of.is_none()
            && maximum.is_none()
            && minimum.is_none()
            && exclusive_maximum.is_none()
            && exclusive_minimum.is_none()
            && max_length.is_none()
            && min_length.is_none()
            && items.is_none()
            && max_items.is_none()
            && min_items.is_none()
            && unique_items.is_none()
            && additional_items.is_none()
            && max_properties.is_none()
            && min_properties.is_none()
            && required.is_empty()
            && properties.is_empty()
            && additional_properties.is_none()
            && pattern_properties.is_empty()
            && all_of.is_empty()
            && any_of.is_empty()
            && one_of.is_empty()
            && not.is_none()
            && if_schema.is_none()
            && then_schema.is_none()
            && else_schema.is_none()
            && unevaluated_properties.is_none()
            && unevaluated_items.is_none()
            && content_encoding.is_none()
            && content_media_type.is_none()
            && content_schema.is_none()
            && prefix_items.is_empty()
            && contains.is_none()
            && property_names.is_none()
            && dependent_schemas.is_empty()
            && dependent_required.is_empty()
            && max_contains.is_none()
            && min_contains.is_none()
            && !extensions.keys().any(|key| is_keyword(key))
    }

    /// JSON Schema keywords this model does not name, such as the draft-4
    /// `dependencies`. They land in `extensions` next to `x-` extensions.
    pub fn unknown_keywords(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.extensions.iter().filter(|(key, _)| is_keyword(key))
    }

    /// Visit every schema slot directly nested in this schema, in a fixed
    /// keyword order.
    pub fn children(&self) -> impl Iterator<Item = &ReferenceOr<Schema>> {
        let boxed = [
            &self.not,
            &self.if_schema,
            &self.then_schema,
            &self.else_schema,
            &self.content_schema,
            &self.contains,
            &self.property_names,
        ];
        let polymorphic = [
            &self.items,
            &self.additional_items,
            &self.additional_properties,
            &self.unevaluated_properties,
            &self.unevaluated_items,
        ];

        self.properties
            .values()
            .chain(self.all_of.iter())
            .chain(self.any_of.iter())
            .chain(self.one_of.iter())
            .chain(self.prefix_items.iter())
            .chain(self.dependent_schemas.values())
            .chain(self.pattern_properties.values())
            .chain(self.defs.values())
            .chain(boxed.into_iter().filter_map(|s| s.as_deref()))
            .chain(
                polymorphic
                    .into_iter()
                    .filter_map(|s| s.as_deref().and_then(BoolOrSchema::as_schema)),
            )
    }

    /// Mutable counterpart of [`Schema::children`].
    pub fn children_mut(&mut self) -> impl Iterator<Item = &mut ReferenceOr<Schema>> {
        let Schema {
            properties,
            all_of,
            any_of,
            one_of,
            prefix_items,
            dependent_schemas,
            pattern_properties,
            defs,
            not,
            if_schema,
            then_schema,
            else_schema,
            content_schema,
            contains,
            property_names,
            items,
            additional_items,
            additional_properties,
            unevaluated_properties,
            unevaluated_items,
            ..
        } = self;

        let boxed = [
            not,
            if_schema,
            then_schema,
            else_schema,
            content_schema,
            contains,
            property_names,
        ];
        let polymorphic = [
            items,
            additional_items,
            additional_properties,
            unevaluated_properties,
            unevaluated_items,
        ];

        properties
            .values_mut()
            .chain(all_of.iter_mut())
            .chain(any_of.iter_mut())
            .chain(one_of.iter_mut())
            .chain(prefix_items.iter_mut())
            .chain(dependent_schemas.values_mut())
            .chain(pattern_properties.values_mut())
            .chain(defs.values_mut())
            .chain(boxed.into_iter().filter_map(|s| s.as_deref_mut()))
            .chain(
                polymorphic
                    .into_iter()
                    .filter_map(|s| s.as_deref_mut().and_then(BoolOrSchema::as_schema_mut)),
            )
    }
}

/// Unmodelled keys that annotate a schema without constraining it.
const ANNOTATIONS: &[&str] = &["$comment", "$id", "$schema", "$anchor", "externalDocs", "xml"];

fn is_keyword(key: &str) -> bool {
    !key.starts_with("x-") && !ANNOTATIONS.contains(&key)
}

/// The `type` keyword: a single tag, or (OpenAPI 3.1) a set of tags.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaType {
    Single(String),
    Set(Vec<String>),
}

impl SchemaType {
    /// The type tags, without regard to the order in which they were written.
    pub fn tags(&self) -> BTreeSet<&str> {
        match self {
            SchemaType::Single(tag) => BTreeSet::from([tag.as_str()]),
            SchemaType::Set(tags) => tags.iter().map(String::as_str).collect(),
        }
    }
}

/// `exclusiveMaximum`/`exclusiveMinimum`: a flag modifying `maximum` in
/// OpenAPI 3.0 and Swagger 2.0, a bound of its own in OpenAPI 3.1.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExclusiveBound {
    Flag(bool),
    Limit(f64),
}

/// A keyword that accepts either a boolean or a schema.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BoolOrSchema {
    Bool(bool),
    Schema(ReferenceOr<Schema>),
}

impl BoolOrSchema {
    pub fn as_schema(&self) -> Option<&ReferenceOr<Schema>> {
        match self {
            BoolOrSchema::Bool(_) => None,
            BoolOrSchema::Schema(schema) => Some(schema),
        }
    }

    pub fn as_schema_mut(&mut self) -> Option<&mut ReferenceOr<Schema>> {
        match self {
            BoolOrSchema::Bool(_) => None,
            BoolOrSchema::Schema(schema) => Some(schema),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Discriminator {
    pub property_name: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub mapping: IndexMap<String, String>,
    #[serde(flatten)]
    pub extensions: IndexMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn metadata_only_schema_is_empty() {
        let schema: Schema = serde_json::from_value(json!({
            "title": "Anything",
            "description": "accepts any value",
            "example": 3,
            "deprecated": true,
        }))
        .unwrap();
        assert!(schema.is_structurally_empty());

        let schema: Schema = serde_json::from_value(json!({ "minLength": 1 })).unwrap();
        assert!(!schema.is_structurally_empty());
    }

    #[test]
    fn pattern_properties_and_unknown_keywords_constrain() {
        let schema: Schema = serde_json::from_value(json!({
            "patternProperties": { "^x": { "type": "string" } },
        }))
        .unwrap();
        assert!(!schema.is_structurally_empty());

        let schema: Schema = serde_json::from_value(json!({
            "dependencies": { "a": ["b"] },
        }))
        .unwrap();
        assert!(!schema.is_structurally_empty());

        let schema: Schema = serde_json::from_value(json!({
            "x-internal": true,
            "$comment": "ids are opaque",
            "$defs": { "Id": { "type": "string" } },
        }))
        .unwrap();
        assert!(schema.is_structurally_empty());
    }

    #[test]
    fn polymorphic_fields_deserialize_both_ways() {
        let schema: Schema = serde_json::from_value(json!({
            "type": "object",
            "additionalProperties": false,
            "unevaluatedProperties": { "type": "string" },
        }))
        .unwrap();

        assert_eq!(
            schema.additional_properties.as_deref(),
            Some(&BoolOrSchema::Bool(false))
        );
        assert!(matches!(
            schema.unevaluated_properties.as_deref(),
            Some(BoolOrSchema::Schema(ReferenceOr::Item(_)))
        ));
    }

    #[test]
    fn type_set_ignores_order() {
        let a = SchemaType::Set(vec!["string".into(), "null".into()]);
        let b = SchemaType::Set(vec!["null".into(), "string".into()]);
        assert_ne!(a, b);
        assert_eq!(a.tags(), b.tags());
    }

    #[test]
    fn children_cover_nested_keywords() {
        let schema: Schema = serde_json::from_value(json!({
            "properties": { "a": { "type": "string" } },
            "allOf": [{ "$ref": "#/components/schemas/Base" }],
            "items": { "type": "integer" },
            "additionalProperties": true,
            "not": { "type": "null" },
            "patternProperties": { "^x": { "$ref": "#/components/schemas/X" } },
            "$defs": { "Id": { "type": "string" } },
        }))
        .unwrap();

        assert_eq!(schema.children().count(), 6);
    }
}
