// Copyright 2025 Oxide Computer Company

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::{
    compare::{Comparator, EquivalenceDepth, snapshot},
    model::{BoolOrSchema, ReferenceOr, Schema, SchemaType},
    setops::SetCompare,
};

impl<'a> Comparator<'a> {
    pub(crate) fn compare_schema(&mut self, left: &'a Schema, right: &'a Schema) {
        // We expand structures to ensure we don't accidentally fail to examine
        // a field.
        let Schema {
            schema_type: left_type,
            format: left_format,
            title: _,
            description: _,
            default: _,
            example: _,
            examples: _,
            deprecated: _,
            read_only: _,
            write_only: _,
            nullable: left_nullable,
            enumeration: left_enum,
            const_value: left_const,
            pattern: left_pattern,
            multiple_of: left_multiple_of,
            maximum: left_maximum,
            minimum: left_minimum,
            exclusive_maximum: left_exclusive_maximum,
            exclusive_minimum: left_exclusive_minimum,
            max_length: left_max_length,
            min_length: left_min_length,
            items: left_items,
            max_items: left_max_items,
            min_items: left_min_items,
            unique_items: left_unique_items,
            additional_items: left_additional_items,
            max_properties: left_max_properties,
            min_properties: left_min_properties,
            required: left_required,
            properties: left_properties,
            additional_properties: left_additional_properties,
            pattern_properties: left_pattern_properties,
            all_of: left_all_of,
            any_of: left_any_of,
            one_of: left_one_of,
            not: left_not,
            if_schema: left_if,
            then_schema: left_then,
            else_schema: left_else,
            discriminator: left_discriminator,
            unevaluated_properties: left_unevaluated_properties,
            unevaluated_items: left_unevaluated_items,
            content_encoding: left_content_encoding,
            content_media_type: left_content_media_type,
            content_schema: left_content_schema,
            prefix_items: left_prefix_items,
            contains: left_contains,
            property_names: left_property_names,
            dependent_schemas: left_dependent_schemas,
            dependent_required: left_dependent_required,
            max_contains: left_max_contains,
            min_contains: left_min_contains,
            defs: left_defs,
            extensions: _,
        } = left;
        let Schema {
            schema_type: right_type,
            format: right_format,
            title: _,
            description: _,
            default: _,
            example: _,
            examples: _,
            deprecated: _,
            read_only: _,
            write_only: _,
            nullable: right_nullable,
            enumeration: right_enum,
            const_value: right_const,
            pattern: right_pattern,
            multiple_of: right_multiple_of,
            maximum: right_maximum,
            minimum: right_minimum,
            exclusive_maximum: right_exclusive_maximum,
            exclusive_minimum: right_exclusive_minimum,
            max_length: right_max_length,
            min_length: right_min_length,
            items: right_items,
            max_items: right_max_items,
            min_items: right_min_items,
            unique_items: right_unique_items,
            additional_items: right_additional_items,
            max_properties: right_max_properties,
            min_properties: right_min_properties,
            required: right_required,
            properties: right_properties,
            additional_properties: right_additional_properties,
            pattern_properties: right_pattern_properties,
            all_of: right_all_of,
            any_of: right_any_of,
            one_of: right_one_of,
            not: right_not,
            if_schema: right_if,
            then_schema: right_then,
            else_schema: right_else,
            discriminator: right_discriminator,
            unevaluated_properties: right_unevaluated_properties,
            unevaluated_items: right_unevaluated_items,
            content_encoding: right_content_encoding,
            content_media_type: right_content_media_type,
            content_schema: right_content_schema,
            prefix_items: right_prefix_items,
            contains: right_contains,
            property_names: right_property_names,
            dependent_schemas: right_dependent_schemas,
            dependent_required: right_dependent_required,
            max_contains: right_max_contains,
            min_contains: right_min_contains,
            defs: right_defs,
            extensions: _,
        } = right;

        // Shallow: the outline of the schema.
        self.compare_type(left_type.as_ref(), right_type.as_ref());
        self.compare_field("format", left_format, right_format);
        self.compare_required(left_required, right_required);
        // Enum identity includes the order of its values.
        self.compare_field("enum", left_enum, right_enum);

        let properties = SetCompare::new(left_properties, right_properties);
        if !properties.same_keys() {
            let left_names: BTreeSet<_> = left_properties.keys().collect();
            let right_names: BTreeSet<_> = right_properties.keys().collect();
            self.push_difference(
                self.path.leaf("properties"),
                snapshot(&left_names),
                snapshot(&right_names),
                "property names differ",
            );
        }

        if self.depth == EquivalenceDepth::Shallow {
            return;
        }

        self.compare_field("pattern", left_pattern, right_pattern);
        self.compare_field("const", left_const, right_const);
        self.compare_field(
            "nullable",
            &left_nullable.unwrap_or(false),
            &right_nullable.unwrap_or(false),
        );
        self.compare_field("multipleOf", left_multiple_of, right_multiple_of);
        self.compare_field("maximum", left_maximum, right_maximum);
        self.compare_field("minimum", left_minimum, right_minimum);
        self.compare_field(
            "exclusiveMaximum",
            left_exclusive_maximum,
            right_exclusive_maximum,
        );
        self.compare_field(
            "exclusiveMinimum",
            left_exclusive_minimum,
            right_exclusive_minimum,
        );
        self.compare_field("maxLength", left_max_length, right_max_length);
        self.compare_field("minLength", left_min_length, right_min_length);
        self.compare_field("maxItems", left_max_items, right_max_items);
        self.compare_field("minItems", left_min_items, right_min_items);
        self.compare_field("uniqueItems", left_unique_items, right_unique_items);
        self.compare_field("maxProperties", left_max_properties, right_max_properties);
        self.compare_field("minProperties", left_min_properties, right_min_properties);
        self.compare_field(
            "discriminator.propertyName",
            &left_discriminator.as_ref().map(|d| &d.property_name),
            &right_discriminator.as_ref().map(|d| &d.property_name),
        );

        self.path.push_field("properties");
        for (name, (left_property, right_property)) in properties.common {
            self.path.push_field(name);
            self.compare_schema_ref(left_property, right_property);
            self.path.pop();
        }
        self.path.pop();

        self.compare_bool_or_schema("items", left_items.as_deref(), right_items.as_deref());
        self.compare_bool_or_schema(
            "additionalItems",
            left_additional_items.as_deref(),
            right_additional_items.as_deref(),
        );
        self.compare_bool_or_schema(
            "additionalProperties",
            left_additional_properties.as_deref(),
            right_additional_properties.as_deref(),
        );
        self.compare_schema_map(
            "patternProperties",
            left_pattern_properties,
            right_pattern_properties,
        );

        self.compare_schema_list("allOf", left_all_of, right_all_of);
        self.compare_schema_list("anyOf", left_any_of, right_any_of);
        self.compare_schema_list("oneOf", left_one_of, right_one_of);
        self.compare_optional_schema("not", left_not.as_deref(), right_not.as_deref());
        self.compare_optional_schema("if", left_if.as_deref(), right_if.as_deref());
        self.compare_optional_schema("then", left_then.as_deref(), right_then.as_deref());
        self.compare_optional_schema("else", left_else.as_deref(), right_else.as_deref());

        // JSON Schema 2020-12.
        self.compare_bool_or_schema(
            "unevaluatedProperties",
            left_unevaluated_properties.as_deref(),
            right_unevaluated_properties.as_deref(),
        );
        self.compare_bool_or_schema(
            "unevaluatedItems",
            left_unevaluated_items.as_deref(),
            right_unevaluated_items.as_deref(),
        );
        self.compare_field(
            "contentEncoding",
            left_content_encoding,
            right_content_encoding,
        );
        self.compare_field(
            "contentMediaType",
            left_content_media_type,
            right_content_media_type,
        );
        self.compare_optional_schema(
            "contentSchema",
            left_content_schema.as_deref(),
            right_content_schema.as_deref(),
        );
        self.compare_schema_list("prefixItems", left_prefix_items, right_prefix_items);
        self.compare_optional_schema(
            "contains",
            left_contains.as_deref(),
            right_contains.as_deref(),
        );
        self.compare_optional_schema(
            "propertyNames",
            left_property_names.as_deref(),
            right_property_names.as_deref(),
        );
        self.compare_schema_map(
            "dependentSchemas",
            left_dependent_schemas,
            right_dependent_schemas,
        );
        self.compare_field(
            "dependentRequired",
            left_dependent_required,
            right_dependent_required,
        );
        self.compare_field("maxContains", left_max_contains, right_max_contains);
        self.compare_field("minContains", left_min_contains, right_min_contains);
        self.compare_schema_map("$defs", left_defs, right_defs);

        self.compare_unknown_keywords(left, right);
    }

    /// Keywords outside the model are compared by value; extensions and
    /// annotations are ignored.
    fn compare_unknown_keywords(&mut self, left: &Schema, right: &Schema) {
        let left: BTreeMap<_, _> = left.unknown_keywords().collect();
        let right: BTreeMap<_, _> = right.unknown_keywords().collect();
        let keys: BTreeSet<_> = left.keys().chain(right.keys()).copied().collect();
        for key in keys {
            let (l, r) = (left.get(key), right.get(key));
            if l != r {
                self.push_difference(
                    self.path.leaf(key),
                    snapshot(&l),
                    snapshot(&r),
                    format!("{key} differs"),
                );
            }
        }
    }

    pub(crate) fn compare_schema_ref(
        &mut self,
        left: &'a ReferenceOr<Schema>,
        right: &'a ReferenceOr<Schema>,
    ) {
        let left = self.left_side(left);
        let right = self.right_side(right);
        self.compare_sides(left, right);
    }

    fn compare_type(&mut self, left: Option<&SchemaType>, right: Option<&SchemaType>) {
        if left.map(SchemaType::tags) != right.map(SchemaType::tags) {
            self.push_difference(
                self.path.leaf("type"),
                snapshot(&left),
                snapshot(&right),
                "type differs",
            );
        }
    }

    fn compare_required(&mut self, left: &[String], right: &[String]) {
        let required = SetCompare::keys(left, right);
        if !required.same_keys() {
            let left: BTreeSet<_> = left.iter().collect();
            let right: BTreeSet<_> = right.iter().collect();
            self.push_difference(
                self.path.leaf("required"),
                snapshot(&left),
                snapshot(&right),
                "required properties differ",
            );
        }
    }

    fn compare_field<T>(&mut self, field: &str, left: &T, right: &T)
    where
        T: PartialEq + Serialize,
    {
        if left != right {
            self.push_difference(
                self.path.leaf(field),
                snapshot(left),
                snapshot(right),
                format!("{field} differs"),
            );
        }
    }

    /// Compare a keyword that holds either a boolean or a schema: presence
    /// first, then kind, then value.
    fn compare_bool_or_schema(
        &mut self,
        field: &str,
        left: Option<&'a BoolOrSchema>,
        right: Option<&'a BoolOrSchema>,
    ) {
        match (left, right) {
            (None, None) => {}
            (Some(BoolOrSchema::Bool(l)), Some(BoolOrSchema::Bool(r))) => {
                if l != r {
                    self.push_difference(
                        self.path.leaf(field),
                        Value::Bool(*l),
                        Value::Bool(*r),
                        format!("{field} differs"),
                    );
                }
            }
            (Some(BoolOrSchema::Schema(l)), Some(BoolOrSchema::Schema(r))) => {
                self.path.push_field(field);
                self.compare_schema_ref(l, r);
                self.path.pop();
            }
            (Some(l), Some(r)) => {
                self.push_difference(
                    self.path.leaf(field),
                    snapshot(l),
                    snapshot(r),
                    format!(
                        "{field} type mismatch: {} vs {}",
                        bool_or_schema_kind(l),
                        bool_or_schema_kind(r)
                    ),
                );
            }
            (l, r) => {
                self.push_difference(
                    self.path.leaf(field),
                    snapshot(&l),
                    snapshot(&r),
                    format!("{field} present on one side only"),
                );
            }
        }
    }

    fn compare_optional_schema(
        &mut self,
        field: &str,
        left: Option<&'a ReferenceOr<Schema>>,
        right: Option<&'a ReferenceOr<Schema>>,
    ) {
        match (left, right) {
            (None, None) => {}
            (Some(l), Some(r)) => {
                self.path.push_field(field);
                self.compare_schema_ref(l, r);
                self.path.pop();
            }
            (l, r) => {
                self.push_difference(
                    self.path.leaf(field),
                    snapshot(&l),
                    snapshot(&r),
                    format!("{field} present on one side only"),
                );
            }
        }
    }

    /// Composition lists must have the same length; members are then
    /// compared pairwise, in order.
    fn compare_schema_list(
        &mut self,
        field: &str,
        left: &'a [ReferenceOr<Schema>],
        right: &'a [ReferenceOr<Schema>],
    ) {
        if left.len() != right.len() {
            self.push_difference(
                self.path.leaf(field),
                Value::from(left.len()),
                Value::from(right.len()),
                format!("{field} entry count differs"),
            );
            return;
        }

        self.path.push_field(field);
        for (idx, (l, r)) in left.iter().zip(right.iter()).enumerate() {
            self.path.push_index(idx);
            self.compare_schema_ref(l, r);
            self.path.pop();
        }
        self.path.pop();
    }

    fn compare_schema_map(
        &mut self,
        field: &str,
        left: &'a IndexMap<String, ReferenceOr<Schema>>,
        right: &'a IndexMap<String, ReferenceOr<Schema>>,
    ) {
        let entries = SetCompare::new(left, right);
        if !entries.same_keys() {
            let left_keys: BTreeSet<_> = left.keys().collect();
            let right_keys: BTreeSet<_> = right.keys().collect();
            self.push_difference(
                self.path.leaf(field),
                snapshot(&left_keys),
                snapshot(&right_keys),
                format!("{field} keys differ"),
            );
        }

        self.path.push_field(field);
        for (key, (l, r)) in entries.common {
            self.path.push_field(key);
            self.compare_schema_ref(l, r);
            self.path.pop();
        }
        self.path.pop();
    }
}

fn bool_or_schema_kind(value: &BoolOrSchema) -> &'static str {
    match value {
        BoolOrSchema::Bool(_) => "boolean",
        BoolOrSchema::Schema(_) => "schema",
    }
}
