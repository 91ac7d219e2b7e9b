// Copyright 2025 Oxide Computer Company

//! The named collections in which collisions can occur, and the value each
//! one holds.

use std::fmt;

use serde::Serialize;

use crate::model::{
    Callback, Dialect, Example, Header, Link, Parameter, PathItem, ReferenceOr, RequestBody,
    Response, Schema, SecurityScheme,
};

/// A named collection of a document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Schema,
    Path,
    Webhook,
    Response,
    Parameter,
    Example,
    RequestBody,
    Header,
    SecurityScheme,
    Link,
    Callback,
}

impl Category {
    pub const ALL: [Category; 11] = [
        Category::Schema,
        Category::Path,
        Category::Webhook,
        Category::Response,
        Category::Parameter,
        Category::Example,
        Category::RequestBody,
        Category::Header,
        Category::SecurityScheme,
        Category::Link,
        Category::Callback,
    ];

    /// Component categories that entries can be renamed in.
    pub const RENAMABLE: [Category; 8] = [
        Category::Schema,
        Category::Parameter,
        Category::Example,
        Category::RequestBody,
        Category::Header,
        Category::SecurityScheme,
        Category::Link,
        Category::Callback,
    ];

    /// Paths, webhooks and responses have no identity other than their key:
    /// a renamed path is a different endpoint and a response is keyed by
    /// what clients match on.
    pub fn supports_rename(self) -> bool {
        !matches!(self, Category::Path | Category::Webhook | Category::Response)
    }

    /// The kind of value entries of this collection hold.
    pub fn expected_kind(self) -> ValueKind {
        match self {
            Category::Schema => ValueKind::Schema,
            Category::Path | Category::Webhook => ValueKind::PathItem,
            Category::Response => ValueKind::Response,
            Category::Parameter => ValueKind::Parameter,
            Category::Example => ValueKind::Example,
            Category::RequestBody => ValueKind::RequestBody,
            Category::Header => ValueKind::Header,
            Category::SecurityScheme => ValueKind::SecurityScheme,
            Category::Link => ValueKind::Link,
            Category::Callback => ValueKind::Callback,
        }
    }

    /// Which configured strategy governs collisions in this collection.
    pub fn strategy_scope(self) -> StrategyScope {
        match self {
            Category::Path | Category::Webhook => StrategyScope::Path,
            Category::Schema => StrategyScope::Schema,
            _ => StrategyScope::Component,
        }
    }

    /// The JSON pointer of this collection in a document of the given
    /// dialect, if the dialect has such a collection.
    pub fn collection_pointer(self, dialect: Dialect) -> Option<&'static str> {
        match dialect {
            Dialect::OpenApi3 => Some(match self {
                Category::Schema => "#/components/schemas",
                Category::Path => "#/paths",
                Category::Webhook => "#/webhooks",
                Category::Response => "#/components/responses",
                Category::Parameter => "#/components/parameters",
                Category::Example => "#/components/examples",
                Category::RequestBody => "#/components/requestBodies",
                Category::Header => "#/components/headers",
                Category::SecurityScheme => "#/components/securitySchemes",
                Category::Link => "#/components/links",
                Category::Callback => "#/components/callbacks",
            }),
            Dialect::Swagger2 => match self {
                Category::Schema => Some("#/definitions"),
                Category::Path => Some("#/paths"),
                Category::Response => Some("#/responses"),
                Category::Parameter => Some("#/parameters"),
                Category::SecurityScheme => Some("#/securityDefinitions"),
                Category::Webhook
                | Category::Example
                | Category::RequestBody
                | Category::Header
                | Category::Link
                | Category::Callback => None,
            },
        }
    }

    /// The prefix of `$ref` strings naming entries of this collection, e.g.
    /// `#/components/schemas/`. Paths and webhooks are not referenced by
    /// components.
    pub fn reference_prefix(self, dialect: Dialect) -> Option<String> {
        match self {
            Category::Path | Category::Webhook => None,
            _ => self
                .collection_pointer(dialect)
                .map(|pointer| format!("{pointer}/")),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Schema => "schema",
            Category::Path => "path",
            Category::Webhook => "webhook",
            Category::Response => "response",
            Category::Parameter => "parameter",
            Category::Example => "example",
            Category::RequestBody => "request-body",
            Category::Header => "header",
            Category::SecurityScheme => "security-scheme",
            Category::Link => "link",
            Category::Callback => "callback",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The strategy slot of the configuration a category reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrategyScope {
    Path,
    Schema,
    Component,
}

/// The type of value held by a collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Schema,
    PathItem,
    Response,
    Parameter,
    Example,
    RequestBody,
    Header,
    SecurityScheme,
    Link,
    Callback,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Schema => "schema",
            ValueKind::PathItem => "path item",
            ValueKind::Response => "response",
            ValueKind::Parameter => "parameter",
            ValueKind::Example => "example",
            ValueKind::RequestBody => "request body",
            ValueKind::Header => "header",
            ValueKind::SecurityScheme => "security scheme",
            ValueKind::Link => "link",
            ValueKind::Callback => "callback",
        };
        f.write_str(name)
    }
}

/// A borrowed view of one side of a collision.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(untagged)]
pub enum ComponentValue<'a> {
    Schema(&'a ReferenceOr<Schema>),
    PathItem(&'a PathItem),
    Response(&'a ReferenceOr<Response>),
    Parameter(&'a ReferenceOr<Parameter>),
    Example(&'a ReferenceOr<Example>),
    RequestBody(&'a ReferenceOr<RequestBody>),
    Header(&'a ReferenceOr<Header>),
    SecurityScheme(&'a ReferenceOr<SecurityScheme>),
    Link(&'a ReferenceOr<Link>),
    Callback(&'a ReferenceOr<Callback>),
}

impl ComponentValue<'_> {
    pub fn kind(&self) -> ValueKind {
        match self {
            ComponentValue::Schema(_) => ValueKind::Schema,
            ComponentValue::PathItem(_) => ValueKind::PathItem,
            ComponentValue::Response(_) => ValueKind::Response,
            ComponentValue::Parameter(_) => ValueKind::Parameter,
            ComponentValue::Example(_) => ValueKind::Example,
            ComponentValue::RequestBody(_) => ValueKind::RequestBody,
            ComponentValue::Header(_) => ValueKind::Header,
            ComponentValue::SecurityScheme(_) => ValueKind::SecurityScheme,
            ComponentValue::Link(_) => ValueKind::Link,
            ComponentValue::Callback(_) => ValueKind::Callback,
        }
    }

    pub fn as_schema(&self) -> Option<&ReferenceOr<Schema>> {
        match self {
            ComponentValue::Schema(schema) => Some(schema),
            _ => None,
        }
    }
}

/// A replacement value supplied by a decision handler.
#[derive(Clone, Debug, PartialEq)]
pub enum CustomValue {
    Schema(ReferenceOr<Schema>),
    PathItem(PathItem),
    Response(ReferenceOr<Response>),
    Parameter(ReferenceOr<Parameter>),
    Example(ReferenceOr<Example>),
    RequestBody(ReferenceOr<RequestBody>),
    Header(ReferenceOr<Header>),
    SecurityScheme(ReferenceOr<SecurityScheme>),
    Link(ReferenceOr<Link>),
    Callback(ReferenceOr<Callback>),
}

impl CustomValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            CustomValue::Schema(_) => ValueKind::Schema,
            CustomValue::PathItem(_) => ValueKind::PathItem,
            CustomValue::Response(_) => ValueKind::Response,
            CustomValue::Parameter(_) => ValueKind::Parameter,
            CustomValue::Example(_) => ValueKind::Example,
            CustomValue::RequestBody(_) => ValueKind::RequestBody,
            CustomValue::Header(_) => ValueKind::Header,
            CustomValue::SecurityScheme(_) => ValueKind::SecurityScheme,
            CustomValue::Link(_) => ValueKind::Link,
            CustomValue::Callback(_) => ValueKind::Callback,
        }
    }
}

/// A value that can live in a named collection.
pub trait Component: Clone + PartialEq + Serialize {
    const KIND: ValueKind;

    fn view(&self) -> ComponentValue<'_>;

    /// Take the replacement out of a custom value, handing the value back if
    /// it is of the wrong kind.
    fn from_custom(value: CustomValue) -> Result<Self, CustomValue>;
}

macro_rules! component {
    ($ty:ty, $variant:ident) => {
        impl Component for $ty {
            const KIND: ValueKind = ValueKind::$variant;

            fn view(&self) -> ComponentValue<'_> {
                ComponentValue::$variant(self)
            }

            fn from_custom(value: CustomValue) -> Result<Self, CustomValue> {
                match value {
                    CustomValue::$variant(value) => Ok(value),
                    other => Err(other),
                }
            }
        }
    };
}

component!(ReferenceOr<Schema>, Schema);
component!(PathItem, PathItem);
component!(ReferenceOr<Response>, Response);
component!(ReferenceOr<Parameter>, Parameter);
component!(ReferenceOr<Example>, Example);
component!(ReferenceOr<RequestBody>, RequestBody);
component!(ReferenceOr<Header>, Header);
component!(ReferenceOr<SecurityScheme>, SecurityScheme);
component!(ReferenceOr<Link>, Link);
component!(ReferenceOr<Callback>, Callback);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_category_has_a_kind_with_a_component() {
        for category in Category::ALL {
            let kind = category.expected_kind();
            // Webhooks and paths share the path item kind.
            if matches!(category, Category::Path | Category::Webhook) {
                assert_eq!(kind, <PathItem as Component>::KIND);
            }
        }
        assert_eq!(
            <ReferenceOr<Schema> as Component>::KIND,
            Category::Schema.expected_kind()
        );
    }

    #[test]
    fn rename_support() {
        let unsupported: Vec<_> = Category::ALL
            .into_iter()
            .filter(|c| !c.supports_rename())
            .collect();
        assert_eq!(
            unsupported,
            [Category::Path, Category::Webhook, Category::Response]
        );
        assert!(Category::RENAMABLE.iter().all(|c| c.supports_rename()));
    }

    #[test]
    fn reference_prefixes_follow_the_dialect() {
        assert_eq!(
            Category::Schema.reference_prefix(Dialect::OpenApi3).as_deref(),
            Some("#/components/schemas/")
        );
        assert_eq!(
            Category::Schema.reference_prefix(Dialect::Swagger2).as_deref(),
            Some("#/definitions/")
        );
        assert_eq!(Category::Path.reference_prefix(Dialect::OpenApi3), None);
        assert_eq!(Category::Header.reference_prefix(Dialect::Swagger2), None);
    }

    #[test]
    fn custom_values_are_checked_by_kind() {
        let value = CustomValue::PathItem(PathItem::default());
        let err = <ReferenceOr<Schema> as Component>::from_custom(value).unwrap_err();
        assert_eq!(err.kind(), ValueKind::PathItem);

        let value = CustomValue::PathItem(PathItem::default());
        assert!(<PathItem as Component>::from_custom(value).is_ok());
    }
}
