// Copyright 2025 Oxide Computer Company

use std::collections::BTreeMap;

use crate::category::Category;

/// Old names and the names that replace them within one collection.
///
/// Every entry maps to a terminal name: inserting `b -> c` when `a -> b` is
/// already present leaves `a -> c`, and inserting `a -> b` when `b -> c` is
/// present records `a -> c`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AliasTable {
    aliases: BTreeMap<String, String>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, old: impl Into<String>, new: impl Into<String>) {
        let old = old.into();
        let new = new.into();
        let target = self.resolve(&new).to_string();

        // An alias back onto itself would make the table cyclic.
        if target == old {
            return;
        }

        for existing in self.aliases.values_mut() {
            if *existing == old {
                existing.clone_from(&target);
            }
        }
        self.aliases.insert(old, target);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.aliases.get(name).map(String::as_str)
    }

    /// The name `name` ends up as: its alias, or itself.
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.get(name).unwrap_or(name)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// One [`AliasTable`] per collection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AliasTables {
    tables: BTreeMap<Category, AliasTable>,
}

impl AliasTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, category: Category, old: impl Into<String>, new: impl Into<String>) {
        self.tables.entry(category).or_default().insert(old, new);
    }

    pub fn table(&self, category: Category) -> Option<&AliasTable> {
        self.tables.get(&category).filter(|table| !table.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.tables.values().all(AliasTable::is_empty)
    }

    pub fn len(&self) -> usize {
        self.tables.values().map(AliasTable::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &AliasTable)> {
        self.tables
            .iter()
            .filter(|(_, table)| !table.is_empty())
            .map(|(category, table)| (*category, table))
    }
}
