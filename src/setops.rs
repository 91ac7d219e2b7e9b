// Copyright 2025 Oxide Computer Company

use std::collections::BTreeMap;

/// The partition of two keyed collections into entries unique to the left,
/// entries unique to the right, and entries present in both. All three are
/// sorted by key.
#[derive(Debug)]
pub struct SetCompare<K, V> {
    pub left_only: BTreeMap<K, V>,
    pub common: BTreeMap<K, (V, V)>,
    pub right_only: BTreeMap<K, V>,
}

impl<K: Ord, V> SetCompare<K, V> {
    pub fn new<I, I2>(left: I, right: I2) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        I2: IntoIterator<Item = (K, V)>,
    {
        let left = left.into_iter().collect::<BTreeMap<_, _>>();
        let mut right = right.into_iter().collect::<BTreeMap<_, _>>();

        let mut compare = Self {
            left_only: BTreeMap::new(),
            common: BTreeMap::new(),
            right_only: BTreeMap::new(),
        };

        for (key, left_value) in left {
            match right.remove(&key) {
                Some(right_value) => {
                    compare.common.insert(key, (left_value, right_value));
                }
                None => {
                    compare.left_only.insert(key, left_value);
                }
            }
        }
        compare.right_only = right;

        compare
    }

    /// Both sides contain exactly the same keys.
    pub fn same_keys(&self) -> bool {
        self.left_only.is_empty() && self.right_only.is_empty()
    }
}

impl<K: Ord> SetCompare<K, ()> {
    /// Compare two collections of bare keys, ignoring order and duplicates.
    pub fn keys<I, I2>(left: I, right: I2) -> Self
    where
        I: IntoIterator<Item = K>,
        I2: IntoIterator<Item = K>,
    {
        Self::new(
            left.into_iter().map(|k| (k, ())),
            right.into_iter().map(|k| (k, ())),
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::setops::SetCompare;

    #[test]
    fn partition_by_key() {
        let left = [(1, "a"), (2, "b")];
        let right = [(1, "aa"), (3, "c")];

        let cmp = SetCompare::new(left, right);

        assert_eq!(cmp.left_only.len(), 1);
        assert_eq!(cmp.common.len(), 1);
        assert_eq!(cmp.right_only.len(), 1);
        assert!(!cmp.same_keys());

        assert_eq!(cmp.left_only.get(&2).unwrap(), &"b");
        assert_eq!(cmp.right_only.get(&3).unwrap(), &"c");
        assert_eq!(cmp.common.get(&1).unwrap(), &("a", "aa"));
    }

    #[test]
    fn keys_ignore_order() {
        let cmp = SetCompare::keys(["id", "name"], ["name", "id"]);
        assert!(cmp.same_keys());
        assert_eq!(cmp.common.len(), 2);

        let cmp = SetCompare::keys(["id"], ["id", "email"]);
        assert!(!cmp.same_keys());
        assert!(cmp.right_only.contains_key("email"));
    }
}
