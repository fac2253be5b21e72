//! Hash map represented as changes to a shared underlying map.

use super::{shared, Delta, Shared};
use crate::error::{Result, SmcError};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

/// Local record for a key whose value differs from the underlying map.
#[derive(Clone, Debug, PartialEq)]
enum Change<V> {
    Set(V),
    Removed,
}

/// A map view over a shared underlying `HashMap`.
///
/// Only keys whose visible value differs from the underlying map are stored
/// locally; putting back the underlying value drops the record.
#[derive(Clone, Debug)]
pub struct HashMapDiff<K, V> {
    underlying: Shared<HashMap<K, V>>,
    changed: HashMap<K, Change<V>>,
}

impl<K, V> HashMapDiff<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone + PartialEq,
{
    /// Create a view with no changes over `underlying`.
    pub fn new(underlying: Shared<HashMap<K, V>>) -> Self {
        Self {
            underlying,
            changed: HashMap::new(),
        }
    }

    /// Create a view over a fresh, private empty map.
    pub fn empty() -> Self {
        Self::new(shared(HashMap::new()))
    }

    pub fn underlying(&self) -> &Shared<HashMap<K, V>> {
        &self.underlying
    }

    pub fn get(&self, key: &K) -> Option<V> {
        match self.changed.get(key) {
            Some(Change::Set(v)) => Some(v.clone()),
            Some(Change::Removed) => None,
            None => self.underlying.read().get(key).cloned(),
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        match self.changed.get(key) {
            Some(Change::Set(_)) => true,
            Some(Change::Removed) => false,
            None => self.underlying.read().contains_key(key),
        }
    }

    /// Number of visible entries, computed in O(changes).
    pub fn len(&self) -> usize {
        let underlying = self.underlying.read();
        let mut len = underlying.len();
        for (key, change) in &self.changed {
            match change {
                Change::Removed => len -= 1,
                Change::Set(_) if !underlying.contains_key(key) => len += 1,
                Change::Set(_) => {}
            }
        }
        len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Map `key` to `value`, returning the previously visible value.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let underlying = self.underlying.read();
        let underlying_value = underlying.get(&key);
        let old = match self.changed.get(&key) {
            Some(Change::Set(v)) => Some(v.clone()),
            Some(Change::Removed) => None,
            None => underlying_value.cloned(),
        };

        if underlying_value == Some(&value) {
            self.changed.remove(&key);
        } else {
            self.changed.insert(key, Change::Set(value));
        }
        old
    }

    /// Remove `key`, returning the previously visible value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let underlying = self.underlying.read();
        let underlying_value = underlying.get(key);
        let old = match self.changed.get(key) {
            Some(Change::Set(v)) => Some(v.clone()),
            Some(Change::Removed) => None,
            None => underlying_value.cloned(),
        };

        if underlying_value.is_some() {
            self.changed.insert(key.clone(), Change::Removed);
        } else {
            self.changed.remove(key);
        }
        old
    }

    /// Keys whose value here differs from the underlying map, including keys
    /// present in only one of the two.
    pub fn changed_keys(&self) -> impl Iterator<Item = &K> {
        self.changed.keys()
    }

    /// Keys removed relative to the underlying map.
    pub fn removed_keys(&self) -> impl Iterator<Item = &K> {
        self.changed
            .iter()
            .filter(|(_, c)| matches!(c, Change::Removed))
            .map(|(k, _)| k)
    }

    /// Visible keys: underlying keys not removed, then keys only present here.
    pub fn keys(&self) -> Vec<K> {
        let underlying = self.underlying.read();
        let mut keys: Vec<K> = underlying
            .keys()
            .filter(|k| !matches!(self.changed.get(*k), Some(Change::Removed)))
            .cloned()
            .collect();
        keys.extend(
            self.changed
                .iter()
                .filter(|(k, c)| matches!(c, Change::Set(_)) && !underlying.contains_key(*k))
                .map(|(k, _)| k.clone()),
        );
        keys
    }

    /// Snapshot of the visible entries.
    pub fn entries(&self) -> Vec<(K, V)> {
        let underlying = self.underlying.read();
        let mut entries = Vec::with_capacity(underlying.len());
        for (key, value) in underlying.iter() {
            match self.changed.get(key) {
                Some(Change::Removed) => {}
                Some(Change::Set(v)) => entries.push((key.clone(), v.clone())),
                None => entries.push((key.clone(), value.clone())),
            }
        }
        for (key, change) in &self.changed {
            if let Change::Set(v) = change {
                if !underlying.contains_key(key) {
                    entries.push((key.clone(), v.clone()));
                }
            }
        }
        entries
    }

    pub fn to_map(&self) -> HashMap<K, V> {
        self.entries().into_iter().collect()
    }

    /// A cursor that can remove or overwrite the entry it last yielded.
    pub fn cursor(&mut self) -> MapCursor<'_, K, V> {
        let pending = self.keys();
        MapCursor {
            diff: self,
            pending: pending.into_iter(),
            current: None,
        }
    }
}

impl<K, V> Delta for HashMapDiff<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone + PartialEq,
{
    fn commit(&mut self) {
        let mut underlying = self.underlying.write();
        for (key, change) in self.changed.drain() {
            match change {
                Change::Set(v) => {
                    underlying.insert(key, v);
                }
                Change::Removed => {
                    underlying.remove(&key);
                }
            }
        }
    }

    fn clear_changes(&mut self) {
        self.changed = HashMap::new();
    }

    fn delta_len(&self) -> usize {
        self.changed.len()
    }

    fn underlying_len(&self) -> usize {
        self.underlying.read().len()
    }

    fn is_exclusive(&self) -> bool {
        Arc::strong_count(&self.underlying) == 1
    }

    fn rebase(&mut self) {
        let materialized = self.to_map();
        self.underlying = shared(materialized);
        self.changed = HashMap::new();
    }
}

/// Cursor over a [`HashMapDiff`].
///
/// Writes through the cursor go to the view's change records, never to the
/// underlying map, so they cannot disturb the iteration.
pub struct MapCursor<'a, K, V> {
    diff: &'a mut HashMapDiff<K, V>,
    pending: std::vec::IntoIter<K>,
    current: Option<K>,
}

impl<'a, K, V> MapCursor<'a, K, V>
where
    K: Hash + Eq + Clone,
    V: Clone + PartialEq,
{
    /// Remove the entry most recently yielded.
    pub fn remove(&mut self) -> Result<V> {
        let key = self
            .current
            .take()
            .ok_or_else(|| SmcError::InvalidOperation("Nothing to remove".to_string()))?;
        self.diff.remove(&key).ok_or_else(|| {
            SmcError::InvalidOperation(
                "entry was removed independently of the cursor".to_string(),
            )
        })
    }

    /// Replace the value of the entry most recently yielded.
    pub fn set_value(&mut self, value: V) -> Result<V> {
        let key = self
            .current
            .clone()
            .ok_or_else(|| SmcError::InvalidOperation("No current entry".to_string()))?;
        if !self.diff.contains_key(&key) {
            return Err(SmcError::InvalidOperation(
                "entry was removed independently of the cursor".to_string(),
            ));
        }
        self.diff.insert(key, value).ok_or_else(|| {
            SmcError::InvalidOperation("entry vanished during update".to_string())
        })
    }
}

impl<'a, K, V> Iterator for MapCursor<'a, K, V>
where
    K: Hash + Eq + Clone,
    V: Clone + PartialEq,
{
    type Item = (K, V);

    fn next(&mut self) -> Option<(K, V)> {
        for key in self.pending.by_ref() {
            if let Some(value) = self.diff.get(&key) {
                self.current = Some(key.clone());
                return Some((key, value));
            }
        }
        self.current = None;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(entries: &[(&'static str, i32)]) -> Shared<HashMap<&'static str, i32>> {
        shared(entries.iter().copied().collect())
    }

    #[test]
    fn test_get_falls_through_to_underlying() {
        let mut diff = HashMapDiff::new(base(&[("a", 1), ("b", 2)]));
        diff.insert("b", 20);
        diff.remove(&"a");
        diff.insert("c", 3);

        assert_eq!(diff.get(&"a"), None);
        assert_eq!(diff.get(&"b"), Some(20));
        assert_eq!(diff.get(&"c"), Some(3));
        assert_eq!(diff.len(), 2);
    }

    #[test]
    fn test_put_back_underlying_value_drops_change() {
        let mut diff = HashMapDiff::new(base(&[("a", 1)]));
        assert_eq!(diff.insert("a", 5), Some(1));
        assert_eq!(diff.delta_len(), 1);
        assert_eq!(diff.insert("a", 1), Some(5));
        assert_eq!(diff.delta_len(), 0);
    }

    #[test]
    fn test_remove_then_readd() {
        let mut diff = HashMapDiff::new(base(&[("a", 1)]));
        assert_eq!(diff.remove(&"a"), Some(1));
        assert_eq!(diff.remove(&"a"), None);
        assert_eq!(diff.insert("a", 1), None);
        assert!(!diff.has_changes());

        diff.insert("z", 9);
        assert_eq!(diff.remove(&"z"), Some(9));
        assert!(!diff.has_changes());
    }

    #[test]
    fn test_changed_keys() {
        let mut diff = HashMapDiff::new(base(&[("a", 1), ("b", 2)]));
        diff.insert("a", 10);
        diff.remove(&"b");
        diff.insert("c", 3);

        let mut changed: Vec<_> = diff.changed_keys().copied().collect();
        changed.sort();
        assert_eq!(changed, vec!["a", "b", "c"]);
        let removed: Vec<_> = diff.removed_keys().copied().collect();
        assert_eq!(removed, vec!["b"]);
    }

    #[test]
    fn test_commit_and_clear() {
        let shared_map = base(&[("a", 1), ("b", 2)]);
        let mut diff = HashMapDiff::new(Arc::clone(&shared_map));
        diff.insert("a", 10);
        diff.remove(&"b");
        diff.insert("c", 3);
        let expected = diff.to_map();

        diff.commit();
        assert_eq!(*shared_map.read(), expected);

        diff.insert("d", 4);
        diff.clear_changes();
        assert_eq!(diff.to_map(), *shared_map.read());
    }

    #[test]
    fn test_cursor_remove_and_set() {
        let mut diff = HashMapDiff::new(base(&[("a", 1), ("b", 2), ("c", 3)]));
        diff.insert("d", 4);

        let mut cursor = diff.cursor();
        while let Some((key, value)) = cursor.next() {
            if value % 2 == 0 {
                cursor.remove().unwrap();
            } else if key == "c" {
                cursor.set_value(30).unwrap();
            }
        }

        let mut entries = diff.entries();
        entries.sort();
        assert_eq!(entries, vec![("a", 1), ("c", 30)]);
    }

    #[test]
    fn test_cursor_remove_twice_fails() {
        let mut diff = HashMapDiff::new(base(&[("a", 1)]));
        let mut cursor = diff.cursor();
        cursor.next();
        cursor.remove().unwrap();
        assert!(matches!(cursor.remove(), Err(SmcError::InvalidOperation(_))));
    }
}
