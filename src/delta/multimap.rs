//! Multimap (key to set of values) and its delta view.

use super::{shared, Delta, SetChanges, Shared};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::Arc;

/// A map from keys to non-empty sets of values.
///
/// Absent keys behave as if mapped to the empty set; empty sets are never
/// stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultiMap<K: Hash + Eq, V: Hash + Eq> {
    entries: HashMap<K, HashSet<V>>,
}

impl<K: Hash + Eq, V: Hash + Eq> Default for MultiMap<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Hash + Eq + Clone, V: Hash + Eq + Clone> MultiMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with a non-empty value set.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn contains(&self, key: &K, value: &V) -> bool {
        self.entries.get(key).is_some_and(|set| set.contains(value))
    }

    /// The value set for `key`, or `None` if it is empty.
    pub fn get(&self, key: &K) -> Option<&HashSet<V>> {
        self.entries.get(key)
    }

    /// The value set for `key`, empty if the key is absent.
    pub fn values(&self, key: &K) -> HashSet<V> {
        self.entries.get(key).cloned().unwrap_or_default()
    }

    pub fn add(&mut self, key: K, value: V) -> bool {
        self.entries.entry(key).or_default().insert(value)
    }

    pub fn remove(&mut self, key: &K, value: &V) -> bool {
        let Some(set) = self.entries.get_mut(key) else {
            return false;
        };
        let removed = set.remove(value);
        if set.is_empty() {
            self.entries.remove(key);
        }
        removed
    }

    /// Remove a key and return its former value set.
    pub fn remove_key(&mut self, key: &K) -> HashSet<V> {
        self.entries.remove(key).unwrap_or_default()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &HashSet<V>)> {
        self.entries.iter()
    }

    fn replace(&mut self, key: K, values: HashSet<V>) {
        if values.is_empty() {
            self.entries.remove(&key);
        } else {
            self.entries.insert(key, values);
        }
    }
}

impl<K: Hash + Eq + Clone, V: Hash + Eq + Clone> FromIterator<(K, V)> for MultiMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = MultiMap::new();
        for (k, v) in iter {
            map.add(k, v);
        }
        map
    }
}

/// A multimap view over a shared underlying [`MultiMap`].
///
/// Each touched key carries its own set changes; keys whose whole value set
/// was dropped are tracked separately. A key never appears in both, and a
/// key's change record always leaves a non-empty visible set.
#[derive(Clone, Debug)]
pub struct HashMultiMapDiff<K: Hash + Eq, V: Hash + Eq> {
    underlying: Shared<MultiMap<K, V>>,
    diffs: HashMap<K, SetChanges<V>>,
    removed_keys: HashSet<K>,
}

impl<K, V> HashMultiMapDiff<K, V>
where
    K: Hash + Eq + Clone,
    V: Hash + Eq + Clone,
{
    pub fn new(underlying: Shared<MultiMap<K, V>>) -> Self {
        Self {
            underlying,
            diffs: HashMap::new(),
            removed_keys: HashSet::new(),
        }
    }

    pub fn empty() -> Self {
        Self::new(shared(MultiMap::new()))
    }

    pub fn underlying(&self) -> &Shared<MultiMap<K, V>> {
        &self.underlying
    }

    /// Number of keys with a non-empty visible value set.
    pub fn len(&self) -> usize {
        let underlying = self.underlying.read();
        let added_keys = self
            .diffs
            .keys()
            .filter(|k| !underlying.contains_key(*k))
            .count();
        underlying.len() + added_keys - self.removed_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.diffs.contains_key(key)
            || (self.underlying.read().contains_key(key) && !self.removed_keys.contains(key))
    }

    pub fn contains(&self, key: &K, value: &V) -> bool {
        if self.removed_keys.contains(key) {
            return false;
        }
        let underlying = self.underlying.read();
        let empty = HashSet::new();
        match self.diffs.get(key) {
            Some(changes) => changes.contains(underlying.get(key).unwrap_or(&empty), value),
            None => underlying.contains(key, value),
        }
    }

    /// The visible value set for `key`; empty when the key is absent.
    pub fn get(&self, key: &K) -> HashSet<V> {
        if self.removed_keys.contains(key) {
            return HashSet::new();
        }
        let underlying = self.underlying.read();
        let empty = HashSet::new();
        match self.diffs.get(key) {
            Some(changes) => changes.materialize(underlying.get(key).unwrap_or(&empty)),
            None => underlying.values(key),
        }
    }

    /// Add `value` to the set for `key`. Returns true if the view changed.
    pub fn add(&mut self, key: K, value: V) -> bool {
        let underlying = self.underlying.read();
        let empty = HashSet::new();
        let base = underlying.get(&key).unwrap_or(&empty);
        let changes = ensure_diff(&mut self.diffs, &mut self.removed_keys, base, key.clone());
        let changed = changes.insert(base, value);
        if changes.record_count() == 0 {
            self.diffs.remove(&key);
        }
        changed
    }

    pub fn add_all(&mut self, key: K, values: impl IntoIterator<Item = V>) -> bool {
        let mut changed = false;
        for value in values {
            changed |= self.add(key.clone(), value);
        }
        changed
    }

    /// Remove `value` from the set for `key`. Returns true if it was present.
    pub fn remove(&mut self, key: &K, value: &V) -> bool {
        if !self.contains(key, value) {
            return false;
        }
        let (now_empty, unchanged) = {
            let underlying = self.underlying.read();
            let empty = HashSet::new();
            let base = underlying.get(key).unwrap_or(&empty);
            let changes = ensure_diff(&mut self.diffs, &mut self.removed_keys, base, key.clone());
            changes.remove(base, value);
            (changes.is_empty(base), changes.record_count() == 0)
        };
        if now_empty {
            self.remove_key(key);
        } else if unchanged {
            self.diffs.remove(key);
        }
        true
    }

    /// Drop every value of `key`, returning the previously visible set.
    pub fn remove_key(&mut self, key: &K) -> HashSet<V> {
        let old = self.get(key);
        self.diffs.remove(key);
        if self.underlying.read().contains_key(key) {
            self.removed_keys.insert(key.clone());
        }
        old
    }

    /// Replace the value set of `key`, returning the previously visible set.
    pub fn put(&mut self, key: K, values: HashSet<V>) -> HashSet<V> {
        let old = self.get(&key);
        if values.is_empty() {
            self.remove_key(&key);
            return old;
        }

        let underlying = self.underlying.read();
        let empty = HashSet::new();
        let base = underlying.get(&key).unwrap_or(&empty);
        let mut changes = SetChanges::default();
        for origin in base.iter().filter(|v| !values.contains(*v)) {
            changes.remove(base, origin);
        }
        for value in values {
            changes.insert(base, value);
        }
        self.removed_keys.remove(&key);
        if changes.record_count() == 0 {
            self.diffs.remove(&key);
        } else {
            self.diffs.insert(key, changes);
        }
        old
    }

    /// Make every key map to the empty set.
    pub fn clear(&mut self) {
        self.diffs.clear();
        self.removed_keys = self.underlying.read().keys().cloned().collect();
    }

    /// Keys whose value set here differs from the underlying multimap.
    pub fn changed_keys(&self) -> HashSet<K> {
        self.diffs
            .keys()
            .chain(self.removed_keys.iter())
            .cloned()
            .collect()
    }

    /// Values of `key` present here but not in the underlying multimap.
    pub fn added_values(&self, key: &K) -> HashSet<V> {
        self.diffs
            .get(key)
            .map(|c| c.additions.clone())
            .unwrap_or_default()
    }

    /// Values of `key` present in the underlying multimap but not here.
    pub fn removed_values(&self, key: &K) -> HashSet<V> {
        if self.removed_keys.contains(key) {
            return self.underlying.read().values(key);
        }
        self.diffs
            .get(key)
            .map(|c| c.removals.clone())
            .unwrap_or_default()
    }

    /// Visible keys: underlying keys not removed, then keys only present here.
    pub fn keys(&self) -> Vec<K> {
        let underlying = self.underlying.read();
        let mut keys: Vec<K> = underlying
            .keys()
            .filter(|k| !self.removed_keys.contains(*k))
            .cloned()
            .collect();
        keys.extend(
            self.diffs
                .keys()
                .filter(|k| !underlying.contains_key(*k))
                .cloned(),
        );
        keys
    }

    /// Snapshot of the visible multimap.
    pub fn to_multimap(&self) -> MultiMap<K, V> {
        let mut map = MultiMap::new();
        for key in self.keys() {
            let values = self.get(&key);
            map.replace(key, values);
        }
        map
    }
}

impl<K, V> Delta for HashMultiMapDiff<K, V>
where
    K: Hash + Eq + Clone,
    V: Hash + Eq + Clone,
{
    fn commit(&mut self) {
        let mut underlying = self.underlying.write();
        for key in self.removed_keys.drain() {
            underlying.remove_key(&key);
        }
        for (key, changes) in self.diffs.drain() {
            let mut values = underlying.remove_key(&key);
            changes.apply_to(&mut values);
            underlying.replace(key, values);
        }
    }

    fn clear_changes(&mut self) {
        self.diffs = HashMap::new();
        self.removed_keys = HashSet::new();
    }

    fn delta_len(&self) -> usize {
        self.removed_keys.len()
            + self
                .diffs
                .values()
                .map(SetChanges::record_count)
                .sum::<usize>()
    }

    fn underlying_len(&self) -> usize {
        self.underlying.read().len()
    }

    fn is_exclusive(&self) -> bool {
        Arc::strong_count(&self.underlying) == 1
    }

    fn rebase(&mut self) {
        let materialized = self.to_multimap();
        self.underlying = shared(materialized);
        self.clear_changes();
    }
}

/// Fetch the change record for `key`, creating it if needed. A key that was
/// dropped wholesale gets a record hiding every underlying value.
fn ensure_diff<'d, K, V>(
    diffs: &'d mut HashMap<K, SetChanges<V>>,
    removed_keys: &mut HashSet<K>,
    base: &HashSet<V>,
    key: K,
) -> &'d mut SetChanges<V>
where
    K: Hash + Eq + Clone,
    V: Hash + Eq + Clone,
{
    let was_removed = removed_keys.remove(&key);
    diffs.entry(key).or_insert_with(|| {
        let mut changes = SetChanges::default();
        if was_removed {
            changes.removals = base.clone();
        }
        changes
    })
}
