//! Delta collections.
//!
//! A delta collection is a view over a shared, externally owned underlying
//! collection plus a small local record of changes. Forking a view copies
//! only the changes, so cost is bounded by what changed since the shared
//! ancestor rather than by the size of the collection.
//!
//! Changes stay local until [`Delta::commit`] applies them to the underlying
//! collection, or [`Delta::clear_changes`] discards them.

mod indexed;
mod map;
mod multimap;
mod set;
mod sorted;

pub use indexed::{Block, IndexedCursor, IndexedSetDiff};
pub use map::{HashMapDiff, MapCursor};
pub use multimap::{HashMultiMapDiff, MultiMap};
pub use set::{HashSetDiff, SetCursor};
pub use sorted::IndexedSet;

use parking_lot::RwLock;
use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

/// An underlying collection shared between delta views.
pub type Shared<T> = Arc<RwLock<T>>;

/// Wrap a collection so delta views can share it.
pub fn shared<T>(collection: T) -> Shared<T> {
    Arc::new(RwLock::new(collection))
}

/// Commit/rollback contract common to every delta collection.
pub trait Delta {
    /// Apply all local changes to the underlying collection, then clear them.
    ///
    /// Every other view over the same underlying observes the result, so
    /// callers commit only when this view is the sole owner or the new
    /// baseline for all sharers.
    fn commit(&mut self);

    /// Discard local changes so this view equals the underlying collection.
    fn clear_changes(&mut self);

    /// Number of change records held locally.
    fn delta_len(&self) -> usize;

    /// Number of entries in the underlying collection.
    fn underlying_len(&self) -> usize;

    /// True if no other view references the underlying collection.
    fn is_exclusive(&self) -> bool;

    /// Materialize this view into a fresh private underlying collection and
    /// clear the local changes. The previous underlying is left untouched.
    fn rebase(&mut self);

    fn has_changes(&self) -> bool {
        self.delta_len() > 0
    }
}

/// Additions and removals of a set relative to some underlying set.
///
/// The underlying set is passed to each call so the same bookkeeping serves
/// stand-alone set views and the per-key value sets of a multimap view.
/// `additions` never intersects the underlying set and `removals` is always a
/// subset of it.
#[derive(Clone, Debug)]
pub(crate) struct SetChanges<T> {
    pub(crate) additions: HashSet<T>,
    pub(crate) removals: HashSet<T>,
}

impl<T> Default for SetChanges<T> {
    fn default() -> Self {
        Self {
            additions: HashSet::new(),
            removals: HashSet::new(),
        }
    }
}

impl<T: Hash + Eq + Clone> SetChanges<T> {
    pub(crate) fn contains(&self, underlying: &HashSet<T>, x: &T) -> bool {
        self.additions.contains(x) || (underlying.contains(x) && !self.removals.contains(x))
    }

    pub(crate) fn len(&self, underlying: &HashSet<T>) -> usize {
        underlying.len() + self.additions.len() - self.removals.len()
    }

    pub(crate) fn insert(&mut self, underlying: &HashSet<T>, x: T) -> bool {
        if underlying.contains(&x) {
            // re-adding an underlying element cancels its removal
            return self.removals.remove(&x);
        }
        self.additions.insert(x)
    }

    pub(crate) fn remove(&mut self, underlying: &HashSet<T>, x: &T) -> bool {
        if underlying.contains(x) {
            return self.removals.insert(x.clone());
        }
        self.additions.remove(x)
    }

    pub(crate) fn is_empty(&self, underlying: &HashSet<T>) -> bool {
        self.len(underlying) == 0
    }

    pub(crate) fn record_count(&self) -> usize {
        self.additions.len() + self.removals.len()
    }

    pub(crate) fn materialize(&self, underlying: &HashSet<T>) -> HashSet<T> {
        underlying
            .iter()
            .filter(|x| !self.removals.contains(*x))
            .chain(self.additions.iter())
            .cloned()
            .collect()
    }

    pub(crate) fn apply_to(&self, underlying: &mut HashSet<T>) {
        for x in &self.removals {
            underlying.remove(x);
        }
        underlying.extend(self.additions.iter().cloned());
    }

    pub(crate) fn clear(&mut self) {
        self.additions.clear();
        self.removals.clear();
    }
}
