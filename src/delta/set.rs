//! Hash set represented as changes to a shared underlying set.

use super::{shared, Delta, SetChanges, Shared};
use crate::error::{Result, SmcError};
use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

/// A set view over a shared underlying `HashSet`.
///
/// Membership is `x ∈ additions ∨ (x ∈ underlying ∧ x ∉ removals)`. The
/// underlying set is never written except by [`Delta::commit`].
#[derive(Clone, Debug)]
pub struct HashSetDiff<T> {
    underlying: Shared<HashSet<T>>,
    changes: SetChanges<T>,
}

impl<T: Hash + Eq + Clone> HashSetDiff<T> {
    /// Create a view with no changes over `underlying`.
    pub fn new(underlying: Shared<HashSet<T>>) -> Self {
        Self {
            underlying,
            changes: SetChanges::default(),
        }
    }

    /// Create a view over a fresh, private empty set.
    pub fn empty() -> Self {
        Self::new(shared(HashSet::new()))
    }

    /// The shared underlying set.
    pub fn underlying(&self) -> &Shared<HashSet<T>> {
        &self.underlying
    }

    pub fn len(&self) -> usize {
        self.changes.len(&self.underlying.read())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, x: &T) -> bool {
        self.changes.contains(&self.underlying.read(), x)
    }

    /// Add an element. Returns true if the view changed.
    pub fn insert(&mut self, x: T) -> bool {
        let underlying = self.underlying.read();
        self.changes.insert(&underlying, x)
    }

    /// Remove an element. Returns true if the view changed.
    pub fn remove(&mut self, x: &T) -> bool {
        let underlying = self.underlying.read();
        self.changes.remove(&underlying, x)
    }

    /// Elements present here but not in the underlying set.
    pub fn additions(&self) -> &HashSet<T> {
        &self.changes.additions
    }

    /// Underlying elements hidden by this view.
    pub fn removals(&self) -> &HashSet<T> {
        &self.changes.removals
    }

    /// Snapshot of the visible elements.
    pub fn to_set(&self) -> HashSet<T> {
        self.changes.materialize(&self.underlying.read())
    }

    /// Visible elements: underlying elements not removed, then additions.
    pub fn iter(&self) -> impl Iterator<Item = T> {
        self.ordered_snapshot().into_iter()
    }

    /// A cursor that can remove the element it last yielded.
    pub fn cursor(&mut self) -> SetCursor<'_, T> {
        let pending = self.ordered_snapshot();
        SetCursor {
            diff: self,
            pending: pending.into_iter(),
            current: None,
        }
    }

    fn ordered_snapshot(&self) -> Vec<T> {
        let underlying = self.underlying.read();
        underlying
            .iter()
            .filter(|x| !self.changes.removals.contains(*x))
            .chain(self.changes.additions.iter())
            .cloned()
            .collect()
    }
}

impl<T: Hash + Eq + Clone> Delta for HashSetDiff<T> {
    fn commit(&mut self) {
        self.changes.apply_to(&mut self.underlying.write());
        self.changes.clear();
    }

    fn clear_changes(&mut self) {
        self.changes.clear();
    }

    fn delta_len(&self) -> usize {
        self.changes.record_count()
    }

    fn underlying_len(&self) -> usize {
        self.underlying.read().len()
    }

    fn is_exclusive(&self) -> bool {
        Arc::strong_count(&self.underlying) == 1
    }

    fn rebase(&mut self) {
        let materialized = self.to_set();
        self.underlying = shared(materialized);
        self.changes.clear();
    }
}

/// Cursor over a [`HashSetDiff`] supporting removal of the last yielded
/// element.
///
/// Removal is routed through the view's own bookkeeping, so the underlying
/// set is never modified mid-iteration. Elements removed after the cursor was
/// created are skipped.
pub struct SetCursor<'a, T> {
    diff: &'a mut HashSetDiff<T>,
    pending: std::vec::IntoIter<T>,
    current: Option<T>,
}

impl<'a, T: Hash + Eq + Clone> SetCursor<'a, T> {
    /// Remove the element most recently returned by [`Iterator::next`].
    pub fn remove(&mut self) -> Result<()> {
        let current = self.current.take().ok_or_else(|| {
            SmcError::InvalidOperation(
                "next has not been called since the last call to remove".to_string(),
            )
        })?;
        if !self.diff.remove(&current) {
            return Err(SmcError::InvalidOperation(
                "element was removed independently of the cursor".to_string(),
            ));
        }
        Ok(())
    }
}

impl<'a, T: Hash + Eq + Clone> Iterator for SetCursor<'a, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        for x in self.pending.by_ref() {
            if self.diff.contains(&x) {
                self.current = Some(x.clone());
                return Some(x);
            }
        }
        self.current = None;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn underlying(items: &[i32]) -> Shared<HashSet<i32>> {
        shared(items.iter().copied().collect())
    }

    #[test]
    fn test_additions_over_empty() {
        let mut diff = HashSetDiff::new(underlying(&[]));
        diff.insert(1);
        diff.insert(2);
        diff.insert(3);

        assert_eq!(diff.len(), 3);
        for x in 1..=3 {
            assert!(diff.contains(&x));
        }
        assert!(!diff.contains(&4));
        let expected: HashSet<i32> = [1, 2, 3].into_iter().collect();
        assert_eq!(diff.additions(), &expected);
    }

    #[test]
    fn test_underlying_is_untouched_until_commit() {
        let base = underlying(&[1, 2, 3]);
        let mut diff = HashSetDiff::new(Arc::clone(&base));

        diff.remove(&2);
        diff.insert(4);
        assert_eq!(base.read().len(), 3);
        assert!(base.read().contains(&2));

        diff.commit();
        let expected: HashSet<i32> = [1, 3, 4].into_iter().collect();
        assert_eq!(*base.read(), expected);
        assert!(!diff.has_changes());
    }

    #[test]
    fn test_clear_changes_reverts() {
        let base = underlying(&[1, 2]);
        let mut diff = HashSetDiff::new(Arc::clone(&base));
        diff.remove(&1);
        diff.insert(9);
        diff.clear_changes();
        assert_eq!(diff.to_set(), *base.read());
    }

    #[test]
    fn test_cursor_remove() {
        let mut diff = HashSetDiff::new(underlying(&[1, 2, 3]));
        diff.insert(10);

        let mut cursor = diff.cursor();
        let mut seen = Vec::new();
        while let Some(x) = cursor.next() {
            seen.push(x);
            if x % 2 == 0 {
                cursor.remove().unwrap();
            }
        }
        seen.sort();
        assert_eq!(seen, vec![1, 2, 3, 10]);

        let expected: HashSet<i32> = [1, 3].into_iter().collect();
        assert_eq!(diff.to_set(), expected);
        assert!(diff.additions().is_empty());
    }

    #[test]
    fn test_cursor_double_remove_fails() {
        let mut diff = HashSetDiff::new(underlying(&[1]));
        let mut cursor = diff.cursor();
        assert!(cursor.remove().is_err());

        cursor.next();
        cursor.remove().unwrap();
        let result = cursor.remove();
        assert!(matches!(result, Err(SmcError::InvalidOperation(_))));
    }

    #[test]
    fn test_fork_shares_underlying() {
        let base = underlying(&[1, 2]);
        let mut a = HashSetDiff::new(Arc::clone(&base));
        a.insert(3);
        let mut b = a.clone();
        b.remove(&1);

        assert!(a.contains(&1));
        assert!(!b.contains(&1));
        assert!(a.contains(&3) && b.contains(&3));
        assert!(!a.is_exclusive());
    }

    #[test]
    fn test_rebase_detaches() {
        let base = underlying(&[1, 2]);
        let mut diff = HashSetDiff::new(Arc::clone(&base));
        diff.remove(&1);
        diff.insert(5);
        diff.rebase();

        assert!(diff.is_exclusive());
        assert_eq!(diff.delta_len(), 0);
        assert_eq!(diff.underlying_len(), 2);
        assert!(base.read().contains(&1));
    }
}
