//! Ordered delta set with positional access.
//!
//! Changed elements are grouped into run-length [`Block`]s keyed by their
//! first element. A positional lookup walks the blocks in order, counting the
//! untouched underlying elements between them, and only resolves the final
//! element with a direct lookup into the underlying set or the additions.
//! With edits clustered at one end of the order (a filter trimming old
//! timesteps, appending new ones) only a handful of blocks are ever walked.

use super::{shared, Delta, IndexedSet, Shared};
use crate::error::{Result, SmcError};
use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Unbounded};
use std::sync::Arc;

/// A maximal run of consecutive changed elements of one kind.
///
/// An addition block holds `size` added elements with no underlying element
/// between `first` and `last`. A removal block hides `size` consecutive
/// underlying elements starting at `first`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block<T> {
    pub first: T,
    pub last: T,
    pub size: usize,
    pub is_removal: bool,
}

impl<T: Clone> Block<T> {
    fn singleton(x: T, is_removal: bool) -> Self {
        Self {
            first: x.clone(),
            last: x,
            size: 1,
            is_removal,
        }
    }
}

/// An ordered set view over a shared underlying [`IndexedSet`].
#[derive(Clone, Debug)]
pub struct IndexedSetDiff<T> {
    underlying: Shared<IndexedSet<T>>,
    additions: IndexedSet<T>,
    removals: IndexedSet<T>,
    blocks: BTreeMap<T, Block<T>>,
}

impl<T: Ord + Clone> IndexedSetDiff<T> {
    pub fn new(underlying: Shared<IndexedSet<T>>) -> Self {
        Self {
            underlying,
            additions: IndexedSet::new(),
            removals: IndexedSet::new(),
            blocks: BTreeMap::new(),
        }
    }

    pub fn empty() -> Self {
        Self::new(shared(IndexedSet::new()))
    }

    pub fn underlying(&self) -> &Shared<IndexedSet<T>> {
        &self.underlying
    }

    pub fn additions(&self) -> &IndexedSet<T> {
        &self.additions
    }

    pub fn removals(&self) -> &IndexedSet<T> {
        &self.removals
    }

    /// Blocks in key order.
    pub fn blocks(&self) -> impl Iterator<Item = &Block<T>> {
        self.blocks.values()
    }

    pub fn len(&self) -> usize {
        self.underlying.read().len() + self.additions.len() - self.removals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, x: &T) -> bool {
        self.additions.contains(x)
            || (self.underlying.read().contains(x) && !self.removals.contains(x))
    }

    /// Add `x`. Returns `Ok(true)` if the view changed.
    pub fn insert(&mut self, x: T) -> Result<bool> {
        if self.contains(&x) {
            return Ok(false);
        }
        let in_underlying = self.underlying.read().contains(&x);
        if in_underlying {
            self.removals.remove(&x);
            self.remove_from_block(&x)?;
        } else {
            self.additions.insert(x.clone());
            self.add_to_block(x, false);
        }
        Ok(true)
    }

    /// Remove `x`. Returns `Ok(true)` if it was present.
    pub fn remove(&mut self, x: &T) -> Result<bool> {
        if !self.contains(x) {
            return Ok(false);
        }
        if self.additions.remove(x) {
            self.remove_from_block(x)?;
        } else {
            self.removals.insert(x.clone());
            self.add_to_block(x.clone(), true);
        }
        Ok(true)
    }

    /// Element at sorted position `index` of the view.
    pub fn get(&self, index: usize) -> Result<T> {
        let len = self.len();
        if index >= len {
            return Err(SmcError::IndexOutOfBounds { index, len });
        }

        let underlying = self.underlying.read();
        let missing = || SmcError::IndexOutOfBounds { index, len };
        let mut seen = 0;
        let mut cursor = 0;
        for block in self.blocks.values() {
            let fragment_end = underlying.rank(&block.first);
            let fragment = fragment_end.saturating_sub(cursor);
            if index < seen + fragment {
                return underlying
                    .get(cursor + index - seen)
                    .cloned()
                    .ok_or_else(missing);
            }
            seen += fragment;

            if block.is_removal {
                cursor = fragment_end + block.size;
            } else {
                if index < seen + block.size {
                    let start = self.additions.rank(&block.first);
                    return self
                        .additions
                        .get(start + index - seen)
                        .cloned()
                        .ok_or_else(missing);
                }
                seen += block.size;
                cursor = fragment_end;
            }
        }
        underlying
            .get(cursor + index - seen)
            .cloned()
            .ok_or_else(missing)
    }

    /// Sorted position of `x` in the view, if present.
    pub fn index_of(&self, x: &T) -> Option<usize> {
        if !self.contains(x) {
            return None;
        }
        let untouched_before = self.underlying.read().rank(x) - self.removals.rank(x);
        Some(untouched_before + self.additions.rank(x))
    }

    pub fn first(&self) -> Option<T> {
        self.get(0).ok()
    }

    pub fn last(&self) -> Option<T> {
        self.len().checked_sub(1).and_then(|i| self.get(i).ok())
    }

    /// Visible elements in order.
    pub fn iter(&self) -> impl Iterator<Item = T> {
        self.ordered_snapshot().into_iter()
    }

    pub fn to_set(&self) -> IndexedSet<T> {
        self.ordered_snapshot().into_iter().collect()
    }

    /// A cursor over the view, in order, that can remove the element it last
    /// yielded.
    pub fn cursor(&mut self) -> IndexedCursor<'_, T> {
        let pending = self.ordered_snapshot();
        IndexedCursor {
            diff: self,
            pending: pending.into_iter(),
            current: None,
        }
    }

    fn ordered_snapshot(&self) -> Vec<T> {
        let underlying = self.underlying.read();
        let mut out = Vec::with_capacity(self.len());
        let mut additions = self.additions.iter().peekable();
        for x in underlying.iter().filter(|x| !self.removals.contains(x)) {
            while let Some(a) = additions.next_if(|a| *a < x) {
                out.push(a.clone());
            }
            out.push(x.clone());
        }
        out.extend(additions.cloned());
        out
    }

    fn container(&self, is_removal: bool) -> &IndexedSet<T> {
        if is_removal {
            &self.removals
        } else {
            &self.additions
        }
    }

    fn floor_block(&self, x: &T) -> Option<&Block<T>> {
        self.blocks.range(..=x).next_back().map(|(_, b)| b)
    }

    fn next_block(&self, x: &T) -> Option<&Block<T>> {
        self.blocks
            .range((Excluded(x), Unbounded))
            .next()
            .map(|(_, b)| b)
    }

    fn untouched_between(&self, low: &T, high: &T) -> usize {
        self.underlying.read().count_between(low, high)
    }

    /// Record `o`, already inserted into its container, in the block map.
    fn add_to_block(&mut self, o: T, is_removal: bool) {
        if let Some(floor) = self.floor_block(&o).cloned() {
            if o < floor.last {
                if floor.is_removal == is_removal {
                    if let Some(block) = self.blocks.get_mut(&floor.first) {
                        block.size += 1;
                    }
                } else {
                    self.split_around(&floor, &o);
                    self.blocks.insert(o.clone(), Block::singleton(o, is_removal));
                }
                return;
            }

            let clear_ahead = self.next_block(&floor.first).map_or(true, |n| n.first > o);
            if floor.is_removal == is_removal
                && clear_ahead
                && self.untouched_between(&floor.last, &o) == 0
            {
                if let Some(block) = self.blocks.get_mut(&floor.first) {
                    block.last = o;
                    block.size += 1;
                }
                self.merge_forward(&floor.first);
                return;
            }
        }

        if let Some(next) = self.next_block(&o).cloned() {
            if next.is_removal == is_removal && self.untouched_between(&o, &next.first) == 0 {
                self.blocks.remove(&next.first);
                self.blocks.insert(
                    o.clone(),
                    Block {
                        first: o.clone(),
                        last: next.last,
                        size: next.size + 1,
                        is_removal,
                    },
                );
                self.merge_with_previous(&o);
                return;
            }
        }

        self.blocks.insert(o.clone(), Block::singleton(o, is_removal));
    }

    /// Drop `o`, already removed from its container, from its block.
    fn remove_from_block(&mut self, o: &T) -> Result<()> {
        let block = match self.floor_block(o) {
            Some(b) if *o <= b.last => b.clone(),
            _ => {
                return Err(SmcError::InvalidArgument(
                    "element is not covered by any block".to_string(),
                ))
            }
        };

        if block.size == 1 {
            self.blocks.remove(&block.first);
            self.merge_with_previous(o);
            return Ok(());
        }

        let container = self.container(block.is_removal);
        let inconsistent = || SmcError::InvalidArgument("block bounds out of sync".to_string());
        if *o == block.first {
            let first = container.successor(o).cloned().ok_or_else(inconsistent)?;
            self.blocks.remove(&block.first);
            self.blocks.insert(
                first.clone(),
                Block {
                    first,
                    size: block.size - 1,
                    ..block
                },
            );
        } else if *o == block.last {
            let last = container.predecessor(o).cloned().ok_or_else(inconsistent)?;
            if let Some(b) = self.blocks.get_mut(&block.first) {
                b.last = last;
                b.size -= 1;
            }
        } else if block.is_removal {
            // o is untouched again and now separates two removal runs
            self.split_around(&block, o);
        } else if let Some(b) = self.blocks.get_mut(&block.first) {
            b.size -= 1;
        }
        Ok(())
    }

    /// Split `block` into the runs before and after `o`, which must lie
    /// strictly inside it and not belong to the block's container.
    fn split_around(&mut self, block: &Block<T>, o: &T) {
        let container = self.container(block.is_removal);
        let below = container.rank(o);
        let left_size = below - container.rank(&block.first);
        let right_size = container.rank_inclusive(&block.last) - below;
        let (Some(left_last), Some(right_first)) = (
            container.predecessor(o).cloned(),
            container.successor(o).cloned(),
        ) else {
            return;
        };

        if let Some(left) = self.blocks.get_mut(&block.first) {
            left.last = left_last;
            left.size = left_size;
        }
        self.blocks.insert(
            right_first.clone(),
            Block {
                first: right_first,
                last: block.last.clone(),
                size: right_size,
                is_removal: block.is_removal,
            },
        );
    }

    /// Coalesce the block keyed by `key` with its successor if nothing
    /// untouched separates them.
    fn merge_forward(&mut self, key: &T) {
        let Some(block) = self.blocks.get(key) else {
            return;
        };
        let Some(next) = self.next_block(key) else {
            return;
        };
        if block.is_removal != next.is_removal
            || self.untouched_between(&block.last, &next.first) != 0
        {
            return;
        }

        let next = next.clone();
        self.blocks.remove(&next.first);
        if let Some(block) = self.blocks.get_mut(key) {
            block.last = next.last;
            block.size += next.size;
        }
    }

    fn merge_with_previous(&mut self, key: &T) {
        let previous = self
            .blocks
            .range(..key)
            .next_back()
            .map(|(k, _)| k.clone());
        if let Some(previous) = previous {
            self.merge_forward(&previous);
        }
    }
}

impl<T: Ord + Clone> Delta for IndexedSetDiff<T> {
    fn commit(&mut self) {
        let mut underlying = self.underlying.write();
        for x in self.removals.iter() {
            underlying.remove(x);
        }
        underlying.extend(self.additions.iter().cloned());
        drop(underlying);
        self.clear_changes();
    }

    fn clear_changes(&mut self) {
        self.additions.clear();
        self.removals.clear();
        self.blocks.clear();
    }

    fn delta_len(&self) -> usize {
        self.additions.len() + self.removals.len()
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
        self.clear_changes();
    }
}

/// In-order cursor over an [`IndexedSetDiff`].
pub struct IndexedCursor<'a, T> {
    diff: &'a mut IndexedSetDiff<T>,
    pending: std::vec::IntoIter<T>,
    current: Option<T>,
}

impl<'a, T: Ord + Clone> IndexedCursor<'a, T> {
    /// Remove the element most recently returned by [`Iterator::next`].
    pub fn remove(&mut self) -> Result<()> {
        let current = self.current.take().ok_or_else(|| {
            SmcError::InvalidOperation(
                "next has not been called since the last call to remove".to_string(),
            )
        })?;
        if !self.diff.remove(&current)? {
            return Err(SmcError::InvalidOperation(
                "element was removed independently of the cursor".to_string(),
            ));
        }
        Ok(())
    }
}

impl<'a, T: Ord + Clone> Iterator for IndexedCursor<'a, T> {
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

    fn evens(n: i32) -> Shared<IndexedSet<i32>> {
        shared((0..n).map(|x| x * 2).collect())
    }

    fn check_positions(diff: &IndexedSetDiff<i32>) {
        let expected: Vec<i32> = diff.iter().collect();
        assert_eq!(expected.len(), diff.len());
        for (i, x) in expected.iter().enumerate() {
            assert_eq!(diff.get(i).unwrap(), *x);
            assert_eq!(diff.index_of(x), Some(i));
        }
        assert!(diff.get(expected.len()).is_err());
    }

    #[test]
    fn test_get_over_mixed_changes() {
        let mut diff = IndexedSetDiff::new(evens(10));
        diff.remove(&0).unwrap();
        diff.insert(5).unwrap();
        diff.insert(7).unwrap();
        diff.remove(&12).unwrap();
        diff.insert(100).unwrap();
        diff.insert(-3).unwrap();

        let items: Vec<i32> = diff.iter().collect();
        assert_eq!(items, vec![-3, 2, 4, 5, 6, 7, 8, 10, 14, 16, 18, 100]);
        check_positions(&diff);
    }

    #[test]
    fn test_adjacent_removals_share_a_block() {
        let mut diff = IndexedSetDiff::new(evens(5));
        diff.remove(&2).unwrap();
        diff.remove(&4).unwrap();
        let blocks: Vec<_> = diff.blocks().cloned().collect();
        assert_eq!(
            blocks,
            vec![Block {
                first: 2,
                last: 4,
                size: 2,
                is_removal: true
            }]
        );
    }

    #[test]
    fn test_addition_splits_removal_block_and_rejoins() {
        let mut diff = IndexedSetDiff::new(evens(5));
        diff.remove(&2).unwrap();
        diff.remove(&4).unwrap();

        diff.insert(3).unwrap();
        assert_eq!(diff.blocks().count(), 3);
        assert_eq!(diff.iter().collect::<Vec<_>>(), vec![0, 3, 6, 8]);
        check_positions(&diff);

        diff.remove(&3).unwrap();
        assert_eq!(diff.blocks().count(), 1);
        check_positions(&diff);
    }

    #[test]
    fn test_unremoving_middle_splits_block() {
        let mut diff = IndexedSetDiff::new(shared((0..7).collect()));
        for x in 1..=3 {
            diff.remove(&x).unwrap();
        }
        assert_eq!(diff.blocks().count(), 1);

        diff.insert(2).unwrap();
        let sizes: Vec<usize> = diff.blocks().map(|b| b.size).collect();
        assert_eq!(sizes, vec![1, 1]);
        check_positions(&diff);

        diff.insert(1).unwrap();
        diff.insert(3).unwrap();
        assert_eq!(diff.blocks().count(), 0);
        assert!(!diff.has_changes());
    }

    #[test]
    fn test_appended_additions_form_one_block() {
        let mut diff = IndexedSetDiff::new(evens(4));
        for x in 10..20 {
            diff.insert(x).unwrap();
        }
        assert_eq!(diff.blocks().count(), 1);
        assert_eq!(diff.last(), Some(19));
        check_positions(&diff);
    }

    #[test]
    fn test_trimming_from_the_front() {
        let mut diff = IndexedSetDiff::new(shared((0..50).collect()));
        while let Some(first) = diff.first() {
            if first >= 30 {
                break;
            }
            diff.remove(&first).unwrap();
        }
        assert_eq!(diff.blocks().count(), 1);
        assert_eq!(diff.first(), Some(30));
        assert_eq!(diff.len(), 20);
    }

    #[test]
    fn test_commit_applies_order() {
        let base = evens(5);
        let mut diff = IndexedSetDiff::new(Arc::clone(&base));
        diff.remove(&4).unwrap();
        diff.insert(3).unwrap();
        let expected = diff.to_set();

        diff.commit();
        assert_eq!(*base.read(), expected);
        assert_eq!(diff.blocks().count(), 0);
        check_positions(&diff);
    }

    #[test]
    fn test_cursor_removes_in_order() {
        let mut diff = IndexedSetDiff::new(shared((0..10).collect()));
        let mut cursor = diff.cursor();
        let mut seen = Vec::new();
        while let Some(x) = cursor.next() {
            seen.push(x);
            if x % 3 == 0 {
                cursor.remove().unwrap();
            }
        }
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
        assert_eq!(diff.iter().collect::<Vec<_>>(), vec![1, 2, 4, 5, 7, 8]);
        check_positions(&diff);
    }

    #[test]
    fn test_uncovered_element_is_invalid_argument() {
        let mut diff: IndexedSetDiff<i32> = IndexedSetDiff::empty();
        let result = diff.remove_from_block(&42);
        assert!(matches!(result, Err(SmcError::InvalidArgument(_))));
    }
}
