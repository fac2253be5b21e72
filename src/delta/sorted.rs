//! Ordered set with positional access.

const MAX_CHUNK: usize = 256;

/// A sorted set stored as a list of sorted chunks.
///
/// Every chunk is non-empty and chunks are ordered, so the whole structure
/// reads as one sorted sequence. Membership queries binary-search the chunk
/// boundaries. A Fenwick tree over chunk lengths gives chunk offsets and
/// positional lookups in O(log n).
#[derive(Clone, Debug)]
pub struct IndexedSet<T> {
    chunks: Vec<Vec<T>>,
    /// Fenwick tree (1-based) over `chunks[i].len()`.
    counts: Vec<usize>,
    len: usize,
}

impl<T> Default for IndexedSet<T> {
    fn default() -> Self {
        Self {
            chunks: Vec::new(),
            counts: vec![0],
            len: 0,
        }
    }
}

impl<T> IndexedSet<T> {
    /// Rebuild the chunk-length tree after chunks were split or dropped.
    fn reindex(&mut self) {
        let m = self.chunks.len();
        let mut counts = vec![0; m + 1];
        for (i, chunk) in self.chunks.iter().enumerate() {
            counts[i + 1] += chunk.len();
            let parent = (i + 1) + ((i + 1) & (i + 1).wrapping_neg());
            if parent <= m {
                counts[parent] += counts[i + 1];
            }
        }
        self.counts = counts;
    }

    fn grow_chunk(&mut self, chunk: usize) {
        let mut i = chunk + 1;
        while i < self.counts.len() {
            self.counts[i] += 1;
            i += i & i.wrapping_neg();
        }
    }

    fn shrink_chunk(&mut self, chunk: usize) {
        let mut i = chunk + 1;
        while i < self.counts.len() {
            self.counts[i] -= 1;
            i += i & i.wrapping_neg();
        }
    }

    /// Number of elements in the chunks before `chunk`.
    fn offset_of_chunk(&self, chunk: usize) -> usize {
        let mut total = 0;
        let mut i = chunk;
        while i > 0 {
            total += self.counts[i];
            i &= i - 1;
        }
        total
    }

    /// Chunk holding sorted position `index` and the position within it.
    /// Requires `index < len`.
    fn locate(&self, index: usize) -> (usize, usize) {
        let m = self.chunks.len();
        let mut pos = 0;
        let mut remaining = index;
        let mut step = m.checked_next_power_of_two().unwrap_or(0);
        if step > m {
            step /= 2;
        }
        while step > 0 {
            let next = pos + step;
            if next <= m && self.counts[next] <= remaining {
                pos = next;
                remaining -= self.counts[next];
            }
            step /= 2;
        }
        (pos, remaining)
    }
}

impl<T: Ord + Clone> IndexedSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
        self.counts = vec![0];
        self.len = 0;
    }

    /// Chunk that holds `x` if present, or where it would be inserted.
    fn chunk_for(&self, x: &T) -> usize {
        let idx = self
            .chunks
            .partition_point(|c| c.last().is_some_and(|last| last < x));
        idx.min(self.chunks.len().saturating_sub(1))
    }

    pub fn contains(&self, x: &T) -> bool {
        if self.chunks.is_empty() {
            return false;
        }
        self.chunks[self.chunk_for(x)].binary_search(x).is_ok()
    }

    /// Insert `x`. Returns false if it was already present.
    pub fn insert(&mut self, x: T) -> bool {
        if self.chunks.is_empty() {
            self.chunks.push(vec![x]);
            self.len = 1;
            self.reindex();
            return true;
        }
        let ci = self.chunk_for(&x);
        let chunk = &mut self.chunks[ci];
        match chunk.binary_search(&x) {
            Ok(_) => false,
            Err(pos) => {
                chunk.insert(pos, x);
                self.len += 1;
                if chunk.len() > MAX_CHUNK {
                    let tail = chunk.split_off(chunk.len() / 2);
                    self.chunks.insert(ci + 1, tail);
                    self.reindex();
                } else {
                    self.grow_chunk(ci);
                }
                true
            }
        }
    }

    /// Remove `x`. Returns false if it was absent.
    pub fn remove(&mut self, x: &T) -> bool {
        if self.chunks.is_empty() {
            return false;
        }
        let ci = self.chunk_for(x);
        let chunk = &mut self.chunks[ci];
        match chunk.binary_search(x) {
            Ok(pos) => {
                chunk.remove(pos);
                self.len -= 1;
                if chunk.is_empty() {
                    self.chunks.remove(ci);
                    self.reindex();
                } else {
                    self.shrink_chunk(ci);
                }
                true
            }
            Err(_) => false,
        }
    }

    /// Number of elements strictly less than `x`.
    pub fn rank(&self, x: &T) -> usize {
        if self.chunks.is_empty() {
            return 0;
        }
        let ci = self.chunk_for(x);
        let within = match self.chunks[ci].binary_search(x) {
            Ok(pos) | Err(pos) => pos,
        };
        self.offset_of_chunk(ci) + within
    }

    /// Number of elements less than or equal to `x`.
    pub fn rank_inclusive(&self, x: &T) -> usize {
        self.rank(x) + usize::from(self.contains(x))
    }

    /// Number of elements strictly between `low` and `high`.
    pub fn count_between(&self, low: &T, high: &T) -> usize {
        if low >= high {
            return 0;
        }
        self.rank(high).saturating_sub(self.rank_inclusive(low))
    }

    /// Element at sorted position `index`.
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len {
            return None;
        }
        let (chunk, within) = self.locate(index);
        self.chunks.get(chunk).and_then(|c| c.get(within))
    }

    /// Sorted position of `x`, if present.
    pub fn index_of(&self, x: &T) -> Option<usize> {
        if self.contains(x) {
            Some(self.rank(x))
        } else {
            None
        }
    }

    pub fn first(&self) -> Option<&T> {
        self.chunks.first().and_then(|c| c.first())
    }

    pub fn last(&self) -> Option<&T> {
        self.chunks.last().and_then(|c| c.last())
    }

    /// Greatest element strictly less than `x`.
    pub fn predecessor(&self, x: &T) -> Option<&T> {
        match self.rank(x) {
            0 => None,
            r => self.get(r - 1),
        }
    }

    /// Least element strictly greater than `x`.
    pub fn successor(&self, x: &T) -> Option<&T> {
        self.get(self.rank_inclusive(x))
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.chunks.iter().flatten()
    }

    /// Elements greater than or equal to `low`, in order.
    pub fn range_from(&self, low: &T) -> impl Iterator<Item = &T> + '_ {
        let start = self.rank(low);
        let (chunk, within) = if start < self.len {
            self.locate(start)
        } else {
            (self.chunks.len(), 0)
        };
        self.chunks[chunk..]
            .iter()
            .flatten()
            .skip(within)
    }
}

impl<T: PartialEq> PartialEq for IndexedSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.chunks.iter().flatten().eq(other.chunks.iter().flatten())
    }
}

impl<T: Eq> Eq for IndexedSet<T> {}

impl<T: Ord + Clone> FromIterator<T> for IndexedSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut items: Vec<T> = iter.into_iter().collect();
        items.sort();
        items.dedup();
        let len = items.len();
        let mut chunks = Vec::with_capacity(len / MAX_CHUNK + 1);
        let mut rest = items.as_slice();
        while !rest.is_empty() {
            let take = rest.len().min(MAX_CHUNK / 2 + 1);
            chunks.push(rest[..take].to_vec());
            rest = &rest[take..];
        }
        let mut set = Self {
            chunks,
            counts: Vec::new(),
            len,
        };
        set.reindex();
        set
    }
}

impl<T: Ord + Clone> Extend<T> for IndexedSet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for x in iter {
            self.insert(x);
        }
    }
}
