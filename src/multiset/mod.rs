//! An ordered multiset, and positions within it.
//!
//! This is the unprotected container that
//! [ConcurrentOrderedMultiset](crate::concurrent::ConcurrentOrderedMultiset) wraps.
//! It may be used directly from a single thread, and it is the type that is
//! copied or moved into a concurrent multiset, or assigned over its contents.

mod iter;

pub use self::iter::{IntoIter, Iter};

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use tracing::trace;

#[cfg(feature = "serde")]
use serde::{
    de::{Deserialize, Deserializer},
    ser::{Serialize, SerializeSeq, Serializer},
};

#[cfg(feature = "serde")]
use crate::utils::SeqCollector;

use crate::compare::{Compare, Natural};

// Each multiset, and each clone of one, takes a fresh id so that a position
// can only ever resolve to an element of the multiset that issued it.
static NEXT_OWNER: AtomicU64 = AtomicU64::new(0);

fn next_owner() -> u64 {
    NEXT_OWNER.fetch_add(1, AtomicOrdering::Relaxed)
}

/// A single stored element. The sequence number is unique within one
/// multiset, and breaks ties between keys that compare equal so that
/// duplicates sit in insertion order.
pub(crate) struct Slot<K, C> {
    pub(crate) key: K,
    seq: u64,
    order: PhantomData<fn() -> C>,
}

impl<K, C> Slot<K, C> {
    fn new(key: K, seq: u64) -> Self {
        Slot {
            key,
            seq,
            order: PhantomData,
        }
    }
}

impl<K: Clone, C> Clone for Slot<K, C> {
    fn clone(&self) -> Self {
        Slot::new(self.key.clone(), self.seq)
    }
}

impl<K, C: Compare<K>> PartialEq for Slot<K, C> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<K, C: Compare<K>> Eq for Slot<K, C> {}

impl<K, C: Compare<K>> PartialOrd for Slot<K, C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K, C: Compare<K>> Ord for Slot<K, C> {
    fn cmp(&self, other: &Self) -> Ordering {
        C::compare(&self.key, &other.key).then(self.seq.cmp(&other.seq))
    }
}

/// The location of one element of a multiset, or the end marker.
///
/// A position is a plain value. It holds a copy of the element's key and
/// the identity of the element at the time it was located, and nothing
/// else. It is not tied to the multiset's lifetime or to any lock.
///
/// After any structural change (insert, erase, clear or assign) a
/// position may be stale. Reading [Position::key] is always safe since it is
/// a copy. Handing a stale position back to the multiset never panics, but
/// what it resolves to is only loosely defined:
///
/// * [OrderedMultiset::erase_at] removes nothing if the element is gone,
///   and returns the first element ordered after where it was.
/// * [OrderedMultiset::advance] returns the first element ordered after
///   where it was.
///
/// A position taken from a different multiset, including the contents that
/// an assign replaced, never denotes a live element. Both operations then
/// resolve to the first element ordered after its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position<K> {
    at: Option<Located<K>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Located<K> {
    key: K,
    owner: u64,
    seq: u64,
}

impl<K> Position<K> {
    /// The end marker, one past the last element.
    pub fn end() -> Self {
        Position { at: None }
    }

    /// Returns true if this is the end marker.
    pub fn is_end(&self) -> bool {
        self.at.is_none()
    }

    /// The key of the element this position denotes, or `None` for the end
    /// marker.
    pub fn key(&self) -> Option<&K> {
        self.at.as_ref().map(|at| &at.key)
    }

    /// Consume the position, returning the copied key.
    pub fn into_key(self) -> Option<K> {
        self.at.map(|at| at.key)
    }
}

/// An ordered collection that permits duplicate keys.
///
/// Elements are kept in non-decreasing order under `C`. Elements that
/// compare equal are adjacent, and a newly inserted duplicate is placed after
/// the existing ones.
///
/// # Examples
/// ```
/// use lockset::multiset::OrderedMultiset;
///
/// let mut set: OrderedMultiset<u32> = OrderedMultiset::new();
/// set.insert(5);
/// set.insert(3);
/// set.insert(5);
/// assert_eq!(set.count(&5), 2);
/// assert_eq!(set.iter().copied().collect::<Vec<_>>(), vec![3, 5, 5]);
/// ```
pub struct OrderedMultiset<K, C = Natural> {
    tree: BTreeSet<Slot<K, C>>,
    owner: u64,
    next_seq: u64,
}

impl<K, C> OrderedMultiset<K, C> {
    /// Create an empty multiset. Does not allocate.
    pub fn new() -> Self {
        OrderedMultiset {
            tree: BTreeSet::new(),
            owner: next_owner(),
            next_seq: 0,
        }
    }

    /// The number of elements, counting every duplicate.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns true if there are no elements.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Remove every element.
    pub fn clear(&mut self) {
        // Sequence numbers are not reset, so that positions taken before the
        // clear can never denote an element inserted after it.
        self.tree.clear();
    }

    /// Iterate over the elements in ascending order.
    pub fn iter(&self) -> Iter<'_, K, C> {
        Iter::new(self.tree.iter())
    }
}

impl<K, C: Compare<K>> OrderedMultiset<K, C> {
    /// The smallest element, if any.
    pub fn first(&self) -> Option<&K> {
        self.tree.first().map(|s| &s.key)
    }

    /// The largest element, if any. When several are equal this is the one
    /// inserted last.
    pub fn last(&self) -> Option<&K> {
        self.tree.last().map(|s| &s.key)
    }

    /// Insert a key. Duplicates are always accepted.
    pub fn insert(&mut self, key: K) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let inserted = self.tree.insert(Slot::new(key, seq));
        debug_assert!(inserted);
    }
}

// Lookups by key build owned search bounds from the key, so they need
// `K: Clone`.
impl<K: Clone, C: Compare<K>> OrderedMultiset<K, C> {
    // No element is ever issued u64::MAX, so these bracket every element
    // equal to key.
    fn floor_probe(key: &K) -> Slot<K, C> {
        Slot::new(key.clone(), 0)
    }

    fn ceiling_probe(key: &K) -> Slot<K, C> {
        Slot::new(key.clone(), u64::MAX)
    }

    fn equal_range(&self, key: &K) -> std::collections::btree_set::Range<'_, Slot<K, C>> {
        self.tree.range((
            Bound::Included(Self::floor_probe(key)),
            Bound::Included(Self::ceiling_probe(key)),
        ))
    }

    fn position(&self, slot: Option<&Slot<K, C>>) -> Position<K> {
        Position {
            at: slot.map(|s| Located {
                key: s.key.clone(),
                owner: self.owner,
                seq: s.seq,
            }),
        }
    }

    fn owns(&self, at: &Located<K>) -> bool {
        at.owner == self.owner
    }

    // The element after `at`. Sequence numbers of another multiset mean
    // nothing here, so a foreign position lands after every equal key.
    fn successor(&self, at: &Located<K>) -> Position<K> {
        if !self.owns(at) {
            return self.upper_bound(&at.key);
        }
        let probe = Slot::new(at.key.clone(), at.seq);
        self.position(
            self.tree
                .range((Bound::Excluded(probe), Bound::Unbounded))
                .next(),
        )
    }

    /// The number of elements equal to `key`.
    ///
    /// Like every lookup by key this requires `K: Clone`, as the search
    /// bounds are built from copies of `key`.
    pub fn count(&self, key: &K) -> usize {
        self.equal_range(key).count()
    }

    /// Returns true if at least one element is equal to `key`.
    pub fn contains(&self, key: &K) -> bool {
        self.equal_range(key).next().is_some()
    }

    /// Remove every element equal to `key`, returning how many were removed.
    ///
    /// This requires `K: Clone`, as the search bounds are built from copies
    /// of `key`. Keys that can not be cloned can only be removed with
    /// [clear](Self::clear).
    pub fn erase(&mut self, key: &K) -> usize {
        let doomed: Vec<u64> = self.equal_range(key).map(|s| s.seq).collect();
        for seq in doomed.iter() {
            let removed = self.tree.remove(&Slot::new(key.clone(), *seq));
            debug_assert!(removed);
        }
        doomed.len()
    }

    /// Remove exactly the element denoted by `pos`, and return the position
    /// of the element that followed it.
    ///
    /// Erasing at the end marker does nothing and returns the end marker. If
    /// `pos` is stale and its element is gone, or `pos` came from another
    /// multiset, nothing is removed.
    pub fn erase_at(&mut self, pos: &Position<K>) -> Position<K> {
        match &pos.at {
            Some(at) => {
                if self.owns(at) {
                    if !self.tree.remove(&Slot::new(at.key.clone(), at.seq)) {
                        trace!("erase_at on a stale position");
                    }
                }
                self.successor(at)
            }
            None => Position::end(),
        }
    }

    /// The position of an element equal to `key`, or the end marker. When
    /// there are duplicates this is the first of them.
    pub fn find(&self, key: &K) -> Position<K> {
        self.position(self.equal_range(key).next())
    }

    /// The position of the first element that is not ordered before `key`.
    pub fn lower_bound(&self, key: &K) -> Position<K> {
        self.position(
            self.tree
                .range((Bound::Included(Self::floor_probe(key)), Bound::Unbounded))
                .next(),
        )
    }

    /// The position of the first element that is ordered after `key`.
    pub fn upper_bound(&self, key: &K) -> Position<K> {
        self.position(
            self.tree
                .range((Bound::Excluded(Self::ceiling_probe(key)), Bound::Unbounded))
                .next(),
        )
    }

    /// The position of the first element, or the end marker if empty.
    pub fn begin(&self) -> Position<K> {
        self.position(self.tree.first())
    }

    /// The end marker.
    pub fn end(&self) -> Position<K> {
        Position::end()
    }

    /// The position after `pos`. The end marker advances to itself.
    pub fn advance(&self, pos: &Position<K>) -> Position<K> {
        match &pos.at {
            Some(at) => self.successor(at),
            None => Position::end(),
        }
    }
}

impl<K, C> Default for OrderedMultiset<K, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone, C> Clone for OrderedMultiset<K, C> {
    fn clone(&self) -> Self {
        OrderedMultiset {
            tree: self.tree.clone(),
            owner: next_owner(),
            next_seq: self.next_seq,
        }
    }
}

impl<K: fmt::Debug, C> fmt::Debug for OrderedMultiset<K, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<K: PartialEq, C> PartialEq for OrderedMultiset<K, C> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<K: Eq, C> Eq for OrderedMultiset<K, C> {}

impl<K, C: Compare<K>> FromIterator<K> for OrderedMultiset<K, C> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut set = OrderedMultiset::new();
        set.extend(iter);
        set
    }
}

impl<K, C: Compare<K>> Extend<K> for OrderedMultiset<K, C> {
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        iter.into_iter().for_each(|k| self.insert(k));
    }
}

impl<K, C: Compare<K>, const N: usize> From<[K; N]> for OrderedMultiset<K, C> {
    fn from(keys: [K; N]) -> Self {
        keys.into_iter().collect()
    }
}

impl<'a, K, C> IntoIterator for &'a OrderedMultiset<K, C> {
    type Item = &'a K;
    type IntoIter = Iter<'a, K, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, C> IntoIterator for OrderedMultiset<K, C> {
    type Item = K;
    type IntoIter = IntoIter<K, C>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter::new(self.tree.into_iter())
    }
}

#[cfg(feature = "serde")]
impl<K: Serialize, C> Serialize for OrderedMultiset<K, C> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_seq(Some(self.len()))?;

        for key in self.iter() {
            state.serialize_element(key)?;
        }

        state.end()
    }
}

#[cfg(feature = "serde")]
impl<'de, K, C> Deserialize<'de> for OrderedMultiset<K, C>
where
    K: Deserialize<'de>,
    C: Compare<K>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(SeqCollector::new())
    }
}

#[cfg(test)]
mod tests {
    use super::{OrderedMultiset, Position};
    use crate::compare::Reversed;
    use rand::seq::SliceRandom;

    fn keys<C>(set: &OrderedMultiset<i32, C>) -> Vec<i32> {
        set.iter().copied().collect()
    }

    #[test]
    fn test_multiset_insert_order() {
        let mut set: OrderedMultiset<i32> = OrderedMultiset::new();
        for k in [5, 3, 5, 1] {
            set.insert(k);
        }
        assert_eq!(keys(&set), vec![1, 3, 5, 5]);
        assert_eq!(set.len(), 4);
        assert_eq!(set.count(&5), 2);
        assert_eq!(set.count(&2), 0);
        assert_eq!(set.first(), Some(&1));
        assert_eq!(set.last(), Some(&5));
    }

    #[test]
    fn test_multiset_erase_key() {
        let mut set: OrderedMultiset<i32> = OrderedMultiset::from([5, 3, 5, 1]);
        assert_eq!(set.erase(&5), 2);
        assert_eq!(set.count(&5), 0);
        assert_eq!(set.len(), 2);
        assert_eq!(set.erase(&5), 0);
        assert_eq!(keys(&set), vec![1, 3]);
    }

    #[test]
    fn test_multiset_erase_at_removes_one() {
        let mut set: OrderedMultiset<i32> = OrderedMultiset::from([2, 2, 2]);
        let pos = set.find(&2);
        let next = set.erase_at(&pos);
        assert_eq!(set.count(&2), 2);
        // The next position is one of the remaining twos.
        assert_eq!(next.key(), Some(&2));
        assert_ne!(next, pos);

        let mut set: OrderedMultiset<i32> = OrderedMultiset::from([1, 2, 3]);
        let last = set.find(&3);
        assert!(set.erase_at(&last).is_end());
        assert!(set.erase_at(&Position::end()).is_end());
        assert_eq!(keys(&set), vec![1, 2]);
    }

    #[test]
    fn test_multiset_bounds() {
        let set: OrderedMultiset<i32> = OrderedMultiset::from([1, 3, 3, 5]);
        let lb = set.lower_bound(&3);
        assert_eq!(lb.key(), Some(&3));
        assert_eq!(lb, set.find(&3));
        // lower_bound is the first three: advancing once gives the second.
        let second = set.advance(&lb);
        assert_eq!(second.key(), Some(&3));
        assert_eq!(set.advance(&second), set.upper_bound(&3));
        assert_eq!(set.upper_bound(&3).key(), Some(&5));

        assert_eq!(set.lower_bound(&4).key(), Some(&5));
        assert_eq!(set.lower_bound(&0), set.begin());
        assert!(set.upper_bound(&5).is_end());
        assert!(set.find(&4).is_end());
        assert_eq!(set.end(), Position::end());
    }

    #[test]
    fn test_multiset_walk_positions() {
        let set: OrderedMultiset<i32> = OrderedMultiset::from([5, 3, 5, 1]);
        let mut seen = Vec::new();
        let mut pos = set.begin();
        while let Some(k) = pos.key() {
            seen.push(*k);
            pos = set.advance(&pos);
        }
        assert_eq!(seen, vec![1, 3, 5, 5]);
        assert!(set.advance(&set.end()).is_end());

        let empty: OrderedMultiset<i32> = OrderedMultiset::new();
        assert_eq!(empty.begin(), empty.end());
    }

    #[test]
    fn test_multiset_stale_position() {
        let mut set: OrderedMultiset<i32> = OrderedMultiset::from([1, 2, 3]);
        let pos = set.find(&2);
        assert_eq!(set.erase(&2), 1);
        // The element is gone: nothing is removed, and we land on the next one.
        let next = set.erase_at(&pos);
        assert_eq!(next.key(), Some(&3));
        assert_eq!(set.len(), 2);
        assert_eq!(set.advance(&pos).key(), Some(&3));
        // The copied key is still readable.
        assert_eq!(pos.into_key(), Some(2));

        // A reinserted equal key is a distinct element.
        let pos = set.find(&3);
        set.clear();
        set.insert(3);
        assert_eq!(set.erase_at(&pos).key(), Some(&3));
        assert_eq!(set.count(&3), 1);
    }

    #[test]
    fn test_multiset_foreign_position() {
        let a: OrderedMultiset<i32> = OrderedMultiset::from([2]);
        let mut b: OrderedMultiset<i32> = OrderedMultiset::from([2, 2, 7]);
        let pos = a.find(&2);

        // Both hold a 2 with the same sequence number, but a's position
        // must never remove one of b's elements.
        let next = b.erase_at(&pos);
        assert_eq!(b.count(&2), 2);
        assert_eq!(next.key(), Some(&7));
        assert_eq!(b.advance(&pos).key(), Some(&7));

        // A clone is a different multiset, with the same contents.
        let mut c = b.clone();
        let pos = b.find(&2);
        assert_eq!(c.erase_at(&pos).key(), Some(&7));
        assert_eq!(c.len(), 3);
        assert_eq!(c.first(), Some(&2));
        assert_eq!(c.last(), Some(&7));
        assert_ne!(c.find(&2), pos);
    }

    #[test]
    fn test_multiset_duplicates_keep_insertion_order() {
        // Ordering only looks at the first member, so equal keys are
        // distinguishable by the second.
        #[derive(Debug, Clone, PartialEq, Eq)]
        struct Tagged(u8, &'static str);

        struct ByFirst;
        impl crate::compare::Compare<Tagged> for ByFirst {
            fn compare(a: &Tagged, b: &Tagged) -> std::cmp::Ordering {
                a.0.cmp(&b.0)
            }
        }

        let mut set: OrderedMultiset<Tagged, ByFirst> = OrderedMultiset::new();
        set.insert(Tagged(1, "a"));
        set.insert(Tagged(0, "z"));
        set.insert(Tagged(1, "b"));
        set.insert(Tagged(1, "c"));

        let tags: Vec<_> = set.iter().map(|t| t.1).collect();
        assert_eq!(tags, vec!["z", "a", "b", "c"]);
        assert_eq!(set.find(&Tagged(1, "?")).key(), Some(&Tagged(1, "a")));
        assert_eq!(set.count(&Tagged(1, "?")), 3);
        assert_eq!(set.erase(&Tagged(1, "?")), 3);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_multiset_reversed() {
        let set: OrderedMultiset<i32, Reversed> = OrderedMultiset::from([5, 3, 5, 1]);
        assert_eq!(keys(&set), vec![5, 5, 3, 1]);
        assert_eq!(set.lower_bound(&4).key(), Some(&3));
        assert_eq!(set.upper_bound(&5).key(), Some(&3));
    }

    #[test]
    fn test_multiset_shuffled_matches_sorted() {
        let mut rng = rand::rng();
        let mut ins: Vec<i32> = (0..512).map(|v| v % 64).collect();
        ins.shuffle(&mut rng);

        let set: OrderedMultiset<i32> = ins.iter().copied().collect();
        ins.sort();
        assert_eq!(keys(&set), ins);
        assert!(set.iter().rev().copied().eq(ins.iter().rev().copied()));
        assert_eq!(set.iter().len(), 512);
        assert_eq!(set.into_iter().collect::<Vec<_>>(), ins);
    }

    #[test]
    fn test_multiset_clone_eq_debug() {
        let set: OrderedMultiset<i32> = OrderedMultiset::from([7, 7, 9]);
        let mut other = set.clone();
        assert_eq!(set, other);
        assert_eq!(format!("{:?}", set), "[7, 7, 9]");
        other.insert(1);
        assert_ne!(set, other);
        other.clear();
        assert!(other.is_empty());
        assert_eq!(other, OrderedMultiset::default());
    }
}
