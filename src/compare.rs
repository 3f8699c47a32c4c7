//! Ordering policies for [OrderedMultiset](crate::multiset::OrderedMultiset).
//!
//! The ordering of a multiset is selected by a type parameter rather than a
//! value, so that the underlying tree can order its entries without carrying a
//! comparator around with every node.

use std::cmp::Ordering;

/// A total order over `K`.
///
/// Implementations must be consistent: if `compare(a, b)` is `Less` then
/// `compare(b, a)` is `Greater`, equality is transitive, and the result for a
/// pair of keys must not change while they are stored. Breaking these rules is
/// a logic error. It will never cause memory unsafety, but the layout of the
/// multiset and the results of lookups become unspecified.
///
/// A comparison must never call back into the concurrent multiset that is
/// invoking it. The lock is not reentrant, and doing so will deadlock.
pub trait Compare<K: ?Sized> {
    /// Compare two keys.
    fn compare(a: &K, b: &K) -> Ordering;
}

/// The natural order of `K`, as given by its `Ord` implementation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Natural;

impl<K: Ord + ?Sized> Compare<K> for Natural {
    #[inline]
    fn compare(a: &K, b: &K) -> Ordering {
        a.cmp(b)
    }
}

/// The reverse of the natural order of `K`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reversed;

impl<K: Ord + ?Sized> Compare<K> for Reversed {
    #[inline]
    fn compare(a: &K, b: &K) -> Ordering {
        b.cmp(a)
    }
}
