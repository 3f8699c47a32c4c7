//! Iterators for [OrderedMultiset](super::OrderedMultiset).

use std::collections::btree_set;
use std::iter::FusedIterator;

use super::Slot;

/// Iterator over references to the elements of a multiset, in order.
pub struct Iter<'a, K, C> {
    inner: btree_set::Iter<'a, Slot<K, C>>,
}

impl<'a, K, C> Iter<'a, K, C> {
    pub(super) fn new(inner: btree_set::Iter<'a, Slot<K, C>>) -> Self {
        Iter { inner }
    }
}

impl<'a, K, C> Clone for Iter<'a, K, C> {
    fn clone(&self) -> Self {
        Iter {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, K, C> Iterator for Iter<'a, K, C> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|s| &s.key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, C> DoubleEndedIterator for Iter<'_, K, C> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|s| &s.key)
    }
}

impl<K, C> ExactSizeIterator for Iter<'_, K, C> {}

impl<K, C> FusedIterator for Iter<'_, K, C> {}

/// Owning iterator over the elements of a multiset, in order.
pub struct IntoIter<K, C> {
    inner: btree_set::IntoIter<Slot<K, C>>,
}

impl<K, C> IntoIter<K, C> {
    pub(super) fn new(inner: btree_set::IntoIter<Slot<K, C>>) -> Self {
        IntoIter { inner }
    }
}

impl<K, C> Iterator for IntoIter<K, C> {
    type Item = K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|s| s.key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, C> DoubleEndedIterator for IntoIter<K, C> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|s| s.key)
    }
}

impl<K, C> ExactSizeIterator for IntoIter<K, C> {}

impl<K, C> FusedIterator for IntoIter<K, C> {}
