//! A concurrently usable ordered multiset, where every operation is
//! serialised by a single mutex.
//!
//! See [ConcurrentOrderedMultisetRaw] for the details of the locking
//! discipline and the hazards of positions.

use core::fmt;
use core::ops::Deref;
use lock_api::{Mutex, MutexGuard, RawMutex};
use std::mem;
use tracing::trace;

#[cfg(feature = "serde")]
use serde::{
    de::{Deserialize, Deserializer},
    ser::{Serialize, Serializer},
};

use crate::compare::{Compare, Natural};
use crate::multiset::{OrderedMultiset, Position};

/// Concurrent ordered multiset with the default mutex type provided.
pub type ConcurrentOrderedMultiset<K, C = Natural> =
    ConcurrentOrderedMultisetRaw<K, C, crate::utils::DefaultRawMutex>;

/// An ordered multiset that may be shared between threads.
///
/// Every operation takes the lock for its entire duration, performs the
/// operation on the inner [OrderedMultiset], and releases the lock before
/// returning. Reads contend with reads just as they do with writes: there is
/// no reader/writer distinction. Operations from different threads are
/// totally ordered by the order they acquire the lock, but which waiting
/// thread acquires it next is unspecified.
///
/// Only single operations are atomic. A [find](Self::find) followed by an
/// [erase_at](Self::erase_at) is two locked sections, and another thread may
/// change the multiset between them.
///
/// # Positions
///
/// Operations such as [find](Self::find) and [lower_bound](Self::lower_bound)
/// return a [Position]. The lock is released before the caller sees it, so a
/// position is only a hint: any insert, erase, clear or assign by any thread
/// can make it stale. Prefer [view](Self::view), which holds the lock while
/// you walk the elements, or [to_vec](Self::to_vec), which copies them out.
///
/// # Reentrancy
///
/// The lock is not reentrant. Calling back into the same multiset while a
/// call is in progress on this thread deadlocks. That includes calls from a
/// [Compare] implementation, and calls while a [MultisetView] is alive.
///
/// # Ownership
///
/// The multiset can not be cloned, and while it is shared it can not be
/// moved. To replace its contents, assign an unprotected multiset over them
/// with [assign](Self::assign).
///
/// ```compile_fail
/// use lockset::ConcurrentOrderedMultiset;
///
/// let set: ConcurrentOrderedMultiset<u32> = ConcurrentOrderedMultiset::new();
/// let copy = set.clone();
/// ```
///
/// # Examples
/// ```
/// use lockset::ConcurrentOrderedMultiset;
/// use std::thread::scope;
///
/// let set: ConcurrentOrderedMultiset<u32> = ConcurrentOrderedMultiset::new();
///
/// scope(|scope| {
///     for t in 0..4 {
///         let set = &set;
///         scope.spawn(move || {
///             for k in 0..10 {
///                 set.insert(t * 100 + k);
///             }
///         });
///     }
/// });
///
/// assert_eq!(set.len(), 40);
/// assert_eq!(set.lower_bound(&150).key(), Some(&200));
/// ```
pub struct ConcurrentOrderedMultisetRaw<K, C, M: RawMutex> {
    inner: Mutex<M, OrderedMultiset<K, C>>,
}

/// A read only view of a [ConcurrentOrderedMultisetRaw] that holds the lock
/// until it is dropped.
///
/// While a view exists no other thread can change the multiset, so the
/// elements and positions seen through it are stable. Every other operation
/// on the same multiset, from any thread, blocks until the view is dropped.
pub struct MultisetView<'a, K, C, M: RawMutex> {
    guard: MutexGuard<'a, M, OrderedMultiset<K, C>>,
}

impl<K, C, M: RawMutex> Deref for MultisetView<'_, K, C, M> {
    type Target = OrderedMultiset<K, C>;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<K, C, M: RawMutex> ConcurrentOrderedMultisetRaw<K, C, M> {
    /// Create a new, empty multiset.
    pub fn new() -> Self {
        ConcurrentOrderedMultisetRaw {
            inner: Mutex::new(OrderedMultiset::new()),
        }
    }

    /// Returns true if the multiset holds no elements at the instant of the
    /// call.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// The number of elements at the instant of the call.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Remove every element.
    pub fn clear(&self) {
        let mut guard = self.inner.lock();
        trace!(len = guard.len(), "clear");
        guard.clear();
    }

    /// Lock the multiset and return a read only view of it. The lock is
    /// released when the view is dropped.
    pub fn view(&self) -> MultisetView<'_, K, C, M> {
        MultisetView {
            guard: self.inner.lock(),
        }
    }
}

impl<K, C, M> ConcurrentOrderedMultisetRaw<K, C, M>
where
    C: Compare<K>,
    M: RawMutex,
{
    /// Insert a key. Duplicates are always accepted.
    pub fn insert(&self, key: K) {
        self.inner.lock().insert(key)
    }

    /// Replace the entire contents with `set`, which is taken by value.
    ///
    /// Other threads observe either the old contents or the new, never a mix.
    /// Positions taken before the assignment are stale.
    pub fn assign(&self, set: OrderedMultiset<K, C>) {
        let old = {
            let mut guard = self.inner.lock();
            trace!(old = guard.len(), new = set.len(), "assign");
            mem::replace(&mut *guard, set)
        };
        // The previous elements are released after the lock.
        drop(old);
    }
}

impl<K, C, M> ConcurrentOrderedMultisetRaw<K, C, M>
where
    K: Clone,
    C: Compare<K>,
    M: RawMutex,
{
    /// Create a multiset holding a copy of the elements of `set`.
    pub fn from_multiset(set: &OrderedMultiset<K, C>) -> Self {
        ConcurrentOrderedMultisetRaw {
            inner: Mutex::new(set.clone()),
        }
    }

    /// The number of elements equal to `key`.
    ///
    /// Lookups by key need `K: Clone`, as the search bounds are built from
    /// copies of `key`.
    pub fn count(&self, key: &K) -> usize {
        self.inner.lock().count(key)
    }

    /// Remove every element equal to `key`, returning the number removed.
    ///
    /// Like [count](Self::count) this needs `K: Clone`. Keys that can not be
    /// cloned can only be removed with [clear](Self::clear).
    pub fn erase(&self, key: &K) -> usize {
        self.inner.lock().erase(key)
    }

    /// Remove exactly the element `pos` denotes, and return the position of
    /// the element that followed it.
    ///
    /// The caller must ensure no other thread has changed the multiset since
    /// `pos` was obtained. If it has, this still never panics, but it may
    /// remove nothing or return an unexpected position. See [Position].
    pub fn erase_at(&self, pos: &Position<K>) -> Position<K> {
        self.inner.lock().erase_at(pos)
    }

    /// The position of an element equal to `key`, or the end marker. With
    /// duplicates this is the first of them.
    pub fn find(&self, key: &K) -> Position<K> {
        self.inner.lock().find(key)
    }

    /// The position of the first element not ordered before `key`.
    pub fn lower_bound(&self, key: &K) -> Position<K> {
        self.inner.lock().lower_bound(key)
    }

    /// The position of the first element ordered after `key`.
    pub fn upper_bound(&self, key: &K) -> Position<K> {
        self.inner.lock().upper_bound(key)
    }

    /// The position of the first element, or the end marker.
    pub fn begin(&self) -> Position<K> {
        self.inner.lock().begin()
    }

    /// The end marker.
    pub fn end(&self) -> Position<K> {
        self.inner.lock().end()
    }

    /// The position of the element after `pos`.
    pub fn advance(&self, pos: &Position<K>) -> Position<K> {
        self.inner.lock().advance(pos)
    }

    /// Replace the entire contents with a copy of `set`. The copy is made
    /// before the lock is taken.
    pub fn assign_from(&self, set: &OrderedMultiset<K, C>) {
        self.assign(set.clone())
    }

    /// Copy the elements out, in order, under a single lock.
    pub fn to_vec(&self) -> Vec<K> {
        self.inner.lock().iter().cloned().collect()
    }
}

impl<K, C, M: RawMutex> Drop for ConcurrentOrderedMultisetRaw<K, C, M> {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        trace!(len = inner.len(), "drop");
        inner.clear();
    }
}

impl<K, C, M: RawMutex> Default for ConcurrentOrderedMultisetRaw<K, C, M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, C, M: RawMutex> From<OrderedMultiset<K, C>> for ConcurrentOrderedMultisetRaw<K, C, M> {
    fn from(set: OrderedMultiset<K, C>) -> Self {
        ConcurrentOrderedMultisetRaw {
            inner: Mutex::new(set),
        }
    }
}

impl<K, C: Compare<K>, M: RawMutex> FromIterator<K> for ConcurrentOrderedMultisetRaw<K, C, M> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        OrderedMultiset::<K, C>::from_iter(iter).into()
    }
}

impl<K: fmt::Debug, C, M: RawMutex> fmt::Debug for ConcurrentOrderedMultisetRaw<K, C, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = f.debug_struct("ConcurrentOrderedMultiset");
        match self.inner.try_lock() {
            Some(guard) => {
                f.field("inner", &&*guard);
            }
            None => {
                struct LockedPlaceholder;
                impl fmt::Debug for LockedPlaceholder {
                    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                        f.write_str("<locked>")
                    }
                }

                f.field("inner", &LockedPlaceholder);
            }
        }
        f.finish()
    }
}

#[cfg(feature = "serde")]
impl<K, C, M> Serialize for ConcurrentOrderedMultisetRaw<K, C, M>
where
    K: Serialize,
    M: RawMutex,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.view().serialize(serializer)
    }
}

#[cfg(feature = "serde")]
impl<'de, K, C, M> Deserialize<'de> for ConcurrentOrderedMultisetRaw<K, C, M>
where
    K: Deserialize<'de>,
    C: Compare<K>,
    M: RawMutex,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        OrderedMultiset::<K, C>::deserialize(deserializer).map(Self::from)
    }
}

/// The operations of a shared ordered multiset, independent of how it is
/// synchronised.
///
/// Code that only needs these operations can be written against this trait,
/// so that the locking strategy behind it can be changed without changing
/// the callers.
pub trait SharedMultiset<K> {
    /// Returns true if there are no elements.
    fn is_empty(&self) -> bool;
    /// The number of elements.
    fn len(&self) -> usize;
    /// The number of elements equal to `key`.
    fn count(&self, key: &K) -> usize;
    /// Insert a key.
    fn insert(&self, key: K);
    /// Remove every element equal to `key`, returning the number removed.
    fn erase(&self, key: &K) -> usize;
    /// The position of an element equal to `key`, or the end marker.
    fn find(&self, key: &K) -> Position<K>;
    /// The position of the first element not ordered before `key`.
    fn lower_bound(&self, key: &K) -> Position<K>;
    /// The position of the first element ordered after `key`.
    fn upper_bound(&self, key: &K) -> Position<K>;
    /// Remove every element.
    fn clear(&self);
}

impl<K, C, M> SharedMultiset<K> for ConcurrentOrderedMultisetRaw<K, C, M>
where
    K: Clone,
    C: Compare<K>,
    M: RawMutex,
{
    fn is_empty(&self) -> bool {
        ConcurrentOrderedMultisetRaw::is_empty(self)
    }

    fn len(&self) -> usize {
        ConcurrentOrderedMultisetRaw::len(self)
    }

    fn count(&self, key: &K) -> usize {
        ConcurrentOrderedMultisetRaw::count(self, key)
    }

    fn insert(&self, key: K) {
        ConcurrentOrderedMultisetRaw::insert(self, key)
    }

    fn erase(&self, key: &K) -> usize {
        ConcurrentOrderedMultisetRaw::erase(self, key)
    }

    fn find(&self, key: &K) -> Position<K> {
        ConcurrentOrderedMultisetRaw::find(self, key)
    }

    fn lower_bound(&self, key: &K) -> Position<K> {
        ConcurrentOrderedMultisetRaw::lower_bound(self, key)
    }

    fn upper_bound(&self, key: &K) -> Position<K> {
        ConcurrentOrderedMultisetRaw::upper_bound(self, key)
    }

    fn clear(&self) {
        ConcurrentOrderedMultisetRaw::clear(self)
    }
}
