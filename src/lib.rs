//! Lockset - a mutex protected ordered multiset
//!
//! An ordered multiset is a sorted collection that permits duplicate keys. This
//! crate provides one that can be shared between any number of threads, where
//! every individual operation (insert, erase, lookup, size query) is serialised
//! by a single mutex owned by the multiset.
//!
//! This is the simplest possible concurrent collection. There is no reader/writer
//! distinction, no transactions, and no waiting for elements to arrive. What you
//! get is that each call is atomic with respect to every other call on the same
//! multiset, and nothing more. If you need "find, then erase what was found" to be
//! atomic, you must provide your own lock around both calls.
//!
//! Lookups return a [Position](multiset::Position): a copy of the located key
//! plus the identity of the element. By the time the caller sees it, the lock has
//! been released and another thread may already have removed that element. To
//! walk the elements safely use [view](ConcurrentOrderedMultiset::view), which
//! holds the lock until it is dropped.
//!
//! # Features
//! * `serde` - serialise and deserialise multisets as sequences
//!
//! No features are enabled by default.

#![deny(warnings)]
#![warn(unused_extern_crates)]
#![warn(missing_docs)]
#![allow(clippy::needless_lifetimes)]

pub mod compare;
pub mod concurrent;
pub mod multiset;

mod utils;

pub use compare::{Compare, Natural, Reversed};
pub use concurrent::{
    ConcurrentOrderedMultiset, ConcurrentOrderedMultisetRaw, MultisetView, SharedMultiset,
};
pub use multiset::{OrderedMultiset, Position};
