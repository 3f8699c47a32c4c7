#[cfg(feature = "serde")]
use std::fmt;
#[cfg(feature = "serde")]
use std::iter;
#[cfg(feature = "serde")]
use std::marker::PhantomData;

#[cfg(feature = "serde")]
use serde::de::{Deserialize, SeqAccess, Visitor};

/// The lock used when no other is requested.
pub type DefaultRawMutex = parking_lot::RawMutex;

#[cfg(feature = "serde")]
pub struct SeqCollector<T, K>(PhantomData<(T, K)>);

#[cfg(feature = "serde")]
impl<T, K> SeqCollector<T, K> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

#[cfg(feature = "serde")]
impl<'de, T, K> Visitor<'de> for SeqCollector<T, K>
where
    T: FromIterator<K>,
    K: Deserialize<'de>,
{
    type Value = T;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a sequence")
    }

    fn visit_seq<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        iter::from_fn(|| access.next_element().transpose()).collect()
    }
}
