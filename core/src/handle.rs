//! Typed indices into the ordered tables of a [`Node`](crate::Node).
//!
//! Every cross-table reference in the model (signal to element, protocol to
//! data pool, data pool to owning application) is an [`Index`] tagged with the
//! table it points into, so a list index cannot be passed where an element
//! index is expected.

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Application, CanProtocol, DataPool, DataPoolElement, DataPoolList};

pub struct Index<T> {
    raw: u32,
    _tag: PhantomData<fn() -> T>,
}

pub type DataPoolIndex = Index<DataPool>;
pub type ListIndex = Index<DataPoolList>;
pub type ElementIndex = Index<DataPoolElement>;
pub type ApplicationIndex = Index<Application>;
pub type ProtocolIndex = Index<CanProtocol>;

impl<T> Index<T> {
    pub const fn new(raw: u32) -> Self {
        Self {
            raw,
            _tag: PhantomData,
        }
    }

    /// Index from a position in a `Vec`. Panics past `u32::MAX`, which no
    /// model table can reach.
    pub fn from_position(pos: usize) -> Self {
        Self::new(u32::try_from(pos).expect("table position fits in u32"))
    }

    pub const fn raw(self) -> u32 {
        self.raw
    }

    pub const fn get(self) -> usize {
        self.raw as usize
    }

    /// Look up the indexed entry in its table.
    pub fn lookup(self, table: &[T]) -> Option<&T> {
        table.get(self.get())
    }
}

impl<T> Clone for Index<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Index<T> {}

impl<T> PartialEq for Index<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for Index<T> {}

impl<T> PartialOrd for Index<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Index<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<T> Hash for Index<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T> fmt::Debug for Index<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.raw)
    }
}

impl<T> fmt::Display for Index<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl<T> From<u32> for Index<T> {
    fn from(raw: u32) -> Self {
        Self::new(raw)
    }
}

impl<T> Serialize for Index<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Index<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u32::deserialize(deserializer).map(Self::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_in_table() {
        let apps = vec![Application::programmable("Main")];

        assert_eq!(ApplicationIndex::new(0).lookup(&apps).unwrap().name, "Main");
        assert!(ApplicationIndex::new(1).lookup(&apps).is_none());
    }

    #[test]
    fn serializes_as_bare_integer() {
        let idx = ListIndex::new(7);
        assert_eq!(serde_json::to_string(&idx).unwrap(), "7");

        let back: ListIndex = serde_json::from_str("7").unwrap();
        assert_eq!(back, idx);
    }
}
