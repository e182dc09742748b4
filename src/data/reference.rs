use std::{cmp, fmt, hash, marker};

use crate::{IxBase, IxMap, Key, Result, Tx};

/// Typed reference to a record of type `T`, stored under `key` in the map
/// named `map_name`.
///
/// A reference constructed through [Ref::of] is guaranteed to point to an
/// existing record at construction time, it may go stale afterwards when
/// the target is deleted. Consumers must tolerate stale references.
pub struct Ref<T> {
    map_name: String,
    key: Key,
    _value: marker::PhantomData<fn() -> T>,
}

impl<T> Ref<T> {
    /// Create a reference, verifying within `tx` that the target exists.
    pub fn of(tx: &dyn Tx, map: &IxMap<T>, key: Key) -> Result<Ref<T>> {
        if map.exists(tx, &key)? {
            Ok(Ref::unchecked(map.name(), key))
        } else {
            err_at!(RefNotFound, msg: "{} in {}", key, map.name())
        }
    }

    /// Create a reference without verifying the target, used when decoding
    /// stored references.
    pub fn unchecked(map_name: &str, key: Key) -> Ref<T> {
        Ref {
            map_name: map_name.to_string(),
            key,
            _value: marker::PhantomData,
        }
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn map_name(&self) -> &str {
        &self.map_name
    }

    /// Dereference within `tx`, stale references return None.
    pub fn get(&self, tx: &dyn Tx, map: &IxMap<T>) -> Result<Option<T>> {
        map.get(tx, &self.key)
    }
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Ref::unchecked(&self.map_name, self.key.clone())
    }
}

impl<T> PartialEq for Ref<T> {
    fn eq(&self, other: &Self) -> bool {
        self.map_name == other.map_name && self.key == other.key
    }
}

impl<T> Eq for Ref<T> {}

impl<T> PartialOrd for Ref<T> {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Ref<T> {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        (&self.map_name, &self.key).cmp(&(&other.map_name, &other.key))
    }
}

impl<T> hash::Hash for Ref<T> {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.map_name.hash(state);
        self.key.hash(state);
    }
}

impl<T> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Ref<{}>({})", self.map_name, self.key)
    }
}
