use std::collections::BTreeMap;

use crate::{
    store::ixbase::{IxBase, MapCore, MapStats, Sizes},
    Key, Result, Tx, WriteTx,
};

/// Map from primary key to a set of values, used for one-to-many
/// associations.
///
/// Mutations work on (key, value) pairs. Values are matched by their
/// encoded bytes, adding a pair that already exists is a no-op.
pub struct MultiIxMap<T> {
    core: MapCore<T>,
}

impl<T> IxBase<T> for MultiIxMap<T> {
    fn as_core(&self) -> &MapCore<T> {
        &self.core
    }
}

impl<T> MultiIxMap<T> {
    pub(crate) fn new(core: MapCore<T>) -> MultiIxMap<T> {
        MultiIxMap { core }
    }

    /// Return all values for `key`.
    pub fn get(&self, tx: &dyn Tx, key: &Key) -> Result<Vec<T>> {
        let raw = tx.as_raw();
        let mut values = vec![];
        for data in raw.get_dups(&self.core.main, key.as_bytes())?.iter() {
            values.push(self.core.decode(key.as_bytes(), data)?);
        }
        Ok(values)
    }

    pub fn all(&self, tx: &dyn Tx) -> Result<BTreeMap<Key, Vec<T>>> {
        let mut entries: BTreeMap<Key, Vec<T>> = BTreeMap::new();
        self.for_each(tx, |key, value| {
            entries.entry(key).or_default().push(value);
            Ok(())
        })?;
        Ok(entries)
    }

    pub fn put(&self, tx: &mut WriteTx, key: &Key, value: &T) -> Result<()> {
        if key.is_empty() || key.len() > Key::MAX_SIZE {
            return err_at!(InvalidInput, msg: "{} invalid key size {}", self.core.name, key.len());
        }
        let data = self.core.encode(value)?;
        tx.as_raw_mut()?.put(&self.core.main, key.as_bytes(), &data)
    }

    /// Delete all values for `key`.
    pub fn delete(&self, tx: &mut WriteTx, key: &Key) -> Result<bool> {
        tx.as_raw_mut()?.delete(&self.core.main, key.as_bytes(), None)
    }

    /// Delete the (key, value) pair, return false if it does not exist.
    pub fn delete_value(&self, tx: &mut WriteTx, key: &Key, value: &T) -> Result<bool> {
        let data = self.core.encode(value)?;
        tx.as_raw_mut()?.delete(&self.core.main, key.as_bytes(), Some(&data))
    }

    /// Delete a batch of (key, value) pairs, return the number of pairs
    /// actually deleted.
    pub fn delete_batch(&self, tx: &mut WriteTx, pairs: &[(Key, T)]) -> Result<usize> {
        let mut n = 0;
        for (key, value) in pairs.iter() {
            if self.delete_value(tx, key, value)? {
                n += 1;
            }
        }
        Ok(n)
    }

    pub fn exists_value(&self, tx: &dyn Tx, key: &Key, value: &T) -> Result<bool> {
        let data = self.core.encode(value)?;
        tx.as_raw().exists_dup(&self.core.main, key.as_bytes(), &data)
    }

    /// Number of values for `key`.
    pub fn count(&self, tx: &dyn Tx, key: &Key) -> Result<usize> {
        Ok(tx.as_raw().get_dups(&self.core.main, key.as_bytes())?.len())
    }
}

impl<T> MapStats for MultiIxMap<T>
where
    T: Send + Sync,
{
    fn to_name(&self) -> String {
        self.core.name.clone()
    }

    fn to_sizes(&self, tx: &dyn Tx) -> Result<Sizes> {
        self.size_info(tx)
    }
}
