use log::{debug, warn};

use std::{
    collections::{BTreeMap, BTreeSet},
    ops::Bound,
    sync::{Arc, RwLock},
};

use crate::{
    store::{
        backend::{RawRead, Table},
        ixbase::{table_sizes, IxBase, MapCore, MapStats, Sizes},
    },
    Error, Key, Result, Tx, WriteTx,
};

/// Index function, derive the set of index keys for a value.
pub type IndexFn<T> = Box<dyn Fn(&T) -> BTreeSet<Key> + Send + Sync>;

/// Named index functions declared for a map.
pub type Indexes<T> = BTreeMap<String, IndexFn<T>>;

/// On-delete trigger, called with the primary key of the deleted record
/// inside the deleting transaction. Return [Error::OnDeleteRestrict] to
/// veto the delete.
pub type OnDelete = dyn Fn(&mut WriteTx<'_>, &Key) -> Result<()> + Send + Sync;

pub(crate) struct Index<T> {
    pub(crate) table: Table,
    func: IndexFn<T>,
}

impl<T> Index<T> {
    pub(crate) fn new(table: Table, func: IndexFn<T>) -> Index<T> {
        Index { table, func }
    }

    // empty index keys are never stored.
    fn to_index_keys(&self, value: &T) -> BTreeSet<Key> {
        (self.func)(value).into_iter().filter(|ik| !ik.is_empty()).collect()
    }
}

/// Map from primary key to a single value, with zero or more secondary
/// indexes.
///
/// Every secondary index is a table of (index-key, primary-key) pairs,
/// kept sorted by index key and then by primary key. Indexes are
/// maintained on every [put][IxMap::put] and [delete][IxMap::delete], so
/// that an index never refers to a primary key whose current value does
/// not produce that index key.
pub struct IxMap<T> {
    core: MapCore<T>,
    indexes: BTreeMap<String, Index<T>>,
    on_delete: RwLock<Vec<Arc<OnDelete>>>,
}

impl<T> IxBase<T> for IxMap<T> {
    fn as_core(&self) -> &MapCore<T> {
        &self.core
    }

    fn size_info(&self, tx: &dyn Tx) -> Result<Sizes> {
        let raw = tx.as_raw();
        let mut sizes = table_sizes(raw, &self.core.main)?;
        for (name, index) in self.indexes.iter() {
            sizes.indexes.insert(name.clone(), table_sizes(raw, &index.table)?);
        }
        Ok(sizes)
    }

    fn clear(&self, tx: &mut WriteTx) -> Result<()> {
        let raw = tx.as_raw_mut()?;
        raw.clear(&self.core.main)?;
        for index in self.indexes.values() {
            raw.clear(&index.table)?;
        }
        Ok(())
    }
}

impl<T> IxMap<T> {
    pub(crate) fn new(core: MapCore<T>, indexes: BTreeMap<String, Index<T>>) -> IxMap<T> {
        IxMap {
            core,
            indexes,
            on_delete: RwLock::new(vec![]),
        }
    }

    /// Names of declared indexes.
    pub fn index_names(&self) -> Vec<String> {
        self.indexes.keys().cloned().collect()
    }

    pub fn get(&self, tx: &dyn Tx, key: &Key) -> Result<Option<T>> {
        match tx.as_raw().get(&self.core.main, key.as_bytes())? {
            Some(data) => Ok(Some(self.core.decode(key.as_bytes(), &data)?)),
            None => Ok(None),
        }
    }

    /// Get values for each key in `keys`, missing keys are skipped.
    pub fn get_many<'a, I>(&self, tx: &dyn Tx, keys: I) -> Result<Vec<T>>
    where
        I: IntoIterator<Item = &'a Key>,
    {
        let mut values = vec![];
        for key in keys.into_iter() {
            if let Some(value) = self.get(tx, key)? {
                values.push(value)
            }
        }
        Ok(values)
    }

    /// Return all entries in this map.
    pub fn all(&self, tx: &dyn Tx) -> Result<BTreeMap<Key, T>> {
        let mut entries = BTreeMap::new();
        self.for_each(tx, |key, value| {
            entries.insert(key, value);
            Ok(())
        })?;
        Ok(entries)
    }

    /// Set `value` for `key`, returning the previous value if any. Index
    /// entries are updated by diffing the index keys of the previous and
    /// the new value.
    pub fn put(&self, tx: &mut WriteTx, key: &Key, value: &T) -> Result<Option<T>> {
        if key.is_empty() || key.len() > Key::MAX_SIZE {
            return err_at!(InvalidInput, msg: "{} invalid key size {}", self.core.name, key.len());
        }

        let old = self.get(tx, key)?;
        let data = self.core.encode(value)?;

        let raw = tx.as_raw_mut()?;
        raw.put(&self.core.main, key.as_bytes(), &data)?;

        for (name, index) in self.indexes.iter() {
            let new_iks = index.to_index_keys(value);
            let old_iks = match &old {
                Some(old) => index.to_index_keys(old),
                None => BTreeSet::new(),
            };
            for ik in old_iks.difference(&new_iks) {
                raw.delete(&index.table, ik.as_bytes(), Some(key.as_bytes()))?;
            }
            for ik in new_iks.difference(&old_iks) {
                if ik.len() > Key::MAX_SIZE {
                    return err_at!(
                        InvalidInput, msg: "{}/{} index key too long {}", self.core.name, name, ik.len()
                    );
                }
                raw.put(&index.table, ik.as_bytes(), key.as_bytes())?;
            }
        }

        Ok(old)
    }

    /// Update the value for `key` in place, return false if `key` is not
    /// present.
    pub fn modify<F>(&self, tx: &mut WriteTx, key: &Key, f: F) -> Result<bool>
    where
        F: FnOnce(&mut T),
    {
        match self.get(tx, key)? {
            Some(mut value) => {
                f(&mut value);
                self.put(tx, key, &value)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Delete `key` along with its index entries, and run on-delete
    /// triggers. Deleting a missing key is a no-op.
    ///
    /// If a trigger vetoes the delete, the transaction is marked aborted
    /// and this call returns Ok, callers should check
    /// [WriteTx::is_aborted].
    pub fn delete(&self, tx: &mut WriteTx, key: &Key) -> Result<Option<T>> {
        let old = match self.get(tx, key)? {
            Some(old) => old,
            None => return Ok(None),
        };

        let raw = tx.as_raw_mut()?;
        raw.delete(&self.core.main, key.as_bytes(), None)?;
        for index in self.indexes.values() {
            for ik in index.to_index_keys(&old).iter() {
                raw.delete(&index.table, ik.as_bytes(), Some(key.as_bytes()))?;
            }
        }

        let triggers: Vec<Arc<OnDelete>> = match self.on_delete.read() {
            Ok(triggers) => triggers.iter().cloned().collect(),
            Err(err) => return err_at!(IPCFail, msg: "{} on-delete: {}", self.core.name, err),
        };
        for trigger in triggers.iter() {
            match trigger(tx, key) {
                Ok(()) => (),
                Err(err @ Error::OnDeleteRestrict(_, _)) => {
                    warn!(target: "rpkidb", "{} delete {} vetoed: {}", self.core.name, key, err);
                    tx.abort();
                    break;
                }
                Err(err) => return Err(err),
            }
        }

        Ok(Some(old))
    }

    /// Register an on-delete trigger.
    pub fn on_delete<F>(&self, trigger: F) -> Result<()>
    where
        F: Fn(&mut WriteTx<'_>, &Key) -> Result<()> + Send + Sync + 'static,
    {
        match self.on_delete.write() {
            Ok(mut triggers) => {
                triggers.push(Arc::new(trigger));
                Ok(())
            }
            Err(err) => err_at!(IPCFail, msg: "{} on-delete: {}", self.core.name, err),
        }
    }

    /// Primary keys indexed under `ik`. Unknown index names produce an
    /// empty result.
    pub fn get_pk_by_index(&self, tx: &dyn Tx, index: &str, ik: &Key) -> Result<BTreeSet<Key>> {
        let bounds = (Bound::Included(ik.as_bytes()), Bound::Included(ik.as_bytes()));
        self.scan_pks(tx, index, bounds)
    }

    pub fn get_by_index(&self, tx: &dyn Tx, index: &str, ik: &Key) -> Result<BTreeMap<Key, T>> {
        let pks = self.get_pk_by_index(tx, index, ik)?;
        self.resolve(tx, pks)
    }

    /// Primary keys for all index keys strictly less than `ik`.
    pub fn get_pk_by_index_less_than(
        &self,
        tx: &dyn Tx,
        index: &str,
        ik: &Key,
    ) -> Result<BTreeSet<Key>> {
        self.scan_pks(tx, index, (Bound::Unbounded, Bound::Excluded(ik.as_bytes())))
    }

    pub fn get_by_index_less_than(
        &self,
        tx: &dyn Tx,
        index: &str,
        ik: &Key,
    ) -> Result<BTreeMap<Key, T>> {
        let pks = self.get_pk_by_index_less_than(tx, index, ik)?;
        self.resolve(tx, pks)
    }

    /// Primary keys for all index keys greater than or equal to `ik`.
    pub fn get_pk_by_index_not_less_than(
        &self,
        tx: &dyn Tx,
        index: &str,
        ik: &Key,
    ) -> Result<BTreeSet<Key>> {
        self.scan_pks(tx, index, (Bound::Included(ik.as_bytes()), Bound::Unbounded))
    }

    pub fn get_by_index_not_less_than(
        &self,
        tx: &dyn Tx,
        index: &str,
        ik: &Key,
    ) -> Result<BTreeMap<Key, T>> {
        let pks = self.get_pk_by_index_not_less_than(tx, index, ik)?;
        self.resolve(tx, pks)
    }

    /// Scan `index` in descending order and return the records under the
    /// first index key that has records satisfying `pred`.
    pub fn get_by_index_max<P>(&self, tx: &dyn Tx, index: &str, pred: P) -> Result<BTreeMap<Key, T>>
    where
        P: Fn(&T) -> bool,
    {
        self.first_group(tx, index, pred, true)
    }

    /// Same as [get_by_index_max][IxMap::get_by_index_max], scanning in
    /// ascending order.
    pub fn get_by_index_min<P>(&self, tx: &dyn Tx, index: &str, pred: P) -> Result<BTreeMap<Key, T>>
    where
        P: Fn(&T) -> bool,
    {
        self.first_group(tx, index, pred, false)
    }

    /// Check that every index agrees with the primary table.
    pub fn verify(&self, tx: &dyn Tx) -> Result<()> {
        let raw = tx.as_raw();
        for (name, index) in self.indexes.iter() {
            let mut expected: BTreeSet<(Key, Key)> = BTreeSet::new();
            self.for_each(tx, |pk, value| {
                for ik in index.to_index_keys(&value).into_iter() {
                    expected.insert((ik, pk.clone()));
                }
                Ok(())
            })?;

            let mut actual: BTreeSet<(Key, Key)> = BTreeSet::new();
            let mut callb = |ik: &[u8], pk: &[u8]| -> Result<bool> {
                actual.insert((Key::from_bytes(ik), Key::from_bytes(pk)));
                Ok(true)
            };
            raw.range(&index.table, Bound::Unbounded, Bound::Unbounded, &mut callb)?;

            if let Some((ik, pk)) = actual.difference(&expected).next() {
                return err_at!(
                    IndexInconsistent, msg: "{}/{} stale entry {}->{}", self.core.name, name, ik, pk
                );
            }
            if let Some((ik, pk)) = expected.difference(&actual).next() {
                return err_at!(
                    IndexInconsistent, msg: "{}/{} missing entry {}->{}", self.core.name, name, ik, pk
                );
            }
        }
        Ok(())
    }

    /// Rebuild all indexes from the primary table.
    pub(crate) fn reindex(&self, tx: &mut WriteTx) -> Result<usize> {
        let mut entries = vec![];
        self.for_each(tx, |pk, value| {
            entries.push((pk, value));
            Ok(())
        })?;

        let raw = tx.as_raw_mut()?;
        for index in self.indexes.values() {
            raw.clear(&index.table)?;
        }
        for (pk, value) in entries.iter() {
            for index in self.indexes.values() {
                for ik in index.to_index_keys(value).iter() {
                    raw.put(&index.table, ik.as_bytes(), pk.as_bytes())?;
                }
            }
        }
        debug!(target: "rpkidb", "{} reindexed {} entries", self.core.name, entries.len());

        Ok(entries.len())
    }

    fn scan_pks(
        &self,
        tx: &dyn Tx,
        index: &str,
        (start, end): (Bound<&[u8]>, Bound<&[u8]>),
    ) -> Result<BTreeSet<Key>> {
        let mut pks = BTreeSet::new();
        let index = match self.indexes.get(index) {
            Some(index) => index,
            None => return Ok(pks),
        };
        let mut callb = |_: &[u8], pk: &[u8]| -> Result<bool> {
            pks.insert(Key::from_bytes(pk));
            Ok(true)
        };
        tx.as_raw().range(&index.table, start, end, &mut callb)?;
        Ok(pks)
    }

    // index entries whose primary record is missing are skipped.
    fn resolve(&self, tx: &dyn Tx, pks: BTreeSet<Key>) -> Result<BTreeMap<Key, T>> {
        let mut entries = BTreeMap::new();
        for pk in pks.into_iter() {
            if let Some(value) = self.get(tx, &pk)? {
                entries.insert(pk, value);
            }
        }
        Ok(entries)
    }

    fn first_group<P>(
        &self,
        tx: &dyn Tx,
        index: &str,
        pred: P,
        descending: bool,
    ) -> Result<BTreeMap<Key, T>>
    where
        P: Fn(&T) -> bool,
    {
        let mut group = BTreeMap::new();
        let index = match self.indexes.get(index) {
            Some(index) => index,
            None => return Ok(group),
        };

        let raw: &dyn RawRead = tx.as_raw();
        let core = &self.core;
        let mut current: Option<Vec<u8>> = None;
        let mut callb = |ik: &[u8], pk: &[u8]| -> Result<bool> {
            if current.as_deref() != Some(ik) {
                if !group.is_empty() {
                    return Ok(false);
                }
                current = Some(ik.to_vec());
            }
            if let Some(data) = raw.get(&core.main, pk)? {
                let value = core.decode(pk, &data)?;
                if pred(&value) {
                    group.insert(Key::from_bytes(pk), value);
                }
            }
            Ok(true)
        };
        if descending {
            raw.reverse(&index.table, &mut callb)?;
        } else {
            raw.range(&index.table, Bound::Unbounded, Bound::Unbounded, &mut callb)?;
        }

        Ok(group)
    }
}

impl<T> MapStats for IxMap<T>
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
