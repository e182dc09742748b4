//! Module implement transactional, indexed, key-value maps.
//!
//! [Storage] is the entry point. It owns a storage engine, which is either
//! [lmdb::LmdbBackend] or [mem::MemBackend], and hands out named maps and
//! transactions. Each map is laid out as a primary table named
//! `<name>-main` and one table per declared index, `<name>-idx-<index>`.
//! Index names for each map are remembered in the `meta` table, so that
//! indexes are dropped or rebuilt when a map is created with a different
//! set of index functions.

use cbordata::Cborize;
use log::{debug, info};

use std::{
    collections::BTreeMap,
    fmt::Write,
    sync::{Arc, Mutex},
    time,
};

use crate::{codec::Coder, util, Config, Result};

mod backend;
mod ixbase;
mod ixmap;
pub mod lmdb;
pub mod mem;
mod multi_ixmap;
mod tx;

pub use backend::{Backend, BackendStats, RawRead, RawWrite, ScanFn, Table};
pub use ixbase::{IxBase, MapCore, Sizes};
pub use ixmap::{IndexFn, Indexes, IxMap, OnDelete};
pub use multi_ixmap::MultiIxMap;
pub use tx::{ReadTx, Tx, TxInfo, WriteTx};

use ixbase::MapStats;
use ixmap::Index;
use tx::TxRegistry;

const MAPINFO_VER: u32 = 0x00010001;

const KIND_IX: &str = "ix";
const KIND_MULTI: &str = "multi";

/// Persisted description of a map.
#[derive(Clone, Debug, Default, Eq, PartialEq, Cborize)]
struct MapInfo {
    kind: String,
    indexes: Vec<String>,
}

impl MapInfo {
    const ID: u32 = MAPINFO_VER;
}

fn to_main_table(name: &str) -> String {
    format!("{}-main", name)
}

fn to_index_table(name: &str, index: &str) -> String {
    format!("{}-idx-{}", name, index)
}

/// Storage, a set of named maps over a single storage engine.
pub struct Storage {
    backend: Box<dyn Backend>,
    meta: Table,
    registry: TxRegistry,
    maps: Mutex<BTreeMap<String, Arc<dyn MapStats>>>,
}

impl Storage {
    /// Open durable storage, backed by LMDB, under `config.dir`.
    pub fn open(config: &Config) -> Result<Storage> {
        let backend = lmdb::LmdbBackend::open(config)?;
        Storage::from_backend(Box::new(backend))
    }

    /// Create storage that lives only in memory.
    pub fn in_memory() -> Result<Storage> {
        Storage::from_backend(Box::new(mem::MemBackend::new()))
    }

    pub fn from_backend(backend: Box<dyn Backend>) -> Result<Storage> {
        let meta = backend.open_table("meta", false)?;
        let storage = Storage {
            backend,
            meta,
            registry: TxRegistry::default(),
            maps: Mutex::new(BTreeMap::new()),
        };
        Ok(storage)
    }

    pub fn to_backend_name(&self) -> String {
        self.backend.to_name()
    }

    pub fn begin_read(&self) -> Result<ReadTx> {
        let raw = self.backend.begin_read()?;
        Ok(ReadTx::new(raw, &self.registry))
    }

    /// Begin a write transaction, blocks while another write transaction
    /// is in progress.
    pub fn begin_write(&self) -> Result<WriteTx> {
        let raw = self.backend.begin_write()?;
        Ok(WriteTx::new(raw, &self.registry))
    }

    /// Run `f` within a read transaction.
    pub fn read_tx<'a, F, T>(&'a self, f: F) -> Result<T>
    where
        F: FnOnce(&ReadTx<'a>) -> Result<T>,
    {
        let tx = self.begin_read()?;
        f(&tx)
    }

    /// Run `f` within a write transaction. The transaction is committed if
    /// `f` returns Ok, rolled back otherwise.
    pub fn write_tx<'a, F, T>(&'a self, f: F) -> Result<T>
    where
        F: FnOnce(&mut WriteTx<'a>) -> Result<T>,
    {
        let mut tx = self.begin_write()?;
        match f(&mut tx) {
            Ok(val) => {
                let id = tx.id();
                if !tx.commit()? {
                    debug!(target: "rpkidb", "tx-{} rolled back, marked aborted", id);
                }
                Ok(val)
            }
            Err(err) => {
                tx.rollback();
                Err(err)
            }
        }
    }

    /// Same as [write_tx][Storage::write_tx], for functions returning
    /// nothing.
    pub fn write_tx0<'a, F>(&'a self, f: F) -> Result<()>
    where
        F: FnOnce(&mut WriteTx<'a>) -> Result<()>,
    {
        self.write_tx(f)
    }

    /// Create map `name`, with secondary `indexes`. Indexes are reconciled
    /// with the ones remembered for this map, stale indexes are dropped and
    /// all indexes are rebuilt if the set of index names has changed.
    pub fn create_ix_map<T>(
        &self,
        name: &str,
        indexes: Indexes<T>,
        coder: Arc<dyn Coder<T>>,
    ) -> Result<Arc<IxMap<T>>>
    where
        T: 'static + Send + Sync,
    {
        check_map_name(name)?;
        let old_info = self.read_tx(|tx| self.get_map_info(tx, name))?;
        match &old_info {
            Some(info) if info.kind != KIND_IX => {
                return err_at!(InvalidInput, msg: "map {} exists with kind {}", name, info.kind);
            }
            _ => (),
        }

        let main = self.backend.open_table(&to_main_table(name), false)?;
        let mut ixs = BTreeMap::new();
        for (index, func) in indexes.into_iter() {
            check_map_name(&index)?;
            let table = self.backend.open_table(&to_index_table(name, &index), true)?;
            ixs.insert(index, Index::new(table, func));
        }
        let new_info = MapInfo {
            kind: KIND_IX.to_string(),
            indexes: ixs.keys().cloned().collect(),
        };

        // stale index tables must be opened before the write transaction.
        let mut stale = vec![];
        if let Some(old_info) = &old_info {
            for index in old_info.indexes.iter() {
                if !ixs.contains_key(index) {
                    let table = self.backend.open_table(&to_index_table(name, index), true)?;
                    stale.push(table);
                }
            }
        }

        let map = Arc::new(IxMap::new(MapCore::new(name, main, coder), ixs));

        let start = time::Instant::now();
        let n = self.write_tx(|tx| {
            let reindex = match &old_info {
                Some(info) if info.indexes == new_info.indexes => false,
                Some(_) => true,
                None => !new_info.indexes.is_empty() && map.size(tx)? > 0,
            };

            let raw = tx.as_raw_mut()?;
            for table in stale.iter() {
                raw.clear(table)?;
            }
            if old_info.as_ref() != Some(&new_info) {
                self.put_map_info(tx, name, &new_info)?;
            }

            if reindex {
                Ok(Some(map.reindex(tx)?))
            } else {
                Ok(None)
            }
        })?;

        match n {
            Some(n) => info!(
                target: "rpkidb",
                "{} reindexed {:?} over {} entries in {:?}",
                name, new_info.indexes, n, start.elapsed()
            ),
            None => debug!(target: "rpkidb", "{} opened indexes:{:?}", name, new_info.indexes),
        }

        self.register_map(name, Arc::clone(&map) as Arc<dyn MapStats>)?;
        Ok(map)
    }

    /// Create map `name` holding a set of values per key.
    pub fn create_multi_ix_map<T>(
        &self,
        name: &str,
        coder: Arc<dyn Coder<T>>,
    ) -> Result<Arc<MultiIxMap<T>>>
    where
        T: 'static + Send + Sync,
    {
        check_map_name(name)?;

        let new_info = MapInfo {
            kind: KIND_MULTI.to_string(),
            indexes: vec![],
        };
        let old_info = self.read_tx(|tx| self.get_map_info(tx, name))?;
        match &old_info {
            Some(info) if info.kind != KIND_MULTI => {
                return err_at!(InvalidInput, msg: "map {} exists with kind {}", name, info.kind);
            }
            Some(_) => (),
            None => self.write_tx(|tx| self.put_map_info(tx, name, &new_info))?,
        }
        let main = self.backend.open_table(&to_main_table(name), true)?;
        debug!(target: "rpkidb", "{} opened multi-map", name);

        let map = Arc::new(MultiIxMap::new(MapCore::new(name, main, coder)));
        self.register_map(name, Arc::clone(&map) as Arc<dyn MapStats>)?;
        Ok(map)
    }

    /// Names of maps created on this storage.
    pub fn to_map_names(&self) -> Result<Vec<String>> {
        let maps = err_at!(IPCFail, self.maps.lock())?;
        Ok(maps.keys().cloned().collect())
    }

    /// Transactions that are currently open.
    pub fn to_live_txns(&self) -> Vec<TxInfo> {
        self.registry.to_live()
    }

    /// Human readable status of this storage.
    pub fn status(&self) -> Result<String> {
        let stats = self.backend.to_stats()?;
        let txns = self.to_live_txns();
        let writes = txns.iter().filter(|t| t.write).count();

        let mut s = String::default();
        err_at!(Fatal, writeln!(s, "backend: {}", stats))?;
        err_at!(
            Fatal,
            writeln!(s, "transactions: {} read, {} write", txns.len() - writes, writes)
        )?;
        for txn in txns.iter() {
            err_at!(Fatal, writeln!(s, "  {}", txn))?;
        }
        err_at!(Fatal, writeln!(s, "maps: {}", self.to_map_names()?.join(", ")))?;
        Ok(s)
    }

    /// Size information for every map created on this storage.
    pub fn db_stats(&self) -> Result<BTreeMap<String, Sizes>> {
        let maps: Vec<Arc<dyn MapStats>> = {
            let maps = err_at!(IPCFail, self.maps.lock())?;
            maps.values().cloned().collect()
        };
        let tx = self.begin_read()?;
        let mut stats = BTreeMap::new();
        for map in maps.iter() {
            stats.insert(map.to_name(), map.to_sizes(&tx)?);
        }
        Ok(stats)
    }

    /// Flush storage to disk and log engine statistics.
    pub fn gc(&self) -> Result<()> {
        let start = time::Instant::now();
        self.backend.sync()?;
        let stats = self.backend.to_stats()?;
        info!(target: "rpkidb", "gc {} took {:?}", stats, start.elapsed());
        Ok(())
    }

    fn register_map(&self, name: &str, map: Arc<dyn MapStats>) -> Result<()> {
        let mut maps = err_at!(IPCFail, self.maps.lock())?;
        maps.insert(name.to_string(), map);
        Ok(())
    }

    fn get_map_info(&self, tx: &dyn Tx, name: &str) -> Result<Option<MapInfo>> {
        match tx.as_raw().get(&self.meta, name.as_bytes())? {
            Some(data) => Ok(Some(util::from_cbor_bytes(&data)?.0)),
            None => Ok(None),
        }
    }

    fn put_map_info(&self, tx: &mut WriteTx, name: &str, info: &MapInfo) -> Result<()> {
        let data = util::into_cbor_bytes(info.clone())?;
        tx.as_raw_mut()?.put(&self.meta, name.as_bytes(), &data)
    }
}

fn check_map_name(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name.len() < 200
        && name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == ':');
    if ok {
        Ok(())
    } else {
        err_at!(InvalidInput, msg: "invalid map/index name {:?}", name)
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

// storages for contract tests, one per backend.
#[cfg(test)]
pub(crate) fn test_storages(name: &str) -> Vec<Storage> {
    let dir = std::env::temp_dir().join("rpkidb-test");
    let mut config = Config::new(dir.as_os_str(), name);
    config.set_lmdb(64 * 1024 * 1024, 64, 126).set_fsync(false);
    util::files::purge_dir(dir.join(name).as_os_str()).unwrap();

    vec![Storage::in_memory().unwrap(), Storage::open(&config).unwrap()]
}
