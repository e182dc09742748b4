//! Durable storage engine, backed by LMDB.
//!
//! Every table is a named LMDB database within a single environment.
//! Environment is opened with `NO_TLS`, so that read transactions are
//! tied to transaction handles instead of threads.

use lmdb::{Cursor, DatabaseFlags, EnvironmentFlags, Transaction, WriteFlags};
use log::{debug, info};

use std::{ops::Bound, os::raw::c_uint, path};

use crate::{
    store::backend::{Backend, BackendStats, RawRead, RawWrite, ScanFn, Table},
    util::files,
    Config, Result,
};

// cursor operations, from lmdb.h
const MDB_FIRST: c_uint = 0;
const MDB_GET_BOTH: c_uint = 2;
const MDB_LAST: c_uint = 6;
const MDB_NEXT: c_uint = 8;
const MDB_PREV: c_uint = 12;
const MDB_SET_RANGE: c_uint = 17;

/// LMDB storage engine.
pub struct LmdbBackend {
    env: lmdb::Environment,
    loc: path::PathBuf,
}

impl LmdbBackend {
    /// Open, or create, LMDB environment under `config.dir/config.name`.
    pub fn open(config: &Config) -> Result<LmdbBackend> {
        let loc: path::PathBuf = {
            let dir = path::PathBuf::from(&config.dir);
            dir.join(&config.name)
        };
        files::ensure_dir(loc.as_os_str())?;

        let mut flags = EnvironmentFlags::NO_TLS;
        if !config.fsync {
            flags |= EnvironmentFlags::NO_SYNC | EnvironmentFlags::NO_META_SYNC;
        }

        let env = err_at!(
            StoreFail,
            lmdb::Environment::new()
                .set_flags(flags)
                .set_map_size(config.map_size)
                .set_max_dbs(config.max_dbs)
                .set_max_readers(config.max_readers)
                .open(&loc),
            "opening {:?}",
            loc
        )?;

        info!(
            target: "rpkidb",
            "lmdb opened {:?} map_size:{} max_dbs:{} fsync:{}",
            loc, config.map_size, config.max_dbs, config.fsync
        );

        Ok(LmdbBackend { env, loc })
    }

    pub fn to_location(&self) -> path::PathBuf {
        self.loc.clone()
    }
}

impl Backend for LmdbBackend {
    fn to_name(&self) -> String {
        "lmdb".to_string()
    }

    fn open_table(&self, name: &str, dup: bool) -> Result<Table> {
        let flags = if dup {
            DatabaseFlags::DUP_SORT
        } else {
            DatabaseFlags::empty()
        };
        let dbi = err_at!(StoreFail, self.env.create_db(Some(name), flags), "{}", name)?;
        debug!(target: "rpkidb", "lmdb table {} dup:{}", name, dup);
        Ok(Table::new(name, dup, Some(dbi)))
    }

    fn begin_read(&self) -> Result<Box<dyn RawRead + '_>> {
        let txn = err_at!(StoreFail, self.env.begin_ro_txn())?;
        Ok(Box::new(LmdbRead { txn }))
    }

    fn begin_write(&self) -> Result<Box<dyn RawWrite + '_>> {
        let txn = err_at!(StoreFail, self.env.begin_rw_txn())?;
        Ok(Box::new(LmdbWrite { txn }))
    }

    fn to_stats(&self) -> Result<BackendStats> {
        let stat = err_at!(StoreFail, self.env.stat())?;
        let stats = BackendStats {
            name: self.to_name(),
            page_size: stat.page_size(),
            depth: stat.depth(),
            branch_pages: stat.branch_pages(),
            leaf_pages: stat.leaf_pages(),
            overflow_pages: stat.overflow_pages(),
            entries: stat.entries(),
        };
        Ok(stats)
    }

    fn sync(&self) -> Result<()> {
        err_at!(StoreFail, self.env.sync(true), "{:?}", self.loc)
    }
}

fn to_dbi(table: &Table) -> Result<lmdb::Database> {
    match table.dbi {
        Some(dbi) => Ok(dbi),
        None => err_at!(StoreFail, msg: "table {} not opened in lmdb", table.name),
    }
}

fn do_get<T: Transaction>(txn: &T, table: &Table, key: &[u8]) -> Result<Option<Vec<u8>>> {
    match txn.get(to_dbi(table)?, &key) {
        Ok(value) => Ok(Some(value.to_vec())),
        Err(lmdb::Error::NotFound) => Ok(None),
        Err(err) => err_at!(StoreFail, msg: "get {}: {}", table.name, err),
    }
}

fn do_range<T: Transaction>(
    txn: &T,
    table: &Table,
    start: Bound<&[u8]>,
    end: Bound<&[u8]>,
    callb: &mut ScanFn,
) -> Result<()> {
    let cursor = err_at!(StoreFail, txn.open_ro_cursor(to_dbi(table)?))?;

    let mut item = match start {
        Bound::Unbounded => cursor.get(None, None, MDB_FIRST),
        Bound::Included(key) | Bound::Excluded(key) => {
            cursor.get(Some(key), None, MDB_SET_RANGE)
        }
    };
    loop {
        let (key, value) = match item {
            Ok((Some(key), value)) => (key, value),
            Ok((None, _)) => return err_at!(StoreFail, msg: "scan {} no key", table.name),
            Err(lmdb::Error::NotFound) => break,
            Err(err) => return err_at!(StoreFail, msg: "scan {}: {}", table.name, err),
        };

        let stop = match end {
            Bound::Included(end) => key > end,
            Bound::Excluded(end) => key >= end,
            Bound::Unbounded => false,
        };
        if stop {
            break;
        }

        let skip = matches!(start, Bound::Excluded(start) if key == start);
        if !skip && !callb(key, value)? {
            break;
        }
        item = cursor.get(None, None, MDB_NEXT);
    }

    Ok(())
}

fn do_reverse<T: Transaction>(txn: &T, table: &Table, callb: &mut ScanFn) -> Result<()> {
    let cursor = err_at!(StoreFail, txn.open_ro_cursor(to_dbi(table)?))?;

    let mut item = cursor.get(None, None, MDB_LAST);
    loop {
        match item {
            Ok((Some(key), value)) => {
                if !callb(key, value)? {
                    break;
                }
            }
            Ok((None, _)) => return err_at!(StoreFail, msg: "scan {} no key", table.name),
            Err(lmdb::Error::NotFound) => break,
            Err(err) => return err_at!(StoreFail, msg: "scan {}: {}", table.name, err),
        }
        item = cursor.get(None, None, MDB_PREV);
    }

    Ok(())
}

struct LmdbRead<'a> {
    txn: lmdb::RoTransaction<'a>,
}

impl<'a> RawRead for LmdbRead<'a> {
    fn get(&self, table: &Table, key: &[u8]) -> Result<Option<Vec<u8>>> {
        do_get(&self.txn, table, key)
    }

    fn range(
        &self,
        table: &Table,
        start: Bound<&[u8]>,
        end: Bound<&[u8]>,
        callb: &mut ScanFn,
    ) -> Result<()> {
        do_range(&self.txn, table, start, end, callb)
    }

    fn reverse(&self, table: &Table, callb: &mut ScanFn) -> Result<()> {
        do_reverse(&self.txn, table, callb)
    }
}

struct LmdbWrite<'a> {
    txn: lmdb::RwTransaction<'a>,
}

impl<'a> RawRead for LmdbWrite<'a> {
    fn get(&self, table: &Table, key: &[u8]) -> Result<Option<Vec<u8>>> {
        do_get(&self.txn, table, key)
    }

    fn range(
        &self,
        table: &Table,
        start: Bound<&[u8]>,
        end: Bound<&[u8]>,
        callb: &mut ScanFn,
    ) -> Result<()> {
        do_range(&self.txn, table, start, end, callb)
    }

    fn reverse(&self, table: &Table, callb: &mut ScanFn) -> Result<()> {
        do_reverse(&self.txn, table, callb)
    }
}

impl<'a> LmdbWrite<'a> {
    // single (key, value) pair from a dup table, positioned by cursor.
    fn delete_pair(
        &mut self,
        table: &Table,
        dbi: lmdb::Database,
        key: &[u8],
        value: &[u8],
    ) -> Result<bool> {
        let mut cur = err_at!(StoreFail, self.txn.open_rw_cursor(dbi), "{}", table.name)?;
        match cur.get(Some(key), Some(value), MDB_GET_BOTH) {
            Ok(_) => (),
            Err(lmdb::Error::NotFound) => return Ok(false),
            Err(err) => return err_at!(StoreFail, msg: "del {}: {}", table.name, err),
        }
        match cur.del(WriteFlags::empty()) {
            Ok(()) => Ok(true),
            Err(lmdb::Error::NotFound) => Ok(false),
            Err(err) => err_at!(StoreFail, msg: "del {}: {}", table.name, err),
        }
    }
}

impl<'a> RawWrite for LmdbWrite<'a> {
    fn reader(&self) -> &dyn RawRead {
        self
    }

    fn put(&mut self, table: &Table, key: &[u8], value: &[u8]) -> Result<()> {
        let flags = if table.dup {
            WriteFlags::NO_DUP_DATA
        } else {
            WriteFlags::empty()
        };
        match self.txn.put(to_dbi(table)?, &key, &value, flags) {
            Ok(()) => Ok(()),
            Err(lmdb::Error::KeyExist) if table.dup => Ok(()),
            Err(err) => err_at!(StoreFail, msg: "put {}: {}", table.name, err),
        }
    }

    fn delete(&mut self, table: &Table, key: &[u8], value: Option<&[u8]>) -> Result<bool> {
        let dbi = to_dbi(table)?;
        match value {
            Some(value) if table.dup => self.delete_pair(table, dbi, key, value),
            _ => match self.txn.del(dbi, &key, None) {
                Ok(()) => Ok(true),
                Err(lmdb::Error::NotFound) => Ok(false),
                Err(err) => err_at!(StoreFail, msg: "del {}: {}", table.name, err),
            },
        }
    }

    fn clear(&mut self, table: &Table) -> Result<()> {
        err_at!(StoreFail, self.txn.clear_db(to_dbi(table)?), "{}", table.name)
    }

    fn commit(self: Box<Self>) -> Result<()> {
        let this = *self;
        err_at!(StoreFail, this.txn.commit())
    }

    fn abort(self: Box<Self>) {
        let this = *self;
        this.txn.abort()
    }
}
