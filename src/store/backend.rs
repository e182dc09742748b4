//! Raw, byte-level, interface to storage engines.

use std::{fmt, ops::Bound};

use crate::Result;

/// Handle to a named table in the storage engine. Tables with `dup` set
/// can hold several values per key, kept in sorted order and without
/// duplicate (key, value) pairs.
#[derive(Clone)]
pub struct Table {
    pub(crate) name: String,
    pub(crate) dup: bool,
    pub(crate) dbi: Option<lmdb::Database>,
}

impl Table {
    pub(crate) fn new(name: &str, dup: bool, dbi: Option<lmdb::Database>) -> Table {
        Table {
            name: name.to_string(),
            dup,
            dbi,
        }
    }

    pub fn to_name(&self) -> String {
        self.name.clone()
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Table<{},dup:{}>", self.name, self.dup)
    }
}

/// Callback type for range scans, return false to stop the scan.
pub type ScanFn<'a> = dyn FnMut(&[u8], &[u8]) -> Result<bool> + 'a;

/// Read operations, available on read and write transactions. Reads on
/// a write transaction observe its own uncommitted writes.
pub trait RawRead {
    /// Get the value for `key`, for dup tables the smallest value.
    fn get(&self, table: &Table, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Scan entries in ascending order of (key, value) within the key range.
    fn range(
        &self,
        table: &Table,
        start: Bound<&[u8]>,
        end: Bound<&[u8]>,
        callb: &mut ScanFn,
    ) -> Result<()>;

    /// Scan all entries in descending order of (key, value).
    fn reverse(&self, table: &Table, callb: &mut ScanFn) -> Result<()>;

    /// Return all values for `key`, applicable for dup tables.
    fn get_dups(&self, table: &Table, key: &[u8]) -> Result<Vec<Vec<u8>>> {
        let mut values = vec![];
        let mut callb = |_: &[u8], v: &[u8]| -> Result<bool> {
            values.push(v.to_vec());
            Ok(true)
        };
        self.range(table, Bound::Included(key), Bound::Included(key), &mut callb)?;
        Ok(values)
    }

    /// Check whether (key, value) pair exists in a dup table.
    fn exists_dup(&self, table: &Table, key: &[u8], value: &[u8]) -> Result<bool> {
        let mut found = false;
        let mut callb = |_: &[u8], v: &[u8]| -> Result<bool> {
            found = v == value;
            Ok(!found)
        };
        self.range(table, Bound::Included(key), Bound::Included(key), &mut callb)?;
        Ok(found)
    }
}

/// Write operations, available only on write transactions.
pub trait RawWrite {
    fn reader(&self) -> &dyn RawRead;

    /// Set value for key. For dup tables add the (key, value) pair, adding
    /// an existing pair is a no-op.
    fn put(&mut self, table: &Table, key: &[u8], value: &[u8]) -> Result<()>;

    /// Delete `key` along with all its values, or only the (key, value)
    /// pair if value is supplied. Return false if nothing was deleted.
    fn delete(&mut self, table: &Table, key: &[u8], value: Option<&[u8]>) -> Result<bool>;

    /// Remove all entries from table.
    fn clear(&mut self, table: &Table) -> Result<()>;

    fn commit(self: Box<Self>) -> Result<()>;

    fn abort(self: Box<Self>);
}

/// Statistics reported by the storage engine.
#[derive(Clone, Debug, Default)]
pub struct BackendStats {
    pub name: String,
    pub page_size: u32,
    pub depth: u32,
    pub branch_pages: usize,
    pub leaf_pages: usize,
    pub overflow_pages: usize,
    pub entries: usize,
}

impl fmt::Display for BackendStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} page_size:{} depth:{} branch:{} leaf:{} overflow:{} entries:{}",
            self.name,
            self.page_size,
            self.depth,
            self.branch_pages,
            self.leaf_pages,
            self.overflow_pages,
            self.entries
        )
    }
}

/// Storage engine, a set of named tables with transactional access.
pub trait Backend: Send + Sync {
    fn to_name(&self) -> String;

    /// Open table `name`, creating it if it does not exist. Tables must be
    /// opened outside any write transaction.
    fn open_table(&self, name: &str, dup: bool) -> Result<Table>;

    fn begin_read(&self) -> Result<Box<dyn RawRead + '_>>;

    /// Begin a write transaction, blocks until other writers are done.
    fn begin_write(&self) -> Result<Box<dyn RawWrite + '_>>;

    fn to_stats(&self) -> Result<BackendStats>;

    /// Flush committed data to durable storage.
    fn sync(&self) -> Result<()>;
}
