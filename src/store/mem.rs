//! In-memory storage engine with snapshot isolation.
//!
//! Committed state is an immutable [Snapshot], shared by reference
//! counting. Readers pin the snapshot current at their start. The single
//! writer works on a private copy, tables are copied lazily on first
//! write, and the copy is published atomically on commit.

use log::debug;

use std::{
    collections::{BTreeMap, BTreeSet},
    ops::Bound,
    sync::{Arc, Mutex, MutexGuard, RwLock},
};

use crate::{
    store::backend::{Backend, BackendStats, RawRead, RawWrite, ScanFn, Table},
    Result,
};

type Rows = BTreeMap<Vec<u8>, BTreeSet<Vec<u8>>>;

#[derive(Clone, Default)]
struct Snapshot {
    tables: BTreeMap<String, Arc<Rows>>,
}

impl Snapshot {
    fn get(&self, table: &Table, key: &[u8]) -> Option<Vec<u8>> {
        let values = self.tables.get(&table.name)?.get(key)?;
        values.iter().next().cloned()
    }

    fn range(
        &self,
        table: &Table,
        start: Bound<&[u8]>,
        end: Bound<&[u8]>,
        callb: &mut ScanFn,
    ) -> Result<()> {
        let rows = match self.tables.get(&table.name) {
            Some(rows) => rows,
            None => return Ok(()),
        };
        if is_empty_range(start, end) {
            return Ok(());
        }

        for (key, values) in rows.range::<[u8], _>((start, end)) {
            for value in values.iter() {
                if !callb(key.as_slice(), value.as_slice())? {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    fn reverse(&self, table: &Table, callb: &mut ScanFn) -> Result<()> {
        let rows = match self.tables.get(&table.name) {
            Some(rows) => rows,
            None => return Ok(()),
        };
        for (key, values) in rows.iter().rev() {
            for value in values.iter().rev() {
                if !callb(key.as_slice(), value.as_slice())? {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    fn to_entries(&self) -> usize {
        let rows = self.tables.values().flat_map(|rows| rows.values());
        rows.map(|values| values.len()).sum()
    }
}

// BTreeMap::range panics on inverted or empty-excluded bounds.
fn is_empty_range(start: Bound<&[u8]>, end: Bound<&[u8]>) -> bool {
    use Bound::{Excluded, Included};

    match (start, end) {
        (Included(s), Included(e)) => s > e,
        (Included(s), Excluded(e)) | (Excluded(s), Included(e)) => s >= e,
        (Excluded(s), Excluded(e)) => s >= e,
        _ => false,
    }
}

/// In-memory storage engine.
pub struct MemBackend {
    current: RwLock<Arc<Snapshot>>,
    writer: Mutex<()>,
}

impl Default for MemBackend {
    fn default() -> MemBackend {
        MemBackend {
            current: RwLock::new(Arc::new(Snapshot::default())),
            writer: Mutex::new(()),
        }
    }
}

impl MemBackend {
    pub fn new() -> MemBackend {
        MemBackend::default()
    }

    fn to_snapshot(&self) -> Result<Arc<Snapshot>> {
        Ok(Arc::clone(&*err_at!(Fatal, self.current.read())?))
    }
}

impl Backend for MemBackend {
    fn to_name(&self) -> String {
        "memory".to_string()
    }

    fn open_table(&self, name: &str, dup: bool) -> Result<Table> {
        Ok(Table::new(name, dup, None))
    }

    fn begin_read(&self) -> Result<Box<dyn RawRead + '_>> {
        let snap = self.to_snapshot()?;
        Ok(Box::new(MemRead { snap }))
    }

    fn begin_write(&self) -> Result<Box<dyn RawWrite + '_>> {
        let guard = err_at!(Fatal, self.writer.lock())?;
        let snap = self.to_snapshot()?.as_ref().clone();
        Ok(Box::new(MemWrite {
            _guard: guard,
            backend: self,
            snap,
        }))
    }

    fn to_stats(&self) -> Result<BackendStats> {
        let stats = BackendStats {
            name: self.to_name(),
            entries: self.to_snapshot()?.to_entries(),
            ..BackendStats::default()
        };
        Ok(stats)
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }
}

struct MemRead {
    snap: Arc<Snapshot>,
}

impl RawRead for MemRead {
    fn get(&self, table: &Table, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.snap.get(table, key))
    }

    fn range(
        &self,
        table: &Table,
        start: Bound<&[u8]>,
        end: Bound<&[u8]>,
        callb: &mut ScanFn,
    ) -> Result<()> {
        self.snap.range(table, start, end, callb)
    }

    fn reverse(&self, table: &Table, callb: &mut ScanFn) -> Result<()> {
        self.snap.reverse(table, callb)
    }
}

struct MemWrite<'a> {
    _guard: MutexGuard<'a, ()>,
    backend: &'a MemBackend,
    snap: Snapshot,
}

impl<'a> MemWrite<'a> {
    fn to_rows(&mut self, table: &Table) -> &mut Rows {
        let rows = self.snap.tables.entry(table.name.clone()).or_default();
        Arc::make_mut(rows)
    }
}

impl<'a> RawRead for MemWrite<'a> {
    fn get(&self, table: &Table, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.snap.get(table, key))
    }

    fn range(
        &self,
        table: &Table,
        start: Bound<&[u8]>,
        end: Bound<&[u8]>,
        callb: &mut ScanFn,
    ) -> Result<()> {
        self.snap.range(table, start, end, callb)
    }

    fn reverse(&self, table: &Table, callb: &mut ScanFn) -> Result<()> {
        self.snap.reverse(table, callb)
    }
}

impl<'a> RawWrite for MemWrite<'a> {
    fn reader(&self) -> &dyn RawRead {
        self
    }

    fn put(&mut self, table: &Table, key: &[u8], value: &[u8]) -> Result<()> {
        let dup = table.dup;
        let values = self.to_rows(table).entry(key.to_vec()).or_default();
        if !dup {
            values.clear();
        }
        values.insert(value.to_vec());
        Ok(())
    }

    fn delete(&mut self, table: &Table, key: &[u8], value: Option<&[u8]>) -> Result<bool> {
        if !self.snap.tables.contains_key(&table.name) {
            return Ok(false);
        }

        let dup = table.dup;
        let rows = self.to_rows(table);
        let deleted = match (dup, value) {
            (true, Some(value)) => match rows.get_mut(key) {
                Some(values) => {
                    let deleted = values.remove(value);
                    if values.is_empty() {
                        rows.remove(key);
                    }
                    deleted
                }
                None => false,
            },
            (_, _) => rows.remove(key).is_some(),
        };
        Ok(deleted)
    }

    fn clear(&mut self, table: &Table) -> Result<()> {
        self.snap.tables.remove(&table.name);
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<()> {
        let MemWrite {
            _guard,
            backend,
            snap,
        } = *self;
        *err_at!(Fatal, backend.current.write())? = Arc::new(snap);
        debug!(target: "rpkidb", "memory commit");
        Ok(())
    }

    fn abort(self: Box<Self>) {}
}
