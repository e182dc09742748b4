use chrono::{DateTime, Utc};
use log::{debug, warn};

use std::{
    collections::BTreeMap,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering::SeqCst},
        Mutex,
    },
    thread,
};

use crate::{
    store::backend::{RawRead, RawWrite},
    util, Result,
};

/// Common trait for read and write transactions. All read operations on
/// maps accept any transaction.
pub trait Tx {
    /// Unique id for this transaction, within its storage.
    fn id(&self) -> u64;

    #[doc(hidden)]
    fn as_raw(&self) -> &dyn RawRead;
}

/// Information about an open transaction.
#[derive(Clone, Debug)]
pub struct TxInfo {
    pub id: u64,
    pub write: bool,
    pub started_at: DateTime<Utc>,
    pub thread: String,
}

impl fmt::Display for TxInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = if self.write { "write" } else { "read" };
        write!(
            f,
            "tx-{}<{}> started_at:{} thread:{}",
            self.id, kind, self.started_at, self.thread
        )
    }
}

/// Registry of open transactions.
#[derive(Default)]
pub(crate) struct TxRegistry {
    next_id: AtomicU64,
    live: Mutex<BTreeMap<u64, TxInfo>>,
}

impl TxRegistry {
    fn register(&self, write: bool) -> u64 {
        let id = self.next_id.fetch_add(1, SeqCst) + 1;
        let info = TxInfo {
            id,
            write,
            started_at: util::now(),
            thread: match thread::current().name() {
                Some(name) => name.to_string(),
                None => format!("{:?}", thread::current().id()),
            },
        };
        if let Ok(mut live) = self.live.lock() {
            live.insert(id, info);
        }
        id
    }

    fn unregister(&self, id: u64) {
        if let Ok(mut live) = self.live.lock() {
            live.remove(&id);
        }
    }

    pub(crate) fn to_live(&self) -> Vec<TxInfo> {
        match self.live.lock() {
            Ok(live) => live.values().cloned().collect(),
            Err(_) => vec![],
        }
    }
}

struct TxGuard<'a> {
    id: u64,
    registry: &'a TxRegistry,
}

impl<'a> TxGuard<'a> {
    fn new(registry: &'a TxRegistry, write: bool) -> TxGuard<'a> {
        let id = registry.register(write);
        TxGuard { id, registry }
    }
}

impl<'a> Drop for TxGuard<'a> {
    fn drop(&mut self) {
        self.registry.unregister(self.id)
    }
}

/// Read transaction, a consistent snapshot of storage for its lifetime.
pub struct ReadTx<'a> {
    raw: Box<dyn RawRead + 'a>,
    guard: TxGuard<'a>,
}

impl<'a> ReadTx<'a> {
    pub(crate) fn new(raw: Box<dyn RawRead + 'a>, registry: &'a TxRegistry) -> ReadTx<'a> {
        let guard = TxGuard::new(registry, false);
        ReadTx { raw, guard }
    }
}

impl<'a> Tx for ReadTx<'a> {
    fn id(&self) -> u64 {
        self.guard.id
    }

    fn as_raw(&self) -> &dyn RawRead {
        self.raw.as_ref()
    }
}

type AfterCommit<'a> = Box<dyn FnOnce() -> Result<()> + 'a>;

/// Write transaction. Only one write transaction can be active at any
/// time, writes become visible to other transactions on commit.
///
/// A write transaction can be marked aborted, typically by a delete
/// vetoed by an on-delete trigger. Once aborted, all further mutations
/// fail and the transaction is rolled back instead of committed.
pub struct WriteTx<'a> {
    raw: Box<dyn RawWrite + 'a>,
    guard: TxGuard<'a>,
    aborted: bool,
    after_commit: Vec<AfterCommit<'a>>,
}

impl<'a> WriteTx<'a> {
    pub(crate) fn new(raw: Box<dyn RawWrite + 'a>, registry: &'a TxRegistry) -> WriteTx<'a> {
        let guard = TxGuard::new(registry, true);
        WriteTx {
            raw,
            guard,
            aborted: false,
            after_commit: vec![],
        }
    }

    /// Mark this transaction as aborted.
    pub fn abort(&mut self) {
        self.aborted = true
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Register a callback to be called after this transaction commits
    /// successfully. Callbacks are dropped if the transaction is aborted
    /// or rolled back, errors returned by callbacks are logged.
    pub fn after_commit<F>(&mut self, callback: F)
    where
        F: FnOnce() -> Result<()> + 'a,
    {
        self.after_commit.push(Box::new(callback))
    }

    pub(crate) fn as_raw_mut(&mut self) -> Result<&mut (dyn RawWrite + 'a)> {
        if self.aborted {
            err_at!(Fatal, msg: "tx-{} is aborted", self.guard.id)
        } else {
            Ok(self.raw.as_mut())
        }
    }

    /// Commit this transaction and execute after-commit callbacks. Return
    /// false if the transaction was marked aborted and hence rolled back.
    pub fn commit(self) -> Result<bool> {
        let WriteTx {
            raw,
            guard,
            aborted,
            after_commit,
        } = self;

        if aborted {
            raw.abort();
            debug!(target: "rpkidb", "tx-{} aborted", guard.id);
            return Ok(false);
        }

        raw.commit()?;
        let id = guard.id;
        std::mem::drop(guard);

        for callback in after_commit.into_iter() {
            if let Err(err) = callback() {
                warn!(target: "rpkidb", "tx-{} after-commit: {}", id, err);
            }
        }
        Ok(true)
    }

    /// Discard all changes made in this transaction.
    pub fn rollback(self) {
        self.raw.abort()
    }
}

impl<'a> Tx for WriteTx<'a> {
    fn id(&self) -> u64 {
        self.guard.id
    }

    fn as_raw(&self) -> &dyn RawRead {
        self.raw.reader()
    }
}
