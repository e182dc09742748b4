//! Package implement the storage core for an RPKI relying-party validator.
//!
//! Validated RPKI objects, repositories, trust anchors and validation runs
//! are kept in named, transactional key-value maps. Each map is an
//! [IxMap] (one value per key) or a [MultiIxMap] (a set of values per key),
//! optionally carrying secondary indexes that are maintained on every
//! mutation.
//!
//! Storage backends
//! ----------------
//!
//! [Storage] is created either durable, backed by LMDB, or in-memory with
//! snapshot isolation. Both backends honour the same contract:
//!
//! * Many concurrent readers, each reading a consistent snapshot.
//! * A single writer at a time. A write transaction becomes visible
//!   atomically on commit, or not at all.
//! * After-commit callbacks are executed only once a write transaction
//!   has committed successfully.
//!
//! ```ignore
//! let storage = rpkidb::Storage::in_memory()?;
//! let objects = rpkidb::stores::RpkiObjects::new(&storage)?;
//! storage.write_tx0(|tx| objects.put(tx, &object))?;
//! ```
//!
//! Values are serialized using a tagged binary encoding, refer [codec]
//! module, where each field is identified by a numeric tag so that records
//! can evolve without breaking stored data.
//!
//! Garbage collection
//! ------------------
//!
//! The [cleanup] module implement retention services. RPKI objects are
//! collected using a mark-and-sweep over the object graph rooted at the
//! configured trust anchors, repositories and validation runs are pruned
//! by age.

/// Short form to compose Error values.
///
/// Here are few possible ways:
///
/// ```ignore
/// use crate::Error;
/// err_at!(StoreFail, msg: "bad table {}", name);
/// ```
///
/// ```ignore
/// use crate::Error;
/// err_at!(IOError, std::fs::read(file_path));
/// ```
///
/// ```ignore
/// use crate::Error;
/// err_at!(IOError, std::fs::read(file_path), "read failed for {:?}", file_path);
/// ```
#[macro_export]
macro_rules! err_at {
    ($v:ident, msg: $($arg:expr),+) => {{
        let prefix = format!("{}:{}", file!(), line!());
        Err($crate::Error::$v(prefix, format!($($arg),+)))
    }};
    ($v:ident, $e:expr) => {{
        match $e {
            Ok(val) => Ok(val),
            Err(err) => {
                let prefix = format!("{}:{}", file!(), line!());
                Err($crate::Error::$v(prefix, format!("{}", err)))
            }
        }
    }};
    ($v:ident, $e:expr, $($arg:expr),+) => {{
        match $e {
            Ok(val) => Ok(val),
            Err(err) => {
                let prefix = format!("{}:{}", file!(), line!());
                let msg = format!($($arg),+);
                Err($crate::Error::$v(prefix, format!("{} {}", err, msg)))
            }
        }
    }};
}

/// Fail with DecodeFail, if `$buf` is shorter than `$want` bytes.
#[macro_export]
macro_rules! check_remaining {
    ($buf:expr, $want:expr, $msg:expr) => {
        if $buf.len() < $want {
            err_at!(
                DecodeFail, msg: "insufficient input {}/{} ({})", $msg, $buf.len(), $want
            )
        } else {
            Ok(())
        }
    };
}

pub mod cleanup;
pub mod codec;
pub mod config;
pub mod data;
mod error;
mod key;
pub mod store;
pub mod stores;
pub mod util;

pub use crate::config::Config;
pub use crate::data::Ref;
pub use crate::error::{Error, Result};
pub use crate::key::{keys, Key};
pub use crate::store::{IxBase, IxMap, MultiIxMap, Storage};
pub use crate::store::{ReadTx, Tx, WriteTx};
