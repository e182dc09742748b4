//! Module implement retention services over the domain stores.
//!
//! * [RpkiObjectCleanup], mark-and-sweep over the object graph rooted at
//!   the trust anchors. Objects that were not found reachable for longer
//!   than the grace duration are deleted.
//! * [RpkiRepositoryCleanup], drop repositories no longer referenced by
//!   any trust anchor.
//! * [ValidationRunCleanup], drop old validation runs, always keeping the
//!   latest successful one, and their orphaned associations.
//!
//! All services are batch jobs, triggered by an external scheduler. Each
//! of them is idempotent and can run concurrently with other writers, as
//! every write goes through its own write transaction.

use std::{fmt, time};

use crate::data::{ManifestEntry, RpkiObject};

mod objects;
mod repositories;
mod validation_runs;

pub use objects::RpkiObjectCleanup;
pub use repositories::RpkiRepositoryCleanup;
pub use validation_runs::ValidationRunCleanup;

/// Certificate fields needed to trace the object graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaCertificate {
    pub subject_key_identifier: Vec<u8>,
    /// Location of the manifest published by this certificate's
    /// authority.
    pub manifest_uri: Option<String>,
    pub is_ca: bool,
}

/// Parsing of encoded certificates and manifests, which lives outside
/// this crate.
pub trait ObjectGraph: Send + Sync {
    /// Parse an encoded certificate, None if it is not a certificate.
    fn certificate(&self, encoded: &[u8]) -> Option<CaCertificate>;

    /// Files listed in manifest `mft`, None if it can't be parsed.
    fn manifest_entries(&self, mft: &RpkiObject) -> Option<Vec<ManifestEntry>>;
}

/// Outcome of a cleanup run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CleanupStats {
    /// Objects marked reachable.
    pub marked: usize,
    pub deleted: usize,
    /// Associations dropped because their target is gone.
    pub orphans: usize,
    pub elapsed: time::Duration,
}

impl fmt::Display for CleanupStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "marked:{} deleted:{} orphans:{} elapsed:{:?}",
            self.marked, self.deleted, self.orphans, self.elapsed
        )
    }
}

#[cfg(test)]
#[path = "cleanup_test.rs"]
mod cleanup_test;
