//! Module implement domain stores over [Storage].
//!
//! Each store owns one or more maps and exposes the queries the
//! validator needs. Stores depend on each other, [Stores] wires them
//! together, including the delete triggers between them.

use std::sync::Arc;

use crate::{
    data::{CheckStatus, TrustAnchor},
    Key, Result, Storage, Tx,
};

mod rpki_objects;
mod rpki_repositories;
mod sequences;
mod trust_anchors;
mod validation_runs;

pub use rpki_objects::{RpkiObjects, BY_AKI_MFT, BY_LAST_MARKED, BY_TYPE, RPKI_OBJECTS};
pub use rpki_repositories::{RemovedListener, RpkiRepositories, BY_URI, RPKI_REPOSITORIES};
pub use sequences::{Sequences, SEQUENCES};
pub use trust_anchors::{TrustAnchors, TRUST_ANCHORS};
pub use validation_runs::{ValidationRuns, BY_COMPLETED_AT, BY_TA};
pub use validation_runs::{VALIDATION_RUNS_TO_REPOSITORIES, VALIDATION_RUNS_TO_RPKI_OBJECTS};

/// Validation state of a trust anchor, as derived from its latest runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrustAnchorStatus {
    pub trust_anchor: TrustAnchor,
    /// Latest completed trust anchor run succeeded.
    pub ta_succeeded: Option<bool>,
    /// Latest certificate tree run succeeded.
    pub tree_succeeded: Option<bool>,
    /// Objects validated by the latest certificate tree run.
    pub object_count: usize,
    pub warnings: usize,
    pub errors: usize,
}

/// All domain stores, opened over the same storage.
pub struct Stores {
    pub sequences: Arc<Sequences>,
    pub trust_anchors: Arc<TrustAnchors>,
    pub rpki_objects: Arc<RpkiObjects>,
    pub rpki_repositories: Arc<RpkiRepositories>,
    pub validation_runs: Arc<ValidationRuns>,
}

impl Stores {
    pub fn new(storage: &Storage) -> Result<Stores> {
        let sequences = Arc::new(Sequences::new(storage)?);
        let trust_anchors = Arc::new(TrustAnchors::new(storage, Arc::clone(&sequences))?);
        let rpki_objects = Arc::new(RpkiObjects::new(storage)?);
        let rpki_repositories = Arc::new(RpkiRepositories::new(storage, Arc::clone(&sequences))?);
        let validation_runs = Arc::new(ValidationRuns::new(
            storage,
            Arc::clone(&sequences),
            &trust_anchors,
            Arc::clone(&rpki_objects),
            Arc::clone(&rpki_repositories),
        )?);

        Ok(Stores {
            sequences,
            trust_anchors,
            rpki_objects,
            rpki_repositories,
            validation_runs,
        })
    }

    /// Validation status for trust anchor `key`, None if there is no
    /// such trust anchor.
    pub fn trust_anchor_status(&self, tx: &dyn Tx, key: &Key) -> Result<Option<TrustAnchorStatus>> {
        let trust_anchor = match self.trust_anchors.get(tx, key)? {
            Some(ta) => ta,
            None => return Ok(None),
        };

        let ta_run = self.validation_runs.find_latest_completed_for_trust_anchor(tx, key)?;
        let tree_run = self.validation_runs.find_latest_ca_tree_run(tx, key)?;

        let mut status = TrustAnchorStatus {
            trust_anchor,
            ta_succeeded: ta_run.as_ref().map(|run| run.is_succeeded()),
            tree_succeeded: tree_run.as_ref().map(|run| run.is_succeeded()),
            object_count: 0,
            warnings: 0,
            errors: 0,
        };
        for run in ta_run.iter().chain(tree_run.iter()) {
            for check in run.checks.iter() {
                match check.status {
                    CheckStatus::Warning => status.warnings += 1,
                    CheckStatus::Error => status.errors += 1,
                }
            }
        }
        if let Some(run_key) = tree_run.as_ref().and_then(|run| run.key()) {
            status.object_count = self.validation_runs.object_count(tx, run_key)?;
        }

        Ok(Some(status))
    }
}
