use chrono::{DateTime, Duration, Utc};
use log::info;

use std::{sync::Arc, time};

use crate::{
    cleanup::CleanupStats,
    stores::{Stores, ValidationRuns},
    util, Config, Result, Storage,
};

/// Delete validation runs completed before the grace duration, keeping
/// the latest successful run, and associations left dangling by deleted
/// objects and repositories.
pub struct ValidationRunCleanup {
    storage: Arc<Storage>,
    validation_runs: Arc<ValidationRuns>,
    grace: Duration,
}

impl ValidationRunCleanup {
    pub fn new(storage: Arc<Storage>, stores: &Stores, config: &Config) -> ValidationRunCleanup {
        ValidationRunCleanup {
            storage,
            validation_runs: Arc::clone(&stores.validation_runs),
            grace: config.validation_run_grace,
        }
    }

    pub fn set_grace(&mut self, grace: Duration) -> &mut Self {
        self.grace = grace;
        self
    }

    /// Return the number of deleted runs and the number of deleted
    /// orphan associations.
    pub fn cleanup_validation_runs(&self) -> Result<(usize, usize)> {
        let stats = self.cleanup_at(util::now())?;
        Ok((stats.deleted, stats.orphans))
    }

    pub fn cleanup_at(&self, now: DateTime<Utc>) -> Result<CleanupStats> {
        let start = time::Instant::now();

        let before = now - self.grace;
        let deleted = self
            .storage
            .write_tx(|tx| self.validation_runs.remove_old(tx, &before))?;
        let orphans = self
            .storage
            .write_tx(|tx| self.validation_runs.remove_orphans(tx))?;

        let stats = CleanupStats {
            deleted,
            orphans,
            elapsed: start.elapsed(),
            ..CleanupStats::default()
        };
        info!(
            target: "rpkidb",
            "validation runs cleanup, deleted {} runs and {} orphans in {:?}",
            stats.deleted, stats.orphans, stats.elapsed
        );
        Ok(stats)
    }
}
