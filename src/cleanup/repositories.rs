use chrono::{DateTime, Duration, Utc};
use log::info;

use std::{sync::Arc, time};

use crate::{
    cleanup::CleanupStats,
    stores::{RpkiRepositories, Stores},
    util, Config, Result, Storage,
};

/// Delete repositories that no trust anchor referenced within the grace
/// duration.
pub struct RpkiRepositoryCleanup {
    storage: Arc<Storage>,
    rpki_repositories: Arc<RpkiRepositories>,
    grace: Duration,
}

impl RpkiRepositoryCleanup {
    pub fn new(storage: Arc<Storage>, stores: &Stores, config: &Config) -> RpkiRepositoryCleanup {
        RpkiRepositoryCleanup {
            storage,
            rpki_repositories: Arc::clone(&stores.rpki_repositories),
            grace: config.rpki_repository_grace,
        }
    }

    pub fn set_grace(&mut self, grace: Duration) -> &mut Self {
        self.grace = grace;
        self
    }

    /// Return the number of deleted repositories.
    pub fn cleanup_rpki_repositories(&self) -> Result<usize> {
        Ok(self.cleanup_at(util::now())?.deleted)
    }

    pub fn cleanup_at(&self, now: DateTime<Utc>) -> Result<CleanupStats> {
        let start = time::Instant::now();
        let since = now - self.grace;
        let deleted = self
            .storage
            .write_tx(|tx| self.rpki_repositories.delete_unreferenced(tx, &since))?;

        let stats = CleanupStats {
            deleted,
            elapsed: start.elapsed(),
            ..CleanupStats::default()
        };
        info!(
            target: "rpkidb",
            "rpki repositories cleanup, deleted {} in {:?}", stats.deleted, stats.elapsed
        );
        Ok(stats)
    }
}
