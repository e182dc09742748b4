use chrono::{DateTime, Duration, Utc};
use dashmap::{mapref::entry::Entry, DashMap, DashSet};
use log::{debug, info, warn};
use rayon::prelude::*;

use std::{sync::Arc, time};

use crate::{
    cleanup::{CleanupStats, ObjectGraph},
    data::{ObjectType, RpkiObject, TrustAnchor},
    stores::{RpkiObjects, Stores, TrustAnchors},
    util, Config, Key, Result, Storage, Tx,
};

/// Unreachable objects are deleted in chunks, each chunk in its own
/// write transaction.
pub const SWEEP_CHUNK: usize = 1000;

/// Mark-and-sweep collector for rpki objects.
///
/// Mark, every trust anchor with a certificate is traced on the rayon
/// pool, each walk reading from its own snapshot. Walks start from the
/// latest manifest issued by the trust anchor, follow manifest entries,
/// and descend into CA certificates through their latest manifest.
///
/// Commit, every reachable object is stamped with the current time in a
/// single write transaction.
///
/// Sweep, objects last stamped, or created if never stamped, before
/// `now - grace` are deleted.
pub struct RpkiObjectCleanup {
    storage: Arc<Storage>,
    trust_anchors: Arc<TrustAnchors>,
    rpki_objects: Arc<RpkiObjects>,
    graph: Arc<dyn ObjectGraph>,
    grace: Duration,
    max_depth: usize,
}

impl RpkiObjectCleanup {
    pub fn new(
        storage: Arc<Storage>,
        stores: &Stores,
        graph: Arc<dyn ObjectGraph>,
        config: &Config,
    ) -> RpkiObjectCleanup {
        RpkiObjectCleanup {
            storage,
            trust_anchors: Arc::clone(&stores.trust_anchors),
            rpki_objects: Arc::clone(&stores.rpki_objects),
            graph,
            grace: config.rpki_object_grace,
            max_depth: config.mark_max_depth,
        }
    }

    pub fn set_grace(&mut self, grace: Duration) -> &mut Self {
        self.grace = grace;
        self
    }

    pub fn set_max_depth(&mut self, max_depth: usize) -> &mut Self {
        self.max_depth = max_depth;
        self
    }

    /// Run mark, commit and sweep, return the number of deleted objects.
    pub fn cleanup_rpki_objects(&self) -> Result<usize> {
        Ok(self.cleanup_at(util::now())?.deleted)
    }

    /// Same as [cleanup_rpki_objects][Self::cleanup_rpki_objects], with
    /// `now` as the current time.
    pub fn cleanup_at(&self, now: DateTime<Utc>) -> Result<CleanupStats> {
        let start = time::Instant::now();

        let reachable = self.mark()?;
        let marked = self.commit(&reachable, now)?;
        let deleted = self.sweep(&(now - self.grace))?;

        let stats = CleanupStats {
            marked,
            deleted,
            orphans: 0,
            elapsed: start.elapsed(),
        };
        info!(
            target: "rpkidb",
            "rpki objects cleanup, marked {} deleted {} in {:?}",
            stats.marked, stats.deleted, stats.elapsed
        );
        Ok(stats)
    }

    /// Trace all trust anchors and return the set of reachable objects.
    pub fn mark(&self) -> Result<DashSet<Key>> {
        let tas = self.storage.read_tx(|tx| self.trust_anchors.find_all(tx))?;

        let depths = DashMap::new();
        tas.par_iter()
            .try_for_each(|ta| self.mark_trust_anchor(ta, &depths))?;
        Ok(depths.into_iter().map(|(key, _)| key).collect())
    }

    /// Stamp `reachable` objects with `now`, return the number of objects
    /// stamped.
    pub fn commit(&self, reachable: &DashSet<Key>, now: DateTime<Utc>) -> Result<usize> {
        let keys: Vec<Key> = reachable.iter().map(|k| k.key().clone()).collect();
        self.storage
            .write_tx(|tx| self.rpki_objects.mark_reachable(tx, keys.iter(), now))
    }

    /// Delete objects not stamped since `since`, return the number of
    /// deleted objects.
    pub fn sweep(&self, since: &DateTime<Utc>) -> Result<usize> {
        let keys: Vec<Key> = self
            .storage
            .read_tx(|tx| self.rpki_objects.find_unreachable(tx, since))?
            .into_iter()
            .collect();

        let mut n = 0;
        for chunk in keys.chunks(SWEEP_CHUNK) {
            n += self.storage.write_tx(|tx| {
                let mut n = 0;
                for key in chunk.iter() {
                    // objects stamped after the scan are left alone.
                    let unreachable = match self.rpki_objects.get(tx, key)? {
                        Some(obj) => obj.reachability_time() < *since,
                        None => false,
                    };
                    if unreachable && self.rpki_objects.delete(tx, key)?.is_some() {
                        n += 1;
                    }
                }
                Ok(n)
            })?;
        }
        Ok(n)
    }

    fn mark_trust_anchor(&self, ta: &TrustAnchor, depths: &DashMap<Key, usize>) -> Result<()> {
        let cert = match ta.encoded_certificate.as_ref() {
            Some(encoded) => match self.graph.certificate(encoded) {
                Some(cert) => cert,
                None => {
                    warn!(target: "rpkidb", "trust anchor {:?} bad certificate", ta.name);
                    return Ok(());
                }
            },
            None => return Ok(()),
        };
        if cert.manifest_uri.is_none() {
            debug!(target: "rpkidb", "trust anchor {:?} has no manifest uri", ta.name);
            return Ok(());
        }

        self.storage.read_tx(|tx| {
            let ski = &cert.subject_key_identifier;
            match self.rpki_objects.find_latest_mft_by_aki(tx, ski)? {
                Some(mft) => self.mark_and_trace(tx, mft, depths, 0),
                None => {
                    debug!(target: "rpkidb", "trust anchor {:?} has no manifest", ta.name);
                    Ok(())
                }
            }
        })
    }

    fn mark_and_trace(
        &self,
        tx: &dyn Tx,
        obj: RpkiObject,
        depths: &DashMap<Key, usize>,
        depth: usize,
    ) -> Result<()> {
        if !Self::visit(depths, obj.key(), depth) {
            return Ok(());
        }
        if depth >= self.max_depth {
            warn!(target: "rpkidb", "object {} beyond mark depth {}", obj.key(), self.max_depth);
            return Ok(());
        }

        match obj.object_type {
            ObjectType::Mft => {
                let entries = match self.graph.manifest_entries(&obj) {
                    Some(entries) => entries,
                    None => return Ok(()),
                };
                let children = self.rpki_objects.find_objects_in_manifest(tx, &entries)?;
                for child in children.into_values() {
                    self.mark_and_trace(tx, child, depths, depth + 1)?;
                }
            }
            ObjectType::Cer => match self.graph.certificate(&obj.encoded) {
                Some(cert) if cert.is_ca && cert.manifest_uri.is_some() => {
                    let ski = &cert.subject_key_identifier;
                    if let Some(mft) = self.rpki_objects.find_latest_mft_by_aki(tx, ski)? {
                        self.mark_and_trace(tx, mft, depths, depth + 1)?;
                    }
                }
                _ => (),
            },
            ObjectType::Crl | ObjectType::Roa | ObjectType::Gbr | ObjectType::Other => (),
        }
        Ok(())
    }

    // record the shallowest depth an object is reached at, return whether
    // it has to be expanded from `depth`.
    fn visit(depths: &DashMap<Key, usize>, key: Key, depth: usize) -> bool {
        match depths.entry(key) {
            Entry::Occupied(mut e) if *e.get() > depth => {
                e.insert(depth);
                true
            }
            Entry::Occupied(_) => false,
            Entry::Vacant(e) => {
                e.insert(depth);
                true
            }
        }
    }
}
