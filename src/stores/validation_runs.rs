use chrono::{DateTime, Utc};
use log::debug;

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use crate::{
    codec::{KeyCoder, ValidationRunCoder},
    data::{ObjectType, RpkiObject, RunType, ValidationRun},
    keys,
    store::{IndexFn, Indexes},
    stores::{rpki_objects::millis_key, RpkiObjects, RpkiRepositories, Sequences, TrustAnchors},
    IxBase, IxMap, Key, MultiIxMap, Result, Storage, Tx, WriteTx,
};

pub const VALIDATION_RUNS_TO_RPKI_OBJECTS: &str = "validation-runs-to-rpki-objects";
pub const VALIDATION_RUNS_TO_REPOSITORIES: &str = "validation-runs-to-repositories";

pub const BY_TA: &str = "by-ta";
pub const BY_COMPLETED_AT: &str = "by-completed-at";

const SEQ_PK: &str = "validation-runs:pk";

fn by_ta() -> IndexFn<ValidationRun> {
    Box::new(|run: &ValidationRun| keys(run.kind.trust_anchor().map(|ta| ta.key().clone())))
}

fn by_completed_at() -> IndexFn<ValidationRun> {
    Box::new(|run: &ValidationRun| keys(run.completed_at.iter().map(millis_key)))
}

/// Store for validation runs. Each run type lives in its own map. Runs
/// are associated with the objects and the repository they touched,
/// associations go along with the run when it is deleted.
pub struct ValidationRuns {
    maps: BTreeMap<RunType, Arc<IxMap<ValidationRun>>>,
    vr2ro: Arc<MultiIxMap<Key>>,
    vr2repo: Arc<IxMap<Key>>,
    sequences: Arc<Sequences>,
    rpki_objects: Arc<RpkiObjects>,
    rpki_repositories: Arc<RpkiRepositories>,
}

impl ValidationRuns {
    pub fn new(
        storage: &Storage,
        sequences: Arc<Sequences>,
        trust_anchors: &TrustAnchors,
        rpki_objects: Arc<RpkiObjects>,
        rpki_repositories: Arc<RpkiRepositories>,
    ) -> Result<ValidationRuns> {
        let coder = Arc::new(ValidationRunCoder::new()?);

        let mut maps = BTreeMap::new();
        for run_type in RunType::ALL.iter() {
            let mut indexes: Indexes<ValidationRun> = Indexes::new();
            indexes.insert(BY_COMPLETED_AT.to_string(), by_completed_at());
            match run_type {
                RunType::CertificateTree | RunType::TrustAnchor => {
                    indexes.insert(BY_TA.to_string(), by_ta());
                }
                RunType::RrdpRepository | RunType::RsyncRepository => (),
            }
            let map = storage.create_ix_map(&run_type.to_map_name(), indexes, coder.clone())?;
            maps.insert(*run_type, map);
        }

        let vr2ro = storage.create_multi_ix_map::<Key>(VALIDATION_RUNS_TO_RPKI_OBJECTS, Arc::new(KeyCoder))?;
        let vr2repo = storage.create_ix_map::<Key>(
            VALIDATION_RUNS_TO_REPOSITORIES,
            Indexes::new(),
            Arc::new(KeyCoder),
        )?;

        for map in maps.values() {
            let (vr2ro, vr2repo) = (Arc::clone(&vr2ro), Arc::clone(&vr2repo));
            map.on_delete(move |tx, key| {
                vr2ro.delete(tx, key)?;
                vr2repo.delete(tx, key)?;
                Ok(())
            })?;
        }

        // runs of a trust anchor go along with it.
        let ta_maps: Vec<Arc<IxMap<ValidationRun>>> = [RunType::TrustAnchor, RunType::CertificateTree]
            .iter()
            .filter_map(|t| maps.get(t).cloned())
            .collect();
        trust_anchors.on_delete(move |tx, ta_key| {
            for map in ta_maps.iter() {
                for pk in map.get_pk_by_index(tx, BY_TA, ta_key)?.iter() {
                    map.delete(tx, pk)?;
                }
            }
            Ok(())
        })?;

        Ok(ValidationRuns {
            maps,
            vr2ro,
            vr2repo,
            sequences,
            rpki_objects,
            rpki_repositories,
        })
    }

    fn to_map(&self, run_type: RunType) -> Result<&Arc<IxMap<ValidationRun>>> {
        match self.maps.get(&run_type) {
            Some(map) => Ok(map),
            None => err_at!(Fatal, msg: "no map for {} runs", run_type),
        }
    }

    fn key_of(run: &ValidationRun) -> Result<Key> {
        match run.key() {
            Some(key) => Ok(key.clone()),
            None => err_at!(InvalidInput, msg: "{} run has no key", run.to_run_type()),
        }
    }

    /// Add `run` under a freshly allocated key, `run.base.key` is updated.
    pub fn add(&self, tx: &mut WriteTx, run: &mut ValidationRun) -> Result<Key> {
        let key = Key::from_u64(self.sequences.next(tx, SEQ_PK)?);
        run.base.key = Some(key.clone());
        self.to_map(run.to_run_type())?.put(tx, &key, run)?;
        Ok(key)
    }

    pub fn update(&self, tx: &mut WriteTx, run: &mut ValidationRun) -> Result<()> {
        let key = Self::key_of(run)?;
        run.base.touch();
        self.to_map(run.to_run_type())?.put(tx, &key, run)?;
        Ok(())
    }

    pub fn get(&self, tx: &dyn Tx, run_type: RunType, key: &Key) -> Result<Option<ValidationRun>> {
        self.to_map(run_type)?.get(tx, key)
    }

    /// Delete `run`, along with its associations.
    pub fn delete(&self, tx: &mut WriteTx, run: &ValidationRun) -> Result<bool> {
        let key = Self::key_of(run)?;
        Ok(self.to_map(run.to_run_type())?.delete(tx, &key)?.is_some())
    }

    pub fn find_all(&self, tx: &dyn Tx, run_type: RunType) -> Result<Vec<ValidationRun>> {
        self.to_map(run_type)?.values(tx)
    }

    /// Latest successful runs of `run_type`, more than one if they
    /// completed in the same milli-second.
    pub fn find_latest_successful(&self, tx: &dyn Tx, run_type: RunType) -> Result<Vec<ValidationRun>> {
        let map = self.to_map(run_type)?;
        let runs = map.get_by_index_max(tx, BY_COMPLETED_AT, |run| run.is_succeeded())?;
        Ok(runs.into_values().collect())
    }

    pub fn find_latest_ca_tree_run(&self, tx: &dyn Tx, ta: &Key) -> Result<Option<ValidationRun>> {
        self.find_latest(tx, RunType::CertificateTree, ta, false)
    }

    pub fn find_latest_successful_ca_tree_run(
        &self,
        tx: &dyn Tx,
        ta: &Key,
    ) -> Result<Option<ValidationRun>> {
        self.find_latest(tx, RunType::CertificateTree, ta, true)
    }

    pub fn find_latest_completed_for_trust_anchor(
        &self,
        tx: &dyn Tx,
        ta: &Key,
    ) -> Result<Option<ValidationRun>> {
        self.find_latest(tx, RunType::TrustAnchor, ta, false)
    }

    fn find_latest(
        &self,
        tx: &dyn Tx,
        run_type: RunType,
        ta: &Key,
        succeeded: bool,
    ) -> Result<Option<ValidationRun>> {
        let map = self.to_map(run_type)?;
        let runs = map.get_by_index_max(tx, BY_COMPLETED_AT, |run| {
            let is_ta = run.kind.trust_anchor().map(|r| r.key() == ta).unwrap_or(false);
            is_ta && (!succeeded || run.is_succeeded())
        })?;
        Ok(runs.into_values().next())
    }

    /// Record that run `key` validated object `object`.
    pub fn associate_object(&self, tx: &mut WriteTx, key: &Key, object: &Key) -> Result<()> {
        self.vr2ro.put(tx, key, object)
    }

    /// Record that run `key` fetched repository `repository`.
    pub fn associate_repository(&self, tx: &mut WriteTx, key: &Key, repository: &Key) -> Result<()> {
        self.vr2repo.put(tx, key, repository)?;
        Ok(())
    }

    /// Objects associated with run `key`.
    pub fn find_associated_pks(&self, tx: &dyn Tx, key: &Key) -> Result<BTreeSet<Key>> {
        Ok(self.vr2ro.get(tx, key)?.into_iter().collect())
    }

    pub fn find_associated_repository(&self, tx: &dyn Tx, key: &Key) -> Result<Option<Key>> {
        self.vr2repo.get(tx, key)
    }

    pub fn object_count(&self, tx: &dyn Tx, key: &Key) -> Result<usize> {
        self.vr2ro.count(tx, key)
    }

    /// Objects of `object_type` validated by the latest successful
    /// certificate tree runs, paired with the run.
    pub fn find_currently_validated(
        &self,
        tx: &dyn Tx,
        object_type: ObjectType,
    ) -> Result<Vec<(ValidationRun, RpkiObject)>> {
        let by_type = self.rpki_objects.get_pk_by_type(tx, object_type)?;
        let mut items = vec![];
        for run in self.find_latest_successful(tx, RunType::CertificateTree)?.into_iter() {
            let key = Self::key_of(&run)?;
            for ro_key in self.vr2ro.get(tx, &key)?.iter() {
                if !by_type.contains(ro_key) {
                    continue;
                }
                if let Some(obj) = self.rpki_objects.get(tx, ro_key)? {
                    items.push((run.clone(), obj));
                }
            }
        }
        Ok(items)
    }

    /// Delete runs completed, or last touched if not completed, before
    /// `completed_before`. The latest successful run is kept, per trust
    /// anchor for runs that carry one. Return the number of deleted runs.
    pub fn remove_old(&self, tx: &mut WriteTx, completed_before: &DateTime<Utc>) -> Result<usize> {
        let mut n = 0;
        for (run_type, map) in self.maps.iter() {
            let mut latest: BTreeMap<Option<Key>, (DateTime<Utc>, Vec<Key>)> = BTreeMap::new();
            let mut old = vec![];
            for (key, run) in map.all(tx)?.into_iter() {
                match run.completed_at {
                    Some(completed_at) if run.is_succeeded() => {
                        let group = run.kind.trust_anchor().map(|ta| ta.key().clone());
                        // runs completed within the same millisecond are all kept.
                        match latest.get_mut(&group) {
                            Some((t, _)) if *t > completed_at => (),
                            Some((t, ks)) if *t == completed_at => ks.push(key.clone()),
                            _ => {
                                latest.insert(group, (completed_at, vec![key.clone()]));
                            }
                        }
                    }
                    _ => (),
                }
                if run.is_older_than(completed_before) {
                    old.push(key);
                }
            }

            let keep: BTreeSet<Key> = latest.into_values().flat_map(|(_, ks)| ks).collect();
            for key in old.into_iter().filter(|key| !keep.contains(key)) {
                if map.delete(tx, &key)?.is_some() {
                    n += 1;
                }
            }
            debug!(target: "rpkidb", "{} runs, kept {} latest successful", run_type, keep.len());
        }
        Ok(n)
    }

    /// Delete associations whose object or repository no longer exists.
    /// Return the number of deleted associations.
    pub fn remove_orphans(&self, tx: &mut WriteTx) -> Result<usize> {
        let ro_keys = self.rpki_objects.keys(tx)?;
        let repo_keys = self.rpki_repositories.keys(tx)?;

        let mut pairs = vec![];
        for (key, ro_keys_of) in self.vr2ro.all(tx)?.into_iter() {
            for ro_key in ro_keys_of.into_iter() {
                if !ro_keys.contains(&ro_key) {
                    pairs.push((key.clone(), ro_key))
                }
            }
        }
        let mut n = self.vr2ro.delete_batch(tx, &pairs)?;

        for (key, repo_key) in self.vr2repo.all(tx)?.into_iter() {
            if !repo_keys.contains(&repo_key) && self.vr2repo.delete(tx, &key)?.is_some() {
                n += 1;
            }
        }
        Ok(n)
    }

    /// Remove all runs and associations.
    pub fn clear(&self, tx: &mut WriteTx) -> Result<()> {
        self.vr2ro.clear(tx)?;
        self.vr2repo.clear(tx)?;
        for map in self.maps.values() {
            map.clear(tx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "validation_runs_test.rs"]
mod validation_runs_test;
