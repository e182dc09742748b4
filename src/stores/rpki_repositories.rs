use chrono::{DateTime, Utc};
use log::debug;

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, RwLock},
};

use crate::{
    codec::RpkiRepositoryCoder,
    data::{Ref, RepositoryStatus, RepositoryType, RpkiRepository, TrustAnchor},
    keys,
    store::{IndexFn, Indexes},
    stores::Sequences,
    util, IxBase, IxMap, Key, Result, Storage, Tx, WriteTx,
};

pub const RPKI_REPOSITORIES: &str = "rpki-repositories";

pub const BY_URI: &str = "by-uri";
pub const BY_TA: &str = "by-ta";

const SEQ_PK: &str = "rpki-repositories:pk";

/// Uris are indexed by their leading bytes, lookups then filter for an
/// exact match.
const URI_KEY_SIZE: usize = 100;

/// Listener called after a transaction that removed a repository has
/// committed.
pub type RemovedListener = dyn Fn(&RpkiRepository) + Send + Sync;

fn uri_key(uri: &str) -> Key {
    Key::from(uri).truncate(URI_KEY_SIZE)
}

fn by_uri() -> IndexFn<RpkiRepository> {
    Box::new(|repo: &RpkiRepository| {
        let uris = repo.rrdp_notify_uri.iter().chain(repo.rsync_repository_uri.iter());
        keys(uris.map(|uri| uri_key(uri)))
    })
}

fn by_ta() -> IndexFn<RpkiRepository> {
    Box::new(|repo: &RpkiRepository| keys(repo.trust_anchors.keys().map(|ta| ta.key().clone())))
}

// candidate parents for an rsync uri, nearest first. For
// rsync://host/a/b/c that is rsync://host/a/b/, rsync://host/a/ and
// rsync://host/.
fn parent_uris(uri: &str) -> Vec<String> {
    let n = match uri.find("://") {
        Some(n) => n + 3,
        None => return vec![],
    };
    let (scheme, path) = uri.split_at(n);
    let segments: Vec<&str> = path.trim_end_matches('/').split('/').collect();
    (1..segments.len())
        .rev()
        .map(|n| format!("{}{}/", scheme, segments[..n].join("/")))
        .collect()
}

/// Store for publication points, along with the trust anchors that
/// reference them.
pub struct RpkiRepositories {
    map: Arc<IxMap<RpkiRepository>>,
    sequences: Arc<Sequences>,
    listener: RwLock<Option<Arc<RemovedListener>>>,
}

impl RpkiRepositories {
    pub fn new(storage: &Storage, sequences: Arc<Sequences>) -> Result<RpkiRepositories> {
        let mut indexes: Indexes<RpkiRepository> = Indexes::new();
        indexes.insert(BY_URI.to_string(), by_uri());
        indexes.insert(BY_TA.to_string(), by_ta());

        let coder = Arc::new(RpkiRepositoryCoder::new()?);
        let map = storage.create_ix_map(RPKI_REPOSITORIES, indexes, coder)?;
        Ok(RpkiRepositories {
            map,
            sequences,
            listener: RwLock::new(None),
        })
    }

    /// Set the listener for removed RRDP repositories.
    pub fn set_removed_listener<F>(&self, listener: F) -> Result<()>
    where
        F: Fn(&RpkiRepository) + Send + Sync + 'static,
    {
        match self.listener.write() {
            Ok(mut l) => {
                *l = Some(Arc::new(listener));
                Ok(())
            }
            Err(err) => err_at!(IPCFail, msg: "removed listener: {}", err),
        }
    }

    /// Register repository `uri` for trust anchor `ta`. An existing
    /// repository for the same uri is shared, a new one is created
    /// otherwise. Registering as RSYNC upgrades an RSYNC_PREFETCH
    /// repository. Rsync repositories are linked to the nearest enclosing
    /// repository, if one is registered.
    pub fn register(
        &self,
        tx: &mut WriteTx,
        ta: &Ref<TrustAnchor>,
        uri: &str,
        repository_type: RepositoryType,
    ) -> Result<RpkiRepository> {
        let now = util::now();
        let mut repo = match self.find_by_uri(tx, uri)? {
            Some(mut repo) => {
                repo.add_trust_anchor(ta.clone(), now);
                if repository_type == RepositoryType::Rsync
                    && repo.repository_type == RepositoryType::RsyncPrefetch
                {
                    repo.repository_type = RepositoryType::Rsync;
                }
                repo.base.touch();
                repo
            }
            None => {
                let mut repo = RpkiRepository::new(repository_type, uri);
                let key = Key::from_u64(self.sequences.next(tx, SEQ_PK)?);
                repo.base.key = Some(key);
                repo.add_trust_anchor(ta.clone(), now);
                repo
            }
        };

        if repository_type == RepositoryType::Rsync {
            for parent_uri in parent_uris(uri).iter() {
                let parent = match self.find_by_uri(tx, parent_uri)? {
                    Some(parent) => parent,
                    None => continue,
                };
                if let Some(pk) = parent.key() {
                    repo.parent_repository = Some(Ref::of(tx, &self.map, pk.clone())?);
                    match parent.last_downloaded_at {
                        Some(t) if parent.is_downloaded() => repo.set_downloaded(t),
                        _ => (),
                    }
                    break;
                }
            }
        }

        let key = self.key_of(&repo)?;
        self.map.put(tx, &key, &repo)?;
        debug!(target: "rpkidb", "registered repository {} as {}", uri, key);
        Ok(repo)
    }

    /// Save changes to an existing repository.
    pub fn update(&self, tx: &mut WriteTx, repo: &mut RpkiRepository) -> Result<()> {
        let key = self.key_of(repo)?;
        if !self.map.exists(tx, &key)? {
            return err_at!(InvalidInput, msg: "no repository {}", key);
        }
        repo.base.touch();
        self.map.put(tx, &key, repo)?;
        Ok(())
    }

    pub fn get(&self, tx: &dyn Tx, key: &Key) -> Result<Option<RpkiRepository>> {
        self.map.get(tx, key)
    }

    /// Repository whose RRDP notify uri or rsync uri is `uri`.
    pub fn find_by_uri(&self, tx: &dyn Tx, uri: &str) -> Result<Option<RpkiRepository>> {
        let repos = self.map.get_by_index(tx, BY_URI, &uri_key(uri))?;
        Ok(repos.into_values().find(|repo| {
            repo.rrdp_notify_uri.as_deref() == Some(uri)
                || repo.rsync_repository_uri.as_deref() == Some(uri)
        }))
    }

    pub fn find_by_trust_anchor(&self, tx: &dyn Tx, ta: &Key) -> Result<Vec<RpkiRepository>> {
        Ok(self.map.get_by_index(tx, BY_TA, ta)?.into_values().collect())
    }

    pub fn find_all(&self, tx: &dyn Tx) -> Result<Vec<RpkiRepository>> {
        self.map.values(tx)
    }

    pub fn find_rrdp_repositories(&self, tx: &dyn Tx) -> Result<Vec<RpkiRepository>> {
        self.find_by_type(tx, RepositoryType::Rrdp)
    }

    pub fn find_rsync_repositories(&self, tx: &dyn Tx) -> Result<Vec<RpkiRepository>> {
        self.find_by_type(tx, RepositoryType::Rsync)
    }

    fn find_by_type(&self, tx: &dyn Tx, typ: RepositoryType) -> Result<Vec<RpkiRepository>> {
        let repos = self.map.values(tx)?;
        Ok(repos.into_iter().filter(|r| r.repository_type == typ).collect())
    }

    /// Number of repositories by download status.
    pub fn count_by_status(&self, tx: &dyn Tx) -> Result<BTreeMap<RepositoryStatus, usize>> {
        let mut counts = BTreeMap::new();
        self.map.for_each(tx, |_, repo| {
            *counts.entry(repo.status).or_insert(0) += 1;
            Ok(())
        })?;
        Ok(counts)
    }

    /// Drop trust anchor `ta` from every repository it references.
    /// Repositories left without any trust anchor are removed. Return the
    /// number of removed repositories.
    pub fn remove_all_for_trust_anchor(&self, tx: &mut WriteTx, ta: &Ref<TrustAnchor>) -> Result<usize> {
        let mut n = 0;
        for mut repo in self.find_by_trust_anchor(tx, ta.key())?.into_iter() {
            repo.remove_trust_anchor(ta);
            if repo.trust_anchors.is_empty() {
                self.remove(tx, repo)?;
                n += 1;
            } else {
                let key = self.key_of(&repo)?;
                self.map.put(tx, &key, &repo)?;
            }
        }
        Ok(n)
    }

    /// Drop trust anchor references last refreshed before `since`, and
    /// remove repositories left without any reference. Return the number
    /// of removed repositories.
    pub fn delete_unreferenced(&self, tx: &mut WriteTx, since: &DateTime<Utc>) -> Result<usize> {
        let mut n = 0;
        for (key, mut repo) in self.map.all(tx)?.into_iter() {
            let before = repo.trust_anchors.len();
            repo.trust_anchors.retain(|_, t| *t >= *since);
            if repo.trust_anchors.is_empty() {
                self.remove(tx, repo)?;
                n += 1;
            } else if repo.trust_anchors.len() != before {
                self.map.put(tx, &key, &repo)?;
            }
        }
        Ok(n)
    }

    pub fn keys(&self, tx: &dyn Tx) -> Result<BTreeSet<Key>> {
        self.map.keys(tx)
    }

    pub fn to_ref(&self, tx: &dyn Tx, key: &Key) -> Result<Ref<RpkiRepository>> {
        Ref::of(tx, &self.map, key.clone())
    }

    pub fn as_map(&self) -> &Arc<IxMap<RpkiRepository>> {
        &self.map
    }

    fn key_of(&self, repo: &RpkiRepository) -> Result<Key> {
        match repo.key() {
            Some(key) => Ok(key.clone()),
            None => err_at!(InvalidInput, msg: "repository {:?} has no key", repo.location_uri()),
        }
    }

    fn remove(&self, tx: &mut WriteTx, repo: RpkiRepository) -> Result<()> {
        let key = self.key_of(&repo)?;
        self.map.delete(tx, &key)?;

        if repo.repository_type == RepositoryType::Rrdp {
            let listener = match self.listener.read() {
                Ok(listener) => listener.clone(),
                Err(err) => return err_at!(IPCFail, msg: "removed listener: {}", err),
            };
            if let Some(listener) = listener {
                tx.after_commit(move || {
                    listener(&repo);
                    Ok(())
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "rpki_repositories_test.rs"]
mod rpki_repositories_test;
