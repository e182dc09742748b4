use log::debug;

use std::{collections::BTreeSet, sync::Arc};

use crate::{
    codec::TrustAnchorCoder,
    data::{Ref, TrustAnchor},
    store::Indexes,
    stores::Sequences,
    IxBase, IxMap, Key, Result, Storage, Tx, WriteTx,
};

pub const TRUST_ANCHORS: &str = "trust-anchors";

const SEQ_PK: &str = "trust-anchors:pk";

/// Store for configured trust anchors.
pub struct TrustAnchors {
    map: Arc<IxMap<TrustAnchor>>,
    sequences: Arc<Sequences>,
}

impl TrustAnchors {
    pub fn new(storage: &Storage, sequences: Arc<Sequences>) -> Result<TrustAnchors> {
        let coder = Arc::new(TrustAnchorCoder::new()?);
        let map = storage.create_ix_map(TRUST_ANCHORS, Indexes::new(), coder)?;
        Ok(TrustAnchors { map, sequences })
    }

    /// Add `ta` under a freshly allocated key, `ta.base.key` is updated.
    pub fn add(&self, tx: &mut WriteTx, ta: &mut TrustAnchor) -> Result<Key> {
        let key = Key::from_u64(self.sequences.next(tx, SEQ_PK)?);
        ta.base.key = Some(key.clone());
        self.map.put(tx, &key, ta)?;
        debug!(target: "rpkidb", "added trust anchor {:?} as {}", ta.name, key);
        Ok(key)
    }

    /// Save changes to an existing trust anchor.
    pub fn update(&self, tx: &mut WriteTx, ta: &mut TrustAnchor) -> Result<()> {
        let key = match ta.key() {
            Some(key) if self.map.exists(tx, key)? => key.clone(),
            Some(key) => return err_at!(InvalidInput, msg: "no trust anchor {}", key),
            None => return err_at!(InvalidInput, msg: "trust anchor {:?} has no key", ta.name),
        };
        ta.base.touch();
        self.map.put(tx, &key, ta)?;
        Ok(())
    }

    /// Remove trust anchor, running the registered delete triggers.
    pub fn remove(&self, tx: &mut WriteTx, key: &Key) -> Result<Option<TrustAnchor>> {
        self.map.delete(tx, key)
    }

    pub fn get(&self, tx: &dyn Tx, key: &Key) -> Result<Option<TrustAnchor>> {
        self.map.get(tx, key)
    }

    pub fn find_all(&self, tx: &dyn Tx) -> Result<Vec<TrustAnchor>> {
        self.map.values(tx)
    }

    pub fn find_by_name(&self, tx: &dyn Tx, name: &str) -> Result<Vec<TrustAnchor>> {
        let tas = self.map.values(tx)?;
        Ok(tas.into_iter().filter(|ta| ta.name == name).collect())
    }

    pub fn find_by_subject_public_key_info(
        &self,
        tx: &dyn Tx,
        spki: &str,
    ) -> Result<Vec<TrustAnchor>> {
        let tas = self.map.values(tx)?;
        Ok(tas
            .into_iter()
            .filter(|ta| ta.subject_public_key_info.as_deref() == Some(spki))
            .collect())
    }

    /// True once every trust anchor has completed its first certificate
    /// tree validation.
    pub fn all_initial_validation_done(&self, tx: &dyn Tx) -> Result<bool> {
        let tas = self.map.values(tx)?;
        Ok(tas.iter().all(|ta| ta.initial_certificate_tree_validation_done))
    }

    pub fn keys(&self, tx: &dyn Tx) -> Result<BTreeSet<Key>> {
        self.map.keys(tx)
    }

    /// Register a trigger to run when a trust anchor is removed.
    pub fn on_delete<F>(&self, trigger: F) -> Result<()>
    where
        F: Fn(&mut WriteTx<'_>, &Key) -> Result<()> + Send + Sync + 'static,
    {
        self.map.on_delete(trigger)
    }

    /// Reference to an existing trust anchor.
    pub fn to_ref(&self, tx: &dyn Tx, key: &Key) -> Result<Ref<TrustAnchor>> {
        Ref::of(tx, &self.map, key.clone())
    }

    pub fn as_map(&self) -> &Arc<IxMap<TrustAnchor>> {
        &self.map
    }
}
