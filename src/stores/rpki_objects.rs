use chrono::{DateTime, Utc};

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use crate::{
    codec::RpkiObjectCoder,
    data::{ManifestEntry, ObjectType, RpkiObject},
    keys,
    store::{IndexFn, Indexes},
    IxBase, IxMap, Key, Result, Storage, Tx, WriteTx,
};

pub const RPKI_OBJECTS: &str = "rpki-objects";

pub const BY_AKI_MFT: &str = "by-aki-mft";
pub const BY_TYPE: &str = "by-type";
pub const BY_LAST_MARKED: &str = "by-last-marked";

/// Index key for a timestamp, epoch millis, clamped at the epoch.
pub(crate) fn millis_key(t: &DateTime<Utc>) -> Key {
    Key::from_u64(t.timestamp_millis().max(0) as u64)
}

fn by_aki_mft() -> IndexFn<RpkiObject> {
    Box::new(|obj: &RpkiObject| match (obj.object_type, &obj.authority_key_identifier) {
        (ObjectType::Mft, Some(aki)) => keys(vec![Key::from_bytes(aki)]),
        _ => BTreeSet::new(),
    })
}

fn by_type() -> IndexFn<RpkiObject> {
    Box::new(|obj: &RpkiObject| keys(vec![Key::from(obj.object_type.as_str())]))
}

fn by_last_marked() -> IndexFn<RpkiObject> {
    Box::new(|obj: &RpkiObject| keys(vec![millis_key(&obj.reachability_time())]))
}

/// Store for fetched RPKI objects, keyed by sha256.
pub struct RpkiObjects {
    map: Arc<IxMap<RpkiObject>>,
}

impl RpkiObjects {
    pub fn new(storage: &Storage) -> Result<RpkiObjects> {
        let mut indexes: Indexes<RpkiObject> = Indexes::new();
        indexes.insert(BY_AKI_MFT.to_string(), by_aki_mft());
        indexes.insert(BY_TYPE.to_string(), by_type());
        indexes.insert(BY_LAST_MARKED.to_string(), by_last_marked());

        let coder = Arc::new(RpkiObjectCoder::new()?);
        let map = storage.create_ix_map(RPKI_OBJECTS, indexes, coder)?;
        Ok(RpkiObjects { map })
    }

    /// Save `obj` under its sha256. A reachability mark already recorded
    /// for the object survives a put that carries none.
    pub fn put(&self, tx: &mut WriteTx, obj: &RpkiObject) -> Result<Option<RpkiObject>> {
        let key = obj.key();
        if key.is_empty() {
            return err_at!(InvalidInput, msg: "rpki object without sha256");
        }

        let mut obj = obj.clone();
        obj.base.key = Some(key.clone());
        if obj.last_marked_reachable_at.is_none() {
            if let Some(old) = self.map.get(tx, &key)? {
                obj.last_marked_reachable_at = old.last_marked_reachable_at;
            }
        }
        self.map.put(tx, &key, &obj)
    }

    pub fn get(&self, tx: &dyn Tx, key: &Key) -> Result<Option<RpkiObject>> {
        self.map.get(tx, key)
    }

    pub fn find_by_sha256(&self, tx: &dyn Tx, sha256: &[u8]) -> Result<Option<RpkiObject>> {
        self.map.get(tx, &Key::from_bytes(sha256))
    }

    /// Latest manifest issued by the authority `aki`, ordered by serial
    /// number and then by signing time.
    pub fn find_latest_mft_by_aki(&self, tx: &dyn Tx, aki: &[u8]) -> Result<Option<RpkiObject>> {
        let mfts = self.map.get_by_index(tx, BY_AKI_MFT, &Key::from_bytes(aki))?;
        Ok(mfts.into_values().max_by(|a, b| a.cmp_latest(b)))
    }

    /// Resolve manifest entries to stored objects, keyed by file name.
    /// Entries whose object is not stored are skipped.
    pub fn find_objects_in_manifest(
        &self,
        tx: &dyn Tx,
        entries: &[ManifestEntry],
    ) -> Result<BTreeMap<String, RpkiObject>> {
        let mut objs = BTreeMap::new();
        for entry in entries.iter() {
            if let Some(obj) = self.find_by_sha256(tx, &entry.sha256)? {
                objs.insert(entry.name.clone(), obj);
            }
        }
        Ok(objs)
    }

    pub fn get_pk_by_type(&self, tx: &dyn Tx, object_type: ObjectType) -> Result<BTreeSet<Key>> {
        self.map.get_pk_by_index(tx, BY_TYPE, &Key::from(object_type.as_str()))
    }

    /// Record `now` as the last time each of `keys` was found reachable.
    /// Return the number of objects updated, missing keys are skipped.
    pub fn mark_reachable<'a, I>(&self, tx: &mut WriteTx, keys: I, now: DateTime<Utc>) -> Result<usize>
    where
        I: IntoIterator<Item = &'a Key>,
    {
        let mut n = 0;
        for key in keys.into_iter() {
            let marked = self.map.modify(tx, key, |obj| {
                obj.last_marked_reachable_at = Some(now);
            })?;
            if marked {
                n += 1;
            }
        }
        Ok(n)
    }

    /// Objects that were last marked, or created if never marked, before
    /// `since`.
    pub fn find_unreachable(&self, tx: &dyn Tx, since: &DateTime<Utc>) -> Result<BTreeSet<Key>> {
        self.map.get_pk_by_index_less_than(tx, BY_LAST_MARKED, &millis_key(since))
    }

    pub fn delete(&self, tx: &mut WriteTx, key: &Key) -> Result<Option<RpkiObject>> {
        self.map.delete(tx, key)
    }

    pub fn keys(&self, tx: &dyn Tx) -> Result<BTreeSet<Key>> {
        self.map.keys(tx)
    }

    /// Add a fetch location to a stored object, return false if the
    /// object is missing.
    pub fn add_location(&self, tx: &mut WriteTx, key: &Key, location: &str) -> Result<bool> {
        self.map.modify(tx, key, |obj| {
            obj.locations.insert(location.to_string());
        })
    }

    pub fn as_map(&self) -> &Arc<IxMap<RpkiObject>> {
        &self.map
    }
}
