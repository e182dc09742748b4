use chrono::{DateTime, Duration, Utc};

use std::{collections::BTreeMap, sync::Arc};

use super::*;
use crate::{
    data::{ObjectType, RepositoryType, RunKind, RunType, TrustAnchor, ValidationRun},
    store::test_storages,
    stores::Stores,
    util, Config, Key, Storage,
};

// certificates are looked up by their encoded bytes, manifest entries by
// the manifest's sha256.
#[derive(Default)]
struct FakeGraph {
    certs: BTreeMap<Vec<u8>, CaCertificate>,
    manifests: BTreeMap<Vec<u8>, Vec<ManifestEntry>>,
}

impl FakeGraph {
    fn add_cert(&mut self, encoded: &[u8], ski: u8, is_ca: bool) {
        let cert = CaCertificate {
            subject_key_identifier: vec![ski; 20],
            manifest_uri: Some(format!("rsync://example.net/{}.mft", ski)),
            is_ca,
        };
        self.certs.insert(encoded.to_vec(), cert);
    }

    fn add_manifest(&mut self, mft: &RpkiObject, entries: &[&RpkiObject]) {
        let entries = entries
            .iter()
            .map(|obj| ManifestEntry {
                name: format!("{}.{}", obj.sha256[0], obj.object_type.as_str().to_lowercase()),
                sha256: obj.sha256.clone(),
            })
            .collect();
        self.manifests.insert(mft.sha256.clone(), entries);
    }
}

impl ObjectGraph for FakeGraph {
    fn certificate(&self, encoded: &[u8]) -> Option<CaCertificate> {
        self.certs.get(encoded).cloned()
    }

    fn manifest_entries(&self, mft: &RpkiObject) -> Option<Vec<ManifestEntry>> {
        self.manifests.get(&mft.sha256).cloned()
    }
}

fn object(object_type: ObjectType, n: u8, aki: u8) -> RpkiObject {
    let mut obj = RpkiObject::new(object_type, vec![n; 32], vec![0x30, n]);
    obj.authority_key_identifier = Some(vec![aki; 20]);
    obj
}

fn manifest(n: u8, aki: u8, serial: u8) -> RpkiObject {
    let mut mft = object(ObjectType::Mft, n, aki);
    mft.serial_number = Some(vec![serial]);
    mft
}

// Trust anchor (ski 1) publishes manifest 10 listing a CA certificate 11,
// a ROA 12 and a CRL 13. The CA certificate (ski 2) publishes manifest
// 20 listing ROA 21. Manifest 14 is an older manifest of the trust anchor.
struct Fixture {
    stores: Stores,
    graph: FakeGraph,
    reachable: Vec<RpkiObject>,
    stale_mft: RpkiObject,
}

fn fixture(storage: &Storage) -> Fixture {
    let stores = Stores::new(storage).unwrap();
    let mut graph = FakeGraph::default();

    let mut ta = TrustAnchor::new("ripe", vec!["rsync://example.net/ta.cer".to_string()]);
    ta.encoded_certificate = Some(b"ta-certificate".to_vec());
    graph.add_cert(b"ta-certificate", 1, true);

    let mft = manifest(10, 1, 2);
    let ca = object(ObjectType::Cer, 11, 1);
    let roa = object(ObjectType::Roa, 12, 1);
    let crl = object(ObjectType::Crl, 13, 1);
    let stale_mft = manifest(14, 1, 1);
    let child_mft = manifest(20, 2, 1);
    let child_roa = object(ObjectType::Roa, 21, 2);

    graph.add_cert(&ca.encoded, 2, true);
    graph.add_manifest(&mft, &[&ca, &roa, &crl]);
    graph.add_manifest(&child_mft, &[&child_roa]);
    graph.add_manifest(&stale_mft, &[&roa]);

    let reachable = vec![mft, ca, roa, crl, child_mft, child_roa];
    storage
        .write_tx0(|tx| {
            stores.trust_anchors.add(tx, &mut ta)?;
            // trust anchor without certificate is skipped.
            stores.trust_anchors.add(tx, &mut TrustAnchor::new("pending", vec![]))?;
            for obj in reachable.iter().chain(Some(&stale_mft)) {
                stores.rpki_objects.put(tx, obj)?;
            }
            Ok(())
        })
        .unwrap();

    Fixture {
        stores,
        graph,
        reachable,
        stale_mft,
    }
}

fn put_orphan(storage: &Storage, stores: &Stores, n: u8, created_at: DateTime<Utc>) -> Key {
    let mut orphan = object(ObjectType::Roa, n, 99);
    orphan.base.created_at = created_at;
    storage
        .write_tx(|tx| stores.rpki_objects.put(tx, &orphan))
        .unwrap();
    orphan.key()
}

fn week_grace() -> Config {
    let mut config = Config::default();
    config.set_rpki_object_grace(Duration::days(7));
    config
}

#[test]
fn test_mark_and_sweep() {
    for storage in test_storages("test_mark_and_sweep").into_iter() {
        let storage = Arc::new(storage);
        let Fixture {
            stores,
            graph,
            reachable,
            stale_mft,
        } = fixture(&storage);

        let now = util::now();
        let orphan = put_orphan(&storage, &stores, 30, now - Duration::days(10));

        let cleanup = RpkiObjectCleanup::new(Arc::clone(&storage), &stores, Arc::new(graph), &week_grace());
        let marked = cleanup.mark().unwrap();
        let mut keys: Vec<Key> = marked.iter().map(|k| k.key().clone()).collect();
        keys.sort();
        let mut expected: Vec<Key> = reachable.iter().map(|o| o.key()).collect();
        expected.sort();
        assert_eq!(keys, expected);

        let stats = cleanup.cleanup_at(now).unwrap();
        assert_eq!(stats.marked, reachable.len());
        assert_eq!(stats.deleted, 1);

        let tx = storage.begin_read().unwrap();
        for obj in reachable.iter() {
            let stored = stores.rpki_objects.get(&tx, &obj.key()).unwrap().unwrap();
            assert_eq!(stored.last_marked_reachable_at, Some(now), "{}", obj.key());
        }
        assert_eq!(stores.rpki_objects.get(&tx, &orphan).unwrap(), None);
        // unreachable, but within the grace duration since its creation.
        let stale = stores.rpki_objects.get(&tx, &stale_mft.key()).unwrap().unwrap();
        assert_eq!(stale.last_marked_reachable_at, None);
        stores.rpki_objects.as_map().verify(&tx).unwrap();
        std::mem::drop(tx);

        // a second sweep finds nothing more to delete.
        assert_eq!(cleanup.cleanup_at(now).unwrap().deleted, 0);
    }
}

#[test]
fn test_grace_period() {
    for storage in test_storages("test_grace_period").into_iter() {
        let storage = Arc::new(storage);
        let Fixture {
            stores,
            graph,
            reachable,
            ..
        } = fixture(&storage);

        let t = util::now();
        let cleanup = RpkiObjectCleanup::new(Arc::clone(&storage), &stores, Arc::new(graph), &week_grace());
        assert_eq!(cleanup.cleanup_at(t).unwrap().deleted, 0);

        // the trust anchor drops its certificate, nothing is reachable.
        let empty = RpkiObjectCleanup::new(
            Arc::clone(&storage),
            &stores,
            Arc::new(FakeGraph::default()),
            &week_grace(),
        );
        let stats = empty.cleanup_at(t + Duration::days(3)).unwrap();
        assert_eq!((stats.marked, stats.deleted), (0, 0));
        let stats = empty.cleanup_at(t + Duration::days(6) + Duration::hours(23)).unwrap();
        assert_eq!(stats.deleted, 0);

        // stale manifest, never marked, was created around t.
        let stats = empty.cleanup_at(t + Duration::days(8)).unwrap();
        assert_eq!(stats.deleted, reachable.len() + 1);
        assert_eq!(empty.cleanup_at(t + Duration::days(9)).unwrap().deleted, 0);

        let tx = storage.begin_read().unwrap();
        assert_eq!(stores.rpki_objects.keys(&tx).unwrap().len(), 0);
    }
}

#[test]
fn test_mark_cycles_and_depth() {
    for storage in test_storages("test_mark_cycles_and_depth").into_iter() {
        let storage = Arc::new(storage);
        let Fixture {
            stores,
            mut graph,
            reachable,
            ..
        } = fixture(&storage);

        // manifest 20 lists its own issuing certificate, a cycle.
        let child_mft = reachable[4].clone();
        let entries = vec![&reachable[1], &reachable[5]];
        graph.add_manifest(&child_mft, &entries);

        let graph = Arc::new(graph);
        let mut cleanup = RpkiObjectCleanup::new(Arc::clone(&storage), &stores, graph, &week_grace());
        assert_eq!(cleanup.mark().unwrap().len(), reachable.len());

        // trust anchor manifest at depth 0, its entries at depth 1.
        cleanup.set_max_depth(1);
        assert_eq!(cleanup.mark().unwrap().len(), 4);
        cleanup.set_max_depth(0);
        assert_eq!(cleanup.mark().unwrap().len(), 1);
    }
}

#[test]
fn test_mark_shorter_path() {
    for storage in test_storages("test_mark_shorter_path").into_iter() {
        let storage = Arc::new(storage);
        let Fixture {
            stores,
            mut graph,
            reachable,
            ..
        } = fixture(&storage);

        // manifest 20 is also listed by the trust anchor manifest, after the
        // CA certificate that leads to it at depth 2.
        let entries: Vec<&RpkiObject> = reachable[1..5].iter().collect();
        graph.add_manifest(&reachable[0], &entries);

        let mut cleanup = RpkiObjectCleanup::new(Arc::clone(&storage), &stores, Arc::new(graph), &week_grace());
        cleanup.set_max_depth(2);
        let marked = cleanup.mark().unwrap();
        assert_eq!(marked.len(), reachable.len());
        assert!(marked.contains(&reachable[5].key()));
    }
}

#[test]
fn test_mark_ta_without_manifest_uri() {
    for storage in test_storages("test_mark_ta_without_manifest_uri").into_iter() {
        let storage = Arc::new(storage);
        let Fixture { stores, mut graph, .. } = fixture(&storage);

        if let Some(cert) = graph.certs.get_mut(&b"ta-certificate"[..]) {
            cert.manifest_uri = None;
        }
        let cleanup = RpkiObjectCleanup::new(Arc::clone(&storage), &stores, Arc::new(graph), &week_grace());
        assert_eq!(cleanup.mark().unwrap().len(), 0);
    }
}

#[test]
fn test_cleanup_repositories() {
    for storage in test_storages("test_cleanup_repositories").into_iter() {
        let storage = Arc::new(storage);
        let stores = Stores::new(&storage).unwrap();

        let mut ta = TrustAnchor::new("ripe", vec![]);
        let ta_key = storage.write_tx(|tx| stores.trust_anchors.add(tx, &mut ta)).unwrap();
        storage
            .write_tx0(|tx| {
                let ta = stores.trust_anchors.to_ref(tx, &ta_key)?;
                let uri = "https://rrdp.example.net/notify.xml";
                stores.rpki_repositories.register(tx, &ta, uri, RepositoryType::Rrdp)?;
                Ok(())
            })
            .unwrap();

        let mut config = Config::default();
        config.set_rpki_repository_grace(Duration::days(7));
        let cleanup = RpkiRepositoryCleanup::new(Arc::clone(&storage), &stores, &config);

        let now = util::now();
        assert_eq!(cleanup.cleanup_at(now + Duration::days(6)).unwrap().deleted, 0);
        assert_eq!(cleanup.cleanup_at(now + Duration::days(8)).unwrap().deleted, 1);
        assert_eq!(cleanup.cleanup_rpki_repositories().unwrap(), 0);
    }
}

#[test]
fn test_cleanup_validation_runs() {
    for storage in test_storages("test_cleanup_validation_runs").into_iter() {
        let storage = Arc::new(storage);
        let stores = Stores::new(&storage).unwrap();
        let runs = &stores.validation_runs;

        let now = util::now();
        let mut latest = ValidationRun::new(RunKind::RsyncRepository);
        latest.complete(now - Duration::hours(10));
        let mut old = ValidationRun::new(RunKind::RsyncRepository);
        old.complete(now - Duration::hours(12));
        let mut recent = ValidationRun::new(RunKind::RsyncRepository);
        recent.fail(now - Duration::hours(1));

        let latest_key = storage
            .write_tx(|tx| {
                let latest_key = runs.add(tx, &mut latest)?;
                runs.add(tx, &mut old)?;
                runs.add(tx, &mut recent)?;
                // object 7 was never stored.
                runs.associate_object(tx, &latest_key, &Key::from_u64(7))?;
                Ok(latest_key)
            })
            .unwrap();

        let mut config = Config::default();
        config.set_validation_run_grace(Duration::hours(6));
        let cleanup = ValidationRunCleanup::new(Arc::clone(&storage), &stores, &config);
        let stats = cleanup.cleanup_at(now).unwrap();
        assert_eq!((stats.deleted, stats.orphans), (1, 1));
        assert_eq!(cleanup.cleanup_validation_runs().unwrap(), (0, 0));

        let tx = storage.begin_read().unwrap();
        let alive = runs.find_all(&tx, RunType::RsyncRepository).unwrap();
        assert_eq!(alive.len(), 2);
        assert!(alive.iter().any(|run| run.key() == Some(&latest_key)));
        assert_eq!(runs.object_count(&tx, &latest_key).unwrap(), 0);
    }
}
