use chrono::Duration;

use std::sync::Mutex;

use super::*;
use crate::{
    store::test_storages,
    stores::{Stores, TrustAnchors},
};

fn add_ta(storage: &Storage, tas: &TrustAnchors, name: &str) -> Ref<TrustAnchor> {
    let mut ta = TrustAnchor::new(name, vec![]);
    let key = storage.write_tx(|tx| tas.add(tx, &mut ta)).unwrap();
    let tx = storage.begin_read().unwrap();
    tas.to_ref(&tx, &key).unwrap()
}

#[test]
fn test_parent_uris() {
    assert_eq!(
        parent_uris("rsync://host/a/b/c"),
        vec!["rsync://host/a/b/", "rsync://host/a/", "rsync://host/"]
    );
    assert_eq!(parent_uris("rsync://host/a/"), vec!["rsync://host/"]);
    assert!(parent_uris("rsync://host").is_empty());
    assert!(parent_uris("host/a/b").is_empty());
}

#[test]
fn test_register() {
    for storage in test_storages("test_repositories_register").into_iter() {
        let stores = Stores::new(&storage).unwrap();
        let repos = &stores.rpki_repositories;
        let ripe = add_ta(&storage, &stores.trust_anchors, "ripe");
        let apnic = add_ta(&storage, &stores.trust_anchors, "apnic");

        let notify = "https://rrdp.ripe.net/notification.xml";
        let r1 = storage
            .write_tx(|tx| repos.register(tx, &ripe, notify, RepositoryType::Rrdp))
            .unwrap();
        let r2 = storage
            .write_tx(|tx| repos.register(tx, &apnic, notify, RepositoryType::Rrdp))
            .unwrap();
        assert_eq!(r1.key(), r2.key());
        assert_eq!(r2.trust_anchors.len(), 2);
        assert!(r2.is_pending());

        // prefetch repository upgraded to rsync on registration.
        let prefetch = "rsync://rpki.ripe.net/repository/";
        storage
            .write_tx(|tx| repos.register(tx, &ripe, prefetch, RepositoryType::RsyncPrefetch))
            .unwrap();
        let mut parent = storage
            .write_tx(|tx| repos.register(tx, &ripe, prefetch, RepositoryType::Rsync))
            .unwrap();
        assert_eq!(parent.repository_type, RepositoryType::Rsync);

        let t = util::now() - Duration::minutes(5);
        parent.set_downloaded(t);
        storage.write_tx0(|tx| repos.update(tx, &mut parent)).unwrap();

        let child_uri = "rsync://rpki.ripe.net/repository/DEFAULT/xyz";
        let child = storage
            .write_tx(|tx| repos.register(tx, &ripe, child_uri, RepositoryType::Rsync))
            .unwrap();
        let parent_key = parent.key().cloned().unwrap();
        assert_eq!(
            child.parent_repository.as_ref().map(|r| r.key().clone()),
            Some(parent_key.clone())
        );
        assert!(child.is_downloaded());
        assert_eq!(child.last_downloaded_at, Some(t));

        let tx = storage.begin_read().unwrap();
        let found = repos.find_by_uri(&tx, child_uri).unwrap().unwrap();
        assert_eq!(found, child);
        assert_eq!(repos.find_by_uri(&tx, "rsync://rpki.ripe.net/").unwrap(), None);
        assert_eq!(repos.find_rrdp_repositories(&tx).unwrap().len(), 1);
        assert_eq!(repos.find_rsync_repositories(&tx).unwrap().len(), 2);
        assert_eq!(repos.find_by_trust_anchor(&tx, apnic.key()).unwrap().len(), 1);
        assert_eq!(repos.find_by_trust_anchor(&tx, ripe.key()).unwrap().len(), 3);

        let counts = repos.count_by_status(&tx).unwrap();
        assert_eq!(counts.get(&RepositoryStatus::Pending), Some(&1));
        assert_eq!(counts.get(&RepositoryStatus::Downloaded), Some(&2));
        repos.as_map().verify(&tx).unwrap();
    }
}

#[test]
fn test_long_uris() {
    for storage in test_storages("test_repositories_long_uris").into_iter() {
        let stores = Stores::new(&storage).unwrap();
        let repos = &stores.rpki_repositories;
        let ta = add_ta(&storage, &stores.trust_anchors, "ripe");

        // uris sharing the indexed prefix are told apart.
        let prefix = format!("rsync://example.net/{}", "x".repeat(120));
        let (a, b) = (format!("{}/a/", prefix), format!("{}/b/", prefix));
        storage
            .write_tx0(|tx| {
                repos.register(tx, &ta, &a, RepositoryType::RsyncPrefetch)?;
                repos.register(tx, &ta, &b, RepositoryType::RsyncPrefetch)?;
                Ok(())
            })
            .unwrap();

        let tx = storage.begin_read().unwrap();
        let found = repos.find_by_uri(&tx, &b).unwrap().unwrap();
        assert_eq!(found.rsync_repository_uri.as_deref(), Some(b.as_str()));
        assert_eq!(repos.find_all(&tx).unwrap().len(), 2);
    }
}

#[test]
fn test_remove_all_for_trust_anchor() {
    for storage in test_storages("test_remove_all_for_trust_anchor").into_iter() {
        let stores = Stores::new(&storage).unwrap();
        let repos = &stores.rpki_repositories;
        let ripe = add_ta(&storage, &stores.trust_anchors, "ripe");
        let apnic = add_ta(&storage, &stores.trust_anchors, "apnic");

        let removed = Arc::new(Mutex::new(vec![]));
        let r = Arc::clone(&removed);
        repos
            .set_removed_listener(move |repo| r.lock().unwrap().push(repo.location_uri().map(String::from)))
            .unwrap();

        let (shared, own) = ("https://shared/notify.xml", "https://own/notify.xml");
        storage
            .write_tx0(|tx| {
                repos.register(tx, &ripe, shared, RepositoryType::Rrdp)?;
                repos.register(tx, &apnic, shared, RepositoryType::Rrdp)?;
                repos.register(tx, &ripe, own, RepositoryType::Rrdp)?;
                Ok(())
            })
            .unwrap();

        // listener is not called for a rolled back removal.
        let res: Result<usize> = storage.write_tx(|tx| {
            repos.remove_all_for_trust_anchor(tx, &ripe)?;
            err_at!(InvalidInput, msg: "rollback")
        });
        assert!(res.is_err());
        assert!(removed.lock().unwrap().is_empty());

        let n = storage
            .write_tx(|tx| repos.remove_all_for_trust_anchor(tx, &ripe))
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(*removed.lock().unwrap(), vec![Some(own.to_string())]);

        let tx = storage.begin_read().unwrap();
        let all = repos.find_all(&tx).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].trust_anchors.keys().cloned().collect::<Vec<_>>(), vec![apnic]);
        repos.as_map().verify(&tx).unwrap();
    }
}

#[test]
fn test_delete_unreferenced() {
    for storage in test_storages("test_delete_unreferenced").into_iter() {
        let stores = Stores::new(&storage).unwrap();
        let repos = &stores.rpki_repositories;
        let ripe = add_ta(&storage, &stores.trust_anchors, "ripe");
        let apnic = add_ta(&storage, &stores.trust_anchors, "apnic");

        let now = util::now();
        let old = now - Duration::days(10);
        let mut stale = RpkiRepository::new(RepositoryType::Rsync, "rsync://stale/");
        stale.base.key = Some(Key::from_u64(100));
        stale.add_trust_anchor(ripe.clone(), old);
        let mut mixed = RpkiRepository::new(RepositoryType::Rsync, "rsync://mixed/");
        mixed.base.key = Some(Key::from_u64(101));
        mixed.add_trust_anchor(ripe.clone(), old);
        mixed.add_trust_anchor(apnic.clone(), now);
        let mut fresh = RpkiRepository::new(RepositoryType::Rrdp, "https://fresh/");
        fresh.base.key = Some(Key::from_u64(102));
        fresh.add_trust_anchor(ripe, now);

        storage
            .write_tx0(|tx| {
                for repo in [&stale, &mixed, &fresh].iter() {
                    repos.as_map().put(tx, repo.key().unwrap(), repo)?;
                }
                Ok(())
            })
            .unwrap();

        let since = now - Duration::days(7);
        assert_eq!(storage.write_tx(|tx| repos.delete_unreferenced(tx, &since)).unwrap(), 1);
        assert_eq!(storage.write_tx(|tx| repos.delete_unreferenced(tx, &since)).unwrap(), 0);

        let tx = storage.begin_read().unwrap();
        assert_eq!(repos.get(&tx, &Key::from_u64(100)).unwrap(), None);
        let mixed = repos.get(&tx, &Key::from_u64(101)).unwrap().unwrap();
        assert_eq!(mixed.trust_anchors.keys().cloned().collect::<Vec<_>>(), vec![apnic]);
        assert!(repos.get(&tx, &Key::from_u64(102)).unwrap().is_some());
    }
}
