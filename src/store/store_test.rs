use rand::{prelude::random, rngs::SmallRng, Rng, SeedableRng};

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::atomic::{AtomicUsize, Ordering::SeqCst},
    thread,
};

use super::*;
use crate::{
    codec::{KeyCoder, StringCoder, U64Coder},
    keys, Error, Key, Ref,
};

fn len_index() -> IndexFn<String> {
    Box::new(|s: &String| keys(vec![Key::from_u64(s.len() as u64)]))
}

fn first_index() -> IndexFn<String> {
    Box::new(|s: &String| keys(s.chars().take(1).map(|ch| Key::from(ch.to_string()))))
}

// every distinct character, empty strings are not indexed.
fn chars_index() -> IndexFn<String> {
    Box::new(|s: &String| keys(s.chars().map(|ch| Key::from(ch.to_string()))))
}

fn string_map(storage: &Storage, name: &str, ixs: Vec<(&str, IndexFn<String>)>) -> Arc<IxMap<String>> {
    let indexes: Indexes<String> = ixs.into_iter().map(|(n, f)| (n.to_string(), f)).collect();
    storage
        .create_ix_map::<String>(name, indexes, Arc::new(StringCoder))
        .unwrap()
}

fn by_len(tx: &dyn Tx, map: &IxMap<String>, n: u64) -> BTreeMap<Key, String> {
    map.get_by_index(tx, "len", &Key::from_u64(n)).unwrap()
}

#[test]
fn test_len_index() {
    for storage in test_storages("test_len_index").into_iter() {
        let map = string_map(&storage, "strings", vec![("len", len_index())]);
        let (k1, k2) = (Key::from("k1"), Key::from("k2"));

        storage
            .write_tx0(|tx| {
                assert_eq!(map.put(tx, &k1, &"aa".to_string())?, None);
                assert_eq!(map.put(tx, &k2, &"aBa".to_string())?, None);
                Ok(())
            })
            .unwrap();

        let tx = storage.begin_read().unwrap();
        let expected: BTreeMap<Key, String> = vec![(k1.clone(), "aa".to_string())].into_iter().collect();
        assert_eq!(by_len(&tx, &map, 2), expected);
        let expected: BTreeMap<Key, String> = vec![(k2.clone(), "aBa".to_string())].into_iter().collect();
        assert_eq!(by_len(&tx, &map, 3), expected);
        std::mem::drop(tx);

        let old = storage
            .write_tx(|tx| map.put(tx, &k1, &"abcd".to_string()))
            .unwrap();
        assert_eq!(old, Some("aa".to_string()));

        let tx = storage.begin_read().unwrap();
        assert!(by_len(&tx, &map, 2).is_empty());
        let expected: BTreeMap<Key, String> = vec![(k1.clone(), "abcd".to_string())].into_iter().collect();
        assert_eq!(by_len(&tx, &map, 4), expected);
        assert!(map.get_by_index(&tx, "unknown", &Key::from_u64(4)).unwrap().is_empty());
        map.verify(&tx).unwrap();
    }
}

#[test]
fn test_overwrite_drops_index_pairs() {
    for storage in test_storages("test_overwrite_drops_index_pairs").into_iter() {
        let map = string_map(&storage, "strings", vec![("len", len_index())]);
        let (k1, k2) = (Key::from("k1"), Key::from("k2"));

        storage
            .write_tx0(|tx| {
                map.put(tx, &k1, &"aa".to_string())?;
                map.put(tx, &k2, &"bb".to_string())?;
                Ok(())
            })
            .unwrap();
        storage
            .write_tx(|tx| map.put(tx, &k1, &"abcd".to_string()))
            .unwrap();

        let tx = storage.begin_read().unwrap();
        let pks = map.get_pk_by_index(&tx, "len", &Key::from_u64(2)).unwrap();
        assert_eq!(pks, keys(vec![k2.clone()]));
        map.verify(&tx).unwrap();
        std::mem::drop(tx);

        assert!(storage.write_tx(|tx| map.delete(tx, &k1)).unwrap().is_some());
        let tx = storage.begin_read().unwrap();
        assert!(map.get_pk_by_index(&tx, "len", &Key::from_u64(4)).unwrap().is_empty());
        let pks = map.get_pk_by_index(&tx, "len", &Key::from_u64(2)).unwrap();
        assert_eq!(pks, keys(vec![k2.clone()]));
        map.verify(&tx).unwrap();
    }
}

#[test]
fn test_index_consistency() {
    let seed: u64 =
        [10619210316543290154, 4377296120385591863, random()][random::<usize>() % 3];
    let mut rng = SmallRng::seed_from_u64(seed);
    println!("test_index_consistency {}", seed);

    for storage in test_storages("test_index_consistency").into_iter() {
        let ixs = vec![("len", len_index()), ("chars", chars_index())];
        let map = string_map(&storage, "strings", ixs);
        let mut model: BTreeMap<Key, String> = BTreeMap::new();

        for _ in 0..100 {
            let mut batch = model.clone();
            let mut tx = storage.begin_write().unwrap();
            for _ in 0..rng.gen_range(1..20) {
                let key = Key::from_u64(rng.gen_range(0..50));
                match rng.gen::<u8>() % 4 {
                    0 => {
                        let old = map.delete(&mut tx, &key).unwrap();
                        assert_eq!(old, batch.remove(&key));
                    }
                    _ => {
                        let n = rng.gen_range(0..8);
                        let value: String = (0..n).map(|_| ['a', 'b', 'c'][rng.gen_range(0..3)]).collect();
                        let old = map.put(&mut tx, &key, &value).unwrap();
                        assert_eq!(old, batch.insert(key, value));
                    }
                }
            }
            // a third of the batches are rolled back.
            if rng.gen::<u8>() % 3 == 0 {
                tx.rollback();
            } else {
                assert!(tx.commit().unwrap());
                model = batch;
            }

            let tx = storage.begin_read().unwrap();
            map.verify(&tx).unwrap();
            assert_eq!(map.all(&tx).unwrap(), model);
            for n in 0..8 {
                let pks = map.get_pk_by_index(&tx, "len", &Key::from_u64(n)).unwrap();
                let expected: BTreeSet<Key> = model
                    .iter()
                    .filter(|(_, v)| v.len() as u64 == n)
                    .map(|(k, _)| k.clone())
                    .collect();
                assert_eq!(pks, expected, "len:{}", n);
            }
            for ch in ['a', 'b', 'c'].iter() {
                let ik = Key::from(ch.to_string());
                let pks = map.get_pk_by_index(&tx, "chars", &ik).unwrap();
                let expected: BTreeSet<Key> = model
                    .iter()
                    .filter(|(_, v)| v.contains(*ch))
                    .map(|(k, _)| k.clone())
                    .collect();
                assert_eq!(pks, expected, "chars:{}", ch);
            }
        }

        let tx = storage.begin_read().unwrap();
        let sizes = map.size_info(&tx).unwrap();
        assert_eq!(sizes.count, model.len());
        assert_eq!(sizes.indexes["len"].count, model.len());
    }
}

#[test]
fn test_idempotent_put_delete() {
    for storage in test_storages("test_idempotent_put_delete").into_iter() {
        let map = string_map(&storage, "strings", vec![("chars", chars_index())]);
        let key = Key::from("k");

        for _ in 0..3 {
            storage.write_tx(|tx| map.put(tx, &key, &"abc".to_string())).unwrap();
        }
        let sizes = storage.read_tx(|tx| map.size_info(tx)).unwrap();
        assert_eq!(sizes.count, 1);
        assert_eq!(sizes.indexes["chars"].count, 3);

        for i in 0..2 {
            let old = storage.write_tx(|tx| map.delete(tx, &key)).unwrap();
            assert_eq!(old.is_some(), i == 0);
        }
        let sizes = storage.read_tx(|tx| map.size_info(tx)).unwrap();
        assert_eq!(sizes.count, 0);
        assert_eq!(sizes.indexes["chars"].count, 0);
    }
}

#[test]
fn test_index_ranges() {
    for storage in test_storages("test_index_ranges").into_iter() {
        let map = string_map(&storage, "strings", vec![("len", len_index())]);
        let values = ["a", "bb", "ab", "ccc", "abcd", "bcde"];

        storage
            .write_tx0(|tx| {
                for (i, v) in values.iter().enumerate() {
                    map.put(tx, &Key::from_u64(i as u64), &v.to_string())?;
                }
                Ok(())
            })
            .unwrap();

        let tx = storage.begin_read().unwrap();
        let ik = Key::from_u64(3);
        let less = map.get_pk_by_index_less_than(&tx, "len", &ik).unwrap();
        assert_eq!(less, keys((0..3).map(Key::from_u64)));
        let more = map.get_pk_by_index_not_less_than(&tx, "len", &ik).unwrap();
        assert_eq!(more, keys((3..6).map(Key::from_u64)));

        let less = map.get_by_index_less_than(&tx, "len", &Key::from_u64(2)).unwrap();
        assert_eq!(less.values().cloned().collect::<Vec<String>>(), vec!["a".to_string()]);
        let more = map.get_by_index_not_less_than(&tx, "len", &Key::from_u64(4)).unwrap();
        assert_eq!(more.len(), 2);

        let max = map.get_by_index_max(&tx, "len", |s| s.starts_with('a')).unwrap();
        assert_eq!(max.values().collect::<Vec<&String>>(), vec!["abcd"]);
        let max = map.get_by_index_max(&tx, "len", |s| s.starts_with('c')).unwrap();
        assert_eq!(max.values().collect::<Vec<&String>>(), vec!["ccc"]);
        let min = map.get_by_index_min(&tx, "len", |s| s.starts_with('b')).unwrap();
        assert_eq!(min.values().collect::<Vec<&String>>(), vec!["bb"]);
        let min = map.get_by_index_min(&tx, "len", |_| true).unwrap();
        assert_eq!(min.values().collect::<Vec<&String>>(), vec!["a"]);
        assert!(map.get_by_index_max(&tx, "len", |s| s.is_empty()).unwrap().is_empty());
    }
}

#[test]
fn test_reindex() {
    for storage in test_storages("test_reindex").into_iter() {
        let words = ["apple", "avocado", "banana", "blueberry", "cherry", "fig"];
        {
            let map = string_map(&storage, "words", vec![("len", len_index())]);
            storage
                .write_tx0(|tx| {
                    for (i, w) in words.iter().enumerate() {
                        map.put(tx, &Key::from_u64(i as u64), &w.to_string())?;
                    }
                    Ok(())
                })
                .unwrap();
        }

        // drop len, add first.
        let map = string_map(&storage, "words", vec![("first", first_index())]);
        assert_eq!(map.index_names(), vec!["first".to_string()]);
        {
            let tx = storage.begin_read().unwrap();
            map.verify(&tx).unwrap();
            assert!(by_len(&tx, &map, 6).is_empty());
            let pks = map.get_pk_by_index(&tx, "first", &Key::from("b")).unwrap();
            assert_eq!(pks, keys(vec![Key::from_u64(2), Key::from_u64(3)]));
        }

        // change the data, then bring len back, it must not carry stale
        // entries from its first incarnation.
        storage
            .write_tx(|tx| map.put(tx, &Key::from_u64(5), &"grape".to_string()))
            .unwrap();
        let map = string_map(
            &storage,
            "words",
            vec![("len", len_index()), ("first", first_index())],
        );

        let fresh = Storage::in_memory().unwrap();
        let fresh_map = string_map(&fresh, "words", vec![("len", len_index()), ("first", first_index())]);
        let entries = storage.read_tx(|tx| map.all(tx)).unwrap();
        fresh
            .write_tx0(|tx| {
                for (k, v) in entries.iter() {
                    fresh_map.put(tx, k, v)?;
                }
                Ok(())
            })
            .unwrap();

        let (tx, ftx) = (storage.begin_read().unwrap(), fresh.begin_read().unwrap());
        map.verify(&tx).unwrap();
        for n in 0..10 {
            assert_eq!(by_len(&tx, &map, n), by_len(&ftx, &fresh_map, n), "len:{}", n);
        }
        for ch in ["a", "b", "c", "f", "g"].iter() {
            let ik = Key::from(*ch);
            assert_eq!(
                map.get_by_index(&tx, "first", &ik).unwrap(),
                fresh_map.get_by_index(&ftx, "first", &ik).unwrap()
            );
        }
        assert!(by_len(&tx, &map, 3).is_empty());
        std::mem::drop(tx);

        // reopening with the same indexes is a no-op.
        let map = string_map(
            &storage,
            "words",
            vec![("first", first_index()), ("len", len_index())],
        );
        storage.read_tx(|tx| map.verify(tx)).unwrap();

        match storage.create_multi_ix_map::<String>("words", Arc::new(StringCoder)) {
            Err(Error::InvalidInput(_, _)) => (),
            Err(err) => panic!("{}", err),
            Ok(_) => panic!("expected kind mismatch"),
        }
    }
}

#[test]
fn test_isolation() {
    for storage in test_storages("test_isolation").into_iter() {
        let map = storage
            .create_ix_map::<u64>("counters", Indexes::new(), Arc::new(U64Coder))
            .unwrap();
        let key = Key::from("counter");
        storage.write_tx(|tx| map.put(tx, &key, &1)).unwrap();

        let before = storage.begin_read().unwrap();
        let mut tx = storage.begin_write().unwrap();
        map.put(&mut tx, &key, &2).unwrap();
        assert_eq!(map.get(&tx, &key).unwrap(), Some(2));
        assert_eq!(map.get(&before, &key).unwrap(), Some(1));
        tx.rollback();

        let mut tx = storage.begin_write().unwrap();
        map.put(&mut tx, &key, &3).unwrap();
        assert!(tx.commit().unwrap());

        assert_eq!(map.get(&before, &key).unwrap(), Some(1));
        let after = storage.begin_read().unwrap();
        assert_eq!(map.get(&after, &key).unwrap(), Some(3));

        let res: Result<()> = storage.write_tx(|tx| {
            map.put(tx, &key, &4)?;
            err_at!(InvalidInput, msg: "fail the transaction")
        });
        assert!(res.is_err());
        assert_eq!(storage.read_tx(|tx| map.get(tx, &key)).unwrap(), Some(3));
    }
}

#[test]
fn test_atomic_commit() {
    for storage in test_storages("test_atomic_commit").into_iter() {
        let storage = Arc::new(storage);
        let map = storage
            .create_ix_map::<u64>("pair", Indexes::new(), Arc::new(U64Coder))
            .unwrap();
        let (a, b) = (Key::from("a"), Key::from("b"));
        storage
            .write_tx0(|tx| {
                map.put(tx, &a, &0)?;
                map.put(tx, &b, &0)?;
                Ok(())
            })
            .unwrap();

        let mut readers = vec![];
        for _ in 0..4 {
            let (storage, map) = (Arc::clone(&storage), Arc::clone(&map));
            let (a, b) = (a.clone(), b.clone());
            readers.push(thread::spawn(move || {
                for _ in 0..200 {
                    let tx = storage.begin_read().unwrap();
                    let va = map.get(&tx, &a).unwrap();
                    let vb = map.get(&tx, &b).unwrap();
                    assert_eq!(va, vb);
                }
            }));
        }

        for i in 1..=200_u64 {
            storage
                .write_tx0(|tx| {
                    map.put(tx, &a, &i)?;
                    map.put(tx, &b, &i)?;
                    Ok(())
                })
                .unwrap();
        }
        for reader in readers.into_iter() {
            reader.join().unwrap();
        }
    }
}

#[test]
fn test_after_commit() {
    for storage in test_storages("test_after_commit").into_iter() {
        let map = storage
            .create_ix_map::<u64>("counters", Indexes::new(), Arc::new(U64Coder))
            .unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut tx = storage.begin_write().unwrap();
        let c = Arc::clone(&calls);
        tx.after_commit(move || {
            c.fetch_add(1, SeqCst);
            Ok(())
        });
        map.put(&mut tx, &Key::from("x"), &1).unwrap();
        assert_eq!(calls.load(SeqCst), 0);
        tx.commit().unwrap();
        assert_eq!(calls.load(SeqCst), 1);

        let mut tx = storage.begin_write().unwrap();
        let c = Arc::clone(&calls);
        tx.after_commit(move || {
            c.fetch_add(1, SeqCst);
            Ok(())
        });
        tx.rollback();
        assert_eq!(calls.load(SeqCst), 1);

        // failing callbacks are logged, other callbacks still run.
        let res = storage.write_tx0(|tx| {
            tx.after_commit(|| err_at!(Fatal, msg: "callback failed"));
            let c = Arc::clone(&calls);
            tx.after_commit(move || {
                c.fetch_add(1, SeqCst);
                Ok(())
            });
            Ok(())
        });
        assert!(res.is_ok());
        assert_eq!(calls.load(SeqCst), 2);

        let res = storage.write_tx0(|tx| {
            let c = Arc::clone(&calls);
            tx.after_commit(move || {
                c.fetch_add(1, SeqCst);
                Ok(())
            });
            err_at!(InvalidInput, msg: "rollback")
        });
        assert!(res.is_err());
        assert_eq!(calls.load(SeqCst), 2);
    }
}

#[test]
fn test_on_delete_restrict() {
    for storage in test_storages("test_on_delete_restrict").into_iter() {
        let map = string_map(&storage, "strings", vec![("len", len_index())]);
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        map.on_delete(move |_tx, key| {
            c.fetch_add(1, SeqCst);
            if key == &Key::from("locked") {
                err_at!(OnDeleteRestrict, msg: "{} is referenced", key)
            } else {
                Ok(())
            }
        })
        .unwrap();

        let (locked, free) = (Key::from("locked"), Key::from("free"));
        storage
            .write_tx0(|tx| {
                map.put(tx, &locked, &"abc".to_string())?;
                map.put(tx, &free, &"xyz".to_string())?;
                Ok(())
            })
            .unwrap();

        let mut tx = storage.begin_write().unwrap();
        map.delete(&mut tx, &free).unwrap();
        assert!(!tx.is_aborted());
        map.delete(&mut tx, &locked).unwrap();
        assert!(tx.is_aborted());
        assert!(matches!(
            map.put(&mut tx, &free, &"new".to_string()),
            Err(Error::Fatal(_, _))
        ));
        assert!(!tx.commit().unwrap());
        assert_eq!(calls.load(SeqCst), 2);

        // both deletes were rolled back.
        let tx = storage.begin_read().unwrap();
        assert_eq!(map.get(&tx, &locked).unwrap(), Some("abc".to_string()));
        assert_eq!(map.get(&tx, &free).unwrap(), Some("xyz".to_string()));
        map.verify(&tx).unwrap();
        std::mem::drop(tx);

        // missing keys do not fire triggers.
        storage.write_tx(|tx| map.delete(tx, &Key::from("missing"))).unwrap();
        assert_eq!(calls.load(SeqCst), 2);
    }
}

#[test]
fn test_ref() {
    for storage in test_storages("test_ref").into_iter() {
        let map = string_map(&storage, "strings", vec![]);
        let key = Key::from("target");

        let tx = storage.begin_read().unwrap();
        match Ref::of(&tx, &map, key.clone()) {
            Err(Error::RefNotFound(_, msg)) => assert!(msg.contains("strings"), "{}", msg),
            res => panic!("{:?}", res.map(|r| r.key().clone())),
        }
        std::mem::drop(tx);

        let r = storage
            .write_tx(|tx| {
                map.put(tx, &key, &"value".to_string())?;
                Ref::of(tx, &map, key.clone())
            })
            .unwrap();
        assert_eq!(r.map_name(), "strings");
        assert_eq!(r.key(), &key);
        let value = storage.read_tx(|tx| r.get(tx, &map)).unwrap();
        assert_eq!(value, Some("value".to_string()));

        // references can go stale.
        storage.write_tx(|tx| map.delete(tx, &key)).unwrap();
        assert_eq!(storage.read_tx(|tx| r.get(tx, &map)).unwrap(), None);
    }
}

#[test]
fn test_multi_ix_map() {
    for storage in test_storages("test_multi_ix_map").into_iter() {
        let map = storage
            .create_multi_ix_map::<Key>("links", Arc::new(KeyCoder))
            .unwrap();
        let (k1, k2) = (Key::from_u64(1), Key::from_u64(2));
        let (a, b, c) = (Key::from("a"), Key::from("b"), Key::from("c"));

        storage
            .write_tx0(|tx| {
                map.put(tx, &k1, &c)?;
                map.put(tx, &k1, &a)?;
                map.put(tx, &k1, &b)?;
                map.put(tx, &k1, &a)?;
                map.put(tx, &k2, &a)?;
                Ok(())
            })
            .unwrap();

        let tx = storage.begin_read().unwrap();
        let values: BTreeSet<Key> = map.get(&tx, &k1).unwrap().into_iter().collect();
        assert_eq!(values, keys(vec![a.clone(), b.clone(), c.clone()]));
        assert_eq!(map.count(&tx, &k1).unwrap(), 3);
        assert_eq!(map.size(&tx).unwrap(), 4);
        assert!(map.exists_value(&tx, &k2, &a).unwrap());
        assert!(!map.exists_value(&tx, &k2, &b).unwrap());
        assert!(map.get(&tx, &Key::from_u64(3)).unwrap().is_empty());
        std::mem::drop(tx);

        storage
            .write_tx0(|tx| {
                assert!(map.delete_value(tx, &k1, &b)?);
                assert!(!map.delete_value(tx, &k1, &b)?);
                let pairs = vec![(k1.clone(), c.clone()), (k2.clone(), c.clone())];
                assert_eq!(map.delete_batch(tx, &pairs)?, 1);
                Ok(())
            })
            .unwrap();

        let all = storage.read_tx(|tx| map.all(tx)).unwrap();
        assert_eq!(all[&k1], vec![a.clone()]);
        assert_eq!(all[&k2], vec![a.clone()]);

        assert!(storage.write_tx(|tx| map.delete(tx, &k1)).unwrap());
        assert!(!storage.write_tx(|tx| map.delete(tx, &k1)).unwrap());
        let keys = storage.read_tx(|tx| map.keys(tx)).unwrap();
        assert_eq!(keys, crate::keys(vec![k2.clone()]));

        storage.write_tx0(|tx| map.clear(tx)).unwrap();
        assert_eq!(storage.read_tx(|tx| map.size(tx)).unwrap(), 0);
    }
}

#[test]
fn test_corrupted_value() {
    for storage in test_storages("test_corrupted_value").into_iter() {
        let map = string_map(&storage, "strings", vec![]);
        let key = Key::from("k");
        storage
            .write_tx0(|tx| {
                let main = map.as_core().main.clone();
                tx.as_raw_mut()?.put(&main, key.as_bytes(), &[0, 0, 0, 0, 1, 2, 3])
            })
            .unwrap();
        let res = storage.read_tx(|tx| map.get(tx, &key));
        assert!(matches!(res, Err(Error::Corrupted(_, _))), "{:?}", res);

        storage
            .write_tx0(|tx| tx.as_raw_mut()?.put(&map.as_core().main.clone(), b"j", &[1]))
            .unwrap();
        let res = storage.read_tx(|tx| map.get(tx, &Key::from("j")));
        assert!(matches!(res, Err(Error::DecodeFail(_, _))), "{:?}", res);
    }
}

#[test]
fn test_invalid_keys() {
    let storage = Storage::in_memory().unwrap();
    let map = string_map(&storage, "strings", vec![]);

    let res = storage.write_tx(|tx| map.put(tx, &Key::default(), &"x".to_string()));
    assert!(matches!(res, Err(Error::InvalidInput(_, _))));
    let long = Key::from_bytes(&[1; 512]);
    let res = storage.write_tx(|tx| map.put(tx, &long, &"x".to_string()));
    assert!(matches!(res, Err(Error::InvalidInput(_, _))));

    let res = storage.create_ix_map::<String>("bad name", Indexes::new(), Arc::new(StringCoder));
    assert!(matches!(res, Err(Error::InvalidInput(_, _))));
}

#[test]
fn test_status_and_stats() {
    for storage in test_storages("test_status_and_stats").into_iter() {
        let map = string_map(&storage, "strings", vec![("len", len_index())]);
        let links = storage
            .create_multi_ix_map::<Key>("links", Arc::new(KeyCoder))
            .unwrap();
        storage
            .write_tx0(|tx| {
                map.put(tx, &Key::from("a"), &"abc".to_string())?;
                links.put(tx, &Key::from("a"), &Key::from("b"))?;
                Ok(())
            })
            .unwrap();

        let tx = storage.begin_read().unwrap();
        let status = storage.status().unwrap();
        assert!(status.contains("1 read, 0 write"), "{}", status);
        assert!(status.contains("links, strings"), "{}", status);
        assert_eq!(storage.to_live_txns().len(), 1);
        std::mem::drop(tx);
        assert!(storage.to_live_txns().is_empty());

        let stats = storage.db_stats().unwrap();
        assert_eq!(stats["strings"].count, 1);
        assert_eq!(stats["strings"].indexes["len"].count, 1);
        assert_eq!(stats["links"].count, 1);
        println!("{} {}", storage.to_backend_name(), stats["strings"]);

        storage.gc().unwrap();
    }
}
