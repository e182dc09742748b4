use arbitrary::Unstructured;
use rand::{prelude::random, rngs::SmallRng, Rng, SeedableRng};

use super::*;

#[test]
fn test_key_u64_order() {
    let seed: u64 =
        [1728830617361283457, 9917293610287438231, random()][random::<usize>() % 3];
    let mut rng = SmallRng::seed_from_u64(seed);
    println!("test_key_u64_order {}", seed);

    for _ in 0..1000 {
        let (a, b): (u64, u64) = (rng.gen(), rng.gen());
        let (ka, kb) = (Key::from_u64(a), Key::from_u64(b));
        assert_eq!(a.cmp(&b), ka.cmp(&kb), "{} {}", a, b);
        assert_eq!(ka.to_u64().unwrap(), a);
    }

    assert!(Key::from("abc").to_u64().is_err());
}

#[test]
fn test_key_bytewise() {
    let seed: u64 =
        [5129318736518309817, 2219173616273659132, random()][random::<usize>() % 3];
    let mut rng = SmallRng::seed_from_u64(seed);
    println!("test_key_bytewise {}", seed);

    let mut keys: Vec<Key> = (0..100)
        .map(|_| {
            let bytes = rng.gen::<[u8; 32]>();
            let mut uns = Unstructured::new(&bytes);
            uns.arbitrary::<Key>().unwrap()
        })
        .collect();
    keys.sort();

    for w in keys.windows(2) {
        assert!(w[0].as_bytes() <= w[1].as_bytes());
    }

    // shorter prefix sorts first.
    assert!(Key::from("ab") < Key::from("abc"));
    assert!(Key::from_bytes(&[0xff]) > Key::from("abc"));
}

#[test]
fn test_key_concat() {
    let a = Key::from("trust-anchor:");
    let b = Key::from_u64(10);
    let c = a.concat(&b);
    assert_eq!(c.len(), a.len() + 8);
    assert_eq!(&c.as_bytes()[..a.len()], a.as_bytes());
    assert_eq!(c.to_string(), format!("{}{}", a, b));

    let uri = Key::from("rsync://example.net/repository/").truncate(5);
    assert_eq!(uri, Key::from("rsync"));

    let set = keys(vec![Key::from("b"), Key::from("a"), Key::from("b")]);
    assert_eq!(set.len(), 2);
    assert_eq!(set.iter().next(), Some(&Key::from("a")));

    assert_ne!(Key::random(), Key::random());
}
