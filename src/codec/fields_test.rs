use super::*;
use crate::Error;

#[test]
fn test_fields_list() {
    let items: Vec<String> = vec!["rsync://a/".to_string(), "".to_string(), "xyz".to_string()];
    let buf = encode_str_list(items.iter()).unwrap();
    #[rustfmt::skip]
    let ref_buf: Vec<u8> = vec![
        0, 0, 0, 3,
        0, 0, 0, 10, b'r', b's', b'y', b'n', b'c', b':', b'/', b'/', b'a', b'/',
        0, 0, 0, 0,
        0, 0, 0, 3, b'x', b'y', b'z',
    ];
    assert_eq!(buf, ref_buf);
    assert_eq!(decode_str_list(&buf).unwrap(), items);

    // truncated lists fail, never panic.
    for n in 0..buf.len() {
        match decode_str_list(&buf[..n]) {
            Err(Error::DecodeFail(_, _)) => (),
            res => panic!("{} {:?}", n, res),
        }
    }

    let mut buf = buf;
    buf.push(0);
    assert!(decode_str_list(&buf).is_err());
}

#[test]
fn test_fields_scalar() {
    assert!(decode_bool(&encode_bool(true)).unwrap());
    assert!(!decode_bool(&encode_bool(false)).unwrap());
    assert!(decode_bool(&[2]).is_err());
    assert!(decode_bool(&[]).is_err());

    assert_eq!(decode_i32(&encode_i32(-24)).unwrap(), -24);
    assert_eq!(decode_u64(&encode_u64(u64::MAX)).unwrap(), u64::MAX);
    assert!(decode_u64(&[1, 2, 3]).is_err());
    assert!(decode_u32(&[1, 2, 3, 4, 5]).is_err());

    let t = util::from_millis(1_600_000_000_123).unwrap();
    assert_eq!(decode_time(&encode_time(&t)).unwrap(), t);
    assert!(decode_str(&[0xff, 0xfe]).is_err());
}
