//! Primitive field encoders, used by record coders. Integers are
//! big-endian, timestamps are milli-seconds since epoch as i64, strings
//! are UTF-8 and lists are `| count: u32 | (len: u32, bytes) * count |`.

use chrono::{DateTime, Utc};

use std::convert::TryFrom;

use crate::{util, Result};

pub fn encode_str(s: &str) -> Vec<u8> {
    s.as_bytes().to_vec()
}

pub fn decode_str(buf: &[u8]) -> Result<String> {
    err_at!(DecodeFail, String::from_utf8(buf.to_vec()))
}

pub fn encode_bool(v: bool) -> Vec<u8> {
    vec![if v { 1 } else { 0 }]
}

pub fn decode_bool(buf: &[u8]) -> Result<bool> {
    match buf {
        [0] => Ok(false),
        [1] => Ok(true),
        _ => err_at!(DecodeFail, msg: "invalid bool {:?}", buf),
    }
}

pub fn encode_u32(v: u32) -> Vec<u8> {
    v.to_be_bytes().to_vec()
}

pub fn decode_u32(buf: &[u8]) -> Result<u32> {
    match <[u8; 4]>::try_from(buf) {
        Ok(b) => Ok(u32::from_be_bytes(b)),
        Err(_) => err_at!(DecodeFail, msg: "invalid u32, len {}", buf.len()),
    }
}

pub fn encode_i32(v: i32) -> Vec<u8> {
    v.to_be_bytes().to_vec()
}

pub fn decode_i32(buf: &[u8]) -> Result<i32> {
    match <[u8; 4]>::try_from(buf) {
        Ok(b) => Ok(i32::from_be_bytes(b)),
        Err(_) => err_at!(DecodeFail, msg: "invalid i32, len {}", buf.len()),
    }
}

pub fn encode_u64(v: u64) -> Vec<u8> {
    v.to_be_bytes().to_vec()
}

pub fn decode_u64(buf: &[u8]) -> Result<u64> {
    match <[u8; 8]>::try_from(buf) {
        Ok(b) => Ok(u64::from_be_bytes(b)),
        Err(_) => err_at!(DecodeFail, msg: "invalid u64, len {}", buf.len()),
    }
}

pub fn encode_i64(v: i64) -> Vec<u8> {
    v.to_be_bytes().to_vec()
}

pub fn decode_i64(buf: &[u8]) -> Result<i64> {
    match <[u8; 8]>::try_from(buf) {
        Ok(b) => Ok(i64::from_be_bytes(b)),
        Err(_) => err_at!(DecodeFail, msg: "invalid i64, len {}", buf.len()),
    }
}

pub fn encode_time(t: &DateTime<Utc>) -> Vec<u8> {
    encode_i64(t.timestamp_millis())
}

pub fn decode_time(buf: &[u8]) -> Result<DateTime<Utc>> {
    let millis = decode_i64(buf)?;
    match util::from_millis(millis) {
        Some(t) => Ok(t),
        None => err_at!(DecodeFail, msg: "invalid timestamp {}", millis),
    }
}

/// Encode a list of items, each item encoded by `f`.
pub fn encode_list<I, T, F>(items: I, mut f: F) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = T>,
    F: FnMut(T) -> Result<Vec<u8>>,
{
    let mut count: u32 = 0;
    let mut buf = vec![0, 0, 0, 0];
    for item in items.into_iter() {
        let data = f(item)?;
        let n = err_at!(FailConvert, u32::try_from(data.len()))?;
        buf.extend_from_slice(&n.to_be_bytes());
        buf.extend_from_slice(&data);
        count += 1;
    }
    buf[..4].copy_from_slice(&count.to_be_bytes());
    Ok(buf)
}

/// Decode a list of items, each item decoded by `f`.
pub fn decode_list<T, F>(buf: &[u8], mut f: F) -> Result<Vec<T>>
where
    F: FnMut(&[u8]) -> Result<T>,
{
    check_remaining!(buf, 4, "list-count")?;
    let count = decode_u32(&buf[..4])?;

    let mut items = vec![];
    let mut rem = &buf[4..];
    for _ in 0..count {
        check_remaining!(rem, 4, "list-item-len")?;
        let n = err_at!(FailConvert, usize::try_from(decode_u32(&rem[..4])?))?;
        rem = &rem[4..];
        check_remaining!(rem, n, "list-item")?;
        items.push(f(&rem[..n])?);
        rem = &rem[n..];
    }
    if !rem.is_empty() {
        return err_at!(DecodeFail, msg: "list has {} trailing bytes", rem.len());
    }

    Ok(items)
}

pub fn encode_str_list<'a, I>(items: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = &'a String>,
{
    encode_list(items, |s| Ok(encode_str(s)))
}

pub fn decode_str_list(buf: &[u8]) -> Result<Vec<String>> {
    decode_list(buf, decode_str)
}

#[cfg(test)]
#[path = "fields_test.rs"]
mod fields_test;
