use std::{collections::BTreeMap, convert::TryFrom};

use crate::Result;

/// Encoded is the tagged container for a record's fields.
///
/// Serialized layout, all integers big-endian:
///
/// ```text
/// | count: u32 | (tag: u16, offset: u32) * count | payloads ... |
/// ```
///
/// Offsets are relative to the start of the payload region. Payload for
/// entry `i` spans from its offset up to the offset of entry `i+1`, or
/// to the end of buffer for the last entry. Entries are written in tag
/// order, so that encoding is deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Encoded {
    fields: BTreeMap<u16, Vec<u8>>,
}

const HEADER: usize = 4;
const ENTRY: usize = 2 + 4;

impl Encoded {
    pub fn new() -> Encoded {
        Encoded::default()
    }

    /// Add field `tag`, replacing any previous payload for the tag.
    pub fn append(&mut self, tag: u16, payload: Vec<u8>) -> &mut Self {
        self.fields.insert(tag, payload);
        self
    }

    /// Add field `tag` only if value is present.
    pub fn append_opt<V, F>(&mut self, tag: u16, value: Option<V>, f: F) -> &mut Self
    where
        F: FnOnce(V) -> Vec<u8>,
    {
        if let Some(value) = value {
            self.fields.insert(tag, f(value));
        }
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Return payload for `tag`, if present.
    pub fn get(&self, tag: u16) -> Option<&[u8]> {
        self.fields.get(&tag).map(|p| p.as_slice())
    }

    /// Return payload for `tag`, fail with DecodeFail if missing.
    pub fn required(&self, tag: u16, what: &str) -> Result<&[u8]> {
        match self.fields.get(&tag) {
            Some(payload) => Ok(payload.as_slice()),
            None => err_at!(DecodeFail, msg: "missing field {}/{}", what, tag),
        }
    }

    /// Apply `f` on field `tag` if present.
    pub fn map_opt<V, F>(&self, tag: u16, f: F) -> Result<Option<V>>
    where
        F: FnOnce(&[u8]) -> Result<V>,
    {
        match self.fields.get(&tag) {
            Some(payload) => Ok(Some(f(payload)?)),
            None => Ok(None),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let count = err_at!(FailConvert, u32::try_from(self.fields.len()))?;
        let size: usize = self.fields.values().map(|p| p.len()).sum();

        let mut buf = Vec::with_capacity(HEADER + (self.fields.len() * ENTRY) + size);
        buf.extend_from_slice(&count.to_be_bytes());

        let mut offset: usize = 0;
        for (tag, payload) in self.fields.iter() {
            let off = err_at!(FailConvert, u32::try_from(offset), "payload too large")?;
            buf.extend_from_slice(&tag.to_be_bytes());
            buf.extend_from_slice(&off.to_be_bytes());
            offset += payload.len();
        }
        for payload in self.fields.values() {
            buf.extend_from_slice(payload);
        }

        Ok(buf)
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Encoded> {
        check_remaining!(buf, HEADER, "encoded-count")?;
        let count = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let count = err_at!(FailConvert, usize::try_from(count))?;

        let head_len = match count.checked_mul(ENTRY).and_then(|n| n.checked_add(HEADER)) {
            Some(n) => n,
            None => return err_at!(DecodeFail, msg: "encoded-count {} overflow", count),
        };
        check_remaining!(buf, head_len, "encoded-header")?;

        let payloads = &buf[head_len..];
        let mut entries: Vec<(u16, usize)> = Vec::with_capacity(count);
        for i in 0..count {
            let off = HEADER + (i * ENTRY);
            let tag = u16::from_be_bytes([buf[off], buf[off + 1]]);
            let offset = {
                let b = [buf[off + 2], buf[off + 3], buf[off + 4], buf[off + 5]];
                err_at!(FailConvert, usize::try_from(u32::from_be_bytes(b)))?
            };
            entries.push((tag, offset));
        }

        let mut fields = BTreeMap::new();
        for (i, (tag, start)) in entries.iter().enumerate() {
            let end = match entries.get(i + 1) {
                Some((_, end)) => *end,
                None => payloads.len(),
            };
            if *start > end || end > payloads.len() {
                return err_at!(
                    DecodeFail, msg: "field {} bad span {}..{}/{}", tag, start, end, payloads.len()
                );
            }
            if fields.insert(*tag, payloads[*start..end].to_vec()).is_some() {
                return err_at!(DecodeFail, msg: "duplicate field {}", tag);
            }
        }
        if let Some((_, start)) = entries.first() {
            if *start != 0 {
                return err_at!(DecodeFail, msg: "first field at offset {}", start);
            }
        }

        Ok(Encoded { fields })
    }
}

#[cfg(test)]
#[path = "encoded_test.rs"]
mod encoded_test;
