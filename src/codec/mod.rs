//! Module implement tagged binary encoding for stored values.
//!
//! Every record type has a [Coder], that serializes the record into an
//! [Encoded] container of `(tag, payload)` fields. Decoders ignore unknown
//! tags and use defaults for missing optional tags, so that records can
//! gain new fields without invalidating stored data.
//!
//! Tags used by a coder are claimed through a [TagSet], claiming the same
//! tag twice fails at coder construction, instead of corrupting data later.

use std::collections::BTreeSet;

use crate::{Key, Result};

mod base;
mod encoded;
pub mod fields;
mod reference;
mod rpki_object;
mod rpki_repository;
mod trust_anchor;
mod validation;

pub use base::BaseCoder;
pub use encoded::Encoded;
pub use reference::RefCoder;
pub use rpki_object::{RoaPrefixCoder, RpkiObjectCoder};
pub use rpki_repository::RpkiRepositoryCoder;
pub use trust_anchor::TrustAnchorCoder;
pub use validation::{ValidationCheckCoder, ValidationRunCoder};

/// Trait to serialize values of type `T` into bytes and back.
pub trait Coder<T>: Send + Sync {
    fn encode(&self, value: &T) -> Result<Vec<u8>>;

    fn decode(&self, buf: &[u8]) -> Result<T>;
}

/// Set of tags claimed by a single coder.
#[derive(Clone, Debug)]
pub struct TagSet {
    name: String,
    tags: BTreeSet<u16>,
}

impl TagSet {
    pub fn new(name: &str) -> TagSet {
        TagSet {
            name: name.to_string(),
            tags: BTreeSet::default(),
        }
    }

    /// Claim `tag`, fail with TagCollision if it was already claimed.
    pub fn unique(&mut self, tag: u16) -> Result<u16> {
        if self.tags.insert(tag) {
            Ok(tag)
        } else {
            err_at!(TagCollision, msg: "tag {} reused in coder {}", tag, self.name)
        }
    }

    pub fn to_name(&self) -> String {
        self.name.clone()
    }
}

/// Coder for values that are themselves keys.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeyCoder;

impl Coder<Key> for KeyCoder {
    fn encode(&self, value: &Key) -> Result<Vec<u8>> {
        Ok(value.as_bytes().to_vec())
    }

    fn decode(&self, buf: &[u8]) -> Result<Key> {
        Ok(Key::from_bytes(buf))
    }
}

/// Coder for u64 values, like sequence counters.
#[derive(Clone, Copy, Debug, Default)]
pub struct U64Coder;

impl Coder<u64> for U64Coder {
    fn encode(&self, value: &u64) -> Result<Vec<u8>> {
        Ok(fields::encode_u64(*value))
    }

    fn decode(&self, buf: &[u8]) -> Result<u64> {
        fields::decode_u64(buf)
    }
}

/// Coder for UTF-8 string values.
#[derive(Clone, Copy, Debug, Default)]
pub struct StringCoder;

impl Coder<String> for StringCoder {
    fn encode(&self, value: &String) -> Result<Vec<u8>> {
        Ok(fields::encode_str(value))
    }

    fn decode(&self, buf: &[u8]) -> Result<String> {
        fields::decode_str(buf)
    }
}
