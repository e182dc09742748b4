use std::{collections::BTreeSet, fmt};

use crate::Result;

/// Key is an immutable byte-string, ordered byte-wise.
///
/// All primary keys and secondary-index keys in storage are Key values.
/// Two keys are equal if their bytes are equal, which also makes them
/// suitable for hash based sets.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(Vec<u8>);

impl Key {
    /// Maximum size, in bytes, for LMDB keys.
    pub const MAX_SIZE: usize = 511;

    pub fn from_bytes(bytes: &[u8]) -> Key {
        Key(bytes.to_vec())
    }

    /// Encode `v` as 8 bytes, big-endian, so that numeric order and
    /// byte order agree.
    pub fn from_u64(v: u64) -> Key {
        Key(v.to_be_bytes().to_vec())
    }

    pub fn from_uuid(uuid: &uuid::Uuid) -> Key {
        Key(uuid.as_bytes().to_vec())
    }

    /// Generate a random key, using uuid-v4.
    pub fn random() -> Key {
        Key::from_uuid(&uuid::Uuid::new_v4())
    }

    /// Concatenate this key with `other`, in that order.
    pub fn concat(&self, other: &Key) -> Key {
        let mut bytes = self.0.clone();
        bytes.extend_from_slice(&other.0);
        Key(bytes)
    }

    pub fn concat_all(keys: &[Key]) -> Key {
        Key(keys.iter().flat_map(|k| k.0.iter().copied()).collect())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Inverse of [Key::from_u64].
    pub fn to_u64(&self) -> Result<u64> {
        match <[u8; 8]>::try_from(self.0.as_slice()) {
            Ok(bytes) => Ok(u64::from_be_bytes(bytes)),
            Err(_) => err_at!(DecodeFail, msg: "key {} is not a u64", self),
        }
    }

    /// Truncate key to `n` bytes, used for long keys like URIs.
    pub fn truncate(mut self, n: usize) -> Key {
        self.0.truncate(n);
        self
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Key {
        Key(s.as_bytes().to_vec())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Key {
        Key(s.into_bytes())
    }
}

impl From<Vec<u8>> for Key {
    fn from(bytes: Vec<u8>) -> Key {
        Key(bytes)
    }
}

impl From<&[u8]> for Key {
    fn from(bytes: &[u8]) -> Key {
        Key::from_bytes(bytes)
    }
}

impl From<u64> for Key {
    fn from(v: u64) -> Key {
        Key::from_u64(v)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for b in self.0.iter() {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Key({})", self)
    }
}

impl<'a> arbitrary::Arbitrary<'a> for Key {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        let n = u.int_in_range(1..=16)?;
        let bytes = u.bytes(n)?;
        Ok(Key(bytes.to_vec()))
    }
}

/// Collect keys into a sorted set, handy for index functions.
pub fn keys<I>(iter: I) -> BTreeSet<Key>
where
    I: IntoIterator<Item = Key>,
{
    iter.into_iter().collect()
}

#[cfg(test)]
#[path = "key_test.rs"]
mod key_test;
