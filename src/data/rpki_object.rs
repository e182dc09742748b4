use chrono::{DateTime, Utc};

use std::{cmp, collections::BTreeSet, fmt, net::IpAddr, str::FromStr};

use crate::{data::Base, Error, Key, Result};

/// Kind of signed object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectType {
    Cer,
    Mft,
    Crl,
    Roa,
    Gbr,
    Other,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Cer => "CER",
            ObjectType::Mft => "MFT",
            ObjectType::Crl => "CRL",
            ObjectType::Roa => "ROA",
            ObjectType::Gbr => "GBR",
            ObjectType::Other => "OTHER",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = Error;

    fn from_str(s: &str) -> Result<ObjectType> {
        match s {
            "CER" => Ok(ObjectType::Cer),
            "MFT" => Ok(ObjectType::Mft),
            "CRL" => Ok(ObjectType::Crl),
            "ROA" => Ok(ObjectType::Roa),
            "GBR" => Ok(ObjectType::Gbr),
            "OTHER" => Ok(ObjectType::Other),
            _ => err_at!(DecodeFail, msg: "invalid object type {:?}", s),
        }
    }
}

/// Validated ROA payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoaPrefix {
    pub prefix: IpAddr,
    pub prefix_length: u8,
    pub asn: u32,
    pub max_length: Option<u8>,
    /// Validity window, milli-seconds since epoch.
    pub not_before: i64,
    pub not_after: i64,
    pub serial: Option<Vec<u8>>,
}

/// File listed in a manifest, along with its sha256.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ManifestEntry {
    pub name: String,
    pub sha256: Vec<u8>,
}

/// Signed object as fetched from a repository, keyed by its sha256.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RpkiObject {
    pub base: Base,
    pub object_type: ObjectType,
    pub sha256: Vec<u8>,
    pub authority_key_identifier: Option<Vec<u8>>,
    /// Serial number, unsigned big-endian bytes.
    pub serial_number: Option<Vec<u8>>,
    pub signing_time: Option<DateTime<Utc>>,
    pub encoded: Vec<u8>,
    pub locations: BTreeSet<String>,
    pub roa_prefixes: Vec<RoaPrefix>,
    /// Updated by the mark phase of garbage collection.
    pub last_marked_reachable_at: Option<DateTime<Utc>>,
}

impl RpkiObject {
    pub fn new(object_type: ObjectType, sha256: Vec<u8>, encoded: Vec<u8>) -> RpkiObject {
        let mut base = Base::new();
        base.key = Some(Key::from_bytes(&sha256));
        RpkiObject {
            base,
            object_type,
            sha256,
            authority_key_identifier: None,
            serial_number: None,
            signing_time: None,
            encoded,
            locations: BTreeSet::default(),
            roa_prefixes: Vec::default(),
            last_marked_reachable_at: None,
        }
    }

    /// Primary key, which is always the sha256 of encoded object.
    pub fn key(&self) -> Key {
        Key::from_bytes(&self.sha256)
    }

    /// Timestamp used to judge reachability, last marked or created.
    pub fn reachability_time(&self) -> DateTime<Utc> {
        self.last_marked_reachable_at.unwrap_or(self.base.created_at)
    }

    /// Order by serial-number, and then by signing-time, to pick the
    /// latest among manifests of the same authority.
    pub fn cmp_latest(&self, other: &RpkiObject) -> cmp::Ordering {
        let a = self.serial_number.as_deref().unwrap_or(&[]);
        let b = other.serial_number.as_deref().unwrap_or(&[]);
        cmp_unsigned(a, b).then_with(|| self.signing_time.cmp(&other.signing_time))
    }
}

// compare unsigned big-endian integers of arbitrary length.
fn cmp_unsigned(a: &[u8], b: &[u8]) -> cmp::Ordering {
    let strip = |x: &[u8]| -> usize { x.iter().take_while(|b| **b == 0).count() };
    let (a, b) = (&a[strip(a)..], &b[strip(b)..]);
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[cfg(test)]
#[path = "rpki_object_test.rs"]
mod rpki_object_test;
