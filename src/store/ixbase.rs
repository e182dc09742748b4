use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    ops::Bound,
    sync::Arc,
};

use crate::{
    codec::Coder,
    store::backend::{RawRead, Table},
    Key, Result, Tx, WriteTx,
};

const CRC: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

/// Size information for a map, or one of its indexes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sizes {
    pub count: usize,
    pub key_bytes: usize,
    pub value_bytes: usize,
    pub indexes: BTreeMap<String, Sizes>,
}

impl fmt::Display for Sizes {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "count:{} key_bytes:{} value_bytes:{}",
            self.count, self.key_bytes, self.value_bytes
        )?;
        for (name, sizes) in self.indexes.iter() {
            write!(f, " [{} {}]", name, sizes)?;
        }
        Ok(())
    }
}

pub(crate) fn table_sizes(raw: &dyn RawRead, table: &Table) -> Result<Sizes> {
    let mut sizes = Sizes::default();
    let mut callb = |k: &[u8], v: &[u8]| -> Result<bool> {
        sizes.count += 1;
        sizes.key_bytes += k.len();
        sizes.value_bytes += v.len();
        Ok(true)
    };
    raw.range(table, Bound::Unbounded, Bound::Unbounded, &mut callb)?;
    Ok(sizes)
}

/// State shared by all map types, the primary table and the value coder.
///
/// Values are stored with a CRC32 checksum prefix, so that corruption is
/// reported as Corrupted instead of surfacing as bad records.
pub struct MapCore<T> {
    pub(crate) name: String,
    pub(crate) main: Table,
    coder: Arc<dyn Coder<T>>,
}

impl<T> MapCore<T> {
    pub(crate) fn new(name: &str, main: Table, coder: Arc<dyn Coder<T>>) -> MapCore<T> {
        MapCore {
            name: name.to_string(),
            main,
            coder,
        }
    }

    pub(crate) fn encode(&self, value: &T) -> Result<Vec<u8>> {
        let payload = self.coder.encode(value)?;
        let mut data = Vec::with_capacity(4 + payload.len());
        data.extend_from_slice(&CRC.checksum(&payload).to_be_bytes());
        data.extend_from_slice(&payload);
        Ok(data)
    }

    pub(crate) fn decode(&self, key: &[u8], data: &[u8]) -> Result<T> {
        check_remaining!(data, 4, "value-checksum")?;
        let (crc, payload) = (&data[..4], &data[4..]);
        let crc = u32::from_be_bytes([crc[0], crc[1], crc[2], crc[3]]);
        if crc != CRC.checksum(payload) {
            return err_at!(
                Corrupted, msg: "{} checksum mismatch for {}", self.name, Key::from_bytes(key)
            );
        }
        self.coder.decode(payload)
    }
}

/// Operations common to [IxMap] and [MultiIxMap].
///
/// [IxMap]: crate::IxMap
/// [MultiIxMap]: crate::MultiIxMap
pub trait IxBase<T> {
    #[doc(hidden)]
    fn as_core(&self) -> &MapCore<T>;

    fn name<'a>(&'a self) -> &'a str
    where
        T: 'a,
    {
        &self.as_core().name
    }

    fn exists(&self, tx: &dyn Tx, key: &Key) -> Result<bool> {
        let core = self.as_core();
        Ok(tx.as_raw().get(&core.main, key.as_bytes())?.is_some())
    }

    /// Return all keys, in sort order.
    fn keys(&self, tx: &dyn Tx) -> Result<BTreeSet<Key>> {
        let mut keys = BTreeSet::new();
        let mut callb = |k: &[u8], _: &[u8]| -> Result<bool> {
            keys.insert(Key::from_bytes(k));
            Ok(true)
        };
        let raw = tx.as_raw();
        raw.range(&self.as_core().main, Bound::Unbounded, Bound::Unbounded, &mut callb)?;
        Ok(keys)
    }

    /// Return all values, in key order.
    fn values(&self, tx: &dyn Tx) -> Result<Vec<T>> {
        let mut values = vec![];
        self.for_each(tx, |_, value| {
            values.push(value);
            Ok(())
        })?;
        Ok(values)
    }

    /// Iterate over all (key, value) entries in key order.
    fn for_each<F>(&self, tx: &dyn Tx, mut f: F) -> Result<()>
    where
        F: FnMut(Key, T) -> Result<()>,
    {
        let core = self.as_core();
        let mut callb = |k: &[u8], v: &[u8]| -> Result<bool> {
            f(Key::from_bytes(k), core.decode(k, v)?)?;
            Ok(true)
        };
        tx.as_raw()
            .range(&core.main, Bound::Unbounded, Bound::Unbounded, &mut callb)
    }

    /// Number of entries.
    fn size(&self, tx: &dyn Tx) -> Result<usize> {
        Ok(table_sizes(tx.as_raw(), &self.as_core().main)?.count)
    }

    fn size_info(&self, tx: &dyn Tx) -> Result<Sizes> {
        table_sizes(tx.as_raw(), &self.as_core().main)
    }

    /// Remove all entries.
    fn clear(&self, tx: &mut WriteTx) -> Result<()> {
        tx.as_raw_mut()?.clear(&self.as_core().main)
    }
}

/// Object safe view of a map, used to report storage statistics.
pub(crate) trait MapStats: Send + Sync {
    fn to_name(&self) -> String;

    fn to_sizes(&self, tx: &dyn Tx) -> Result<Sizes>;
}
