use std::sync::Arc;

use crate::{codec::U64Coder, store::Indexes, IxMap, Key, Result, Storage, Tx, WriteTx};

pub const SEQUENCES: &str = "sequences";

/// Named, monotonically increasing counters, used to allocate primary
/// keys. A fresh sequence hands out 1 first.
pub struct Sequences {
    map: Arc<IxMap<u64>>,
}

impl Sequences {
    pub fn new(storage: &Storage) -> Result<Sequences> {
        let map = storage.create_ix_map::<u64>(SEQUENCES, Indexes::new(), Arc::new(U64Coder))?;
        Ok(Sequences { map })
    }

    /// Advance sequence `name` and return its new value.
    pub fn next(&self, tx: &mut WriteTx, name: &str) -> Result<u64> {
        let key = Key::from(name);
        let value = match self.map.get(tx, &key)? {
            Some(value) => match value.checked_add(1) {
                Some(value) => value,
                None => return err_at!(Fatal, msg: "sequence {} overflow", name),
            },
            None => 1,
        };
        self.map.put(tx, &key, &value)?;
        Ok(value)
    }

    /// Last value handed out by sequence `name`.
    pub fn current(&self, tx: &dyn Tx, name: &str) -> Result<Option<u64>> {
        self.map.get(tx, &Key::from(name))
    }
}
