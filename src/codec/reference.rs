use std::marker;

use crate::{
    codec::{fields, Encoded, TagSet},
    data::Ref,
    Key, Result,
};

/// Coder for typed references, a reference is encoded as a nested
/// [Encoded] value holding the map name and the key.
pub struct RefCoder<T> {
    map_name: u16,
    key: u16,
    _value: marker::PhantomData<fn() -> T>,
}

impl<T> RefCoder<T> {
    pub fn new() -> Result<RefCoder<T>> {
        let mut tags = TagSet::new("ref");
        let val = RefCoder {
            map_name: tags.unique(11)?,
            key: tags.unique(12)?,
            _value: marker::PhantomData,
        };
        Ok(val)
    }

    pub fn encode(&self, value: &Ref<T>) -> Result<Vec<u8>> {
        let mut enc = Encoded::new();
        enc.append(self.map_name, fields::encode_str(value.map_name()));
        enc.append(self.key, value.key().as_bytes().to_vec());
        enc.to_bytes()
    }

    pub fn decode(&self, buf: &[u8]) -> Result<Ref<T>> {
        let enc = Encoded::from_bytes(buf)?;
        let map_name = fields::decode_str(enc.required(self.map_name, "ref-map-name")?)?;
        let key = Key::from_bytes(enc.required(self.key, "ref-key")?);
        Ok(Ref::unchecked(&map_name, key))
    }
}
