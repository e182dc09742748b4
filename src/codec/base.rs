use crate::{
    codec::{fields, Encoded, TagSet},
    data::Base,
    util, Key, Result,
};

/// Coder for fields common to all records.
#[derive(Clone, Debug)]
pub struct BaseCoder {
    key: u16,
    created_at: u16,
    updated_at: u16,
}

impl BaseCoder {
    pub fn new(tags: &mut TagSet) -> Result<BaseCoder> {
        let val = BaseCoder {
            key: tags.unique(1)?,
            created_at: tags.unique(2)?,
            updated_at: tags.unique(3)?,
        };
        Ok(val)
    }

    pub fn encode(&self, base: &Base, enc: &mut Encoded) {
        enc.append_opt(self.key, base.key.as_ref(), |k| k.as_bytes().to_vec());
        enc.append(self.created_at, fields::encode_time(&base.created_at));
        enc.append(self.updated_at, fields::encode_time(&base.updated_at));
    }

    pub fn decode(&self, enc: &Encoded) -> Result<Base> {
        let created_at = enc.map_opt(self.created_at, fields::decode_time)?;
        let updated_at = enc.map_opt(self.updated_at, fields::decode_time)?;
        let val = Base {
            key: enc.get(self.key).map(Key::from_bytes),
            created_at: created_at.unwrap_or_else(util::epoch),
            updated_at: updated_at.or(created_at).unwrap_or_else(util::epoch),
        };
        Ok(val)
    }
}
