use crate::{
    codec::{fields, BaseCoder, Coder, Encoded, TagSet},
    data::TrustAnchor,
    Result,
};

pub struct TrustAnchorCoder {
    base: BaseCoder,
    name: u16,
    rsync_prefetch_uri: u16,
    encoded_certificate: u16,
    locations: u16,
    subject_public_key_info: u16,
    preconfigured: u16,
    initial_validation_done: u16,
}

impl TrustAnchorCoder {
    pub fn new() -> Result<TrustAnchorCoder> {
        let mut tags = TagSet::new("trust-anchor");
        let val = TrustAnchorCoder {
            base: BaseCoder::new(&mut tags)?,
            name: tags.unique(71)?,
            rsync_prefetch_uri: tags.unique(72)?,
            encoded_certificate: tags.unique(73)?,
            locations: tags.unique(74)?,
            subject_public_key_info: tags.unique(75)?,
            preconfigured: tags.unique(76)?,
            initial_validation_done: tags.unique(77)?,
        };
        Ok(val)
    }
}

impl Coder<TrustAnchor> for TrustAnchorCoder {
    fn encode(&self, ta: &TrustAnchor) -> Result<Vec<u8>> {
        let mut enc = Encoded::new();
        self.base.encode(&ta.base, &mut enc);
        enc.append(self.name, fields::encode_str(&ta.name))
            .append_opt(
                self.rsync_prefetch_uri,
                ta.rsync_prefetch_uri.as_deref(),
                fields::encode_str,
            )
            .append_opt(
                self.encoded_certificate,
                ta.encoded_certificate.as_ref(),
                |c| c.to_vec(),
            )
            .append(self.locations, fields::encode_str_list(ta.locations.iter())?)
            .append_opt(
                self.subject_public_key_info,
                ta.subject_public_key_info.as_deref(),
                fields::encode_str,
            )
            .append(self.preconfigured, fields::encode_bool(ta.preconfigured))
            .append(
                self.initial_validation_done,
                fields::encode_bool(ta.initial_certificate_tree_validation_done),
            );
        enc.to_bytes()
    }

    fn decode(&self, buf: &[u8]) -> Result<TrustAnchor> {
        let enc = Encoded::from_bytes(buf)?;
        let val = TrustAnchor {
            base: self.base.decode(&enc)?,
            name: fields::decode_str(enc.required(self.name, "trust-anchor-name")?)?,
            locations: enc
                .map_opt(self.locations, fields::decode_str_list)?
                .unwrap_or_default(),
            subject_public_key_info: enc
                .map_opt(self.subject_public_key_info, fields::decode_str)?,
            rsync_prefetch_uri: enc.map_opt(self.rsync_prefetch_uri, fields::decode_str)?,
            encoded_certificate: enc.get(self.encoded_certificate).map(|c| c.to_vec()),
            preconfigured: enc
                .map_opt(self.preconfigured, fields::decode_bool)?
                .unwrap_or(false),
            initial_certificate_tree_validation_done: enc
                .map_opt(self.initial_validation_done, fields::decode_bool)?
                .unwrap_or(false),
        };
        Ok(val)
    }
}
