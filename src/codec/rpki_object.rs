use std::{
    collections::BTreeSet,
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
};

use crate::{
    codec::{fields, BaseCoder, Coder, Encoded, TagSet},
    data::{ObjectType, RoaPrefix, RpkiObject},
    Result,
};

pub struct RoaPrefixCoder {
    prefix: u16,
    asn: u16,
    max_length: u16,
    not_before: u16,
    not_after: u16,
    serial: u16,
}

impl RoaPrefixCoder {
    pub fn new() -> Result<RoaPrefixCoder> {
        let mut tags = TagSet::new("roa-prefix");
        let val = RoaPrefixCoder {
            prefix: tags.unique(21)?,
            asn: tags.unique(22)?,
            max_length: tags.unique(23)?,
            not_before: tags.unique(24)?,
            not_after: tags.unique(25)?,
            serial: tags.unique(26)?,
        };
        Ok(val)
    }
}

// address octets followed by prefix length.
fn encode_prefix(addr: &IpAddr, length: u8) -> Vec<u8> {
    let mut buf = match addr {
        IpAddr::V4(addr) => addr.octets().to_vec(),
        IpAddr::V6(addr) => addr.octets().to_vec(),
    };
    buf.push(length);
    buf
}

fn decode_prefix(buf: &[u8]) -> Result<(IpAddr, u8)> {
    match buf.len() {
        5 => {
            let addr = Ipv4Addr::new(buf[0], buf[1], buf[2], buf[3]);
            Ok((IpAddr::V4(addr), buf[4]))
        }
        17 => {
            let mut octets = [0_u8; 16];
            octets.copy_from_slice(&buf[..16]);
            Ok((IpAddr::V6(Ipv6Addr::from(octets)), buf[16]))
        }
        n => err_at!(DecodeFail, msg: "invalid prefix of {} bytes", n),
    }
}

impl Coder<RoaPrefix> for RoaPrefixCoder {
    fn encode(&self, p: &RoaPrefix) -> Result<Vec<u8>> {
        let mut enc = Encoded::new();
        enc.append(self.prefix, encode_prefix(&p.prefix, p.prefix_length))
            .append(self.asn, fields::encode_u32(p.asn))
            .append_opt(self.max_length, p.max_length, |n| vec![n])
            .append(self.not_before, fields::encode_i64(p.not_before))
            .append(self.not_after, fields::encode_i64(p.not_after))
            .append_opt(self.serial, p.serial.as_ref(), |s| s.to_vec());
        enc.to_bytes()
    }

    fn decode(&self, buf: &[u8]) -> Result<RoaPrefix> {
        let enc = Encoded::from_bytes(buf)?;
        let (prefix, prefix_length) = decode_prefix(enc.required(self.prefix, "prefix")?)?;
        let max_length = match enc.get(self.max_length) {
            Some([n]) => Some(*n),
            Some(b) => return err_at!(DecodeFail, msg: "invalid max-length {:?}", b),
            None => None,
        };
        let val = RoaPrefix {
            prefix,
            prefix_length,
            asn: fields::decode_u32(enc.required(self.asn, "asn")?)?,
            max_length,
            not_before: enc.map_opt(self.not_before, fields::decode_i64)?.unwrap_or(0),
            not_after: enc.map_opt(self.not_after, fields::decode_i64)?.unwrap_or(0),
            serial: enc.get(self.serial).map(|s| s.to_vec()),
        };
        Ok(val)
    }
}

pub struct RpkiObjectCoder {
    base: BaseCoder,
    object_type: u16,
    sha256: u16,
    authority_key_identifier: u16,
    last_marked_reachable_at: u16,
    serial_number: u16,
    encoded: u16,
    signing_time: u16,
    locations: u16,
    roa_prefixes: u16,
    roa_prefix_coder: RoaPrefixCoder,
}

impl RpkiObjectCoder {
    pub fn new() -> Result<RpkiObjectCoder> {
        let mut tags = TagSet::new("rpki-object");
        let val = RpkiObjectCoder {
            base: BaseCoder::new(&mut tags)?,
            object_type: tags.unique(31)?,
            sha256: tags.unique(32)?,
            authority_key_identifier: tags.unique(33)?,
            last_marked_reachable_at: tags.unique(34)?,
            serial_number: tags.unique(35)?,
            encoded: tags.unique(36)?,
            signing_time: tags.unique(37)?,
            locations: tags.unique(38)?,
            roa_prefixes: tags.unique(39)?,
            roa_prefix_coder: RoaPrefixCoder::new()?,
        };
        Ok(val)
    }
}

impl Coder<RpkiObject> for RpkiObjectCoder {
    fn encode(&self, obj: &RpkiObject) -> Result<Vec<u8>> {
        let roa_prefixes = {
            let coder = &self.roa_prefix_coder;
            fields::encode_list(obj.roa_prefixes.iter(), |p| coder.encode(p))?
        };

        let mut enc = Encoded::new();
        self.base.encode(&obj.base, &mut enc);
        enc.append(self.object_type, fields::encode_str(obj.object_type.as_str()))
            .append(self.sha256, obj.sha256.to_vec())
            .append_opt(
                self.authority_key_identifier,
                obj.authority_key_identifier.as_ref(),
                |aki| aki.to_vec(),
            )
            .append_opt(
                self.last_marked_reachable_at,
                obj.last_marked_reachable_at.as_ref(),
                fields::encode_time,
            )
            .append_opt(self.serial_number, obj.serial_number.as_ref(), |s| s.to_vec())
            .append(self.encoded, obj.encoded.to_vec())
            .append_opt(self.signing_time, obj.signing_time.as_ref(), fields::encode_time)
            .append(self.locations, fields::encode_str_list(obj.locations.iter())?)
            .append(self.roa_prefixes, roa_prefixes);
        enc.to_bytes()
    }

    fn decode(&self, buf: &[u8]) -> Result<RpkiObject> {
        let enc = Encoded::from_bytes(buf)?;

        let object_type = {
            let s = fields::decode_str(enc.required(self.object_type, "object-type")?)?;
            s.parse::<ObjectType>()?
        };
        let locations: BTreeSet<String> = enc
            .map_opt(self.locations, fields::decode_str_list)?
            .unwrap_or_default()
            .into_iter()
            .collect();
        let roa_prefixes = {
            let coder = &self.roa_prefix_coder;
            enc.map_opt(self.roa_prefixes, |buf| {
                fields::decode_list(buf, |item| coder.decode(item))
            })?
            .unwrap_or_default()
        };

        let val = RpkiObject {
            base: self.base.decode(&enc)?,
            object_type,
            sha256: enc.required(self.sha256, "sha256")?.to_vec(),
            authority_key_identifier: enc
                .get(self.authority_key_identifier)
                .map(|aki| aki.to_vec()),
            serial_number: enc.get(self.serial_number).map(|s| s.to_vec()),
            signing_time: enc.map_opt(self.signing_time, fields::decode_time)?,
            encoded: enc.required(self.encoded, "encoded")?.to_vec(),
            locations,
            roa_prefixes,
            last_marked_reachable_at: enc
                .map_opt(self.last_marked_reachable_at, fields::decode_time)?,
        };
        Ok(val)
    }
}
