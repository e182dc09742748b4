use std::collections::BTreeMap;

use crate::{
    codec::{fields, BaseCoder, Coder, Encoded, RefCoder, TagSet},
    data::{RepositoryStatus, RepositoryType, RpkiRepository, TrustAnchor},
    util, Result,
};

pub struct RpkiRepositoryCoder {
    base: BaseCoder,
    repository_type: u16,
    rrdp_notify_uri: u16,
    rsync_repository_uri: u16,
    status: u16,
    rrdp_serial: u16,
    rrdp_session_id: u16,
    last_downloaded_at: u16,
    parent_repository: u16,
    trust_anchor_refs: u16,
    trust_anchor_times: u16,
    ta_ref_coder: RefCoder<TrustAnchor>,
    repo_ref_coder: RefCoder<RpkiRepository>,
}

impl RpkiRepositoryCoder {
    pub fn new() -> Result<RpkiRepositoryCoder> {
        let mut tags = TagSet::new("rpki-repository");
        let val = RpkiRepositoryCoder {
            base: BaseCoder::new(&mut tags)?,
            repository_type: tags.unique(51)?,
            rrdp_notify_uri: tags.unique(52)?,
            rsync_repository_uri: tags.unique(53)?,
            status: tags.unique(54)?,
            rrdp_serial: tags.unique(55)?,
            rrdp_session_id: tags.unique(56)?,
            last_downloaded_at: tags.unique(57)?,
            parent_repository: tags.unique(58)?,
            trust_anchor_refs: tags.unique(59)?,
            trust_anchor_times: tags.unique(60)?,
            ta_ref_coder: RefCoder::new()?,
            repo_ref_coder: RefCoder::new()?,
        };
        Ok(val)
    }
}

impl Coder<RpkiRepository> for RpkiRepositoryCoder {
    fn encode(&self, repo: &RpkiRepository) -> Result<Vec<u8>> {
        let (refs, times) = {
            let coder = &self.ta_ref_coder;
            let refs = fields::encode_list(repo.trust_anchors.keys(), |r| coder.encode(r))?;
            let times = fields::encode_list(repo.trust_anchors.values(), |t| {
                Ok(fields::encode_time(t))
            })?;
            (refs, times)
        };
        let parent = match repo.parent_repository.as_ref() {
            Some(parent) => Some(self.repo_ref_coder.encode(parent)?),
            None => None,
        };

        let mut enc = Encoded::new();
        self.base.encode(&repo.base, &mut enc);
        enc.append(
            self.repository_type,
            fields::encode_str(repo.repository_type.as_str()),
        )
        .append_opt(
            self.rrdp_notify_uri,
            repo.rrdp_notify_uri.as_deref(),
            fields::encode_str,
        )
        .append_opt(
            self.rsync_repository_uri,
            repo.rsync_repository_uri.as_deref(),
            fields::encode_str,
        )
        .append(self.status, fields::encode_str(repo.status.as_str()))
        .append_opt(self.rrdp_serial, repo.rrdp_serial, fields::encode_u64)
        .append_opt(
            self.rrdp_session_id,
            repo.rrdp_session_id.as_deref(),
            fields::encode_str,
        )
        .append_opt(
            self.last_downloaded_at,
            repo.last_downloaded_at.as_ref(),
            fields::encode_time,
        )
        .append_opt(self.parent_repository, parent, |p| p)
        .append(self.trust_anchor_refs, refs)
        .append(self.trust_anchor_times, times);
        enc.to_bytes()
    }

    fn decode(&self, buf: &[u8]) -> Result<RpkiRepository> {
        let enc = Encoded::from_bytes(buf)?;

        let repository_type = {
            let buf = enc.required(self.repository_type, "repository-type")?;
            fields::decode_str(buf)?.parse::<RepositoryType>()?
        };
        let status = match enc.map_opt(self.status, fields::decode_str)? {
            Some(s) => s.parse::<RepositoryStatus>()?,
            None => RepositoryStatus::Pending,
        };
        let parent_repository = {
            let coder = &self.repo_ref_coder;
            enc.map_opt(self.parent_repository, |buf| coder.decode(buf))?
        };

        let trust_anchors = {
            let coder = &self.ta_ref_coder;
            let refs = enc
                .map_opt(self.trust_anchor_refs, |buf| {
                    fields::decode_list(buf, |item| coder.decode(item))
                })?
                .unwrap_or_default();
            let times = enc
                .map_opt(self.trust_anchor_times, |buf| {
                    fields::decode_list(buf, fields::decode_time)
                })?
                .unwrap_or_default();

            if refs.len() == times.len() {
                refs.into_iter().zip(times.into_iter()).collect()
            } else {
                let now = util::now();
                refs.into_iter().map(|r| (r, now)).collect::<BTreeMap<_, _>>()
            }
        };

        let val = RpkiRepository {
            base: self.base.decode(&enc)?,
            repository_type,
            status,
            rrdp_notify_uri: enc.map_opt(self.rrdp_notify_uri, fields::decode_str)?,
            rsync_repository_uri: enc.map_opt(self.rsync_repository_uri, fields::decode_str)?,
            rrdp_session_id: enc.map_opt(self.rrdp_session_id, fields::decode_str)?,
            rrdp_serial: enc.map_opt(self.rrdp_serial, fields::decode_u64)?,
            last_downloaded_at: enc.map_opt(self.last_downloaded_at, fields::decode_time)?,
            parent_repository,
            trust_anchors,
        };
        Ok(val)
    }
}
