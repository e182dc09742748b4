use crate::{
    codec::{fields, BaseCoder, Coder, Encoded, RefCoder, TagSet},
    data::{CheckStatus, RpkiRepository, TrustAnchor},
    data::{RunKind, RunStatus, RunType, ValidationCheck, ValidationRun},
    Result,
};

pub struct ValidationCheckCoder {
    location: u16,
    status: u16,
    key: u16,
    parameters: u16,
}

impl ValidationCheckCoder {
    pub fn new() -> Result<ValidationCheckCoder> {
        let mut tags = TagSet::new("validation-check");
        let val = ValidationCheckCoder {
            location: tags.unique(101)?,
            status: tags.unique(102)?,
            key: tags.unique(103)?,
            parameters: tags.unique(104)?,
        };
        Ok(val)
    }
}

impl Coder<ValidationCheck> for ValidationCheckCoder {
    fn encode(&self, check: &ValidationCheck) -> Result<Vec<u8>> {
        let mut enc = Encoded::new();
        enc.append(self.location, fields::encode_str(&check.location))
            .append(self.status, fields::encode_str(check.status.as_str()))
            .append(self.key, fields::encode_str(&check.key))
            .append(self.parameters, fields::encode_str_list(check.parameters.iter())?);
        enc.to_bytes()
    }

    fn decode(&self, buf: &[u8]) -> Result<ValidationCheck> {
        let enc = Encoded::from_bytes(buf)?;
        let status = fields::decode_str(enc.required(self.status, "check-status")?)?;
        let val = ValidationCheck {
            location: fields::decode_str(enc.required(self.location, "check-location")?)?,
            status: status.parse::<CheckStatus>()?,
            key: fields::decode_str(enc.required(self.key, "check-key")?)?,
            parameters: enc
                .map_opt(self.parameters, fields::decode_str_list)?
                .unwrap_or_default(),
        };
        Ok(val)
    }
}

/// Coder for all variants of validation run. The variant is identified
/// by its run type, and its payload is kept under a variant specific tag.
pub struct ValidationRunCoder {
    base: BaseCoder,
    completed_at: u16,
    checks: u16,
    status: u16,
    run_type: u16,
    ct_trust_anchor: u16,
    ta_trust_anchor: u16,
    rrdp_repository: u16,
    check_coder: ValidationCheckCoder,
    ta_ref_coder: RefCoder<TrustAnchor>,
    repo_ref_coder: RefCoder<RpkiRepository>,
}

impl ValidationRunCoder {
    pub fn new() -> Result<ValidationRunCoder> {
        let mut tags = TagSet::new("validation-run");
        let val = ValidationRunCoder {
            base: BaseCoder::new(&mut tags)?,
            ct_trust_anchor: tags.unique(81)?,
            ta_trust_anchor: tags.unique(82)?,
            rrdp_repository: tags.unique(91)?,
            completed_at: tags.unique(121)?,
            checks: tags.unique(122)?,
            status: tags.unique(123)?,
            run_type: tags.unique(124)?,
            check_coder: ValidationCheckCoder::new()?,
            ta_ref_coder: RefCoder::new()?,
            repo_ref_coder: RefCoder::new()?,
        };
        Ok(val)
    }
}

impl Coder<ValidationRun> for ValidationRunCoder {
    fn encode(&self, run: &ValidationRun) -> Result<Vec<u8>> {
        let checks = {
            let coder = &self.check_coder;
            fields::encode_list(run.checks.iter(), |c| coder.encode(c))?
        };

        let mut enc = Encoded::new();
        self.base.encode(&run.base, &mut enc);
        enc.append(self.run_type, fields::encode_str(run.to_run_type().as_str()))
            .append(self.status, fields::encode_str(run.status.as_str()))
            .append_opt(self.completed_at, run.completed_at.as_ref(), fields::encode_time)
            .append(self.checks, checks);

        match &run.kind {
            RunKind::CertificateTree { trust_anchor } => {
                enc.append(self.ct_trust_anchor, self.ta_ref_coder.encode(trust_anchor)?);
            }
            RunKind::TrustAnchor { trust_anchor } => {
                enc.append(self.ta_trust_anchor, self.ta_ref_coder.encode(trust_anchor)?);
            }
            RunKind::RrdpRepository { rpki_repository } => {
                let data = self.repo_ref_coder.encode(rpki_repository)?;
                enc.append(self.rrdp_repository, data);
            }
            RunKind::RsyncRepository => (),
        }

        enc.to_bytes()
    }

    fn decode(&self, buf: &[u8]) -> Result<ValidationRun> {
        let enc = Encoded::from_bytes(buf)?;

        let run_type = {
            let buf = enc.required(self.run_type, "run-type")?;
            fields::decode_str(buf)?.parse::<RunType>()?
        };
        let kind = match run_type {
            RunType::CertificateTree => {
                let buf = enc.required(self.ct_trust_anchor, "ct-trust-anchor")?;
                let trust_anchor = self.ta_ref_coder.decode(buf)?;
                RunKind::CertificateTree { trust_anchor }
            }
            RunType::TrustAnchor => {
                let buf = enc.required(self.ta_trust_anchor, "ta-trust-anchor")?;
                let trust_anchor = self.ta_ref_coder.decode(buf)?;
                RunKind::TrustAnchor { trust_anchor }
            }
            RunType::RrdpRepository => {
                let buf = enc.required(self.rrdp_repository, "rrdp-repository")?;
                let rpki_repository = self.repo_ref_coder.decode(buf)?;
                RunKind::RrdpRepository { rpki_repository }
            }
            RunType::RsyncRepository => RunKind::RsyncRepository,
        };
        let status = match enc.map_opt(self.status, fields::decode_str)? {
            Some(s) => s.parse::<RunStatus>()?,
            None => RunStatus::Running,
        };
        let checks = {
            let coder = &self.check_coder;
            enc.map_opt(self.checks, |buf| {
                fields::decode_list(buf, |item| coder.decode(item))
            })?
            .unwrap_or_default()
        };

        let val = ValidationRun {
            base: self.base.decode(&enc)?,
            kind,
            status,
            completed_at: enc.map_opt(self.completed_at, fields::decode_time)?,
            checks,
        };
        Ok(val)
    }
}
