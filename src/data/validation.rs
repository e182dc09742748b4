use chrono::{DateTime, Utc};

use std::{fmt, str::FromStr};

use crate::{
    data::{Base, Ref, RpkiRepository, TrustAnchor},
    Error, Key, Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CheckStatus {
    Warning,
    Error,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Warning => "WARNING",
            CheckStatus::Error => "ERROR",
        }
    }
}

impl FromStr for CheckStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<CheckStatus> {
        match s {
            "WARNING" => Ok(CheckStatus::Warning),
            "ERROR" => Ok(CheckStatus::Error),
            _ => err_at!(DecodeFail, msg: "invalid check status {:?}", s),
        }
    }
}

/// Finding reported while validating an object at `location`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationCheck {
    pub location: String,
    pub status: CheckStatus,
    pub key: String,
    pub parameters: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Succeeded => "SUCCEEDED",
            RunStatus::Failed => "FAILED",
        }
    }
}

impl FromStr for RunStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<RunStatus> {
        match s {
            "RUNNING" => Ok(RunStatus::Running),
            "SUCCEEDED" => Ok(RunStatus::Succeeded),
            "FAILED" => Ok(RunStatus::Failed),
            _ => err_at!(DecodeFail, msg: "invalid run status {:?}", s),
        }
    }
}

/// Kind of validation run, without its payload. Each run type is kept
/// in its own map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RunType {
    CertificateTree,
    TrustAnchor,
    RrdpRepository,
    RsyncRepository,
}

impl RunType {
    pub const ALL: [RunType; 4] = [
        RunType::CertificateTree,
        RunType::TrustAnchor,
        RunType::RrdpRepository,
        RunType::RsyncRepository,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RunType::CertificateTree => "certificate-tree",
            RunType::TrustAnchor => "trust-anchor",
            RunType::RrdpRepository => "rrdp-repository",
            RunType::RsyncRepository => "rsync-repository",
        }
    }

    /// Name of the map holding runs of this type.
    pub fn to_map_name(&self) -> String {
        format!("{}-validation-runs", self.as_str())
    }
}

impl fmt::Display for RunType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RunType {
    type Err = Error;

    fn from_str(s: &str) -> Result<RunType> {
        match s {
            "certificate-tree" => Ok(RunType::CertificateTree),
            "trust-anchor" => Ok(RunType::TrustAnchor),
            "rrdp-repository" => Ok(RunType::RrdpRepository),
            "rsync-repository" => Ok(RunType::RsyncRepository),
            _ => err_at!(DecodeFail, msg: "invalid run type {:?}", s),
        }
    }
}

/// Variant specific payload for a validation run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunKind {
    CertificateTree { trust_anchor: Ref<TrustAnchor> },
    TrustAnchor { trust_anchor: Ref<TrustAnchor> },
    RrdpRepository { rpki_repository: Ref<RpkiRepository> },
    RsyncRepository,
}

impl RunKind {
    pub fn to_run_type(&self) -> RunType {
        match self {
            RunKind::CertificateTree { .. } => RunType::CertificateTree,
            RunKind::TrustAnchor { .. } => RunType::TrustAnchor,
            RunKind::RrdpRepository { .. } => RunType::RrdpRepository,
            RunKind::RsyncRepository => RunType::RsyncRepository,
        }
    }

    /// Trust anchor this run validated, if any.
    pub fn trust_anchor(&self) -> Option<&Ref<TrustAnchor>> {
        match self {
            RunKind::CertificateTree { trust_anchor } => Some(trust_anchor),
            RunKind::TrustAnchor { trust_anchor } => Some(trust_anchor),
            RunKind::RrdpRepository { .. } | RunKind::RsyncRepository => None,
        }
    }

    pub fn rpki_repository(&self) -> Option<&Ref<RpkiRepository>> {
        match self {
            RunKind::RrdpRepository { rpki_repository } => Some(rpki_repository),
            _ => None,
        }
    }
}

/// Record of a single validation pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationRun {
    pub base: Base,
    pub kind: RunKind,
    pub status: RunStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub checks: Vec<ValidationCheck>,
}

impl ValidationRun {
    pub fn new(kind: RunKind) -> ValidationRun {
        ValidationRun {
            base: Base::new(),
            kind,
            status: RunStatus::Running,
            completed_at: None,
            checks: Vec::default(),
        }
    }

    pub fn key(&self) -> Option<&Key> {
        self.base.key.as_ref()
    }

    pub fn to_run_type(&self) -> RunType {
        self.kind.to_run_type()
    }

    pub fn is_succeeded(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    /// Mark this run as complete, succeeded if no check reported an
    /// error.
    pub fn complete(&mut self, now: DateTime<Utc>) {
        let failed = self.checks.iter().any(|c| c.status == CheckStatus::Error);
        self.status = if failed {
            RunStatus::Failed
        } else {
            RunStatus::Succeeded
        };
        self.completed_at = Some(now);
    }

    /// Mark this run as failed, irrespective of its checks.
    pub fn fail(&mut self, now: DateTime<Utc>) {
        self.status = RunStatus::Failed;
        self.completed_at = Some(now);
    }

    /// True if this run completed before `t`, for runs that are not
    /// completed use their last update or creation time.
    pub fn is_older_than(&self, t: &DateTime<Utc>) -> bool {
        match &self.completed_at {
            Some(completed_at) => completed_at < t,
            None => &self.base.updated_at < t || &self.base.created_at < t,
        }
    }
}
