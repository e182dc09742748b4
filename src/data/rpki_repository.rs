use chrono::{DateTime, Utc};

use std::{collections::BTreeMap, fmt, str::FromStr};

use crate::{
    data::{Base, Ref, TrustAnchor},
    Error, Key, Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RepositoryType {
    Rrdp,
    Rsync,
    /// Repository discovered through a trust anchor's rsync prefetch uri.
    RsyncPrefetch,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RepositoryStatus {
    Pending,
    Failed,
    Downloaded,
}

/// Publication point, reachable over RRDP or rsync, referenced by one or
/// more trust anchors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RpkiRepository {
    pub base: Base,
    pub repository_type: RepositoryType,
    pub status: RepositoryStatus,
    pub rrdp_notify_uri: Option<String>,
    pub rsync_repository_uri: Option<String>,
    pub rrdp_session_id: Option<String>,
    pub rrdp_serial: Option<u64>,
    pub last_downloaded_at: Option<DateTime<Utc>>,
    pub parent_repository: Option<Ref<RpkiRepository>>,
    /// Trust anchors referencing this repository, along with the time
    /// they last referenced it.
    pub trust_anchors: BTreeMap<Ref<TrustAnchor>, DateTime<Utc>>,
}

impl RpkiRepository {
    pub fn new(repository_type: RepositoryType, uri: &str) -> RpkiRepository {
        let (rrdp_notify_uri, rsync_repository_uri) = match repository_type {
            RepositoryType::Rrdp => (Some(uri.to_string()), None),
            _ => (None, Some(uri.to_string())),
        };
        RpkiRepository {
            base: Base::new(),
            repository_type,
            status: RepositoryStatus::Pending,
            rrdp_notify_uri,
            rsync_repository_uri,
            rrdp_session_id: None,
            rrdp_serial: None,
            last_downloaded_at: None,
            parent_repository: None,
            trust_anchors: BTreeMap::default(),
        }
    }

    pub fn key(&self) -> Option<&Key> {
        self.base.key.as_ref()
    }

    /// Uri identifying this repository, notify uri for RRDP and
    /// repository uri for rsync.
    pub fn location_uri(&self) -> Option<&str> {
        match self.repository_type {
            RepositoryType::Rrdp => self.rrdp_notify_uri.as_deref(),
            _ => self.rsync_repository_uri.as_deref(),
        }
    }

    /// Record that `ta` referenced this repository at `now`.
    pub fn add_trust_anchor(&mut self, ta: Ref<TrustAnchor>, now: DateTime<Utc>) {
        self.trust_anchors.insert(ta, now);
    }

    pub fn remove_trust_anchor(&mut self, ta: &Ref<TrustAnchor>) -> bool {
        self.trust_anchors.remove(ta).is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.status == RepositoryStatus::Pending
    }

    pub fn is_downloaded(&self) -> bool {
        self.status == RepositoryStatus::Downloaded
    }

    pub fn set_downloaded(&mut self, now: DateTime<Utc>) {
        self.status = RepositoryStatus::Downloaded;
        self.last_downloaded_at = Some(now);
    }

    pub fn set_failed(&mut self) {
        self.status = RepositoryStatus::Failed;
    }
}

impl RepositoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepositoryType::Rrdp => "RRDP",
            RepositoryType::Rsync => "RSYNC",
            RepositoryType::RsyncPrefetch => "RSYNC_PREFETCH",
        }
    }
}

impl fmt::Display for RepositoryType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RepositoryType {
    type Err = Error;

    fn from_str(s: &str) -> Result<RepositoryType> {
        match s {
            "RRDP" => Ok(RepositoryType::Rrdp),
            "RSYNC" => Ok(RepositoryType::Rsync),
            "RSYNC_PREFETCH" => Ok(RepositoryType::RsyncPrefetch),
            _ => err_at!(DecodeFail, msg: "invalid repository type {:?}", s),
        }
    }
}

impl RepositoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepositoryStatus::Pending => "PENDING",
            RepositoryStatus::Failed => "FAILED",
            RepositoryStatus::Downloaded => "DOWNLOADED",
        }
    }
}

impl FromStr for RepositoryStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<RepositoryStatus> {
        match s {
            "PENDING" => Ok(RepositoryStatus::Pending),
            "FAILED" => Ok(RepositoryStatus::Failed),
            "DOWNLOADED" => Ok(RepositoryStatus::Downloaded),
            _ => err_at!(DecodeFail, msg: "invalid repository status {:?}", s),
        }
    }
}
