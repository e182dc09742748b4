//! Module define the records kept in storage.

use chrono::{DateTime, Utc};

use crate::{util, Key};

mod reference;
mod rpki_object;
mod rpki_repository;
mod trust_anchor;
mod validation;

pub use reference::Ref;
pub use rpki_object::{ManifestEntry, ObjectType, RoaPrefix, RpkiObject};
pub use rpki_repository::{RepositoryStatus, RepositoryType, RpkiRepository};
pub use trust_anchor::TrustAnchor;
pub use validation::{CheckStatus, RunKind, RunStatus, RunType, ValidationCheck};
pub use validation::ValidationRun;

/// Fields common to all records.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Base {
    /// Primary key, assigned when the record is added to its store.
    pub key: Option<Key>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Base {
    fn default() -> Base {
        Base::new()
    }
}

impl Base {
    pub fn new() -> Base {
        let now = util::now();
        Base {
            key: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Refresh the updated-at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = util::now();
    }
}
