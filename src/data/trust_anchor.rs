use crate::{data::Base, Key};

/// Configured root of trust.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrustAnchor {
    pub base: Base,
    pub name: String,
    /// Locations, rsync or https, to fetch the trust anchor certificate.
    pub locations: Vec<String>,
    pub subject_public_key_info: Option<String>,
    pub rsync_prefetch_uri: Option<String>,
    /// DER encoded trust anchor certificate, once it is fetched.
    pub encoded_certificate: Option<Vec<u8>>,
    pub preconfigured: bool,
    pub initial_certificate_tree_validation_done: bool,
}

impl TrustAnchor {
    pub fn new(name: &str, locations: Vec<String>) -> TrustAnchor {
        TrustAnchor {
            base: Base::new(),
            name: name.to_string(),
            locations,
            ..TrustAnchor::default()
        }
    }

    pub fn key(&self) -> Option<&Key> {
        self.base.key.as_ref()
    }
}
