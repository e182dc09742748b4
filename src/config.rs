//! Configuration for storage and retention services.

use chrono::Duration;
use serde::Deserialize;

use std::{env, ffi, path};

use crate::{util, Result};

/// Default LMDB map size, 4GB.
pub const MAP_SIZE: usize = 4 * 1024 * 1024 * 1024;
/// Default maximum number of tables within a storage.
pub const MAX_DBS: u32 = 256;
/// Default maximum number of concurrent read transactions.
pub const MAX_READERS: u32 = 126;
/// Default grace period for unreachable rpki objects, `P7D`.
pub const RPKI_OBJECT_GRACE: &str = "P7D";
/// Default grace period for unreferenced repositories, `P7D`.
pub const RPKI_REPOSITORY_GRACE: &str = "P7D";
/// Default retention for validation runs, `PT6H`.
pub const VALIDATION_RUN_GRACE: &str = "PT6H";
/// Default depth limit while tracing the object graph.
pub const MARK_MAX_DEPTH: usize = 64;

/// Configuration for [Storage] and the [cleanup] services.
///
/// [Storage]: crate::Storage
/// [cleanup]: crate::cleanup
#[derive(Clone, Debug)]
pub struct Config {
    /// Directory under which storage files are kept.
    pub dir: ffi::OsString,
    /// Name of storage, files are kept under `dir/name`.
    pub name: String,
    /// Maximum size of the LMDB memory map.
    ///
    /// Default: [MAP_SIZE]
    pub map_size: usize,
    /// Default: [MAX_DBS]
    pub max_dbs: u32,
    /// Default: [MAX_READERS]
    pub max_readers: u32,
    /// Flush to disk on every commit.
    ///
    /// Default: true
    pub fsync: bool,
    /// Rpki objects that are not reachable for this long are deleted.
    ///
    /// Default: [RPKI_OBJECT_GRACE]
    pub rpki_object_grace: Duration,
    /// Repositories not referenced by any trust anchor for this long are
    /// deleted.
    ///
    /// Default: [RPKI_REPOSITORY_GRACE]
    pub rpki_repository_grace: Duration,
    /// Validation runs older than this are deleted, except the latest
    /// successful ones.
    ///
    /// Default: [VALIDATION_RUN_GRACE]
    pub validation_run_grace: Duration,
    /// Default: [MARK_MAX_DEPTH]
    pub mark_max_depth: usize,
}

impl<'a> arbitrary::Arbitrary<'a> for Config {
    fn arbitrary(u: &mut arbitrary::Unstructured) -> arbitrary::Result<Self> {
        let name = format!("rpkidb-{}", u.arbitrary::<u32>()?);
        let dir = env::temp_dir().into_os_string();

        let map_size = *u.choose(&[1024 * 1024, 16 * 1024 * 1024, MAP_SIZE])?;
        let fsync: bool = u.arbitrary()?;
        let hours = *u.choose(&[0, 1, 6, 24, 7 * 24])?;
        let mark_max_depth = *u.choose(&[1, 8, MARK_MAX_DEPTH])?;

        let config = Config {
            dir,
            name,
            map_size,
            max_dbs: MAX_DBS,
            max_readers: MAX_READERS,
            fsync,
            rpki_object_grace: Duration::hours(hours),
            rpki_repository_grace: Duration::hours(hours),
            validation_run_grace: Duration::hours(hours),
            mark_max_depth,
        };
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Config {
        let dir = env::temp_dir().into_os_string();
        Config::new(&dir, "rpkidb")
    }
}

impl Config {
    /// Create a new configuration value, use the `set_*` methods to add more
    /// configuration.
    pub fn new(dir: &ffi::OsStr, name: &str) -> Config {
        Config {
            dir: dir.to_os_string(),
            name: name.to_string(),
            map_size: MAP_SIZE,
            max_dbs: MAX_DBS,
            max_readers: MAX_READERS,
            fsync: true,
            rpki_object_grace: Duration::days(7),
            rpki_repository_grace: Duration::days(7),
            validation_run_grace: Duration::hours(6),
            mark_max_depth: MARK_MAX_DEPTH,
        }
    }

    /// Load configuration from a toml file, refer [Profile] for the
    /// file format.
    pub fn from_toml<P>(loc: P) -> Result<Config>
    where
        P: AsRef<path::Path>,
    {
        let profile: Profile = util::files::load_toml(loc)?;
        profile.into_config()
    }

    /// Default configuration, overridden by environment variables
    /// `RPKIDB_DIR`, `RPKIDB_NAME`, `RPKIDB_OBJECT_GRACE`,
    /// `RPKIDB_REPOSITORY_GRACE` and `RPKIDB_VALIDATION_RUN_GRACE`.
    pub fn from_env() -> Result<Config> {
        let mut config = Config::default();
        if let Some(dir) = env::var_os("RPKIDB_DIR") {
            config.dir = dir;
        }
        if let Ok(name) = env::var("RPKIDB_NAME") {
            config.name = name;
        }
        if let Ok(val) = env::var("RPKIDB_OBJECT_GRACE") {
            config.set_rpki_object_grace(util::parse_duration(&val)?);
        }
        if let Ok(val) = env::var("RPKIDB_REPOSITORY_GRACE") {
            config.set_rpki_repository_grace(util::parse_duration(&val)?);
        }
        if let Ok(val) = env::var("RPKIDB_VALIDATION_RUN_GRACE") {
            config.set_validation_run_grace(util::parse_duration(&val)?);
        }
        Ok(config)
    }

    /// Set LMDB parameters.
    pub fn set_lmdb(&mut self, map_size: usize, max_dbs: u32, max_readers: u32) -> &mut Self {
        self.map_size = map_size;
        self.max_dbs = max_dbs;
        self.max_readers = max_readers;
        self
    }

    pub fn set_fsync(&mut self, fsync: bool) -> &mut Self {
        self.fsync = fsync;
        self
    }

    pub fn set_rpki_object_grace(&mut self, grace: Duration) -> &mut Self {
        self.rpki_object_grace = grace;
        self
    }

    pub fn set_rpki_repository_grace(&mut self, grace: Duration) -> &mut Self {
        self.rpki_repository_grace = grace;
        self
    }

    pub fn set_validation_run_grace(&mut self, grace: Duration) -> &mut Self {
        self.validation_run_grace = grace;
        self
    }

    pub fn set_mark_max_depth(&mut self, depth: usize) -> &mut Self {
        self.mark_max_depth = depth;
        self
    }
}

/// Configuration file format. All fields are optional, durations are
/// ISO-8601 or humantime strings.
///
/// ```toml
/// dir = "/var/lib/rpki"
/// name = "validator"
/// fsync = true
/// rpki_object_grace = "P7D"
/// validation_run_grace = "PT6H"
/// ```
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Profile {
    dir: Option<String>,
    name: Option<String>,
    map_size: Option<usize>,
    max_dbs: Option<u32>,
    max_readers: Option<u32>,
    fsync: Option<bool>,
    rpki_object_grace: Option<String>,
    rpki_repository_grace: Option<String>,
    validation_run_grace: Option<String>,
    mark_max_depth: Option<usize>,
}

impl Profile {
    pub fn into_config(self) -> Result<Config> {
        let mut config = Config::default();
        if let Some(dir) = self.dir {
            config.dir = dir.into();
        }
        if let Some(name) = self.name {
            config.name = name;
        }
        config.map_size = self.map_size.unwrap_or(config.map_size);
        config.max_dbs = self.max_dbs.unwrap_or(config.max_dbs);
        config.max_readers = self.max_readers.unwrap_or(config.max_readers);
        config.fsync = self.fsync.unwrap_or(config.fsync);
        if let Some(val) = self.rpki_object_grace {
            config.rpki_object_grace = util::parse_duration(&val)?;
        }
        if let Some(val) = self.rpki_repository_grace {
            config.rpki_repository_grace = util::parse_duration(&val)?;
        }
        if let Some(val) = self.validation_run_grace {
            config.validation_run_grace = util::parse_duration(&val)?;
        }
        config.mark_max_depth = self.mark_max_depth.unwrap_or(config.mark_max_depth);

        if config.name.is_empty() {
            return err_at!(InvalidConfig, msg: "empty storage name");
        }
        Ok(config)
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
