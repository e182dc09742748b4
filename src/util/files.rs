use serde::de::DeserializeOwned;

use std::{ffi, fs, path};

use crate::Result;

/// Load toml file and parse it into type `T`.
pub fn load_toml<P, T>(loc: P) -> Result<T>
where
    P: AsRef<path::Path>,
    T: DeserializeOwned,
{
    let loc = loc.as_ref();
    let text = err_at!(IOError, fs::read(loc), "reading {:?}", loc)?;
    let text = err_at!(FailConvert, std::str::from_utf8(&text), "{:?}", loc)?;
    err_at!(FailConvert, toml::from_str(text), "parsing {:?}", loc)
}

/// Create directory `dir`, along with its parents, if it does not exist.
pub fn ensure_dir(dir: &ffi::OsStr) -> Result<path::PathBuf> {
    let dir = path::Path::new(dir);
    if !dir.exists() {
        err_at!(IOError, fs::create_dir_all(dir), "create {:?}", dir)?;
    } else if !dir.is_dir() {
        return err_at!(InvalidFile, msg: "{:?} is not a directory", dir);
    }
    Ok(dir.to_path_buf())
}

/// Remove directory `dir` and all its content, missing directory is
/// not an error.
pub fn purge_dir(dir: &ffi::OsStr) -> Result<()> {
    let dir = path::Path::new(dir);
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => err_at!(IOError, msg: "remove {:?}: {}", dir, err),
    }
}

#[cfg(test)]
#[path = "files_test.rs"]
mod files_test;
