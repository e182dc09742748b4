use std::{error, fmt, result};

/// Type alias for Result return type, used by this package.
pub type Result<T> = result::Result<T, Error>;

/// Error variants that can be returned by this package's API.
///
/// Each variant carries a prefix, typically identifying the
/// error location, and a message.
#[derive(Clone, PartialEq)]
pub enum Error {
    Fatal(String, String),
    InvalidInput(String, String),
    InvalidConfig(String, String),
    InvalidFile(String, String),
    IOError(String, String),
    FailConvert(String, String),
    FailCbor(String, String),
    /// Malformed or truncated bytes while decoding a stored value.
    DecodeFail(String, String),
    /// A coder claimed the same field tag twice.
    TagCollision(String, String),
    /// Failure reported by the underlying storage engine.
    StoreFail(String, String),
    /// Typed reference constructed for a key that is not present.
    RefNotFound(String, String),
    /// Raised from an on-delete trigger to veto the delete, the enclosing
    /// write transaction is marked aborted.
    OnDeleteRestrict(String, String),
    /// Secondary index does not agree with primary table.
    IndexInconsistent(String, String),
    /// Stored value failed its checksum.
    Corrupted(String, String),
    IPCFail(String, String),
    ThreadFail(String, String),
}

impl Error {
    /// Return true if this error vetoes an on-going delete.
    pub fn is_on_delete_restrict(&self) -> bool {
        matches!(self, Error::OnDeleteRestrict(_, _))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        use Error::*;

        match self {
            Fatal(p, msg) => write!(f, "{} Fatal: {}", p, msg),
            InvalidInput(p, msg) => write!(f, "{} InvalidInput: {}", p, msg),
            InvalidConfig(p, msg) => write!(f, "{} InvalidConfig: {}", p, msg),
            InvalidFile(p, msg) => write!(f, "{} InvalidFile: {}", p, msg),
            IOError(p, msg) => write!(f, "{} IOError: {}", p, msg),
            FailConvert(p, msg) => write!(f, "{} FailConvert: {}", p, msg),
            FailCbor(p, msg) => write!(f, "{} FailCbor: {}", p, msg),
            DecodeFail(p, msg) => write!(f, "{} DecodeFail: {}", p, msg),
            TagCollision(p, msg) => write!(f, "{} TagCollision: {}", p, msg),
            StoreFail(p, msg) => write!(f, "{} StoreFail: {}", p, msg),
            RefNotFound(p, msg) => write!(f, "{} RefNotFound: {}", p, msg),
            OnDeleteRestrict(p, msg) => write!(f, "{} OnDeleteRestrict: {}", p, msg),
            IndexInconsistent(p, msg) => write!(f, "{} IndexInconsistent: {}", p, msg),
            Corrupted(p, msg) => write!(f, "{} Corrupted: {}", p, msg),
            IPCFail(p, msg) => write!(f, "{} IPCFail: {}", p, msg),
            ThreadFail(p, msg) => write!(f, "{} ThreadFail: {}", p, msg),
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        write!(f, "{}", self)
    }
}

impl error::Error for Error {}
