use std::fmt;
use std::io;

/// Unified error type for the storage engine.
///
/// A missing key is not an error: lookups return `Ok(None)` for absence.
#[derive(Debug)]
pub enum Error {
    /// IO error from disk operations.
    Io(io::Error),
    /// Data corruption detected (CRC mismatch, bad format, etc).
    Corruption(String),
    /// The caller asked for something the current state does not allow:
    /// bad option combinations, comparator mismatch, use of a closed handle.
    InvalidArgument(String),
}

impl Error {
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::Corruption(_))
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Error::InvalidArgument(_))
    }

    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "IO error: {e}"),
            Error::Corruption(msg) => write!(f, "Corruption: {msg}"),
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

// Iterators keep a sticky error and hand out copies of it.
impl Clone for Error {
    fn clone(&self) -> Self {
        match self {
            Error::Io(e) => Error::Io(io::Error::new(e.kind(), e.to_string())),
            Error::Corruption(msg) => Error::Corruption(msg.clone()),
            Error::InvalidArgument(msg) => Error::InvalidArgument(msg.clone()),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

/// Result type alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes() {
        let e = Error::Corruption("bad block".into());
        assert_eq!(e.to_string(), "Corruption: bad block");
        let e = Error::InvalidArgument("db: does not exist".into());
        assert_eq!(e.to_string(), "Invalid argument: db: does not exist");
    }

    #[test]
    fn clone_keeps_io_kind() {
        let e = Error::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        match e.clone() {
            Error::Io(inner) => assert_eq!(inner.kind(), io::ErrorKind::NotFound),
            other => panic!("unexpected {other:?}"),
        }
    }
}
