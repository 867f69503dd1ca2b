use std::{
    convert::Infallible,
    path::{Path, PathBuf},
};

use crate::object_id::ObjectId;

/// Everything that can go wrong while reading, writing or building objects.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No object file exists for the requested id.
    #[error("object {0} not found")]
    NotFound(ObjectId),

    /// The stored bytes do not inflate to one complete zlib stream.
    #[error("corrupt object stream: {0}")]
    CorruptStream(#[from] CorruptStream),

    /// The inflated bytes are not a well-formed object.
    #[error("malformed object: {0}")]
    MalformedObject(#[from] Malformed),

    /// An I/O failure, tagged with the path it happened on.
    #[error("{}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An I/O failure with no path to blame, such as writing to stdout.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a valid object id: {0:?}")]
    InvalidObjectId(String),

    #[error("bad configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("not a repository (or missing objects): {}", .0.display())]
    NotARepository(PathBuf),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CorruptStream {
    /// Input ran out before the end of the stream was reached.
    #[error("stream ends before completion")]
    Truncated,
    /// The compressed bytes are not a valid zlib stream.
    #[error("invalid data ({0})")]
    InvalidData(String),
    /// Bytes remain after the end of the stream.
    #[error("{0} bytes after end of stream")]
    TrailingBytes(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Malformed {
    #[error("no `<kind> <length>\\0` header")]
    MissingHeader,
    #[error("unknown object kind {0:?}")]
    UnknownKind(String),
    #[error("length {0:?} is not a decimal number")]
    BadLength(String),
    #[error("header declares {declared} bytes but payload has {actual}")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("tree entry at byte {offset}: {reason}")]
    BadTreeEntry { offset: usize, reason: &'static str },
    #[error("unsupported tree entry mode {0:?}")]
    UnknownMode(String),
    #[error("expected a {expected} but found a {found}")]
    UnexpectedKind { expected: String, found: String },
}

impl From<Infallible> for Error {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

/// Attaches the offending path to a raw I/O result.
pub trait AtPath<T> {
    fn at(self, path: &Path) -> Result<T>;
}

impl<T> AtPath<T> for std::io::Result<T> {
    fn at(self, path: &Path) -> Result<T> {
        self.map_err(|source| Error::Filesystem {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[test]
fn test_messages() {
    let missing = Error::Filesystem {
        path: PathBuf::from("objects/ab"),
        source: std::io::Error::from(std::io::ErrorKind::NotFound),
    };
    assert!(missing.to_string().starts_with("objects/ab: "));
    assert!(std::error::Error::source(&missing).is_some());

    let mismatch: Error = Malformed::LengthMismatch {
        declared: 4,
        actual: 3,
    }
    .into();
    assert_eq!(
        mismatch.to_string(),
        "malformed object: header declares 4 bytes but payload has 3"
    );
    let truncated: Error = CorruptStream::Truncated.into();
    assert_eq!(
        truncated.to_string(),
        "corrupt object stream: stream ends before completion"
    );
}
