#![forbid(unsafe_code)]

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the packaging library.
#[derive(Debug, Error)]
pub enum PackError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("invalid glob pattern: {0}")]
    Pattern(#[from] globset::Error),
    #[error("{} is not a directory", path.display())]
    NotADirectory { path: PathBuf },
    #[error("{} is not a valid archive", path.display())]
    NotAnArchive { path: PathBuf },
    #[error("unable to detect compression format of {}", path.display())]
    UnknownFormat { path: PathBuf },
    #[error("key error: {0}")]
    Key(String),
    #[error("failed to decode signature: {0}")]
    SignatureDecode(#[from] base64::DecodeError),
    #[error("signature has invalid length: {0}")]
    SignatureLength(usize),
}

impl PackError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PackError>;
