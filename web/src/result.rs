use std::{io, path::Path, path::PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The request did not carry a usable upload or its form fields.
    #[error("{0}")]
    Upload(String),

    #[error("storage failure on {}: {source}", .path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("database unavailable: {0}")]
    Connection(#[source] anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl Error {
    pub fn storage(path: impl AsRef<Path>, source: io::Error) -> Self {
        Error::Storage {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Error::NotFound(message.into())
    }

    pub fn upload(message: impl Into<String>) -> Self {
        Error::Upload(message.into())
    }
}
