//! Error types for testmend

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias using the testmend Error
pub type Result<T> = std::result::Result<T, Error>;

/// testmend error types
///
/// Only structural failures live here. Advisory-layer failures never leave
/// `advisory` as errors; they become diagnosis text instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed run results in {}: {source}", path.display())]
    MalformedResults {
        path: PathBuf,
        /// Error from the first, strict parse attempt
        #[source]
        source: serde_json::Error,
        /// Why the truncated retry also failed, if one was attempted
        recovery: Option<String>,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl Error {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Attach the offending path to `std::io` results.
pub(crate) trait IoContext<T> {
    fn at(self, path: &Path) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn at(self, path: &Path) -> Result<T> {
        self.map_err(|e| Error::io(path, e))
    }
}
