use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ZipError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{}: {source}", .path.display())]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("compression error: {0}")]
    Compression(String),
    #[error("archive format error: {0}")]
    InvalidFormat(&'static str),
    #[error("rate limiter is shutting down")]
    ShuttingDown,
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<ZipError>,
    },
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl ZipError {
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    pub fn input(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Input {
            path: path.into(),
            source,
        }
    }
}

impl From<flate2::CompressError> for ZipError {
    fn from(err: flate2::CompressError) -> Self {
        Self::Compression(err.to_string())
    }
}
