use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::models::{BatchResult, ErrorKind};

/// Pre-flight failures. Nothing has been touched when one of these is returned.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("source folder '{0}' does not exist")]
    SourceMissing(PathBuf),

    #[error("'{0}' is not a directory")]
    NotADirectory(PathBuf),

    #[error("cannot read folder '{path}': {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write to destination folder '{path}': {source}")]
    Unwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DescribeError {
    #[error("rate limited by the description service: {0}")]
    RateLimited(String),

    #[error("authentication with the description service failed: {0}")]
    AuthenticationFailed(String),

    #[error("description request failed: {0}")]
    TransientNetworkError(String),

    #[error("image was rejected: {0}")]
    InvalidImage(String),
}

impl DescribeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DescribeError::RateLimited(_) => ErrorKind::RateLimited,
            DescribeError::AuthenticationFailed(_) => ErrorKind::AuthenticationFailed,
            DescribeError::TransientNetworkError(_) => ErrorKind::TransientNetworkError,
            DescribeError::InvalidImage(_) => ErrorKind::InvalidImage,
        }
    }

    /// Fatal errors stop the whole batch instead of skipping one file.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DescribeError::AuthenticationFailed(_))
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("response has no {0} section")]
    MissingSection(&'static str),

    #[error("{0} section of the response is empty")]
    EmptySection(&'static str),
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("cannot embed metadata into '{0}' files")]
    Unsupported(String),

    #[error("'{path}' is not a readable JPEG: {message}")]
    Malformed { path: PathBuf, message: String },

    #[error("failed to write '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write CSV '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl WriteError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        WriteError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported config file extension: {0}")]
    UnsupportedFormat(String),

    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid setting: {0}")]
    Invalid(String),

    #[error("no API key configured; run `smartvision set-key <key>` or set SMARTVISION_API_KEY")]
    MissingApiKey,
}

/// Errors that end a run. Each carries whatever was accumulated before the
/// stop, which is an empty result when the pre-flight check fails.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("cannot start the batch: {cause}")]
    Access {
        #[source]
        cause: AccessError,
        partial: BatchResult,
    },

    #[error("batch aborted: {cause}")]
    Aborted {
        cause: DescribeError,
        partial: BatchResult,
    },

    #[error("batch output could not be written: {cause}")]
    Finalize {
        cause: WriteError,
        partial: BatchResult,
    },
}

impl BatchError {
    pub fn partial(&self) -> &BatchResult {
        match self {
            BatchError::Access { partial, .. }
            | BatchError::Aborted { partial, .. }
            | BatchError::Finalize { partial, .. } => partial,
        }
    }
}
