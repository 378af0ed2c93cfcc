//! Error types for submission-dl
//!
//! Every failure the pipeline can hit is classified by the scope it is
//! contained in:
//! - [`ResolutionError`] / [`ExtractionError`] skip one submission
//! - [`FetchError`] skips the remaining resources of one submission
//! - [`WriteError`] skips one resource
//! - [`SourceError`] interrupts (transient) or ends (fatal) a submission sequence
//! - [`PersistenceError`] is logged and never propagated past finalization

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for submission-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for submission-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "filter.min_score")
        key: Option<String>,
    },

    /// No downloader matched a submission URL
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// A downloader failed to enumerate resources
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// Resource fetch failed
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Writing a resource to disk failed
    #[error("write error: {0}")]
    Write(#[from] WriteError),

    /// Submission sequence failed
    #[error("submission source error: {0}")]
    Source(#[from] SourceError),

    /// Hash index persistence failed
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Hash database error
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network client construction or transport error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error on a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// No downloader capability matches a URL
#[derive(Debug, Error)]
#[error("no downloader available for {url}: {reason}")]
pub struct ResolutionError {
    /// The submission URL that could not be resolved
    pub url: String,
    /// Why no strategy matched
    pub reason: String,
}

impl ResolutionError {
    /// Create a resolution error for a URL
    pub fn new(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

/// A downloader capability failed to enumerate resources for a submission
#[derive(Debug, Error)]
#[error("site {module} failed to extract resources: {reason}")]
pub struct ExtractionError {
    /// Module name of the downloader that failed
    pub module: String,
    /// Site-specific failure description
    pub reason: String,
}

impl ExtractionError {
    /// Create an extraction error for a downloader module
    pub fn new(module: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            reason: reason.into(),
        }
    }
}

/// Resource fetch errors
#[derive(Debug, Error)]
pub enum FetchError {
    /// Request did not complete within the request timeout
    #[error("timed out fetching {url}")]
    Timeout {
        /// Resource URL
        url: String,
    },

    /// Could not connect to the remote host
    #[error("connection failed for {url}: {reason}")]
    Connect {
        /// Resource URL
        url: String,
        /// Transport error description
        reason: String,
    },

    /// Remote answered with a non-success status
    #[error("HTTP {status} fetching {url}")]
    Status {
        /// Resource URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Response body could not be read to completion
    #[error("failed to read body of {url}: {reason}")]
    Body {
        /// Resource URL
        url: String,
        /// Transport error description
        reason: String,
    },

    /// Remote answered successfully but with no content
    #[error("empty response body from {url}")]
    EmptyBody {
        /// Resource URL
        url: String,
    },

    /// Resource URL is not a fetchable URL
    #[error("invalid resource URL {url}: {reason}")]
    InvalidUrl {
        /// Resource URL
        url: String,
        /// Parse error description
        reason: String,
    },
}

impl FetchError {
    /// Classify a transport error from the HTTP client
    pub(crate) fn from_reqwest(url: &str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else if e.is_connect() {
            FetchError::Connect {
                url: url.to_string(),
                reason: e.to_string(),
            }
        } else if let Some(status) = e.status() {
            FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            FetchError::Body {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

/// Local write errors
#[derive(Debug, Error)]
pub enum WriteError {
    /// Could not create the destination's parent directory
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        /// Directory that could not be created
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Writing the temporary file failed
    #[error("failed to write {path}: {source}")]
    Io {
        /// Destination path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Renaming the temporary file over the destination failed
    #[error("failed to commit {path}: {source}")]
    Commit {
        /// Destination path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Destination has no parent directory
    #[error("invalid destination path {path}")]
    InvalidPath {
        /// The offending path
        path: PathBuf,
    },
}

/// Errors raised while pulling the next submission from a source
#[derive(Debug, Error)]
pub enum SourceError {
    /// Recoverable remote failure; the run loop cools down and polls again
    #[error("transient remote error: {0}")]
    Transient(String),

    /// Unrecoverable source failure; the run loop terminates
    #[error("fatal source error: {0}")]
    Fatal(String),
}

/// Hash index persistence errors
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Hash store file could not be read or written
    #[error("hash store I/O failed at {path}: {source}")]
    Io {
        /// Store path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Hash store contents are malformed
    #[error("hash store at {path} is corrupt: {reason}")]
    Corrupt {
        /// Store path
        path: PathBuf,
        /// Description of the problem
        reason: String,
    },

    /// Writing a store record failed
    #[error(transparent)]
    Write(#[from] WriteError),

    /// Database-backed store failed
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Hash database errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}
