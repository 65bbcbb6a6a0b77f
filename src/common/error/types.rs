//! Unified error types for the OCF reader.
//!
//! Only [`Error::InvalidArchive`], [`Error::MissingContainer`] and, under the
//! strict encryption policy, [`Error::EncryptedDataMissing`] abort opening a
//! container. The remaining variants describe failures of the lower layers
//! (archive access, XML parsing, query compilation) as they propagate.
use thiserror::Error;

/// Main error type for OCF operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The path could not be opened as an archive
    #[error("Path does not point to a recognised archive file: '{path}'")]
    InvalidArchive { path: String },

    /// `META-INF/container.xml` is absent or unparseable
    #[error("No container.xml in {path}")]
    MissingContainer { path: String },

    /// `META-INF/encryption.xml` declares no `EncryptedData` (strict policy only)
    #[error("encryption.xml in {path} declares no EncryptedData")]
    EncryptedDataMissing { path: String },

    /// XML parsing error
    #[error("XML error: {0}")]
    Xml(String),

    /// Character encoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Malformed query expression
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// ZIP archive error
    #[error("ZIP error: {0}")]
    Zip(String),
}

/// Result type for OCF operations.
pub type Result<T> = std::result::Result<T, Error>;
