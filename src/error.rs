//! Custom error types and result handling for Tankobon operations.
//!
//! This module defines the error handling system used throughout Tankobon.
//! All operations return a [`Result<T>`] which is a type alias for
//! `std::result::Result<T, Error>`.
//!
use std::path::PathBuf;

/// Type alias for Results with Tankobon errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all Tankobon operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O errors from the standard library
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// HTTP transport errors
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    /// URL parsing errors
    #[error(transparent)]
    Url(#[from] url::ParseError),
    /// Image processing errors
    #[error(transparent)]
    Image(#[from] image::ImageError),
    /// PDF merge errors
    #[error(transparent)]
    PdfMerge(#[from] lopdf::Error),
    /// Async task join errors
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Semaphore(#[from] tokio::sync::AcquireError),
    #[error(transparent)]
    ConfigBuilder(#[from] crate::tankobon::TankobonConfigBuilderError),
    /// Error for failed single-page PDF generation
    #[error("PDF generation failed: {0}")]
    Pdf(String),
    /// Error for chapter-index or chapter-page resolution failures
    #[error("Link resolution failed: {0}")]
    Resolver(String),
    /// Error for a page download that used up its whole attempt budget
    #[error("Image fetch exhausted after {attempts} attempts: {url}")]
    FetchExhausted { url: String, attempts: u32 },
    /// Error when the first page of a chapter cannot establish a target width
    #[error("First page {0:?} is missing or unreadable, chapter aborted")]
    FirstPageUnreadable(PathBuf),
    /// Error for invalid file or directory paths
    #[error("The given path '{0:?}' is invalid: {1}")]
    InvalidPath(PathBuf, String),
    /// Error for resources that couldn't be found (e.g., output directory, home directory)
    #[error("Not found: {0}")]
    NotFound(String),
    /// Other errors that don't fit into specific categories
    #[error("Other error: {0}")]
    Other(String),
}

// Basic From<String> conversion for convenience
impl From<String> for Error {
    fn from(error: String) -> Self {
        Error::Other(error)
    }
}

impl From<&str> for Error {
    fn from(error: &str) -> Self {
        Error::Other(error.to_string())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}
