//! Custom error types and result handling for Tankobon operations.
//!
//! This module defines the error taxonomy used throughout Tankobon.
//! All operations return a [`Result<T>`] which is a type alias for `std::result::Result<T, Error>`.
//!
//! Errors fall into four families:
//! - configuration errors ([`Error::Config`], builder errors) abort the whole run,
//! - page-level errors ([`Error::CorruptImage`], [`Error::UnsupportedColor`], [`Error::Timeout`])
//!   skip a single page and surface as warnings,
//! - comic-level errors ([`Error::OutputExists`], [`Error::NotFound`]) skip one comic,
//! - archive finalization errors (I/O, ZIP) fail one comic and remove its partial output.
use std::path::PathBuf;

/// Type alias for Results with Tankobon errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all Tankobon operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O errors from the standard library
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Image decoding and encoding errors
    #[error(transparent)]
    Image(#[from] image::ImageError),
    /// JPEG encoder errors
    #[error(transparent)]
    JpegEncode(#[from] jpeg_encoder::EncodingError),
    /// ZIP file operation errors
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    /// Metadata descriptor parsing errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Backup export TOML parsing errors
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    /// Async task join errors
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Semaphore(#[from] tokio::sync::AcquireError),
    #[error(transparent)]
    ConfigBuilder(#[from] crate::tankobon::TankobonConfigBuilderError),
    /// Invalid configuration value (output format, hash algorithm, kernel, extension)
    #[error("Invalid configuration: {0}")]
    Config(String),
    /// A source image that cannot be decoded (corrupt, truncated, unrecognized)
    #[error("Corrupt image: {0}")]
    CorruptImage(String),
    /// A decoded image whose color mode cannot be normalized for the target codec
    #[error("Unrecognizable color space {0}")]
    UnsupportedColor(String),
    /// The target archive already exists on disk
    #[error("Output already exists: {0:?}")]
    OutputExists(PathBuf),
    /// Error for invalid file or directory paths
    #[error("The given path '{0:?}' is invalid: {1}")]
    InvalidPath(PathBuf, String),
    /// Error for failed asynchronous tasks
    #[error("Asynchronous task failed: {0}")]
    AsyncTaskError(String),
    /// A per-page job exceeded its time budget
    #[error("Timed out: {0}")]
    Timeout(String),
    /// Error for unsupported operations or formats (e.g., unknown image extension)
    #[error("Unsupported: {0}")]
    Unsupported(String),
    /// Error for resources that couldn't be found (e.g., source directory, image file)
    #[error("Not found: {0}")]
    NotFound(String),
    /// Other errors that don't fit into specific categories
    #[error("Other error: {0}")]
    Other(String),
}

impl Error {
    /// Returns `true` if the error only affects a single page.
    ///
    /// Page-level errors are caught by the per-comic pipeline: the page is
    /// skipped and the error is reported as a warning. Anything else fails
    /// the whole comic.
    pub fn is_page_recoverable(&self) -> bool {
        match self {
            Error::CorruptImage(_)
            | Error::UnsupportedColor(_)
            | Error::Timeout(_)
            | Error::Image(_)
            | Error::JpegEncode(_) => true,
            Error::Unsupported(_) => true,
            Error::Io(e) => e.kind() == std::io::ErrorKind::UnexpectedEof,
            _ => false,
        }
    }
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

impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}
