//! Error types for folio operations.

use thiserror::Error;

/// Errors that can occur while normalizing an ebook.
///
/// Every variant aborts the whole parse; there is no partial result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// No file, an empty file, or a file that could not be read.
    #[error("Exception while processing selected file: {0}")]
    MissingFile(String),

    #[error("Selected file extension not supported: {0}")]
    UnsupportedExtension(String),

    /// The input was routed to the package handler but is not a ZIP archive.
    #[error("The selected file is supposed to be an archive, but it cannot be unpacked: {0}")]
    ArchiveOpen(String),

    /// A path referenced from inside the package does not exist in the archive.
    #[error("Required file not found in the unpacked archive: {0}")]
    ArchiveFileMissing(String),

    /// The container descriptor or its root-file reference is missing or unparsable.
    #[error("Invalid ebook: {0}")]
    InvalidEbook(String),

    /// A required node query found nothing and no fallback was registered.
    #[error("Required element not found in the book document: {0}")]
    UnresolvedSelection(String),

    /// Required metadata or chapter content could not be assembled at all.
    #[error("Part of the required data is corrupted: {0}")]
    CorruptedData(String),
}

pub type Result<T> = std::result::Result<T, Error>;
