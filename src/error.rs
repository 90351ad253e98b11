//! Error types for the PDF workbench

use thiserror::Error;

/// Result type alias for the PDF workbench
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the PDF workbench
#[derive(Error, Debug)]
pub enum Error {
    /// PDF file not found
    #[error("PDF not found: {path}")]
    PdfNotFound { path: String },

    /// File rejected at intake (wrong extension)
    #[error("Unsupported file (only .pdf is accepted): {name}")]
    UnsupportedFile { name: String },

    /// Invalid PDF file
    #[error("Invalid PDF file: {reason}")]
    InvalidPdf { reason: String },

    /// PDF is password protected and no password was provided
    #[error("PDF is password protected")]
    PasswordRequired,

    /// Incorrect password provided
    #[error("Incorrect password")]
    IncorrectPassword,

    /// Invalid page range
    #[error("Invalid page range: {range}")]
    InvalidPageRange { range: String },

    /// Page out of bounds
    #[error("Page {page} out of bounds (total: {total})")]
    PageOutOfBounds { page: u32, total: u32 },

    /// A tool parameter is missing or malformed
    #[error("Invalid parameter: {reason}")]
    InvalidParameter { reason: String },

    /// Every input of a batch failed validation
    #[error("No valid PDF files ({skipped} skipped)")]
    NoValidInputs { skipped: usize },

    /// Cache key not found
    #[error("Cache key not found: {key}")]
    CacheKeyNotFound { key: String },

    /// Base64 decode error
    #[error("Invalid base64 data: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// PDFium error
    #[error("PDFium error: {reason}")]
    Pdfium { reason: String },

    /// qpdf error
    #[error("qpdf error: {reason}")]
    QpdfError { reason: String },

    /// lopdf error while authoring a new document
    #[error("PDF authoring error: {0}")]
    Authoring(#[from] lopdf::Error),

    /// Raster encode error
    #[error("Image encoding error: {0}")]
    ImageEncode(#[from] image::ImageError),

    /// Zip archive error
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Path access denied (outside allowed resource directories)
    #[error("Path access denied: {path}")]
    PathAccessDenied { path: String },

    /// Image dimension exceeded
    #[error("Image dimension exceeded: {detail}")]
    ImageDimensionExceeded { detail: String },

    /// No protection strategy at or above the requested guarantee succeeded
    #[error("No protection strategy providing at least '{minimum}' succeeded ({attempts} attempted)")]
    ProtectionUnavailable { minimum: String, attempts: usize },

    /// Operation lifecycle violated
    #[error("Invalid operation transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Blocking task failed to join
    #[error("Task join error: {reason}")]
    TaskJoin { reason: String },
}

impl Error {
    /// Return a sanitized error message safe to send to clients.
    /// Internal details (paths, library errors, file sizes) are omitted.
    /// Full details should be logged via tracing before calling this.
    pub fn client_message(&self) -> String {
        match self {
            Error::PdfNotFound { .. } => "PDF not found".to_string(),
            Error::UnsupportedFile { .. } => "Only PDF files are accepted".to_string(),
            Error::InvalidPdf { .. } => "Invalid PDF file".to_string(),
            Error::PasswordRequired => "PDF is password protected".to_string(),
            Error::IncorrectPassword => "Incorrect password".to_string(),
            Error::InvalidPageRange { range } => format!("Invalid page range: {}", range),
            Error::PageOutOfBounds { page, total } => {
                format!("Page {} out of bounds (total: {})", page, total)
            }
            Error::InvalidParameter { reason } => format!("Invalid parameter: {}", reason),
            Error::NoValidInputs { .. } => {
                "No valid PDF files found. Please check your files.".to_string()
            }
            Error::CacheKeyNotFound { .. } => "Cache key not found".to_string(),
            Error::Base64Decode(_) => "Invalid base64 data".to_string(),
            Error::Io(_) => "I/O error".to_string(),
            Error::Pdfium { .. } => "PDF rendering error".to_string(),
            Error::QpdfError { .. } => "PDF processing error".to_string(),
            Error::Authoring(_) => "PDF processing error".to_string(),
            Error::ImageEncode(_) => "Image encoding error".to_string(),
            Error::Archive(_) => "Archive error".to_string(),
            Error::Serialization(_) => "Serialization error".to_string(),
            Error::PathAccessDenied { .. } => "Access denied".to_string(),
            Error::ImageDimensionExceeded { detail } => {
                format!("Image dimension exceeded: {}", detail)
            }
            Error::ProtectionUnavailable { minimum, .. } => format!(
                "Could not protect the PDF with at least '{}' protection",
                minimum
            ),
            Error::InvalidTransition { .. } => "Internal processing error".to_string(),
            Error::TaskJoin { .. } => "Internal processing error".to_string(),
        }
    }
}
