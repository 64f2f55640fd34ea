//! Error types for the edgequake-pdf2img library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Pdf2ImgError`] — **Fatal**: the request cannot proceed at all
//!   (bad configuration, unreadable input, unwritable output directory,
//!   document that the engine refuses to open). Returned as
//!   `Err(Pdf2ImgError)` before any page is rendered.
//!
//! * [`PageError`] — **Non-fatal**: a single page failed to render or encode
//!   but the rest of the batch is fine. Stored inside
//!   [`crate::output::ConversionResult`] so callers see partial success
//!   rather than losing the whole document to one bad page.

use crate::engine::FailureClass;
use crate::pool::PoolError;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdf2img library.
///
/// Page-level failures use [`PageError`] and are stored in
/// [`crate::output::ConversionResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Pdf2ImgError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Request validation failed (unsupported format, bad DPI, empty path).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Reading the input failed for another I/O reason.
    #[error("Failed to read '{path}': {source}")]
    InputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The output directory could not be created or is not writable.
    #[error("Output directory '{path}' is not usable: {source}")]
    OutputDirUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write an output file (split / optimize).
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// The rendering engine could not open the document.
    #[error("PDF '{path}' could not be opened: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// Acquiring, creating or refreshing an engine instance failed.
    #[error(transparent)]
    Pool(#[from] PoolError),

    // ── Collaborator errors ───────────────────────────────────────────────
    /// Page extraction into a new document failed.
    #[error("Failed to split '{path}': {detail}")]
    SplitFailed { path: PathBuf, detail: String },

    /// Rewriting the document more compactly failed.
    #[error("Failed to optimize '{path}': {detail}")]
    OptimizeFailed { path: PathBuf, detail: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
///
/// Stored in [`crate::output::ConversionResult::errors`] when a page fails.
/// The batch always continues with the next page.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The engine failed to rasterise the page.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed {
        page: usize,
        class: FailureClass,
        detail: String,
    },

    /// The page rendered but the image could not be encoded or written.
    #[error("Page {page}: save failed: {detail}")]
    EncodeFailed { page: usize, detail: String },
}

impl PageError {
    /// 1-indexed page number this error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::RenderFailed { page, .. } | PageError::EncodeFailed { page, .. } => *page,
        }
    }

    /// Whether the failure is worth a reduced-DPI retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PageError::RenderFailed {
                class: FailureClass::Transient,
                ..
            }
        )
    }
}
