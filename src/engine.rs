//! Rendering-engine boundary.
//!
//! The pipeline never talks to pdfium directly; it talks to three traits:
//!
//! ```text
//! EngineBackend ──spawn()──▶ EngineInstance ──open_document()──▶ EngineDocument
//!   (factory)                  (one live session)                 (borrowed handle)
//! ```
//!
//! An [`EngineDocument`] borrows the [`EngineInstance`] it was opened on, so
//! a document handle cannot outlive its instance: replacing an instance
//! (see [`crate::pool::PooledEngine::refresh`]) requires every document
//! opened on it to be dropped first. Dropping the document closes it.
//!
//! The production backend is [`crate::pipeline::render::PdfiumBackend`].

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How a page failure should be treated by the retry pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Engine-internal fault (trap, allocation failure); retry at lower DPI.
    Transient,
    /// Problem with the page content itself; recorded, never retried.
    Fatal,
}

/// Error reported across the engine boundary.
///
/// Backends that can tell an internal fault from a content problem set
/// `class`; otherwise it is `None` and [`crate::pipeline::retry::RetryPolicy`]
/// falls back to matching the message.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct EngineError {
    pub message: String,
    pub class: Option<FailureClass>,
}

impl EngineError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            class: Some(FailureClass::Transient),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            class: Some(FailureClass::Fatal),
        }
    }

    pub fn unclassified(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            class: None,
        }
    }
}

/// Page dimensions in PDF points (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

/// Factory for engine instances. Shared by every orchestrator through the pool.
pub trait EngineBackend: Send + Sync + 'static {
    type Instance: EngineInstance;

    /// Create a fresh, independent engine session.
    fn spawn(&self) -> Result<Self::Instance, EngineError>;
}

/// One live engine session. Not assumed safe for concurrent use; the pool
/// hands each instance to a single holder at a time.
pub trait EngineInstance: Send + 'static {
    /// Load a document from its raw bytes.
    fn open_document<'a>(
        &'a self,
        bytes: &[u8],
    ) -> Result<Box<dyn EngineDocument + 'a>, EngineError>;
}

/// An open document. Closed when dropped.
pub trait EngineDocument {
    fn page_count(&self) -> usize;

    /// Size of the page at `index` (0-based).
    fn page_size(&self, index: usize) -> Result<PageSize, EngineError>;

    /// Rasterise the page at `index` (0-based) at `dpi`.
    fn render_page(&self, index: usize, dpi: f32) -> Result<DynamicImage, EngineError>;
}
