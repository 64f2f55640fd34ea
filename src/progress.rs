//! Progress-callback trait for per-page conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionRequestBuilder::progress_callback`] to receive
//! events as the orchestrator works through the page range. The CLI uses it
//! to drive an `indicatif` progress bar.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2img::{ConversionProgressCallback, ConversionRequest};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     written: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page: usize, total_pages: usize, path: &Path) {
//!         self.written.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Page {}/{} → {}", page, total_pages, path.display());
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { written: AtomicUsize::new(0) });
//!
//! let request = ConversionRequest::builder("doc.pdf", "out")
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the orchestrator as it processes each page.
///
/// Pages of one conversion are processed in order on one thread, but the
/// same callback may be shared by conversions running concurrently, hence
/// `Send + Sync`. All methods default to no-ops.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once the page range is known, before any page is rendered.
    ///
    /// # Arguments
    /// * `total_pages` — number of pages in the resolved range
    fn on_conversion_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before a page is rendered on the first pass.
    ///
    /// # Arguments
    /// * `page`        — 1-indexed page number
    /// * `total_pages` — number of pages in the resolved range
    fn on_page_start(&self, page: usize, total_pages: usize) {
        let _ = (page, total_pages);
    }

    /// Called after a page image has been written, on either pass.
    fn on_page_complete(&self, page: usize, total_pages: usize, path: &Path) {
        let _ = (page, total_pages, path);
    }

    /// Called when a page fails on the first pass, and again if its retry
    /// fails.
    fn on_page_error(&self, page: usize, total_pages: usize, error: &str) {
        let _ = (page, total_pages, error);
    }

    /// Called before the retry pass.
    ///
    /// # Arguments
    /// * `pages` — pages to be re-rendered, ascending
    /// * `dpi`   — the reduced resolution they are rendered at
    fn on_retry_start(&self, pages: &[usize], dpi: f32) {
        let _ = (pages, dpi);
    }

    /// Called once after all pages have been attempted (or the run was cancelled).
    fn on_conversion_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }
}

/// Used when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Type stored in [`crate::config::ConversionRequest`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
