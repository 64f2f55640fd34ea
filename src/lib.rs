//! # edgequake-pdf2img
//!
//! Render PDF pages to PNG or JPEG images through a pooled, self-healing
//! pdfium pipeline.
//!
//! ## Why this crate?
//!
//! Rasterising large batches of PDFs with pdfium works until it doesn't:
//! a long-lived engine instance degrades after many pages, one page trips an
//! engine-internal fault, and a naive loop loses the whole document. This
//! crate keeps a bounded pool of engine instances, replaces them on a page
//! budget, tells engine faults apart from broken page content, and re-renders
//! faulted pages once at lower resolution. One bad page never costs the rest
//! of the document.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     read the file, check the %PDF header, prepare output dir
//!  ├─ 2. Pool      acquire an engine instance (bounded, timed wait)
//!  ├─ 3. Range     resolve start/end against the page count
//!  ├─ 4. Render    pages in ascending order, instance refreshed every N pages
//!  ├─ 5. Encode    PNG / JPEG, written atomically as {prefix}{page:04}.{ext}
//!  ├─ 6. Retry     transient failures once at reduced DPI (optional)
//!  └─ 7. Result    counts, files, errors, warning and retried pages
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2img::{ConversionRequest, Converter, PoolConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let converter = Converter::with_pdfium(PoolConfig::default());
//!     let request = ConversionRequest::builder("document.pdf", "pages")
//!         .dpi(200.0)
//!         .retry_failed(true)
//!         .build()?;
//!
//!     let result = converter.convert(&request)?;
//!     println!("{}/{} pages written", result.successful, result.total_pages);
//!     for error in &result.errors {
//!         eprintln!("{error}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2img` and `pdf2img-mcp` binaries (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdf2img = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod mcp;
pub mod optimize;
pub mod output;
pub mod pipeline;
pub mod pool;
pub mod progress;
pub mod split;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionRequest, ConversionRequestBuilder, OutputFormat, PageRange};
pub use convert::Converter;
pub use engine::{
    EngineBackend, EngineDocument, EngineError, EngineInstance, FailureClass, PageSize,
};
pub use error::{PageError, Pdf2ImgError};
pub use optimize::{optimize_pdf, OptimizeConfig, OptimizeResult};
pub use output::{ConversionResult, DocumentInfo, RetriedPage};
pub use pipeline::render::PdfiumBackend;
pub use pipeline::retry::RetryPolicy;
pub use pool::{CancelToken, EnginePool, PoolConfig, PoolError, PoolStatus, PooledEngine};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use split::{split_pdf, SplitRequest, SplitResult};
