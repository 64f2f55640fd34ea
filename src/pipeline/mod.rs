//! Pipeline stages for PDF-to-image conversion.
//!
//! Each submodule implements one step. [`crate::convert::Converter`] is the
//! only place that wires them together.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ aggregate
//!  (read)   (pdfium)   (png/jpg)   (result)
//!              │
//!              └─ failure ──▶ retry (classify, reduce DPI)
//! ```
//!
//! 1. [`input`]     — read and validate the PDF, prepare the output directory
//! 2. [`render`]    — pdfium implementation of the [`crate::engine`] traits
//! 3. [`encode`]    — PNG/JPEG encode and atomic write of each page image
//! 4. [`retry`]     — transient/fatal classification and retry resolution
//! 5. [`aggregate`] — collect per-page outcomes into a `ConversionResult`

pub mod aggregate;
pub mod encode;
pub mod input;
pub mod render;
pub mod retry;
