//! Result types returned by conversion and inspection.

use crate::error::PageError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome of one conversion.
///
/// Built by [`crate::pipeline::aggregate::ResultAggregator`] and immutable
/// once returned. A per-page failure never turns into an `Err`; it shows up
/// here in `errors` and in the `failed` count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    /// Page count of the whole document, not of the requested range.
    pub total_pages: usize,

    pub successful: usize,

    pub failed: usize,

    /// Written images, ordered by page number. Each page appears at most once.
    pub output_files: Vec<PathBuf>,

    /// Failures still standing after the retry pass, ordered by page number.
    pub errors: Vec<PageError>,

    /// Pages that hit a transient engine fault. They stay listed after a
    /// successful retry because the retried image has reduced resolution.
    pub warning_pages: Vec<usize>,

    /// Pages recovered by the retry pass.
    pub retried_pages: Vec<RetriedPage>,

    /// The run stopped early on a cancel request.
    pub cancelled: bool,
}

impl ConversionResult {
    /// Error messages in display form, e.g. `"Page 3: rasterisation failed: …"`.
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    /// Every page in the requested range was written.
    pub fn is_complete(&self) -> bool {
        self.failed == 0 && !self.cancelled
    }
}

/// A page rendered successfully on the retry pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetriedPage {
    pub page: usize,
    /// Resolution the page was finally rendered at.
    pub dpi: f32,
}

/// Summary of a document without rendering it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub file: PathBuf,
    pub pages: usize,
    /// Size on disk in bytes.
    pub file_size: u64,
    /// `file_size` in binary units, e.g. `"1.00 KB"`.
    pub file_size_human: String,
    /// First page width in PDF points; `None` for empty documents.
    pub width_pt: Option<f32>,
    /// First page height in PDF points; `None` for empty documents.
    pub height_pt: Option<f32>,
}

/// Format a byte count with binary units and two decimals.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", size, UNITS[unit])
}
