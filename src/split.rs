//! Page extraction into a new PDF.
//!
//! Works on the document structure with `lopdf`; no rendering engine is
//! involved. Pages outside the resolved range are deleted from a copy of the
//! document, objects that are no longer referenced are pruned, and the
//! result is written atomically.

use crate::config::PageRange;
use crate::error::Pdf2ImgError;
use crate::pipeline::{encode, input};
use lopdf::Document;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Which pages of `input` to copy into `output`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    /// 1-indexed; 0 means "from the first page".
    pub start_page: usize,
    /// 1-indexed, inclusive; 0 means "to the last page".
    pub end_page: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitResult {
    /// Pages in the source document.
    pub total_pages: usize,
    /// Pages written to the new document.
    pub extracted_pages: usize,
    pub output_path: PathBuf,
}

/// Extract the requested page range of `request.input` into `request.output`.
///
/// The range is resolved exactly like a conversion range: open bounds,
/// clamping, and a start past the end collapsing to one page.
pub fn split_pdf(request: &SplitRequest) -> Result<SplitResult, Pdf2ImgError> {
    let bytes = input::read_document(&request.input)?;
    let failed = |detail: String| Pdf2ImgError::SplitFailed {
        path: request.input.clone(),
        detail,
    };

    let mut doc = Document::load_mem(&bytes).map_err(|e| failed(e.to_string()))?;
    let total_pages = doc.get_pages().len();
    let range = PageRange::resolve(request.start_page, request.end_page, total_pages)
        .ok_or_else(|| failed("document has no pages".into()))?;
    debug!("Splitting pages {} of {}", range, total_pages);

    // Delete from the back so earlier page numbers stay valid.
    let mut to_delete: Vec<u32> = (1..=total_pages as u32)
        .filter(|&p| !range.contains(p as usize))
        .collect();
    to_delete.reverse();
    for page in to_delete {
        doc.delete_pages(&[page]);
    }

    doc.prune_objects();
    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| failed(format!("save failed: {e}")))?;

    write_output(&request.output, &buffer)?;
    info!(
        "Extracted pages {} of {} → {}",
        range,
        request.input.display(),
        request.output.display()
    );

    Ok(SplitResult {
        total_pages,
        extracted_pages: range.len(),
        output_path: request.output.clone(),
    })
}

pub(crate) fn write_output(path: &Path, bytes: &[u8]) -> Result<(), Pdf2ImgError> {
    input::prepare_parent_dir(path)?;
    encode::write_atomic(path, bytes).map_err(|source| Pdf2ImgError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    })
}
