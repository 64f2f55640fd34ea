//! Structural PDF optimisation: rewrite a document more compactly.
//!
//! Lossless only. Nothing is re-encoded or downsampled; the savings come from
//! dropping dead objects and deflating streams that were stored raw.

use crate::error::Pdf2ImgError;
use crate::output::format_file_size;
use crate::pipeline::input;
use crate::split::write_output;
use lopdf::Document;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Which rewrite passes to run. All on by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizeConfig {
    /// Remove streams with no content.
    pub remove_empty_streams: bool,
    /// Remove objects unreachable from the trailer.
    pub prune_unused: bool,
    /// Renumber objects densely from 1.
    pub renumber: bool,
    /// Flate-compress uncompressed streams.
    pub compress_streams: bool,
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        Self {
            remove_empty_streams: true,
            prune_unused: true,
            renumber: true,
            compress_streams: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizeResult {
    pub original_size: u64,
    pub optimized_size: u64,
}

impl OptimizeResult {
    /// Bytes saved; 0 when the rewrite came out larger.
    pub fn saved_bytes(&self) -> u64 {
        self.original_size.saturating_sub(self.optimized_size)
    }

    /// Saved share of the original size, in percent.
    pub fn saved_percent(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        self.saved_bytes() as f64 * 100.0 / self.original_size as f64
    }
}

/// Rewrite `input` into `output` according to `config`.
///
/// `output` may equal `input`; the write is atomic either way.
pub fn optimize_pdf(
    input_path: &Path,
    output: &Path,
    config: &OptimizeConfig,
) -> Result<OptimizeResult, Pdf2ImgError> {
    let bytes = input::read_document(input_path)?;
    let failed = |detail: String| Pdf2ImgError::OptimizeFailed {
        path: input_path.to_path_buf(),
        detail,
    };

    let mut doc = Document::load_mem(&bytes).map_err(|e| failed(e.to_string()))?;

    if config.remove_empty_streams {
        doc.delete_zero_length_streams();
    }
    if config.prune_unused {
        doc.prune_objects();
    }
    if config.renumber {
        doc.renumber_objects();
    }
    if config.compress_streams {
        doc.compress();
    }

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| failed(format!("save failed: {e}")))?;
    write_output(output, &buffer)?;

    let result = OptimizeResult {
        original_size: bytes.len() as u64,
        optimized_size: buffer.len() as u64,
    };
    info!(
        "Optimized {} → {} ({} → {}, {:.1}% saved)",
        input_path.display(),
        output.display(),
        format_file_size(result.original_size),
        format_file_size(result.optimized_size),
        result.saved_percent()
    );
    Ok(result)
}
