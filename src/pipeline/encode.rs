//! Image encoding: `DynamicImage` → PNG/JPEG bytes → file on disk.
//!
//! Encoding happens fully in memory before the destination is touched, and
//! the bytes are then written to a temporary file in the same directory and
//! renamed over the destination. A handled error therefore never leaves a
//! truncated image behind; only a crash between write and rename can leave
//! a stray `.pdf2img-*.tmp` file.

use crate::config::OutputFormat;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// JPEG quality for lossy output.
pub const JPEG_QUALITY: u8 = 90;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("writing '{path}' failed: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Encode `img` in `format` to an in-memory buffer.
pub fn encode_image(img: &DynamicImage, format: OutputFormat) -> Result<Vec<u8>, EncodeError> {
    let mut buf = Vec::new();
    match format {
        OutputFormat::Png => {
            img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        }
        OutputFormat::Jpg | OutputFormat::Jpeg => {
            // JPEG has no alpha channel.
            let rgb = img.to_rgb8();
            JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY).encode_image(&rgb)?;
        }
    }
    Ok(buf)
}

/// Encode `img` and write it to `path`, replacing any existing file.
pub fn encode_to_file(
    img: &DynamicImage,
    path: &Path,
    format: OutputFormat,
) -> Result<usize, EncodeError> {
    let bytes = encode_image(img, format)?;
    write_atomic(path, &bytes).map_err(|source| EncodeError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(
        "Wrote {}x{} {} → {} ({} bytes)",
        img.width(),
        img.height(),
        format,
        path.display(),
        bytes.len()
    );
    Ok(bytes.len())
}

/// Write `bytes` to `path` via a temporary sibling file and a rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".pdf2img-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
