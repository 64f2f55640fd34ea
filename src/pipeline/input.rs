//! Input and output-location checks that run before any page is rendered.
//!
//! Everything here maps `std::io` failures onto the fatal variants of
//! [`Pdf2ImgError`] so that a missing file, a permission problem, or an
//! unwritable output directory is reported once, up front, instead of as a
//! page-level error for every page of the batch.

use crate::error::Pdf2ImgError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Read the whole document into memory, validating the `%PDF` magic bytes.
pub fn read_document(path: &Path) -> Result<Vec<u8>, Pdf2ImgError> {
    let bytes = std::fs::read(path).map_err(|e| map_read_error(path, e))?;

    if !bytes.starts_with(PDF_MAGIC) {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(Pdf2ImgError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }

    debug!("Read {} ({} bytes)", path.display(), bytes.len());
    Ok(bytes)
}

/// Size of the input file in bytes, with the same error mapping as
/// [`read_document`].
pub fn input_size(path: &Path) -> Result<u64, Pdf2ImgError> {
    let meta = std::fs::metadata(path).map_err(|e| map_read_error(path, e))?;
    if meta.is_dir() {
        return Err(Pdf2ImgError::InputReadFailed {
            path: path.to_path_buf(),
            source: std::io::Error::new(ErrorKind::InvalidInput, "path is a directory"),
        });
    }
    Ok(meta.len())
}

/// Create `dir` if needed and confirm a file can be created inside it.
pub fn prepare_output_dir(dir: &Path) -> Result<PathBuf, Pdf2ImgError> {
    let unavailable = |source| Pdf2ImgError::OutputDirUnavailable {
        path: dir.to_path_buf(),
        source,
    };

    std::fs::create_dir_all(dir).map_err(unavailable)?;

    // Probe file is removed when dropped.
    tempfile::Builder::new()
        .prefix(".pdf2img-probe")
        .tempfile_in(dir)
        .map_err(unavailable)?;

    debug!("Output directory ready: {}", dir.display());
    Ok(dir.to_path_buf())
}

/// Create the parent directory of an output file, if it has one.
pub fn prepare_parent_dir(path: &Path) -> Result<(), Pdf2ImgError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .map_err(|source| Pdf2ImgError::OutputDirUnavailable {
                path: parent.to_path_buf(),
                source,
            }),
        _ => Ok(()),
    }
}

fn map_read_error(path: &Path, e: std::io::Error) -> Pdf2ImgError {
    let path = path.to_path_buf();
    match e.kind() {
        ErrorKind::NotFound => Pdf2ImgError::FileNotFound { path },
        ErrorKind::PermissionDenied => Pdf2ImgError::PermissionDenied { path },
        _ => Pdf2ImgError::InputReadFailed { path, source: e },
    }
}
