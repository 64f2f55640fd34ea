//! Configuration types for page-image conversion.
//!
//! Every knob of a single conversion lives in [`ConversionRequest`], built
//! via [`ConversionRequest::builder`]. Pool sizing is not per-request state;
//! it belongs to the shared [`crate::pool::EnginePool`], and the request only
//! carries hints ([`ConversionRequest::pool_config`]) for callers that create
//! a pool per run, like the CLI.

use crate::error::Pdf2ImgError;
use crate::pool::{CancelToken, PoolConfig, DEFAULT_MAX_INSTANCES, DEFAULT_REFRESH_EVERY};
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// DPI used when the request leaves it unset or non-positive.
pub const DEFAULT_DPI: f32 = 150.0;

/// Filename prefix used when the request leaves it empty.
pub const DEFAULT_PREFIX: &str = "page_";

/// A single conversion of one document into page images.
///
/// # Example
/// ```rust
/// use edgequake_pdf2img::{ConversionRequest, OutputFormat};
///
/// let request = ConversionRequest::builder("report.pdf", "out")
///     .format("JPG")
///     .dpi(200.0)
///     .pages(2, 5)
///     .retry_failed(true)
///     .build()
///     .unwrap();
///
/// assert_eq!(request.format, OutputFormat::Jpg);
/// assert_eq!(request.output_path(3).to_str(), Some("out/page_0003.jpg"));
/// ```
#[derive(Clone)]
pub struct ConversionRequest {
    /// Source PDF.
    pub input: PathBuf,

    /// Directory receiving the page images. Created if absent.
    pub output_dir: PathBuf,

    /// Image format of every written page. Default: PNG.
    pub format: OutputFormat,

    /// Rendering resolution. Always > 0 after `build()`. Default: 150.
    pub dpi: f32,

    /// First page to convert (1-indexed); 0 means "from the first page".
    pub start_page: usize,

    /// Last page to convert (1-indexed, inclusive); 0 means "to the last page".
    pub end_page: usize,

    /// Output filename prefix. Default: `page_`.
    pub prefix: String,

    /// Re-render transiently failed pages once at reduced DPI. Default: false.
    pub retry_failed: bool,

    /// Pool size hint for callers that build a pool per request. Default: 2.
    pub pool_size: usize,

    /// Pages rendered on one engine instance before it is replaced.
    /// 0 disables refresh. Default: 50.
    pub refresh_every: usize,

    /// Bound on the wait for an engine instance. Default: 30 s.
    pub acquire_timeout: Duration,

    /// Per-page progress events. Default: none.
    pub progress_callback: Option<ProgressCallback>,

    /// Stops the conversion before the next page once cancelled.
    pub cancel: Option<CancelToken>,
}

impl fmt::Debug for ConversionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionRequest")
            .field("input", &self.input)
            .field("output_dir", &self.output_dir)
            .field("format", &self.format)
            .field("dpi", &self.dpi)
            .field("start_page", &self.start_page)
            .field("end_page", &self.end_page)
            .field("prefix", &self.prefix)
            .field("retry_failed", &self.retry_failed)
            .field("pool_size", &self.pool_size)
            .field("refresh_every", &self.refresh_every)
            .field("acquire_timeout", &self.acquire_timeout)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .field("cancel", &self.cancel)
            .finish()
    }
}

impl ConversionRequest {
    /// Start a request converting `input` into `output_dir`.
    pub fn builder(
        input: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> ConversionRequestBuilder {
        ConversionRequestBuilder {
            input: input.into(),
            output_dir: output_dir.into(),
            format: OutputFormat::Png.to_string(),
            dpi: DEFAULT_DPI,
            start_page: 0,
            end_page: 0,
            prefix: DEFAULT_PREFIX.to_string(),
            retry_failed: false,
            pool_size: DEFAULT_MAX_INSTANCES,
            refresh_every: DEFAULT_REFRESH_EVERY,
            acquire_timeout: crate::pool::DEFAULT_ACQUIRE_TIMEOUT,
            progress_callback: None,
            cancel: None,
        }
    }

    /// File name for a 1-indexed page: `{prefix}{page:04}.{ext}`.
    pub fn file_name(&self, page: usize) -> String {
        format!("{}{:04}.{}", self.prefix, page, self.format.extension())
    }

    /// Full output path for a 1-indexed page.
    pub fn output_path(&self, page: usize) -> PathBuf {
        self.output_dir.join(self.file_name(page))
    }

    /// Pool settings derived from this request's hints.
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::default()
            .max_instances(self.pool_size)
            .acquire_timeout(self.acquire_timeout)
            .refresh_every(self.refresh_every)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }
}

/// Builder for [`ConversionRequest`].
#[derive(Clone)]
pub struct ConversionRequestBuilder {
    input: PathBuf,
    output_dir: PathBuf,
    format: String,
    dpi: f32,
    start_page: usize,
    end_page: usize,
    prefix: String,
    retry_failed: bool,
    pool_size: usize,
    refresh_every: usize,
    acquire_timeout: Duration,
    progress_callback: Option<ProgressCallback>,
    cancel: Option<CancelToken>,
}

impl ConversionRequestBuilder {
    /// Format name, case-insensitive: `png`, `jpg` or `jpeg`.
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.format = format.to_string();
        self
    }

    /// Values ≤ 0 fall back to 150.
    pub fn dpi(mut self, dpi: f32) -> Self {
        self.dpi = dpi;
        self
    }

    /// 1-indexed inclusive page bounds; 0 leaves that side open.
    pub fn pages(mut self, start: usize, end: usize) -> Self {
        self.start_page = start;
        self.end_page = end;
        self
    }

    pub fn start_page(mut self, page: usize) -> Self {
        self.start_page = page;
        self
    }

    pub fn end_page(mut self, page: usize) -> Self {
        self.end_page = page;
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn retry_failed(mut self, v: bool) -> Self {
        self.retry_failed = v;
        self
    }

    pub fn pool_size(mut self, n: usize) -> Self {
        self.pool_size = n.max(1);
        self
    }

    pub fn refresh_every(mut self, pages: usize) -> Self {
        self.refresh_every = pages;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.progress_callback = Some(cb);
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Apply defaults and validate. Touches no files.
    pub fn build(self) -> Result<ConversionRequest, Pdf2ImgError> {
        if self.input.as_os_str().is_empty() {
            return Err(Pdf2ImgError::InvalidConfig(
                "Input path must not be empty".into(),
            ));
        }
        if !self.dpi.is_finite() {
            return Err(Pdf2ImgError::InvalidConfig(format!(
                "DPI must be a finite number, got {}",
                self.dpi
            )));
        }

        let format = self.format.parse::<OutputFormat>()?;
        let dpi = if self.dpi <= 0.0 { DEFAULT_DPI } else { self.dpi };
        let prefix = if self.prefix.is_empty() {
            DEFAULT_PREFIX.to_string()
        } else {
            self.prefix
        };
        if prefix.contains(['/', '\\']) {
            return Err(Pdf2ImgError::InvalidConfig(format!(
                "Prefix must not contain path separators, got {prefix:?}"
            )));
        }
        let output_dir = if self.output_dir.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            self.output_dir
        };

        Ok(ConversionRequest {
            input: self.input,
            output_dir,
            format,
            dpi,
            start_page: self.start_page,
            end_page: self.end_page,
            prefix,
            retry_failed: self.retry_failed,
            pool_size: self.pool_size,
            refresh_every: self.refresh_every,
            acquire_timeout: self.acquire_timeout,
            progress_callback: self.progress_callback,
            cancel: self.cancel,
        })
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Image format of the written pages.
///
/// `Jpg` and `Jpeg` encode identically; they differ only in the file
/// extension, which follows what the caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Lossless. (default)
    #[default]
    Png,
    /// Lossy, quality 90.
    Jpg,
    /// Same as `Jpg` with a `.jpeg` extension.
    Jpeg,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpg => "jpg",
            OutputFormat::Jpeg => "jpeg",
        }
    }

    pub fn is_lossy(self) -> bool {
        !matches!(self, OutputFormat::Png)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = Pdf2ImgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "png" => Ok(OutputFormat::Png),
            "jpg" => Ok(OutputFormat::Jpg),
            "jpeg" => Ok(OutputFormat::Jpeg),
            other => Err(Pdf2ImgError::InvalidConfig(format!(
                "Unsupported format '{other}' (expected png, jpg or jpeg)"
            ))),
        }
    }
}

// ── Page range ───────────────────────────────────────────────────────────

/// Resolved inclusive, 1-indexed page interval.
///
/// Always satisfies `1 <= start <= end <= total` for the `total` it was
/// resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: usize,
    pub end: usize,
}

impl PageRange {
    /// Turn a requested `(start, end)` into a valid range over `total` pages.
    ///
    /// * `0` on either side means unbounded on that side.
    /// * Bounds are clamped into `[1, total]`.
    /// * A start past the end collapses to the single page `end`.
    ///
    /// Returns `None` only when the document has no pages.
    pub fn resolve(start: usize, end: usize, total: usize) -> Option<PageRange> {
        if total == 0 {
            return None;
        }
        let end = if end == 0 { total } else { end.min(total) };
        let start = start.max(1);
        let start = if start > end { end } else { start };
        Some(PageRange { start, end })
    }

    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, page: usize) -> bool {
        (self.start..=self.end).contains(&page)
    }

    /// Pages in ascending order.
    pub fn pages(&self) -> RangeInclusive<usize> {
        self.start..=self.end
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn resolve_table() {
        let cases = [
            ((0, 0, 10), (1, 10)),
            ((2, 5, 10), (2, 5)),
            ((5, 20, 10), (5, 10)),
            ((10, 5, 15), (5, 5)),
            ((20, 0, 10), (10, 10)),
            ((1, 1, 1), (1, 1)),
        ];
        for ((start, end, total), (want_start, want_end)) in cases {
            let r = PageRange::resolve(start, end, total).unwrap();
            assert_eq!(
                (r.start, r.end),
                (want_start, want_end),
                "resolve({start}, {end}, {total})"
            );
        }
    }

    #[test]
    fn resolve_empty_document() {
        assert_eq!(PageRange::resolve(0, 0, 0), None);
        assert_eq!(PageRange::resolve(3, 7, 0), None);
    }

    #[test]
    fn range_iterates_ascending() {
        let r = PageRange::resolve(3, 6, 10).unwrap();
        assert_eq!(r.pages().collect::<Vec<_>>(), vec![3, 4, 5, 6]);
        assert_eq!(r.len(), 4);
        assert!(r.contains(6));
        assert!(!r.contains(7));
        assert_eq!(r.to_string(), "3-6");
    }

    proptest! {
        #[test]
        fn resolve_stays_in_bounds(start in 0usize..500, end in 0usize..500, total in 1usize..300) {
            let r = PageRange::resolve(start, end, total).unwrap();
            prop_assert!(1 <= r.start);
            prop_assert!(r.start <= r.end);
            prop_assert!(r.end <= total);
        }
    }

    #[test]
    fn format_parsing_is_case_insensitive() {
        assert_eq!("PNG".parse::<OutputFormat>().unwrap(), OutputFormat::Png);
        assert_eq!("Jpg".parse::<OutputFormat>().unwrap(), OutputFormat::Jpg);
        assert_eq!("jpeg".parse::<OutputFormat>().unwrap(), OutputFormat::Jpeg);
        assert_eq!("".parse::<OutputFormat>().unwrap(), OutputFormat::Png);
        assert!(OutputFormat::Jpeg.is_lossy());
        assert!(!OutputFormat::Png.is_lossy());
    }

    #[test]
    fn unsupported_format_is_config_error() {
        let err = ConversionRequest::builder("in.pdf", "out")
            .format("bmp")
            .build()
            .unwrap_err();
        assert!(matches!(err, Pdf2ImgError::InvalidConfig(_)), "got: {err}");
        assert!(err.to_string().contains("bmp"));
    }

    #[test]
    fn builder_applies_defaults() {
        let req = ConversionRequest::builder("in.pdf", "")
            .dpi(0.0)
            .prefix("")
            .build()
            .unwrap();
        assert_eq!(req.dpi, DEFAULT_DPI);
        assert_eq!(req.prefix, DEFAULT_PREFIX);
        assert_eq!(req.format, OutputFormat::Png);
        assert_eq!(req.output_dir, PathBuf::from("."));
        assert_eq!(req.refresh_every, 50);
        assert_eq!(req.pool_size, 2);
        assert!(!req.retry_failed);

        let neg = ConversionRequest::builder("in.pdf", "out")
            .dpi(-5.0)
            .build()
            .unwrap();
        assert_eq!(neg.dpi, DEFAULT_DPI);
    }

    #[test]
    fn non_finite_dpi_is_rejected() {
        for dpi in [f32::NAN, f32::INFINITY] {
            assert!(ConversionRequest::builder("in.pdf", "out")
                .dpi(dpi)
                .build()
                .is_err());
        }
    }

    #[test]
    fn prefix_with_separator_is_rejected() {
        assert!(ConversionRequest::builder("in.pdf", "out")
            .prefix("../escape_")
            .build()
            .is_err());
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(ConversionRequest::builder("", "out").build().is_err());
    }

    #[test]
    fn file_names_are_zero_padded() {
        let req = ConversionRequest::builder("in.pdf", "out")
            .prefix("scan-")
            .format("jpeg")
            .build()
            .unwrap();
        assert_eq!(req.file_name(7), "scan-0007.jpeg");
        assert_eq!(req.file_name(12345), "scan-12345.jpeg");
        assert_eq!(req.output_path(1), PathBuf::from("out").join("scan-0001.jpeg"));
    }

    #[test]
    fn pool_config_follows_hints() {
        let req = ConversionRequest::builder("in.pdf", "out")
            .pool_size(4)
            .refresh_every(0)
            .acquire_timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        let pc = req.pool_config();
        assert_eq!(pc.max_instances, 4);
        assert_eq!(pc.refresh_every, 0);
        assert_eq!(pc.acquire_timeout, Duration::from_secs(5));
    }
}
