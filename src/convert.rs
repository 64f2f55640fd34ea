//! Conversion orchestrator and document inspection.
//!
//! [`Converter`] is a cheap, cloneable handle around a shared
//! [`EnginePool`]. Each [`Converter::convert`] call checks out one engine
//! instance and renders its page range strictly in ascending order on the
//! calling thread. Parallelism comes from running several conversions at
//! once, each on its own instance.
//!
//! ## One conversion
//!
//! ```text
//! read PDF ─▶ prepare output dir ─▶ acquire instance ─▶ open document
//!                                                          │
//!     ┌────────────────────────────────────────────────────┘
//!     ▼
//!   first pass: every page at the requested DPI
//!     │   ok      ─▶ encode + write ─▶ aggregator
//!     │   failure ─▶ classify ─▶ aggregator (transient pages flagged)
//!     ▼
//!   retry pass (optional, once): transient failures at reduced DPI
//!     ▼
//!   close document ─▶ release instance ─▶ ConversionResult
//! ```
//!
//! Every `refresh_every` rendered pages the document is closed, the instance
//! replaced through [`crate::pool::PooledEngine::refresh_if_due`], and the
//! document re-opened on the replacement before the next page.

use crate::config::{ConversionRequest, PageRange};
use crate::engine::{EngineBackend, EngineDocument, EngineError, FailureClass};
use crate::error::{PageError, Pdf2ImgError};
use crate::output::{format_file_size, ConversionResult, DocumentInfo};
use crate::pipeline::aggregate::ResultAggregator;
use crate::pipeline::encode;
use crate::pipeline::input;
use crate::pipeline::render::PdfiumBackend;
use crate::pipeline::retry::RetryPolicy;
use crate::pool::{EnginePool, PoolConfig};
use crate::progress::{ConversionProgressCallback, NoopProgressCallback};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Converts PDF documents into page images using a shared engine pool.
pub struct Converter<B: EngineBackend> {
    pool: Arc<EnginePool<B>>,
    retry: RetryPolicy,
}

impl<B: EngineBackend> Clone for Converter<B> {
    fn clone(&self) -> Self {
        Self {
            pool: Arc::clone(&self.pool),
            retry: self.retry,
        }
    }
}

impl Converter<PdfiumBackend> {
    /// Converter backed by pdfium, located via `PDFIUM_LIB_PATH` or the
    /// default library search.
    pub fn with_pdfium(config: PoolConfig) -> Self {
        Self::new(EnginePool::new(PdfiumBackend::from_env(), config))
    }
}

impl<B: EngineBackend> Converter<B> {
    pub fn new(pool: Arc<EnginePool<B>>) -> Self {
        Self {
            pool,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn pool(&self) -> &Arc<EnginePool<B>> {
        &self.pool
    }

    /// Shut down the underlying pool. Converters sharing it stop working.
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }

    /// Convert the requested page range into image files.
    ///
    /// # Errors
    /// Returns `Err` only when nothing can be rendered at all: unreadable or
    /// non-PDF input, unusable output directory, no engine instance, or a
    /// document the engine refuses to open. Page failures are reported in
    /// the returned [`ConversionResult`].
    pub fn convert(&self, request: &ConversionRequest) -> Result<ConversionResult, Pdf2ImgError> {
        let started = Instant::now();
        info!(
            "Converting {} → {} ({} @ {} DPI)",
            request.input.display(),
            request.output_dir.display(),
            request.format,
            request.dpi
        );

        let bytes = input::read_document(&request.input)?;
        input::prepare_output_dir(&request.output_dir)?;

        let mut lease = self
            .pool
            .acquire_cancellable(request.acquire_timeout, request.cancel.as_ref())?;
        lease.set_refresh_interval(request.refresh_every);
        let refresh_every = lease.refresh_interval();

        // ── First open: page count, range, first chunk of pages ─────────
        let (mut run, mut step) = {
            let document = lease
                .open_document(&bytes)
                .map_err(|e| corrupt_pdf(&request.input, e))?;
            let total = document.page_count();
            debug!("Document has {} pages", total);

            let Some(range) = PageRange::resolve(request.start_page, request.end_page, total)
            else {
                info!("{} has no pages; nothing to convert", request.input.display());
                let callback = progress_of(request);
                callback.on_conversion_start(0);
                callback.on_conversion_complete(0, 0);
                return Ok(ConversionResult::default());
            };

            let mut run = Run::new(request, range, total, self.retry);
            let step = run.step(&*document, refresh_every);
            (run, step)
        };

        // ── Refresh and continue on the replacement instance ────────────
        while step == Step::RefreshDue {
            match lease.refresh_if_due(run.rendered_since_refresh) {
                Ok(_) => debug!("Engine refreshed after {} pages", run.rendered_since_refresh),
                Err(e) => warn!("Engine refresh failed, continuing on current instance: {}", e),
            }
            run.rendered_since_refresh = 0;

            let document = match lease.open_document(&bytes) {
                Ok(document) => document,
                Err(e) => {
                    run.abandon(&e);
                    break;
                }
            };
            step = run.step(&*document, refresh_every);
        }

        lease.release();
        Ok(run.finish(started))
    }

    /// Page count, file size and first-page dimensions, without rendering.
    pub fn inspect(&self, path: &Path) -> Result<DocumentInfo, Pdf2ImgError> {
        let file_size = input::input_size(path)?;
        let bytes = input::read_document(path)?;

        let lease = self.pool.acquire(self.pool.config().acquire_timeout)?;
        let document = lease
            .open_document(&bytes)
            .map_err(|e| corrupt_pdf(path, e))?;
        let pages = document.page_count();
        let size = if pages > 0 {
            document.page_size(0).ok()
        } else {
            None
        };

        Ok(DocumentInfo {
            file: path.to_path_buf(),
            pages,
            file_size,
            file_size_human: format_file_size(file_size),
            width_pt: size.map(|s| s.width_pt),
            height_pt: size.map(|s| s.height_pt),
        })
    }

    /// [`convert`](Self::convert) on the blocking thread pool.
    pub async fn convert_async(
        &self,
        request: ConversionRequest,
    ) -> Result<ConversionResult, Pdf2ImgError> {
        let converter = self.clone();
        tokio::task::spawn_blocking(move || converter.convert(&request))
            .await
            .map_err(|e| Pdf2ImgError::Internal(format!("Conversion task panicked: {}", e)))?
    }

    /// [`inspect`](Self::inspect) on the blocking thread pool.
    pub async fn inspect_async(&self, path: PathBuf) -> Result<DocumentInfo, Pdf2ImgError> {
        let converter = self.clone();
        tokio::task::spawn_blocking(move || converter.inspect(&path))
            .await
            .map_err(|e| Pdf2ImgError::Internal(format!("Inspect task panicked: {}", e)))?
    }
}

// ── Run state ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Queue drained, retry pass included.
    Done,
    /// The held instance reached its refresh interval.
    RefreshDue,
    Cancelled,
}

#[derive(Debug, Clone, Copy)]
struct Job {
    page: usize,
    dpi: f32,
    retry: bool,
}

/// Mutable state of one conversion, independent of any open document so
/// it survives document re-opens across refreshes.
struct Run<'r> {
    request: &'r ConversionRequest,
    callback: &'r dyn ConversionProgressCallback,
    policy: RetryPolicy,
    range: PageRange,
    queue: VecDeque<Job>,
    aggregator: ResultAggregator,
    retry_planned: bool,
    rendered_since_refresh: usize,
}

impl<'r> Run<'r> {
    fn new(
        request: &'r ConversionRequest,
        range: PageRange,
        document_pages: usize,
        policy: RetryPolicy,
    ) -> Self {
        let callback = progress_of(request);
        callback.on_conversion_start(range.len());
        info!(
            "Rendering pages {} ({} of {} pages)",
            range,
            range.len(),
            document_pages
        );

        Self {
            request,
            callback,
            policy,
            range,
            queue: range
                .pages()
                .map(|page| Job {
                    page,
                    dpi: request.dpi,
                    retry: false,
                })
                .collect(),
            aggregator: ResultAggregator::new(document_pages),
            retry_planned: false,
            rendered_since_refresh: 0,
        }
    }

    /// Render queued jobs on `document` until done, cancelled, or due for refresh.
    fn step(&mut self, document: &dyn EngineDocument, refresh_every: usize) -> Step {
        loop {
            if self.queue.is_empty() && !self.plan_retry() {
                return Step::Done;
            }
            if refresh_every > 0 && self.rendered_since_refresh >= refresh_every {
                return Step::RefreshDue;
            }
            if self.request.is_cancelled() {
                info!("Conversion cancelled; {} job(s) not started", self.queue.len());
                self.aggregator.mark_cancelled();
                return Step::Cancelled;
            }
            let Some(job) = self.queue.pop_front() else {
                return Step::Done;
            };
            self.render(document, job);
            self.rendered_since_refresh += 1;
        }
    }

    /// Queue the retry pass. Returns whether any job was added.
    fn plan_retry(&mut self) -> bool {
        if self.retry_planned || !self.request.retry_failed {
            return false;
        }
        self.retry_planned = true;

        let pages = self.aggregator.retryable_pages();
        if pages.is_empty() {
            return false;
        }
        let Some(dpi) = self.policy.reduced_dpi(self.request.dpi) else {
            info!(
                "Skipping retry of {} page(s): {} DPI is already at the minimum",
                pages.len(),
                self.request.dpi
            );
            return false;
        };

        info!("Retrying {} page(s) at {} DPI: {:?}", pages.len(), dpi, pages);
        self.callback.on_retry_start(&pages, dpi);
        self.queue.extend(pages.into_iter().map(|page| Job {
            page,
            dpi,
            retry: true,
        }));
        true
    }

    fn render(&mut self, document: &dyn EngineDocument, job: Job) {
        let total = self.range.len();
        if !job.retry {
            self.callback.on_page_start(job.page, total);
        }

        let image = match document.render_page(job.page - 1, job.dpi) {
            Ok(image) => image,
            Err(e) => {
                let class = self.policy.classify(&e);
                let error = PageError::RenderFailed {
                    page: job.page,
                    class,
                    detail: e.message,
                };
                self.fail(job, error, class == FailureClass::Transient);
                return;
            }
        };

        let path = self.request.output_path(job.page);
        if let Err(e) = encode::encode_to_file(&image, &path, self.request.format) {
            let error = PageError::EncodeFailed {
                page: job.page,
                detail: e.to_string(),
            };
            self.fail(job, error, false);
            return;
        }

        if job.retry {
            self.aggregator.promote(job.page, path.clone(), job.dpi);
            info!("Page {} recovered at {} DPI", job.page, job.dpi);
        } else {
            self.aggregator.record_success(job.page, path.clone());
            debug!("Page {} → {}", job.page, path.display());
        }
        self.callback.on_page_complete(job.page, total, &path);
    }

    /// A failed retry keeps the first-pass error.
    fn fail(&mut self, job: Job, error: PageError, flagged: bool) {
        let message = error.to_string();
        if job.retry {
            warn!("Retry failed at {} DPI: {}", job.dpi, message);
        } else {
            warn!("{}", message);
            self.aggregator.record_failure(error, flagged);
        }
        self.callback
            .on_page_error(job.page, self.range.len(), &message);
    }

    /// The document could not be re-opened after a refresh: everything still
    /// queued fails, and no retry pass follows.
    fn abandon(&mut self, cause: &EngineError) {
        warn!(
            "Document could not be re-opened after engine refresh ({}); {} job(s) abandoned",
            cause,
            self.queue.len()
        );
        self.retry_planned = true;
        for job in std::mem::take(&mut self.queue) {
            if job.retry {
                continue;
            }
            let error = PageError::RenderFailed {
                page: job.page,
                class: FailureClass::Fatal,
                detail: format!("document could not be re-opened: {}", cause),
            };
            self.fail(job, error, false);
        }
    }

    fn finish(self, started: Instant) -> ConversionResult {
        let result = self.aggregator.snapshot();
        info!(
            "Conversion complete: {}/{} pages written, {} failed, {} retried, {}ms",
            result.successful,
            self.range.len(),
            result.failed,
            result.retried_pages.len(),
            started.elapsed().as_millis()
        );
        self.callback
            .on_conversion_complete(self.range.len(), result.successful);
        result
    }
}

fn progress_of(request: &ConversionRequest) -> &dyn ConversionProgressCallback {
    match request.progress_callback.as_deref() {
        Some(callback) => callback,
        None => &NoopProgressCallback,
    }
}

fn corrupt_pdf(path: &Path, e: EngineError) -> Pdf2ImgError {
    Pdf2ImgError::CorruptPdf {
        path: path.to_path_buf(),
        detail: e.message,
    }
}
