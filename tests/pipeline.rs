//! Integration tests for the conversion pipeline, driven through a scripted
//! engine backend so no pdfium library is needed.

mod common;

use common::{fake_converter, file_names, write_pdf, FakeBackend, PageRule};
use edgequake_pdf2img::{
    CancelToken, ConversionProgressCallback, ConversionRequest, ConversionResult, FailureClass,
    PageError, Pdf2ImgError, PoolError,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::thread;
use tempfile::TempDir;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn request(input: &Path, out: &Path) -> edgequake_pdf2img::ConversionRequestBuilder {
    ConversionRequest::builder(input, out)
}

fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn side(path: &Path) -> u32 {
    image::image_dimensions(path).unwrap().0
}

/// Records every callback in order.
#[derive(Default)]
struct EventLog {
    events: Mutex<Vec<String>>,
    page_totals: Mutex<Vec<usize>>,
}

impl EventLog {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// `total_pages` as seen by each `on_page_start`.
    fn page_totals(&self) -> Vec<usize> {
        self.page_totals.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl ConversionProgressCallback for EventLog {
    fn on_conversion_start(&self, total_pages: usize) {
        self.push(format!("start {total_pages}"));
    }
    fn on_page_start(&self, page: usize, total_pages: usize) {
        self.page_totals.lock().unwrap().push(total_pages);
        self.push(format!("page {page}"));
    }
    fn on_page_complete(&self, page: usize, _total_pages: usize, _path: &Path) {
        self.push(format!("ok {page}"));
    }
    fn on_page_error(&self, page: usize, _total_pages: usize, _error: &str) {
        self.push(format!("err {page}"));
    }
    fn on_retry_start(&self, pages: &[usize], dpi: f32) {
        self.push(format!("retry {pages:?} @ {dpi}"));
    }
    fn on_conversion_complete(&self, total_pages: usize, success_count: usize) {
        self.push(format!("done {success_count}/{total_pages}"));
    }
}

// ── Happy path ───────────────────────────────────────────────────────────────

#[test]
fn converts_every_page_to_png() {
    let dir = TempDir::new().unwrap();
    let input = write_pdf(dir.path(), "doc.pdf", 3);
    let out = dir.path().join("out");
    let backend = FakeBackend::new();
    let converter = fake_converter(&backend, 2);

    let result = converter
        .convert(&request(&input, &out).build().unwrap())
        .unwrap();

    assert_eq!(result.total_pages, 3);
    assert_eq!(result.successful, 3);
    assert_eq!(result.failed, 0);
    assert!(result.is_complete());
    assert_eq!(
        file_names(&result.output_files),
        ["page_0001.png", "page_0002.png", "page_0003.png"]
    );
    assert_eq!(dir_entries(&out), ["page_0001.png", "page_0002.png", "page_0003.png"]);
    assert_eq!(backend.state.rendered_pages(), [1, 2, 3]);
    assert!(backend.state.renders().iter().all(|c| c.dpi == 150.0));
    // 150 DPI / 4 in the fake engine.
    assert_eq!(side(&result.output_files[0]), 38);

    // One open, closed before the lease went back to the pool.
    assert_eq!(backend.state.opens(), 1);
    assert_eq!(backend.state.closes(), 1);
    assert_eq!(converter.pool().status().idle, 1);
}

#[test]
fn jpeg_output_uses_requested_extension() {
    let dir = TempDir::new().unwrap();
    let input = write_pdf(dir.path(), "doc.pdf", 2);
    let out = dir.path().join("out");
    let backend = FakeBackend::new();

    let req = request(&input, &out)
        .format("JPEG")
        .prefix("scan_")
        .build()
        .unwrap();
    let result = fake_converter(&backend, 1).convert(&req).unwrap();

    assert_eq!(file_names(&result.output_files), ["scan_0001.jpeg", "scan_0002.jpeg"]);
    let bytes = std::fs::read(&result.output_files[0]).unwrap();
    assert_eq!(&bytes[..2], &[0xFF, 0xD8], "JPEG SOI marker");
}

#[test]
fn progress_events_arrive_in_order() {
    let dir = TempDir::new().unwrap();
    let input = write_pdf(dir.path(), "doc.pdf", 2);
    let log = Arc::new(EventLog::default());
    let backend = FakeBackend::new();

    let req = request(&input, &dir.path().join("out"))
        .progress_callback(log.clone())
        .build()
        .unwrap();
    fake_converter(&backend, 1).convert(&req).unwrap();

    assert_eq!(
        log.events(),
        ["start 2", "page 1", "ok 1", "page 2", "ok 2", "done 2/2"]
    );
}

#[test]
fn repeated_conversion_overwrites_same_files() {
    let dir = TempDir::new().unwrap();
    let input = write_pdf(dir.path(), "doc.pdf", 3);
    let out = dir.path().join("out");
    let backend = FakeBackend::new();
    let converter = fake_converter(&backend, 1);
    let req = request(&input, &out).build().unwrap();

    let first = converter.convert(&req).unwrap();
    let second = converter.convert(&req).unwrap();

    assert_eq!(first, second);
    // No stray temp or probe files.
    assert_eq!(dir_entries(&out).len(), 3);
    // The second run reused the idle instance.
    assert_eq!(backend.state.spawns(), 1);
}

// ── Page ranges ──────────────────────────────────────────────────────────────

#[test]
fn converts_only_requested_subrange() {
    let dir = TempDir::new().unwrap();
    let input = write_pdf(dir.path(), "doc.pdf", 10);
    let out = dir.path().join("out");
    let backend = FakeBackend::new();

    let log = Arc::new(EventLog::default());

    let req = request(&input, &out)
        .pages(3, 5)
        .progress_callback(log.clone())
        .build()
        .unwrap();
    let result = fake_converter(&backend, 1).convert(&req).unwrap();

    // The result counts the whole document; progress counts the range.
    assert_eq!(result.total_pages, 10);
    assert_eq!(result.successful, 3);
    assert!(result.is_complete());
    assert_eq!(
        file_names(&result.output_files),
        ["page_0003.png", "page_0004.png", "page_0005.png"]
    );
    assert_eq!(backend.state.rendered_pages(), [3, 4, 5]);
    let events = log.events();
    assert_eq!(events.first().map(String::as_str), Some("start 3"));
    assert_eq!(events.last().map(String::as_str), Some("done 3/3"));
    assert_eq!(log.page_totals(), [3, 3, 3]);
}

#[test]
fn end_past_document_is_clamped() {
    let dir = TempDir::new().unwrap();
    let input = write_pdf(dir.path(), "doc.pdf", 4);
    let backend = FakeBackend::new();

    let req = request(&input, &dir.path().join("out"))
        .pages(3, 99)
        .build()
        .unwrap();
    let result = fake_converter(&backend, 1).convert(&req).unwrap();

    assert_eq!(result.total_pages, 4);
    assert_eq!(result.successful, 2);
    assert_eq!(backend.state.rendered_pages(), [3, 4]);
}

#[test]
fn start_after_end_renders_single_page() {
    let dir = TempDir::new().unwrap();
    let input = write_pdf(dir.path(), "doc.pdf", 10);
    let backend = FakeBackend::new();

    let req = request(&input, &dir.path().join("out"))
        .pages(8, 2)
        .build()
        .unwrap();
    let result = fake_converter(&backend, 1).convert(&req).unwrap();

    assert_eq!(result.total_pages, 10);
    assert_eq!(file_names(&result.output_files), ["page_0002.png"]);
}

#[test]
fn empty_document_yields_empty_result() {
    let dir = TempDir::new().unwrap();
    let input = write_pdf(dir.path(), "empty.pdf", 0);
    let log = Arc::new(EventLog::default());
    let backend = FakeBackend::new();

    let req = request(&input, &dir.path().join("out"))
        .progress_callback(log.clone())
        .build()
        .unwrap();
    let result = fake_converter(&backend, 1).convert(&req).unwrap();

    assert_eq!(result, ConversionResult::default());
    assert!(backend.state.renders().is_empty());
    assert_eq!(backend.state.closes(), 1);
    assert_eq!(log.events(), ["start 0", "done 0/0"]);
}

// ── Failures and retry ───────────────────────────────────────────────────────

#[test]
fn transient_failure_recovers_at_reduced_dpi() {
    let dir = TempDir::new().unwrap();
    let input = write_pdf(dir.path(), "doc.pdf", 3);
    let out = dir.path().join("out");
    let log = Arc::new(EventLog::default());
    let backend = FakeBackend::new().with_rule(2, PageRule::TransientAbove(120.0));

    let req = request(&input, &out)
        .retry_failed(true)
        .progress_callback(log.clone())
        .build()
        .unwrap();
    let result = fake_converter(&backend, 1).convert(&req).unwrap();

    assert_eq!(result.successful, 3);
    assert_eq!(result.failed, 0);
    assert!(result.errors.is_empty());
    assert_eq!(result.warning_pages, [2]);
    assert_eq!(result.retried_pages.len(), 1);
    assert_eq!(result.retried_pages[0].page, 2);
    assert_eq!(result.retried_pages[0].dpi, 112.5);

    // Each page listed once, in page order.
    assert_eq!(
        file_names(&result.output_files),
        ["page_0001.png", "page_0002.png", "page_0003.png"]
    );
    assert_eq!(side(&result.output_files[1]), 28);
    assert_eq!(side(&result.output_files[2]), 38);

    // Retry runs after the whole first pass.
    let calls: Vec<(usize, f32)> = backend
        .state
        .renders()
        .iter()
        .map(|c| (c.page, c.dpi))
        .collect();
    assert_eq!(calls, [(1, 150.0), (2, 150.0), (3, 150.0), (2, 112.5)]);

    assert_eq!(
        log.events(),
        [
            "start 3",
            "page 1",
            "ok 1",
            "page 2",
            "err 2",
            "page 3",
            "ok 3",
            "retry [2] @ 112.5",
            "ok 2",
            "done 3/3",
        ]
    );
}

#[test]
fn transient_failure_without_retry_is_flagged() {
    let dir = TempDir::new().unwrap();
    let input = write_pdf(dir.path(), "doc.pdf", 3);
    let backend = FakeBackend::new().with_rule(2, PageRule::TransientAbove(120.0));

    let req = request(&input, &dir.path().join("out")).build().unwrap();
    let result = fake_converter(&backend, 1).convert(&req).unwrap();

    assert_eq!(result.successful, 2);
    assert_eq!(result.failed, 1);
    assert_eq!(result.warning_pages, [2]);
    assert!(result.retried_pages.is_empty());
    assert!(result.errors[0].is_transient());
    assert_eq!(backend.state.rendered_pages(), [1, 2, 3]);
}

#[test]
fn fatal_failure_is_not_retried() {
    let dir = TempDir::new().unwrap();
    let input = write_pdf(dir.path(), "doc.pdf", 3);
    let backend = FakeBackend::new().with_rule(2, PageRule::Fatal);

    let req = request(&input, &dir.path().join("out"))
        .retry_failed(true)
        .build()
        .unwrap();
    let result = fake_converter(&backend, 1).convert(&req).unwrap();

    assert_eq!(result.successful, 2);
    assert_eq!(result.failed, 1);
    assert!(result.warning_pages.is_empty());
    assert_eq!(backend.state.rendered_pages(), [1, 2, 3]);
    match &result.errors[0] {
        PageError::RenderFailed { page, class, detail } => {
            assert_eq!(*page, 2);
            assert_eq!(*class, FailureClass::Fatal);
            assert!(detail.contains("malformed"), "got: {detail}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn failed_retry_keeps_first_error() {
    let dir = TempDir::new().unwrap();
    let input = write_pdf(dir.path(), "doc.pdf", 3);
    let backend = FakeBackend::new().with_rule(3, PageRule::Transient);

    let req = request(&input, &dir.path().join("out"))
        .retry_failed(true)
        .build()
        .unwrap();
    let result = fake_converter(&backend, 1).convert(&req).unwrap();

    assert_eq!(result.successful, 2);
    assert_eq!(result.failed, 1);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].page(), 3);
    assert_eq!(result.warning_pages, [3]);
    assert!(result.retried_pages.is_empty());
    assert_eq!(backend.state.rendered_pages(), [1, 2, 3, 3]);
}

#[test]
fn retry_skipped_at_minimum_dpi() {
    let dir = TempDir::new().unwrap();
    let input = write_pdf(dir.path(), "doc.pdf", 2);
    let backend = FakeBackend::new().with_rule(1, PageRule::Transient);

    let req = request(&input, &dir.path().join("out"))
        .dpi(72.0)
        .retry_failed(true)
        .build()
        .unwrap();
    let result = fake_converter(&backend, 1).convert(&req).unwrap();

    assert_eq!(result.failed, 1);
    assert_eq!(result.warning_pages, [1]);
    assert_eq!(backend.state.rendered_pages(), [1, 2]);
}

#[test]
fn unclassified_errors_are_classified_by_message() {
    let dir = TempDir::new().unwrap();
    let input = write_pdf(dir.path(), "doc.pdf", 3);
    let backend = FakeBackend::new()
        .with_rule(1, PageRule::Message("RuntimeError: unreachable executed".into()))
        .with_rule(2, PageRule::Message("invalid font program".into()));

    let req = request(&input, &dir.path().join("out"))
        .retry_failed(true)
        .build()
        .unwrap();
    let result = fake_converter(&backend, 1).convert(&req).unwrap();

    assert_eq!(result.failed, 2);
    assert_eq!(result.warning_pages, [1]);
    // Only the engine fault gets a second attempt.
    assert_eq!(backend.state.rendered_pages(), [1, 2, 3, 1]);
}

#[test]
fn encode_failure_is_a_page_error() {
    let dir = TempDir::new().unwrap();
    let input = write_pdf(dir.path(), "doc.pdf", 2);
    let out = dir.path().join("out");
    // A directory where page 1's image should go makes the final rename fail.
    std::fs::create_dir_all(out.join("page_0001.png")).unwrap();
    let backend = FakeBackend::new();

    let req = request(&input, &out).retry_failed(true).build().unwrap();
    let result = fake_converter(&backend, 1).convert(&req).unwrap();

    assert_eq!(result.successful, 1);
    assert_eq!(result.failed, 1);
    assert!(matches!(
        result.errors[0],
        PageError::EncodeFailed { page: 1, .. }
    ));
    assert!(result.warning_pages.is_empty());
    assert_eq!(backend.state.rendered_pages(), [1, 2]);
}

// ── Fatal request errors ─────────────────────────────────────────────────────

#[test]
fn unsupported_format_is_rejected_before_any_work() {
    let err = ConversionRequest::builder("doc.pdf", "out")
        .format("bmp")
        .build()
        .unwrap_err();
    assert!(matches!(err, Pdf2ImgError::InvalidConfig(_)), "got: {err}");
}

#[test]
fn missing_input_is_fatal() {
    let dir = TempDir::new().unwrap();
    let backend = FakeBackend::new();

    let req = request(&dir.path().join("nope.pdf"), &dir.path().join("out"))
        .build()
        .unwrap();
    let err = fake_converter(&backend, 1).convert(&req).unwrap_err();

    assert!(matches!(err, Pdf2ImgError::FileNotFound { .. }), "got: {err}");
    assert_eq!(backend.state.spawns(), 0);
}

#[test]
fn non_pdf_input_is_fatal() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("notes.txt");
    std::fs::write(&input, b"hello world").unwrap();
    let backend = FakeBackend::new();

    let req = request(&input, &dir.path().join("out")).build().unwrap();
    let err = fake_converter(&backend, 1).convert(&req).unwrap_err();

    match err {
        Pdf2ImgError::NotAPdf { magic, .. } => assert_eq!(&magic, b"hell"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unopenable_document_is_corrupt() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("broken.pdf");
    std::fs::write(&input, b"%PDF-1.7\nnot really a pdf").unwrap();
    let backend = FakeBackend::new();
    let converter = fake_converter(&backend, 1);

    let req = request(&input, &dir.path().join("out")).build().unwrap();
    let err = converter.convert(&req).unwrap_err();

    assert!(matches!(err, Pdf2ImgError::CorruptPdf { .. }), "got: {err}");
    // The instance still went back to the pool.
    assert_eq!(converter.pool().status().idle, 1);
}

#[test]
fn output_dir_that_is_a_file_is_fatal() {
    let dir = TempDir::new().unwrap();
    let input = write_pdf(dir.path(), "doc.pdf", 1);
    let blocker = dir.path().join("out");
    std::fs::write(&blocker, b"").unwrap();
    let backend = FakeBackend::new();

    let req = request(&input, &blocker).build().unwrap();
    let err = fake_converter(&backend, 1).convert(&req).unwrap_err();

    assert!(
        matches!(err, Pdf2ImgError::OutputDirUnavailable { .. }),
        "got: {err}"
    );
}

#[test]
fn engine_unavailable_is_fatal() {
    let dir = TempDir::new().unwrap();
    let input = write_pdf(dir.path(), "doc.pdf", 1);
    let backend = FakeBackend::new();
    backend.state.fail_spawn.store(true, Ordering::SeqCst);

    let req = request(&input, &dir.path().join("out")).build().unwrap();
    let err = fake_converter(&backend, 1).convert(&req).unwrap_err();

    assert!(
        matches!(err, Pdf2ImgError::Pool(PoolError::Spawn(_))),
        "got: {err}"
    );
}

// ── Instance refresh ─────────────────────────────────────────────────────────

#[test]
fn instance_is_refreshed_on_page_budget() {
    let dir = TempDir::new().unwrap();
    let input = write_pdf(dir.path(), "doc.pdf", 5);
    let backend = FakeBackend::new();
    let converter = fake_converter(&backend, 1);

    let req = request(&input, &dir.path().join("out"))
        .refresh_every(2)
        .build()
        .unwrap();
    let result = converter.convert(&req).unwrap();

    assert_eq!(result.successful, 5);
    assert_eq!(backend.state.spawns(), 3);
    assert_eq!(backend.state.drops(), 2);
    assert_eq!(backend.state.opens(), 3);
    assert_eq!(backend.state.closes(), 3);

    let instances: Vec<usize> = backend.state.renders().iter().map(|c| c.instance).collect();
    assert_eq!(instances, [1, 1, 2, 2, 3]);

    let status = converter.pool().status();
    assert_eq!(status.retired, 2);
    assert_eq!(status.live, 1);
}

#[test]
fn refresh_disabled_with_zero() {
    let dir = TempDir::new().unwrap();
    let input = write_pdf(dir.path(), "doc.pdf", 6);
    let backend = FakeBackend::new();

    let req = request(&input, &dir.path().join("out"))
        .refresh_every(0)
        .build()
        .unwrap();
    fake_converter(&backend, 1).convert(&req).unwrap();

    assert_eq!(backend.state.spawns(), 1);
    assert_eq!(backend.state.opens(), 1);
}

#[test]
fn refresh_counts_retry_renders() {
    let dir = TempDir::new().unwrap();
    let input = write_pdf(dir.path(), "doc.pdf", 2);
    let backend = FakeBackend::new().with_rule(1, PageRule::TransientAbove(120.0));

    let req = request(&input, &dir.path().join("out"))
        .refresh_every(2)
        .retry_failed(true)
        .build()
        .unwrap();
    let result = fake_converter(&backend, 1).convert(&req).unwrap();

    assert_eq!(result.successful, 2);
    // The retry of page 1 runs on the refreshed instance.
    let calls: Vec<(usize, usize)> = backend
        .state
        .renders()
        .iter()
        .map(|c| (c.page, c.instance))
        .collect();
    assert_eq!(calls, [(1, 1), (2, 1), (1, 2)]);
}

#[test]
fn failed_refresh_continues_on_current_instance() {
    struct BreakEngineAfter {
        page: usize,
        backend: FakeBackend,
    }
    impl ConversionProgressCallback for BreakEngineAfter {
        fn on_page_complete(&self, page: usize, _total: usize, _path: &Path) {
            if page == self.page {
                self.backend.state.fail_spawn.store(true, Ordering::SeqCst);
            }
        }
    }

    let dir = TempDir::new().unwrap();
    let input = write_pdf(dir.path(), "doc.pdf", 5);
    let backend = FakeBackend::new();
    let callback = Arc::new(BreakEngineAfter {
        page: 1,
        backend: backend.clone(),
    });

    let req = request(&input, &dir.path().join("out"))
        .refresh_every(2)
        .progress_callback(callback)
        .build()
        .unwrap();
    let result = fake_converter(&backend, 1).convert(&req).unwrap();

    assert_eq!(result.successful, 5);
    assert_eq!(backend.state.spawns(), 1);
    assert!(backend.state.renders().iter().all(|c| c.instance == 1));
    // Document is still closed and re-opened around each refresh attempt.
    assert_eq!(backend.state.opens(), 3);
}

#[test]
fn reopen_failure_fails_remaining_pages() {
    let dir = TempDir::new().unwrap();
    let input = write_pdf(dir.path(), "doc.pdf", 5);
    let backend = FakeBackend::new();
    backend.state.fail_open_from.store(2, Ordering::SeqCst);

    let req = request(&input, &dir.path().join("out"))
        .refresh_every(2)
        .retry_failed(true)
        .build()
        .unwrap();
    let result = fake_converter(&backend, 1).convert(&req).unwrap();

    assert_eq!(result.successful, 2);
    assert_eq!(result.failed, 3);
    let failed: Vec<usize> = result.errors.iter().map(PageError::page).collect();
    assert_eq!(failed, [3, 4, 5]);
    assert!(result.errors.iter().all(|e| !e.is_transient()));
    assert_eq!(backend.state.rendered_pages(), [1, 2]);
}

// ── Cancellation ─────────────────────────────────────────────────────────────

#[test]
fn cancel_stops_before_next_page() {
    struct CancelAfter {
        page: usize,
        token: CancelToken,
    }
    impl ConversionProgressCallback for CancelAfter {
        fn on_page_complete(&self, page: usize, _total: usize, _path: &Path) {
            if page == self.page {
                self.token.cancel();
            }
        }
    }

    let dir = TempDir::new().unwrap();
    let input = write_pdf(dir.path(), "doc.pdf", 5);
    let token = CancelToken::new();
    let backend = FakeBackend::new();

    let req = request(&input, &dir.path().join("out"))
        .cancel_token(token.clone())
        .progress_callback(Arc::new(CancelAfter {
            page: 2,
            token: token.clone(),
        }))
        .build()
        .unwrap();
    let result = fake_converter(&backend, 1).convert(&req).unwrap();

    assert!(result.cancelled);
    assert!(!result.is_complete());
    assert_eq!(result.total_pages, 5);
    assert_eq!(result.successful, 2);
    assert_eq!(result.failed, 0);
    assert_eq!(backend.state.rendered_pages(), [1, 2]);
}

#[test]
fn cancel_while_waiting_for_instance() {
    let dir = TempDir::new().unwrap();
    let input = write_pdf(dir.path(), "doc.pdf", 1);
    let backend = FakeBackend::new();
    let converter = fake_converter(&backend, 1);

    // Hold the only instance.
    let _held = converter
        .pool()
        .acquire(std::time::Duration::from_secs(1))
        .unwrap();

    let token = CancelToken::new();
    token.cancel();
    let req = request(&input, &dir.path().join("out"))
        .cancel_token(token)
        .build()
        .unwrap();
    let err = converter.convert(&req).unwrap_err();

    assert!(
        matches!(err, Pdf2ImgError::Pool(PoolError::Cancelled)),
        "got: {err}"
    );
}

// ── Concurrency ──────────────────────────────────────────────────────────────

#[test]
fn concurrent_conversions_share_bounded_pool() {
    let dir = TempDir::new().unwrap();
    let backend = FakeBackend::new();
    let converter = fake_converter(&backend, 2);

    let jobs: Vec<(PathBuf, PathBuf)> = (0..4)
        .map(|i| {
            let input = write_pdf(dir.path(), &format!("doc{i}.pdf"), 3);
            (input, dir.path().join(format!("out{i}")))
        })
        .collect();

    let handles: Vec<_> = jobs
        .into_iter()
        .map(|(input, out)| {
            let converter = converter.clone();
            thread::spawn(move || {
                let req = ConversionRequest::builder(input, out).build().unwrap();
                converter.convert(&req).unwrap()
            })
        })
        .collect();

    for handle in handles {
        let result = handle.join().unwrap();
        assert_eq!(result.successful, 3);
    }

    assert!(backend.state.spawns() <= 2);
    assert_eq!(backend.state.renders().len(), 12);
    let status = converter.pool().status();
    assert_eq!(status.live, status.idle);
}

// ── Async entry points and inspection ────────────────────────────────────────

#[tokio::test]
async fn convert_async_runs_on_blocking_pool() {
    let dir = TempDir::new().unwrap();
    let input = write_pdf(dir.path(), "doc.pdf", 2);
    let backend = FakeBackend::new();

    let req = request(&input, &dir.path().join("out")).build().unwrap();
    let result = fake_converter(&backend, 1).convert_async(req).await.unwrap();

    assert_eq!(result.successful, 2);
}

#[tokio::test]
async fn inspect_reports_pages_and_size() {
    let dir = TempDir::new().unwrap();
    let input = write_pdf(dir.path(), "doc.pdf", 4);
    let expected_size = std::fs::metadata(&input).unwrap().len();
    let backend = FakeBackend::new();

    let info = fake_converter(&backend, 1)
        .inspect_async(input.clone())
        .await
        .unwrap();

    assert_eq!(info.file, input);
    assert_eq!(info.pages, 4);
    assert_eq!(info.file_size, expected_size);
    assert_eq!(info.width_pt, Some(612.0));
    assert_eq!(info.height_pt, Some(792.0));
    assert!(backend.state.renders().is_empty());
}

#[test]
fn inspect_empty_document_has_no_dimensions() {
    let dir = TempDir::new().unwrap();
    let input = write_pdf(dir.path(), "empty.pdf", 0);
    let backend = FakeBackend::new();

    let info = fake_converter(&backend, 1).inspect(&input).unwrap();

    assert_eq!(info.pages, 0);
    assert_eq!(info.width_pt, None);
    assert_eq!(info.height_pt, None);
}
