//! PDF rasterisation through pdfium.
//!
//! [`PdfiumBackend`] is the production implementation of the engine traits
//! in [`crate::engine`]. pdfium keeps library-wide state, so the library is
//! bound and initialised once per process and never destroyed. A
//! [`PdfiumInstance`] is a session over that shared binding: retiring one on
//! refresh releases the documents and page caches it opened and nothing
//! else.
//!
//! ## Library lookup
//!
//! 1. `PDFIUM_LIB_PATH` (a library file, or a directory containing one).
//! 2. The platform library name in the current working directory.
//! 3. The system library search path.
//!
//! The first successful bind wins for the life of the process. A failed bind
//! is not remembered, so a later spawn tries again.
//!
//! ## Failure classes
//!
//! pdfium reports content problems through `PdfiumError`; those are passed
//! on unclassified and [`crate::pipeline::retry::RetryPolicy`] decides from
//! the message. A panic unwinding out of the binding during a render is an
//! engine-internal fault and is reported as [`FailureClass::Transient`].
//!
//! [`FailureClass::Transient`]: crate::engine::FailureClass::Transient

use crate::engine::{EngineBackend, EngineDocument, EngineError, EngineInstance, PageSize};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};
use tracing::{debug, info};

/// PDF user space is 72 points per inch.
const POINTS_PER_INCH: f32 = 72.0;

/// The process-wide pdfium binding. `FPDF_InitLibrary` runs once, when this
/// is first filled; `FPDF_DestroyLibrary` never runs.
static PDFIUM: BindOnce<Pdfium> = BindOnce::new();

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// A value bound at most once, with failed binds left retryable.
struct BindOnce<T> {
    cell: OnceLock<T>,
    binding: Mutex<()>,
}

impl<T> BindOnce<T> {
    const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
            binding: Mutex::new(()),
        }
    }

    fn get_or_bind<E>(&self, bind: impl FnOnce() -> Result<T, E>) -> Result<&T, E> {
        if let Some(value) = self.cell.get() {
            return Ok(value);
        }
        let _guard = self.binding.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = self.cell.get() {
            return Ok(value);
        }
        let value = bind()?;
        Ok(self.cell.get_or_init(|| value))
    }
}

/// Opens sessions over the shared pdfium binding.
#[derive(Debug, Clone, Default)]
pub struct PdfiumBackend {
    library_path: Option<PathBuf>,
}

impl PdfiumBackend {
    /// Use `PDFIUM_LIB_PATH` when set, otherwise the default lookup.
    pub fn from_env() -> Self {
        Self {
            library_path: std::env::var_os("PDFIUM_LIB_PATH")
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
        }
    }

    /// Bind to the library at `path` (a file, or a directory holding one).
    pub fn with_library_path(path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: Some(path.into()),
        }
    }

    pub fn library_path(&self) -> Option<&Path> {
        self.library_path.as_deref()
    }

    fn pdfium(&self) -> Result<&'static Pdfium, EngineError> {
        PDFIUM
            .get_or_bind(|| {
                self.bind().inspect(|_| info!("pdfium library bound"))
            })
            .map_err(|e| {
                EngineError::fatal(format!(
                    "pdfium library could not be loaded ({e:?}); \
                     set PDFIUM_LIB_PATH=/path/to/libpdfium"
                ))
            })
    }

    fn bind(&self) -> Result<Pdfium, PdfiumError> {
        match &self.library_path {
            Some(path) if path.is_dir() => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(path))
                    .map(Pdfium::new)
            }
            Some(path) => Pdfium::bind_to_library(path).map(Pdfium::new),
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library())
                .map(Pdfium::new),
        }
    }
}

impl EngineBackend for PdfiumBackend {
    type Instance = PdfiumInstance;

    fn spawn(&self) -> Result<PdfiumInstance, EngineError> {
        let pdfium = self.pdfium()?;
        let session = NEXT_SESSION.fetch_add(1, Ordering::Relaxed);
        debug!("pdfium session #{session} opened");
        Ok(PdfiumInstance { pdfium, session })
    }
}

/// One session over the shared pdfium binding.
pub struct PdfiumInstance {
    pdfium: &'static Pdfium,
    session: u64,
}

impl PdfiumInstance {
    pub fn session(&self) -> u64 {
        self.session
    }
}

impl Drop for PdfiumInstance {
    fn drop(&mut self) {
        debug!("pdfium session #{} closed", self.session);
    }
}

impl EngineInstance for PdfiumInstance {
    fn open_document<'a>(
        &'a self,
        bytes: &[u8],
    ) -> Result<Box<dyn EngineDocument + 'a>, EngineError> {
        let document = self
            .pdfium
            .load_pdf_from_byte_vec(bytes.to_vec(), None)
            .map_err(|e| EngineError::fatal(format!("{e:?}")))?;
        Ok(Box::new(PdfiumDocument { document }))
    }
}

/// A document loaded into a [`PdfiumInstance`]. Closed on drop.
pub struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

impl PdfiumDocument<'_> {
    fn page(&self, index: usize) -> Result<PdfPage<'_>, EngineError> {
        let index = u16::try_from(index)
            .map_err(|_| EngineError::fatal(format!("page index {index} out of range")))?;
        self.document
            .pages()
            .get(index)
            .map_err(|e| EngineError::unclassified(format!("{e:?}")))
    }
}

impl EngineDocument for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page_size(&self, index: usize) -> Result<PageSize, EngineError> {
        let page = self.page(index)?;
        Ok(PageSize {
            width_pt: page.width().value,
            height_pt: page.height().value,
        })
    }

    fn render_page(&self, index: usize, dpi: f32) -> Result<DynamicImage, EngineError> {
        let page = self.page(index)?;
        let render_config = PdfRenderConfig::new().scale_page_by_factor(dpi / POINTS_PER_INCH);

        let rendered = catch_unwind(AssertUnwindSafe(|| {
            page.render_with_config(&render_config)
                .map(|bitmap| bitmap.as_image())
        }));

        match rendered {
            Ok(Ok(image)) => Ok(image),
            Ok(Err(e)) => Err(EngineError::unclassified(format!("{e:?}"))),
            Err(panic) => Err(EngineError::transient(format!(
                "engine panicked while rendering: {}",
                panic_message(panic.as_ref())
            ))),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
