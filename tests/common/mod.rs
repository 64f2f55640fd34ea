//! Shared fixtures for the integration tests: generated PDFs and a scripted
//! engine backend that records every call.

#![allow(dead_code)]

use edgequake_pdf2img::{
    Converter, EngineBackend, EngineDocument, EngineError, EngineInstance, EnginePool, PageSize,
    PoolConfig,
};
use image::DynamicImage;
use lopdf::{Dictionary, Document, Object, Stream};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A letter-size PDF with `num_pages` empty pages.
pub fn make_pdf(num_pages: u32) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let kids: Vec<Object> = (0..num_pages)
        .map(|_| {
            let content_id = doc.add_object(Stream::new(Dictionary::new(), Vec::new()));
            let page = Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Page".to_vec())),
                ("Parent", Object::Reference(pages_id)),
                (
                    "MediaBox",
                    Object::Array(vec![
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(612),
                        Object::Integer(792),
                    ]),
                ),
                ("Contents", Object::Reference(content_id)),
            ]);
            Object::Reference(doc.add_object(page))
        })
        .collect();

    let pages = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(num_pages as i64)),
        ("Kids", Object::Array(kids)),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// Write a `num_pages` PDF to `dir/name` and return its path.
pub fn write_pdf(dir: &Path, name: &str, num_pages: u32) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, make_pdf(num_pages)).unwrap();
    path
}

/// Scripted failure for one page (1-indexed).
#[derive(Debug, Clone)]
pub enum PageRule {
    /// Transient engine fault whenever the page is rendered above this DPI.
    TransientAbove(f32),
    /// Transient engine fault at every DPI.
    Transient,
    /// Content failure at every DPI.
    Fatal,
    /// Failure without a class; the retry policy has to read the message.
    Message(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderCall {
    pub page: usize,
    pub dpi: f32,
    pub instance: usize,
}

#[derive(Default)]
pub struct FakeState {
    pub spawns: AtomicUsize,
    pub drops: AtomicUsize,
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub fail_spawn: AtomicBool,
    /// Opens numbered at or above this value (1-based) fail. 0 = never.
    pub fail_open_from: AtomicUsize,
    pub renders: Mutex<Vec<RenderCall>>,
    pub rules: Mutex<HashMap<usize, PageRule>>,
}

impl FakeState {
    pub fn renders(&self) -> Vec<RenderCall> {
        self.renders.lock().unwrap().clone()
    }

    pub fn rendered_pages(&self) -> Vec<usize> {
        self.renders().iter().map(|c| c.page).collect()
    }

    pub fn spawns(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }

    pub fn drops(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Default)]
pub struct FakeBackend {
    pub state: Arc<FakeState>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(self, page: usize, rule: PageRule) -> Self {
        self.state.rules.lock().unwrap().insert(page, rule);
        self
    }
}

impl EngineBackend for FakeBackend {
    type Instance = FakeInstance;

    fn spawn(&self) -> Result<FakeInstance, EngineError> {
        if self.state.fail_spawn.load(Ordering::SeqCst) {
            return Err(EngineError::fatal("fake engine unavailable"));
        }
        let id = self.state.spawns.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(FakeInstance {
            id,
            state: Arc::clone(&self.state),
        })
    }
}

pub struct FakeInstance {
    id: usize,
    state: Arc<FakeState>,
}

impl Drop for FakeInstance {
    fn drop(&mut self) {
        self.state.drops.fetch_add(1, Ordering::SeqCst);
    }
}

impl EngineInstance for FakeInstance {
    fn open_document<'a>(
        &'a self,
        bytes: &[u8],
    ) -> Result<Box<dyn EngineDocument + 'a>, EngineError> {
        let n = self.state.opens.fetch_add(1, Ordering::SeqCst) + 1;
        let fail_from = self.state.fail_open_from.load(Ordering::SeqCst);
        if fail_from > 0 && n >= fail_from {
            return Err(EngineError::fatal("fake open failure"));
        }
        let pages = Document::load_mem(bytes)
            .map_err(|e| EngineError::fatal(format!("cannot parse document: {e}")))?
            .get_pages()
            .len();
        Ok(Box::new(FakeDocument {
            instance: self,
            pages,
        }))
    }
}

pub struct FakeDocument<'a> {
    instance: &'a FakeInstance,
    pages: usize,
}

impl Drop for FakeDocument<'_> {
    fn drop(&mut self) {
        self.instance.state.closes.fetch_add(1, Ordering::SeqCst);
    }
}

impl EngineDocument for FakeDocument<'_> {
    fn page_count(&self) -> usize {
        self.pages
    }

    fn page_size(&self, index: usize) -> Result<PageSize, EngineError> {
        if index >= self.pages {
            return Err(EngineError::fatal("page out of range"));
        }
        Ok(PageSize {
            width_pt: 612.0,
            height_pt: 792.0,
        })
    }

    fn render_page(&self, index: usize, dpi: f32) -> Result<DynamicImage, EngineError> {
        let state = &self.instance.state;
        let page = index + 1;
        state.renders.lock().unwrap().push(RenderCall {
            page,
            dpi,
            instance: self.instance.id,
        });

        match state.rules.lock().unwrap().get(&page) {
            Some(PageRule::TransientAbove(limit)) if dpi > *limit => {
                return Err(EngineError::transient(format!("engine trap at {dpi} DPI")))
            }
            Some(PageRule::Transient) => {
                return Err(EngineError::transient("engine trap"));
            }
            Some(PageRule::Fatal) => {
                return Err(EngineError::fatal("malformed content stream"));
            }
            Some(PageRule::Message(message)) => {
                return Err(EngineError::unclassified(message.clone()));
            }
            _ => {}
        }

        let side = (dpi / 4.0).round().max(1.0) as u32;
        Ok(DynamicImage::new_rgb8(side, side))
    }
}

/// A converter over a fresh pool of `FakeBackend` instances.
pub fn fake_converter(backend: &FakeBackend, max_instances: usize) -> Converter<FakeBackend> {
    let config = PoolConfig::default().max_instances(max_instances);
    Converter::new(EnginePool::new(backend.clone(), config))
}

pub fn file_names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}
