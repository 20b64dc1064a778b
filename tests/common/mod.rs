//! Common test utilities: scripted workers, record builders and exporters
//! wired to in-memory collaborators.
#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::panic
)]

use std::cell::{Cell, RefCell};
use std::io::Cursor;
use std::rc::Rc;

use esg_export::config::ExportConfig;
use esg_export::error::{ExportError, Result};
use esg_export::notify::CollectingNotifier;
use esg_export::offload::worker::handle_request;
use esg_export::offload::{WorkerEvent, WorkerHandle, WorkerSpawner};
use esg_export::sink::MemorySink;
use esg_export::snapshot::{MemoryDom, MemoryElement};
use esg_export::{Exporter, Record, RecordValue, SheetInput, WorkerRequest, WorkerResponse};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

// ============================================================================
// Records
// ============================================================================

/// Build a record from `(column, value)` pairs, keeping their order.
pub fn record(pairs: &[(&str, RecordValue)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

/// `{resources: [{Title:"A"}], dataPoints: [{Metric:"carbon-emissions", Value:10}]}`
pub fn resources_and_data_points() -> SheetInput {
    let mut input = SheetInput::new();
    input.insert(
        "resources".to_string(),
        vec![record(&[("Title", "A".into())])],
    );
    input.insert(
        "dataPoints".to_string(),
        vec![record(&[
            ("Metric", "carbon-emissions".into()),
            ("Value", 10.0.into()),
        ])],
    );
    input
}

// ============================================================================
// Images
// ============================================================================

/// Encode a solid `width` x `height` PNG.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([40, 120, 80]));
    let mut out = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    out
}

// ============================================================================
// Scripted workers
// ============================================================================

/// How a scripted worker answers its one request.
#[derive(Debug, Clone)]
pub enum Script {
    /// Run the real worker handler on the posted request.
    Assemble,
    /// Answer with this response regardless of the request.
    Respond(WorkerResponse),
    /// Answer with a message that is not a response.
    Malformed(String),
    /// Fire a channel error event.
    TransportError(String),
    /// Never answer.
    Silent,
    /// Refuse the post itself.
    RejectPost,
}

/// Counters shared between a spawner and all the handles it produced.
#[derive(Debug, Default)]
pub struct WorkerStats {
    pub spawned: Cell<usize>,
    pub posted: Cell<usize>,
    pub terminated: Cell<usize>,
    pub requests: RefCell<Vec<WorkerRequest>>,
}

#[derive(Clone)]
pub struct ScriptedSpawner {
    pub script: Script,
    pub available: bool,
    pub stats: Rc<WorkerStats>,
}

impl ScriptedSpawner {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            available: true,
            stats: Rc::new(WorkerStats::default()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(Script::Assemble)
        }
    }

    pub fn spawned(&self) -> usize {
        self.stats.spawned.get()
    }

    pub fn terminated(&self) -> usize {
        self.stats.terminated.get()
    }
}

pub struct ScriptedWorker {
    script: Script,
    stats: Rc<WorkerStats>,
    request: Option<WorkerRequest>,
}

impl WorkerSpawner for ScriptedSpawner {
    type Handle = ScriptedWorker;

    fn is_available(&self) -> bool {
        self.available
    }

    fn spawn(&self) -> Result<ScriptedWorker> {
        if !self.available {
            return Err(ExportError::WorkerUnavailable("scripted".to_string()));
        }
        self.stats.spawned.set(self.stats.spawned.get() + 1);
        Ok(ScriptedWorker {
            script: self.script.clone(),
            stats: Rc::clone(&self.stats),
            request: None,
        })
    }
}

impl WorkerHandle for ScriptedWorker {
    fn post(&mut self, request: &WorkerRequest) -> Result<()> {
        if matches!(self.script, Script::RejectPost) {
            return Err(ExportError::WorkerTransport("post refused".to_string()));
        }
        self.stats.posted.set(self.stats.posted.get() + 1);
        self.stats.requests.borrow_mut().push(request.clone());
        self.request = Some(request.clone());
        Ok(())
    }

    async fn next_event(&mut self) -> WorkerEvent {
        match self.script.clone() {
            Script::Assemble => {
                let request = self.request.take().expect("request posted before reading");
                WorkerEvent::Message(handle_request(request))
            }
            Script::Respond(response) => WorkerEvent::Message(response),
            Script::Malformed(detail) => WorkerEvent::Malformed(detail),
            Script::TransportError(detail) => WorkerEvent::Error(detail),
            Script::Silent | Script::RejectPost => futures::future::pending().await,
        }
    }

    fn terminate(&mut self) {
        self.stats.terminated.set(self.stats.terminated.get() + 1);
    }
}

// ============================================================================
// Exporters
// ============================================================================

pub const ELEMENT_ID: &str = "report-content";

pub type TestExporter = Exporter<MemoryDom, ScriptedSpawner, MemorySink>;

/// A document holding one `width` x `height` element under [`ELEMENT_ID`].
pub fn dom_with_element(width: u32, height: u32) -> MemoryDom {
    let dom = MemoryDom::new();
    dom.insert(ELEMENT_ID, MemoryElement::new(width, height));
    dom
}

/// Exporter with an in-memory sink and a notifier the test can inspect.
pub fn exporter(
    config: ExportConfig,
    dom: MemoryDom,
    spawner: ScriptedSpawner,
) -> (TestExporter, Rc<CollectingNotifier>) {
    let notes = Rc::new(CollectingNotifier::new());
    let exporter = Exporter::new(config, dom, spawner, MemorySink::new())
        .with_notifier(Box::new(Rc::clone(&notes)));
    (exporter, notes)
}
