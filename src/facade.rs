//! The two export entry points UI code calls.
//!
//! Neither operation returns an error or panics: every outcome is reported
//! once through the [`Notifier`] and summarized as a `bool`.

use std::time::Duration;

use tracing::{error, info, info_span, warn, Instrument};

use crate::config::ExportConfig;
use crate::error::{ExportError, Result};
use crate::export::export_workbook;
use crate::notify::{AlertNotifier, Notifier};
use crate::offload::{OffloadCoordinator, WorkerSpawner};
use crate::pdf::PDF_MIME;
use crate::sheet_builder::build_workbook;
use crate::sink::FileSink;
use crate::snapshot::{DomSurface, RasterOptions, Snapshotter, TempNode};
use crate::types::{Notification, SheetInput, WorkerRequest};

const SHEETS_OK_TITLE: &str = "Export complete";
const SHEETS_FAILED_TITLE: &str = "Export failed";
const PDF_OK_TITLE: &str = "PDF generated";
const PDF_FAILED_TITLE: &str = "PDF generation failed";

/// Export entry points bound to one document, worker runtime and file sink.
pub struct Exporter<D, S, F> {
    config: ExportConfig,
    dom: D,
    spawner: S,
    sink: F,
    notifier: Box<dyn Notifier>,
}

impl<D, S, F> Exporter<D, S, F>
where
    D: DomSurface,
    S: WorkerSpawner,
    F: FileSink,
{
    /// Notifications go to [`AlertNotifier`] until [`Exporter::with_notifier`] is used.
    pub fn new(config: ExportConfig, dom: D, spawner: S, sink: F) -> Self {
        Self {
            config,
            dom,
            spawner,
            sink,
            notifier: Box::new(AlertNotifier),
        }
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn dom(&self) -> &D {
        &self.dom
    }

    pub fn spawner(&self) -> &S {
        &self.spawner
    }

    pub fn sink(&self) -> &F {
        &self.sink
    }

    /// Write one sheet per non-empty record list into `filename`.
    pub async fn export_spreadsheet(&self, data: &SheetInput, filename: &str) -> bool {
        let workbook = match build_workbook(data) {
            Ok(wb) => wb,
            Err(e) => {
                error!(filename, error = %e, "could not build workbook");
                self.notifier.notify(&Notification::failure(
                    SHEETS_FAILED_TITLE,
                    e.user_message(),
                ));
                return false;
            }
        };

        let ok = export_workbook(&workbook, filename, &self.sink, &self.config.columns);
        let notification = if ok {
            Notification::success(
                SHEETS_OK_TITLE,
                format!("{filename} was saved with {} sheet(s).", workbook.sheets.len()),
            )
        } else {
            Notification::failure(
                SHEETS_FAILED_TITLE,
                "The spreadsheet could not be created. Please try again.",
            )
        };
        self.notifier.notify(&notification);
        ok
    }

    /// Capture the element with id `element_id` and save it as a one-page PDF.
    pub async fn export_document(&self, element_id: &str, filename: &str) -> bool {
        let span = info_span!("export_document", element = element_id, filename);
        let outcome = self.run_document(element_id, filename).instrument(span).await;
        match outcome {
            Ok(()) => {
                info!(element = element_id, filename, "document exported");
                self.notifier.notify(&Notification::success(
                    PDF_OK_TITLE,
                    format!("{filename} is ready."),
                ));
                true
            }
            Err(e) => {
                if matches!(e, ExportError::ElementNotFound(_)) {
                    warn!(element = element_id, "export target not found");
                } else {
                    error!(element = element_id, filename, error = %e, "document export failed");
                }
                self.notifier
                    .notify(&Notification::failure(PDF_FAILED_TITLE, e.user_message()));
                false
            }
        }
    }

    async fn run_document(&self, element_id: &str, filename: &str) -> Result<()> {
        if !self.dom.has_element(element_id) {
            return Err(ExportError::ElementNotFound(element_id.to_string()));
        }

        let snapshot = {
            let _header = match &self.config.print_header {
                Some(text) => Some(TempNode::append(&self.dom, element_id, text)?),
                None => None,
            };
            let options = RasterOptions::from(&self.config.snapshot);
            Snapshotter::new(&self.dom, options)
                .capture(element_id)
                .await?
        };

        let request = WorkerRequest::generate_pdf(snapshot.to_markup(), filename);
        let coordinator = OffloadCoordinator::new(
            self.config.offload,
            self.config.worker_timeout_ms.map(Duration::from_millis),
        );
        let report = coordinator.run(&self.spawner, request).await;
        let pdf = report.outcome?;

        self.sink.save(filename, &pdf, PDF_MIME)
    }
}
