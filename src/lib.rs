//! esg-export - spreadsheet and PDF export for ESG dashboards
//!
//! Two entry points, both reachable from Rust ([`facade::Exporter`]) and
//! from JavaScript through WebAssembly:
//! - multi-sheet `.xlsx` export of ESG records (resources, data points)
//! - single-page A4 `.pdf` export of a rendered page element, assembled on
//!   a worker when one is available
//!
//! # Usage (JavaScript)
//!
//! ```javascript
//! import init, { export_to_multiple_sheets, export_to_pdf_with_worker } from 'esg-export';
//! await init();
//! export_to_multiple_sheets({ resources, dataPoints }, 'esg-data.xlsx');
//! await export_to_pdf_with_worker('report-content', 'esg-report.pdf', 'pdf-worker.js');
//! ```
//!
//! The PDF worker runs `js/pdf-worker.js`, a module worker that loads this
//! crate's wasm-bindgen output (`wasm-pack build --target web`) and answers
//! each message with `handle_worker_message`. Serve it next to the generated
//! `esg_export.js` and pass its URL as the third argument. The worker posts
//! the PDF back as a `Blob`.

// Data model and encoding
pub mod cell_ref;
pub mod config;
pub mod error;
pub mod export;
pub mod pdf;
pub mod reader;
pub mod records;
pub mod sheet_builder;
pub mod types;
pub mod xml_helpers;

// Runtime: document, workers, delivery
#[cfg(target_arch = "wasm32")]
pub mod browser;
pub mod facade;
pub mod notify;
pub mod offload;
pub mod sink;
pub mod snapshot;

pub use config::ExportConfig;
pub use error::{ExportError, Result};
pub use facade::Exporter;
pub use types::*;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Export each non-empty record list of `sheets` as a sheet of `filename`.
///
/// `sheets` is a plain object mapping sheet names to arrays of flat records.
/// Returns `false` (after notifying the user) on any failure.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn export_to_multiple_sheets(sheets: JsValue, filename: &str) -> bool {
    use futures::FutureExt;

    console_error_panic_hook::set_once();
    let input = match browser::sheet_input_from_js(&sheets) {
        Ok(input) => input,
        Err(e) => {
            tracing::error!(error = %e, "sheet data has an unexpected shape");
            return false;
        }
    };
    let exporter = match browser_exporter(ExportConfig::default()) {
        Ok(exporter) => exporter,
        Err(e) => {
            tracing::error!(error = %e, "export unavailable");
            return false;
        }
    };
    // The spreadsheet path never suspends
    exporter
        .export_spreadsheet(&input, filename)
        .now_or_never()
        .unwrap_or(false)
}

/// Capture the element `element_id` and download it as `filename`.
///
/// Resolves to `true` or `false`; never rejects.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn export_to_pdf_with_worker(
    element_id: String,
    filename: String,
    worker_url: Option<String>,
) -> js_sys::Promise {
    console_error_panic_hook::set_once();
    wasm_bindgen_futures::future_to_promise(async move {
        let mut config = ExportConfig::default();
        if let Some(url) = worker_url {
            config.worker_script = url;
        }
        let ok = match browser_exporter(config) {
            Ok(exporter) => exporter.export_document(&element_id, &filename).await,
            Err(e) => {
                tracing::error!(error = %e, "export unavailable");
                false
            }
        };
        Ok(JsValue::from_bool(ok))
    })
}

/// Worker-side handler: takes a `generatePdf` request, returns the response
/// object `{ success, filename, pdfBlob?, error? }` with `pdfBlob` as a `Blob`.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn handle_worker_message(request: JsValue) -> JsValue {
    console_error_panic_hook::set_once();
    let response = match serde_wasm_bindgen::from_value::<serde_json::Value>(request) {
        Ok(message) => offload::worker::handle_message(message),
        Err(e) => WorkerResponse::failed("", format!("invalid request: {e}")),
    };
    browser::response_to_js(&response).unwrap_or_else(|e| {
        tracing::error!(error = ?e, "could not package the worker response");
        let fallback = WorkerResponse::failed(response.filename, "could not package the PDF");
        browser::response_to_js(&fallback).unwrap_or(JsValue::NULL)
    })
}

#[cfg(target_arch = "wasm32")]
fn browser_exporter(
    config: ExportConfig,
) -> Result<Exporter<snapshot::WebDom, offload::WebWorkerSpawner, sink::BrowserDownload>> {
    let dom = snapshot::WebDom::current()?;
    let spawner = offload::WebWorkerSpawner::new(config.worker_script.clone());
    Ok(Exporter::new(config, dom, spawner, sink::BrowserDownload))
}

/// Get the library version
#[must_use]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
