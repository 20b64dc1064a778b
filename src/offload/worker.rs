//! The worker side of the protocol: one request in, one response out.
//!
//! Runs on whatever executes the job (a worker thread, a browser worker, or
//! the caller when offloading is disabled). Failures are reported in the
//! response, never raised.

use tracing::{debug, warn};

use crate::pdf::assemble_pdf;
use crate::snapshot::Snapshot;
use crate::types::{PageFormat, WorkerAction, WorkerRequest, WorkerResponse};

/// Answer a single `generatePdf` request.
pub fn handle_request(request: WorkerRequest) -> WorkerResponse {
    let WorkerRequest {
        action,
        html_string,
        filename,
    } = request;
    match action {
        WorkerAction::GeneratePdf => {
            let built = Snapshot::from_markup(&html_string)
                .and_then(|snap| assemble_pdf(&snap, &PageFormat::A4_PORTRAIT));
            match built {
                Ok(pdf) => {
                    debug!(filename = %filename, bytes = pdf.len(), "pdf generated");
                    WorkerResponse::ok(filename, pdf)
                }
                Err(e) => {
                    warn!(filename = %filename, error = %e, "pdf generation failed");
                    WorkerResponse::failed(filename, e.to_string())
                }
            }
        }
    }
}

/// Answer a raw message. Anything that is not a valid request gets a
/// failure response instead of an error.
pub fn handle_message(message: serde_json::Value) -> WorkerResponse {
    let filename = message
        .get("filename")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string();
    match serde_json::from_value::<WorkerRequest>(message) {
        Ok(request) => handle_request(request),
        Err(e) => WorkerResponse::failed(filename, format!("invalid request: {e}")),
    }
}
