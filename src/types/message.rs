use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};

/// The only action the PDF worker understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerAction {
    #[serde(rename = "generatePdf")]
    GeneratePdf,
}

/// Message posted to the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRequest {
    pub action: WorkerAction,
    /// Rendered snapshot as `<img src="data:image/png;base64,..." width=".." height=".."/>`.
    pub html_string: String,
    pub filename: String,
}

impl WorkerRequest {
    pub fn generate_pdf(html_string: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            action: WorkerAction::GeneratePdf,
            html_string: html_string.into(),
            filename: filename.into(),
        }
    }
}

/// Message posted back by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerResponse {
    pub success: bool,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_blob: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkerResponse {
    pub fn ok(filename: impl Into<String>, pdf: Vec<u8>) -> Self {
        Self {
            success: true,
            filename: filename.into(),
            pdf_blob: Some(pdf),
            error: None,
        }
    }

    pub fn failed(filename: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            filename: filename.into(),
            pdf_blob: None,
            error: Some(error.into()),
        }
    }

    /// Validate the response and extract the PDF bytes.
    ///
    /// `success: true` must carry a non-empty blob; `success: false` becomes
    /// a logical [`ExportError::Worker`] carrying the worker's message.
    pub fn into_pdf(self) -> Result<Vec<u8>> {
        match (self.success, self.pdf_blob) {
            (true, Some(pdf)) if !pdf.is_empty() => Ok(pdf),
            (true, _) => Err(ExportError::MalformedResponse(
                "success without pdfBlob".to_string(),
            )),
            (false, _) => Err(ExportError::Worker(self.error.unwrap_or_default())),
        }
    }

    /// Parse an untrusted JSON message into a response.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| ExportError::MalformedResponse(e.to_string()))
    }
}
