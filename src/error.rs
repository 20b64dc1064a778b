//! Structured error types for the export pipeline.
//!
//! Every fallible step returns [`ExportError`]. The façade never lets one of
//! these escape; it logs them and turns them into a notification plus a
//! `false` result.

/// All errors that can occur while building, encoding, rendering or saving an export.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// XML parsing error from quick-xml.
    #[error("XML parsing: {0}")]
    Xml(#[from] quick_xml::Error),

    /// ZIP archive error.
    #[error("ZIP archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file could not be parsed.
    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// PDF object model error from lopdf.
    #[error("PDF: {0}")]
    Pdf(#[from] lopdf::Error),

    /// Raster decode/encode error.
    #[error("Image: {0}")]
    Image(#[from] image::ImageError),

    /// Base64 payload could not be decoded.
    #[error("Base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// No DOM element matches the requested id.
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// A sheet with this name already exists in the workbook.
    #[error("Duplicate sheet name: {0}")]
    DuplicateSheet(String),

    /// Sheet name is empty, too long, or contains a reserved character.
    #[error("Invalid sheet name: {0:?}")]
    InvalidSheetName(String),

    /// The worker reported `success: false` with a message.
    #[error("{0}")]
    Worker(String),

    /// The worker channel itself failed (error event, closed channel, panic).
    #[error("Worker transport error: {0}")]
    WorkerTransport(String),

    /// Worker offload was required but the runtime cannot start a worker.
    #[error("Worker unavailable: {0}")]
    WorkerUnavailable(String),

    /// A worker message did not have the expected shape.
    #[error("Malformed worker response: {0}")]
    MalformedResponse(String),

    /// The worker did not answer before the configured deadline.
    #[error("Worker did not respond within {0} ms")]
    Timeout(u64),

    /// A sheet being read spans more cells than the reader will lay out.
    #[error("Sheet {name:?} spans {cells} cells, more than the {limit} allowed")]
    SheetTooLarge {
        name: String,
        cells: u64,
        limit: u64,
    },

    /// Snapshot payload or rasterization failure.
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// The file sink refused the bytes.
    #[error("Save failed: {0}")]
    Save(String),

    /// Catch-all for string errors.
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ExportError>;

impl ExportError {
    /// Text that may be shown to the end user.
    ///
    /// Only logical worker errors carry their own message through; everything
    /// else collapses to a generic sentence.
    pub fn user_message(&self) -> String {
        match self {
            Self::Worker(msg) if !msg.trim().is_empty() => msg.clone(),
            Self::ElementNotFound(_) => "The content to export could not be found.".to_string(),
            Self::Timeout(_) => "The export took too long and was abandoned.".to_string(),
            _ => "The export could not be completed. Please try again.".to_string(),
        }
    }
}

impl From<String> for ExportError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<&str> for ExportError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

#[cfg(target_arch = "wasm32")]
impl From<ExportError> for wasm_bindgen::JsValue {
    fn from(e: ExportError) -> Self {
        wasm_bindgen::JsValue::from_str(&e.to_string())
    }
}
