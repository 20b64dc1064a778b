//! Export configuration.
//!
//! Built once by the host application (usually from a TOML file) and passed
//! by reference into [`crate::facade::Exporter`].
//!
//! ```toml
//! offload = "auto"
//! worker_timeout_ms = 30000
//! print_header = "ESG Report"
//!
//! [snapshot]
//! scale = 2.0
//!
//! [columns]
//! min = 10
//! max = 50
//! padding = 2
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Where PDF assembly runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OffloadMode {
    /// Use a worker when the runtime can start one, otherwise the calling thread.
    #[default]
    Auto,
    /// Always use a worker; fail when none can be started.
    Worker,
    /// Always use the calling thread.
    Inline,
}

/// Rasterization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Upscale factor applied to the element's scroll size.
    pub scale: f32,
    /// Allow cross-origin images in the capture.
    pub use_cors: bool,
    /// Background fill behind transparent content.
    pub background: Option<String>,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            scale: 2.0,
            use_cors: true,
            background: Some("#ffffff".to_string()),
        }
    }
}

/// Column auto-sizing bounds, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnWidths {
    pub min: usize,
    pub max: usize,
    pub padding: usize,
}

impl Default for ColumnWidths {
    fn default() -> Self {
        Self {
            min: 10,
            max: 50,
            padding: 2,
        }
    }
}

impl ColumnWidths {
    /// Width for a column whose widest entry is `content_len` characters.
    pub fn width_for(&self, content_len: usize) -> usize {
        content_len
            .saturating_add(self.padding)
            .clamp(self.min, self.max.max(self.min))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub offload: OffloadMode,
    /// Deadline for a worker answer. `None` waits indefinitely.
    pub worker_timeout_ms: Option<u64>,
    /// Script URL the browser worker is started from.
    pub worker_script: String,
    /// Text of a temporary header placed above the content while capturing.
    pub print_header: Option<String>,
    pub snapshot: SnapshotConfig,
    pub columns: ColumnWidths,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            offload: OffloadMode::Auto,
            worker_timeout_ms: None,
            worker_script: "pdf-worker.js".to_string(),
            print_header: None,
            snapshot: SnapshotConfig::default(),
            columns: ColumnWidths::default(),
        }
    }
}

impl ExportConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Load from a TOML file.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}
