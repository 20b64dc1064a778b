//! Destinations for finished export files.
//!
//! In the browser a save is a download prompt; natively it is a file write.
//! Filenames are used verbatim; callers sanitize them before exporting.

use std::cell::RefCell;

use crate::error::Result;

/// Something that can persist a finished export file.
pub trait FileSink {
    fn save(&self, filename: &str, bytes: &[u8], mime: &str) -> Result<()>;
}

impl<T: FileSink + ?Sized> FileSink for &T {
    fn save(&self, filename: &str, bytes: &[u8], mime: &str) -> Result<()> {
        (**self).save(filename, bytes, mime)
    }
}

/// A file captured by [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFile {
    pub filename: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Keeps saved files in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    files: RefCell<Vec<SavedFile>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> Vec<SavedFile> {
        self.files.borrow().clone()
    }

    pub fn take(&self, filename: &str) -> Option<SavedFile> {
        let mut files = self.files.borrow_mut();
        let idx = files.iter().position(|f| f.filename == filename)?;
        Some(files.remove(idx))
    }

    pub fn len(&self) -> usize {
        self.files.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.borrow().is_empty()
    }
}

impl FileSink for MemorySink {
    fn save(&self, filename: &str, bytes: &[u8], mime: &str) -> Result<()> {
        self.files.borrow_mut().push(SavedFile {
            filename: filename.to_string(),
            mime: mime.to_string(),
            bytes: bytes.to_vec(),
        });
        Ok(())
    }
}

/// Writes files into a directory.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: std::path::PathBuf,
}

#[cfg(not(target_arch = "wasm32"))]
impl DirectorySink {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl FileSink for DirectorySink {
    fn save(&self, filename: &str, bytes: &[u8], _mime: &str) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        let path = self.root.join(filename);
        std::fs::write(&path, bytes)?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "file written");
        Ok(())
    }
}

/// Triggers a browser download through a temporary object URL and anchor.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserDownload;

#[cfg(target_arch = "wasm32")]
impl FileSink for BrowserDownload {
    fn save(&self, filename: &str, bytes: &[u8], mime: &str) -> Result<()> {
        use crate::error::ExportError;
        use wasm_bindgen::JsCast;

        let js_err = |e: wasm_bindgen::JsValue| ExportError::Save(format!("{e:?}"));

        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| ExportError::Save("no document".to_string()))?;

        let blob = crate::browser::blob_from_bytes(bytes, mime).map_err(js_err)?;
        let url = web_sys::Url::create_object_url_with_blob(&blob).map_err(js_err)?;

        let anchor = document
            .create_element("a")
            .map_err(js_err)?
            .dyn_into::<web_sys::HtmlAnchorElement>()
            .map_err(|_| ExportError::Save("anchor element".to_string()))?;
        anchor.set_href(&url);
        anchor.set_download(filename);
        anchor.click();

        web_sys::Url::revoke_object_url(&url).map_err(js_err)?;
        Ok(())
    }
}
