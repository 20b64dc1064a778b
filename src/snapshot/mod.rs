//! Rasterizes a rendered content element into a PNG snapshot.
//!
//! The DOM is reached through [`DomSurface`] so the same capture logic runs
//! against a live browser document ([`WebDom`], wasm32 only) and the
//! in-memory [`MemoryDom`].
//!
//! While a capture is running the element carries the `exporting-content`
//! class and the body carries `print-mode`. Both are held by a
//! [`MarkerGuard`] and removed on every exit path.

mod memory;
#[cfg(target_arch = "wasm32")]
mod web;

pub use memory::{MemoryDom, MemoryElement};
#[cfg(target_arch = "wasm32")]
pub use web::WebDom;

use std::future::Future;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;

use crate::config::SnapshotConfig;
use crate::error::{ExportError, Result};
use crate::xml_helpers::{attr_string, attr_u32};

/// Class added to the captured element.
pub const EXPORTING_CLASS: &str = "exporting-content";
/// Class added to the document body.
pub const PRINT_MODE_CLASS: &str = "print-mode";

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Which node a class change applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DomTarget {
    Body,
    Element(String),
}

/// Identifier of a temporary node appended by the exporter.
pub type NodeId = String;

/// Options handed to the rasterizer.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterOptions {
    pub scale: f32,
    pub use_cors: bool,
    pub background: Option<String>,
}

impl From<&SnapshotConfig> for RasterOptions {
    fn from(cfg: &SnapshotConfig) -> Self {
        Self {
            scale: cfg.scale,
            use_cors: cfg.use_cors,
            background: cfg.background.clone(),
        }
    }
}

/// PNG bytes plus pixel size, as produced by a rasterizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// The document operations the exporter needs.
pub trait DomSurface {
    fn has_element(&self, id: &str) -> bool;

    fn add_class(&self, target: &DomTarget, class: &str) -> Result<()>;

    /// Removal is best effort and never fails; a missing node is ignored.
    fn remove_class(&self, target: &DomTarget, class: &str);

    /// Append a temporary text block as the first child of `parent_id`.
    fn append_temp_node(&self, parent_id: &str, text: &str) -> Result<NodeId>;

    fn remove_node(&self, node: &NodeId);

    /// Render the element at its full scroll size times `options.scale`.
    fn rasterize(
        &self,
        id: &str,
        options: &RasterOptions,
    ) -> impl Future<Output = Result<RasterImage>>;
}

/// Holds marker classes for the duration of a capture.
pub struct MarkerGuard<'a, D: DomSurface + ?Sized> {
    dom: &'a D,
    applied: Vec<(DomTarget, &'static str)>,
}

impl<'a, D: DomSurface + ?Sized> MarkerGuard<'a, D> {
    /// Add the export markers. On a partial failure the markers already
    /// added are removed before the error is returned.
    pub fn apply(dom: &'a D, element_id: &str) -> Result<Self> {
        let mut guard = Self {
            dom,
            applied: Vec::with_capacity(2),
        };
        for (target, class) in [
            (DomTarget::Element(element_id.to_string()), EXPORTING_CLASS),
            (DomTarget::Body, PRINT_MODE_CLASS),
        ] {
            dom.add_class(&target, class)?;
            guard.applied.push((target, class));
        }
        Ok(guard)
    }
}

impl<D: DomSurface + ?Sized> Drop for MarkerGuard<'_, D> {
    fn drop(&mut self) {
        while let Some((target, class)) = self.applied.pop() {
            self.dom.remove_class(&target, class);
        }
    }
}

/// Owns a temporary node and removes it when dropped.
pub struct TempNode<'a, D: DomSurface + ?Sized> {
    dom: &'a D,
    node: NodeId,
}

impl<'a, D: DomSurface + ?Sized> TempNode<'a, D> {
    pub fn append(dom: &'a D, parent_id: &str, text: &str) -> Result<Self> {
        let node = dom.append_temp_node(parent_id, text)?;
        debug!(node = %node, parent = parent_id, "temporary node appended");
        Ok(Self { dom, node })
    }

    pub fn id(&self) -> &str {
        &self.node
    }
}

impl<D: DomSurface + ?Sized> Drop for TempNode<'_, D> {
    fn drop(&mut self) {
        self.dom.remove_node(&self.node);
    }
}

/// A rasterized element: base64 PNG plus pixel dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub image_base64: String,
    pub width: u32,
    pub height: u32,
}

impl Snapshot {
    pub fn from_png(png: &[u8], width: u32, height: u32) -> Self {
        Self {
            image_base64: BASE64.encode(png),
            width,
            height,
        }
    }

    pub fn data_url(&self) -> String {
        format!("{PNG_DATA_URL_PREFIX}{}", self.image_base64)
    }

    pub fn png_bytes(&self) -> Result<Vec<u8>> {
        Ok(BASE64.decode(self.image_base64.as_bytes())?)
    }

    /// HTML image element carrying this snapshot, as sent in `htmlString`.
    pub fn to_markup(&self) -> String {
        format!(
            "<img src=\"{}\" width=\"{}\" height=\"{}\"/>",
            self.data_url(),
            self.width,
            self.height
        )
    }

    /// Parse the markup produced by [`Snapshot::to_markup`].
    ///
    /// The first `img` element wins. Its `src` must be a PNG data URL and
    /// both dimensions must be present and non-zero.
    pub fn from_markup(html: &str) -> Result<Self> {
        let mut reader = Reader::from_str(html);
        loop {
            match reader.read_event() {
                Ok(Event::Start(e) | Event::Empty(e))
                    if e.local_name().as_ref().eq_ignore_ascii_case(b"img") =>
                {
                    let src = attr_string(&e, b"src")
                        .ok_or_else(|| ExportError::Snapshot("img without src".to_string()))?;
                    let image_base64 = src
                        .strip_prefix(PNG_DATA_URL_PREFIX)
                        .ok_or_else(|| {
                            ExportError::Snapshot("src is not a PNG data URL".to_string())
                        })?
                        .to_string();
                    let width = attr_u32(&e, b"width").unwrap_or(0);
                    let height = attr_u32(&e, b"height").unwrap_or(0);
                    if width == 0 || height == 0 {
                        return Err(ExportError::Snapshot(format!(
                            "invalid image size {width}x{height}"
                        )));
                    }
                    return Ok(Self {
                        image_base64,
                        width,
                        height,
                    });
                }
                Ok(Event::Eof) => {
                    return Err(ExportError::Snapshot("no img element in markup".to_string()))
                }
                Ok(_) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Captures elements of one document.
pub struct Snapshotter<'a, D: DomSurface + ?Sized> {
    dom: &'a D,
    options: RasterOptions,
}

impl<'a, D: DomSurface + ?Sized> Snapshotter<'a, D> {
    pub fn new(dom: &'a D, options: RasterOptions) -> Self {
        Self { dom, options }
    }

    /// Rasterize the element with id `element_id`.
    pub async fn capture(&self, element_id: &str) -> Result<Snapshot> {
        if !self.dom.has_element(element_id) {
            return Err(ExportError::ElementNotFound(element_id.to_string()));
        }
        let raster = {
            let _markers = MarkerGuard::apply(self.dom, element_id)?;
            self.dom.rasterize(element_id, &self.options).await?
        };
        debug!(
            element = element_id,
            width = raster.width,
            height = raster.height,
            "element rasterized"
        );
        Ok(Snapshot::from_png(&raster.png, raster.width, raster.height))
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;

    #[test]
    fn test_markup_roundtrip() {
        let snap = Snapshot::from_png(b"\x89PNG", 640, 480);
        let parsed = Snapshot::from_markup(&snap.to_markup()).unwrap();
        assert_eq!(parsed, snap);
    }

    #[test]
    fn test_markup_accepts_html_style_img() {
        let html = r#"<div class="page"><IMG src="data:image/png;base64,AAAA" width="10" height="20"></div>"#;
        let snap = Snapshot::from_markup(html).unwrap();
        assert_eq!((snap.width, snap.height), (10, 20));
        assert_eq!(snap.image_base64, "AAAA");
    }

    #[test]
    fn test_markup_rejects_bad_payloads() {
        for html in [
            "<p>nothing here</p>",
            r#"<img src="https://example.com/a.png" width="1" height="1"/>"#,
            r#"<img src="data:image/png;base64,AAAA" width="0" height="1"/>"#,
            r#"<img width="1" height="1"/>"#,
        ] {
            let err = Snapshot::from_markup(html).unwrap_err();
            assert!(matches!(err, ExportError::Snapshot(_)), "{html}: {err}");
        }
    }

    #[test]
    fn test_marker_guard_removes_on_drop() {
        let dom = MemoryDom::new();
        dom.insert("report", MemoryElement::new(10, 10));
        {
            let _guard = MarkerGuard::apply(&dom, "report").unwrap();
            assert!(dom.body_has_class(PRINT_MODE_CLASS));
            assert!(dom.element_has_class("report", EXPORTING_CLASS));
        }
        assert!(!dom.body_has_class(PRINT_MODE_CLASS));
        assert!(!dom.element_has_class("report", EXPORTING_CLASS));
    }

    #[test]
    fn test_marker_guard_partial_failure_rolls_back() {
        let dom = MemoryDom::new();
        // Element missing: the first add fails, nothing is left behind
        assert!(MarkerGuard::apply(&dom, "ghost").is_err());
        assert!(!dom.body_has_class(PRINT_MODE_CLASS));
    }

    #[test]
    fn test_temp_node_removed_on_drop() {
        let dom = MemoryDom::new();
        dom.insert("report", MemoryElement::new(10, 10));
        {
            let node = TempNode::append(&dom, "report", "ESG Report").unwrap();
            assert_eq!(dom.temp_nodes("report"), vec![node.id().to_string()]);
        }
        assert!(dom.temp_nodes("report").is_empty());
    }
}
