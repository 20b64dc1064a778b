//! In-memory document used by the CLI and by tests.
//!
//! Elements have a natural scroll size (which may exceed their visible
//! client size) and either a backing image or a flat fill colour. Rasterizing
//! scales the backing image to `scroll size * scale`.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap};
use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use super::{DomSurface, DomTarget, NodeId, RasterImage, RasterOptions};
use crate::error::{ExportError, Result};

#[derive(Debug, Clone)]
pub struct MemoryElement {
    pub scroll_width: u32,
    pub scroll_height: u32,
    pub client_width: u32,
    pub client_height: u32,
    pub content: Option<DynamicImage>,
    pub fill: [u8; 4],
    classes: BTreeSet<String>,
    temp_nodes: Vec<(NodeId, String)>,
}

impl MemoryElement {
    /// An element whose full content is visible (`client == scroll`).
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            scroll_width: width,
            scroll_height: height,
            client_width: width,
            client_height: height,
            content: None,
            fill: [255, 255, 255, 255],
            classes: BTreeSet::new(),
            temp_nodes: Vec::new(),
        }
    }

    /// An element showing `image` at its own pixel size.
    pub fn from_image(image: DynamicImage) -> Self {
        let mut el = Self::new(image.width(), image.height());
        el.content = Some(image);
        el
    }

    /// Shrink the visible area while keeping the scroll size.
    #[must_use]
    pub fn with_viewport(mut self, client_width: u32, client_height: u32) -> Self {
        self.client_width = client_width;
        self.client_height = client_height;
        self
    }

    #[must_use]
    pub fn with_fill(mut self, rgba: [u8; 4]) -> Self {
        self.fill = rgba;
        self
    }
}

/// A document made of id-addressable elements and a body class list.
#[derive(Debug, Default)]
pub struct MemoryDom {
    elements: RefCell<HashMap<String, MemoryElement>>,
    body_classes: RefCell<BTreeSet<String>>,
    next_node: Cell<u64>,
    fail_rasterize: Cell<bool>,
    raster_calls: Cell<usize>,
    classes_during_raster: RefCell<Vec<String>>,
}

impl MemoryDom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: &str, element: MemoryElement) {
        self.elements.borrow_mut().insert(id.to_string(), element);
    }

    /// Make every following rasterization fail.
    pub fn fail_rasterize(&self, fail: bool) {
        self.fail_rasterize.set(fail);
    }

    pub fn raster_calls(&self) -> usize {
        self.raster_calls.get()
    }

    /// Body and element classes observed by the last rasterization, as
    /// `body:<class>` / `element:<class>`.
    pub fn classes_during_raster(&self) -> Vec<String> {
        self.classes_during_raster.borrow().clone()
    }

    pub fn body_has_class(&self, class: &str) -> bool {
        self.body_classes.borrow().contains(class)
    }

    pub fn element_has_class(&self, id: &str, class: &str) -> bool {
        self.elements
            .borrow()
            .get(id)
            .is_some_and(|el| el.classes.contains(class))
    }

    /// Ids of the temporary nodes currently attached to `id`.
    pub fn temp_nodes(&self, id: &str) -> Vec<NodeId> {
        self.elements
            .borrow()
            .get(id)
            .map(|el| el.temp_nodes.iter().map(|(n, _)| n.clone()).collect())
            .unwrap_or_default()
    }

    fn render(&self, id: &str, options: &RasterOptions) -> Result<RasterImage> {
        let elements = self.elements.borrow();
        let el = elements
            .get(id)
            .ok_or_else(|| ExportError::ElementNotFound(id.to_string()))?;

        let width = scaled(el.scroll_width, options.scale);
        let height = scaled(el.scroll_height, options.scale);
        if width == 0 || height == 0 {
            return Err(ExportError::Snapshot(format!(
                "element {id:?} has no renderable size"
            )));
        }

        let image = match &el.content {
            Some(content) => content.resize_exact(width, height, FilterType::Triangle),
            None => DynamicImage::ImageRgba8(RgbaImage::from_pixel(
                width,
                height,
                Rgba(el.fill),
            )),
        };

        let mut png = Vec::new();
        image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        Ok(RasterImage { png, width, height })
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scaled(px: u32, scale: f32) -> u32 {
    let v = (f64::from(px) * f64::from(scale)).round();
    if v <= 0.0 {
        0
    } else if v >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        v as u32
    }
}

impl DomSurface for MemoryDom {
    fn has_element(&self, id: &str) -> bool {
        self.elements.borrow().contains_key(id)
    }

    fn add_class(&self, target: &DomTarget, class: &str) -> Result<()> {
        match target {
            DomTarget::Body => {
                self.body_classes.borrow_mut().insert(class.to_string());
            }
            DomTarget::Element(id) => {
                let mut elements = self.elements.borrow_mut();
                let el = elements
                    .get_mut(id)
                    .ok_or_else(|| ExportError::ElementNotFound(id.clone()))?;
                el.classes.insert(class.to_string());
            }
        }
        Ok(())
    }

    fn remove_class(&self, target: &DomTarget, class: &str) {
        match target {
            DomTarget::Body => {
                self.body_classes.borrow_mut().remove(class);
            }
            DomTarget::Element(id) => {
                if let Some(el) = self.elements.borrow_mut().get_mut(id) {
                    el.classes.remove(class);
                }
            }
        }
    }

    fn append_temp_node(&self, parent_id: &str, text: &str) -> Result<NodeId> {
        let mut elements = self.elements.borrow_mut();
        let el = elements
            .get_mut(parent_id)
            .ok_or_else(|| ExportError::ElementNotFound(parent_id.to_string()))?;
        let n = self.next_node.get() + 1;
        self.next_node.set(n);
        let node = format!("export-temp-{n}");
        el.temp_nodes.insert(0, (node.clone(), text.to_string()));
        Ok(node)
    }

    fn remove_node(&self, node: &NodeId) {
        for el in self.elements.borrow_mut().values_mut() {
            el.temp_nodes.retain(|(n, _)| n != node);
        }
    }

    async fn rasterize(&self, id: &str, options: &RasterOptions) -> Result<RasterImage> {
        self.raster_calls.set(self.raster_calls.get() + 1);
        {
            let mut seen: Vec<String> = self
                .body_classes
                .borrow()
                .iter()
                .map(|c| format!("body:{c}"))
                .collect();
            if let Some(el) = self.elements.borrow().get(id) {
                seen.extend(el.classes.iter().map(|c| format!("element:{c}")));
            }
            *self.classes_during_raster.borrow_mut() = seen;
        }
        if self.fail_rasterize.get() {
            return Err(ExportError::Snapshot("rasterizer failed".to_string()));
        }
        self.render(id, options)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    fn opts(scale: f32) -> RasterOptions {
        RasterOptions {
            scale,
            use_cors: true,
            background: None,
        }
    }

    #[test]
    fn test_rasterize_uses_scroll_size_not_viewport() {
        let dom = MemoryDom::new();
        dom.insert("r", MemoryElement::new(30, 60).with_viewport(30, 20));
        let raster = block_on(dom.rasterize("r", &opts(2.0))).unwrap();
        assert_eq!((raster.width, raster.height), (60, 120));
        let decoded = image::load_from_memory(&raster.png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (60, 120));
    }

    #[test]
    fn test_rasterize_fill_colour() {
        let dom = MemoryDom::new();
        dom.insert("r", MemoryElement::new(2, 2).with_fill([10, 20, 30, 255]));
        let raster = block_on(dom.rasterize("r", &opts(1.0))).unwrap();
        let decoded = image::load_from_memory(&raster.png).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(1, 1).0, [10, 20, 30, 255]);
    }

    #[test]
    fn test_zero_size_fails() {
        let dom = MemoryDom::new();
        dom.insert("r", MemoryElement::new(0, 10));
        assert!(block_on(dom.rasterize("r", &opts(2.0))).is_err());
    }

    #[test]
    fn test_scaled() {
        assert_eq!(scaled(100, 2.0), 200);
        assert_eq!(scaled(3, 1.5), 5);
        assert_eq!(scaled(10, 0.0), 0);
    }
}
