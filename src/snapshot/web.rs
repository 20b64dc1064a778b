//! Browser document backed by `web_sys`, rasterized with `html2canvas`.
//!
//! `html2canvas` must be loaded on the page as a global function.

use std::cell::Cell;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use js_sys::{Object, Promise, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Document, Element, HtmlCanvasElement, HtmlElement};

use super::{DomSurface, DomTarget, NodeId, RasterImage, RasterOptions};
use crate::error::{ExportError, Result};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_name = html2canvas, catch)]
    fn html2canvas(element: &HtmlElement, options: &JsValue) -> std::result::Result<Promise, JsValue>;
}

fn js_err(context: &str) -> impl Fn(JsValue) -> ExportError + '_ {
    move |e| ExportError::Snapshot(format!("{context}: {e:?}"))
}

pub struct WebDom {
    document: Document,
    next_node: Cell<u64>,
}

impl WebDom {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            next_node: Cell::new(0),
        }
    }

    /// The document of the current window.
    pub fn current() -> Result<Self> {
        web_sys::window()
            .and_then(|w| w.document())
            .map(Self::new)
            .ok_or_else(|| ExportError::Snapshot("no document available".to_string()))
    }

    fn target(&self, target: &DomTarget) -> Option<Element> {
        match target {
            DomTarget::Body => self.document.body().map(Into::into),
            DomTarget::Element(id) => self.document.get_element_by_id(id),
        }
    }

    fn options_object(el: &HtmlElement, options: &RasterOptions) -> Result<JsValue> {
        let obj = Object::new();
        let set = |key: &str, value: JsValue| {
            Reflect::set(&obj, &JsValue::from_str(key), &value).map_err(js_err("html2canvas options"))
        };
        set("scale", JsValue::from_f64(f64::from(options.scale)))?;
        set("useCORS", JsValue::from_bool(options.use_cors))?;
        set("allowTaint", JsValue::from_bool(false))?;
        // Capture the full scrollable content, not only what is on screen
        let width = f64::from(el.scroll_width());
        let height = f64::from(el.scroll_height());
        set("width", JsValue::from_f64(width))?;
        set("height", JsValue::from_f64(height))?;
        set("windowWidth", JsValue::from_f64(width))?;
        set("windowHeight", JsValue::from_f64(height))?;
        set(
            "backgroundColor",
            options
                .background
                .as_deref()
                .map_or(JsValue::NULL, JsValue::from_str),
        )?;
        Ok(obj.into())
    }
}

impl DomSurface for WebDom {
    fn has_element(&self, id: &str) -> bool {
        self.document.get_element_by_id(id).is_some()
    }

    fn add_class(&self, target: &DomTarget, class: &str) -> Result<()> {
        let el = self
            .target(target)
            .ok_or_else(|| ExportError::ElementNotFound(format!("{target:?}")))?;
        el.class_list().add_1(class).map_err(js_err("classList.add"))
    }

    fn remove_class(&self, target: &DomTarget, class: &str) {
        if let Some(el) = self.target(target) {
            let _ = el.class_list().remove_1(class);
        }
    }

    fn append_temp_node(&self, parent_id: &str, text: &str) -> Result<NodeId> {
        let parent = self
            .document
            .get_element_by_id(parent_id)
            .ok_or_else(|| ExportError::ElementNotFound(parent_id.to_string()))?;
        let node = self
            .document
            .create_element("div")
            .map_err(js_err("createElement"))?;
        let n = self.next_node.get() + 1;
        self.next_node.set(n);
        let id = format!("export-temp-{n}");
        node.set_id(&id);
        node.set_class_name("export-print-header");
        node.set_text_content(Some(text));
        parent
            .insert_before(&node, parent.first_child().as_ref())
            .map_err(js_err("insertBefore"))?;
        Ok(id)
    }

    fn remove_node(&self, node: &NodeId) {
        if let Some(el) = self.document.get_element_by_id(node) {
            el.remove();
        }
    }

    async fn rasterize(&self, id: &str, options: &RasterOptions) -> Result<RasterImage> {
        let el = self
            .document
            .get_element_by_id(id)
            .ok_or_else(|| ExportError::ElementNotFound(id.to_string()))?
            .dyn_into::<HtmlElement>()
            .map_err(|_| ExportError::Snapshot(format!("{id:?} is not an HTML element")))?;

        let opts = Self::options_object(&el, options)?;
        let promise = html2canvas(&el, &opts).map_err(js_err("html2canvas"))?;
        let canvas = JsFuture::from(promise)
            .await
            .map_err(js_err("html2canvas"))?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| ExportError::Snapshot("html2canvas returned no canvas".to_string()))?;

        let data_url = canvas
            .to_data_url_with_type("image/png")
            .map_err(js_err("toDataURL"))?;
        let encoded = data_url
            .split_once(',')
            .map(|(_, b64)| b64)
            .ok_or_else(|| ExportError::Snapshot("unexpected data URL".to_string()))?;
        let png = BASE64.decode(encoded)?;

        Ok(RasterImage {
            png,
            width: canvas.width(),
            height: canvas.height(),
        })
    }
}
