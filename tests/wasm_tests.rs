//! Browser-only checks for the exported JavaScript surface.
//!
//! Run with: wasm-pack test --headless --chrome
#![cfg(target_arch = "wasm32")]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::io::Cursor;

use chrono::NaiveDate;
use esg_export::browser::{response_from_js, sheet_input_from_js};
use esg_export::config::ColumnWidths;
use esg_export::export::serialize_workbook;
use esg_export::reader::read_workbook;
use esg_export::sheet_builder::build_workbook;
use esg_export::snapshot::Snapshot;
use esg_export::{handle_worker_message, version, CellValue, WorkerRequest, WorkerResponse};
use image::{DynamicImage, ImageFormat, RgbImage};
use js_sys::{Array, Object, Reflect, Uint8Array};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn set(target: &Object, key: &str, value: &JsValue) {
    Reflect::set(target, &JsValue::from_str(key), value).unwrap();
}

fn png_markup(width: u32, height: u32) -> String {
    let mut png = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::new(width, height))
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .unwrap();
    Snapshot::from_png(&png, width, height).to_markup()
}

#[wasm_bindgen_test]
fn test_version_is_set() {
    assert!(!version().is_empty());
}

#[wasm_bindgen_test]
fn test_js_date_reads_back_as_date_cell() {
    // Months are zero-based; the constructor takes local time
    let published = js_sys::Date::new_with_year_month_day_hr_min_sec(2024, 2, 15, 9, 30, 0);
    let record = Object::new();
    set(&record, "Title", &JsValue::from_str("Water policy"));
    set(&record, "Published", &published);
    let sheets = Object::new();
    set(&sheets, "resources", &Array::of1(&record));

    let input = sheet_input_from_js(&sheets).unwrap();
    let workbook = build_workbook(&input).unwrap();
    let xlsx = serialize_workbook(&workbook, &ColumnWidths::default()).unwrap();
    let back = read_workbook(&xlsx).unwrap();

    let sheet = back.sheet("resources").unwrap();
    assert_eq!(sheet.headers, ["Title", "Published"]);
    let expected = NaiveDate::from_ymd_opt(2024, 3, 15)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap();
    assert_eq!(sheet.cell(0, 1), Some(&CellValue::Date(expected)));
}

#[wasm_bindgen_test]
fn test_sheet_input_rejects_non_array_sheet() {
    let sheets = Object::new();
    set(&sheets, "resources", &JsValue::from_str("not rows"));
    assert!(sheet_input_from_js(&sheets).is_err());
}

#[wasm_bindgen_test]
fn test_worker_message_without_image_fails_softly() {
    let request = WorkerRequest::generate_pdf("<p>empty</p>", "r.pdf");
    let reply = handle_worker_message(serde_wasm_bindgen::to_value(&request).unwrap());
    let response: WorkerResponse = serde_wasm_bindgen::from_value(reply).unwrap();
    assert!(!response.success);
    assert_eq!(response.filename, "r.pdf");
    assert!(response.error.is_some());
}

#[wasm_bindgen_test]
fn test_worker_message_with_wrong_shape_fails_softly() {
    let reply = handle_worker_message(JsValue::from_str("generatePdf"));
    let response: WorkerResponse = serde_wasm_bindgen::from_value(reply).unwrap();
    assert!(!response.success);
}

#[wasm_bindgen_test]
async fn test_worker_reply_carries_pdf_as_blob() {
    let request = WorkerRequest::generate_pdf(png_markup(20, 40), "r.pdf");
    let reply = handle_worker_message(serde_wasm_bindgen::to_value(&request).unwrap());

    let blob = Reflect::get(&reply, &JsValue::from_str("pdfBlob")).unwrap();
    let blob = blob.dyn_into::<web_sys::Blob>().expect("pdfBlob is a Blob");
    assert_eq!(blob.type_(), "application/pdf");

    let response = response_from_js(reply).await.unwrap();
    assert!(response.success);
    assert_eq!(response.filename, "r.pdf");
    assert!(response.into_pdf().unwrap().starts_with(b"%PDF-"));
}

#[wasm_bindgen_test]
async fn test_worker_reply_accepts_typed_array() {
    let reply = Object::new();
    set(&reply, "success", &JsValue::TRUE);
    set(&reply, "filename", &JsValue::from_str("r.pdf"));
    set(&reply, "pdfBlob", &Uint8Array::from(&b"%PDF-1.5"[..]));

    let response = response_from_js(reply.into()).await.unwrap();
    assert_eq!(response.into_pdf().unwrap(), b"%PDF-1.5");
}

#[wasm_bindgen_test]
async fn test_worker_reply_with_text_blob_is_malformed() {
    let reply = Object::new();
    set(&reply, "success", &JsValue::TRUE);
    set(&reply, "filename", &JsValue::from_str("r.pdf"));
    set(&reply, "pdfBlob", &JsValue::from_str("%PDF"));
    assert!(response_from_js(reply.into()).await.is_err());
}
