//! Conversions at the JavaScript boundary.
//!
//! `serde_wasm_bindgen` only sees plain data: a `Date` has no own enumerable
//! properties and a `Blob` cannot be read synchronously. Records and worker
//! responses are therefore walked by hand here.

use js_sys::{Array, ArrayBuffer, Object, Reflect, Uint8Array};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Blob, BlobPropertyBag};

use crate::error::{ExportError, Result};
use crate::pdf::PDF_MIME;
use crate::types::{Record, RecordValue, SheetInput, WorkerResponse};

#[wasm_bindgen]
extern "C" {
    /// The global `String(value)` conversion.
    #[wasm_bindgen(js_name = String)]
    fn js_to_string(value: &JsValue) -> String;
}

fn js_err(e: JsValue) -> ExportError {
    ExportError::Other(js_to_string(&e))
}

/// Read `{ sheetName: [record, ...], ... }` into [`SheetInput`], keeping key order.
pub fn sheet_input_from_js(sheets: &JsValue) -> Result<SheetInput> {
    if !sheets.is_object() || Array::is_array(sheets) {
        return Err(ExportError::Other("sheet data must be a plain object".to_string()));
    }
    let object = sheets.unchecked_ref::<Object>();

    let mut input = SheetInput::new();
    for entry in Object::entries(object).iter() {
        let pair = Array::from(&entry);
        let name = js_to_string(&pair.get(0));
        let rows = pair.get(1);
        if !Array::is_array(&rows) {
            return Err(ExportError::Other(format!("sheet {name:?} is not an array")));
        }
        let records = Array::from(&rows)
            .iter()
            .map(|row| record_from_js(&name, &row))
            .collect::<Result<Vec<_>>>()?;
        input.insert(name, records);
    }
    Ok(input)
}

fn record_from_js(sheet: &str, row: &JsValue) -> Result<Record> {
    if !row.is_object() {
        return Err(ExportError::Other(format!("sheet {sheet:?} holds a non-object row")));
    }
    let object = row.unchecked_ref::<Object>();
    let mut record = Record::new();
    for entry in Object::entries(object).iter() {
        let pair = Array::from(&entry);
        record.insert(js_to_string(&pair.get(0)), record_value_from_js(&pair.get(1)));
    }
    Ok(record)
}

/// Convert one JS value, keeping `Date`s as dates.
pub fn record_value_from_js(value: &JsValue) -> RecordValue {
    if let Some(date) = value.dyn_ref::<js_sys::Date>() {
        return date_value(date);
    }
    if value.is_undefined() {
        return RecordValue::Null;
    }
    match serde_wasm_bindgen::from_value::<serde_json::Value>(value.clone()) {
        Ok(json) => RecordValue::from(json),
        // Functions, symbols, bigints
        Err(_) => RecordValue::Text(js_to_string(value)),
    }
}

/// Dates become the local wall-clock time the user saw on the page.
fn date_value(date: &js_sys::Date) -> RecordValue {
    let utc_ms = date.get_time();
    if utc_ms.is_nan() {
        return RecordValue::Text("Invalid Date".to_string());
    }
    let local_ms = utc_ms - date.get_timezone_offset() * 60_000.0;
    #[allow(clippy::cast_possible_truncation)]
    let millis = local_ms as i64;
    chrono::DateTime::from_timestamp_millis(millis).map_or_else(
        || RecordValue::Text(js_to_string(date)),
        |d| RecordValue::Date(d.naive_utc()),
    )
}

/// Wrap bytes in a `Blob` of type `mime`.
pub fn blob_from_bytes(bytes: &[u8], mime: &str) -> std::result::Result<Blob, JsValue> {
    let parts = Array::of1(&Uint8Array::from(bytes));
    let props = BlobPropertyBag::new();
    props.set_type(mime);
    Blob::new_with_u8_array_sequence_and_options(&parts, &props)
}

/// Build the message a worker posts back. The PDF travels as a `Blob`.
pub fn response_to_js(response: &WorkerResponse) -> std::result::Result<JsValue, JsValue> {
    let message = Object::new();
    Reflect::set(&message, &"success".into(), &JsValue::from_bool(response.success))?;
    Reflect::set(&message, &"filename".into(), &response.filename.as_str().into())?;
    if let Some(pdf) = &response.pdf_blob {
        Reflect::set(&message, &"pdfBlob".into(), &blob_from_bytes(pdf, PDF_MIME)?)?;
    }
    if let Some(error) = &response.error {
        Reflect::set(&message, &"error".into(), &error.as_str().into())?;
    }
    Ok(message.into())
}

/// Read a worker's message. `pdfBlob` may be a `Blob`, an `ArrayBuffer`, a
/// typed array or a plain array of bytes.
pub async fn response_from_js(data: JsValue) -> Result<WorkerResponse> {
    let malformed = |what: &str| ExportError::MalformedResponse(what.to_string());
    if !data.is_object() {
        return Err(malformed("message is not an object"));
    }
    let field = |name: &str| {
        Reflect::get(&data, &JsValue::from_str(name))
            .ok()
            .filter(|v| !v.is_undefined() && !v.is_null())
    };

    let success = field("success")
        .and_then(|v| v.as_bool())
        .ok_or_else(|| malformed("missing success"))?;
    let filename = field("filename")
        .and_then(|v| v.as_string())
        .ok_or_else(|| malformed("missing filename"))?;
    let error = field("error").map(|v| js_to_string(&v));
    let pdf_blob = match field("pdfBlob") {
        Some(blob) => Some(blob_bytes(blob).await?),
        None => None,
    };

    Ok(WorkerResponse {
        success,
        filename,
        pdf_blob,
        error,
    })
}

async fn blob_bytes(value: JsValue) -> Result<Vec<u8>> {
    let buffer = match value.dyn_ref::<Blob>() {
        Some(blob) => JsFuture::from(blob.array_buffer()).await.map_err(js_err)?,
        None => value,
    };
    if buffer.is_instance_of::<ArrayBuffer>()
        || buffer.is_instance_of::<Uint8Array>()
        || Array::is_array(&buffer)
    {
        Ok(Uint8Array::new(&buffer).to_vec())
    } else {
        Err(ExportError::MalformedResponse(
            "pdfBlob is not binary data".to_string(),
        ))
    }
}
