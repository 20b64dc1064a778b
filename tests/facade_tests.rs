//! Tests for the two export entry points: outcomes, notifications and DOM
//! cleanup on every exit path.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::panic
)]

mod common;

use common::{
    dom_with_element, exporter, resources_and_data_points, Script, ScriptedSpawner, ELEMENT_ID,
};
use esg_export::config::{ExportConfig, OffloadMode};
use esg_export::export::XLSX_MIME;
use esg_export::pdf::PDF_MIME;
use esg_export::reader::read_workbook;
use esg_export::snapshot::{MemoryDom, MemoryElement, EXPORTING_CLASS, PRINT_MODE_CLASS};
use esg_export::{NotificationVariant, SheetInput, WorkerResponse};
use futures::executor::block_on;

const GENERIC: &str = "The export could not be completed. Please try again.";

fn assert_dom_clean(dom: &MemoryDom) {
    assert!(!dom.body_has_class(PRINT_MODE_CLASS));
    assert!(!dom.element_has_class(ELEMENT_ID, EXPORTING_CLASS));
    assert!(dom.temp_nodes(ELEMENT_ID).is_empty());
}

#[test]
fn test_document_export_happy_path() {
    let spawner = ScriptedSpawner::new(Script::Assemble);
    let (exporter, notes) = exporter(
        ExportConfig::default(),
        dom_with_element(500, 1000),
        spawner.clone(),
    );

    assert!(block_on(exporter.export_document(ELEMENT_ID, "esg-report.pdf")));

    let file = exporter.sink().take("esg-report.pdf").unwrap();
    assert_eq!(file.mime, PDF_MIME);
    let doc = lopdf::Document::load_mem(&file.bytes).unwrap();
    assert_eq!(doc.get_pages().len(), 1);

    let notes = notes.notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].variant, NotificationVariant::Default);
    assert_eq!(spawner.spawned(), 1);
    assert_eq!(spawner.terminated(), 1);
    assert_dom_clean(exporter.dom());
}

#[test]
fn test_snapshot_uses_scroll_size_at_double_scale() {
    let dom = MemoryDom::new();
    dom.insert(ELEMENT_ID, MemoryElement::new(300, 900).with_viewport(300, 400));
    let spawner = ScriptedSpawner::new(Script::Assemble);
    let (exporter, _) = exporter(ExportConfig::default(), dom, spawner.clone());

    assert!(block_on(exporter.export_document(ELEMENT_ID, "r.pdf")));
    let request = spawner.stats.requests.borrow()[0].clone();
    assert!(request.html_string.contains(r#"width="600" height="1800""#));
    assert_eq!(request.filename, "r.pdf");
}

#[test]
fn test_markers_present_only_during_capture() {
    let spawner = ScriptedSpawner::new(Script::Assemble);
    let (exporter, _) = exporter(ExportConfig::default(), dom_with_element(10, 10), spawner);

    assert!(block_on(exporter.export_document(ELEMENT_ID, "r.pdf")));
    let seen = exporter.dom().classes_during_raster();
    assert!(seen.contains(&format!("body:{PRINT_MODE_CLASS}")));
    assert!(seen.contains(&format!("element:{EXPORTING_CLASS}")));
    assert_dom_clean(exporter.dom());
}

#[test]
fn test_missing_element_notifies_once_without_worker() {
    let spawner = ScriptedSpawner::new(Script::Assemble);
    let (exporter, notes) =
        exporter(ExportConfig::default(), MemoryDom::new(), spawner.clone());

    assert!(!block_on(exporter.export_document("does-not-exist", "r.pdf")));

    assert_eq!(spawner.spawned(), 0);
    assert_eq!(exporter.dom().raster_calls(), 0);
    assert!(exporter.sink().is_empty());
    let notes = notes.notifications();
    assert_eq!(notes.len(), 1);
    assert!(notes[0].is_failure());
}

#[test]
fn test_rasterizer_failure_cleans_up() {
    let config = ExportConfig {
        print_header: Some("ESG Report 2024".to_string()),
        ..ExportConfig::default()
    };
    let spawner = ScriptedSpawner::new(Script::Assemble);
    let (exporter, notes) = exporter(config, dom_with_element(10, 10), spawner.clone());
    exporter.dom().fail_rasterize(true);

    assert!(!block_on(exporter.export_document(ELEMENT_ID, "r.pdf")));

    assert_dom_clean(exporter.dom());
    assert_eq!(spawner.spawned(), 0);
    let notes = notes.notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].description, GENERIC);
}

#[test]
fn test_print_header_removed_after_success() {
    let config = ExportConfig {
        print_header: Some("ESG Report 2024".to_string()),
        ..ExportConfig::default()
    };
    let spawner = ScriptedSpawner::new(Script::Assemble);
    let (exporter, _) = exporter(config, dom_with_element(10, 10), spawner);
    assert!(block_on(exporter.export_document(ELEMENT_ID, "r.pdf")));
    assert_dom_clean(exporter.dom());
}

#[test]
fn test_worker_error_message_reaches_user() {
    let spawner = ScriptedSpawner::new(Script::Respond(WorkerResponse::failed(
        "r.pdf",
        "Image exceeds maximum canvas size",
    )));
    let (exporter, notes) = exporter(
        ExportConfig::default(),
        dom_with_element(10, 10),
        spawner.clone(),
    );

    assert!(!block_on(exporter.export_document(ELEMENT_ID, "r.pdf")));

    let notes = notes.notifications();
    assert_eq!(notes.len(), 1);
    assert!(notes[0].is_failure());
    assert_eq!(notes[0].description, "Image exceeds maximum canvas size");
    assert_eq!(spawner.terminated(), 1);
    assert!(exporter.sink().is_empty());
    assert_dom_clean(exporter.dom());
}

#[test]
fn test_transport_error_shows_generic_message() {
    let spawner = ScriptedSpawner::new(Script::TransportError(
        "Uncaught ReferenceError: jsPDF is not defined".to_string(),
    ));
    let (exporter, notes) = exporter(
        ExportConfig::default(),
        dom_with_element(10, 10),
        spawner.clone(),
    );

    assert!(!block_on(exporter.export_document(ELEMENT_ID, "r.pdf")));

    let notes = notes.notifications();
    assert_eq!(notes[0].description, GENERIC);
    assert_eq!(spawner.terminated(), 1);
}

#[test]
fn test_inline_config_never_spawns() {
    let config = ExportConfig {
        offload: OffloadMode::Inline,
        ..ExportConfig::default()
    };
    let spawner = ScriptedSpawner::new(Script::Assemble);
    let (exporter, _) = exporter(config, dom_with_element(10, 10), spawner.clone());
    assert!(block_on(exporter.export_document(ELEMENT_ID, "r.pdf")));
    assert_eq!(spawner.spawned(), 0);
    assert_eq!(exporter.sink().len(), 1);
}

#[test]
fn test_spreadsheet_export_saves_and_notifies() {
    let spawner = ScriptedSpawner::new(Script::Assemble);
    let (exporter, notes) =
        exporter(ExportConfig::default(), MemoryDom::new(), spawner.clone());

    assert!(block_on(exporter.export_spreadsheet(&resources_and_data_points(), "x.xlsx")));

    let file = exporter.sink().take("x.xlsx").unwrap();
    assert_eq!(file.mime, XLSX_MIME);
    let workbook = read_workbook(&file.bytes).unwrap();
    assert_eq!(workbook.sheet_names(), ["resources", "dataPoints"]);
    assert_eq!(spawner.spawned(), 0);
    let notes = notes.notifications();
    assert_eq!(notes.len(), 1);
    assert!(!notes[0].is_failure());
}

#[test]
fn test_spreadsheet_duplicate_sheet_names_fail() {
    let mut input = resources_and_data_points();
    let resources = input["resources"].clone();
    input.insert("Resources".to_string(), resources);
    let (exporter, notes) = exporter(
        ExportConfig::default(),
        MemoryDom::new(),
        ScriptedSpawner::new(Script::Assemble),
    );

    assert!(!block_on(exporter.export_spreadsheet(&input, "x.xlsx")));
    assert!(exporter.sink().is_empty());
    assert!(notes.notifications()[0].is_failure());
}

#[test]
fn test_spreadsheet_with_only_empty_sheets_still_saves() {
    let mut input = SheetInput::new();
    input.insert("resources".to_string(), Vec::new());
    let (exporter, _) = exporter(
        ExportConfig::default(),
        MemoryDom::new(),
        ScriptedSpawner::new(Script::Assemble),
    );
    assert!(block_on(exporter.export_spreadsheet(&input, "empty.xlsx")));
    let file = exporter.sink().take("empty.xlsx").unwrap();
    assert!(read_workbook(&file.bytes).unwrap().sheets.is_empty());
}
