//! Tests for page placement and single-page PDF assembly.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::panic
)]

mod common;

use common::png_bytes;
use esg_export::pdf::{assemble_pdf, fit_to_page};
use esg_export::snapshot::Snapshot;
use esg_export::PageFormat;
use lopdf::{Document, Object};
use test_case::test_case;

fn number(obj: &Object) -> f64 {
    match obj {
        Object::Integer(i) => *i as f64,
        Object::Real(r) => f64::from(*r),
        other => panic!("not a number: {other:?}"),
    }
}

fn media_box(doc: &Document) -> Vec<f64> {
    let pages = doc.get_pages();
    let page_id = *pages.values().next().unwrap();
    let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
    page.get(b"MediaBox")
        .unwrap()
        .as_array()
        .unwrap()
        .iter()
        .map(number)
        .collect()
}

#[test]
fn test_tall_snapshot_on_a4() {
    let page = PageFormat::A4_PORTRAIT;
    let p = fit_to_page(1000, 2000, &page).unwrap();

    assert!((p.ratio - 0.421).abs() < 1e-3, "ratio {}", p.ratio);
    assert!((p.width - 421.0).abs() < 1.0, "width {}", p.width);
    assert!((p.height - 842.0).abs() < 1.0, "height {}", p.height);
    // Height-bound, so the narrower image is centred horizontally
    assert!((p.x - (page.width - p.width) / 2.0).abs() < 1e-9);
    assert!((p.x - 87.2).abs() < 0.5, "x {}", p.x);
    assert_eq!(p.y, 0.0);
}

#[test_case(1000, 2000 ; "tall")]
#[test_case(2000, 1000 ; "wide")]
#[test_case(595, 842 ; "page sized")]
#[test_case(1, 1 ; "single pixel")]
#[test_case(300, 20000 ; "very long page")]
#[test_case(40000, 10 ; "very wide strip")]
fn test_placement_stays_on_page(width: u32, height: u32) {
    let page = PageFormat::A4_PORTRAIT;
    let p = fit_to_page(width, height, &page).unwrap();
    let eps = 1e-6;

    assert!(p.width <= page.width + eps);
    assert!(p.height <= page.height + eps);
    assert!(p.x >= -eps);
    assert!(p.x + p.width <= page.width + eps);
    assert!((p.x - (page.width - f64::from(width) * p.ratio) / 2.0).abs() < eps);
    // Aspect ratio preserved
    let src = f64::from(width) / f64::from(height);
    assert!((p.width / p.height - src).abs() / src < 1e-9);
    // One side always touches the page edge
    assert!((p.width - page.width).abs() < eps || (p.height - page.height).abs() < eps);
}

#[test]
fn test_zero_sized_snapshot_is_rejected() {
    assert!(fit_to_page(0, 0, &PageFormat::A4_PORTRAIT).is_err());
}

#[test]
fn test_assembled_pdf_has_one_a4_page() {
    let snapshot = Snapshot::from_png(&png_bytes(100, 200), 100, 200);
    let bytes = assemble_pdf(&snapshot, &PageFormat::A4_PORTRAIT).unwrap();
    assert!(bytes.starts_with(b"%PDF-1.5"));

    let doc = Document::load_mem(&bytes).unwrap();
    assert_eq!(doc.get_pages().len(), 1);
    let mb = media_box(&doc);
    assert_eq!(mb.len(), 4);
    assert!((mb[2] - 595.28).abs() < 0.01);
    assert!((mb[3] - 841.89).abs() < 0.01);
}

#[test]
fn test_long_content_is_not_paginated() {
    // Ten pages' worth of content still lands on a single page
    let snapshot = Snapshot::from_png(&png_bytes(20, 2000), 20, 2000);
    let bytes = assemble_pdf(&snapshot, &PageFormat::A4_PORTRAIT).unwrap();
    let doc = Document::load_mem(&bytes).unwrap();
    assert_eq!(doc.get_pages().len(), 1);
}

#[test]
fn test_pdf_embeds_image_at_pixel_size() {
    let snapshot = Snapshot::from_png(&png_bytes(64, 32), 64, 32);
    let bytes = assemble_pdf(&snapshot, &PageFormat::A4_PORTRAIT).unwrap();
    let doc = Document::load_mem(&bytes).unwrap();

    let image = doc
        .objects
        .values()
        .find_map(|obj| match obj {
            Object::Stream(s) if s.dict.get(b"Subtype").ok() == Some(&Object::Name(b"Image".to_vec())) => {
                Some(s)
            }
            _ => None,
        })
        .expect("an image XObject");
    assert_eq!(image.dict.get(b"Width").unwrap(), &Object::Integer(64));
    assert_eq!(image.dict.get(b"Height").unwrap(), &Object::Integer(32));
}

#[test]
fn test_invalid_png_is_an_error() {
    let snapshot = Snapshot::from_png(b"not a png", 10, 10);
    assert!(assemble_pdf(&snapshot, &PageFormat::A4_PORTRAIT).is_err());
}
