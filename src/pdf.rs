//! Places a snapshot onto a single PDF page.
//!
//! The image is scaled to fit the page without distortion, centred
//! horizontally and anchored to the top. Content taller than the page is
//! scaled down, not split across pages: a document export is always exactly
//! one page.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use crate::error::{ExportError, Result};
use crate::snapshot::Snapshot;
use crate::types::{PageFormat, Placement};

/// MIME type of generated documents.
pub const PDF_MIME: &str = "application/pdf";

/// Compute where a `width` x `height` image lands on `page`.
pub fn fit_to_page(width: u32, height: u32, page: &PageFormat) -> Result<Placement> {
    if width == 0 || height == 0 {
        return Err(ExportError::Snapshot(format!(
            "cannot place a {width}x{height} image"
        )));
    }
    let (w, h) = (f64::from(width), f64::from(height));
    let ratio = (page.width / w).min(page.height / h);
    let placed_width = w * ratio;
    let placed_height = h * ratio;
    Ok(Placement {
        ratio,
        x: (page.width - placed_width) / 2.0,
        y: 0.0,
        width: placed_width,
        height: placed_height,
    })
}

/// Build a one-page PDF showing the snapshot.
pub fn assemble_pdf(snapshot: &Snapshot, page: &PageFormat) -> Result<Vec<u8>> {
    let png = snapshot.png_bytes()?;
    let decoded = image::load_from_memory(&png)?.to_rgb8();
    let (px_w, px_h) = decoded.dimensions();
    if (px_w, px_h) != (snapshot.width, snapshot.height) {
        tracing::warn!(
            declared_width = snapshot.width,
            declared_height = snapshot.height,
            actual_width = px_w,
            actual_height = px_h,
            "snapshot dimensions differ from image data, using declared size"
        );
    }
    let placement = fit_to_page(snapshot.width, snapshot.height, page)?;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(px_w),
            "Height" => i64::from(px_h),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        decoded.into_raw(),
    );
    let image_id = doc.add_object(image_stream);

    // PDF space has its origin bottom-left; placement is top-left
    let bottom = page.height - placement.y - placement.height;
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    real(placement.width),
                    0.into(),
                    0.into(),
                    real(placement.height),
                    real(placement.x),
                    real(bottom),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

    let resources_id = doc.add_object(dictionary! {
        "XObject" => dictionary! {
            "Im0" => image_id,
        },
    });
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), real(page.width), real(page.height)],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

fn real(v: f64) -> Object {
    Object::from(v)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp
)]
mod tests {
    use super::*;

    #[test]
    fn test_wide_image_fills_width() {
        let page = PageFormat::A4_PORTRAIT;
        let p = fit_to_page(2000, 1000, &page).unwrap();
        assert!((p.width - page.width).abs() < 1e-9);
        assert!(p.x.abs() < 1e-9);
        assert_eq!(p.y, 0.0);
        assert!(p.height < page.height);
    }

    #[test]
    fn test_small_image_scales_up() {
        let page = PageFormat::A4_PORTRAIT;
        let p = fit_to_page(100, 100, &page).unwrap();
        assert!((p.width - page.width).abs() < 1e-9);
        assert!((p.height - page.width).abs() < 1e-9);
    }

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(fit_to_page(0, 10, &PageFormat::A4_PORTRAIT).is_err());
    }
}
