//! Generates worksheet XML from a [`Sheet`].
//!
//! Strings are written inline (`t="inlineStr"`) so no shared string table is
//! needed. Row 1 is the header row and carries the bold style.

use chrono::{NaiveDate, NaiveDateTime};

use crate::cell_ref::{cell_ref, col_to_letter};
use crate::config::ColumnWidths;
use crate::types::{CellValue, Sheet};
use crate::xml_helpers::xml_escape;

/// Style index of the bold header cells in `styles.xml`.
pub(crate) const HEADER_STYLE: u32 = 1;
/// Style index of date cells in `styles.xml`.
pub(crate) const DATE_STYLE: u32 = 2;

/// Write a complete worksheet XML string from a `Sheet`.
pub(crate) fn write_sheet_xml(sheet: &Sheet, widths: &ColumnWidths) -> String {
    let mut out = String::with_capacity(4096 + sheet.rows.len() * 64);
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    out.push('\n');
    out.push_str(
        r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" "#,
    );
    out.push_str(
        r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
    );
    out.push('\n');

    // <dimension>
    let cols = u32::try_from(sheet.column_count()).unwrap_or(u32::MAX);
    let rows = u32::try_from(sheet.row_count()).unwrap_or(u32::MAX);
    if cols > 0 {
        out.push_str(&format!(
            "<dimension ref=\"A1:{}{}\"/>\n",
            col_to_letter(cols - 1),
            rows
        ));
    }

    // <cols>
    let col_widths = column_widths(sheet, widths);
    if !col_widths.is_empty() {
        out.push_str("<cols>\n");
        for (idx, width) in col_widths.iter().enumerate() {
            let col1 = idx + 1; // XLSX is 1-based
            out.push_str(&format!(
                "<col min=\"{col1}\" max=\"{col1}\" width=\"{width}\" customWidth=\"1\"/>\n"
            ));
        }
        out.push_str("</cols>\n");
    }

    // <sheetData>
    out.push_str("<sheetData>\n");
    if cols > 0 {
        write_header_row(&mut out, &sheet.headers);
        for (idx, row) in sheet.rows.iter().enumerate() {
            // Data starts on the second row
            let r = u32::try_from(idx + 1).unwrap_or(u32::MAX);
            write_row(&mut out, r, row);
        }
    }
    out.push_str("</sheetData>\n");

    out.push_str("</worksheet>");
    out
}

/// Character width of every column: the widest of header and cells, padded and clamped.
pub fn column_widths(sheet: &Sheet, widths: &ColumnWidths) -> Vec<usize> {
    sheet
        .headers
        .iter()
        .enumerate()
        .map(|(col, header)| {
            let longest = sheet
                .column(col)
                .map(CellValue::display_len)
                .max()
                .unwrap_or(0);
            widths.width_for(header.chars().count().max(longest))
        })
        .collect()
}

fn write_header_row(out: &mut String, headers: &[String]) {
    out.push_str("<row r=\"1\">");
    for (col, header) in headers.iter().enumerate() {
        let col = u32::try_from(col).unwrap_or(u32::MAX);
        write_inline_string(out, &cell_ref(0, col), header, Some(HEADER_STYLE));
    }
    out.push_str("</row>\n");
}

fn write_row(out: &mut String, row: u32, cells: &[CellValue]) {
    out.push_str(&format!("<row r=\"{}\">", row + 1));
    for (col, cell) in cells.iter().enumerate() {
        let col = u32::try_from(col).unwrap_or(u32::MAX);
        write_cell(out, row, col, cell);
    }
    out.push_str("</row>\n");
}

/// Write a single `<c>` element. `Null` cells are omitted.
fn write_cell(out: &mut String, row: u32, col: u32, cell: &CellValue) {
    let r = cell_ref(row, col);
    match cell {
        CellValue::Null => {}
        CellValue::String(s) => write_inline_string(out, &r, s, None),
        CellValue::Number(n) => {
            out.push_str(&format!("<c r=\"{r}\"><v>{n}</v></c>"));
        }
        CellValue::Boolean(b) => {
            let val = if *b { "1" } else { "0" };
            out.push_str(&format!("<c r=\"{r}\" t=\"b\"><v>{val}</v></c>"));
        }
        CellValue::Date(d) => {
            out.push_str(&format!(
                "<c r=\"{r}\" s=\"{DATE_STYLE}\"><v>{}</v></c>",
                date_to_serial(d)
            ));
        }
    }
}

fn write_inline_string(out: &mut String, r: &str, text: &str, style: Option<u32>) {
    out.push_str(&format!("<c r=\"{r}\""));
    if let Some(s) = style {
        out.push_str(&format!(" s=\"{s}\""));
    }
    out.push_str(" t=\"inlineStr\"><is><t");
    if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
        out.push_str(" xml:space=\"preserve\"");
    }
    out.push('>');
    out.push_str(&xml_escape(text));
    out.push_str("</t></is></c>");
}

/// Day zero of the 1900 date system as Excel counts it (the leap-year bug included).
fn excel_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Convert a date-time into an Excel serial number.
pub(crate) fn date_to_serial(d: &NaiveDateTime) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let millis = (*d - excel_epoch()).num_milliseconds() as f64;
    millis / MILLIS_PER_DAY
}

/// Convert an Excel serial number back into a date-time, at millisecond precision.
pub(crate) fn serial_to_date(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    let millis = (serial * MILLIS_PER_DAY).round() as i64;
    excel_epoch().checked_add_signed(chrono::Duration::milliseconds(millis))
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

    fn sample() -> Sheet {
        let mut sheet = Sheet::new("S", vec!["Title".into(), "Score".into(), "Ok".into()]);
        sheet.push_row(vec![
            CellValue::from(" padded"),
            CellValue::Number(2.5),
            CellValue::Boolean(true),
        ]);
        sheet.push_row(vec![CellValue::from("a<b"), CellValue::Null, CellValue::Null]);
        sheet
    }

    #[test]
    fn test_header_row_is_bold() {
        let xml = write_sheet_xml(&sample(), &ColumnWidths::default());
        assert!(xml.contains(r#"<c r="A1" s="1" t="inlineStr"><is><t>Title</t></is></c>"#));
        assert!(xml.contains(r#"<dimension ref="A1:C3"/>"#));
    }

    #[test]
    fn test_cell_kinds() {
        let xml = write_sheet_xml(&sample(), &ColumnWidths::default());
        assert!(xml.contains(r#"<c r="A2" t="inlineStr"><is><t xml:space="preserve"> padded</t></is></c>"#));
        assert!(xml.contains(r#"<c r="B2"><v>2.5</v></c>"#));
        assert!(xml.contains(r#"<c r="C2" t="b"><v>1</v></c>"#));
        assert!(xml.contains("a&lt;b"));
        // Null cells are omitted entirely
        assert!(!xml.contains(r#"r="B3""#));
    }

    #[test]
    fn test_column_widths() {
        let widths = column_widths(&sample(), &ColumnWidths::default());
        assert_eq!(widths, vec![10, 10, 10]);

        let mut wide = Sheet::new("W", vec!["Description".into()]);
        wide.push_row(vec![CellValue::from("x".repeat(80))]);
        assert_eq!(column_widths(&wide, &ColumnWidths::default()), vec![50]);
    }

    #[test]
    fn test_empty_headers_write_no_rows() {
        let xml = write_sheet_xml(&Sheet::new("E", vec![]), &ColumnWidths::default());
        assert!(xml.contains("<sheetData>\n</sheetData>"));
        assert!(!xml.contains("<dimension"));
    }

    #[test]
    fn test_date_serial_roundtrip() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let serial = date_to_serial(&d);
        assert_eq!(serial, 45352.5);
        assert_eq!(serial_to_date(serial), Some(d));
    }
}
