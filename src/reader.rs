//! Reads an `.xlsx` package back into a [`Workbook`].
//!
//! Covers what spreadsheet exports contain: sheet order and names, inline and
//! shared strings, numbers, booleans and date-formatted numbers. Formulas,
//! rich formatting and drawings are ignored. The first row of each sheet
//! becomes its header row.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::ZipArchive;

use crate::cell_ref::parse_cell_ref_bytes;
use crate::error::{ExportError, Result};
use crate::export::sheet_writer::serial_to_date;
use crate::types::{CellValue, Sheet, Workbook};
use crate::xml_helpers::{attr_string, attr_string_local, attr_u32, local_name_string};

type Archive<'a> = ZipArchive<Cursor<&'a [u8]>>;

/// Largest rectangle (rows x columns) a sheet may span when read back.
///
/// The grid is dense, so its size comes from the furthest cell reference,
/// not from how many cells the file actually holds.
pub const MAX_READ_CELLS: u64 = 4_194_304;

/// Parse `.xlsx` bytes into a workbook.
pub fn read_workbook(data: &[u8]) -> Result<Workbook> {
    let mut archive = ZipArchive::new(Cursor::new(data))?;

    let sheet_refs = read_sheet_refs(&mut archive)?;
    let targets = read_relationships(&mut archive)?;
    let shared = match read_entry(&mut archive, "xl/sharedStrings.xml")? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };
    let date_styles = match read_entry(&mut archive, "xl/styles.xml")? {
        Some(xml) => parse_date_styles(&xml)?,
        None => Vec::new(),
    };

    let mut workbook = Workbook::new();
    for (name, rel_id) in sheet_refs {
        let target = targets
            .get(&rel_id)
            .ok_or_else(|| ExportError::Other(format!("sheet {name:?} has no relationship")))?;
        let path = resolve_target(target);
        let xml = read_entry(&mut archive, &path)?
            .ok_or_else(|| ExportError::Other(format!("missing worksheet part {path}")))?;
        let grid = parse_sheet_cells(&xml, &shared, &date_styles)?;
        workbook.push_sheet(grid_to_sheet(name, grid)?)?;
    }
    Ok(workbook)
}

fn read_entry(archive: &mut Archive<'_>, name: &str) -> Result<Option<String>> {
    let mut file = match archive.by_name(name) {
        Ok(f) => f,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut out = String::new();
    file.read_to_string(&mut out)?;
    Ok(Some(out))
}

/// Targets in the workbook rels are relative to `xl/` unless absolute.
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(abs) => abs.to_string(),
        None => format!("xl/{target}"),
    }
}

/// `(sheet name, relationship id)` in workbook order.
fn read_sheet_refs(archive: &mut Archive<'_>) -> Result<Vec<(String, String)>> {
    let xml = read_entry(archive, "xl/workbook.xml")?
        .ok_or_else(|| ExportError::Other("missing xl/workbook.xml".to_string()))?;
    let mut reader = Reader::from_str(&xml);
    let mut refs = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                let name = attr_string(&e, b"name").unwrap_or_default();
                let id = attr_string_local(&e, b"id").unwrap_or_default();
                refs.push((name, id));
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(refs)
}

fn read_relationships(archive: &mut Archive<'_>) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();
    let Some(xml) = read_entry(archive, "xl/_rels/workbook.xml.rels")? else {
        return Ok(map);
    };
    let mut reader = Reader::from_str(&xml);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) =
                    (attr_string(&e, b"Id"), attr_string(&e, b"Target"))
                {
                    map.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(map)
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_si = false;
    let mut in_t = false;
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => {
                    in_si = true;
                    current.clear();
                }
                b"t" if in_si => in_t = true,
                _ => {}
            },
            Event::Text(t) if in_t => current.push_str(&t.unescape()?),
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"si" => {
                    in_si = false;
                    strings.push(std::mem::take(&mut current));
                }
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(strings)
}

/// For each `cellXfs` entry, whether its number format renders a date.
fn parse_date_styles(xml: &str) -> Result<Vec<bool>> {
    let mut reader = Reader::from_str(xml);
    let mut custom: HashMap<u32, String> = HashMap::new();
    let mut xf_formats: Vec<u32> = Vec::new();
    let mut in_cell_xfs = false;
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"numFmt" => {
                    if let (Some(id), Some(code)) =
                        (attr_u32(&e, b"numFmtId"), attr_string(&e, b"formatCode"))
                    {
                        custom.insert(id, code);
                    }
                }
                b"cellXfs" => in_cell_xfs = true,
                b"xf" if in_cell_xfs => xf_formats.push(attr_u32(&e, b"numFmtId").unwrap_or(0)),
                _ => {}
            },
            Event::End(e) if e.local_name().as_ref() == b"cellXfs" => in_cell_xfs = false,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(xf_formats
        .into_iter()
        .map(|id| match custom.get(&id) {
            Some(code) => is_date_format(code),
            None => is_builtin_date_format(id),
        })
        .collect())
}

fn is_builtin_date_format(id: u32) -> bool {
    matches!(id, 14..=22 | 45..=47)
}

/// Whether a custom format code contains date/time tokens outside quotes and brackets.
fn is_date_format(code: &str) -> bool {
    let mut in_quotes = false;
    let mut in_brackets = false;
    for c in code.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            '[' if !in_quotes => in_brackets = true,
            ']' if !in_quotes => in_brackets = false,
            'y' | 'Y' | 'd' | 'D' | 'm' | 'M' | 'h' | 'H' | 's' | 'S'
                if !in_quotes && !in_brackets =>
            {
                return true
            }
            _ => {}
        }
    }
    false
}

#[derive(Default)]
struct PendingCell {
    row: u32,
    col: u32,
    kind: Option<String>,
    style: Option<u32>,
    text: String,
}

fn start_cell(e: &BytesStart) -> PendingCell {
    let (col, row) = attr_string(e, b"r")
        .and_then(|r| parse_cell_ref_bytes(r.as_bytes()))
        .unwrap_or((0, 0));
    PendingCell {
        row,
        col,
        kind: attr_string(e, b"t"),
        style: attr_u32(e, b"s"),
        text: String::new(),
    }
}

/// Parse `<sheetData>` into a sparse `(row, col) -> value` list.
fn parse_sheet_cells(
    xml: &str,
    shared: &[String],
    date_styles: &[bool],
) -> Result<Vec<(u32, u32, CellValue)>> {
    let mut reader = Reader::from_str(xml);
    let mut cells = Vec::new();
    let mut pending: Option<PendingCell> = None;
    let mut capture_text = false;
    loop {
        match reader.read_event()? {
            Event::Start(e) => match local_name_string(&e).as_str() {
                "c" => pending = Some(start_cell(&e)),
                "v" | "t" => capture_text = pending.is_some(),
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                // Styled but empty cell
                pending = None;
            }
            Event::Text(t) if capture_text => {
                if let Some(cell) = pending.as_mut() {
                    cell.text.push_str(&t.unescape()?);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => capture_text = false,
                b"c" => {
                    if let Some(cell) = pending.take() {
                        let value = decode_cell(&cell, shared, date_styles);
                        cells.push((cell.row, cell.col, value));
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(cells)
}

fn decode_cell(cell: &PendingCell, shared: &[String], date_styles: &[bool]) -> CellValue {
    match cell.kind.as_deref() {
        Some("inlineStr" | "str" | "e") => CellValue::String(cell.text.clone()),
        Some("s") => cell
            .text
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|idx| shared.get(idx))
            .map_or(CellValue::Null, |s| CellValue::String(s.clone())),
        Some("b") => CellValue::Boolean(matches!(cell.text.trim(), "1" | "true" | "TRUE")),
        Some("d") => chrono::NaiveDateTime::parse_from_str(cell.text.trim(), "%Y-%m-%dT%H:%M:%S")
            .map_or_else(|_| CellValue::String(cell.text.clone()), CellValue::Date),
        _ => {
            let Ok(n) = cell.text.trim().parse::<f64>() else {
                return if cell.text.is_empty() {
                    CellValue::Null
                } else {
                    CellValue::String(cell.text.clone())
                };
            };
            let is_date = cell
                .style
                .and_then(|s| usize::try_from(s).ok())
                .and_then(|s| date_styles.get(s))
                .copied()
                .unwrap_or(false);
            if is_date {
                serial_to_date(n).map_or(CellValue::Number(n), CellValue::Date)
            } else {
                CellValue::Number(n)
            }
        }
    }
}

/// Lay the sparse cells out as header + rows.
fn grid_to_sheet(name: String, cells: Vec<(u32, u32, CellValue)>) -> Result<Sheet> {
    let width = cells.iter().map(|(_, c, _)| u64::from(*c) + 1).max().unwrap_or(0);
    let height = cells.iter().map(|(r, _, _)| u64::from(*r) + 1).max().unwrap_or(0);
    let span = width.saturating_mul(height);
    if span > MAX_READ_CELLS {
        return Err(ExportError::SheetTooLarge {
            name,
            cells: span,
            limit: MAX_READ_CELLS,
        });
    }
    let width = usize::try_from(width).map_err(|e| ExportError::Other(e.to_string()))?;
    let height = usize::try_from(height).map_err(|e| ExportError::Other(e.to_string()))?;

    let mut grid: Vec<Vec<CellValue>> = vec![vec![CellValue::Null; width]; height];
    for (r, c, value) in cells {
        if let Some(slot) = grid
            .get_mut(r as usize)
            .and_then(|row| row.get_mut(c as usize))
        {
            *slot = value;
        }
    }

    let mut rows = grid.into_iter();
    let headers = rows
        .next()
        .map(|row| row.iter().map(CellValue::display).collect())
        .unwrap_or_default();
    let mut sheet = Sheet::new(name, headers);
    for row in rows {
        sheet.push_row(row);
    }
    Ok(sheet)
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
    fn test_shared_strings() {
        let xml = r#"<sst><si><t>plain</t></si><si><r><t>ri</t></r><r><t>ch</t></r></si><si/></sst>"#;
        assert_eq!(parse_shared_strings(xml).unwrap(), vec!["plain", "rich", ""]);
    }

    #[test]
    fn test_date_styles() {
        let xml = r#"<styleSheet><numFmts><numFmt numFmtId="164" formatCode="yyyy-mm-dd"/><numFmt numFmtId="165" formatCode="&quot;kg&quot; 0.0"/></numFmts>
<cellXfs><xf numFmtId="0"/><xf numFmtId="14"/><xf numFmtId="164"/><xf numFmtId="165"/></cellXfs></styleSheet>"#;
        assert_eq!(parse_date_styles(xml).unwrap(), vec![false, true, true, false]);
    }

    #[test]
    fn test_is_date_format_ignores_literals() {
        assert!(is_date_format("dd/mm/yyyy"));
        assert!(!is_date_format("[Red]0.00"));
        assert!(!is_date_format("\"days\" 0"));
    }

    #[test]
    fn test_sheet_cells_with_shared_and_gaps() {
        let xml = r#"<worksheet><sheetData>
<row r="1"><c r="A1" t="s"><v>0</v></c><c r="C1" t="s"><v>1</v></c></row>
<row r="2"><c r="A2"><v>7</v></c><c r="B2" s="1"/><c r="C2" t="b"><v>0</v></c></row>
</sheetData></worksheet>"#;
        let shared = vec!["Metric".to_string(), "Flag".to_string()];
        let cells = parse_sheet_cells(xml, &shared, &[false, false]).unwrap();
        let sheet = grid_to_sheet("S".into(), cells).unwrap();
        assert_eq!(sheet.headers, vec!["Metric", "", "Flag"]);
        assert_eq!(
            sheet.rows[0],
            vec![
                CellValue::Number(7.0),
                CellValue::Null,
                CellValue::Boolean(false)
            ]
        );
    }

    #[test]
    fn test_far_cell_reference_is_rejected() {
        let xml = r#"<worksheet><sheetData>
<row r="1"><c r="A1"><v>1</v></c></row>
<row r="2000"><c r="XFD2000"><v>2</v></c></row>
</sheetData></worksheet>"#;
        let cells = parse_sheet_cells(xml, &[], &[]).unwrap();
        assert_eq!(cells.len(), 2);
        let err = grid_to_sheet("S".into(), cells).unwrap_err();
        assert!(matches!(
            err,
            ExportError::SheetTooLarge { cells, .. } if cells == 16_384 * 2_000
        ));
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target("worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(resolve_target("/xl/worksheets/s.xml"), "xl/worksheets/s.xml");
    }

    #[test]
    fn test_not_a_zip() {
        assert!(matches!(
            read_workbook(b"not a zip").unwrap_err(),
            ExportError::Zip(_)
        ));
    }
}
