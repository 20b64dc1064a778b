//! Turns heterogeneous records into a [`Workbook`].
//!
//! Column order comes from the first record of each sheet; every later
//! record is projected onto that header set. Sheets without records are
//! skipped rather than emitted empty.

use tracing::debug;

use crate::error::Result;
use crate::types::{CellValue, Record, Sheet, SheetInput, Workbook};

/// Build a workbook from named record lists.
///
/// Fails only when two sheet names collide case-insensitively, which an
/// `IndexMap` keyed by exact name can still produce ("Data" vs "data").
pub fn build_workbook(input: &SheetInput) -> Result<Workbook> {
    let mut workbook = Workbook::new();
    for (name, records) in input {
        match build_sheet(name, records) {
            Some(sheet) => workbook.push_sheet(sheet)?,
            None => debug!(sheet = %name, "skipping sheet without records"),
        }
    }
    Ok(workbook)
}

/// Build a single sheet, or `None` when there are no records.
pub fn build_sheet(name: &str, records: &[Record]) -> Option<Sheet> {
    let first = records.first()?;
    let headers: Vec<String> = first.keys().cloned().collect();
    let mut sheet = Sheet::new(name, headers);
    for record in records {
        let row = project_row(&sheet.headers, record);
        sheet.push_row(row);
    }
    Some(sheet)
}

fn project_row(headers: &[String], record: &Record) -> Vec<CellValue> {
    headers
        .iter()
        .map(|h| record.get(h).map_or(CellValue::Null, |v| v.to_cell()))
        .collect()
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
    use crate::types::RecordValue;
    use indexmap::indexmap;

    fn record(pairs: &[(&str, RecordValue)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_headers_follow_first_record_order() {
        let records = vec![
            record(&[("Zeta", 1.0.into()), ("Alpha", "a".into())]),
            record(&[("Alpha", "b".into()), ("Zeta", 2.0.into())]),
        ];
        let sheet = build_sheet("S", &records).unwrap();
        assert_eq!(sheet.headers, vec!["Zeta", "Alpha"]);
        assert_eq!(sheet.rows[1], vec![CellValue::Number(2.0), CellValue::from("b")]);
    }

    #[test]
    fn test_missing_keys_become_null_and_extra_keys_drop() {
        let records = vec![
            record(&[("Metric", "water".into()), ("Value", 3.0.into())]),
            record(&[("Metric", "waste".into()), ("Unit", "t".into())]),
        ];
        let sheet = build_sheet("S", &records).unwrap();
        assert_eq!(sheet.headers.len(), 2);
        assert_eq!(sheet.rows[1], vec![CellValue::from("waste"), CellValue::Null]);
    }

    #[test]
    fn test_empty_sheet_is_skipped() {
        let input: SheetInput = indexmap! {
            "empty".to_string() => vec![],
            "full".to_string() => vec![record(&[("a", true.into())])],
        };
        let wb = build_workbook(&input).unwrap();
        assert_eq!(wb.sheet_names(), vec!["full"]);
    }

    #[test]
    fn test_case_insensitive_collision_fails() {
        let input: SheetInput = indexmap! {
            "Data".to_string() => vec![record(&[("a", 1.0.into())])],
            "data".to_string() => vec![record(&[("a", 2.0.into())])],
        };
        assert!(build_workbook(&input).is_err());
    }
}
