use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{CellValue, RecordValue};
use crate::error::{ExportError, Result};

/// One flat record: column name to value, in insertion order.
pub type Record = IndexMap<String, RecordValue>;

/// Sheet name to records, in insertion order.
pub type SheetInput = IndexMap<String, Vec<Record>>;

/// Maximum sheet name length Excel accepts.
pub const MAX_SHEET_NAME_LEN: usize = 31;

const RESERVED_SHEET_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

/// An ordered collection of uniquely named sheets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sheet, rejecting a name that is already taken.
    ///
    /// Excel compares sheet names case-insensitively, so this does too.
    pub fn push_sheet(&mut self, sheet: Sheet) -> Result<()> {
        let lower = sheet.name.to_lowercase();
        if self.sheets.iter().any(|s| s.name.to_lowercase() == lower) {
            return Err(ExportError::DuplicateSheet(sheet.name));
        }
        self.sheets.push(sheet);
        Ok(())
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }
}

/// A named tab: a header row followed by data rows of the same width.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows: Vec::new(),
        }
    }

    /// Append a data row, padding with `Null` or truncating to the header width.
    pub fn push_row(&mut self, mut row: Vec<CellValue>) {
        row.resize(self.headers.len(), CellValue::Null);
        self.rows.push(row);
    }

    /// Rows including the header row.
    pub fn row_count(&self) -> usize {
        self.rows.len() + 1
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Cell at a 0-indexed data row and column.
    pub fn cell(&self, row: usize, col: usize) -> Option<&CellValue> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Iterate one column's data cells.
    pub fn column(&self, col: usize) -> impl Iterator<Item = &CellValue> + '_ {
        self.rows.iter().filter_map(move |r| r.get(col))
    }
}

/// Check a sheet name against the rules Excel enforces.
pub fn validate_sheet_name(name: &str) -> Result<()> {
    let len = name.chars().count();
    if len == 0
        || len > MAX_SHEET_NAME_LEN
        || name.chars().any(|c| RESERVED_SHEET_CHARS.contains(&c))
        || name.starts_with('\'')
        || name.ends_with('\'')
    {
        return Err(ExportError::InvalidSheetName(name.to_string()));
    }
    Ok(())
}
