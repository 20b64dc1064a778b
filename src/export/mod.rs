//! XLSX export pipeline.
//!
//! Produces a fresh XLSX package from a built [`Workbook`] and hands it to a
//! [`FileSink`]. Encoding failures never reach the caller as errors; they are
//! logged and reported as `false`.

pub(crate) mod package;
pub(crate) mod sheet_writer;

use tracing::{error, info};

use crate::config::ColumnWidths;
use crate::error::Result;
use crate::sink::FileSink;
use crate::types::Workbook;

pub use sheet_writer::column_widths;

/// MIME type of `.xlsx` files.
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Encode a workbook to XLSX bytes.
pub fn serialize_workbook(workbook: &Workbook, widths: &ColumnWidths) -> Result<Vec<u8>> {
    package::write_package(workbook, widths)
}

/// Encode a workbook and save it through `sink` under `filename`.
///
/// Returns `true` when the file was handed to the sink.
pub fn export_workbook<S: FileSink + ?Sized>(
    workbook: &Workbook,
    filename: &str,
    sink: &S,
    widths: &ColumnWidths,
) -> bool {
    let saved = serialize_workbook(workbook, widths)
        .and_then(|bytes| sink.save(filename, &bytes, XLSX_MIME).map(|()| bytes.len()));
    match saved {
        Ok(len) => {
            info!(filename, sheets = workbook.sheets.len(), bytes = len, "workbook exported");
            true
        }
        Err(e) => {
            error!(filename, error = %e, "workbook export failed");
            false
        }
    }
}
