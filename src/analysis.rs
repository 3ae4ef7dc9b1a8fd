//! Workbook analysis: the header row of every sheet
//!
//! Only the first row of each sheet is read. The row stream is dropped right
//! after it, so the cost of analysing a sheet does not grow with its length.

use crate::error::Result;
use crate::progress::ProgressReporter;
use crate::reader::ExcelReader;
use crate::types::{HeaderMap, RowRecord, WorkbookAnalysis};
use std::path::Path;
use tracing::{debug, info};

/// Read the header row of `sheet`.
///
/// A sheet with no rows yields an empty map. Empty header cells are left out.
pub fn extract_headers(reader: &mut ExcelReader, sheet: &str) -> Result<HeaderMap> {
    let first = reader.rows(sheet)?.next().transpose()?;
    Ok(first.as_ref().map(header_map_from).unwrap_or_default())
}

fn header_map_from(row: &RowRecord) -> HeaderMap {
    row.iter()
        .map(|(col, value)| (col, value.as_string()))
        .collect()
}

/// Extract the headers of every sheet of an open workbook, in file order.
///
/// Emits one progress event per sheet. Any failing sheet fails the whole
/// analysis.
pub fn analyze(reader: &mut ExcelReader, progress: &mut ProgressReporter) -> Result<WorkbookAnalysis> {
    let sheet_names = reader.sheet_names();
    let total = sheet_names.len();
    let mut analysis = WorkbookAnalysis::with_capacity(total);

    for (i, sheet) in sheet_names.into_iter().enumerate() {
        progress.checkpoint()?;

        let headers = extract_headers(reader, &sheet)?;
        debug!(sheet = %sheet, columns = headers.len(), "extracted header row");

        progress.step("Parsing", i + 1, total, &sheet);
        analysis.insert(sheet, headers);
    }

    info!(
        path = %reader.path().display(),
        sheets = analysis.len(),
        "workbook analysis complete"
    );
    Ok(analysis)
}

/// Open `path`, analyse it and close it again
pub fn analyze_workbook<P: AsRef<Path>>(
    path: P,
    progress: &mut ProgressReporter,
) -> Result<WorkbookAnalysis> {
    let mut reader = ExcelReader::open(path)?;
    analyze(&mut reader, progress)
}
