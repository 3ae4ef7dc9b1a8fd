//! Excel file reading with streaming support
//!
//! [`ExcelReader`] is the workbook handle: it is opened once per task, reused
//! across sheets and closed when dropped. Rows come out of [`ExcelReader::rows`]
//! as a lazy [`RowStream`]; dropping the stream stops the scan.

use crate::error::{ExcelError, Result};
use crate::types::{CellValue, RowRecord};
use calamine::{open_workbook_auto, Data, DataRef, Range, Reader, Sheets};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File extensions the reader accepts (compared case-insensitively)
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["xlsx", "xlsm", "xls"];

/// Read-only handle to an open workbook
pub struct ExcelReader {
    workbook: Sheets<BufReader<File>>,
    path: PathBuf,
    sheet_names: Vec<String>,
}

impl ExcelReader {
    /// Open an Excel file for reading
    ///
    /// Supports XLSX/XLSM and XLS. Anything else, or a file that cannot be
    /// opened as a workbook, fails with [`ExcelError::FileFormat`].
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use excelsplit::reader::ExcelReader;
    ///
    /// let reader = ExcelReader::open("data.xlsx").unwrap();
    /// println!("{:?}", reader.sheet_names());
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        check_extension(path)?;

        let workbook = open_workbook_auto(path)
            .map_err(|e| ExcelError::FileFormat(format!("{}: {}", path.display(), e)))?;
        let sheet_names = workbook.sheet_names().to_vec();

        debug!(path = %path.display(), sheets = sheet_names.len(), "opened workbook");

        Ok(ExcelReader {
            workbook,
            path: path.to_path_buf(),
            sheet_names,
        })
    }

    /// Path this handle was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sheet names in file order
    pub fn sheet_names(&self) -> Vec<String> {
        self.sheet_names.clone()
    }

    /// Get the number of sheets in the workbook
    pub fn sheet_count(&self) -> usize {
        self.sheet_names.len()
    }

    /// Stream the rows of a sheet, header row included
    ///
    /// Rows without any non-empty cell are skipped, so the first row yielded
    /// is the first row that carries data.
    ///
    /// For XLSX the worksheet XML is decoded cell by cell, so only the row
    /// being assembled is held in memory. XLS has no incremental reader and
    /// is decoded up front, then handed out row by row.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use excelsplit::reader::ExcelReader;
    ///
    /// let mut reader = ExcelReader::open("data.xlsx").unwrap();
    /// for row in reader.rows("Sheet1").unwrap() {
    ///     let row = row.unwrap();
    ///     println!("Row {}: {} cells", row.index, row.len());
    /// }
    /// ```
    pub fn rows<'a>(&'a mut self, sheet_name: &'a str) -> Result<RowStream<'a>> {
        if !self.sheet_names.iter().any(|name| name == sheet_name) {
            return Err(ExcelError::SheetNotFound {
                sheet: sheet_name.to_string(),
                available: self.sheet_names.join(", "),
            });
        }

        let inner: Box<dyn Iterator<Item = Result<RowRecord>> + 'a> = match &mut self.workbook {
            Sheets::Xlsx(xlsx) => {
                let mut cells = xlsx.worksheet_cells_reader(sheet_name)?;
                let mut pending: Option<(u32, u32, CellValue)> = None;
                let mut done = false;

                Box::new(std::iter::from_fn(move || {
                    if done {
                        return None;
                    }

                    let mut record = pending.take().map(|(row, col, value)| {
                        let mut record = RowRecord::new(row);
                        record.insert(col, value);
                        record
                    });

                    loop {
                        match cells.next_cell() {
                            Ok(Some(cell)) => {
                                let (row, col) = cell.get_position();
                                let value = dataref_to_cellvalue(cell.get_value());

                                // Cells arrive row-major; a new row index closes the current record
                                if record.as_ref().is_some_and(|r| r.index != row) {
                                    pending = Some((row, col, value));
                                    return record.map(Ok);
                                }
                                record
                                    .get_or_insert_with(|| RowRecord::new(row))
                                    .insert(col, value);
                            }
                            Ok(None) => {
                                done = true;
                                return record.map(Ok);
                            }
                            Err(e) => {
                                done = true;
                                return Some(Err(ExcelError::ReadError(e.to_string())));
                            }
                        }
                    }
                })
                .filter(has_values))
            }
            other => {
                let range = other.worksheet_range(sheet_name)?;
                Box::new(RangeRows::new(range))
            }
        };

        Ok(RowStream { inner })
    }
}

/// Sheet Lister: open `path`, return its sheet names in file order, close it
pub fn list_sheets<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let reader = ExcelReader::open(path)?;
    Ok(reader.sheet_names())
}

fn check_extension(path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match ext {
        Some(ext) if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(ExcelError::FileFormat(format!(
            "{}: expected one of .{}",
            path.display(),
            SUPPORTED_EXTENSIONS.join(", .")
        ))),
    }
}

/// Lazy, finite, non-restartable sequence of rows from one sheet
pub struct RowStream<'a> {
    inner: Box<dyn Iterator<Item = Result<RowRecord>> + 'a>,
}

impl Iterator for RowStream<'_> {
    type Item = Result<RowRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// Row iterator over an already decoded range (XLS and friends)
struct RangeRows {
    range: Range<Data>,
    current_row: u32,
    max_row: u32,
    start_col: u32,
    end_col: u32,
}

impl RangeRows {
    fn new(range: Range<Data>) -> Self {
        let (start_row, start_col) = range.start().unwrap_or((0, 0));
        let (rows, cols) = range.get_size();

        RangeRows {
            range,
            current_row: start_row,
            max_row: start_row + rows as u32,
            start_col,
            end_col: start_col + cols as u32,
        }
    }
}

impl Iterator for RangeRows {
    type Item = Result<RowRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.current_row < self.max_row {
            let row_idx = self.current_row;
            self.current_row += 1;

            let mut record = RowRecord::new(row_idx);
            for col in self.start_col..self.end_col {
                if let Some(value) = self.range.get_value((row_idx, col)) {
                    record.insert(col, datatype_to_cellvalue(value));
                }
            }

            if !record.is_empty() {
                return Some(Ok(record));
            }
        }
        None
    }
}

// Formatted but valueless cells still produce a row; such rows are skipped
fn has_values(row: &Result<RowRecord>) -> bool {
    row.as_ref().map_or(true, |record| !record.is_empty())
}

/// Convert calamine Data to our CellValue
fn datatype_to_cellvalue(dt: &Data) -> CellValue {
    match dt {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::String(s.clone()),
        Data::Float(f) => CellValue::Float(*f),
        Data::Int(i) => CellValue::Int(*i),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(d) => CellValue::DateTime(d.as_f64()),
        Data::Error(e) => CellValue::Error(format!("{:?}", e)),
        Data::DateTimeIso(s) => CellValue::String(s.clone()),
        Data::DurationIso(s) => CellValue::String(s.clone()),
    }
}

/// Convert a streamed calamine cell to our CellValue
fn dataref_to_cellvalue(dt: &DataRef<'_>) -> CellValue {
    match dt {
        DataRef::Empty => CellValue::Empty,
        DataRef::String(s) => CellValue::String(s.clone()),
        DataRef::SharedString(s) => CellValue::String((*s).to_string()),
        DataRef::Float(f) => CellValue::Float(*f),
        DataRef::Int(i) => CellValue::Int(*i),
        DataRef::Bool(b) => CellValue::Bool(*b),
        DataRef::DateTime(d) => CellValue::DateTime(d.as_f64()),
        DataRef::Error(e) => CellValue::Error(format!("{:?}", e)),
        DataRef::DateTimeIso(s) => CellValue::String(s.clone()),
        DataRef::DurationIso(s) => CellValue::String(s.clone()),
    }
}
