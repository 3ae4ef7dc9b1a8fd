//! Output Writer: serialize a header row and body rows into a new workbook
//!
//! Writing is not atomic. The target file is truncated up front, so a failure
//! part way through leaves a partial file behind.

use crate::config::EngineConfig;
use crate::error::Result;
use crate::fast_writer::FastWorkbook;
use crate::types::CellValue;
use std::path::Path;
use tracing::debug;

/// Excel file writer with streaming row output
///
/// # Examples
///
/// ```no_run
/// use excelsplit::writer::ExcelWriter;
/// use excelsplit::types::CellValue;
///
/// let mut writer = ExcelWriter::new("output.xlsx", "2023").unwrap();
/// writer.write_header(["Region", "Amount"]).unwrap();
/// writer.write_row(&[CellValue::from("East"), CellValue::Int(120)]).unwrap();
/// writer.save().unwrap();
/// ```
pub struct ExcelWriter {
    inner: FastWorkbook,
    current_sheet_name: String,
    rows_written: u64,
}

impl ExcelWriter {
    /// Create a writer with default engine settings and one sheet named `sheet_name`
    pub fn new<P: AsRef<Path>>(path: P, sheet_name: &str) -> Result<Self> {
        Self::with_config(path, sheet_name, &EngineConfig::default())
    }

    /// Create a writer using the compression and flush settings of `config`
    pub fn with_config<P: AsRef<Path>>(
        path: P,
        sheet_name: &str,
        config: &EngineConfig,
    ) -> Result<Self> {
        let mut inner = FastWorkbook::new(path, config.compression_level)?;
        inner.set_flush_interval(config.flush_interval);
        inner.add_worksheet(sheet_name)?;

        Ok(ExcelWriter {
            inner,
            current_sheet_name: sheet_name.to_string(),
            rows_written: 0,
        })
    }

    /// Write a header row of plain text cells
    pub fn write_header<I, S>(&mut self, headers: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let cells: Vec<CellValue> = headers
            .into_iter()
            .map(|h| CellValue::String(h.as_ref().to_string()))
            .collect();
        self.write_row(&cells)
    }

    /// Write a row of typed cells
    pub fn write_row(&mut self, cells: &[CellValue]) -> Result<()> {
        self.inner.write_row(cells)?;
        self.rows_written += 1;
        Ok(())
    }

    /// Write multiple typed rows at once
    pub fn write_rows<I>(&mut self, rows: I) -> Result<()>
    where
        I: IntoIterator<Item = Vec<CellValue>>,
    {
        for row in rows {
            self.write_row(&row)?;
        }
        Ok(())
    }

    /// Add a new sheet and switch to it
    pub fn add_sheet(&mut self, name: &str) -> Result<()> {
        self.inner.add_worksheet(name)?;
        self.current_sheet_name = name.to_string();
        Ok(())
    }

    /// Name of the sheet currently being written
    pub fn current_sheet_name(&self) -> &str {
        &self.current_sheet_name
    }

    /// Rows written across all sheets, header rows included
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Save and finalize the workbook
    pub fn save(self) -> Result<()> {
        self.inner.close()
    }
}

/// Write one single-sheet workbook: `headers` as the first row, then `rows`.
///
/// Overwrites any file at `path`. Returns the number of body rows written.
pub fn write_split_file<P, I>(
    path: P,
    sheet_name: &str,
    headers: &[String],
    rows: I,
    config: &EngineConfig,
) -> Result<u64>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = Vec<CellValue>>,
{
    let path = path.as_ref();
    let mut writer = ExcelWriter::with_config(path, sheet_name, config)?;
    writer.write_header(headers)?;
    writer.write_rows(rows)?;

    let body_rows = writer.rows_written() - 1;
    writer.save()?;

    debug!(path = %path.display(), rows = body_rows, "wrote output workbook");
    Ok(body_rows)
}
