//! Split Engine: re-partition a workbook into several output workbooks
//!
//! A [`SplitRequest`] is either [`SplitRequest::BySheet`] (one output file per
//! selected sheet) or [`SplitRequest::ByColumn`] (one output file per distinct
//! value of a column). Output files are named
//! `<source file name>_<sheet or value>.xlsx` and land in an existing output
//! directory, replacing files of the same name.
//!
//! Files are written one after another and are not rolled back if a later
//! one fails.

use crate::batch::{BatchSink, MemorySink, RowBatchCollector};
use crate::config::EngineConfig;
use crate::error::{ExcelError, Result};
use crate::progress::ProgressReporter;
use crate::reader::ExcelReader;
use crate::types::{GroupKey, HeaderMap, RowRecord, WorkbookAnalysis};
use crate::writer::write_split_file;
use indexmap::{IndexMap, IndexSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// How to partition a workbook
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SplitRequest {
    /// One output file per listed sheet, in list order
    BySheet(Vec<String>),
    /// One output file per distinct value found under `column` in `sheet`
    ByColumn { sheet: String, column: String },
}

impl SplitRequest {
    /// Split the given sheets. Duplicates are dropped, first occurrence wins.
    pub fn by_sheets<I, S>(sheets: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sheets: IndexSet<String> = sheets.into_iter().map(Into::into).collect();
        if sheets.is_empty() {
            return Err(ExcelError::Configuration(
                "select at least one sheet to split".to_string(),
            ));
        }
        Ok(SplitRequest::BySheet(sheets.into_iter().collect()))
    }

    /// Split every sheet found by the analysis
    pub fn all_sheets(analysis: &WorkbookAnalysis) -> Result<Self> {
        Self::by_sheets(analysis.sheet_names())
    }

    /// Split `sheet` by the values under the header `column`
    pub fn by_column(sheet: impl Into<String>, column: impl Into<String>) -> Result<Self> {
        let sheet = sheet.into();
        let column = column.into();
        if sheet.is_empty() || column.is_empty() {
            return Err(ExcelError::Configuration(
                "select both a sheet and a column to split by".to_string(),
            ));
        }
        Ok(SplitRequest::ByColumn { sheet, column })
    }
}

/// Outcome of a successful split
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SplitSummary {
    /// Output files, in the order they were written
    pub files: Vec<PathBuf>,
    /// Body rows written across all files
    pub rows_written: u64,
}

impl SplitSummary {
    pub fn files_written(&self) -> usize {
        self.files.len()
    }
}

/// `<source file name>_<label>.xlsx`
pub fn output_file_name(source: &Path, label: &str) -> String {
    let source_name = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}_{}.xlsx", source_name, label)
}

/// Sink that buckets rows by the value under one column as batches arrive.
///
/// Buckets keep the order in which their key first appeared.
#[derive(Debug)]
pub struct GroupingSink {
    column: u32,
    groups: IndexMap<GroupKey, Vec<RowRecord>>,
}

impl GroupingSink {
    pub fn new(column: u32) -> Self {
        GroupingSink {
            column,
            groups: IndexMap::new(),
        }
    }

    pub fn groups(&self) -> &IndexMap<GroupKey, Vec<RowRecord>> {
        &self.groups
    }

    pub fn into_groups(self) -> IndexMap<GroupKey, Vec<RowRecord>> {
        self.groups
    }
}

impl BatchSink for GroupingSink {
    fn flush(&mut self, batch: Vec<RowRecord>) -> Result<()> {
        for row in batch {
            let key = GroupKey::from_cell(row.get(self.column));
            self.groups.entry(key).or_default().push(row);
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.groups.clear();
    }
}

/// Runs split requests against one analysed workbook
pub struct SplitEngine<'a> {
    analysis: &'a WorkbookAnalysis,
    output_dir: PathBuf,
    config: EngineConfig,
}

impl<'a> SplitEngine<'a> {
    pub fn new(analysis: &'a WorkbookAnalysis, output_dir: impl Into<PathBuf>) -> Self {
        SplitEngine {
            analysis,
            output_dir: output_dir.into(),
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Execute `request` against the workbook open in `reader`.
    ///
    /// `reader` must be the workbook the analysis was produced from.
    pub fn run(
        &self,
        reader: &mut ExcelReader,
        request: &SplitRequest,
        progress: &mut ProgressReporter,
    ) -> Result<SplitSummary> {
        self.config.validate()?;
        self.check_output_dir()?;

        let summary = match request {
            SplitRequest::BySheet(sheets) => self.split_by_sheets(reader, sheets, progress)?,
            SplitRequest::ByColumn { sheet, column } => {
                self.split_by_column(reader, sheet, column, progress)?
            }
        };

        info!(
            source = %reader.path().display(),
            files = summary.files_written(),
            rows = summary.rows_written,
            "split complete"
        );
        Ok(summary)
    }

    fn split_by_sheets(
        &self,
        reader: &mut ExcelReader,
        sheets: &[String],
        progress: &mut ProgressReporter,
    ) -> Result<SplitSummary> {
        let mut collector = RowBatchCollector::with_config(MemorySink::new(), &self.config)?;
        let mut summary = SplitSummary::default();
        let total = sheets.len();

        for (i, sheet) in sheets.iter().enumerate() {
            progress.checkpoint()?;
            let headers = self.headers_of(sheet)?;

            collector.collect_sheet(reader, sheet, progress.cancel_token())?;
            let records = collector.sink_mut().take();

            let path = self.output_path(reader.path(), sheet);
            let written = write_records(&path, sheet, headers, &records, &self.config)?;
            collector.clear();

            summary.rows_written += written;
            summary.files.push(path);
            progress.step("Splitting", i + 1, total, sheet);
        }

        Ok(summary)
    }

    fn split_by_column(
        &self,
        reader: &mut ExcelReader,
        sheet: &str,
        column: &str,
        progress: &mut ProgressReporter,
    ) -> Result<SplitSummary> {
        let headers = self.headers_of(sheet)?;
        let column_index =
            headers
                .column_of(column)
                .ok_or_else(|| ExcelError::ColumnNotFound {
                    sheet: sheet.to_string(),
                    column: column.to_string(),
                })?;

        let mut collector =
            RowBatchCollector::with_config(GroupingSink::new(column_index), &self.config)?;
        collector.collect_sheet(reader, sheet, progress.cancel_token())?;
        let groups = collector.into_sink().into_groups();
        debug!(sheet, column, groups = groups.len(), "grouped rows by column value");

        let paths = self.group_output_paths(reader.path(), groups.keys())?;
        let mut summary = SplitSummary::default();
        let total = groups.len();

        for (i, ((key, records), path)) in groups.into_iter().zip(paths).enumerate() {
            progress.checkpoint()?;

            let written = write_records(&path, sheet, headers, &records, &self.config)?;

            summary.rows_written += written;
            summary.files.push(path);
            progress.step("Splitting", i + 1, total, key.label());
        }

        Ok(summary)
    }

    fn headers_of(&self, sheet: &str) -> Result<&'a HeaderMap> {
        self.analysis
            .headers(sheet)
            .ok_or_else(|| ExcelError::SheetNotFound {
                sheet: sheet.to_string(),
                available: self.analysis.sheet_names().join(", "),
            })
    }

    /// One output path per group, failing before anything is written if two
    /// groups would land in the same file (e.g. a literal "(blank)" value
    /// next to the missing-value bucket)
    fn group_output_paths<'k>(
        &self,
        source: &Path,
        keys: impl Iterator<Item = &'k GroupKey>,
    ) -> Result<Vec<PathBuf>> {
        let mut seen: IndexMap<PathBuf, &GroupKey> = IndexMap::new();
        for key in keys {
            let path = self.output_path(source, key.label());
            if let Some(previous) = seen.insert(path.clone(), key) {
                return Err(ExcelError::Configuration(format!(
                    "groups {:?} and {:?} would both be written to {}",
                    previous,
                    key,
                    path.display()
                )));
            }
        }
        Ok(seen.into_keys().collect())
    }

    fn output_path(&self, source: &Path, label: &str) -> PathBuf {
        self.output_dir.join(output_file_name(source, label))
    }

    fn check_output_dir(&self) -> Result<()> {
        if self.output_dir.is_dir() {
            Ok(())
        } else {
            Err(ExcelError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("output directory {} does not exist", self.output_dir.display()),
            )))
        }
    }
}

/// Write `records` under `headers`, keeping only the header columns in
/// ascending column order
fn write_records(
    path: &Path,
    sheet: &str,
    headers: &HeaderMap,
    records: &[RowRecord],
    config: &EngineConfig,
) -> Result<u64> {
    let columns = headers.indices();
    let rows = records.iter().map(|record| record.aligned(&columns));
    write_split_file(path, sheet, &headers.names(), rows, config)
}

/// Open the workbook at `source`, run `request` and close it again
pub fn split_workbook<P, Q>(
    source: P,
    analysis: &WorkbookAnalysis,
    request: &SplitRequest,
    output_dir: Q,
    config: EngineConfig,
    progress: &mut ProgressReporter,
) -> Result<SplitSummary>
where
    P: AsRef<Path>,
    Q: Into<PathBuf>,
{
    let mut reader = ExcelReader::open(source)?;
    SplitEngine::new(analysis, output_dir)
        .with_config(config)
        .run(&mut reader, request, progress)
}
