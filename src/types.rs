//! Type definitions for workbook data and analysis results

use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::fmt;

/// Represents a single cell value in an Excel worksheet
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellValue {
    /// Empty cell
    Empty,
    /// String value
    String(String),
    /// Integer value
    Int(i64),
    /// Float value
    Float(f64),
    /// Boolean value
    Bool(bool),
    /// DateTime value (Excel serial date number)
    DateTime(f64),
    /// Error value
    Error(String),
}

impl CellValue {
    /// Convert cell value to string
    pub fn as_string(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::String(s) => s.clone(),
            CellValue::Int(i) => i.to_string(),
            CellValue::Float(f) => f.to_string(),
            CellValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            CellValue::DateTime(d) => d.to_string(),
            CellValue::Error(e) => format!("ERROR: {}", e),
        }
    }

    /// Check if cell is empty. A zero-length string counts as empty.
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Try to convert to integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CellValue::Int(i) => Some(*i),
            CellValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            CellValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Try to convert to float
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(f) => Some(*f),
            CellValue::Int(i) => Some(*i as f64),
            CellValue::DateTime(d) => Some(*d),
            CellValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(s)
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        CellValue::Int(i)
    }
}

impl From<f64> for CellValue {
    fn from(f: f64) -> Self {
        CellValue::Float(f)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

/// Convert a 0-based column index to its Excel letter (0 -> A, 25 -> Z, 26 -> AA)
pub fn column_letter(col: u32) -> String {
    let mut result = String::new();
    let mut col = col + 1;

    while col > 0 {
        col -= 1;
        result.insert(0, (b'A' + (col % 26) as u8) as char);
        col /= 26;
    }

    result
}

/// One body row of a sheet: column index -> cell value.
///
/// Cells that were empty in the source are simply absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowRecord {
    /// Row index in the source sheet (0-based)
    pub index: u32,
    cells: BTreeMap<u32, CellValue>,
}

impl RowRecord {
    /// Create an empty record for the given source row
    pub fn new(index: u32) -> Self {
        RowRecord {
            index,
            cells: BTreeMap::new(),
        }
    }

    /// Set a cell. Empty values are not stored.
    pub fn insert(&mut self, col: u32, value: CellValue) {
        if value.is_empty() {
            self.cells.remove(&col);
        } else {
            self.cells.insert(col, value);
        }
    }

    /// Get cell at column index
    pub fn get(&self, col: u32) -> Option<&CellValue> {
        self.cells.get(&col)
    }

    /// Number of non-empty cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Iterate cells in ascending column order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &CellValue)> {
        self.cells.iter().map(|(col, value)| (*col, value))
    }

    /// Project this record onto `columns`, substituting `CellValue::Empty`
    /// for every column the record does not have
    pub fn aligned(&self, columns: &[u32]) -> Vec<CellValue> {
        columns
            .iter()
            .map(|col| self.cells.get(col).cloned().unwrap_or(CellValue::Empty))
            .collect()
    }
}

impl FromIterator<(u32, CellValue)> for RowRecord {
    fn from_iter<I: IntoIterator<Item = (u32, CellValue)>>(iter: I) -> Self {
        let mut record = RowRecord::new(0);
        for (col, value) in iter {
            record.insert(col, value);
        }
        record
    }
}

/// Header row of one sheet: column index -> header text, ordered by column index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HeaderMap {
    columns: BTreeMap<u32, String>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the header text of a column, replacing any previous text
    pub fn insert(&mut self, col: u32, name: impl Into<String>) {
        self.columns.insert(col, name.into());
    }

    pub fn get(&self, col: u32) -> Option<&str> {
        self.columns.get(&col).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Iterate `(column index, header text)` in ascending column order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.columns.iter().map(|(col, name)| (*col, name.as_str()))
    }

    /// Column indices in ascending order
    pub fn indices(&self) -> Vec<u32> {
        self.columns.keys().copied().collect()
    }

    /// Header texts in ascending column order
    pub fn names(&self) -> Vec<String> {
        self.columns.values().cloned().collect()
    }

    /// Resolve header text to its column index by exact match.
    /// If the text appears more than once, the leftmost column wins.
    pub fn column_of(&self, name: &str) -> Option<u32> {
        self.columns
            .iter()
            .find(|(_, text)| text.as_str() == name)
            .map(|(col, _)| *col)
    }
}

impl<S: Into<String>> FromIterator<(u32, S)> for HeaderMap {
    fn from_iter<I: IntoIterator<Item = (u32, S)>>(iter: I) -> Self {
        let mut headers = HeaderMap::new();
        for (col, name) in iter {
            headers.insert(col, name);
        }
        headers
    }
}

/// Per-workbook analysis result: sheet name -> header map, in file order.
///
/// Immutable once produced; pass it by reference into later split requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorkbookAnalysis {
    sheets: IndexMap<String, HeaderMap>,
}

impl WorkbookAnalysis {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        WorkbookAnalysis {
            sheets: IndexMap::with_capacity(capacity),
        }
    }

    pub(crate) fn insert(&mut self, sheet: String, headers: HeaderMap) {
        self.sheets.insert(sheet, headers);
    }

    /// Sheet names in file order
    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.keys().cloned().collect()
    }

    /// Header map of a sheet
    pub fn headers(&self, sheet: &str) -> Option<&HeaderMap> {
        self.sheets.get(sheet)
    }

    pub fn contains_sheet(&self, sheet: &str) -> bool {
        self.sheets.contains_key(sheet)
    }

    /// Number of sheets
    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// Iterate `(sheet name, header map)` in file order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderMap)> {
        self.sheets.iter().map(|(name, headers)| (name.as_str(), headers))
    }
}

impl FromIterator<(String, HeaderMap)> for WorkbookAnalysis {
    fn from_iter<I: IntoIterator<Item = (String, HeaderMap)>>(iter: I) -> Self {
        WorkbookAnalysis {
            sheets: iter.into_iter().collect(),
        }
    }
}

/// Bucket a row falls into when splitting by column value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GroupKey {
    /// The cell's text
    Value(String),
    /// The row has no value in the split column
    Missing,
}

impl GroupKey {
    /// Bucket for a (possibly absent) cell
    pub fn from_cell(cell: Option<&CellValue>) -> Self {
        match cell {
            Some(value) if !value.is_empty() => GroupKey::Value(value.as_string()),
            _ => GroupKey::Missing,
        }
    }

    /// Text used in the output file name
    pub fn label(&self) -> &str {
        match self {
            GroupKey::Value(text) => text,
            GroupKey::Missing => "(blank)",
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Incremental progress of a background task
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProgressEvent {
    /// Completion percent, 0-100
    pub percent: u8,
    /// Short status line, e.g. "Parsing... 50%"
    pub status: String,
}

impl ProgressEvent {
    pub fn new(percent: u8, status: impl Into<String>) -> Self {
        ProgressEvent {
            percent: percent.min(100),
            status: status.into(),
        }
    }
}
