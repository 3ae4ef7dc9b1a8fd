//! Error types for the excelsplit library

use thiserror::Error;

/// Result type alias for excelsplit operations
pub type Result<T> = std::result::Result<T, ExcelError>;

/// Main error type for all analysis and split operations
#[derive(Error, Debug)]
pub enum ExcelError {
    /// Workbook cannot be opened or parsed as a supported spreadsheet
    #[error("Unsupported or unreadable workbook: {0}")]
    FileFormat(String),

    /// Error occurred while streaming rows out of an opened workbook
    #[error("Failed to read Excel file: {0}")]
    ReadError(String),

    /// Error occurred while writing an output workbook
    #[error("Failed to write Excel file: {0}")]
    WriteError(String),

    /// Invalid sheet name or sheet not found
    #[error("Sheet '{sheet}' not found. Available sheets: {available}")]
    SheetNotFound { sheet: String, available: String },

    /// Requested header text is absent from the sheet's header row
    #[error("Column '{column}' not found in header row of sheet '{sheet}'")]
    ColumnNotFound { sheet: String, column: String },

    /// Split or engine settings are missing or invalid
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The task's cancel token fired before it finished
    #[error("Task canceled")]
    Canceled,

    /// The background worker panicked
    #[error("Background task panicked: {0}")]
    TaskPanicked(String),

    /// IO error wrapper
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Coarse error classification shown to the user by the host shell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    FileFormat,
    SheetNotFound,
    ColumnNotFound,
    Configuration,
    Io,
    Canceled,
    Internal,
}

impl ExcelError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExcelError::FileFormat(_) | ExcelError::ReadError(_) => ErrorKind::FileFormat,
            ExcelError::SheetNotFound { .. } => ErrorKind::SheetNotFound,
            ExcelError::ColumnNotFound { .. } => ErrorKind::ColumnNotFound,
            ExcelError::Configuration(_) => ErrorKind::Configuration,
            ExcelError::WriteError(_) | ExcelError::IoError(_) => ErrorKind::Io,
            ExcelError::Canceled => ErrorKind::Canceled,
            ExcelError::TaskPanicked(_) => ErrorKind::Internal,
        }
    }
}

impl From<calamine::Error> for ExcelError {
    fn from(err: calamine::Error) -> Self {
        ExcelError::FileFormat(err.to_string())
    }
}

impl From<calamine::XlsxError> for ExcelError {
    fn from(err: calamine::XlsxError) -> Self {
        ExcelError::FileFormat(err.to_string())
    }
}

impl From<calamine::XlsError> for ExcelError {
    fn from(err: calamine::XlsError) -> Self {
        ExcelError::FileFormat(err.to_string())
    }
}

impl From<zip::result::ZipError> for ExcelError {
    fn from(err: zip::result::ZipError) -> Self {
        ExcelError::WriteError(err.to_string())
    }
}
