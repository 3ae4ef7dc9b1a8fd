//! # excelsplit
//!
//! Streaming analysis and splitting of Excel workbooks.
//!
//! ## Features
//!
//! - **Analysis**: Read only the header row of every sheet, with per-sheet progress
//! - **Split by sheet**: One output workbook per selected sheet
//! - **Split by column**: One output workbook per distinct value of a column
//! - **Bounded batches**: Rows are handed off in batches of at most 500,000 by default
//! - **Background tasks**: Run jobs off the caller's thread and drain progress from a channel
//! - **Cancellation**: Stop a running task at its next checkpoint
//!
//! ## Quick Start
//!
//! ### Analysing a workbook
//!
//! ```rust,no_run
//! use excelsplit::analysis::analyze_workbook;
//! use excelsplit::progress::ProgressReporter;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut progress = ProgressReporter::new(|e| println!("{}% {}", e.percent, e.status));
//! let analysis = analyze_workbook("Sales.xlsx", &mut progress)?;
//!
//! for (sheet, headers) in analysis.iter() {
//!     println!("{}: {:?}", sheet, headers.names());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Splitting in the background
//!
//! ```rust,no_run
//! use excelsplit::task::{spawn_analysis, spawn_split};
//! use excelsplit::{EngineConfig, SplitRequest};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let analysis = Arc::new(spawn_analysis("Sales.xlsx").wait()?);
//!
//! let request = SplitRequest::by_column("2023", "Region")?;
//! let task = spawn_split("Sales.xlsx", analysis, request, "out", EngineConfig::default());
//!
//! let summary = task.wait_with(|e| println!("{}", e.status))?;
//! println!("wrote {} files", summary.files_written());
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod batch;
pub mod config;
pub mod error;
pub mod fast_writer;
pub mod progress;
pub mod reader;
pub mod split;
pub mod task;
pub mod types;
pub mod writer;

pub use analysis::{analyze, analyze_workbook, extract_headers};
pub use batch::{BatchSink, MemorySink, RowBatchCollector};
pub use config::{EngineConfig, EngineConfigBuilder, DEFAULT_BATCH_CAPACITY};
pub use error::{ErrorKind, ExcelError, Result};
pub use progress::{CancelToken, ProgressReporter};
pub use reader::{list_sheets, ExcelReader};
pub use split::{split_workbook, SplitEngine, SplitRequest, SplitSummary};
pub use task::{spawn_analysis, spawn_split, TaskEvent, TaskHandle};
pub use types::{CellValue, GroupKey, HeaderMap, ProgressEvent, RowRecord, WorkbookAnalysis};
pub use writer::ExcelWriter;
