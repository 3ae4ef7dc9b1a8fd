//! Low-level XLSX writer used for split output
//!
//! Rows are rendered to worksheet XML and streamed into the ZIP entry as they
//! arrive. Text cells are deduplicated through a shared strings table that is
//! written when the workbook is closed.

pub mod shared_strings;
pub mod workbook;
pub mod xml_writer;

pub use workbook::FastWorkbook;
