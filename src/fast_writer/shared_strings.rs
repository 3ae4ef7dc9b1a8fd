//! Shared strings table for string deduplication

use super::xml_writer::XmlWriter;
use crate::error::Result;
use std::collections::HashMap;
use std::io::Write;

/// Shared strings table (`xl/sharedStrings.xml`) for one output workbook
#[derive(Debug, Default)]
pub struct SharedStrings {
    strings: Vec<String>,
    index: HashMap<String, u32>,
    references: u64,
}

impl SharedStrings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string and return its index in the table
    pub fn add_string(&mut self, s: &str) -> u32 {
        self.references += 1;
        if let Some(&idx) = self.index.get(s) {
            return idx;
        }

        let idx = self.strings.len() as u32;
        self.strings.push(s.to_string());
        self.index.insert(s.to_string(), idx);
        idx
    }

    /// Number of unique strings
    pub fn count(&self) -> usize {
        self.strings.len()
    }

    /// Write the table as `sst` XML
    pub fn write_xml<W: Write>(&self, writer: &mut XmlWriter<W>) -> Result<()> {
        writer.declaration()?;
        writer.start_element("sst")?;
        writer.attribute(
            "xmlns",
            "http://schemas.openxmlformats.org/spreadsheetml/2006/main",
        )?;
        writer.attribute_int("count", self.references as i64)?;
        writer.attribute_int("uniqueCount", self.strings.len() as i64)?;
        writer.close_start_tag()?;

        for s in &self.strings {
            writer.start_element("si")?;
            writer.close_start_tag()?;

            writer.start_element("t")?;
            // Leading/trailing blanks are stripped by readers unless preserved
            if s.starts_with(char::is_whitespace) || s.ends_with(char::is_whitespace) {
                writer.attribute("xml:space", "preserve")?;
            }
            writer.close_start_tag()?;
            writer.write_escaped(s)?;
            writer.end_element("t")?;

            writer.end_element("si")?;
        }

        writer.end_element("sst")?;
        writer.flush()
    }
}
