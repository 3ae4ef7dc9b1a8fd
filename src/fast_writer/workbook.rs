//! Streaming XLSX workbook with ZIP compression

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::CompressionMethod;

use super::shared_strings::SharedStrings;
use super::xml_writer::XmlWriter;
use crate::error::{ExcelError, Result};
use crate::types::{column_letter, CellValue};

const SPREADSHEET_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const RELATIONSHIP_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Style index of the date xf in `STYLES` (built-in number format 14)
const DATE_STYLE_ATTR: &[u8] = b"\" s=\"1\"><v>";

/// Excel limits sheet names to 31 characters
const MAX_SHEET_NAME_CHARS: usize = 31;

/// Workbook writer that streams rows straight into the ZIP entry of the
/// current worksheet. Only the shared strings table is kept until `close`.
pub struct FastWorkbook {
    zip: ZipWriter<BufWriter<File>>,
    compression_level: i64,
    shared_strings: SharedStrings,
    worksheets: Vec<String>,
    sheet_open: bool,
    current_row: u32,
    xml_buffer: Vec<u8>,         // Reusable buffer for row XML
    cell_ref_cache: Vec<String>, // Column letters for the first 100 columns
    flush_interval: u32,
}

impl FastWorkbook {
    /// Create the workbook file, truncating any existing file at `path`
    pub fn new<P: AsRef<Path>>(path: P, compression_level: i64) -> Result<Self> {
        let file = File::create(path)?;
        let writer = BufWriter::with_capacity(64 * 1024, file);
        let mut zip = ZipWriter::new(writer);

        zip.start_file("_rels/.rels", file_options(compression_level))?;
        zip.write_all(ROOT_RELS.as_bytes())?;

        zip.start_file("docProps/core.xml", file_options(compression_level))?;
        zip.write_all(CORE_PROPS.as_bytes())?;

        zip.start_file("docProps/app.xml", file_options(compression_level))?;
        zip.write_all(APP_PROPS.as_bytes())?;

        Ok(FastWorkbook {
            zip,
            compression_level,
            shared_strings: SharedStrings::new(),
            worksheets: Vec::new(),
            sheet_open: false,
            current_row: 0,
            xml_buffer: Vec::with_capacity(8192),
            cell_ref_cache: (0..100).map(column_letter).collect(),
            flush_interval: 1000,
        })
    }

    /// Set flush interval (rows between ZIP stream flushes)
    pub fn set_flush_interval(&mut self, interval: u32) {
        self.flush_interval = interval.max(1);
    }

    /// Start a new worksheet; rows written afterwards go to it
    pub fn add_worksheet(&mut self, name: &str) -> Result<()> {
        validate_sheet_name(name)?;
        if self.worksheets.iter().any(|existing| existing.eq_ignore_ascii_case(name)) {
            return Err(ExcelError::WriteError(format!(
                "Duplicate sheet name '{}'",
                name
            )));
        }

        self.finish_current_worksheet()?;

        self.worksheets.push(name.to_string());
        let sheet_path = format!("xl/worksheets/sheet{}.xml", self.worksheets.len());
        self.zip.start_file(sheet_path, file_options(self.compression_level))?;

        let mut xml_writer = XmlWriter::new(&mut self.zip);
        xml_writer.declaration()?;
        xml_writer.start_element("worksheet")?;
        xml_writer.attribute("xmlns", SPREADSHEET_NS)?;
        xml_writer.attribute("xmlns:r", RELATIONSHIP_NS)?;
        xml_writer.close_start_tag()?;
        xml_writer.start_element("sheetData")?;
        xml_writer.close_start_tag()?;
        xml_writer.flush()?;

        self.sheet_open = true;
        self.current_row = 0;
        Ok(())
    }

    /// Write a row to the current worksheet, starting at column A.
    ///
    /// Numbers and booleans become typed cells, date serials get the date
    /// style, text goes through the shared strings table and empty values
    /// produce no cell at all.
    pub fn write_row(&mut self, values: &[CellValue]) -> Result<()> {
        if !self.sheet_open {
            return Err(ExcelError::WriteError("No active worksheet".to_string()));
        }

        self.current_row += 1;
        let mut row_buf = itoa::Buffer::new();
        let row_num = row_buf.format(self.current_row);

        self.xml_buffer.clear();
        self.xml_buffer.extend_from_slice(b"<row r=\"");
        self.xml_buffer.extend_from_slice(row_num.as_bytes());
        self.xml_buffer.extend_from_slice(b"\">");

        for (col_idx, value) in values.iter().enumerate() {
            if value.is_empty() {
                continue;
            }

            self.xml_buffer.extend_from_slice(b"<c r=\"");
            match self.cell_ref_cache.get(col_idx) {
                Some(letter) => self.xml_buffer.extend_from_slice(letter.as_bytes()),
                None => self
                    .xml_buffer
                    .extend_from_slice(column_letter(col_idx as u32).as_bytes()),
            }
            self.xml_buffer.extend_from_slice(row_num.as_bytes());

            match value {
                CellValue::Int(i) => {
                    let mut buf = itoa::Buffer::new();
                    self.xml_buffer.extend_from_slice(b"\"><v>");
                    self.xml_buffer.extend_from_slice(buf.format(*i).as_bytes());
                }
                CellValue::Float(f) if f.is_finite() => {
                    self.xml_buffer.extend_from_slice(b"\"><v>");
                    self.xml_buffer.extend_from_slice(f.to_string().as_bytes());
                }
                CellValue::DateTime(f) if f.is_finite() => {
                    self.xml_buffer.extend_from_slice(DATE_STYLE_ATTR);
                    self.xml_buffer.extend_from_slice(f.to_string().as_bytes());
                }
                CellValue::Bool(b) => {
                    self.xml_buffer.extend_from_slice(b"\" t=\"b\"><v>");
                    self.xml_buffer.push(if *b { b'1' } else { b'0' });
                }
                other => {
                    let text = other.as_string();
                    let index = self.shared_strings.add_string(&text);
                    let mut buf = itoa::Buffer::new();
                    self.xml_buffer.extend_from_slice(b"\" t=\"s\"><v>");
                    self.xml_buffer.extend_from_slice(buf.format(index).as_bytes());
                }
            }
            self.xml_buffer.extend_from_slice(b"</v></c>");
        }

        self.xml_buffer.extend_from_slice(b"</row>");
        self.zip.write_all(&self.xml_buffer)?;

        if self.current_row % self.flush_interval == 0 {
            self.zip.flush()?;
        }

        Ok(())
    }

    /// Rows written to the current worksheet
    pub fn current_row(&self) -> u32 {
        self.current_row
    }

    fn finish_current_worksheet(&mut self) -> Result<()> {
        if !self.sheet_open {
            return Ok(());
        }

        let mut xml_writer = XmlWriter::new(&mut self.zip);
        xml_writer.end_element("sheetData")?;
        xml_writer.end_element("worksheet")?;
        xml_writer.flush()?;

        self.sheet_open = false;
        Ok(())
    }

    /// Close the workbook and write the remaining package parts
    pub fn close(mut self) -> Result<()> {
        if self.worksheets.is_empty() {
            return Err(ExcelError::WriteError(
                "A workbook needs at least one worksheet".to_string(),
            ));
        }
        self.finish_current_worksheet()?;

        self.zip.start_file("xl/sharedStrings.xml", file_options(self.compression_level))?;
        {
            let mut xml_writer = XmlWriter::new(&mut self.zip);
            self.shared_strings.write_xml(&mut xml_writer)?;
        }

        self.zip.start_file("xl/workbook.xml", file_options(self.compression_level))?;
        self.write_workbook_xml()?;

        self.zip.start_file("xl/_rels/workbook.xml.rels", file_options(self.compression_level))?;
        self.write_workbook_rels()?;

        self.zip.start_file("xl/styles.xml", file_options(self.compression_level))?;
        self.zip.write_all(STYLES.as_bytes())?;

        self.zip.start_file("[Content_Types].xml", file_options(self.compression_level))?;
        self.write_content_types()?;

        let mut writer = self.zip.finish()?;
        writer.flush()?;
        Ok(())
    }

    fn write_content_types(&mut self) -> Result<()> {
        let mut xml_writer = XmlWriter::new(&mut self.zip);
        xml_writer.declaration()?;
        xml_writer.start_element("Types")?;
        xml_writer.attribute(
            "xmlns",
            "http://schemas.openxmlformats.org/package/2006/content-types",
        )?;
        xml_writer.close_start_tag()?;
        xml_writer.write_str(CONTENT_TYPE_DEFAULTS)?;

        for i in 1..=self.worksheets.len() {
            xml_writer.start_element("Override")?;
            xml_writer.attribute("PartName", &format!("/xl/worksheets/sheet{}.xml", i))?;
            xml_writer.attribute(
                "ContentType",
                "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml",
            )?;
            xml_writer.close_empty()?;
        }

        xml_writer.end_element("Types")?;
        xml_writer.flush()
    }

    fn write_workbook_xml(&mut self) -> Result<()> {
        let mut xml_writer = XmlWriter::new(&mut self.zip);

        xml_writer.declaration()?;
        xml_writer.start_element("workbook")?;
        xml_writer.attribute("xmlns", SPREADSHEET_NS)?;
        xml_writer.attribute("xmlns:r", RELATIONSHIP_NS)?;
        xml_writer.close_start_tag()?;

        xml_writer.start_element("sheets")?;
        xml_writer.close_start_tag()?;

        for (i, name) in self.worksheets.iter().enumerate() {
            let sheet_id = i + 1;
            xml_writer.start_element("sheet")?;
            xml_writer.attribute("name", name)?;
            xml_writer.attribute_int("sheetId", sheet_id as i64)?;
            xml_writer.attribute("r:id", &format!("rId{}", sheet_id))?;
            xml_writer.close_empty()?;
        }

        xml_writer.end_element("sheets")?;
        xml_writer.end_element("workbook")?;
        xml_writer.flush()
    }

    fn write_workbook_rels(&mut self) -> Result<()> {
        let sheet_count = self.worksheets.len();
        let mut xml_writer = XmlWriter::new(&mut self.zip);

        xml_writer.declaration()?;
        xml_writer.start_element("Relationships")?;
        xml_writer.attribute(
            "xmlns",
            "http://schemas.openxmlformats.org/package/2006/relationships",
        )?;
        xml_writer.close_start_tag()?;

        let mut relationship = |id: usize, kind: &str, target: &str| -> Result<()> {
            xml_writer.start_element("Relationship")?;
            xml_writer.attribute("Id", &format!("rId{}", id))?;
            xml_writer.attribute("Type", &format!("{}/{}", RELATIONSHIP_NS, kind))?;
            xml_writer.attribute("Target", target)?;
            xml_writer.close_empty()
        };

        for i in 1..=sheet_count {
            relationship(i, "worksheet", &format!("worksheets/sheet{}.xml", i))?;
        }
        relationship(sheet_count + 1, "styles", "styles.xml")?;
        relationship(sheet_count + 2, "sharedStrings", "sharedStrings.xml")?;

        xml_writer.end_element("Relationships")?;
        xml_writer.flush()
    }
}

fn file_options(compression_level: i64) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(compression_level))
        .last_modified_time(zip::DateTime::default())
}

fn validate_sheet_name(name: &str) -> Result<()> {
    const FORBIDDEN: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

    if name.is_empty() || name.chars().count() > MAX_SHEET_NAME_CHARS {
        return Err(ExcelError::WriteError(format!(
            "Sheet name '{}' must be 1-{} characters",
            name, MAX_SHEET_NAME_CHARS
        )));
    }
    if name.contains(FORBIDDEN) || name.starts_with('\'') || name.ends_with('\'') {
        return Err(ExcelError::WriteError(format!(
            "Sheet name '{}' contains characters Excel does not allow",
            name
        )));
    }
    Ok(())
}

const CONTENT_TYPE_DEFAULTS: &str = r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
<Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>
<Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>
<Override PartName="/docProps/app.xml" ContentType="application/vnd.openxmlformats-officedocument.extended-properties+xml"/>
"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties" Target="docProps/app.xml"/>
</Relationships>"#;

// Fixed timestamps keep repeated splits byte-identical
const CORE_PROPS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
<dc:creator>excelsplit</dc:creator>
<cp:lastModifiedBy>excelsplit</cp:lastModifiedBy>
<dcterms:created xsi:type="dcterms:W3CDTF">2024-01-01T00:00:00Z</dcterms:created>
<dcterms:modified xsi:type="dcterms:W3CDTF">2024-01-01T00:00:00Z</dcterms:modified>
</cp:coreProperties>"#;

const APP_PROPS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties">
<Application>excelsplit</Application>
<DocSecurity>0</DocSecurity>
<ScaleCrop>false</ScaleCrop>
<LinksUpToDate>false</LinksUpToDate>
<SharedDoc>false</SharedDoc>
<HyperlinksChanged>false</HyperlinksChanged>
<AppVersion>1.0</AppVersion>
</Properties>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<fonts count="1">
<font><sz val="11"/><name val="Calibri"/></font>
</fonts>
<fills count="2">
<fill><patternFill patternType="none"/></fill>
<fill><patternFill patternType="gray125"/></fill>
</fills>
<borders count="1">
<border><left/><right/><top/><bottom/><diagonal/></border>
</borders>
<cellStyleXfs count="1">
<xf numFmtId="0" fontId="0" fillId="0" borderId="0"/>
</cellStyleXfs>
<cellXfs count="2">
<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>
<xf numFmtId="14" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/>
</cellXfs>
</styleSheet>"#;
