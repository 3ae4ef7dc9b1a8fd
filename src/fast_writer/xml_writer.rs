//! Buffered XML emitter with minimal allocations

use crate::error::Result;
use std::io::Write;

/// Bytes buffered before they are pushed to the underlying writer
const FLUSH_THRESHOLD: usize = 4096;

/// Small XML writer that buffers output and escapes text/attribute values
pub struct XmlWriter<W: Write> {
    writer: W,
    buffer: Vec<u8>,
}

impl<W: Write> XmlWriter<W> {
    pub fn new(writer: W) -> Self {
        XmlWriter {
            writer,
            buffer: Vec::with_capacity(8192),
        }
    }

    /// Write raw bytes directly
    #[inline]
    pub fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        self.buffer.extend_from_slice(data);
        self.maybe_flush()
    }

    #[inline]
    pub fn write_str(&mut self, s: &str) -> Result<()> {
        self.write_raw(s.as_bytes())
    }

    /// Standard `<?xml ...?>` prolog
    pub fn declaration(&mut self) -> Result<()> {
        self.write_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n")
    }

    /// Open a start tag; finish it with `close_start_tag` or `close_empty`
    #[inline]
    pub fn start_element(&mut self, name: &str) -> Result<()> {
        self.write_raw(b"<")?;
        self.write_str(name)
    }

    #[inline]
    pub fn close_start_tag(&mut self) -> Result<()> {
        self.write_raw(b">")
    }

    /// Finish a start tag as a self-closing element
    #[inline]
    pub fn close_empty(&mut self) -> Result<()> {
        self.write_raw(b"/>")
    }

    #[inline]
    pub fn end_element(&mut self, name: &str) -> Result<()> {
        self.write_raw(b"</")?;
        self.write_str(name)?;
        self.write_raw(b">")
    }

    #[inline]
    pub fn attribute(&mut self, name: &str, value: &str) -> Result<()> {
        self.write_raw(b" ")?;
        self.write_str(name)?;
        self.write_raw(b"=\"")?;
        self.write_escaped(value)?;
        self.write_raw(b"\"")
    }

    #[inline]
    pub fn attribute_int(&mut self, name: &str, value: i64) -> Result<()> {
        let mut buf = itoa::Buffer::new();
        self.write_raw(b" ")?;
        self.write_str(name)?;
        self.write_raw(b"=\"")?;
        self.write_str(buf.format(value))?;
        self.write_raw(b"\"")
    }

    /// Write text content with XML escaping.
    ///
    /// Control characters other than tab, CR and LF are not allowed in XML 1.0
    /// and are dropped.
    pub fn write_escaped(&mut self, text: &str) -> Result<()> {
        for byte in text.bytes() {
            match byte {
                b'&' => self.buffer.extend_from_slice(b"&amp;"),
                b'<' => self.buffer.extend_from_slice(b"&lt;"),
                b'>' => self.buffer.extend_from_slice(b"&gt;"),
                b'"' => self.buffer.extend_from_slice(b"&quot;"),
                b'\'' => self.buffer.extend_from_slice(b"&apos;"),
                b'\t' | b'\n' | b'\r' => self.buffer.push(byte),
                0x00..=0x1f => {}
                _ => self.buffer.push(byte),
            }
        }
        self.maybe_flush()
    }

    /// Flush buffer to underlying writer
    pub fn flush(&mut self) -> Result<()> {
        if !self.buffer.is_empty() {
            self.writer.write_all(&self.buffer)?;
            self.buffer.clear();
        }
        self.writer.flush()?;
        Ok(())
    }

    #[inline]
    fn maybe_flush(&mut self) -> Result<()> {
        if self.buffer.len() > FLUSH_THRESHOLD {
            self.writer.write_all(&self.buffer)?;
            self.buffer.clear();
        }
        Ok(())
    }
}
