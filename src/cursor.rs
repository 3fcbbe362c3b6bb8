use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Error, ErrorKind, Result};

/// Bounds-checked little-endian reads over a byte span.
///
/// All multi-byte integers in a serialized table are little-endian and may sit
/// at arbitrary byte positions, so every read goes through byte-wise decoding
/// rather than pointer reinterpretation. Reads that would run past the end of
/// the span fail with [`ErrorKind::UnexpectedEof`].
#[derive(Debug)]
pub struct PayloadCursor<'a> {
    span: &'a [u8],
    pos: usize,
}

impl<'a> PayloadCursor<'a> {
    /// Creates a cursor over `span` positioned at `pos`.
    ///
    /// # Errors
    ///
    /// Returns an error if `pos` lies beyond the end of the span.
    pub fn new(span: &'a [u8], pos: usize) -> Result<Self> {
        if pos > span.len() {
            return Err(Error::new(
                ErrorKind::UnexpectedEof,
                format!("offset {} is beyond the {} byte span", pos, span.len()),
            ));
        }
        Ok(Self { span, pos })
    }

    /// Creates a cursor at a position already validated against the span.
    pub(crate) fn at(span: &'a [u8], pos: usize) -> Self {
        debug_assert!(pos <= span.len());
        Self {
            span,
            pos: pos.min(span.len()),
        }
    }

    /// Current position, measured from the start of the span.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Reads a little-endian `u16` and advances past it.
    pub fn read_u16(&mut self) -> Result<u16> {
        let mut rest = &self.span[self.pos..];
        let value = rest.read_u16::<LittleEndian>()?;
        self.pos += 2;
        Ok(value)
    }

    /// Reads a little-endian `u32` and advances past it.
    pub fn read_u32(&mut self) -> Result<u32> {
        let mut rest = &self.span[self.pos..];
        let value = rest.read_u32::<LittleEndian>()?;
        self.pos += 4;
        Ok(value)
    }

    /// Returns the next `len` bytes and advances past them.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.span.len())
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::UnexpectedEof,
                    format!("{} bytes requested at offset {} of a {} byte span", len, self.pos, self.span.len()),
                )
            })?;
        let bytes = &self.span[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    /// Advances past `len` bytes.
    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }
}
