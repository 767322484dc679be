//! Sequential big-endian reader over a class-file byte buffer.

use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Cursor, Read, Seek, SeekFrom};

use crate::errors::ParseError;

/// Wraps a byte buffer with an advancing cursor. Every read moves the
/// cursor; running off the end of the buffer is a [`ParseError`] with
/// the offset the read started at.
pub struct Reader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    /// Current offset into the underlying buffer.
    pub fn offset(&self) -> usize {
        self.cursor.position() as usize
    }

    fn eof(&self) -> ParseError {
        ParseError::UnexpectedEof {
            offset: self.offset(),
        }
    }

    pub fn read_u8(&mut self) -> Result<u8, ParseError> {
        self.cursor.read_u8().map_err(|_| self.eof())
    }

    pub fn read_u16_be(&mut self) -> Result<u16, ParseError> {
        self.cursor.read_u16::<BigEndian>().map_err(|_| self.eof())
    }

    pub fn read_u32_be(&mut self) -> Result<u32, ParseError> {
        self.cursor.read_u32::<BigEndian>().map_err(|_| self.eof())
    }

    /// Bulk copy of the next `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, ParseError> {
        let mut buf = vec![0u8; len];
        self.cursor.read_exact(&mut buf).map_err(|_| self.eof())?;
        Ok(buf)
    }

    /// Advance the cursor by `len` without looking at the bytes.
    pub fn skip(&mut self, len: usize) -> Result<(), ParseError> {
        let end = self.cursor.get_ref().len() as u64;
        let target = self.cursor.position() + len as u64;
        if target > end {
            return Err(self.eof());
        }
        self.cursor
            .seek(SeekFrom::Start(target))
            .map_err(|_| self.eof())?;
        Ok(())
    }
}
