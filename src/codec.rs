//! Byte codec for fixed-layout little-endian wire structures
//!
//! Every SMB2 command body has a rigid byte layout. All parsing goes
//! through [`Reader`], which bounds-checks each field read and fails with
//! [`Error::TruncatedBuffer`] instead of reading out of range; all
//! serialization goes through [`Writer`]. Nothing in this crate
//! reinterprets raw memory as a struct.

use crate::error::{Error, Result};
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

/// Trait for SMB2 wire structures that can be parsed from and serialized
/// to bytes.
pub trait SmbMessage: Sized {
    /// Parse the structure from the given body bytes
    fn parse(buf: &[u8]) -> Result<Self>;

    /// Serialize the structure to its exact wire layout
    fn serialize(&self) -> Result<Vec<u8>>;

    /// Number of bytes the structure occupies on the wire
    fn size(&self) -> usize;
}

/// Checked little-endian reader over a borrowed byte slice
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn check(&self, len: usize) -> Result<()> {
        let need = self.pos + len;
        if need > self.buf.len() {
            return Err(Error::TruncatedBuffer {
                need,
                have: self.buf.len(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.check(1)?;
        let v = self.buf[self.pos];
        self.pos += 1;
        Ok(v)
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.check(2)?;
        let v = LittleEndian::read_u16(&self.buf[self.pos..]);
        self.pos += 2;
        Ok(v)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.check(4)?;
        let v = LittleEndian::read_u32(&self.buf[self.pos..]);
        self.pos += 4;
        Ok(v)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.check(8)?;
        let v = LittleEndian::read_u64(&self.buf[self.pos..]);
        self.pos += 8;
        Ok(v)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.check(len)?;
        let v = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(v)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.check(len)?;
        self.pos += len;
        Ok(())
    }
}

/// Little-endian writer producing an owned byte vector
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn put_u8(&mut self, v: u8) -> Result<()> {
        self.buf.write_u8(v)?;
        Ok(())
    }

    pub fn put_u16(&mut self, v: u16) -> Result<()> {
        self.buf.write_u16::<LittleEndian>(v)?;
        Ok(())
    }

    pub fn put_u32(&mut self, v: u32) -> Result<()> {
        self.buf.write_u32::<LittleEndian>(v)?;
        Ok(())
    }

    pub fn put_u64(&mut self, v: u64) -> Result<()> {
        self.buf.write_u64::<LittleEndian>(v)?;
        Ok(())
    }

    pub fn put_bytes(&mut self, v: &[u8]) -> Result<()> {
        self.buf.extend_from_slice(v);
        Ok(())
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a string as UTF-16LE without a terminator, the encoding SMB2
/// uses for share paths and file names.
pub fn utf16le_bytes(s: &str) -> Vec<u8> {
    s.encode_utf16()
        .flat_map(|unit| unit.to_le_bytes())
        .collect()
}

/// Decode a UTF-16LE byte run into a string
pub fn string_from_utf16le(buf: &[u8]) -> Result<String> {
    if buf.len() % 2 != 0 {
        return Err(Error::ParseError(
            "UTF-16 buffer has odd length".to_string(),
        ));
    }
    let units: Vec<u16> = buf
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).map_err(|_| Error::ParseError("Invalid UTF-16 string".to_string()))
}
