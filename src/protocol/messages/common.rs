//! Shared pieces of the SMB2 message shapes

use crate::codec::{Reader, Writer};
use crate::error::{Error, Result};
use crate::protocol::constants::SMB2_HEADER_SIZE;

/// SMB2 file handle: a persistent/volatile pair granted by CREATE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId {
    pub persistent: u64,
    pub volatile: u64,
}

impl FileId {
    pub const SIZE: usize = 16;

    pub fn new(persistent: u64, volatile: u64) -> Self {
        Self {
            persistent,
            volatile,
        }
    }

    pub fn read(r: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            persistent: r.read_u64()?,
            volatile: r.read_u64()?,
        })
    }

    pub fn write(&self, w: &mut Writer) -> Result<()> {
        w.put_u64(self.persistent)?;
        w.put_u64(self.volatile)?;
        Ok(())
    }
}

/// Resolve a variable buffer declared by an (offset, length) field pair.
///
/// SMB2 buffer offsets are relative to the start of the 64-byte header,
/// while decoders only see the body slice; this converts and bounds-checks
/// in one place. A zero length yields an empty slice regardless of offset.
pub fn slice_buffer(body: &[u8], offset: usize, length: usize) -> Result<&[u8]> {
    if length == 0 {
        return Ok(&[]);
    }
    if offset < SMB2_HEADER_SIZE {
        return Err(Error::ParseError(format!(
            "Buffer offset {} points inside the header",
            offset
        )));
    }
    let start = offset - SMB2_HEADER_SIZE;
    let end = start
        .checked_add(length)
        .ok_or(Error::IncorrectMessageLength {
            declared: usize::MAX,
            available: body.len(),
        })?;
    if end > body.len() {
        return Err(Error::IncorrectMessageLength {
            declared: end,
            available: body.len(),
        });
    }
    Ok(&body[start..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_id_round_trip() {
        let id = FileId::new(0xAAAA_BBBB_CCCC_DDDD, 0x1111_2222_3333_4444);
        let mut w = Writer::new();
        id.write(&mut w).unwrap();
        let bytes = w.into_vec();
        assert_eq!(bytes.len(), FileId::SIZE);
        let mut r = Reader::new(&bytes);
        assert_eq!(FileId::read(&mut r).unwrap(), id);
    }

    #[test]
    fn test_slice_buffer_bounds() {
        let body = [0u8; 16];
        // offset 72 from header start == offset 8 into the body
        assert_eq!(slice_buffer(&body, 72, 8).unwrap().len(), 8);
        assert!(slice_buffer(&body, 72, 9).is_err());
        assert!(slice_buffer(&body, 10, 4).is_err());
        assert_eq!(slice_buffer(&body, 0, 0).unwrap().len(), 0);
    }
}
