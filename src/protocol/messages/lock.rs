//! SMB2 LOCK messages

use super::common::FileId;
use super::tree::{parse_empty_body, serialize_empty_body};
use crate::codec::{Reader, SmbMessage, Writer};
use crate::error::{Error, Result};
use crate::protocol::constants::{structure_size, LockFlags};

/// One byte-range lock or unlock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockElement {
    pub offset: u64,
    pub length: u64,
    pub flags: LockFlags,
}

impl LockElement {
    pub const SIZE: usize = 24;

    fn read(r: &mut Reader<'_>) -> Result<Self> {
        let offset = r.read_u64()?;
        let length = r.read_u64()?;
        let flags = LockFlags::from_bits_truncate(r.read_u32()?);
        r.skip(4)?; // reserved
        Ok(Self {
            offset,
            length,
            flags,
        })
    }

    fn write(&self, w: &mut Writer) -> Result<()> {
        w.put_u64(self.offset)?;
        w.put_u64(self.length)?;
        w.put_u32(self.flags.bits())?;
        w.put_u32(0)?;
        Ok(())
    }
}

/// SMB2 LOCK request: one or more byte-range lock elements on a handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2LockRequest {
    pub lock_sequence: u32,
    pub file_id: FileId,
    pub locks: Vec<LockElement>,
}

impl Smb2LockRequest {
    const FIXED_SIZE: usize = 24;
}

impl SmbMessage for Smb2LockRequest {
    fn parse(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let structure_size = r.read_u16()?;
        if structure_size != structure_size::LOCK_REQUEST {
            return Err(Error::IncorrectParamsLength {
                expected: structure_size::LOCK_REQUEST,
                actual: structure_size,
            });
        }
        let lock_count = r.read_u16()?;
        if lock_count == 0 {
            return Err(Error::ParseError("Lock request with zero locks".into()));
        }
        let lock_sequence = r.read_u32()?;
        let file_id = FileId::read(&mut r)?;
        let mut locks = Vec::with_capacity(lock_count as usize);
        for _ in 0..lock_count {
            locks.push(LockElement::read(&mut r)?);
        }
        Ok(Self {
            lock_sequence,
            file_id,
            locks,
        })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut w = Writer::with_capacity(self.size());
        w.put_u16(structure_size::LOCK_REQUEST)?;
        w.put_u16(self.locks.len() as u16)?;
        w.put_u32(self.lock_sequence)?;
        self.file_id.write(&mut w)?;
        for lock in &self.locks {
            lock.write(&mut w)?;
        }
        Ok(w.into_vec())
    }

    fn size(&self) -> usize {
        Self::FIXED_SIZE + self.locks.len() * LockElement::SIZE
    }
}

/// SMB2 LOCK response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Smb2LockResponse;

impl SmbMessage for Smb2LockResponse {
    fn parse(buf: &[u8]) -> Result<Self> {
        parse_empty_body(buf, structure_size::LOCK_RESPONSE)?;
        Ok(Self)
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        serialize_empty_body(structure_size::LOCK_RESPONSE)
    }

    fn size(&self) -> usize {
        4
    }
}
