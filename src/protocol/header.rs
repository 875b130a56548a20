//! SMB2 message header
//!
//! Every SMB2 message starts with this fixed 64-byte structure; the
//! command body follows immediately with no delimiter.

use crate::codec::{Reader, SmbMessage, Writer};
use crate::error::{Error, NtStatus, Result};
use crate::protocol::constants::{Smb2Command, Smb2HeaderFlags, SMB2_HEADER_SIZE, SMB2_MAGIC};
use std::convert::TryFrom;

/// SMB2 header (64 bytes, little-endian)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2Header {
    pub credit_charge: u16,
    /// Status on responses, channel sequence on SMB3 requests
    pub status: u32,
    pub command: Smb2Command,
    /// Credits requested (request) or granted (response)
    pub credit_request: u16,
    pub flags: Smb2HeaderFlags,
    /// Offset of the next compounded message; always 0 here (compounding
    /// is out of scope)
    pub next_command: u32,
    pub message_id: u64,
    pub process_id: u32,
    pub tree_id: u32,
    pub session_id: u64,
    pub signature: [u8; 16],
}

impl Smb2Header {
    pub const SIZE: usize = SMB2_HEADER_SIZE;

    pub fn new(command: Smb2Command) -> Self {
        Self {
            credit_charge: 0,
            status: 0,
            command,
            credit_request: 1,
            flags: Smb2HeaderFlags::empty(),
            next_command: 0,
            message_id: 0,
            process_id: 0,
            tree_id: 0,
            session_id: 0,
            signature: [0; 16],
        }
    }

    pub fn nt_status(&self) -> NtStatus {
        NtStatus(self.status)
    }

    pub fn is_response(&self) -> bool {
        self.flags.contains(Smb2HeaderFlags::SERVER_TO_REDIR)
    }
}

impl SmbMessage for Smb2Header {
    fn parse(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let magic = r.read_array::<4>()?;
        if magic != SMB2_MAGIC {
            return Err(Error::IncompatibleHeader {
                version: -(magic[0] as i8),
            });
        }

        let structure_size = r.read_u16()?;
        if structure_size as usize != Self::SIZE {
            return Err(Error::IncorrectParamsLength {
                expected: Self::SIZE as u16,
                actual: structure_size,
            });
        }

        let credit_charge = r.read_u16()?;
        let status = r.read_u32()?;
        let command = Smb2Command::try_from(r.read_u16()?)?;
        let credit_request = r.read_u16()?;
        let flags = Smb2HeaderFlags::from_bits_truncate(r.read_u32()?);
        let next_command = r.read_u32()?;
        let message_id = r.read_u64()?;
        let process_id = r.read_u32()?;
        let tree_id = r.read_u32()?;
        let session_id = r.read_u64()?;
        let signature = r.read_array::<16>()?;

        Ok(Self {
            credit_charge,
            status,
            command,
            credit_request,
            flags,
            next_command,
            message_id,
            process_id,
            tree_id,
            session_id,
            signature,
        })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut w = Writer::with_capacity(Self::SIZE);
        w.put_bytes(&SMB2_MAGIC)?;
        w.put_u16(Self::SIZE as u16)?;
        w.put_u16(self.credit_charge)?;
        w.put_u32(self.status)?;
        w.put_u16(self.command.to_u16())?;
        w.put_u16(self.credit_request)?;
        w.put_u32(self.flags.bits())?;
        w.put_u32(self.next_command)?;
        w.put_u64(self.message_id)?;
        w.put_u32(self.process_id)?;
        w.put_u32(self.tree_id)?;
        w.put_u64(self.session_id)?;
        w.put_bytes(&self.signature)?;
        Ok(w.into_vec())
    }

    fn size(&self) -> usize {
        Self::SIZE
    }
}
