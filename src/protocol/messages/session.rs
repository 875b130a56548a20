//! SMB2 SESSION_SETUP messages
//!
//! The security blob is carried opaquely; NTLM/Kerberos token generation
//! belongs to the caller.

use super::common::slice_buffer;
use crate::codec::{Reader, SmbMessage, Writer};
use crate::error::{Error, Result};
use crate::protocol::constants::{structure_size, Smb2Capabilities, SMB2_HEADER_SIZE};
use bitflags::bitflags;

bitflags! {
    /// Session flags returned by the server
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SessionFlags: u16 {
        const IS_GUEST     = 0x0001;
        const IS_NULL      = 0x0002;
        const ENCRYPT_DATA = 0x0004;
    }
}

/// SMB2 SESSION_SETUP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2SessionSetupRequest {
    pub flags: u8,
    /// Single byte here, unlike the u16 field in NEGOTIATE
    pub security_mode: u8,
    pub capabilities: Smb2Capabilities,
    pub channel: u32,
    pub previous_session_id: u64,
    pub security_blob: Vec<u8>,
}

impl Smb2SessionSetupRequest {
    const FIXED_SIZE: usize = 24;

    pub fn new(security_blob: Vec<u8>) -> Self {
        Self {
            flags: 0,
            security_mode: 0x01, // signing enabled
            capabilities: Smb2Capabilities::empty(),
            channel: 0,
            previous_session_id: 0,
            security_blob,
        }
    }
}

impl SmbMessage for Smb2SessionSetupRequest {
    fn parse(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let structure_size = r.read_u16()?;
        if structure_size != structure_size::SESSION_SETUP_REQUEST {
            return Err(Error::IncorrectParamsLength {
                expected: structure_size::SESSION_SETUP_REQUEST,
                actual: structure_size,
            });
        }

        let flags = r.read_u8()?;
        let security_mode = r.read_u8()?;
        let capabilities = Smb2Capabilities::from_bits_truncate(r.read_u32()?);
        let channel = r.read_u32()?;
        let security_buffer_offset = r.read_u16()?;
        let security_buffer_length = r.read_u16()?;
        let previous_session_id = r.read_u64()?;

        let security_blob = slice_buffer(
            buf,
            security_buffer_offset as usize,
            security_buffer_length as usize,
        )?
        .to_vec();

        Ok(Self {
            flags,
            security_mode,
            capabilities,
            channel,
            previous_session_id,
            security_blob,
        })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut w = Writer::with_capacity(self.size());
        w.put_u16(structure_size::SESSION_SETUP_REQUEST)?;
        w.put_u8(self.flags)?;
        w.put_u8(self.security_mode)?;
        w.put_u32(self.capabilities.bits())?;
        w.put_u32(self.channel)?;
        let offset = if self.security_blob.is_empty() {
            0
        } else {
            (SMB2_HEADER_SIZE + Self::FIXED_SIZE) as u16
        };
        w.put_u16(offset)?;
        w.put_u16(self.security_blob.len() as u16)?;
        w.put_u64(self.previous_session_id)?;
        w.put_bytes(&self.security_blob)?;
        Ok(w.into_vec())
    }

    fn size(&self) -> usize {
        Self::FIXED_SIZE + self.security_blob.len()
    }
}

/// SMB2 SESSION_SETUP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2SessionSetupResponse {
    pub session_flags: SessionFlags,
    /// Challenge or final token from the server, opaque to this layer
    pub security_blob: Vec<u8>,
}

impl Smb2SessionSetupResponse {
    const FIXED_SIZE: usize = 8;
}

impl SmbMessage for Smb2SessionSetupResponse {
    fn parse(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let structure_size = r.read_u16()?;
        if structure_size != structure_size::SESSION_SETUP_RESPONSE {
            return Err(Error::IncorrectParamsLength {
                expected: structure_size::SESSION_SETUP_RESPONSE,
                actual: structure_size,
            });
        }

        let session_flags = SessionFlags::from_bits_truncate(r.read_u16()?);
        let security_buffer_offset = r.read_u16()?;
        let security_buffer_length = r.read_u16()?;

        let security_blob = slice_buffer(
            buf,
            security_buffer_offset as usize,
            security_buffer_length as usize,
        )?
        .to_vec();

        Ok(Self {
            session_flags,
            security_blob,
        })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut w = Writer::with_capacity(self.size());
        w.put_u16(structure_size::SESSION_SETUP_RESPONSE)?;
        w.put_u16(self.session_flags.bits())?;
        let offset = if self.security_blob.is_empty() {
            0
        } else {
            (SMB2_HEADER_SIZE + Self::FIXED_SIZE) as u16
        };
        w.put_u16(offset)?;
        w.put_u16(self.security_blob.len() as u16)?;
        w.put_bytes(&self.security_blob)?;
        Ok(w.into_vec())
    }

    fn size(&self) -> usize {
        Self::FIXED_SIZE + self.security_blob.len()
    }
}
