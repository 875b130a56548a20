//! SMB2 NEGOTIATE messages

use super::common::slice_buffer;
use crate::codec::{Reader, SmbMessage, Writer};
use crate::error::{Error, Result};
use crate::protocol::constants::{
    structure_size, SecurityMode, Smb2Capabilities, Smb2Dialect, SMB2_HEADER_SIZE,
};
use std::convert::TryFrom;
use uuid::Uuid;

/// SMB2 NEGOTIATE request: the dialect list the client is willing to speak
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2NegotiateRequest {
    pub security_mode: SecurityMode,
    pub capabilities: Smb2Capabilities,
    pub client_guid: Uuid,
    pub client_start_time: u64,
    pub dialects: Vec<Smb2Dialect>,
}

impl Smb2NegotiateRequest {
    /// Fixed portion of the body, before the dialect array
    const FIXED_SIZE: usize = 36;

    pub fn new(dialects: Vec<Smb2Dialect>) -> Self {
        Self {
            security_mode: SecurityMode::SIGNING_ENABLED,
            capabilities: Smb2Capabilities::empty(),
            client_guid: Uuid::new_v4(),
            client_start_time: 0,
            dialects,
        }
    }
}

impl SmbMessage for Smb2NegotiateRequest {
    fn parse(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let structure_size = r.read_u16()?;
        if structure_size != structure_size::NEGOTIATE_REQUEST {
            return Err(Error::IncorrectParamsLength {
                expected: structure_size::NEGOTIATE_REQUEST,
                actual: structure_size,
            });
        }

        let dialect_count = r.read_u16()?;
        let security_mode = SecurityMode::from_bits_truncate(r.read_u16()?);
        r.skip(2)?; // reserved
        let capabilities = Smb2Capabilities::from_bits_truncate(r.read_u32()?);
        let client_guid = Uuid::from_bytes(r.read_array::<16>()?);
        let client_start_time = r.read_u64()?;

        let mut dialects = Vec::with_capacity(dialect_count as usize);
        for _ in 0..dialect_count {
            dialects.push(Smb2Dialect::try_from(r.read_u16()?)?);
        }

        Ok(Self {
            security_mode,
            capabilities,
            client_guid,
            client_start_time,
            dialects,
        })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut w = Writer::with_capacity(self.size());
        w.put_u16(structure_size::NEGOTIATE_REQUEST)?;
        w.put_u16(self.dialects.len() as u16)?;
        w.put_u16(self.security_mode.bits())?;
        w.put_u16(0)?; // reserved
        w.put_u32(self.capabilities.bits())?;
        w.put_bytes(self.client_guid.as_bytes())?;
        w.put_u64(self.client_start_time)?;
        for dialect in &self.dialects {
            w.put_u16(dialect.to_u16())?;
        }
        Ok(w.into_vec())
    }

    fn size(&self) -> usize {
        Self::FIXED_SIZE + self.dialects.len() * 2
    }
}

/// SMB2 NEGOTIATE response: the dialect and limits the server granted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2NegotiateResponse {
    pub security_mode: SecurityMode,
    pub dialect: Smb2Dialect,
    pub server_guid: Uuid,
    pub capabilities: Smb2Capabilities,
    pub max_transact_size: u32,
    pub max_read_size: u32,
    pub max_write_size: u32,
    pub system_time: u64,
    pub server_start_time: u64,
    pub security_blob: Vec<u8>,
}

impl Smb2NegotiateResponse {
    /// Fixed portion of the body, before the security buffer
    const FIXED_SIZE: usize = 64;
}

impl SmbMessage for Smb2NegotiateResponse {
    fn parse(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let structure_size = r.read_u16()?;
        if structure_size != structure_size::NEGOTIATE_RESPONSE {
            return Err(Error::IncorrectParamsLength {
                expected: structure_size::NEGOTIATE_RESPONSE,
                actual: structure_size,
            });
        }

        let security_mode = SecurityMode::from_bits_truncate(r.read_u16()?);
        let dialect = Smb2Dialect::try_from(r.read_u16()?)?;
        r.skip(2)?; // negotiate context count (SMB 3.1.1), unused
        let server_guid = Uuid::from_bytes(r.read_array::<16>()?);
        let capabilities = Smb2Capabilities::from_bits_truncate(r.read_u32()?);
        let max_transact_size = r.read_u32()?;
        let max_read_size = r.read_u32()?;
        let max_write_size = r.read_u32()?;
        let system_time = r.read_u64()?;
        let server_start_time = r.read_u64()?;
        let security_buffer_offset = r.read_u16()?;
        let security_buffer_length = r.read_u16()?;
        r.skip(4)?; // negotiate context offset / reserved

        let security_blob = slice_buffer(
            buf,
            security_buffer_offset as usize,
            security_buffer_length as usize,
        )?
        .to_vec();

        Ok(Self {
            security_mode,
            dialect,
            server_guid,
            capabilities,
            max_transact_size,
            max_read_size,
            max_write_size,
            system_time,
            server_start_time,
            security_blob,
        })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut w = Writer::with_capacity(self.size());
        w.put_u16(structure_size::NEGOTIATE_RESPONSE)?;
        w.put_u16(self.security_mode.bits())?;
        w.put_u16(self.dialect.to_u16())?;
        w.put_u16(0)?; // negotiate context count
        w.put_bytes(self.server_guid.as_bytes())?;
        w.put_u32(self.capabilities.bits())?;
        w.put_u32(self.max_transact_size)?;
        w.put_u32(self.max_read_size)?;
        w.put_u32(self.max_write_size)?;
        w.put_u64(self.system_time)?;
        w.put_u64(self.server_start_time)?;
        let security_buffer_offset = if self.security_blob.is_empty() {
            0
        } else {
            (SMB2_HEADER_SIZE + Self::FIXED_SIZE) as u16
        };
        w.put_u16(security_buffer_offset)?;
        w.put_u16(self.security_blob.len() as u16)?;
        w.put_u32(0)?; // negotiate context offset
        w.put_bytes(&self.security_blob)?;
        Ok(w.into_vec())
    }

    fn size(&self) -> usize {
        Self::FIXED_SIZE + self.security_blob.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_response() -> Smb2NegotiateResponse {
        Smb2NegotiateResponse {
            security_mode: SecurityMode::SIGNING_ENABLED,
            dialect: Smb2Dialect::Smb210,
            server_guid: Uuid::from_bytes([0x5A; 16]),
            capabilities: Smb2Capabilities::DFS | Smb2Capabilities::LARGE_MTU,
            max_transact_size: 1 << 20,
            max_read_size: 1 << 20,
            max_write_size: 1 << 20,
            system_time: 132_000_000_000_000_000,
            server_start_time: 0,
            security_blob: vec![0x60, 0x28, 0x06, 0x06],
        }
    }

    #[test]
    fn test_request_round_trip() {
        let req = Smb2NegotiateRequest {
            security_mode: SecurityMode::SIGNING_ENABLED,
            capabilities: Smb2Capabilities::DFS,
            client_guid: Uuid::from_bytes([0xA5; 16]),
            client_start_time: 0,
            dialects: vec![Smb2Dialect::Smb202, Smb2Dialect::Smb210],
        };
        let bytes = req.serialize().unwrap();
        assert_eq!(bytes.len(), req.size());
        assert_eq!(bytes.len(), 40);
        assert_eq!(Smb2NegotiateRequest::parse(&bytes).unwrap(), req);
    }

    #[test]
    fn test_response_round_trip() {
        let resp = sample_response();
        let bytes = resp.serialize().unwrap();
        assert_eq!(bytes.len(), resp.size());
        assert_eq!(Smb2NegotiateResponse::parse(&bytes).unwrap(), resp);
    }

    #[test]
    fn test_response_blob_out_of_bounds() {
        let resp = sample_response();
        let mut bytes = resp.serialize().unwrap();
        // Inflate the declared blob length past the end of the message
        bytes[58] = 0xFF;
        assert!(matches!(
            Smb2NegotiateResponse::parse(&bytes),
            Err(Error::IncorrectMessageLength { .. })
        ));
    }

    #[test]
    fn test_request_wrong_structure_size() {
        let req = Smb2NegotiateRequest::new(vec![Smb2Dialect::Smb202]);
        let mut bytes = req.serialize().unwrap();
        bytes[0] = 35;
        assert!(matches!(
            Smb2NegotiateRequest::parse(&bytes),
            Err(Error::IncorrectParamsLength { .. })
        ));
    }
}
