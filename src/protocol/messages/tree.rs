//! SMB2 TREE_CONNECT and TREE_DISCONNECT messages

use super::common::slice_buffer;
use crate::codec::{self, Reader, SmbMessage, Writer};
use crate::error::{Error, Result};
use crate::protocol::constants::{
    structure_size, ShareCapabilities, ShareFlags, SMB2_HEADER_SIZE,
};
use std::convert::TryFrom;

/// SMB2 TREE_CONNECT request carrying the UTF-16 `\\host\share` path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2TreeConnectRequest {
    pub flags: u16,
    pub path: String,
}

impl Smb2TreeConnectRequest {
    const FIXED_SIZE: usize = 8;

    pub fn new(path: String) -> Self {
        Self { flags: 0, path }
    }
}

impl SmbMessage for Smb2TreeConnectRequest {
    fn parse(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let structure_size = r.read_u16()?;
        if structure_size != structure_size::TREE_CONNECT_REQUEST {
            return Err(Error::IncorrectParamsLength {
                expected: structure_size::TREE_CONNECT_REQUEST,
                actual: structure_size,
            });
        }

        let flags = r.read_u16()?;
        let path_offset = r.read_u16()?;
        let path_length = r.read_u16()?;
        let path_bytes = slice_buffer(buf, path_offset as usize, path_length as usize)?;
        let path = codec::string_from_utf16le(path_bytes)?;

        Ok(Self { flags, path })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let path_bytes = codec::utf16le_bytes(&self.path);
        let mut w = Writer::with_capacity(Self::FIXED_SIZE + path_bytes.len());
        w.put_u16(structure_size::TREE_CONNECT_REQUEST)?;
        w.put_u16(self.flags)?;
        let offset = if path_bytes.is_empty() {
            0
        } else {
            (SMB2_HEADER_SIZE + Self::FIXED_SIZE) as u16
        };
        w.put_u16(offset)?;
        w.put_u16(path_bytes.len() as u16)?;
        w.put_bytes(&path_bytes)?;
        Ok(w.into_vec())
    }

    fn size(&self) -> usize {
        Self::FIXED_SIZE + self.path.encode_utf16().count() * 2
    }
}

/// Share types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ShareType {
    Disk = 0x01,
    Pipe = 0x02,
    Print = 0x03,
}

impl TryFrom<u8> for ShareType {
    type Error = Error;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::Disk),
            0x02 => Ok(Self::Pipe),
            0x03 => Ok(Self::Print),
            _ => Err(Error::ParseError(format!("Invalid share type: {}", value))),
        }
    }
}

/// SMB2 TREE_CONNECT response: the share's type and capability flags.
/// The granted tree ID travels in the response header, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2TreeConnectResponse {
    pub share_type: ShareType,
    pub share_flags: ShareFlags,
    pub capabilities: ShareCapabilities,
    pub maximal_access: u32,
}

impl SmbMessage for Smb2TreeConnectResponse {
    fn parse(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let structure_size = r.read_u16()?;
        if structure_size != structure_size::TREE_CONNECT_RESPONSE {
            return Err(Error::IncorrectParamsLength {
                expected: structure_size::TREE_CONNECT_RESPONSE,
                actual: structure_size,
            });
        }

        let share_type = ShareType::try_from(r.read_u8()?)?;
        r.skip(1)?; // reserved
        let share_flags = ShareFlags::from_bits_truncate(r.read_u32()?);
        let capabilities = ShareCapabilities::from_bits_truncate(r.read_u32()?);
        let maximal_access = r.read_u32()?;

        Ok(Self {
            share_type,
            share_flags,
            capabilities,
            maximal_access,
        })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut w = Writer::with_capacity(self.size());
        w.put_u16(structure_size::TREE_CONNECT_RESPONSE)?;
        w.put_u8(self.share_type as u8)?;
        w.put_u8(0)?; // reserved
        w.put_u32(self.share_flags.bits())?;
        w.put_u32(self.capabilities.bits())?;
        w.put_u32(self.maximal_access)?;
        Ok(w.into_vec())
    }

    fn size(&self) -> usize {
        16
    }
}

/// SMB2 TREE_DISCONNECT request (body is structure size + reserved)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Smb2TreeDisconnectRequest;

impl SmbMessage for Smb2TreeDisconnectRequest {
    fn parse(buf: &[u8]) -> Result<Self> {
        parse_empty_body(buf, structure_size::TREE_DISCONNECT_REQUEST)?;
        Ok(Self)
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        serialize_empty_body(structure_size::TREE_DISCONNECT_REQUEST)
    }

    fn size(&self) -> usize {
        4
    }
}

/// SMB2 TREE_DISCONNECT response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Smb2TreeDisconnectResponse;

impl SmbMessage for Smb2TreeDisconnectResponse {
    fn parse(buf: &[u8]) -> Result<Self> {
        parse_empty_body(buf, structure_size::TREE_DISCONNECT_RESPONSE)?;
        Ok(Self)
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        serialize_empty_body(structure_size::TREE_DISCONNECT_RESPONSE)
    }

    fn size(&self) -> usize {
        4
    }
}

/// Several commands share the 4-byte "structure size + reserved" body
pub(crate) fn parse_empty_body(buf: &[u8], expected: u16) -> Result<()> {
    let mut r = Reader::new(buf);
    let structure_size = r.read_u16()?;
    if structure_size != expected {
        return Err(Error::IncorrectParamsLength {
            expected,
            actual: structure_size,
        });
    }
    r.read_u16()?; // reserved
    Ok(())
}

pub(crate) fn serialize_empty_body(structure_size: u16) -> Result<Vec<u8>> {
    let mut w = Writer::with_capacity(4);
    w.put_u16(structure_size)?;
    w.put_u16(0)?;
    Ok(w.into_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_request_round_trip() {
        let req = Smb2TreeConnectRequest::new("\\\\server\\share".to_string());
        let bytes = req.serialize().unwrap();
        assert_eq!(bytes.len(), req.size());
        // Path offset points just past header + fixed part
        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), 72);
        assert_eq!(Smb2TreeConnectRequest::parse(&bytes).unwrap(), req);
    }

    #[test]
    fn test_connect_response_round_trip() {
        let resp = Smb2TreeConnectResponse {
            share_type: ShareType::Disk,
            share_flags: ShareFlags::NO_CACHING,
            capabilities: ShareCapabilities::empty(),
            maximal_access: 0x001F_01FF,
        };
        let bytes = resp.serialize().unwrap();
        assert_eq!(bytes.len(), 16);
        assert_eq!(Smb2TreeConnectResponse::parse(&bytes).unwrap(), resp);
    }

    #[test]
    fn test_connect_response_invalid_share_type() {
        let resp = Smb2TreeConnectResponse {
            share_type: ShareType::Pipe,
            share_flags: ShareFlags::empty(),
            capabilities: ShareCapabilities::empty(),
            maximal_access: 0,
        };
        let mut bytes = resp.serialize().unwrap();
        bytes[2] = 0x09;
        assert!(Smb2TreeConnectResponse::parse(&bytes).is_err());
    }

    #[test]
    fn test_disconnect_round_trip() {
        let bytes = Smb2TreeDisconnectRequest.serialize().unwrap();
        assert_eq!(bytes, vec![4, 0, 0, 0]);
        Smb2TreeDisconnectRequest::parse(&bytes).unwrap();
        Smb2TreeDisconnectResponse::parse(&bytes).unwrap();
    }
}
