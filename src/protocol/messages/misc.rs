//! SMB2 LOGOFF, ECHO, CANCEL and OPLOCK_BREAK messages, plus the common
//! ERROR response body

use super::common::{slice_buffer, FileId};
use super::tree::{parse_empty_body, serialize_empty_body};
use crate::codec::{Reader, SmbMessage, Writer};
use crate::error::{Error, Result};
use crate::protocol::constants::{structure_size, SMB2_HEADER_SIZE};

/// SMB2 LOGOFF request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Smb2LogoffRequest;

impl SmbMessage for Smb2LogoffRequest {
    fn parse(buf: &[u8]) -> Result<Self> {
        parse_empty_body(buf, structure_size::LOGOFF_REQUEST)?;
        Ok(Self)
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        serialize_empty_body(structure_size::LOGOFF_REQUEST)
    }

    fn size(&self) -> usize {
        4
    }
}

/// SMB2 LOGOFF response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Smb2LogoffResponse;

impl SmbMessage for Smb2LogoffResponse {
    fn parse(buf: &[u8]) -> Result<Self> {
        parse_empty_body(buf, structure_size::LOGOFF_RESPONSE)?;
        Ok(Self)
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        serialize_empty_body(structure_size::LOGOFF_RESPONSE)
    }

    fn size(&self) -> usize {
        4
    }
}

/// SMB2 ECHO request (keep-alive probe)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Smb2EchoRequest;

impl SmbMessage for Smb2EchoRequest {
    fn parse(buf: &[u8]) -> Result<Self> {
        parse_empty_body(buf, structure_size::ECHO_REQUEST)?;
        Ok(Self)
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        serialize_empty_body(structure_size::ECHO_REQUEST)
    }

    fn size(&self) -> usize {
        4
    }
}

/// SMB2 ECHO response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Smb2EchoResponse;

impl SmbMessage for Smb2EchoResponse {
    fn parse(buf: &[u8]) -> Result<Self> {
        parse_empty_body(buf, structure_size::ECHO_RESPONSE)?;
        Ok(Self)
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        serialize_empty_body(structure_size::ECHO_RESPONSE)
    }

    fn size(&self) -> usize {
        4
    }
}

/// SMB2 CANCEL request. The cancelled operation answers with
/// STATUS_CANCELLED under its own message ID; CANCEL itself gets no
/// reply body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Smb2CancelRequest;

impl SmbMessage for Smb2CancelRequest {
    fn parse(buf: &[u8]) -> Result<Self> {
        parse_empty_body(buf, structure_size::CANCEL_REQUEST)?;
        Ok(Self)
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        serialize_empty_body(structure_size::CANCEL_REQUEST)
    }

    fn size(&self) -> usize {
        4
    }
}

/// SMB2 OPLOCK_BREAK acknowledgment sent by the client after a break
/// notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Smb2OplockBreakAck {
    pub oplock_level: u8,
    pub file_id: FileId,
}

impl SmbMessage for Smb2OplockBreakAck {
    fn parse(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let structure_size = r.read_u16()?;
        if structure_size != structure_size::OPLOCK_BREAK_ACK {
            return Err(Error::IncorrectParamsLength {
                expected: structure_size::OPLOCK_BREAK_ACK,
                actual: structure_size,
            });
        }
        let oplock_level = r.read_u8()?;
        r.skip(1)?; // reserved
        r.skip(4)?; // reserved2
        Ok(Self {
            oplock_level,
            file_id: FileId::read(&mut r)?,
        })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut w = Writer::with_capacity(24);
        w.put_u16(structure_size::OPLOCK_BREAK_ACK)?;
        w.put_u8(self.oplock_level)?;
        w.put_u8(0)?;
        w.put_u32(0)?;
        self.file_id.write(&mut w)?;
        Ok(w.into_vec())
    }

    fn size(&self) -> usize {
        24
    }
}

/// SMB2 ERROR response body, sent with any error status in the header.
///
/// A zero byte count still carries one mandatory ErrorData byte on the
/// wire, so the body is never shorter than 9 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2ErrorResponse {
    pub error_context_count: u8,
    pub error_data: Vec<u8>,
}

impl Smb2ErrorResponse {
    const FIXED_SIZE: usize = 8;
}

impl SmbMessage for Smb2ErrorResponse {
    fn parse(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let structure_size = r.read_u16()?;
        if structure_size != structure_size::ERROR_RESPONSE {
            return Err(Error::IncorrectParamsLength {
                expected: structure_size::ERROR_RESPONSE,
                actual: structure_size,
            });
        }
        let error_context_count = r.read_u8()?;
        r.skip(1)?; // reserved
        let byte_count = r.read_u32()? as usize;
        let error_data = if byte_count == 0 {
            // Mandatory pad byte in place of the data; it must be
            // consumed or the next message starts one byte off
            r.skip(1)?;
            Vec::new()
        } else {
            // The error data trails the fixed part directly, no offset
            // field
            slice_buffer(buf, SMB2_HEADER_SIZE + Self::FIXED_SIZE, byte_count)?.to_vec()
        };
        Ok(Self {
            error_context_count,
            error_data,
        })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut w = Writer::with_capacity(self.size());
        w.put_u16(structure_size::ERROR_RESPONSE)?;
        w.put_u8(self.error_context_count)?;
        w.put_u8(0)?;
        w.put_u32(self.error_data.len() as u32)?;
        if self.error_data.is_empty() {
            w.put_u8(0)?;
        } else {
            w.put_bytes(&self.error_data)?;
        }
        Ok(w.into_vec())
    }

    fn size(&self) -> usize {
        Self::FIXED_SIZE + self.error_data.len().max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_bodies_round_trip() {
        for bytes in [
            Smb2LogoffRequest.serialize().unwrap(),
            Smb2EchoRequest.serialize().unwrap(),
            Smb2CancelRequest.serialize().unwrap(),
        ] {
            assert_eq!(bytes, vec![4, 0, 0, 0]);
        }
        Smb2LogoffResponse::parse(&[4, 0, 0, 0]).unwrap();
        Smb2EchoResponse::parse(&[4, 0, 0, 0]).unwrap();
    }

    #[test]
    fn test_oplock_break_ack_round_trip() {
        let ack = Smb2OplockBreakAck {
            oplock_level: 0x01,
            file_id: FileId::new(0xAA, 0xBB),
        };
        let bytes = ack.serialize().unwrap();
        assert_eq!(bytes.len(), 24);
        assert_eq!(Smb2OplockBreakAck::parse(&bytes).unwrap(), ack);
    }

    #[test]
    fn test_error_response_round_trip() {
        // An empty error still occupies 9 bytes: the fixed part plus the
        // mandatory pad in place of the data
        let err = Smb2ErrorResponse {
            error_context_count: 0,
            error_data: Vec::new(),
        };
        let bytes = err.serialize().unwrap();
        assert_eq!(bytes.len(), 9);
        assert_eq!(err.size(), 9);
        assert_eq!(Smb2ErrorResponse::parse(&bytes).unwrap(), err);

        let err = Smb2ErrorResponse {
            error_context_count: 1,
            error_data: vec![0x01, 0x02, 0x03, 0x04],
        };
        let bytes = err.serialize().unwrap();
        assert_eq!(bytes.len(), err.size());
        assert_eq!(Smb2ErrorResponse::parse(&bytes).unwrap(), err);
    }

    #[test]
    fn test_error_response_missing_pad_byte() {
        // Fixed part only, pad byte not yet arrived
        let bytes = [9, 0, 0, 0, 0, 0, 0, 0];
        assert!(matches!(
            Smb2ErrorResponse::parse(&bytes),
            Err(Error::TruncatedBuffer { .. })
        ));
    }

    #[test]
    fn test_error_response_byte_count_overrun() {
        let err = Smb2ErrorResponse {
            error_context_count: 0,
            error_data: vec![0xFF],
        };
        let mut bytes = err.serialize().unwrap();
        bytes[4] = 0x20;
        assert!(Smb2ErrorResponse::parse(&bytes).is_err());
    }
}
