//! SMB2 QUERY_INFO and SET_INFO messages

use super::common::{slice_buffer, FileId};
use super::directory::{parse_info_buffer, serialize_info_buffer};
use crate::codec::{Reader, SmbMessage, Writer};
use crate::error::{Error, Result};
use crate::protocol::constants::{structure_size, SMB2_HEADER_SIZE};

/// Info type selector shared by QUERY_INFO and SET_INFO
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InfoType {
    File = 0x01,
    Filesystem = 0x02,
    Security = 0x03,
    Quota = 0x04,
}

impl TryFrom<u8> for InfoType {
    type Error = Error;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::File),
            0x02 => Ok(Self::Filesystem),
            0x03 => Ok(Self::Security),
            0x04 => Ok(Self::Quota),
            _ => Err(Error::ParseError(format!("Invalid info type: {}", value))),
        }
    }
}

/// SMB2 QUERY_INFO request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2QueryInfoRequest {
    pub info_type: InfoType,
    pub info_class: u8,
    pub output_buffer_length: u32,
    pub additional_information: u32,
    pub flags: u32,
    pub file_id: FileId,
    /// Extra query input (e.g. a FILE_GET_EA_INFORMATION list)
    pub input: Vec<u8>,
}

impl Smb2QueryInfoRequest {
    const FIXED_SIZE: usize = 40;
}

impl SmbMessage for Smb2QueryInfoRequest {
    fn parse(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let structure_size = r.read_u16()?;
        if structure_size != structure_size::QUERY_INFO_REQUEST {
            return Err(Error::IncorrectParamsLength {
                expected: structure_size::QUERY_INFO_REQUEST,
                actual: structure_size,
            });
        }
        let info_type = InfoType::try_from(r.read_u8()?)?;
        let info_class = r.read_u8()?;
        let output_buffer_length = r.read_u32()?;
        let input_offset = r.read_u16()?;
        r.skip(2)?; // reserved
        let input_length = r.read_u32()?;
        let additional_information = r.read_u32()?;
        let flags = r.read_u32()?;
        let file_id = FileId::read(&mut r)?;

        let input = slice_buffer(buf, input_offset as usize, input_length as usize)?.to_vec();

        Ok(Self {
            info_type,
            info_class,
            output_buffer_length,
            additional_information,
            flags,
            file_id,
            input,
        })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut w = Writer::with_capacity(self.size());
        w.put_u16(structure_size::QUERY_INFO_REQUEST)?;
        w.put_u8(self.info_type as u8)?;
        w.put_u8(self.info_class)?;
        w.put_u32(self.output_buffer_length)?;
        let input_offset = if self.input.is_empty() {
            0
        } else {
            (SMB2_HEADER_SIZE + Self::FIXED_SIZE) as u16
        };
        w.put_u16(input_offset)?;
        w.put_u16(0)?; // reserved
        w.put_u32(self.input.len() as u32)?;
        w.put_u32(self.additional_information)?;
        w.put_u32(self.flags)?;
        self.file_id.write(&mut w)?;
        w.put_bytes(&self.input)?;
        Ok(w.into_vec())
    }

    fn size(&self) -> usize {
        Self::FIXED_SIZE + self.input.len()
    }
}

/// SMB2 QUERY_INFO response: the requested information block, opaque here
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2QueryInfoResponse {
    pub buffer: Vec<u8>,
}

impl SmbMessage for Smb2QueryInfoResponse {
    fn parse(buf: &[u8]) -> Result<Self> {
        let buffer = parse_info_buffer(buf, structure_size::QUERY_INFO_RESPONSE)?;
        Ok(Self { buffer })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        serialize_info_buffer(structure_size::QUERY_INFO_RESPONSE, &self.buffer)
    }

    fn size(&self) -> usize {
        8 + self.buffer.len()
    }
}

/// SMB2 SET_INFO request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2SetInfoRequest {
    pub info_type: InfoType,
    pub info_class: u8,
    pub additional_information: u32,
    pub file_id: FileId,
    pub buffer: Vec<u8>,
}

impl Smb2SetInfoRequest {
    const FIXED_SIZE: usize = 32;
}

impl SmbMessage for Smb2SetInfoRequest {
    fn parse(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let structure_size = r.read_u16()?;
        if structure_size != structure_size::SET_INFO_REQUEST {
            return Err(Error::IncorrectParamsLength {
                expected: structure_size::SET_INFO_REQUEST,
                actual: structure_size,
            });
        }
        let info_type = InfoType::try_from(r.read_u8()?)?;
        let info_class = r.read_u8()?;
        let buffer_length = r.read_u32()?;
        let buffer_offset = r.read_u16()?;
        r.skip(2)?; // reserved
        let additional_information = r.read_u32()?;
        let file_id = FileId::read(&mut r)?;

        let buffer = slice_buffer(buf, buffer_offset as usize, buffer_length as usize)?.to_vec();

        Ok(Self {
            info_type,
            info_class,
            additional_information,
            file_id,
            buffer,
        })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut w = Writer::with_capacity(self.size());
        w.put_u16(structure_size::SET_INFO_REQUEST)?;
        w.put_u8(self.info_type as u8)?;
        w.put_u8(self.info_class)?;
        w.put_u32(self.buffer.len() as u32)?;
        let buffer_offset = if self.buffer.is_empty() {
            0
        } else {
            (SMB2_HEADER_SIZE + Self::FIXED_SIZE) as u16
        };
        w.put_u16(buffer_offset)?;
        w.put_u16(0)?; // reserved
        w.put_u32(self.additional_information)?;
        self.file_id.write(&mut w)?;
        w.put_bytes(&self.buffer)?;
        Ok(w.into_vec())
    }

    fn size(&self) -> usize {
        Self::FIXED_SIZE + self.buffer.len()
    }
}

/// SMB2 SET_INFO response: just the structure size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Smb2SetInfoResponse;

impl SmbMessage for Smb2SetInfoResponse {
    fn parse(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let structure_size = r.read_u16()?;
        if structure_size != structure_size::SET_INFO_RESPONSE {
            return Err(Error::IncorrectParamsLength {
                expected: structure_size::SET_INFO_RESPONSE,
                actual: structure_size,
            });
        }
        Ok(Self)
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut w = Writer::with_capacity(2);
        w.put_u16(structure_size::SET_INFO_RESPONSE)?;
        Ok(w.into_vec())
    }

    fn size(&self) -> usize {
        2
    }
}
