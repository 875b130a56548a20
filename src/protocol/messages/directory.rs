//! SMB2 QUERY_DIRECTORY and CHANGE_NOTIFY messages
//!
//! Both return an opaque information buffer; interpreting the packed
//! FILE_*_INFORMATION entries is the caller's concern.

use super::common::{slice_buffer, FileId};
use crate::codec::{self, Reader, SmbMessage, Writer};
use crate::error::{Error, Result};
use crate::protocol::constants::{structure_size, SMB2_HEADER_SIZE};
use bitflags::bitflags;

bitflags! {
    /// QUERY_DIRECTORY scan control flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct QueryDirectoryFlags: u8 {
        const RESTART_SCANS       = 0x01;
        const RETURN_SINGLE_ENTRY = 0x02;
        const INDEX_SPECIFIED     = 0x04;
        const REOPEN              = 0x10;
    }
}

bitflags! {
    /// CHANGE_NOTIFY completion filter
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CompletionFilter: u32 {
        const FILE_NAME    = 0x0000_0001;
        const DIR_NAME     = 0x0000_0002;
        const ATTRIBUTES   = 0x0000_0004;
        const SIZE         = 0x0000_0008;
        const LAST_WRITE   = 0x0000_0010;
        const LAST_ACCESS  = 0x0000_0020;
        const CREATION     = 0x0000_0040;
        const EA           = 0x0000_0080;
        const SECURITY     = 0x0000_0100;
        const STREAM_NAME  = 0x0000_0200;
        const STREAM_SIZE  = 0x0000_0400;
        const STREAM_WRITE = 0x0000_0800;
    }
}

/// SMB2 QUERY_DIRECTORY request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2QueryDirectoryRequest {
    pub info_class: u8,
    pub flags: QueryDirectoryFlags,
    pub file_index: u32,
    pub file_id: FileId,
    /// Search pattern, e.g. `*`
    pub file_name: String,
    pub output_buffer_length: u32,
}

impl Smb2QueryDirectoryRequest {
    const FIXED_SIZE: usize = 32;
}

impl SmbMessage for Smb2QueryDirectoryRequest {
    fn parse(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let structure_size = r.read_u16()?;
        if structure_size != structure_size::QUERY_DIRECTORY_REQUEST {
            return Err(Error::IncorrectParamsLength {
                expected: structure_size::QUERY_DIRECTORY_REQUEST,
                actual: structure_size,
            });
        }
        let info_class = r.read_u8()?;
        let flags = QueryDirectoryFlags::from_bits_truncate(r.read_u8()?);
        let file_index = r.read_u32()?;
        let file_id = FileId::read(&mut r)?;
        let name_offset = r.read_u16()?;
        let name_length = r.read_u16()?;
        let output_buffer_length = r.read_u32()?;

        let name_bytes = slice_buffer(buf, name_offset as usize, name_length as usize)?;
        let file_name = codec::string_from_utf16le(name_bytes)?;

        Ok(Self {
            info_class,
            flags,
            file_index,
            file_id,
            file_name,
            output_buffer_length,
        })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let name_bytes = codec::utf16le_bytes(&self.file_name);
        let mut w = Writer::with_capacity(Self::FIXED_SIZE + name_bytes.len());
        w.put_u16(structure_size::QUERY_DIRECTORY_REQUEST)?;
        w.put_u8(self.info_class)?;
        w.put_u8(self.flags.bits())?;
        w.put_u32(self.file_index)?;
        self.file_id.write(&mut w)?;
        let name_offset = if name_bytes.is_empty() {
            0
        } else {
            (SMB2_HEADER_SIZE + Self::FIXED_SIZE) as u16
        };
        w.put_u16(name_offset)?;
        w.put_u16(name_bytes.len() as u16)?;
        w.put_u32(self.output_buffer_length)?;
        w.put_bytes(&name_bytes)?;
        Ok(w.into_vec())
    }

    fn size(&self) -> usize {
        Self::FIXED_SIZE + self.file_name.encode_utf16().count() * 2
    }
}

/// SMB2 QUERY_DIRECTORY response: packed directory entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2QueryDirectoryResponse {
    pub buffer: Vec<u8>,
}

impl SmbMessage for Smb2QueryDirectoryResponse {
    fn parse(buf: &[u8]) -> Result<Self> {
        let buffer = parse_info_buffer(buf, structure_size::QUERY_DIRECTORY_RESPONSE)?;
        Ok(Self { buffer })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        serialize_info_buffer(structure_size::QUERY_DIRECTORY_RESPONSE, &self.buffer)
    }

    fn size(&self) -> usize {
        8 + self.buffer.len()
    }
}

/// SMB2 CHANGE_NOTIFY request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Smb2ChangeNotifyRequest {
    /// 0x0001 watches the whole subtree
    pub flags: u16,
    pub output_buffer_length: u32,
    pub file_id: FileId,
    pub completion_filter: CompletionFilter,
}

impl SmbMessage for Smb2ChangeNotifyRequest {
    fn parse(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let structure_size = r.read_u16()?;
        if structure_size != structure_size::CHANGE_NOTIFY_REQUEST {
            return Err(Error::IncorrectParamsLength {
                expected: structure_size::CHANGE_NOTIFY_REQUEST,
                actual: structure_size,
            });
        }
        let flags = r.read_u16()?;
        let output_buffer_length = r.read_u32()?;
        let file_id = FileId::read(&mut r)?;
        let completion_filter = CompletionFilter::from_bits_truncate(r.read_u32()?);
        r.skip(4)?; // reserved
        Ok(Self {
            flags,
            output_buffer_length,
            file_id,
            completion_filter,
        })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut w = Writer::with_capacity(32);
        w.put_u16(structure_size::CHANGE_NOTIFY_REQUEST)?;
        w.put_u16(self.flags)?;
        w.put_u32(self.output_buffer_length)?;
        self.file_id.write(&mut w)?;
        w.put_u32(self.completion_filter.bits())?;
        w.put_u32(0)?; // reserved
        Ok(w.into_vec())
    }

    fn size(&self) -> usize {
        32
    }
}

/// SMB2 CHANGE_NOTIFY response: packed FILE_NOTIFY_INFORMATION entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2ChangeNotifyResponse {
    pub buffer: Vec<u8>,
}

impl SmbMessage for Smb2ChangeNotifyResponse {
    fn parse(buf: &[u8]) -> Result<Self> {
        let buffer = parse_info_buffer(buf, structure_size::CHANGE_NOTIFY_RESPONSE)?;
        Ok(Self { buffer })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        serialize_info_buffer(structure_size::CHANGE_NOTIFY_RESPONSE, &self.buffer)
    }

    fn size(&self) -> usize {
        8 + self.buffer.len()
    }
}

/// QUERY_DIRECTORY, CHANGE_NOTIFY and QUERY_INFO responses share the
/// 8-byte "structure size + buffer offset + buffer length" shape
pub(crate) fn parse_info_buffer(buf: &[u8], expected: u16) -> Result<Vec<u8>> {
    let mut r = Reader::new(buf);
    let structure_size = r.read_u16()?;
    if structure_size != expected {
        return Err(Error::IncorrectParamsLength {
            expected,
            actual: structure_size,
        });
    }
    let offset = r.read_u16()?;
    let length = r.read_u32()?;
    Ok(slice_buffer(buf, offset as usize, length as usize)?.to_vec())
}

pub(crate) fn serialize_info_buffer(structure_size: u16, buffer: &[u8]) -> Result<Vec<u8>> {
    let mut w = Writer::with_capacity(8 + buffer.len());
    w.put_u16(structure_size)?;
    let offset = if buffer.is_empty() {
        0
    } else {
        (SMB2_HEADER_SIZE + 8) as u16
    };
    w.put_u16(offset)?;
    w.put_u32(buffer.len() as u32)?;
    w.put_bytes(buffer)?;
    Ok(w.into_vec())
}
