//! SMB2 CREATE, CLOSE, FLUSH, READ and WRITE messages

use super::common::{slice_buffer, FileId};
use super::tree::{parse_empty_body, serialize_empty_body};
use crate::codec::{self, Reader, SmbMessage, Writer};
use crate::error::{Error, Result};
use crate::protocol::constants::{
    structure_size, CreateDisposition, CreateOptions, DesiredAccess, FileAttributes, ShareAccess,
    SMB2_HEADER_SIZE,
};
use std::convert::TryFrom;

/// SMB2 CREATE request: open or create a file/directory on a tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2CreateRequest {
    pub requested_oplock_level: u8,
    pub impersonation_level: u32,
    pub desired_access: DesiredAccess,
    pub file_attributes: FileAttributes,
    pub share_access: ShareAccess,
    pub create_disposition: CreateDisposition,
    pub create_options: CreateOptions,
    /// Path relative to the share root, UTF-16 on the wire
    pub file_name: String,
    /// Raw create-context chain, opaque here
    pub create_contexts: Vec<u8>,
}

impl Smb2CreateRequest {
    const FIXED_SIZE: usize = 56;

    pub fn new(file_name: String, desired_access: DesiredAccess) -> Self {
        Self {
            requested_oplock_level: 0,
            impersonation_level: 2, // impersonation
            desired_access,
            file_attributes: FileAttributes::NORMAL,
            share_access: ShareAccess::FILE_SHARE_READ | ShareAccess::FILE_SHARE_WRITE,
            create_disposition: CreateDisposition::Open,
            create_options: CreateOptions::empty(),
            file_name,
            create_contexts: Vec::new(),
        }
    }
}

impl SmbMessage for Smb2CreateRequest {
    fn parse(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let structure_size = r.read_u16()?;
        if structure_size != structure_size::CREATE_REQUEST {
            return Err(Error::IncorrectParamsLength {
                expected: structure_size::CREATE_REQUEST,
                actual: structure_size,
            });
        }

        r.skip(1)?; // security flags, must be 0
        let requested_oplock_level = r.read_u8()?;
        let impersonation_level = r.read_u32()?;
        r.skip(8)?; // SmbCreateFlags
        r.skip(8)?; // reserved
        let desired_access = DesiredAccess::from_bits_truncate(r.read_u32()?);
        let file_attributes = FileAttributes::from_bits_truncate(r.read_u32()?);
        let share_access = ShareAccess::from_bits_truncate(r.read_u32()?);
        let create_disposition = CreateDisposition::try_from(r.read_u32()?)?;
        let create_options = CreateOptions::from_bits_truncate(r.read_u32()?);
        let name_offset = r.read_u16()?;
        let name_length = r.read_u16()?;
        let contexts_offset = r.read_u32()?;
        let contexts_length = r.read_u32()?;

        let name_bytes = slice_buffer(buf, name_offset as usize, name_length as usize)?;
        let file_name = codec::string_from_utf16le(name_bytes)?;
        let create_contexts =
            slice_buffer(buf, contexts_offset as usize, contexts_length as usize)?.to_vec();

        Ok(Self {
            requested_oplock_level,
            impersonation_level,
            desired_access,
            file_attributes,
            share_access,
            create_disposition,
            create_options,
            file_name,
            create_contexts,
        })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let name_bytes = codec::utf16le_bytes(&self.file_name);
        let mut w = Writer::with_capacity(self.size());
        w.put_u16(structure_size::CREATE_REQUEST)?;
        w.put_u8(0)?; // security flags
        w.put_u8(self.requested_oplock_level)?;
        w.put_u32(self.impersonation_level)?;
        w.put_u64(0)?; // SmbCreateFlags
        w.put_u64(0)?; // reserved
        w.put_u32(self.desired_access.bits())?;
        w.put_u32(self.file_attributes.bits())?;
        w.put_u32(self.share_access.bits())?;
        w.put_u32(self.create_disposition as u32)?;
        w.put_u32(self.create_options.bits())?;
        let name_offset = if name_bytes.is_empty() {
            0
        } else {
            (SMB2_HEADER_SIZE + Self::FIXED_SIZE) as u16
        };
        w.put_u16(name_offset)?;
        w.put_u16(name_bytes.len() as u16)?;
        let contexts_offset = if self.create_contexts.is_empty() {
            0
        } else {
            (SMB2_HEADER_SIZE + Self::FIXED_SIZE + name_bytes.len()) as u32
        };
        w.put_u32(contexts_offset)?;
        w.put_u32(self.create_contexts.len() as u32)?;
        w.put_bytes(&name_bytes)?;
        w.put_bytes(&self.create_contexts)?;
        Ok(w.into_vec())
    }

    fn size(&self) -> usize {
        Self::FIXED_SIZE + self.file_name.encode_utf16().count() * 2 + self.create_contexts.len()
    }
}

/// SMB2 CREATE response: the granted handle plus file metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2CreateResponse {
    pub oplock_level: u8,
    pub flags: u8,
    pub create_action: u32,
    pub creation_time: u64,
    pub last_access_time: u64,
    pub last_write_time: u64,
    pub change_time: u64,
    pub allocation_size: u64,
    pub end_of_file: u64,
    pub file_attributes: FileAttributes,
    pub file_id: FileId,
    pub create_contexts: Vec<u8>,
}

impl Smb2CreateResponse {
    const FIXED_SIZE: usize = 88;
}

impl SmbMessage for Smb2CreateResponse {
    fn parse(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let structure_size = r.read_u16()?;
        if structure_size != structure_size::CREATE_RESPONSE {
            return Err(Error::IncorrectParamsLength {
                expected: structure_size::CREATE_RESPONSE,
                actual: structure_size,
            });
        }

        let oplock_level = r.read_u8()?;
        let flags = r.read_u8()?;
        let create_action = r.read_u32()?;
        let creation_time = r.read_u64()?;
        let last_access_time = r.read_u64()?;
        let last_write_time = r.read_u64()?;
        let change_time = r.read_u64()?;
        let allocation_size = r.read_u64()?;
        let end_of_file = r.read_u64()?;
        let file_attributes = FileAttributes::from_bits_truncate(r.read_u32()?);
        r.skip(4)?; // reserved
        let file_id = FileId::read(&mut r)?;
        let contexts_offset = r.read_u32()?;
        let contexts_length = r.read_u32()?;

        let create_contexts =
            slice_buffer(buf, contexts_offset as usize, contexts_length as usize)?.to_vec();

        Ok(Self {
            oplock_level,
            flags,
            create_action,
            creation_time,
            last_access_time,
            last_write_time,
            change_time,
            allocation_size,
            end_of_file,
            file_attributes,
            file_id,
            create_contexts,
        })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut w = Writer::with_capacity(self.size());
        w.put_u16(structure_size::CREATE_RESPONSE)?;
        w.put_u8(self.oplock_level)?;
        w.put_u8(self.flags)?;
        w.put_u32(self.create_action)?;
        w.put_u64(self.creation_time)?;
        w.put_u64(self.last_access_time)?;
        w.put_u64(self.last_write_time)?;
        w.put_u64(self.change_time)?;
        w.put_u64(self.allocation_size)?;
        w.put_u64(self.end_of_file)?;
        w.put_u32(self.file_attributes.bits())?;
        w.put_u32(0)?; // reserved
        self.file_id.write(&mut w)?;
        let contexts_offset = if self.create_contexts.is_empty() {
            0
        } else {
            (SMB2_HEADER_SIZE + Self::FIXED_SIZE) as u32
        };
        w.put_u32(contexts_offset)?;
        w.put_u32(self.create_contexts.len() as u32)?;
        w.put_bytes(&self.create_contexts)?;
        Ok(w.into_vec())
    }

    fn size(&self) -> usize {
        Self::FIXED_SIZE + self.create_contexts.len()
    }
}

/// SMB2 CLOSE request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Smb2CloseRequest {
    pub flags: u16,
    pub file_id: FileId,
}

impl SmbMessage for Smb2CloseRequest {
    fn parse(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let structure_size = r.read_u16()?;
        if structure_size != structure_size::CLOSE_REQUEST {
            return Err(Error::IncorrectParamsLength {
                expected: structure_size::CLOSE_REQUEST,
                actual: structure_size,
            });
        }
        let flags = r.read_u16()?;
        r.skip(4)?; // reserved
        let file_id = FileId::read(&mut r)?;
        Ok(Self { flags, file_id })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut w = Writer::with_capacity(24);
        w.put_u16(structure_size::CLOSE_REQUEST)?;
        w.put_u16(self.flags)?;
        w.put_u32(0)?; // reserved
        self.file_id.write(&mut w)?;
        Ok(w.into_vec())
    }

    fn size(&self) -> usize {
        24
    }
}

/// SMB2 CLOSE response: final attributes when POSTQUERY_ATTRIB was set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Smb2CloseResponse {
    pub flags: u16,
    pub creation_time: u64,
    pub last_access_time: u64,
    pub last_write_time: u64,
    pub change_time: u64,
    pub allocation_size: u64,
    pub end_of_file: u64,
    pub file_attributes: FileAttributes,
}

impl SmbMessage for Smb2CloseResponse {
    fn parse(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let structure_size = r.read_u16()?;
        if structure_size != structure_size::CLOSE_RESPONSE {
            return Err(Error::IncorrectParamsLength {
                expected: structure_size::CLOSE_RESPONSE,
                actual: structure_size,
            });
        }
        let flags = r.read_u16()?;
        r.skip(4)?; // reserved
        Ok(Self {
            flags,
            creation_time: r.read_u64()?,
            last_access_time: r.read_u64()?,
            last_write_time: r.read_u64()?,
            change_time: r.read_u64()?,
            allocation_size: r.read_u64()?,
            end_of_file: r.read_u64()?,
            file_attributes: FileAttributes::from_bits_truncate(r.read_u32()?),
        })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut w = Writer::with_capacity(60);
        w.put_u16(structure_size::CLOSE_RESPONSE)?;
        w.put_u16(self.flags)?;
        w.put_u32(0)?; // reserved
        w.put_u64(self.creation_time)?;
        w.put_u64(self.last_access_time)?;
        w.put_u64(self.last_write_time)?;
        w.put_u64(self.change_time)?;
        w.put_u64(self.allocation_size)?;
        w.put_u64(self.end_of_file)?;
        w.put_u32(self.file_attributes.bits())?;
        Ok(w.into_vec())
    }

    fn size(&self) -> usize {
        60
    }
}

/// SMB2 FLUSH request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Smb2FlushRequest {
    pub file_id: FileId,
}

impl SmbMessage for Smb2FlushRequest {
    fn parse(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let structure_size = r.read_u16()?;
        if structure_size != structure_size::FLUSH_REQUEST {
            return Err(Error::IncorrectParamsLength {
                expected: structure_size::FLUSH_REQUEST,
                actual: structure_size,
            });
        }
        r.skip(2)?; // reserved1
        r.skip(4)?; // reserved2
        Ok(Self {
            file_id: FileId::read(&mut r)?,
        })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut w = Writer::with_capacity(24);
        w.put_u16(structure_size::FLUSH_REQUEST)?;
        w.put_u16(0)?;
        w.put_u32(0)?;
        self.file_id.write(&mut w)?;
        Ok(w.into_vec())
    }

    fn size(&self) -> usize {
        24
    }
}

/// SMB2 FLUSH response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Smb2FlushResponse;

impl SmbMessage for Smb2FlushResponse {
    fn parse(buf: &[u8]) -> Result<Self> {
        parse_empty_body(buf, structure_size::FLUSH_RESPONSE)?;
        Ok(Self)
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        serialize_empty_body(structure_size::FLUSH_RESPONSE)
    }

    fn size(&self) -> usize {
        4
    }
}

/// SMB2 READ request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Smb2ReadRequest {
    pub flags: u8,
    pub length: u32,
    pub offset: u64,
    pub file_id: FileId,
    pub minimum_count: u32,
    pub remaining_bytes: u32,
}

impl SmbMessage for Smb2ReadRequest {
    fn parse(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let structure_size = r.read_u16()?;
        if structure_size != structure_size::READ_REQUEST {
            return Err(Error::IncorrectParamsLength {
                expected: structure_size::READ_REQUEST,
                actual: structure_size,
            });
        }
        r.skip(1)?; // padding hint
        let flags = r.read_u8()?;
        let length = r.read_u32()?;
        let offset = r.read_u64()?;
        let file_id = FileId::read(&mut r)?;
        let minimum_count = r.read_u32()?;
        r.skip(4)?; // channel
        let remaining_bytes = r.read_u32()?;
        r.skip(4)?; // read channel info offset/length
        Ok(Self {
            flags,
            length,
            offset,
            file_id,
            minimum_count,
            remaining_bytes,
        })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut w = Writer::with_capacity(49);
        w.put_u16(structure_size::READ_REQUEST)?;
        w.put_u8(0)?; // padding hint
        w.put_u8(self.flags)?;
        w.put_u32(self.length)?;
        w.put_u64(self.offset)?;
        self.file_id.write(&mut w)?;
        w.put_u32(self.minimum_count)?;
        w.put_u32(0)?; // channel
        w.put_u32(self.remaining_bytes)?;
        w.put_u16(0)?; // read channel info offset
        w.put_u16(0)?; // read channel info length
        w.put_u8(0)?; // mandatory one-byte buffer
        Ok(w.into_vec())
    }

    fn size(&self) -> usize {
        49
    }
}

/// SMB2 READ response: fixed part declares where the payload sits in the
/// trailing bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2ReadResponse {
    pub data_remaining: u32,
    pub data: Vec<u8>,
}

impl Smb2ReadResponse {
    const FIXED_SIZE: usize = 16;
}

impl SmbMessage for Smb2ReadResponse {
    fn parse(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let structure_size = r.read_u16()?;
        if structure_size != structure_size::READ_RESPONSE {
            return Err(Error::IncorrectParamsLength {
                expected: structure_size::READ_RESPONSE,
                actual: structure_size,
            });
        }
        let data_offset = r.read_u8()?;
        r.skip(1)?; // reserved
        let data_length = r.read_u32()?;
        let data_remaining = r.read_u32()?;
        r.skip(4)?; // reserved2

        let data = slice_buffer(buf, data_offset as usize, data_length as usize)?.to_vec();

        Ok(Self {
            data_remaining,
            data,
        })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut w = Writer::with_capacity(self.size());
        w.put_u16(structure_size::READ_RESPONSE)?;
        let data_offset = if self.data.is_empty() {
            0
        } else {
            (SMB2_HEADER_SIZE + Self::FIXED_SIZE) as u8
        };
        w.put_u8(data_offset)?;
        w.put_u8(0)?; // reserved
        w.put_u32(self.data.len() as u32)?;
        w.put_u32(self.data_remaining)?;
        w.put_u32(0)?; // reserved2
        w.put_bytes(&self.data)?;
        Ok(w.into_vec())
    }

    fn size(&self) -> usize {
        Self::FIXED_SIZE + self.data.len()
    }
}

/// SMB2 WRITE request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2WriteRequest {
    pub offset: u64,
    pub file_id: FileId,
    pub remaining_bytes: u32,
    pub flags: u32,
    pub data: Vec<u8>,
}

impl Smb2WriteRequest {
    const FIXED_SIZE: usize = 48;
}

impl SmbMessage for Smb2WriteRequest {
    fn parse(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let structure_size = r.read_u16()?;
        if structure_size != structure_size::WRITE_REQUEST {
            return Err(Error::IncorrectParamsLength {
                expected: structure_size::WRITE_REQUEST,
                actual: structure_size,
            });
        }
        let data_offset = r.read_u16()?;
        let length = r.read_u32()?;
        let offset = r.read_u64()?;
        let file_id = FileId::read(&mut r)?;
        r.skip(4)?; // channel
        let remaining_bytes = r.read_u32()?;
        r.skip(4)?; // write channel info offset/length
        let flags = r.read_u32()?;

        let data = slice_buffer(buf, data_offset as usize, length as usize)?.to_vec();

        Ok(Self {
            offset,
            file_id,
            remaining_bytes,
            flags,
            data,
        })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut w = Writer::with_capacity(self.size());
        w.put_u16(structure_size::WRITE_REQUEST)?;
        w.put_u16((SMB2_HEADER_SIZE + Self::FIXED_SIZE) as u16)?;
        w.put_u32(self.data.len() as u32)?;
        w.put_u64(self.offset)?;
        self.file_id.write(&mut w)?;
        w.put_u32(0)?; // channel
        w.put_u32(self.remaining_bytes)?;
        w.put_u16(0)?; // write channel info offset
        w.put_u16(0)?; // write channel info length
        w.put_u32(self.flags)?;
        w.put_bytes(&self.data)?;
        Ok(w.into_vec())
    }

    fn size(&self) -> usize {
        Self::FIXED_SIZE + self.data.len()
    }
}

/// SMB2 WRITE response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Smb2WriteResponse {
    /// Bytes the server actually wrote
    pub count: u32,
    pub remaining: u32,
}

impl SmbMessage for Smb2WriteResponse {
    fn parse(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let structure_size = r.read_u16()?;
        if structure_size != structure_size::WRITE_RESPONSE {
            return Err(Error::IncorrectParamsLength {
                expected: structure_size::WRITE_RESPONSE,
                actual: structure_size,
            });
        }
        r.skip(2)?; // reserved
        let count = r.read_u32()?;
        let remaining = r.read_u32()?;
        r.skip(4)?; // write channel info offset/length
        Ok(Self { count, remaining })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut w = Writer::with_capacity(16);
        w.put_u16(structure_size::WRITE_RESPONSE)?;
        w.put_u16(0)?; // reserved
        w.put_u32(self.count)?;
        w.put_u32(self.remaining)?;
        w.put_u16(0)?;
        w.put_u16(0)?;
        Ok(w.into_vec())
    }

    fn size(&self) -> usize {
        16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_id() -> FileId {
        FileId::new(0x1111_2222_3333_4444, 0x5555_6666_7777_8888)
    }

    #[test]
    fn test_create_request_round_trip() {
        let mut req = Smb2CreateRequest::new(
            "docs\\report.txt".to_string(),
            DesiredAccess::FILE_READ_DATA | DesiredAccess::FILE_READ_ATTRIBUTES,
        );
        req.create_disposition = CreateDisposition::OpenIf;
        let bytes = req.serialize().unwrap();
        assert_eq!(bytes.len(), req.size());
        assert_eq!(Smb2CreateRequest::parse(&bytes).unwrap(), req);
    }

    #[test]
    fn test_create_response_round_trip() {
        let resp = Smb2CreateResponse {
            oplock_level: 0,
            flags: 0,
            create_action: 1,
            creation_time: 1,
            last_access_time: 2,
            last_write_time: 3,
            change_time: 4,
            allocation_size: 4096,
            end_of_file: 1234,
            file_attributes: FileAttributes::ARCHIVE,
            file_id: file_id(),
            create_contexts: Vec::new(),
        };
        let bytes = resp.serialize().unwrap();
        assert_eq!(bytes.len(), 88);
        assert_eq!(Smb2CreateResponse::parse(&bytes).unwrap(), resp);
    }

    #[test]
    fn test_close_round_trip() {
        let req = Smb2CloseRequest {
            flags: 0x0001,
            file_id: file_id(),
        };
        let bytes = req.serialize().unwrap();
        assert_eq!(bytes.len(), 24);
        assert_eq!(Smb2CloseRequest::parse(&bytes).unwrap(), req);

        let resp = Smb2CloseResponse {
            flags: 0x0001,
            creation_time: 10,
            last_access_time: 11,
            last_write_time: 12,
            change_time: 13,
            allocation_size: 8192,
            end_of_file: 5000,
            file_attributes: FileAttributes::NORMAL,
        };
        let bytes = resp.serialize().unwrap();
        assert_eq!(bytes.len(), 60);
        assert_eq!(Smb2CloseResponse::parse(&bytes).unwrap(), resp);
    }

    #[test]
    fn test_flush_round_trip() {
        let req = Smb2FlushRequest { file_id: file_id() };
        let bytes = req.serialize().unwrap();
        assert_eq!(bytes.len(), 24);
        assert_eq!(Smb2FlushRequest::parse(&bytes).unwrap(), req);
    }

    #[test]
    fn test_read_round_trip() {
        let req = Smb2ReadRequest {
            flags: 0,
            length: 65536,
            offset: 1 << 20,
            file_id: file_id(),
            minimum_count: 1,
            remaining_bytes: 0,
        };
        let bytes = req.serialize().unwrap();
        assert_eq!(bytes.len(), 49);
        assert_eq!(Smb2ReadRequest::parse(&bytes).unwrap(), req);

        let resp = Smb2ReadResponse {
            data_remaining: 0,
            data: b"hello, smb".to_vec(),
        };
        let bytes = resp.serialize().unwrap();
        // Data offset field points at header size + fixed part
        assert_eq!(bytes[2], 80);
        assert_eq!(Smb2ReadResponse::parse(&bytes).unwrap(), resp);
    }

    #[test]
    fn test_read_response_data_out_of_bounds() {
        let resp = Smb2ReadResponse {
            data_remaining: 0,
            data: vec![1, 2, 3],
        };
        let mut bytes = resp.serialize().unwrap();
        bytes[4] = 0xFF; // declared data length > available
        assert!(matches!(
            Smb2ReadResponse::parse(&bytes),
            Err(Error::IncorrectMessageLength { .. })
        ));
    }

    #[test]
    fn test_write_round_trip() {
        let req = Smb2WriteRequest {
            offset: 0,
            file_id: file_id(),
            remaining_bytes: 0,
            flags: 0,
            data: vec![0xAB; 32],
        };
        let bytes = req.serialize().unwrap();
        assert_eq!(bytes.len(), req.size());
        assert_eq!(Smb2WriteRequest::parse(&bytes).unwrap(), req);

        let resp = Smb2WriteResponse {
            count: 32,
            remaining: 0,
        };
        let bytes = resp.serialize().unwrap();
        assert_eq!(Smb2WriteResponse::parse(&bytes).unwrap(), resp);
    }
}
