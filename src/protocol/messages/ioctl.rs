//! SMB2 IOCTL messages

use super::common::{slice_buffer, FileId};
use crate::codec::{Reader, SmbMessage, Writer};
use crate::error::{Error, Result};
use crate::protocol::constants::{structure_size, SMB2_HEADER_SIZE};

/// FSCTL passthrough flag; without it the code is a device IOCTL
pub const IOCTL_IS_FSCTL: u32 = 0x0000_0001;

/// SMB2 IOCTL request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2IoctlRequest {
    pub ctl_code: u32,
    pub file_id: FileId,
    pub max_input_response: u32,
    pub max_output_response: u32,
    pub flags: u32,
    pub input: Vec<u8>,
}

impl Smb2IoctlRequest {
    const FIXED_SIZE: usize = 56;
}

impl SmbMessage for Smb2IoctlRequest {
    fn parse(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let structure_size = r.read_u16()?;
        if structure_size != structure_size::IOCTL_REQUEST {
            return Err(Error::IncorrectParamsLength {
                expected: structure_size::IOCTL_REQUEST,
                actual: structure_size,
            });
        }
        r.skip(2)?; // reserved
        let ctl_code = r.read_u32()?;
        let file_id = FileId::read(&mut r)?;
        let input_offset = r.read_u32()?;
        let input_count = r.read_u32()?;
        let max_input_response = r.read_u32()?;
        let output_offset = r.read_u32()?;
        let output_count = r.read_u32()?;
        let max_output_response = r.read_u32()?;
        let flags = r.read_u32()?;
        r.skip(4)?; // reserved2

        // Requests carry payload only in the input buffer
        let _ = slice_buffer(buf, output_offset as usize, output_count as usize)?;
        let input = slice_buffer(buf, input_offset as usize, input_count as usize)?.to_vec();

        Ok(Self {
            ctl_code,
            file_id,
            max_input_response,
            max_output_response,
            flags,
            input,
        })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut w = Writer::with_capacity(self.size());
        w.put_u16(structure_size::IOCTL_REQUEST)?;
        w.put_u16(0)?; // reserved
        w.put_u32(self.ctl_code)?;
        self.file_id.write(&mut w)?;
        let input_offset = if self.input.is_empty() {
            0
        } else {
            (SMB2_HEADER_SIZE + Self::FIXED_SIZE) as u32
        };
        w.put_u32(input_offset)?;
        w.put_u32(self.input.len() as u32)?;
        w.put_u32(self.max_input_response)?;
        w.put_u32(0)?; // output offset
        w.put_u32(0)?; // output count
        w.put_u32(self.max_output_response)?;
        w.put_u32(self.flags)?;
        w.put_u32(0)?; // reserved2
        w.put_bytes(&self.input)?;
        Ok(w.into_vec())
    }

    fn size(&self) -> usize {
        Self::FIXED_SIZE + self.input.len()
    }
}

/// SMB2 IOCTL response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smb2IoctlResponse {
    pub ctl_code: u32,
    pub file_id: FileId,
    pub flags: u32,
    pub input: Vec<u8>,
    pub output: Vec<u8>,
}

impl Smb2IoctlResponse {
    const FIXED_SIZE: usize = 48;
}

impl SmbMessage for Smb2IoctlResponse {
    fn parse(buf: &[u8]) -> Result<Self> {
        let mut r = Reader::new(buf);
        let structure_size = r.read_u16()?;
        if structure_size != structure_size::IOCTL_RESPONSE {
            return Err(Error::IncorrectParamsLength {
                expected: structure_size::IOCTL_RESPONSE,
                actual: structure_size,
            });
        }
        r.skip(2)?; // reserved
        let ctl_code = r.read_u32()?;
        let file_id = FileId::read(&mut r)?;
        let input_offset = r.read_u32()?;
        let input_count = r.read_u32()?;
        let output_offset = r.read_u32()?;
        let output_count = r.read_u32()?;
        let flags = r.read_u32()?;
        r.skip(4)?; // reserved2

        let input = slice_buffer(buf, input_offset as usize, input_count as usize)?.to_vec();
        let output = slice_buffer(buf, output_offset as usize, output_count as usize)?.to_vec();

        Ok(Self {
            ctl_code,
            file_id,
            flags,
            input,
            output,
        })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut w = Writer::with_capacity(self.size());
        w.put_u16(structure_size::IOCTL_RESPONSE)?;
        w.put_u16(0)?; // reserved
        w.put_u32(self.ctl_code)?;
        self.file_id.write(&mut w)?;
        let input_offset = if self.input.is_empty() {
            0
        } else {
            (SMB2_HEADER_SIZE + Self::FIXED_SIZE) as u32
        };
        w.put_u32(input_offset)?;
        w.put_u32(self.input.len() as u32)?;
        let output_offset = if self.output.is_empty() {
            0
        } else {
            (SMB2_HEADER_SIZE + Self::FIXED_SIZE + self.input.len()) as u32
        };
        w.put_u32(output_offset)?;
        w.put_u32(self.output.len() as u32)?;
        w.put_u32(self.flags)?;
        w.put_u32(0)?; // reserved2
        w.put_bytes(&self.input)?;
        w.put_bytes(&self.output)?;
        Ok(w.into_vec())
    }

    fn size(&self) -> usize {
        Self::FIXED_SIZE + self.input.len() + self.output.len()
    }
}
