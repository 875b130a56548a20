//! SMB2 protocol constants

use bitflags::bitflags;
use std::convert::TryFrom;

/// SMB2 protocol signature (0xFE 'S' 'M' 'B')
pub const SMB2_MAGIC: [u8; 4] = [0xFE, b'S', b'M', b'B'];

/// SMB2 header size in bytes
pub const SMB2_HEADER_SIZE: usize = 64;

/// Smallest well-formed SMB2 message: 64-byte header plus a minimal body.
/// Anything at or below this is rejected before header parsing.
pub const SMB2_MIN_MESSAGE_SIZE: usize = 65;

/// Declared structure sizes for SMB2 message bodies. Per MS-SMB2
/// convention, bodies with a variable trailing buffer declare an odd size
/// (fixed part + 1).
pub mod structure_size {
    pub const NEGOTIATE_REQUEST: u16 = 36;
    pub const NEGOTIATE_RESPONSE: u16 = 65;
    pub const SESSION_SETUP_REQUEST: u16 = 25;
    pub const SESSION_SETUP_RESPONSE: u16 = 9;
    pub const LOGOFF_REQUEST: u16 = 4;
    pub const LOGOFF_RESPONSE: u16 = 4;
    pub const TREE_CONNECT_REQUEST: u16 = 9;
    pub const TREE_CONNECT_RESPONSE: u16 = 16;
    pub const TREE_DISCONNECT_REQUEST: u16 = 4;
    pub const TREE_DISCONNECT_RESPONSE: u16 = 4;
    pub const CREATE_REQUEST: u16 = 57;
    pub const CREATE_RESPONSE: u16 = 89;
    pub const CLOSE_REQUEST: u16 = 24;
    pub const CLOSE_RESPONSE: u16 = 60;
    pub const FLUSH_REQUEST: u16 = 24;
    pub const FLUSH_RESPONSE: u16 = 4;
    pub const READ_REQUEST: u16 = 49;
    pub const READ_RESPONSE: u16 = 17;
    pub const WRITE_REQUEST: u16 = 49;
    pub const WRITE_RESPONSE: u16 = 17;
    pub const LOCK_REQUEST: u16 = 48;
    pub const LOCK_RESPONSE: u16 = 4;
    pub const IOCTL_REQUEST: u16 = 57;
    pub const IOCTL_RESPONSE: u16 = 49;
    pub const CANCEL_REQUEST: u16 = 4;
    pub const ECHO_REQUEST: u16 = 4;
    pub const ECHO_RESPONSE: u16 = 4;
    pub const QUERY_DIRECTORY_REQUEST: u16 = 33;
    pub const QUERY_DIRECTORY_RESPONSE: u16 = 9;
    pub const CHANGE_NOTIFY_REQUEST: u16 = 32;
    pub const CHANGE_NOTIFY_RESPONSE: u16 = 9;
    pub const QUERY_INFO_REQUEST: u16 = 41;
    pub const QUERY_INFO_RESPONSE: u16 = 9;
    pub const SET_INFO_REQUEST: u16 = 33;
    pub const SET_INFO_RESPONSE: u16 = 2;
    pub const OPLOCK_BREAK_ACK: u16 = 24;
    pub const ERROR_RESPONSE: u16 = 9;
}

/// SMB2 commands (opcodes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Smb2Command {
    Negotiate = 0x00,
    SessionSetup = 0x01,
    Logoff = 0x02,
    TreeConnect = 0x03,
    TreeDisconnect = 0x04,
    Create = 0x05,
    Close = 0x06,
    Flush = 0x07,
    Read = 0x08,
    Write = 0x09,
    Lock = 0x0A,
    Ioctl = 0x0B,
    Cancel = 0x0C,
    Echo = 0x0D,
    QueryDirectory = 0x0E,
    ChangeNotify = 0x0F,
    QueryInfo = 0x10,
    SetInfo = 0x11,
    OplockBreak = 0x12,
}

impl TryFrom<u16> for Smb2Command {
    type Error = crate::Error;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Self::Negotiate),
            0x01 => Ok(Self::SessionSetup),
            0x02 => Ok(Self::Logoff),
            0x03 => Ok(Self::TreeConnect),
            0x04 => Ok(Self::TreeDisconnect),
            0x05 => Ok(Self::Create),
            0x06 => Ok(Self::Close),
            0x07 => Ok(Self::Flush),
            0x08 => Ok(Self::Read),
            0x09 => Ok(Self::Write),
            0x0A => Ok(Self::Lock),
            0x0B => Ok(Self::Ioctl),
            0x0C => Ok(Self::Cancel),
            0x0D => Ok(Self::Echo),
            0x0E => Ok(Self::QueryDirectory),
            0x0F => Ok(Self::ChangeNotify),
            0x10 => Ok(Self::QueryInfo),
            0x11 => Ok(Self::SetInfo),
            0x12 => Ok(Self::OplockBreak),
            _ => Err(crate::Error::InvalidCommand(value)),
        }
    }
}

impl Smb2Command {
    pub fn to_u16(self) -> u16 {
        self as u16
    }
}

/// SMB2 dialect versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u16)]
pub enum Smb2Dialect {
    Smb202 = 0x0202,
    Smb210 = 0x0210,
    Smb300 = 0x0300,
    Smb302 = 0x0302,
    Smb311 = 0x0311,
}

impl TryFrom<u16> for Smb2Dialect {
    type Error = crate::Error;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0x0202 => Ok(Self::Smb202),
            0x0210 => Ok(Self::Smb210),
            0x0300 => Ok(Self::Smb300),
            0x0302 => Ok(Self::Smb302),
            0x0311 => Ok(Self::Smb311),
            _ => Err(crate::Error::ParseError(format!(
                "Unknown SMB2 dialect: 0x{:04x}",
                value
            ))),
        }
    }
}

impl Smb2Dialect {
    pub fn to_u16(self) -> u16 {
        self as u16
    }
}

bitflags! {
    /// SMB2 header flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Smb2HeaderFlags: u32 {
        const SERVER_TO_REDIR    = 0x0000_0001;
        const ASYNC_COMMAND      = 0x0000_0002;
        const RELATED_OPERATIONS = 0x0000_0004;
        const SIGNED             = 0x0000_0008;
        const DFS_OPERATIONS     = 0x1000_0000;
        const REPLAY_OPERATION   = 0x2000_0000;
    }
}

bitflags! {
    /// SMB2 negotiate security mode
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SecurityMode: u16 {
        const SIGNING_ENABLED  = 0x0001;
        const SIGNING_REQUIRED = 0x0002;
    }
}

bitflags! {
    /// SMB2 global capabilities
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Smb2Capabilities: u32 {
        const DFS                = 0x0000_0001;
        const LEASING            = 0x0000_0002;
        const LARGE_MTU          = 0x0000_0004;
        const MULTI_CHANNEL      = 0x0000_0008;
        const PERSISTENT_HANDLES = 0x0000_0010;
        const DIRECTORY_LEASING  = 0x0000_0020;
        const ENCRYPTION         = 0x0000_0040;
    }
}

bitflags! {
    /// Share flags returned by TreeConnect
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ShareFlags: u32 {
        const DFS                         = 0x0000_0001;
        const DFS_ROOT                    = 0x0000_0002;
        const AUTO_CACHING                = 0x0000_0010;
        const VDO_CACHING                 = 0x0000_0020;
        const NO_CACHING                  = 0x0000_0030;
        const RESTRICT_EXCLUSIVE_OPENS    = 0x0000_0100;
        const FORCE_SHARED_DELETE         = 0x0000_0200;
        const ALLOW_NAMESPACE_CACHING     = 0x0000_0400;
        const ACCESS_BASED_DIRECTORY_ENUM = 0x0000_0800;
        const FORCE_LEVELII_OPLOCK        = 0x0000_1000;
        const ENABLE_HASH_V1              = 0x0000_2000;
        const ENABLE_HASH_V2              = 0x0000_4000;
        const ENCRYPT_DATA                = 0x0000_8000;
    }
}

bitflags! {
    /// Share capabilities returned by TreeConnect
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ShareCapabilities: u32 {
        const DFS                     = 0x0000_0008;
        const CONTINUOUS_AVAILABILITY = 0x0000_0010;
        const SCALEOUT                = 0x0000_0020;
        const CLUSTER                 = 0x0000_0040;
        const ASYMMETRIC              = 0x0000_0080;
    }
}

bitflags! {
    /// File access rights
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DesiredAccess: u32 {
        const FILE_READ_DATA        = 0x0000_0001;
        const FILE_WRITE_DATA       = 0x0000_0002;
        const FILE_APPEND_DATA      = 0x0000_0004;
        const FILE_READ_EA          = 0x0000_0008;
        const FILE_WRITE_EA         = 0x0000_0010;
        const FILE_EXECUTE          = 0x0000_0020;
        const FILE_READ_ATTRIBUTES  = 0x0000_0080;
        const FILE_WRITE_ATTRIBUTES = 0x0000_0100;
        const DELETE                = 0x0001_0000;
        const READ_CONTROL          = 0x0002_0000;
        const WRITE_DAC             = 0x0004_0000;
        const WRITE_OWNER           = 0x0008_0000;
        const SYNCHRONIZE           = 0x0010_0000;
        const GENERIC_ALL           = 0x1000_0000;
        const GENERIC_EXECUTE       = 0x2000_0000;
        const GENERIC_WRITE         = 0x4000_0000;
        const GENERIC_READ          = 0x8000_0000;
        const FILE_ALL_ACCESS       = 0x001F_01FF;
    }
}

bitflags! {
    /// File attributes as defined in MS-FSCC
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FileAttributes: u32 {
        const READONLY      = 0x0000_0001;
        const HIDDEN        = 0x0000_0002;
        const SYSTEM        = 0x0000_0004;
        const DIRECTORY     = 0x0000_0010;
        const ARCHIVE       = 0x0000_0020;
        const NORMAL        = 0x0000_0080;
        const TEMPORARY     = 0x0000_0100;
        const SPARSE_FILE   = 0x0000_0200;
        const REPARSE_POINT = 0x0000_0400;
        const COMPRESSED    = 0x0000_0800;
        const OFFLINE       = 0x0000_1000;
        const ENCRYPTED     = 0x0000_4000;
    }
}

bitflags! {
    /// File share access rights
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ShareAccess: u32 {
        const FILE_SHARE_READ   = 0x0000_0001;
        const FILE_SHARE_WRITE  = 0x0000_0002;
        const FILE_SHARE_DELETE = 0x0000_0004;
    }
}

bitflags! {
    /// File create options
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CreateOptions: u32 {
        const FILE_DIRECTORY_FILE     = 0x0000_0001;
        const FILE_WRITE_THROUGH      = 0x0000_0002;
        const FILE_SEQUENTIAL_ONLY    = 0x0000_0004;
        const FILE_NON_DIRECTORY_FILE = 0x0000_0040;
        const FILE_RANDOM_ACCESS      = 0x0000_0800;
        const FILE_DELETE_ON_CLOSE    = 0x0000_1000;
        const FILE_OPEN_REPARSE_POINT = 0x0020_0000;
    }
}

bitflags! {
    /// SMB2 lock element flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LockFlags: u32 {
        const SHARED_LOCK      = 0x0000_0001;
        const EXCLUSIVE_LOCK   = 0x0000_0002;
        const UNLOCK           = 0x0000_0004;
        const FAIL_IMMEDIATELY = 0x0000_0010;
    }
}

/// Create disposition values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CreateDisposition {
    Supersede = 0x0000_0000,
    Open = 0x0000_0001,
    Create = 0x0000_0002,
    OpenIf = 0x0000_0003,
    Overwrite = 0x0000_0004,
    OverwriteIf = 0x0000_0005,
}

impl TryFrom<u32> for CreateDisposition {
    type Error = crate::Error;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Self::Supersede),
            0x01 => Ok(Self::Open),
            0x02 => Ok(Self::Create),
            0x03 => Ok(Self::OpenIf),
            0x04 => Ok(Self::Overwrite),
            0x05 => Ok(Self::OverwriteIf),
            _ => Err(crate::Error::ParseError(format!(
                "Invalid create disposition: {}",
                value
            ))),
        }
    }
}
