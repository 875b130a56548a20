//! Error types for the SMB2 wire client

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for SMB2 operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for SMB2 wire operations
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Operation attempted before the transport was opened, or after close
    #[error("Stream not opened")]
    StreamNotOpened,

    /// A write or a response wait exceeded its deadline
    #[error("Operation timed out")]
    TimedOut,

    /// A field codec ran past the end of the buffer
    #[error("Truncated buffer: need {need} bytes, have {have}")]
    TruncatedBuffer { need: usize, have: usize },

    /// Message below the minimum SMB2 size (64-byte header + minimal body)
    #[error("Bad header: need at least {need} bytes, have {have}")]
    BadHeader { need: usize, have: usize },

    /// Protocol signature does not indicate SMB2
    #[error("Incompatible header: protocol version {version}")]
    IncompatibleHeader { version: i8 },

    /// Declared structure size does not match the command's wire layout
    #[error("Incorrect params length: expected {expected}, got {actual}")]
    IncorrectParamsLength { expected: u16, actual: u16 },

    /// Declared variable-buffer bounds exceed the available message bytes
    #[error("Incorrect message length: declared {declared}, available {available}")]
    IncorrectMessageLength { declared: usize, available: usize },

    /// Command code has no registered decoder
    #[error("Invalid command: 0x{0:04x}")]
    InvalidCommand(u16),

    /// Protocol parsing error
    #[error("Protocol parsing error: {0}")]
    ParseError(String),

    /// Connection error
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Peer closed the connection
    #[error("Connection closed")]
    ConnectionClosed,

    /// Operation not valid in the current connection state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Server returned an NT error status
    #[error("Server returned {0}")]
    Server(NtStatus),
}

impl Error {
    /// True when the error means "not enough bytes buffered yet" rather
    /// than a malformed message. The receive loop keeps reading on these.
    ///
    /// A variable buffer declared past the currently buffered bytes
    /// counts as incomplete too: without length framing the rest of the
    /// message may simply not have arrived, and the per-request timeout
    /// bounds how long the receiver waits for it.
    pub fn is_incomplete(&self) -> bool {
        matches!(
            self,
            Error::TruncatedBuffer { .. }
                | Error::BadHeader { .. }
                | Error::IncorrectMessageLength { .. }
        )
    }
}

/// NT status code carried in the SMB2 header status field.
///
/// Stored as the raw value so unknown codes survive a round trip instead of
/// being coerced to some catch-all variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NtStatus(pub u32);

impl NtStatus {
    pub const SUCCESS: NtStatus = NtStatus(0x0000_0000);
    pub const PENDING: NtStatus = NtStatus(0x0000_0103);
    pub const BUFFER_OVERFLOW: NtStatus = NtStatus(0x8000_0005);
    pub const NO_MORE_FILES: NtStatus = NtStatus(0x8000_0006);
    pub const INVALID_HANDLE: NtStatus = NtStatus(0xC000_0008);
    pub const INVALID_PARAMETER: NtStatus = NtStatus(0xC000_000D);
    pub const MORE_PROCESSING_REQUIRED: NtStatus = NtStatus(0xC000_0016);
    pub const ACCESS_DENIED: NtStatus = NtStatus(0xC000_0022);
    pub const BUFFER_TOO_SMALL: NtStatus = NtStatus(0xC000_0023);
    pub const OBJECT_NAME_NOT_FOUND: NtStatus = NtStatus(0xC000_0034);
    pub const OBJECT_NAME_COLLISION: NtStatus = NtStatus(0xC000_0035);
    pub const LOGON_FAILURE: NtStatus = NtStatus(0xC000_006D);
    pub const IO_TIMEOUT: NtStatus = NtStatus(0xC000_00B5);
    pub const NOT_SUPPORTED: NtStatus = NtStatus(0xC000_00BB);
    pub const BAD_NETWORK_NAME: NtStatus = NtStatus(0xC000_00CC);
    pub const NETWORK_NAME_DELETED: NtStatus = NtStatus(0xC000_00C9);
    pub const CANCELLED: NtStatus = NtStatus(0xC000_0120);
    pub const USER_SESSION_DELETED: NtStatus = NtStatus(0xC000_0203);

    /// Check if this is a success status
    pub fn is_success(self) -> bool {
        self == Self::SUCCESS || self.0 & 0xC000_0000 == 0
    }

    /// Check if this is an error status (severity bits 11)
    pub fn is_error(self) -> bool {
        self.0 & 0xC000_0000 == 0xC000_0000
    }

    /// Check if this is a warning status (severity bits 10)
    pub fn is_warning(self) -> bool {
        self.0 & 0xC000_0000 == 0x8000_0000
    }

    fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::SUCCESS => "STATUS_SUCCESS",
            Self::PENDING => "STATUS_PENDING",
            Self::BUFFER_OVERFLOW => "STATUS_BUFFER_OVERFLOW",
            Self::NO_MORE_FILES => "STATUS_NO_MORE_FILES",
            Self::INVALID_HANDLE => "STATUS_INVALID_HANDLE",
            Self::INVALID_PARAMETER => "STATUS_INVALID_PARAMETER",
            Self::MORE_PROCESSING_REQUIRED => "STATUS_MORE_PROCESSING_REQUIRED",
            Self::ACCESS_DENIED => "STATUS_ACCESS_DENIED",
            Self::BUFFER_TOO_SMALL => "STATUS_BUFFER_TOO_SMALL",
            Self::OBJECT_NAME_NOT_FOUND => "STATUS_OBJECT_NAME_NOT_FOUND",
            Self::OBJECT_NAME_COLLISION => "STATUS_OBJECT_NAME_COLLISION",
            Self::LOGON_FAILURE => "STATUS_LOGON_FAILURE",
            Self::IO_TIMEOUT => "STATUS_IO_TIMEOUT",
            Self::NOT_SUPPORTED => "STATUS_NOT_SUPPORTED",
            Self::BAD_NETWORK_NAME => "STATUS_BAD_NETWORK_NAME",
            Self::NETWORK_NAME_DELETED => "STATUS_NETWORK_NAME_DELETED",
            Self::CANCELLED => "STATUS_CANCELLED",
            Self::USER_SESSION_DELETED => "STATUS_USER_SESSION_DELETED",
            _ => return None,
        })
    }
}

impl fmt::Display for NtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} (0x{:08X})", name, self.0),
            None => write!(f, "NTSTATUS 0x{:08X}", self.0),
        }
    }
}
