//! SMB2 message catalog: request/response unions and response dispatch
//!
//! The catalog is the single place that knows which body shape belongs to
//! which command code. Responses coming off the stream go through
//! [`parse_response`], which validates the frame, decodes the header and
//! selects the matching body decoder.

use crate::codec::SmbMessage;
use crate::error::{Error, NtStatus, Result};
use crate::protocol::constants::{Smb2Command, SMB2_HEADER_SIZE, SMB2_MIN_MESSAGE_SIZE};
use crate::protocol::header::Smb2Header;
use crate::protocol::messages::directory::{
    Smb2ChangeNotifyRequest, Smb2ChangeNotifyResponse, Smb2QueryDirectoryRequest,
    Smb2QueryDirectoryResponse,
};
use crate::protocol::messages::file_ops::{
    Smb2CloseRequest, Smb2CloseResponse, Smb2CreateRequest, Smb2CreateResponse, Smb2FlushRequest,
    Smb2FlushResponse, Smb2ReadRequest, Smb2ReadResponse, Smb2WriteRequest, Smb2WriteResponse,
};
use crate::protocol::messages::info::{
    Smb2QueryInfoRequest, Smb2QueryInfoResponse, Smb2SetInfoRequest, Smb2SetInfoResponse,
};
use crate::protocol::messages::ioctl::{Smb2IoctlRequest, Smb2IoctlResponse};
use crate::protocol::messages::lock::{Smb2LockRequest, Smb2LockResponse};
use crate::protocol::messages::misc::{
    Smb2CancelRequest, Smb2EchoRequest, Smb2EchoResponse, Smb2ErrorResponse, Smb2LogoffRequest,
    Smb2LogoffResponse, Smb2OplockBreakAck,
};
use crate::protocol::messages::negotiate::{Smb2NegotiateRequest, Smb2NegotiateResponse};
use crate::protocol::messages::session::{Smb2SessionSetupRequest, Smb2SessionSetupResponse};
use crate::protocol::messages::tree::{
    Smb2TreeConnectRequest, Smb2TreeConnectResponse, Smb2TreeDisconnectRequest,
    Smb2TreeDisconnectResponse,
};
use byteorder::{ByteOrder, LittleEndian};

/// Request body for every SMB2 command this client can send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    Negotiate(Smb2NegotiateRequest),
    SessionSetup(Smb2SessionSetupRequest),
    Logoff(Smb2LogoffRequest),
    TreeConnect(Smb2TreeConnectRequest),
    TreeDisconnect(Smb2TreeDisconnectRequest),
    Create(Smb2CreateRequest),
    Close(Smb2CloseRequest),
    Flush(Smb2FlushRequest),
    Read(Smb2ReadRequest),
    Write(Smb2WriteRequest),
    Lock(Smb2LockRequest),
    Ioctl(Smb2IoctlRequest),
    Cancel(Smb2CancelRequest),
    Echo(Smb2EchoRequest),
    QueryDirectory(Smb2QueryDirectoryRequest),
    ChangeNotify(Smb2ChangeNotifyRequest),
    QueryInfo(Smb2QueryInfoRequest),
    SetInfo(Smb2SetInfoRequest),
    OplockBreak(Smb2OplockBreakAck),
}

impl RequestBody {
    /// The command code this body travels under
    pub fn command(&self) -> Smb2Command {
        match self {
            Self::Negotiate(_) => Smb2Command::Negotiate,
            Self::SessionSetup(_) => Smb2Command::SessionSetup,
            Self::Logoff(_) => Smb2Command::Logoff,
            Self::TreeConnect(_) => Smb2Command::TreeConnect,
            Self::TreeDisconnect(_) => Smb2Command::TreeDisconnect,
            Self::Create(_) => Smb2Command::Create,
            Self::Close(_) => Smb2Command::Close,
            Self::Flush(_) => Smb2Command::Flush,
            Self::Read(_) => Smb2Command::Read,
            Self::Write(_) => Smb2Command::Write,
            Self::Lock(_) => Smb2Command::Lock,
            Self::Ioctl(_) => Smb2Command::Ioctl,
            Self::Cancel(_) => Smb2Command::Cancel,
            Self::Echo(_) => Smb2Command::Echo,
            Self::QueryDirectory(_) => Smb2Command::QueryDirectory,
            Self::ChangeNotify(_) => Smb2Command::ChangeNotify,
            Self::QueryInfo(_) => Smb2Command::QueryInfo,
            Self::SetInfo(_) => Smb2Command::SetInfo,
            Self::OplockBreak(_) => Smb2Command::OplockBreak,
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        match self {
            Self::Negotiate(m) => m.serialize(),
            Self::SessionSetup(m) => m.serialize(),
            Self::Logoff(m) => m.serialize(),
            Self::TreeConnect(m) => m.serialize(),
            Self::TreeDisconnect(m) => m.serialize(),
            Self::Create(m) => m.serialize(),
            Self::Close(m) => m.serialize(),
            Self::Flush(m) => m.serialize(),
            Self::Read(m) => m.serialize(),
            Self::Write(m) => m.serialize(),
            Self::Lock(m) => m.serialize(),
            Self::Ioctl(m) => m.serialize(),
            Self::Cancel(m) => m.serialize(),
            Self::Echo(m) => m.serialize(),
            Self::QueryDirectory(m) => m.serialize(),
            Self::ChangeNotify(m) => m.serialize(),
            Self::QueryInfo(m) => m.serialize(),
            Self::SetInfo(m) => m.serialize(),
            Self::OplockBreak(m) => m.serialize(),
        }
    }
}

/// Response body for every SMB2 command this client can receive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    Negotiate(Smb2NegotiateResponse),
    SessionSetup(Smb2SessionSetupResponse),
    Logoff(Smb2LogoffResponse),
    TreeConnect(Smb2TreeConnectResponse),
    TreeDisconnect(Smb2TreeDisconnectResponse),
    Create(Smb2CreateResponse),
    Close(Smb2CloseResponse),
    Flush(Smb2FlushResponse),
    Read(Smb2ReadResponse),
    Write(Smb2WriteResponse),
    Lock(Smb2LockResponse),
    Ioctl(Smb2IoctlResponse),
    Echo(Smb2EchoResponse),
    QueryDirectory(Smb2QueryDirectoryResponse),
    ChangeNotify(Smb2ChangeNotifyResponse),
    QueryInfo(Smb2QueryInfoResponse),
    SetInfo(Smb2SetInfoResponse),
    /// CANCEL and OPLOCK_BREAK carry no modeled payload; the
    /// acknowledgement is explicit rather than a silent absence
    Acknowledgement { command: Smb2Command },
    /// ERROR response body accompanying an error status in the header
    Error(Smb2ErrorResponse),
}

/// Parse one complete response message: 64-byte header plus command body.
///
/// Returns the decoded header, the body and the number of bytes the
/// message occupies, so a stream buffer can be advanced past it. Errors
/// for which [`Error::is_incomplete`] holds mean more bytes are needed;
/// everything else is a real protocol failure.
pub fn parse_response(buf: &[u8]) -> Result<(Smb2Header, ResponseBody, usize)> {
    if buf.len() <= SMB2_MIN_MESSAGE_SIZE {
        return Err(Error::BadHeader {
            need: SMB2_MIN_MESSAGE_SIZE + 1,
            have: buf.len(),
        });
    }

    // The first byte, read as a signed integer and negated, is the
    // protocol major version: 0xFE -> 2 (SMB2), 0xFF -> 1 (SMB1).
    let version = -(buf[0] as i8);
    if version < 2 {
        return Err(Error::IncompatibleHeader { version });
    }

    let header = Smb2Header::parse(&buf[..SMB2_HEADER_SIZE])?;
    let body = &buf[SMB2_HEADER_SIZE..];

    let status = header.nt_status();
    if status.is_error() && status != NtStatus::MORE_PROCESSING_REQUIRED {
        let err = Smb2ErrorResponse::parse(body)?;
        let consumed = SMB2_HEADER_SIZE + err.size();
        return Ok((header, ResponseBody::Error(err), consumed));
    }

    let (body, consumed) = match header.command {
        Smb2Command::Negotiate => sized(Smb2NegotiateResponse::parse(body)?, ResponseBody::Negotiate),
        Smb2Command::SessionSetup => {
            sized(Smb2SessionSetupResponse::parse(body)?, ResponseBody::SessionSetup)
        }
        Smb2Command::Logoff => sized(Smb2LogoffResponse::parse(body)?, ResponseBody::Logoff),
        Smb2Command::TreeConnect => {
            sized(Smb2TreeConnectResponse::parse(body)?, ResponseBody::TreeConnect)
        }
        Smb2Command::TreeDisconnect => sized(
            Smb2TreeDisconnectResponse::parse(body)?,
            ResponseBody::TreeDisconnect,
        ),
        Smb2Command::Create => sized(Smb2CreateResponse::parse(body)?, ResponseBody::Create),
        Smb2Command::Close => sized(Smb2CloseResponse::parse(body)?, ResponseBody::Close),
        Smb2Command::Flush => sized(Smb2FlushResponse::parse(body)?, ResponseBody::Flush),
        Smb2Command::Read => sized(Smb2ReadResponse::parse(body)?, ResponseBody::Read),
        Smb2Command::Write => sized(Smb2WriteResponse::parse(body)?, ResponseBody::Write),
        Smb2Command::Lock => sized(Smb2LockResponse::parse(body)?, ResponseBody::Lock),
        Smb2Command::Ioctl => sized(Smb2IoctlResponse::parse(body)?, ResponseBody::Ioctl),
        Smb2Command::Echo => sized(Smb2EchoResponse::parse(body)?, ResponseBody::Echo),
        Smb2Command::QueryDirectory => sized(
            Smb2QueryDirectoryResponse::parse(body)?,
            ResponseBody::QueryDirectory,
        ),
        Smb2Command::ChangeNotify => {
            sized(Smb2ChangeNotifyResponse::parse(body)?, ResponseBody::ChangeNotify)
        }
        Smb2Command::QueryInfo => sized(Smb2QueryInfoResponse::parse(body)?, ResponseBody::QueryInfo),
        Smb2Command::SetInfo => sized(Smb2SetInfoResponse::parse(body)?, ResponseBody::SetInfo),
        Smb2Command::Cancel | Smb2Command::OplockBreak => {
            ack_body(header.command, body)?
        }
    };

    Ok((header, body, SMB2_HEADER_SIZE + consumed))
}

fn sized<M: SmbMessage>(msg: M, wrap: fn(M) -> ResponseBody) -> (ResponseBody, usize) {
    let size = msg.size();
    (wrap(msg), size)
}

/// Acknowledgement-only responses: the body is not modeled, but its
/// declared structure size still tells us how many bytes to consume.
fn ack_body(command: Smb2Command, body: &[u8]) -> Result<(ResponseBody, usize)> {
    let declared = LittleEndian::read_u16(&body[..2]) as usize;
    // An odd declared size means a variable trailing buffer we don't
    // model; consume the fixed part only.
    let fixed = declared & !1;
    if fixed > body.len() {
        return Err(Error::TruncatedBuffer {
            need: SMB2_HEADER_SIZE + fixed,
            have: SMB2_HEADER_SIZE + body.len(),
        });
    }
    Ok((ResponseBody::Acknowledgement { command }, fixed))
}

/// Extract the message ID from a raw buffer known to hold at least a
/// full header. Used to fail the right pending request when the body
/// cannot be decoded.
pub fn raw_message_id(buf: &[u8]) -> Option<u64> {
    if buf.len() < SMB2_HEADER_SIZE {
        return None;
    }
    Some(LittleEndian::read_u64(&buf[24..32]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::constants::{ShareCapabilities, ShareFlags};
    use crate::protocol::messages::tree::ShareType;

    fn frame(command: Smb2Command, message_id: u64, status: u32, body: &[u8]) -> Vec<u8> {
        let mut header = Smb2Header::new(command);
        header.message_id = message_id;
        header.status = status;
        let mut bytes = header.serialize().unwrap();
        bytes.extend_from_slice(body);
        bytes
    }

    #[test]
    fn test_short_buffer_rejected() {
        let buf = vec![0xFEu8; 40];
        assert!(matches!(
            parse_response(&buf),
            Err(Error::BadHeader { need: 66, have: 40 })
        ));
    }

    #[test]
    fn test_smb1_signature_rejected() {
        let mut buf = vec![0u8; 80];
        buf[0] = 0xFF; // SMB1
        assert!(matches!(
            parse_response(&buf),
            Err(Error::IncompatibleHeader { version: 1 })
        ));
    }

    #[test]
    fn test_garbage_first_byte_rejected() {
        let mut buf = vec![0u8; 80];
        buf[0] = b'G';
        assert!(matches!(
            parse_response(&buf),
            Err(Error::IncompatibleHeader { .. })
        ));
    }

    #[test]
    fn test_tree_connect_response_dispatch() {
        let resp = Smb2TreeConnectResponse {
            share_type: ShareType::Disk,
            share_flags: ShareFlags::empty(),
            capabilities: ShareCapabilities::empty(),
            maximal_access: 0x001F_01FF,
        };
        let buf = frame(Smb2Command::TreeConnect, 3, 0, &resp.serialize().unwrap());
        let (header, body, consumed) = parse_response(&buf).unwrap();
        assert_eq!(header.message_id, 3);
        assert_eq!(consumed, buf.len());
        assert_eq!(body, ResponseBody::TreeConnect(resp));
    }

    #[test]
    fn test_error_status_selects_error_body() {
        let err = Smb2ErrorResponse {
            error_context_count: 0,
            error_data: vec![0u8; 4],
        };
        let buf = frame(
            Smb2Command::Create,
            9,
            NtStatus::OBJECT_NAME_NOT_FOUND.0,
            &err.serialize().unwrap(),
        );
        let (header, body, _) = parse_response(&buf).unwrap();
        assert_eq!(header.nt_status(), NtStatus::OBJECT_NAME_NOT_FOUND);
        assert_eq!(body, ResponseBody::Error(err));
    }

    #[test]
    fn test_empty_error_consumes_pad_byte() {
        // Error body with ByteCount == 0 still carries one ErrorData
        // byte on the wire; the consumed count must cover it or the
        // following message is parsed one byte off
        let error_body = [9u8, 0, 0, 0, 0, 0, 0, 0, 0];
        let mut stream = frame(
            Smb2Command::Create,
            1,
            NtStatus::ACCESS_DENIED.0,
            &error_body,
        );
        let echo_frame = frame(Smb2Command::Echo, 2, 0, &[4, 0, 0, 0]);
        stream.extend_from_slice(&echo_frame);

        let (header, body, consumed) = parse_response(&stream).unwrap();
        assert_eq!(header.message_id, 1);
        assert!(matches!(body, ResponseBody::Error(_)));
        assert_eq!(consumed, 64 + 9);

        let (header, body, consumed) = parse_response(&stream[consumed..]).unwrap();
        assert_eq!(header.message_id, 2);
        assert_eq!(body, ResponseBody::Echo(Smb2EchoResponse));
        assert_eq!(consumed, echo_frame.len());
    }

    #[test]
    fn test_unknown_command_rejected() {
        let mut header = Smb2Header::new(Smb2Command::Echo);
        header.message_id = 1;
        let mut buf = header.serialize().unwrap();
        buf[12] = 0x77; // command field low byte
        buf.extend_from_slice(&[4, 0, 0, 0]);
        assert!(matches!(
            parse_response(&buf),
            Err(Error::InvalidCommand(0x77))
        ));
    }

    #[test]
    fn test_oplock_break_acknowledgement() {
        // 24-byte oplock break response body; only the structure size is
        // interpreted
        let mut body = vec![0u8; 24];
        body[0] = 24;
        let buf = frame(Smb2Command::OplockBreak, 5, 0, &body);
        let (_, parsed, consumed) = parse_response(&buf).unwrap();
        assert_eq!(
            parsed,
            ResponseBody::Acknowledgement {
                command: Smb2Command::OplockBreak
            }
        );
        assert_eq!(consumed, 64 + 24);
    }

    #[test]
    fn test_truncated_body_is_incomplete() {
        let resp = Smb2ReadResponse {
            data_remaining: 0,
            data: vec![0xAB; 100],
        };
        let full = frame(Smb2Command::Read, 2, 0, &resp.serialize().unwrap());
        let err = parse_response(&full[..full.len() - 20]).unwrap_err();
        assert!(err.is_incomplete(), "got {err:?}");
        // And the complete frame parses with the right consumed count
        let (_, body, consumed) = parse_response(&full).unwrap();
        assert_eq!(consumed, full.len());
        assert_eq!(body, ResponseBody::Read(resp));
    }

    #[test]
    fn test_raw_message_id() {
        let buf = frame(Smb2Command::Echo, 0xDEAD_BEEF, 0, &[4, 0, 0, 0]);
        assert_eq!(raw_message_id(&buf), Some(0xDEAD_BEEF));
        assert_eq!(raw_message_id(&buf[..10]), None);
    }
}
