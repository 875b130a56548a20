//! End-to-end tests driving the full client stack over in-memory pipes
//! against a scripted server

use crate::client::{ClientConfig, ConnectionState, SmbClient};
use crate::codec::SmbMessage;
use crate::error::Error;
use crate::protocol::constants::{
    SecurityMode, ShareCapabilities, ShareFlags, Smb2Capabilities, Smb2Command, Smb2Dialect,
    Smb2HeaderFlags, SMB2_HEADER_SIZE,
};
use crate::protocol::header::Smb2Header;
use crate::protocol::messages::misc::Smb2EchoResponse;
use crate::protocol::messages::negotiate::{Smb2NegotiateRequest, Smb2NegotiateResponse};
use crate::protocol::messages::session::{SessionFlags, Smb2SessionSetupResponse};
use crate::protocol::messages::tree::{ShareType, Smb2TreeConnectRequest, Smb2TreeConnectResponse};
use crate::protocol::catalog::RequestBody;
use crate::transport::StreamTransport;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use uuid::Uuid;

const SESSION_ID: u64 = 0x0008_0004_0000_0015;

fn client_over(stream: DuplexStream) -> SmbClient {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    SmbClient::new(Box::new(StreamTransport::new(stream)), ClientConfig::default())
}

/// Read one request frame of known body length off the wire
async fn read_request(stream: &mut DuplexStream, body_len: usize) -> Smb2Header {
    let mut frame = vec![0u8; SMB2_HEADER_SIZE + body_len];
    stream.read_exact(&mut frame).await.unwrap();
    Smb2Header::parse(&frame[..SMB2_HEADER_SIZE]).unwrap()
}

/// Build a response frame answering `request`
fn response_frame(
    request: &Smb2Header,
    status: u32,
    credits_granted: u16,
    tree_id: u32,
    session_id: u64,
    body: &[u8],
) -> Vec<u8> {
    let mut header = Smb2Header::new(request.command);
    header.status = status;
    header.flags = Smb2HeaderFlags::SERVER_TO_REDIR;
    header.credit_request = credits_granted;
    header.message_id = request.message_id;
    header.tree_id = tree_id;
    header.session_id = session_id;
    let mut frame = header.serialize().unwrap();
    frame.extend_from_slice(body);
    frame
}

fn negotiate_response() -> Smb2NegotiateResponse {
    Smb2NegotiateResponse {
        security_mode: SecurityMode::SIGNING_ENABLED,
        dialect: Smb2Dialect::Smb202,
        server_guid: Uuid::new_v4(),
        capabilities: Smb2Capabilities::empty(),
        max_transact_size: 0x0010_0000,
        max_read_size: 0x0010_0000,
        max_write_size: 0x0010_0000,
        system_time: 0,
        server_start_time: 0,
        security_blob: Vec::new(),
    }
}

fn negotiate_request_len() -> usize {
    // Mirrors the default config: two dialects offered
    Smb2NegotiateRequest::new(vec![Smb2Dialect::Smb202, Smb2Dialect::Smb210]).size()
}

/// Scripted handshake: answer NEGOTIATE and a single-round
/// SESSION_SETUP, granting a window of credits
async fn establish_session(server: &mut DuplexStream) {
    let req = read_request(server, negotiate_request_len()).await;
    assert_eq!(req.command, Smb2Command::Negotiate);
    let body = negotiate_response().serialize().unwrap();
    server
        .write_all(&response_frame(&req, 0, 10, 0, 0, &body))
        .await
        .unwrap();

    let req = read_request(server, 24).await;
    assert_eq!(req.command, Smb2Command::SessionSetup);
    let body = Smb2SessionSetupResponse {
        session_flags: SessionFlags::empty(),
        security_blob: Vec::new(),
    }
    .serialize()
    .unwrap();
    server
        .write_all(&response_frame(&req, 0, 10, 0, SESSION_ID, &body))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_negotiate_selects_dialect() {
    let (client_end, mut server) = tokio::io::duplex(65536);
    let server_task = tokio::spawn(async move {
        let req = read_request(&mut server, negotiate_request_len()).await;
        assert_eq!(req.command, Smb2Command::Negotiate);
        assert_eq!(req.message_id, 0);
        assert_eq!(req.credit_request, 126);
        let body = negotiate_response().serialize().unwrap();
        server
            .write_all(&response_frame(&req, 0, 32, 0, 0, &body))
            .await
            .unwrap();
        server
    });

    let mut client = client_over(client_end);
    let resp = client.negotiate().await.unwrap();
    assert_eq!(resp.dialect, Smb2Dialect::Smb202);
    assert_eq!(client.state(), ConnectionState::SessionEstablishing);
    // One credit spent on the request, 32 granted back
    assert_eq!(client.credits(), 32);
    server_task.await.unwrap();
}

#[tokio::test]
async fn test_session_and_tree_connect() {
    let (client_end, mut server) = tokio::io::duplex(65536);
    let server_task = tokio::spawn(async move {
        establish_session(&mut server).await;

        let path = "\\\\server\\share".to_string();
        let body_len = Smb2TreeConnectRequest::new(path).size();
        let req = read_request(&mut server, body_len).await;
        assert_eq!(req.command, Smb2Command::TreeConnect);
        assert_eq!(req.session_id, SESSION_ID);
        let body = Smb2TreeConnectResponse {
            share_type: ShareType::Disk,
            share_flags: ShareFlags::empty(),
            capabilities: ShareCapabilities::empty(),
            maximal_access: 0x001F_01FF,
        }
        .serialize()
        .unwrap();
        server
            .write_all(&response_frame(&req, 0, 1, 7, SESSION_ID, &body))
            .await
            .unwrap();
        server
    });

    let mut client = client_over(client_end);
    client.negotiate().await.unwrap();
    let (_, more) = client.session_setup(Vec::new()).await.unwrap();
    assert!(!more);
    assert_eq!(client.session_id(), SESSION_ID);
    assert_eq!(client.state(), ConnectionState::SessionReady);

    let tree_id = client.tree_connect("smb://server/share").await.unwrap();
    assert_eq!(tree_id, 7);
    let tree = client.tree(7).unwrap();
    assert_eq!(tree.share_type, ShareType::Disk);
    assert_eq!(tree.share_path, "\\\\server\\share");
    assert_eq!(client.state(), ConnectionState::TreeConnected(1));
    server_task.await.unwrap();
}

#[tokio::test]
async fn test_variable_buffer_split_across_reads() {
    let (client_end, mut server) = tokio::io::duplex(65536);
    let blob = vec![0xAA; 32];
    let expected_blob = blob.clone();
    let server_task = tokio::spawn(async move {
        let req = read_request(&mut server, negotiate_request_len()).await;
        let mut resp = negotiate_response();
        resp.security_blob = blob;
        let frame = response_frame(&req, 0, 8, 0, 0, &resp.serialize().unwrap());
        // Deliver the fixed part first; the declared blob arrives later
        let split = frame.len() - 8;
        server.write_all(&frame[..split]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        server.write_all(&frame[split..]).await.unwrap();
        server
    });

    let mut client = client_over(client_end);
    let resp = client.negotiate().await.unwrap();
    assert_eq!(resp.security_blob, expected_blob);
    assert_eq!(client.state(), ConnectionState::SessionEstablishing);
    server_task.await.unwrap();
}

#[tokio::test]
async fn test_undecodable_body_drops_connection() {
    let (client_end, mut server) = tokio::io::duplex(65536);
    let server_task = tokio::spawn(async move {
        establish_session(&mut server).await;

        let first = read_request(&mut server, 4).await;
        let second = read_request(&mut server, 4).await;
        // Answer the first echo with a body claiming a bogus structure
        // size; the stream boundary is unrecoverable after it
        server
            .write_all(&response_frame(&first, 0, 1, 0, SESSION_ID, &[99, 0, 0, 0]))
            .await
            .unwrap();
        let body = Smb2EchoResponse.serialize().unwrap();
        server
            .write_all(&response_frame(&second, 0, 1, 0, SESSION_ID, &body))
            .await
            .unwrap();
        server
    });

    let mut client = client_over(client_end);
    client.negotiate().await.unwrap();
    client.session_setup(Vec::new()).await.unwrap();

    let id1 = client
        .send_message(RequestBody::Echo(Default::default()), 0)
        .await
        .unwrap();
    let id2 = client
        .send_message(RequestBody::Echo(Default::default()), 0)
        .await
        .unwrap();

    let err = client.response(id1).await.unwrap_err();
    assert!(matches!(err, Error::IncorrectParamsLength { .. }));
    // The request queued behind the bad frame fails too instead of
    // dangling until its timeout
    let err = client.response(id2).await.unwrap_err();
    assert!(matches!(err, Error::ConnectionError(_)));
    assert_eq!(client.state(), ConnectionState::Disconnected);
    server_task.await.unwrap();
}

#[tokio::test]
async fn test_truncated_response_then_close_fails_request() {
    let (client_end, mut server) = tokio::io::duplex(65536);
    let server_task = tokio::spawn(async move {
        let req = read_request(&mut server, negotiate_request_len()).await;
        let body = negotiate_response().serialize().unwrap();
        let frame = response_frame(&req, 0, 1, 0, 0, &body);
        // Half a message, then hang up
        server.write_all(&frame[..40]).await.unwrap();
        drop(server);
    });

    let mut client = client_over(client_end);
    let err = client.negotiate().await.unwrap_err();
    assert!(matches!(err, Error::ConnectionClosed));
    assert_eq!(client.state(), ConnectionState::Disconnected);
    server_task.await.unwrap();
}

#[tokio::test]
async fn test_out_of_order_responses_resolve_by_id() {
    let (client_end, mut server) = tokio::io::duplex(65536);
    let server_task = tokio::spawn(async move {
        establish_session(&mut server).await;

        let first = read_request(&mut server, 4).await;
        let second = read_request(&mut server, 4).await;
        assert_eq!(first.command, Smb2Command::Echo);
        assert!(second.message_id > first.message_id);

        // Answer in reverse order
        let body = Smb2EchoResponse.serialize().unwrap();
        server
            .write_all(&response_frame(&second, 0, 1, 0, SESSION_ID, &body))
            .await
            .unwrap();
        server
            .write_all(&response_frame(&first, 0, 1, 0, SESSION_ID, &body))
            .await
            .unwrap();
        server
    });

    let mut client = client_over(client_end);
    client.negotiate().await.unwrap();
    client.session_setup(Vec::new()).await.unwrap();

    let id1 = client
        .send_message(RequestBody::Echo(Default::default()), 0)
        .await
        .unwrap();
    let id2 = client
        .send_message(RequestBody::Echo(Default::default()), 0)
        .await
        .unwrap();

    // Waiting on the first stashes the second's early answer
    let (header1, _) = client.response(id1).await.unwrap();
    assert_eq!(header1.message_id, id1);
    let (header2, _) = client.response(id2).await.unwrap();
    assert_eq!(header2.message_id, id2);
    server_task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_write_timeout_surfaces() {
    // A pipe too small for the request, never drained
    let (client_end, _server) = tokio::io::duplex(16);
    let transport = StreamTransport::with_write_timeout(client_end, Duration::from_millis(50));
    let mut client = SmbClient::new(Box::new(transport), ClientConfig::default());

    let err = client.negotiate().await.unwrap_err();
    assert!(matches!(err, Error::TimedOut));
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_request_times_out() {
    // Server end stays open but never replies
    let (client_end, _server) = tokio::io::duplex(65536);
    let mut client = client_over(client_end);

    let err = client.negotiate().await.unwrap_err();
    assert!(matches!(err, Error::TimedOut));
    assert_eq!(client.state(), ConnectionState::Disconnected);
}
