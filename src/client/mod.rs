//! SMB2 client: connection state machine, request/response correlation
//! and credit-based flow control
//!
//! The client owns the transport and all mutable protocol state, so every
//! operation takes `&mut self`; header construction, message IDs and
//! credit accounting can never interleave across concurrent callers.

use crate::codec::SmbMessage;
use crate::error::{Error, NtStatus, Result};
use crate::protocol::catalog::{parse_response, raw_message_id, RequestBody, ResponseBody};
use crate::protocol::constants::{SecurityMode, Smb2Capabilities, Smb2Command, Smb2Dialect};
use crate::protocol::header::Smb2Header;
use crate::protocol::messages::negotiate::{Smb2NegotiateRequest, Smb2NegotiateResponse};
use crate::protocol::messages::session::{Smb2SessionSetupRequest, Smb2SessionSetupResponse};
use crate::protocol::messages::tree::{
    ShareType, Smb2TreeConnectRequest, Smb2TreeDisconnectRequest,
};
use crate::protocol::messages::misc::{Smb2EchoRequest, Smb2LogoffRequest};
use crate::transport::Transport;
use bytes::BytesMut;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// Client process ID placed in every request header
const CLIENT_PROCESS_ID: u32 = 0xFEFF;

/// Default time to wait for a single response
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Client configuration, applied at construction
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_guid: Uuid,
    /// Dialects offered during negotiation, in preference order
    pub dialects: Vec<Smb2Dialect>,
    pub security_mode: SecurityMode,
    pub capabilities: Smb2Capabilities,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_guid: Uuid::new_v4(),
            dialects: vec![Smb2Dialect::Smb202, Smb2Dialect::Smb210],
            security_mode: SecurityMode::SIGNING_ENABLED,
            capabilities: Smb2Capabilities::empty(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Where the connection is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// NEGOTIATE sent or about to be sent
    Negotiating,
    /// Dialect agreed; SESSION_SETUP exchange in progress
    SessionEstablishing,
    /// Session established, no tree connected yet
    SessionReady,
    /// One or more share connections are live
    TreeConnected(usize),
}

/// A live connection to one share
#[derive(Debug, Clone)]
pub struct TreeConnection {
    pub tree_id: u32,
    pub share_path: String,
    pub share_type: ShareType,
    pub maximal_access: u32,
}

/// Asynchronous SMB2 client over a pluggable transport
pub struct SmbClient {
    config: ClientConfig,
    transport: Box<dyn Transport>,
    state: ConnectionState,
    session_id: u64,
    next_message_id: u64,
    credits: u16,
    trees: HashMap<u32, TreeConnection>,
    /// Message IDs sent and not yet answered
    pending: HashSet<u64>,
    /// Answers received while waiting for a different message ID
    resolved: HashMap<u64, Result<(Smb2Header, ResponseBody)>>,
    rx: BytesMut,
}

impl SmbClient {
    pub fn new(transport: Box<dyn Transport>, config: ClientConfig) -> Self {
        Self {
            config,
            transport,
            state: ConnectionState::Disconnected,
            session_id: 0,
            next_message_id: 0,
            credits: 1,
            trees: HashMap::new(),
            pending: HashSet::new(),
            resolved: HashMap::new(),
            rx: BytesMut::with_capacity(65536),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn credits(&self) -> u16 {
        self.credits
    }

    pub fn tree(&self, tree_id: u32) -> Option<&TreeConnection> {
        self.trees.get(&tree_id)
    }

    /// Allocate the next message ID. IDs are strictly increasing and
    /// never reused within a connection.
    fn create_message_id(&mut self) -> u64 {
        let id = self.next_message_id;
        self.next_message_id += 1;
        id
    }

    /// How many credits to ask for with a given command. The setup
    /// commands front-load the request so that a full session starts
    /// with a useful window.
    fn credit_request_for(&self, command: Smb2Command) -> u16 {
        match command {
            Smb2Command::Negotiate => 126,
            Smb2Command::SessionSetup if self.session_id != 0 => 124,
            Smb2Command::SessionSetup => 125,
            _ => 1,
        }
    }

    /// Serialize and send one request, returning its message ID. Waits
    /// for the server to grant credits if the window is exhausted.
    pub async fn send_message(&mut self, body: RequestBody, tree_id: u32) -> Result<u64> {
        while self.credits == 0 {
            if self.pending.is_empty() {
                return Err(Error::InvalidState(
                    "no credits left and no responses outstanding".to_string(),
                ));
            }
            self.recv_one().await?;
        }
        self.credits -= 1;

        let command = body.command();
        let mut header = Smb2Header::new(command);
        header.credit_charge = 1;
        header.credit_request = self.credit_request_for(command);
        header.message_id = self.create_message_id();
        header.process_id = CLIENT_PROCESS_ID;
        header.tree_id = tree_id;
        header.session_id = self.session_id;

        let mut frame = header.serialize()?;
        frame.extend_from_slice(&body.serialize()?);
        self.transport.write(&frame).await?;
        self.pending.insert(header.message_id);
        trace!(
            command = ?command,
            message_id = header.message_id,
            credits_left = self.credits,
            "request sent"
        );
        Ok(header.message_id)
    }

    /// Wait for the response to a previously sent message. Responses to
    /// other outstanding requests arriving first are stashed, so callers
    /// can collect out-of-order answers in any order.
    pub async fn response(&mut self, message_id: u64) -> Result<(Smb2Header, ResponseBody)> {
        let deadline = self.config.request_timeout;
        let wait = async {
            loop {
                if let Some(result) = self.resolved.remove(&message_id) {
                    return result;
                }
                if !self.pending.contains(&message_id) {
                    return Err(Error::InvalidState(format!(
                        "message {} was never sent",
                        message_id
                    )));
                }
                self.recv_one().await?;
            }
        };
        match timeout(deadline, wait).await {
            Ok(result) => result,
            Err(_) => {
                self.pending.remove(&message_id);
                Err(Error::TimedOut)
            }
        }
    }

    /// Send a request and wait for its matched response
    pub async fn request(
        &mut self,
        body: RequestBody,
        tree_id: u32,
    ) -> Result<(Smb2Header, ResponseBody)> {
        let id = self.send_message(body, tree_id).await?;
        self.response(id).await
    }

    /// Read from the transport until one complete message has been
    /// parsed and filed
    async fn recv_one(&mut self) -> Result<()> {
        loop {
            if !self.rx.is_empty() {
                match parse_response(&self.rx) {
                    Ok((header, body, consumed)) => {
                        let _ = self.rx.split_to(consumed);
                        self.handle_response(header, body);
                        return Ok(());
                    }
                    Err(e) if e.is_incomplete() => {}
                    Err(
                        e @ (Error::IncompatibleHeader { .. }
                        | Error::Io(_)
                        | Error::ConnectionClosed),
                    ) => {
                        self.fail_all_pending(&e);
                        self.state = ConnectionState::Disconnected;
                        return Err(e);
                    }
                    Err(e) => {
                        // The body cannot be decoded, and without length
                        // framing the next message boundary is unknowable.
                        // The stream is lost; the offending request gets
                        // the decode error, everything else a connection
                        // error.
                        warn!(error = %e, "undecodable response body, stream boundary lost");
                        let offender = raw_message_id(&self.rx)
                            .filter(|id| self.pending.contains(id));
                        self.rx.clear();
                        self.fail_all_pending(&e);
                        if let Some(id) = offender {
                            self.resolved.insert(id, Err(e));
                        }
                        self.state = ConnectionState::Disconnected;
                        return Ok(());
                    }
                }
            }
            match self.transport.read_buf(&mut self.rx).await {
                Ok(n) => trace!(bytes = n, buffered = self.rx.len(), "received"),
                Err(e) => {
                    self.fail_all_pending(&e);
                    self.state = ConnectionState::Disconnected;
                    return Err(e);
                }
            }
        }
    }

    fn handle_response(&mut self, header: Smb2Header, body: ResponseBody) {
        self.credits = self.credits.saturating_add(header.credit_request);
        trace!(
            command = ?header.command,
            message_id = header.message_id,
            status = %header.nt_status(),
            granted = header.credit_request,
            "response received"
        );
        if self.pending.remove(&header.message_id) {
            self.resolved.insert(header.message_id, Ok((header, body)));
        } else {
            warn!(
                message_id = header.message_id,
                command = ?header.command,
                "unsolicited response"
            );
        }
    }

    fn fail_all_pending(&mut self, cause: &Error) {
        for id in self.pending.drain() {
            self.resolved
                .insert(id, Err(Error::ConnectionError(cause.to_string())));
        }
    }

    fn expect_state(&self, wanted: ConnectionState, during: &str) -> Result<()> {
        if self.state != wanted {
            return Err(Error::InvalidState(format!(
                "{} requires {:?} state, connection is {:?}",
                during, wanted, self.state
            )));
        }
        Ok(())
    }

    // Lifecycle operations

    /// Negotiate the protocol dialect. First exchange on a fresh
    /// connection.
    pub async fn negotiate(&mut self) -> Result<Smb2NegotiateResponse> {
        self.expect_state(ConnectionState::Disconnected, "negotiate")?;
        self.state = ConnectionState::Negotiating;

        let req = Smb2NegotiateRequest {
            security_mode: self.config.security_mode,
            capabilities: self.config.capabilities,
            client_guid: self.config.client_guid,
            client_start_time: 0,
            dialects: self.config.dialects.clone(),
        };
        let (header, body) = match self.request(RequestBody::Negotiate(req), 0).await {
            Ok(answer) => answer,
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                return Err(e);
            }
        };
        if header.nt_status().is_error() {
            self.state = ConnectionState::Disconnected;
            return Err(Error::Server(header.nt_status()));
        }
        let resp = match body {
            ResponseBody::Negotiate(resp) => resp,
            other => {
                self.state = ConnectionState::Disconnected;
                return Err(Error::ParseError(format!(
                    "negotiate answered with {:?}",
                    other
                )));
            }
        };
        debug!(dialect = ?resp.dialect, server_guid = %resp.server_guid, "dialect negotiated");
        self.state = ConnectionState::SessionEstablishing;
        Ok(resp)
    }

    /// Run one round of the session setup exchange with an opaque
    /// security token produced elsewhere. Returns the server's token and
    /// whether another round is required.
    pub async fn session_setup(
        &mut self,
        security_blob: Vec<u8>,
    ) -> Result<(Smb2SessionSetupResponse, bool)> {
        self.expect_state(ConnectionState::SessionEstablishing, "session setup")?;

        let req = Smb2SessionSetupRequest {
            flags: 0,
            security_mode: self.config.security_mode.bits() as u8,
            capabilities: self.config.capabilities,
            channel: 0,
            previous_session_id: 0,
            security_blob,
        };
        let (header, body) = self.request(RequestBody::SessionSetup(req), 0).await?;

        let status = header.nt_status();
        if status == NtStatus::MORE_PROCESSING_REQUIRED {
            // The interim response carries the session ID for the rest
            // of the exchange
            self.session_id = header.session_id;
            let resp = match body {
                ResponseBody::SessionSetup(resp) => resp,
                other => {
                    return Err(Error::ParseError(format!(
                        "session setup answered with {:?}",
                        other
                    )))
                }
            };
            return Ok((resp, true));
        }
        if status.is_error() {
            return Err(Error::Server(status));
        }
        let resp = match body {
            ResponseBody::SessionSetup(resp) => resp,
            other => {
                return Err(Error::ParseError(format!(
                    "session setup answered with {:?}",
                    other
                )))
            }
        };
        self.session_id = header.session_id;
        self.state = ConnectionState::SessionReady;
        debug!(session_id = self.session_id, "session established");
        Ok((resp, false))
    }

    /// Connect to a share. Accepts `smb://server/share` URLs and
    /// `\\server\share` UNC paths. Returns the tree ID assigned by the
    /// server.
    pub async fn tree_connect(&mut self, share: &str) -> Result<u32> {
        match self.state {
            ConnectionState::SessionReady | ConnectionState::TreeConnected(_) => {}
            other => {
                return Err(Error::InvalidState(format!(
                    "tree connect requires an established session, connection is {:?}",
                    other
                )))
            }
        }
        let path = unc_share_path(share)?;

        let req = Smb2TreeConnectRequest::new(path.clone());
        let (header, body) = self.request(RequestBody::TreeConnect(req), 0).await?;
        if header.nt_status().is_error() {
            return Err(Error::Server(header.nt_status()));
        }
        let resp = match body {
            ResponseBody::TreeConnect(resp) => resp,
            other => {
                return Err(Error::ParseError(format!(
                    "tree connect answered with {:?}",
                    other
                )))
            }
        };
        let tree_id = header.tree_id;
        self.trees.insert(
            tree_id,
            TreeConnection {
                tree_id,
                share_path: path,
                share_type: resp.share_type,
                maximal_access: resp.maximal_access,
            },
        );
        self.state = ConnectionState::TreeConnected(self.trees.len());
        debug!(tree_id, share_type = ?resp.share_type, "tree connected");
        Ok(tree_id)
    }

    /// Disconnect from a share. The tree stays registered until the
    /// server acknowledges.
    pub async fn tree_disconnect(&mut self, tree_id: u32) -> Result<()> {
        if !self.trees.contains_key(&tree_id) {
            return Err(Error::InvalidState(format!(
                "tree {} is not connected",
                tree_id
            )));
        }
        let (header, _) = self
            .request(RequestBody::TreeDisconnect(Smb2TreeDisconnectRequest), tree_id)
            .await?;
        if header.nt_status().is_error() {
            return Err(Error::Server(header.nt_status()));
        }
        self.trees.remove(&tree_id);
        self.state = if self.trees.is_empty() {
            ConnectionState::SessionReady
        } else {
            ConnectionState::TreeConnected(self.trees.len())
        };
        debug!(tree_id, "tree disconnected");
        Ok(())
    }

    /// Terminate the session. Any remaining tree connections are dropped
    /// with it.
    pub async fn logoff(&mut self) -> Result<()> {
        match self.state {
            ConnectionState::SessionReady | ConnectionState::TreeConnected(_) => {}
            other => {
                return Err(Error::InvalidState(format!(
                    "logoff requires an established session, connection is {:?}",
                    other
                )))
            }
        }
        let (header, _) = self.request(RequestBody::Logoff(Smb2LogoffRequest), 0).await?;
        if header.nt_status().is_error() {
            return Err(Error::Server(header.nt_status()));
        }
        self.session_id = 0;
        self.trees.clear();
        self.state = ConnectionState::SessionEstablishing;
        debug!("session logged off");
        Ok(())
    }

    /// Probe that the connection is alive
    pub async fn echo(&mut self) -> Result<()> {
        let (header, _) = self.request(RequestBody::Echo(Smb2EchoRequest), 0).await?;
        if header.nt_status().is_error() {
            return Err(Error::Server(header.nt_status()));
        }
        Ok(())
    }

    /// Tear down the transport and reset all connection state. Requests
    /// still in flight fail with a connection error.
    pub async fn close(&mut self) -> Result<()> {
        self.fail_all_pending(&Error::ConnectionClosed);
        self.transport.close().await?;
        self.state = ConnectionState::Disconnected;
        self.session_id = 0;
        self.next_message_id = 0;
        self.credits = 1;
        self.trees.clear();
        self.rx.clear();
        Ok(())
    }
}

/// Normalize a share location to the `\\server\share` form carried in
/// TREE_CONNECT
fn unc_share_path(share: &str) -> Result<String> {
    if let Some(rest) = share.strip_prefix("smb://") {
        let mut parts = rest.splitn(2, '/');
        let host = parts.next().unwrap_or("");
        let share_name = parts.next().unwrap_or("").trim_end_matches('/');
        if host.is_empty() || share_name.is_empty() {
            return Err(Error::ParseError(format!("Invalid share URL: {}", share)));
        }
        return Ok(format!("\\\\{}\\{}", host, share_name));
    }
    if share.starts_with("\\\\") && share[2..].contains('\\') {
        return Ok(share.to_string());
    }
    Err(Error::ParseError(format!("Invalid share URL: {}", share)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::StreamTransport;

    fn test_client() -> SmbClient {
        let (stream, _peer) = tokio::io::duplex(4096);
        // Keep the far end alive so writes don't error
        std::mem::forget(_peer);
        SmbClient::new(Box::new(StreamTransport::new(stream)), ClientConfig::default())
    }

    #[test]
    fn test_message_ids_strictly_increase() {
        let mut client = test_client();
        let ids: Vec<u64> = (0..5).map(|_| client.create_message_id()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_credit_exhaustion_without_pending_fails() {
        let mut client = test_client();
        client.credits = 0;
        let err = client
            .send_message(RequestBody::Echo(Smb2EchoRequest), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_credit_request_front_loading() {
        let client = test_client();
        assert_eq!(client.credit_request_for(Smb2Command::Negotiate), 126);
        assert_eq!(client.credit_request_for(Smb2Command::SessionSetup), 125);
        assert_eq!(client.credit_request_for(Smb2Command::Echo), 1);

        let mut client = test_client();
        client.session_id = 0x11;
        assert_eq!(client.credit_request_for(Smb2Command::SessionSetup), 124);
    }

    #[tokio::test]
    async fn test_lifecycle_guards() {
        let mut client = test_client();
        assert!(matches!(
            client.tree_connect("smb://server/share").await,
            Err(Error::InvalidState(_))
        ));
        assert!(matches!(
            client.session_setup(Vec::new()).await,
            Err(Error::InvalidState(_))
        ));
        assert!(matches!(
            client.tree_disconnect(42).await,
            Err(Error::InvalidState(_))
        ));
        assert!(matches!(
            client.logoff().await,
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_unc_share_path() {
        assert_eq!(
            unc_share_path("smb://server/music").unwrap(),
            "\\\\server\\music"
        );
        assert_eq!(
            unc_share_path("smb://server/music/").unwrap(),
            "\\\\server\\music"
        );
        assert_eq!(
            unc_share_path("\\\\server\\music").unwrap(),
            "\\\\server\\music"
        );
        assert!(unc_share_path("smb://server").is_err());
        assert!(unc_share_path("server/music").is_err());
    }
}
