//! Blocking TCP transport for the MCP endpoint.
//!
//! Owns the socket. Sends framed envelopes and, for requests only, blocks
//! until one complete response frame arrives. Strictly one request in
//! flight at a time; there is no background listener thread.

use std::io::Write;
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::error::{ClientError, Result};
use crate::framing::{encode_frame, read_frame};
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, parse_response};

/// Default host of the hex editor's MCP endpoint.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default port of the hex editor's MCP endpoint.
pub const DEFAULT_PORT: u16 = 19743;

/// Default socket timeout, applied to connect and every read/write.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A connected transport to the MCP endpoint.
///
/// Constructed only by a successful [`connect`](Self::connect), so a live
/// socket is held until [`disconnect`](Self::disconnect) tears it down;
/// sends after that fail with [`ClientError::NotConnected`].
#[derive(Debug)]
pub struct Transport {
    stream: Option<TcpStream>,
    peer: String,
}

impl Transport {
    /// Open a blocking TCP connection with the given timeout.
    ///
    /// The timeout applies to the connect attempt and to every subsequent
    /// read and write on the socket. Fails with
    /// [`ClientError::Unreachable`] if the peer refuses or the attempt
    /// times out.
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let peer = format!("{host}:{port}");

        let addrs = (host, port)
            .to_socket_addrs()
            .map_err(|e| ClientError::unreachable(format!("failed to resolve {peer}: {e}")))?;

        let mut last_err = None;
        let mut stream = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(e) => last_err = Some(e),
            }
        }

        let stream = stream.ok_or_else(|| {
            let detail = match last_err {
                Some(e) => e.to_string(),
                None => "no addresses resolved".to_string(),
            };
            ClientError::unreachable(format!("cannot connect to {peer}: {detail}"))
        })?;

        stream
            .set_read_timeout(Some(timeout))
            .map_err(ClientError::from_socket)?;
        stream
            .set_write_timeout(Some(timeout))
            .map_err(ClientError::from_socket)?;
        stream.set_nodelay(true).map_err(ClientError::from_socket)?;

        tracing::info!(
            peer = %peer,
            timeout_secs = timeout.as_secs(),
            "connected to MCP endpoint"
        );

        Ok(Self {
            stream: Some(stream),
            peer,
        })
    }

    /// Send a request and block until its response frame arrives.
    ///
    /// Short writes are retried until the whole frame is on the wire. An
    /// error object in the response fails with [`ClientError::Remote`];
    /// the connection stays usable after that. A response id that does not
    /// match the request is logged and accepted — with one outstanding
    /// request at a time, correlation is a formality.
    pub fn send_request(&mut self, request: &JsonRpcRequest) -> Result<serde_json::Value> {
        let payload = serde_json::to_vec(request)
            .map_err(|e| ClientError::malformed(format!("failed to encode request: {e}")))?;

        let stream = self.stream.as_mut().ok_or(ClientError::NotConnected)?;
        stream
            .write_all(&encode_frame(&payload))
            .map_err(ClientError::from_socket)?;

        tracing::trace!(
            method = %request.method,
            id = %request.id,
            "sent request frame"
        );

        let frame = read_frame(stream)?;
        let response = parse_response(&frame)?;

        tracing::trace!(
            method = %request.method,
            bytes = frame.len(),
            "received response frame"
        );

        if response.id.as_ref() != Some(&request.id) {
            tracing::warn!(
                expected = %request.id,
                received = ?response.id,
                "response id does not match request"
            );
        }

        response.into_result().map_err(|e| {
            tracing::warn!(code = e.code, message = %e.message, "server returned error");
            ClientError::remote(e.code, e.message, e.data)
        })
    }

    /// Send a notification. Returns as soon as the frame is written; no
    /// response is read and none is expected.
    pub fn send_notification(&mut self, notification: &JsonRpcNotification) -> Result<()> {
        let payload = serde_json::to_vec(notification)
            .map_err(|e| ClientError::malformed(format!("failed to encode notification: {e}")))?;

        let stream = self.stream.as_mut().ok_or(ClientError::NotConnected)?;
        stream
            .write_all(&encode_frame(&payload))
            .map_err(ClientError::from_socket)?;

        tracing::trace!(method = %notification.method, "sent notification frame");
        Ok(())
    }

    /// Close the socket. Idempotent: calling it twice, or on an
    /// already-closed connection, is a no-op.
    pub fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
            tracing::debug!(peer = %self.peer, "disconnected from MCP endpoint");
        }
    }

    /// Check if the transport still holds a live socket.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// The endpoint this transport was connected to, as `host:port`.
    pub fn peer(&self) -> &str {
        &self.peer
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.disconnect();
    }
}
