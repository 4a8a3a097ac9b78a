//! Error types for client operations.

use thiserror::Error;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Error type for client operations.
///
/// Every failure carries a stable, matchable kind. Transport faults
/// ([`Unreachable`](Self::Unreachable), [`NotConnected`](Self::NotConnected),
/// [`TimedOut`](Self::TimedOut), [`ConnectionClosed`](Self::ConnectionClosed))
/// are terminal for the in-flight call; the caller should disconnect and may
/// reconnect fresh. [`Remote`](Self::Remote) is recoverable — the connection
/// stays usable and the caller inspects the code to decide what to do next.
/// [`NotConnected`](Self::NotConnected) and
/// [`NotInitialized`](Self::NotInitialized) are local precondition
/// violations that never touch the network.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server refused the connection or the connect attempt timed out.
    #[error("server unreachable: {0}")]
    Unreachable(String),

    /// Operation requires a live connection.
    #[error("not connected - call connect() first")]
    NotConnected,

    /// Operation requires an initialized session.
    #[error("session not initialized - call initialize() first")]
    NotInitialized,

    /// The socket timeout elapsed before a full response frame arrived.
    ///
    /// The connection is in an indeterminate state after this: a stale
    /// response frame may still be in flight, so the socket must be torn
    /// down rather than reused.
    #[error("timed out waiting for response")]
    TimedOut,

    /// The server closed the connection before a full frame was received.
    #[error("connection closed by server")]
    ConnectionClosed,

    /// The byte stream did not parse into a valid JSON-RPC envelope, or
    /// violated the result/error exclusivity invariant.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The server validly responded with a JSON-RPC error object.
    ///
    /// Standard codes live in the −32700..−32600 range; any other code is a
    /// tool-defined application error, never a fault of the client itself.
    #[error("server error {code}: {message}")]
    Remote {
        /// Error code from the server.
        code: i64,
        /// Error message from the server.
        message: String,
        /// Optional diagnostic data.
        data: Option<serde_json::Value>,
    },

    /// Unclassified socket fault.
    #[error("IO error: {0}")]
    Io(std::io::Error),
}

impl ClientError {
    /// Create an unreachable error.
    pub fn unreachable(msg: impl Into<String>) -> Self {
        Self::Unreachable(msg.into())
    }

    /// Create a malformed-envelope error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedEnvelope(msg.into())
    }

    /// Create a remote error from an error response.
    pub fn remote(code: i64, message: impl Into<String>, data: Option<serde_json::Value>) -> Self {
        Self::Remote {
            code,
            message: message.into(),
            data,
        }
    }

    /// Classify a socket error into the transport fault taxonomy.
    ///
    /// Timeout kinds become [`TimedOut`](Self::TimedOut), peer-closure kinds
    /// become [`ConnectionClosed`](Self::ConnectionClosed), anything else is
    /// passed through as [`Io`](Self::Io).
    pub fn from_socket(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match err.kind() {
            ErrorKind::TimedOut | ErrorKind::WouldBlock => Self::TimedOut,
            ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe => Self::ConnectionClosed,
            ErrorKind::NotConnected => Self::NotConnected,
            _ => Self::Io(err),
        }
    }

    /// Whether this fault is recoverable on the same connection.
    ///
    /// Only remote application errors leave the connection usable; every
    /// transport or protocol fault requires a disconnect.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }
}
