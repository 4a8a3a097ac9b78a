//! Session layer: the state machine over the transport.
//!
//! A [`Session`] owns the socket and the request-id counter, enforces the
//! legal call sequence (connect → initialize → tool calls → disconnect),
//! and exposes the generic [`call_tool`](Session::call_tool) operation the
//! typed wrappers in [`crate::tools`] are built on.
//!
//! # Exclusive access
//!
//! Every operation takes `&mut self`, so one session cannot issue two
//! overlapping requests from safe code. The selected-data-source state
//! lives on the server and is shared by the whole connection, so sharing a
//! session across threads needs an external `Mutex` — `select_data_source`
//! followed by a read must not interleave with another caller.

use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::protocol::{
    CallToolParams, ClientInfo, InitializeParams, InitializeResult, JsonRpcNotification,
    JsonRpcRequest, ListToolsResult, PROTOCOL_VERSION, ServerInfo, ToolInfo,
};
use crate::transport::Transport;

/// Container key some tool results wrap their payload under.
const STRUCTURED_CONTENT_KEY: &str = "structuredContent";

/// Lifecycle state of a session.
///
/// Transitions:
///
/// | State | Operation | Next state |
/// |---|---|---|
/// | Disconnected | `connect` | Connected |
/// | Connected | `initialize` | Initialized |
/// | Initialized | `call_tool` / `list_tools` | Initialized |
/// | any | `disconnect` | Disconnected |
///
/// `initialize` and `call_tool` from Disconnected fail with
/// [`ClientError::NotConnected`]; `call_tool` from Connected fails with
/// [`ClientError::NotInitialized`]. Neither touches the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No socket held.
    Disconnected,
    /// Socket open, handshake not yet performed.
    Connected,
    /// Handshake complete, tool calls are legal.
    Initialized,
}

/// A client session with the hex editor's MCP endpoint.
pub struct Session {
    config: ClientConfig,
    transport: Option<Transport>,
    state: SessionState,
    /// Next request id. Starts at 1, strictly increasing, never reused —
    /// not even across a disconnect/reconnect on the same session.
    next_id: u64,
    server_info: Option<ServerInfo>,
    server_protocol_version: Option<String>,
    version_warning: Option<String>,
}

impl Session {
    /// Create a session in the Disconnected state.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
            state: SessionState::Disconnected,
            next_id: 1,
            server_info: None,
            server_protocol_version: None,
            version_warning: None,
        }
    }

    /// Create a session with the default endpoint (`127.0.0.1:19743`).
    pub fn with_defaults() -> Self {
        Self::new(ClientConfig::default())
    }

    /// Open the TCP connection. Disconnected → Connected.
    ///
    /// Connecting an already-connected session closes the existing socket
    /// first and opens a fresh one; the request-id counter is not reset.
    pub fn connect(&mut self) -> Result<()> {
        if self.state != SessionState::Disconnected {
            tracing::warn!("already connected, closing existing connection");
            self.disconnect();
        }

        let transport =
            Transport::connect(&self.config.host, self.config.port, self.config.timeout())?;
        self.transport = Some(transport);
        self.state = SessionState::Connected;
        Ok(())
    }

    /// Close the connection. Legal from any state, idempotent, releases
    /// the socket unconditionally.
    pub fn disconnect(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.disconnect();
        }
        self.state = SessionState::Disconnected;
    }

    /// Perform the handshake. Connected → Initialized.
    ///
    /// Sends `initialize` with the client's protocol revision and identity,
    /// records the server's identity and revision, then completes with the
    /// `notifications/initialized` notification. The session is Initialized
    /// only after both steps succeed. A differing server protocol revision
    /// is recorded as a warning (see [`version_warning`](Self::version_warning)),
    /// never an error.
    pub fn initialize(&mut self) -> Result<&ServerInfo> {
        match self.state {
            SessionState::Disconnected => return Err(ClientError::NotConnected),
            SessionState::Initialized => {
                return self.server_info.as_ref().ok_or(ClientError::NotInitialized);
            }
            SessionState::Connected => {}
        }

        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            client_info: ClientInfo {
                name: self.config.client_name.clone(),
                version: self.config.client_version.clone(),
            },
        };
        let params = serde_json::to_value(&params).map_err(|e| {
            ClientError::malformed(format!("failed to encode initialize params: {e}"))
        })?;

        let result = self.send_request("initialize", Some(params))?;
        let init: InitializeResult = serde_json::from_value(result)
            .map_err(|e| ClientError::malformed(format!("invalid initialize result: {e}")))?;

        if init.protocol_version != PROTOCOL_VERSION {
            tracing::warn!(
                client = PROTOCOL_VERSION,
                server = %init.protocol_version,
                "protocol version mismatch"
            );
            self.version_warning = Some(format!(
                "protocol version mismatch: client speaks {PROTOCOL_VERSION}, \
                 server speaks {}",
                init.protocol_version
            ));
        }

        tracing::info!(
            server = %init.server_info.name,
            version = %init.server_info.version,
            protocol = %init.protocol_version,
            "session initialized"
        );

        // The handshake is complete only once the notification is out.
        self.send_notification("notifications/initialized", None)?;

        self.server_protocol_version = Some(init.protocol_version);
        self.state = SessionState::Initialized;
        Ok(self.server_info.insert(init.server_info))
    }

    /// Call a named tool with the given arguments.
    ///
    /// Builds a `tools/call` request, consumes one fresh request id, and
    /// unwraps the `structuredContent` container key if the result carries
    /// one, returning the raw result otherwise.
    pub fn call_tool(&mut self, name: &str, arguments: Value) -> Result<Value> {
        self.require_initialized()?;

        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };
        let params = serde_json::to_value(&params).map_err(|e| {
            ClientError::malformed(format!("failed to encode tool call params: {e}"))
        })?;

        let result = self.send_request("tools/call", Some(params))?;
        tracing::debug!(tool = %name, "tool call succeeded");

        Ok(unwrap_structured_content(result))
    }

    /// List the server's declared tool catalog.
    pub fn list_tools(&mut self) -> Result<Vec<ToolInfo>> {
        self.require_initialized()?;

        let result = self.send_request("tools/list", None)?;
        let list: ListToolsResult = serde_json::from_value(result)
            .map_err(|e| ClientError::malformed(format!("invalid tools/list result: {e}")))?;

        tracing::debug!(tool_count = list.tools.len(), "listed tools");
        Ok(list.tools)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Check if the session holds a live connection.
    pub fn is_connected(&self) -> bool {
        self.state != SessionState::Disconnected
    }

    /// Check if the handshake has completed on the current connection.
    pub fn is_initialized(&self) -> bool {
        self.state == SessionState::Initialized
    }

    /// Server identity from the most recent successful handshake.
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    /// Protocol revision the server declared during the handshake.
    pub fn server_protocol_version(&self) -> Option<&str> {
        self.server_protocol_version.as_deref()
    }

    /// Compatibility warning recorded when the server's protocol revision
    /// differed from the client's. Non-fatal by design.
    pub fn version_warning(&self) -> Option<&str> {
        self.version_warning.as_deref()
    }

    /// The configuration this session was created with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn require_initialized(&self) -> Result<()> {
        match self.state {
            SessionState::Initialized => Ok(()),
            SessionState::Connected => Err(ClientError::NotInitialized),
            SessionState::Disconnected => Err(ClientError::NotConnected),
        }
    }

    /// Send a request, consuming one fresh request id.
    fn send_request(&mut self, method: &str, params: Option<Value>) -> Result<Value> {
        if self.transport.is_none() {
            return Err(ClientError::NotConnected);
        }

        let id = self.next_id;
        self.next_id += 1;

        let request = JsonRpcRequest::new(id, method, params);
        match self.transport.as_mut() {
            Some(transport) => transport.send_request(&request),
            None => Err(ClientError::NotConnected),
        }
    }

    /// Send a notification. Fire-and-forget: no read, no request id.
    fn send_notification(&mut self, method: &str, params: Option<Value>) -> Result<()> {
        let notification = JsonRpcNotification::new(method, params);
        match self.transport.as_mut() {
            Some(transport) => transport.send_notification(&notification),
            None => Err(ClientError::NotConnected),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("peer", &format!("{}:{}", self.config.host, self.config.port))
            .field("state", &self.state)
            .field("next_id", &self.next_id)
            .finish()
    }
}

fn unwrap_structured_content(result: Value) -> Value {
    match result {
        Value::Object(mut map) => match map.remove(STRUCTURED_CONTENT_KEY) {
            Some(inner) => inner,
            None => Value::Object(map),
        },
        other => other,
    }
}
