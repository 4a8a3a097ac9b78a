//! MCP (Model Context Protocol) client for driving a hex editor over TCP.
//!
//! This crate lets an external process remote-control an interactive
//! binary-analysis tool: open files, enumerate and select data sources,
//! read raw bytes, run pattern language code, and fetch results and
//! console output.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  tools       typed wrappers (open_file, read_data, ...)     │
//! └─────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Session     state machine, request ids, tools/call         │
//! └─────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Transport   blocking TCP, one request in flight at a time  │
//! └─────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  framing     JSON-RPC 2.0 payloads, 0x00-terminated frames  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use hexdriver_mcp::{ClientConfig, Session, tools};
//!
//! let mut session = Session::new(ClientConfig::default());
//! session.connect()?;
//! let server = session.initialize()?;
//! println!("connected to {} v{}", server.name, server.version);
//!
//! let ds = tools::open_file(&mut session, "/path/to/firmware.bin")?;
//! tools::select_data_source(&mut session, ds.handle)?;
//! let header = tools::read_data(&mut session, 0, 256)?;
//! println!("magic: {:02x?}", &header[..4]);
//!
//! session.disconnect();
//! ```
//!
//! # Wire protocol
//!
//! JSON-RPC 2.0 over a persistent TCP socket (default `127.0.0.1:19743`),
//! each message terminated by a single null byte:
//!
//! ```text
//! {"jsonrpc":"2.0","id":1,"method":"initialize","params":{...}}\x00
//! ```
//!
//! The protocol flow is:
//! 1. Client connects and sends `initialize` with its protocol revision
//! 2. Server responds with its revision and identity
//! 3. Client sends `notifications/initialized`
//! 4. Client can now call `tools/list` and `tools/call`
//!
//! Requests are strictly sequential: each call blocks until its response
//! frame arrives or the socket timeout fires. A timed-out connection must
//! be torn down, never reused.

pub mod config;
pub mod error;
pub mod framing;
pub mod protocol;
pub mod session;
pub mod tools;
pub mod transport;

// Re-export main types
pub use config::{
    ClientConfig, ConfigError, load_config, load_config_file, load_config_with_options,
    user_config_path,
};
pub use error::{ClientError, Result};
pub use protocol::{
    CallToolParams, ClientInfo, InitializeParams, InitializeResult, JSONRPC_VERSION, JsonRpcError,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListToolsResult, PROTOCOL_VERSION,
    RequestId, ServerInfo, ToolInfo,
};
pub use session::{Session, SessionState};
pub use tools::{DataSource, MAX_READ_SIZE};
pub use transport::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_TIMEOUT, Transport};
