//! Typed wrappers for the hex editor's tool surface.
//!
//! Each function shapes one `tools/call` operation: it validates and
//! encodes the arguments, invokes [`Session::call_tool`], and decodes the
//! result into a typed value. No protocol knowledge lives here beyond the
//! generic call.
//!
//! Read and pattern operations act on the *currently selected* data
//! source — selection is server-side state shared by the whole
//! connection, so select-then-read sequences from different callers must
//! be serialized externally (see [`crate::session`]).

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{ClientError, Result};
use crate::session::Session;

/// Per-call ceiling the server applies to `read_data` requests.
pub const MAX_READ_SIZE: u64 = 16 * 1024 * 1024;

/// An open data source (file or byte buffer) managed by the remote tool.
///
/// The handle is assigned by the server and opaque to the client — it is
/// only ever routed back, never interpreted or allocated locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSource {
    /// Display name of the data source.
    #[serde(default)]
    pub name: String,
    /// Kind tag (e.g. file-backed or in-memory).
    #[serde(default, rename = "type")]
    pub kind: String,
    /// Length in bytes.
    #[serde(default)]
    pub size: u64,
    /// Whether the source accepts writes.
    #[serde(default)]
    pub is_writable: bool,
    /// Opaque server-assigned handle.
    #[serde(default = "unassigned_handle")]
    pub handle: i64,
}

fn unassigned_handle() -> i64 {
    -1
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Open a file in the remote tool.
///
/// The first operation to perform before reading or analyzing anything;
/// the file stays open on the remote side until closed there. Fails with
/// [`ClientError::Remote`] if the path cannot be opened (invalid path,
/// permissions, unsupported format).
pub fn open_file(session: &mut Session, file_path: &str) -> Result<DataSource> {
    let result = session.call_tool("open_file", json!({ "file_path": file_path }))?;
    serde_json::from_value(result)
        .map_err(|e| ClientError::malformed(format!("invalid open_file result: {e}")))
}

/// List all data sources currently open in the remote tool.
pub fn list_open_data_sources(session: &mut Session) -> Result<Vec<DataSource>> {
    let result = session.call_tool("list_open_data_sources", json!({}))?;
    let sources = result
        .get("data_sources")
        .cloned()
        .unwrap_or_else(|| json!([]));
    serde_json::from_value(sources)
        .map_err(|e| ClientError::malformed(format!("invalid data source list: {e}")))
}

/// Select a data source by handle for subsequent operations.
///
/// Returns the handle the server confirmed as selected (the previous
/// selection if the requested handle was rejected). Selection is shared
/// across all calls on the connection.
pub fn select_data_source(session: &mut Session, handle: i64) -> Result<i64> {
    let result = session.call_tool("select_data_source", json!({ "handle": handle }))?;
    Ok(result
        .get("selected_handle")
        .and_then(Value::as_i64)
        .unwrap_or(-1))
}

/// Read bytes from the currently selected data source.
///
/// `size` is advisory: the server caps it at [`MAX_READ_SIZE`], and a read
/// past end-of-file legitimately returns fewer bytes. Both cases surface
/// as warnings, never errors — exactly the bytes the server returned are
/// handed back, base64-decoded.
pub fn read_data(session: &mut Session, address: u64, size: u64) -> Result<Vec<u8>> {
    if size > MAX_READ_SIZE {
        tracing::warn!(
            requested = size,
            cap = MAX_READ_SIZE,
            "read size exceeds per-call ceiling, server will cap it"
        );
    }

    let result = session.call_tool("read_data", json!({ "address": address, "size": size }))?;

    let encoded = result.get("data").and_then(Value::as_str).unwrap_or("");
    let returned = result
        .get("data_size")
        .and_then(Value::as_u64)
        .unwrap_or(0);

    if returned != size {
        tracing::warn!(requested = size, returned, "short read from data source");
    }

    BASE64
        .decode(encoded)
        .map_err(|e| ClientError::malformed(format!("invalid base64 in read_data result: {e}")))
}

/// Execute pattern language code against the currently selected data source.
///
/// The source text is passed through opaquely; its syntax and semantics
/// are the remote tool's concern. Returns the result code: 0 on success,
/// anything else means the script raised a runtime fault — the failure
/// detail is in the console output ([`get_pattern_console_content`]), not
/// in the code.
pub fn execute_pattern_code(session: &mut Session, source_code: &str) -> Result<i64> {
    let result = session.call_tool("execute_pattern_code", json!({ "source_code": source_code }))?;

    let result_code = result
        .get("result_code")
        .and_then(Value::as_i64)
        .unwrap_or(-1);

    if result_code == 0 {
        tracing::debug!("pattern executed successfully");
    } else {
        tracing::warn!(result_code, "pattern execution failed");
    }

    Ok(result_code)
}

/// Retrieve the patterns produced by the last successful pattern execution.
///
/// The value is an opaque structured tree; its shape is defined by the
/// executed pattern code.
pub fn get_patterns(session: &mut Session) -> Result<Value> {
    let result = session.call_tool("get_patterns", json!({}))?;
    Ok(result.get("patterns").cloned().unwrap_or_else(|| json!({})))
}

/// Get the console output of the last pattern execution.
///
/// Holds script print output on success, or the error messages when
/// execution failed.
pub fn get_pattern_console_content(session: &mut Session) -> Result<String> {
    let result = session.call_tool("get_pattern_console_content", json!({}))?;
    Ok(result
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string())
}
