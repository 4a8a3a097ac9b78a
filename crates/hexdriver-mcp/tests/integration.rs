//! Integration tests for the MCP client.
//!
//! These tests drive the client against a scripted stub server on a real
//! TCP socket to verify the full protocol flow: handshake, tool calls,
//! error recovery, framing faults, and the session state machine.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::JoinHandle;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};

use hexdriver_mcp::{ClientConfig, ClientError, Session, tools};

// ─────────────────────────────────────────────────────────────────────────────
// Scripted stub server
// ─────────────────────────────────────────────────────────────────────────────

/// What the stub sends back for one request frame. Notifications never
/// consume a script entry.
enum Reply {
    /// Respond with a result object, echoing the request id.
    Result(Value),
    /// Respond with an error object, echoing the request id.
    Error(Value),
    /// Respond with raw pre-framed text, verbatim.
    Raw(String),
    /// Swallow the request without responding.
    Silence,
    /// Close the connection without responding.
    Close,
}

/// Every payload one stub connection received, in arrival order.
#[derive(Debug, Default)]
struct ConnectionLog {
    frames: Vec<Value>,
}

impl ConnectionLog {
    fn methods(&self) -> Vec<&str> {
        self.frames
            .iter()
            .filter_map(|f| f.get("method").and_then(Value::as_str))
            .collect()
    }

    /// Ids of request frames only; notifications carry none.
    fn request_ids(&self) -> Vec<u64> {
        self.frames
            .iter()
            .filter_map(|f| f.get("id").and_then(Value::as_u64))
            .collect()
    }
}

struct StubServer {
    port: u16,
    handle: JoinHandle<Vec<ConnectionLog>>,
}

impl StubServer {
    /// Spawn a listener serving one script per expected connection.
    fn start(scripts: Vec<Vec<Reply>>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind stub listener");
        let port = listener.local_addr().expect("no local addr").port();

        let handle = std::thread::spawn(move || {
            let mut logs = Vec::new();
            for script in scripts {
                let (stream, _) = match listener.accept() {
                    Ok(conn) => conn,
                    Err(_) => break,
                };
                logs.push(serve_connection(stream, script));
            }
            logs
        });

        Self { port, handle }
    }

    /// A session pointed at this stub, with a short timeout.
    fn session(&self) -> Session {
        Session::new(
            ClientConfig::default()
                .with_port(self.port)
                .with_timeout_secs(1),
        )
    }

    /// Wait for the server thread and collect per-connection logs.
    fn finish(self) -> Vec<ConnectionLog> {
        self.handle.join().expect("stub server thread panicked")
    }
}

fn serve_connection(mut stream: TcpStream, script: Vec<Reply>) -> ConnectionLog {
    let mut replies = script.into_iter();
    let mut log = ConnectionLog::default();
    let mut buffer: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 1024];

    'serve: loop {
        let n = match stream.read(&mut chunk) {
            Ok(0) => break 'serve,
            Ok(n) => n,
            Err(_) => break 'serve,
        };
        buffer.extend_from_slice(&chunk[..n]);

        while let Some(pos) = buffer.iter().position(|&b| b == 0x00) {
            let frame: Vec<u8> = buffer.drain(..=pos).collect();
            let payload: Value =
                serde_json::from_slice(&frame[..frame.len() - 1]).expect("stub got invalid JSON");
            let id = payload.get("id").cloned();
            log.frames.push(payload);

            let Some(id) = id else { continue };

            match replies.next() {
                Some(Reply::Result(result)) => {
                    let body = json!({"jsonrpc": "2.0", "id": id, "result": result});
                    write_frame(&mut stream, &body.to_string());
                }
                Some(Reply::Error(error)) => {
                    let body = json!({"jsonrpc": "2.0", "id": id, "error": error});
                    write_frame(&mut stream, &body.to_string());
                }
                Some(Reply::Raw(raw)) => write_frame(&mut stream, &raw),
                Some(Reply::Close) => break 'serve,
                Some(Reply::Silence) | None => {}
            }
        }
    }

    log
}

fn write_frame(stream: &mut TcpStream, payload: &str) {
    let mut frame = payload.as_bytes().to_vec();
    frame.push(0x00);
    stream.write_all(&frame).expect("stub failed to write frame");
}

fn init_result() -> Value {
    json!({
        "protocolVersion": "2025-06-18",
        "serverInfo": {"name": "stub", "version": "0.1"}
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Handshake
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_initialize_handshake() {
    let stub = StubServer::start(vec![vec![Reply::Result(init_result())]]);
    let mut session = stub.session();

    session.connect().expect("failed to connect");
    let server = session.initialize().expect("failed to initialize");
    assert_eq!(server.name, "stub");
    assert_eq!(server.version, "0.1");
    assert!(session.is_initialized());
    assert_eq!(session.server_protocol_version(), Some("2025-06-18"));
    assert!(session.version_warning().is_none());
    session.disconnect();

    let logs = stub.finish();
    assert_eq!(logs.len(), 1);

    // Exactly two frames: the request and the fire-and-forget notification.
    let frames = &logs[0].frames;
    assert_eq!(frames.len(), 2);

    assert_eq!(frames[0]["method"], "initialize");
    assert_eq!(frames[0]["id"], 1);
    assert_eq!(frames[0]["params"]["protocolVersion"], "2025-06-18");
    assert_eq!(frames[0]["params"]["clientInfo"]["name"], "hexdriver");

    assert_eq!(frames[1]["method"], "notifications/initialized");
    assert!(
        frames[1].get("id").is_none(),
        "notification must not carry an id"
    );
}

#[test]
fn test_protocol_version_mismatch_is_nonfatal() {
    let stub = StubServer::start(vec![vec![Reply::Result(json!({
        "protocolVersion": "2024-11-05",
        "serverInfo": {"name": "stub", "version": "0.1"}
    }))]]);
    let mut session = stub.session();

    session.connect().expect("failed to connect");
    session.initialize().expect("mismatch must not fail initialize");

    assert!(session.is_initialized());
    assert_eq!(session.server_protocol_version(), Some("2024-11-05"));
    let warning = session.version_warning().expect("expected a version warning");
    assert!(warning.contains("2025-06-18"));
    assert!(warning.contains("2024-11-05"));

    session.disconnect();
    stub.finish();
}

#[test]
fn test_initialize_twice_is_idempotent() {
    let stub = StubServer::start(vec![vec![Reply::Result(init_result())]]);
    let mut session = stub.session();

    session.connect().expect("failed to connect");
    session.initialize().expect("failed to initialize");
    let server = session.initialize().expect("second initialize should be a no-op");
    assert_eq!(server.name, "stub");
    session.disconnect();

    // Only one initialize request reached the wire.
    let logs = stub.finish();
    assert_eq!(logs[0].methods(), vec!["initialize", "notifications/initialized"]);
}

// ─────────────────────────────────────────────────────────────────────────────
// State-machine guards
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_call_before_initialize_touches_no_socket() {
    let stub = StubServer::start(vec![vec![]]);
    let mut session = stub.session();

    session.connect().expect("failed to connect");

    let err = session.call_tool("open_file", json!({})).unwrap_err();
    assert!(matches!(err, ClientError::NotInitialized));

    let err = session.list_tools().unwrap_err();
    assert!(matches!(err, ClientError::NotInitialized));

    session.disconnect();

    // The guard fired locally: nothing was written to the wire.
    let logs = stub.finish();
    assert!(logs[0].frames.is_empty());
}

#[test]
fn test_call_before_connect_fails() {
    let mut session = Session::new(ClientConfig::default());

    let err = session.call_tool("open_file", json!({})).unwrap_err();
    assert!(matches!(err, ClientError::NotConnected));

    let err = session.initialize().unwrap_err();
    assert!(matches!(err, ClientError::NotConnected));
}

#[test]
fn test_disconnect_always_safe() {
    let stub = StubServer::start(vec![vec![Reply::Result(init_result())]]);
    let mut session = stub.session();

    // Safe before connect.
    session.disconnect();

    session.connect().expect("failed to connect");
    session.initialize().expect("failed to initialize");

    // Safe after initialize, and twice in a row.
    session.disconnect();
    session.disconnect();
    assert!(!session.is_connected());

    stub.finish();
}

// ─────────────────────────────────────────────────────────────────────────────
// Request ids
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_request_ids_strictly_increase_across_reconnect() {
    let stub = StubServer::start(vec![
        vec![
            Reply::Result(init_result()),
            Reply::Result(json!({"selected_handle": 1})),
        ],
        vec![
            Reply::Result(init_result()),
            Reply::Result(json!({"selected_handle": 1})),
        ],
    ]);
    let mut session = stub.session();

    session.connect().expect("connect 1");
    session.initialize().expect("initialize 1");
    tools::select_data_source(&mut session, 1).expect("select 1");
    session.disconnect();

    session.connect().expect("connect 2");
    session.initialize().expect("initialize 2");
    tools::select_data_source(&mut session, 1).expect("select 2");
    session.disconnect();

    let logs = stub.finish();
    // The counter does not reset on disconnect/connect, and the
    // notification in each handshake consumed no id.
    assert_eq!(logs[0].request_ids(), vec![1, 2]);
    assert_eq!(logs[1].request_ids(), vec![3, 4]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Remote errors and protocol faults
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_remote_error_leaves_connection_usable() {
    let stub = StubServer::start(vec![vec![
        Reply::Result(init_result()),
        Reply::Error(json!({"code": -32601, "message": "Method not found"})),
        Reply::Result(json!({"selected_handle": 2})),
    ]]);
    let mut session = stub.session();

    session.connect().expect("failed to connect");
    session.initialize().expect("failed to initialize");

    let err = session.call_tool("nonexistent", json!({})).unwrap_err();
    match &err {
        ClientError::Remote { code, message, .. } => {
            assert_eq!(*code, -32601);
            assert_eq!(message, "Method not found");
        }
        other => panic!("expected Remote error, got {other:?}"),
    }
    assert!(err.is_recoverable());

    // Same connection, next call succeeds.
    let handle = tools::select_data_source(&mut session, 2).expect("follow-up call failed");
    assert_eq!(handle, 2);
    session.disconnect();

    let logs = stub.finish();
    assert_eq!(logs.len(), 1, "both calls must share one connection");
}

#[test]
fn test_tool_defined_error_code_is_remote() {
    let stub = StubServer::start(vec![vec![
        Reply::Result(init_result()),
        Reply::Error(json!({"code": 1000, "message": "no data source selected", "data": {"hint": "open a file first"}})),
    ]]);
    let mut session = stub.session();

    session.connect().expect("failed to connect");
    session.initialize().expect("failed to initialize");

    let err = session.call_tool("read_data", json!({"address": 0, "size": 16})).unwrap_err();
    match err {
        ClientError::Remote { code, data, .. } => {
            assert_eq!(code, 1000);
            assert_eq!(data, Some(json!({"hint": "open a file first"})));
        }
        other => panic!("expected Remote error, got {other:?}"),
    }

    session.disconnect();
    stub.finish();
}

#[test]
fn test_garbage_response_is_malformed_envelope() {
    let stub = StubServer::start(vec![vec![
        Reply::Result(init_result()),
        Reply::Raw("this is not json".to_string()),
    ]]);
    let mut session = stub.session();

    session.connect().expect("failed to connect");
    session.initialize().expect("failed to initialize");

    let err = session.list_tools().unwrap_err();
    assert!(matches!(err, ClientError::MalformedEnvelope(_)));

    session.disconnect();
    stub.finish();
}

#[test]
fn test_result_and_error_together_is_malformed_envelope() {
    let both = r#"{"jsonrpc":"2.0","id":2,"result":{},"error":{"code":1,"message":"x"}}"#;
    let stub = StubServer::start(vec![vec![
        Reply::Result(init_result()),
        Reply::Raw(both.to_string()),
    ]]);
    let mut session = stub.session();

    session.connect().expect("failed to connect");
    session.initialize().expect("failed to initialize");

    let err = session.list_tools().unwrap_err();
    assert!(matches!(err, ClientError::MalformedEnvelope(_)));

    session.disconnect();
    stub.finish();
}

#[test]
fn test_server_closing_mid_call_is_connection_closed() {
    let stub = StubServer::start(vec![vec![Reply::Result(init_result()), Reply::Close]]);
    let mut session = stub.session();

    session.connect().expect("failed to connect");
    session.initialize().expect("failed to initialize");

    let err = session.list_tools().unwrap_err();
    assert!(matches!(err, ClientError::ConnectionClosed));

    session.disconnect();
    stub.finish();
}

#[test]
fn test_unanswered_call_times_out() {
    let stub = StubServer::start(vec![vec![Reply::Result(init_result()), Reply::Silence]]);
    let mut session = stub.session();

    session.connect().expect("failed to connect");
    session.initialize().expect("failed to initialize");

    let err = session.list_tools().unwrap_err();
    assert!(matches!(err, ClientError::TimedOut));

    // A timed-out connection is indeterminate; tear it down.
    session.disconnect();
    stub.finish();
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool wrappers
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_list_tools_returns_catalog() {
    let stub = StubServer::start(vec![vec![
        Reply::Result(init_result()),
        Reply::Result(json!({"tools": [
            {
                "name": "open_file",
                "description": "Open a file as a data source",
                "inputSchema": {
                    "type": "object",
                    "properties": {"file_path": {"type": "string"}},
                    "required": ["file_path"]
                }
            },
            {"name": "read_data"}
        ]})),
    ]]);
    let mut session = stub.session();

    session.connect().expect("failed to connect");
    session.initialize().expect("failed to initialize");

    let catalog = session.list_tools().expect("failed to list tools");
    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog[0].name, "open_file");
    assert!(catalog[0].input_schema.is_some());
    assert_eq!(catalog[1].name, "read_data");
    assert!(catalog[1].description.is_none());
    session.disconnect();

    // tools/list goes out without a params key at all.
    let logs = stub.finish();
    let list_frame = &logs[0].frames[2];
    assert_eq!(list_frame["method"], "tools/list");
    assert!(list_frame.get("params").is_none());
}

#[test]
fn test_open_file_unwraps_structured_content() {
    let stub = StubServer::start(vec![vec![
        Reply::Result(init_result()),
        Reply::Result(json!({"structuredContent": {
            "name": "firmware.bin",
            "type": "file",
            "size": 4096,
            "is_writable": false,
            "handle": 2
        }})),
    ]]);
    let mut session = stub.session();

    session.connect().expect("failed to connect");
    session.initialize().expect("failed to initialize");

    let ds = tools::open_file(&mut session, "/tmp/firmware.bin").expect("open_file failed");
    assert_eq!(ds.name, "firmware.bin");
    assert_eq!(ds.kind, "file");
    assert_eq!(ds.size, 4096);
    assert!(!ds.is_writable);
    assert_eq!(ds.handle, 2);
    session.disconnect();

    let logs = stub.finish();
    let call_frame = &logs[0].frames[2];
    assert_eq!(call_frame["method"], "tools/call");
    assert_eq!(call_frame["params"]["name"], "open_file");
    assert_eq!(call_frame["params"]["arguments"]["file_path"], "/tmp/firmware.bin");
}

#[test]
fn test_list_open_data_sources() {
    let stub = StubServer::start(vec![vec![
        Reply::Result(init_result()),
        Reply::Result(json!({"data_sources": [
            {"name": "firmware.bin", "type": "file", "size": 4096, "is_writable": false, "handle": 1},
            {"name": "scratch", "type": "memory", "size": 128, "is_writable": true, "handle": 2}
        ]})),
    ]]);
    let mut session = stub.session();

    session.connect().expect("failed to connect");
    session.initialize().expect("failed to initialize");

    let sources = tools::list_open_data_sources(&mut session).expect("list failed");
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0].handle, 1);
    assert_eq!(sources[1].name, "scratch");
    assert!(sources[1].is_writable);

    session.disconnect();
    stub.finish();
}

#[test]
fn test_read_data_round_trip() {
    let bytes: Vec<u8> = (0u8..=255).collect();
    let stub = StubServer::start(vec![vec![
        Reply::Result(init_result()),
        Reply::Result(json!({"data": BASE64.encode(&bytes), "data_size": 256})),
    ]]);
    let mut session = stub.session();

    session.connect().expect("failed to connect");
    session.initialize().expect("failed to initialize");

    let data = tools::read_data(&mut session, 0x1000, 256).expect("read_data failed");
    assert_eq!(data, bytes);
    session.disconnect();

    let logs = stub.finish();
    let call_frame = &logs[0].frames[2];
    assert_eq!(call_frame["params"]["arguments"]["address"], 0x1000);
    assert_eq!(call_frame["params"]["arguments"]["size"], 256);
}

#[test]
fn test_read_data_truncation_returns_short_bytes() {
    // End-of-file truncation: 256 requested, 100 returned. A warning, not
    // an error.
    let bytes: Vec<u8> = (0u8..100).collect();
    let stub = StubServer::start(vec![vec![
        Reply::Result(init_result()),
        Reply::Result(json!({"data": BASE64.encode(&bytes), "data_size": 100})),
    ]]);
    let mut session = stub.session();

    session.connect().expect("failed to connect");
    session.initialize().expect("failed to initialize");

    let data = tools::read_data(&mut session, 0, 256).expect("short read must not fail");
    assert_eq!(data.len(), 100);
    assert_eq!(data, bytes);

    session.disconnect();
    stub.finish();
}

#[test]
fn test_pattern_execution_flow() {
    let stub = StubServer::start(vec![vec![
        Reply::Result(init_result()),
        Reply::Result(json!({"selected_handle": 2})),
        Reply::Result(json!({"result_code": 1})),
        Reply::Result(json!({"content": "error: unknown type 'u33'"})),
    ]]);
    let mut session = stub.session();

    session.connect().expect("failed to connect");
    session.initialize().expect("failed to initialize");

    let handle = tools::select_data_source(&mut session, 2).expect("select failed");
    assert_eq!(handle, 2);

    // Non-zero code: the fault detail is in the console, not the code.
    let code = tools::execute_pattern_code(&mut session, "u33 x @ 0x00;").expect("execute failed");
    assert_eq!(code, 1);

    let console = tools::get_pattern_console_content(&mut session).expect("console failed");
    assert!(console.contains("unknown type"));

    session.disconnect();
    stub.finish();
}

#[test]
fn test_get_patterns_returns_structured_value() {
    let stub = StubServer::start(vec![vec![
        Reply::Result(init_result()),
        Reply::Result(json!({"patterns": {"header": {"magic": 0x464C457F_u32, "version": 1}}})),
    ]]);
    let mut session = stub.session();

    session.connect().expect("failed to connect");
    session.initialize().expect("failed to initialize");

    let patterns = tools::get_patterns(&mut session).expect("get_patterns failed");
    assert_eq!(patterns["header"]["version"], 1);

    session.disconnect();
    stub.finish();
}
