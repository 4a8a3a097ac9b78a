//! Wire framing for the hex editor's MCP endpoint.
//!
//! Messages are UTF-8 JSON terminated by a single 0x00 byte. There is no
//! length prefix; the terminator is unambiguous because JSON text encoded
//! as UTF-8 can never contain a raw null byte.

use std::io::Read;

use crate::error::{ClientError, Result};

/// Byte marking end-of-message on the wire.
pub const FRAME_TERMINATOR: u8 = 0x00;

/// Read buffer size for the frame accumulator.
const READ_CHUNK_SIZE: usize = 1024;

/// Encode a payload into a delimited wire frame.
///
/// Appends exactly one terminator byte. The payload must not itself contain
/// the terminator; serialized JSON guarantees this, so it is not checked.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + 1);
    frame.extend_from_slice(payload);
    frame.push(FRAME_TERMINATOR);
    frame
}

/// Read one frame from `reader`, accumulating chunks until the terminator.
///
/// Returns the payload bytes before the first terminator. Any bytes after
/// it in the same buffer are dropped: the protocol is strictly one message
/// per round trip, so nothing else can legally be in flight.
///
/// Fails with [`ClientError::ConnectionClosed`] if the stream ends before a
/// terminator is seen, and with [`ClientError::TimedOut`] if a read blocks
/// past the socket timeout.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        let n = reader.read(&mut chunk).map_err(ClientError::from_socket)?;
        if n == 0 {
            return Err(ClientError::ConnectionClosed);
        }
        buffer.extend_from_slice(&chunk[..n]);

        if let Some(pos) = buffer.iter().position(|&b| b == FRAME_TERMINATOR) {
            buffer.truncate(pos);
            return Ok(buffer);
        }
    }
}
