//! Newline-delimited framing over a byte stream.
//!
//! Each logical message is one JSON document followed by a single `\n`.
//! JSON string escaping guarantees the delimiter never occurs inside a
//! serialized payload, so splitting on it is always safe. The decoder keeps
//! the trailing fragment of each chunk and prefixes it to the next one;
//! a line that fails to parse costs exactly that one message and never
//! desynchronizes the frames after it.

use crate::error::NetError;
use crate::protocol::Message;
use log::debug;

/// Read chunk size for both sides of the connection. A single encoded
/// message (in practice the map document) must fit in one chunk.
pub const READ_CHUNK: usize = 262_144;

/// Serializes one message and appends the frame delimiter.
pub fn encode(message: &Message) -> Result<Vec<u8>, NetError> {
    let mut bytes = serde_json::to_vec(message)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Stateful decoder for one receive direction of one session.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and drains every complete frame from the buffer.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Message> {
        self.buffer.extend_from_slice(chunk);

        let mut messages = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = &line[..line.len() - 1];
            if line.is_empty() {
                continue;
            }
            match serde_json::from_slice::<Message>(line) {
                Ok(message) => messages.push(message),
                Err(e) => debug!("discarding malformed frame: {}", e),
            }
        }
        messages
    }

    /// Bytes of the incomplete trailing frame, if any.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}
