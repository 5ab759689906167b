//! Turns transport reads into complete lines.

use crate::error::{Error, Result};
use crate::irc::buffer::CursorBuffer;
use crate::irc::codec::{LineCodec, TERMINATOR};
use crate::irc::transport::Transport;
use tracing::{debug, trace, warn};

pub const DEFAULT_READ_CHUNK: usize = 4096;

/// Keepalive probe sent by the server. The framer answers it on the spot.
pub const PING_PREFIX: &str = "PING :";

#[derive(Debug, Clone, Copy)]
pub struct LineFramer {
    read_chunk: usize,
}

impl LineFramer {
    pub fn new(read_chunk: usize) -> Self {
        Self {
            read_chunk: read_chunk.max(1),
        }
    }

    /// Read until at least one whole line is available and push every line
    /// into `buffer`. Keepalive pings are answered before they are queued.
    ///
    /// Returns the number of lines pushed. A line that cannot be decoded is
    /// dropped; the lines around it are still pushed and the first decoding
    /// error is returned afterwards.
    pub fn fill(
        &self,
        transport: &mut dyn Transport,
        codec: &LineCodec,
        buffer: &mut CursorBuffer,
    ) -> Result<usize> {
        let mut raw = Vec::new();
        let mut chunk = vec![0u8; self.read_chunk];
        // A read may stop mid-line; keep going until the data ends on a terminator.
        while raw.last() != Some(&b'\n') {
            let n = transport.read(&mut chunk)?;
            if n == 0 {
                debug!(pending = raw.len(), "Peer closed the stream");
                return Err(Error::ConnectionClosed);
            }
            raw.extend_from_slice(&chunk[..n]);
        }

        let mut pushed = 0;
        let mut undecodable = None;
        for piece in raw.split(|b| *b == b'\n') {
            let piece = piece.strip_suffix(b"\r").unwrap_or(piece);
            if piece.is_empty() {
                continue;
            }
            let line = match codec.decode(piece) {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, bytes = piece.len(), "Dropping undecodable line");
                    undecodable.get_or_insert(e);
                    continue;
                }
            };
            trace!(line = %line, "<<");
            if let Some(payload) = line.strip_prefix(PING_PREFIX) {
                let pong = format!("PONG :{}{}", payload, TERMINATOR);
                transport.write_all(&codec.encode(&pong)?)?;
                trace!(payload, "Answered keepalive");
            }
            buffer.push(line);
            pushed += 1;
        }
        match undecodable {
            Some(e) => Err(e),
            None => Ok(pushed),
        }
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new(DEFAULT_READ_CHUNK)
    }
}
