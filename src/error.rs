//! Error types for the engine.
//!
//! Transport failures are fatal and surfaced as-is. Numeric error replies
//! from the server become [`ProtocolError`] values carrying the code and the
//! context parsed from the line.

use crate::irc::errors::ErrorKind;
use std::fmt;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// I/O failure on the underlying stream. The connection is presumed dead.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The peer closed the stream.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// The server answered with a recognized numeric error.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Neither the primary nor the fallback encoding could handle the data.
    #[error("could not {direction} data as {encoding}")]
    Encoding {
        direction: &'static str,
        encoding: &'static str,
    },

    #[error("unknown encoding: {0}")]
    UnknownEncoding(String),

    #[error("tls error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("invalid server name: {0}")]
    InvalidServerName(String),
}

impl Error {
    /// Returns the numeric error kind if this is a protocol error.
    pub fn protocol_kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Protocol(e) => Some(e.kind),
            _ => None,
        }
    }
}

/// A numeric error reply, e.g. `433 ERR_NICKNAMEINUSE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolError {
    pub code: String,
    pub kind: ErrorKind,
    /// First parameter after our own nick, usually the offending nick or channel.
    pub target: Option<String>,
    /// Trailing human-readable text.
    pub message: String,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IRC error {} ({})", self.code, self.kind.name())?;
        if let Some(target) = &self.target {
            write!(f, " for {}", target)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ProtocolError {}
