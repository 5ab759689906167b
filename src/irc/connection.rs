//! Thread-safe handle to one IRC connection.
//!
//! Every operation takes the single engine lock, so a line is never read or
//! written by two callers at once and session updates are seen in wire
//! order.

use crate::config::{EngineConfig, ServerConfig};
use crate::error::Result;
use crate::irc::correlator::{ExpectOptions, Reply};
use crate::irc::engine::Engine;
use crate::irc::event::Event;
use crate::irc::session::SessionState;
use crate::irc::transport::{self, Transport};
use parking_lot::Mutex;
use std::time::Duration;
use tracing::info;

/// What command helpers need from a connection.
///
/// Helpers take `&dyn Wire` instead of a [`Connection`] so they can be
/// driven by any implementation.
pub trait Wire: Send + Sync {
    fn send(&self, line: &str) -> Result<()>;

    /// Send and raise a numeric error reply that arrives right away.
    fn send_checked(&self, line: &str) -> Result<()>;

    fn recv(&self, timeout: Option<Duration>) -> Result<Option<Event>>;

    fn expect(&self, tokens: &[&str], options: ExpectOptions) -> Result<Option<Reply>>;

    /// [`Wire::expect`] with a fallback reply for when the wait gives up.
    fn expect_or(&self, tokens: &[&str], options: ExpectOptions, default: Reply) -> Result<Reply> {
        Ok(self.expect(tokens, options)?.unwrap_or(default))
    }
}

pub struct Connection {
    engine: Mutex<Engine>,
}

impl Connection {
    pub fn new(transport: Box<dyn Transport>, nick: &str, config: &EngineConfig) -> Result<Self> {
        Ok(Self {
            engine: Mutex::new(Engine::new(transport, nick, config)?),
        })
    }

    /// Open a transport to `server`. Registration is left to the caller.
    pub fn connect(server: &ServerConfig, config: &EngineConfig) -> Result<Self> {
        let transport = transport::open(server)?;
        info!(host = %server.host, nick = %server.nickname, "Connected");
        Self::new(transport, &server.nickname, config)
    }

    pub fn send(&self, line: &str) -> Result<()> {
        self.engine.lock().send(line)
    }

    pub fn send_checked(&self, line: &str) -> Result<()> {
        self.engine.lock().send_checked(line)
    }

    /// Next event; `None` only when `timeout` is set and elapses.
    pub fn recv(&self, timeout: Option<Duration>) -> Result<Option<Event>> {
        self.engine.lock().recv(timeout)
    }

    pub fn expect(&self, tokens: &[&str], options: ExpectOptions) -> Result<Option<Reply>> {
        self.engine.lock().expect(tokens, options)
    }

    /// Unrecognized lines `recv` stepped over since the last call.
    pub fn take_skipped(&self) -> Vec<String> {
        self.engine.lock().take_skipped()
    }

    pub fn readable(&self, timeout: Duration) -> Result<bool> {
        self.engine.lock().readable(timeout)
    }

    /// Next raw line, bypassing the dispatcher.
    pub fn consume(&self) -> Result<String> {
        self.engine.lock().consume()
    }

    /// Make the last consumed line the next one read.
    pub fn stepback(&self) -> bool {
        self.engine.lock().stepback()
    }

    /// Queue the last consumed line again behind everything unread.
    pub fn stepback_append(&self) -> bool {
        self.engine.lock().stepback_append()
    }

    pub fn reset_buffer(&self) {
        self.engine.lock().reset_buffer();
    }

    pub fn session(&self) -> SessionState {
        self.engine.lock().session().clone()
    }

    pub fn current_nick(&self) -> String {
        self.engine.lock().session().current_nick.clone()
    }

    /// Record a nick accepted outside the event stream, e.g. during
    /// registration.
    pub fn set_nick(&self, nick: &str) {
        self.engine.lock().session_mut().current_nick = nick.to_string();
    }

    pub fn is_closed(&self) -> bool {
        self.engine.lock().is_closed()
    }

    pub fn close(&self) {
        self.engine.lock().close();
    }
}

impl Wire for Connection {
    fn send(&self, line: &str) -> Result<()> {
        Connection::send(self, line)
    }

    fn send_checked(&self, line: &str) -> Result<()> {
        Connection::send_checked(self, line)
    }

    fn recv(&self, timeout: Option<Duration>) -> Result<Option<Event>> {
        Connection::recv(self, timeout)
    }

    fn expect(&self, tokens: &[&str], options: ExpectOptions) -> Result<Option<Reply>> {
        Connection::expect(self, tokens, options)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.engine.get_mut().close();
    }
}
