//! The unlocked core of one connection: transport, framer, line buffer and
//! session. [`crate::irc::connection::Connection`] puts it behind one lock.

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::irc::buffer::CursorBuffer;
use crate::irc::codec::{escape_line, LineCodec, TERMINATOR};
use crate::irc::dispatch::{dispatch, protocol_error, Dispatch};
use crate::irc::event::Event;
use crate::irc::framer::{LineFramer, PING_PREFIX};
use crate::irc::session::SessionState;
use crate::irc::transport::Transport;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

pub struct Engine {
    transport: Box<dyn Transport>,
    codec: LineCodec,
    framer: LineFramer,
    buffer: CursorBuffer,
    session: SessionState,
    max_skips: usize,
    /// Unrecognized lines `recv` stepped over, oldest first.
    skipped: VecDeque<String>,
    skipped_limit: usize,
    error_check_wait: Duration,
    closed: bool,
}

impl Engine {
    pub fn new(transport: Box<dyn Transport>, nick: &str, config: &EngineConfig) -> Result<Self> {
        Ok(Self {
            transport,
            codec: LineCodec::new(&config.encoding, &config.fallback_encoding)?,
            framer: LineFramer::new(config.read_chunk),
            buffer: CursorBuffer::new(config.buffer_capacity),
            session: SessionState::new(nick),
            max_skips: config.max_skips.max(1),
            skipped: VecDeque::new(),
            skipped_limit: config.buffer_capacity.max(1),
            error_check_wait: config.error_check_wait(),
            closed: false,
        })
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionState {
        &mut self.session
    }

    pub fn buffer(&self) -> &CursorBuffer {
        &self.buffer
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn send(&mut self, text: &str) -> Result<()> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        let bytes = self.codec.encode(&format!("{}{}", escape_line(text), TERMINATOR))?;
        trace!(line = text, ">>");
        self.transport.write_all(&bytes)?;
        Ok(())
    }

    /// Send, then give the server a short window to reject the line. An
    /// immediate numeric error is raised; any other line is left unread.
    pub fn send_checked(&mut self, text: &str) -> Result<()> {
        self.send(text)?;
        if self.readable(self.error_check_wait)? {
            if let Some(line) = self.try_consume()? {
                if let Some(err) = protocol_error(&line) {
                    debug!(code = %err.code, line = text, "Sent line was rejected");
                    return Err(err.into());
                }
                self.buffer.stepback();
            }
        }
        Ok(())
    }

    /// True if a line is buffered or the transport becomes readable within
    /// `timeout`.
    pub fn readable(&mut self, timeout: Duration) -> Result<bool> {
        while let Some(line) = self.buffer.peek() {
            if line.starts_with(PING_PREFIX) {
                self.buffer.next_unread();
            } else {
                return Ok(true);
            }
        }
        if self.closed {
            return Ok(false);
        }
        Ok(self.transport.poll_readable(timeout)?)
    }

    /// Next unread line, reading from the transport as needed.
    pub fn consume(&mut self) -> Result<String> {
        loop {
            if let Some(line) = self.pop_unread() {
                return Ok(line);
            }
            self.fill()?;
        }
    }

    /// Like [`Engine::consume`], but returns `None` instead of waiting for
    /// the transport.
    pub fn try_consume(&mut self) -> Result<Option<String>> {
        loop {
            if let Some(line) = self.pop_unread() {
                return Ok(Some(line));
            }
            if self.closed || !self.transport.poll_readable(Duration::ZERO)? {
                return Ok(None);
            }
            self.fill()?;
        }
    }

    pub fn stepback(&mut self) -> bool {
        self.buffer.stepback()
    }

    pub fn stepback_append(&mut self) -> bool {
        self.buffer.stepback_append()
    }

    /// Make `lines` the next ones read, in order, ahead of anything
    /// already buffered.
    pub fn requeue(&mut self, lines: Vec<String>) {
        self.buffer.insert_unread(lines);
    }

    pub fn reset_buffer(&mut self) {
        self.buffer.reset();
    }

    fn pop_unread(&mut self) -> Option<String> {
        if self.buffer.needs_compaction() {
            self.buffer.compact();
        }
        // Pings were answered when they were framed.
        while let Some(line) = self.buffer.next_unread() {
            if !line.starts_with(PING_PREFIX) {
                return Some(line);
            }
        }
        None
    }

    fn fill(&mut self) -> Result<usize> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        self.framer
            .fill(self.transport.as_mut(), &self.codec, &mut self.buffer)
    }

    /// Next event, or `None` if nothing arrives within `timeout`.
    ///
    /// Unrecognized lines followed by more pending data are stepped over.
    /// They are not dispatched again; [`Engine::take_skipped`] hands them
    /// out. The last unrecognized line before the wire goes quiet, or the
    /// one that hits `max_skips`, is returned as [`Event::Unknown`].
    pub fn recv(&mut self, timeout: Option<Duration>) -> Result<Option<Event>> {
        let mut skipped = 0;
        loop {
            if let Some(timeout) = timeout {
                if !self.readable(timeout)? {
                    return Ok(None);
                }
            }
            let line = self.consume()?;
            match dispatch(&line, &mut self.session)? {
                Dispatch::Event(event) => return Ok(Some(event)),
                Dispatch::Shutdown(event) => {
                    info!("Server ended the session");
                    self.close();
                    return Ok(Some(event));
                }
                Dispatch::Absorbed => {}
                Dispatch::Unrecognized => {
                    skipped += 1;
                    if skipped >= self.max_skips || !self.readable(Duration::ZERO)? {
                        return Ok(Some(Event::Unknown { line }));
                    }
                    debug!(line = %line, skipped, "Skipping unrecognized line");
                    if self.skipped.len() >= self.skipped_limit {
                        self.skipped.pop_front();
                    }
                    self.skipped.push_back(line);
                }
            }
        }
    }

    /// Drain the lines `recv` stepped over, in arrival order.
    pub fn take_skipped(&mut self) -> Vec<String> {
        self.skipped.drain(..).collect()
    }

    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.transport.shutdown() {
            warn!(error = %e, "Transport shutdown failed");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::irc::transport::{MemoryHandle, MemoryTransport};

    pub(crate) fn engine() -> (Engine, MemoryHandle) {
        let (transport, handle) = MemoryTransport::new();
        let engine = Engine::new(Box::new(transport), "me", &EngineConfig::default()).unwrap();
        (engine, handle)
    }

    #[test]
    fn test_consume_fifo_then_refill() {
        let (mut engine, handle) = engine();
        handle.feed("a\r\nb\r\n");
        handle.feed("c\r\n");
        assert_eq!(engine.consume().unwrap(), "a");
        assert_eq!(engine.consume().unwrap(), "b");
        assert_eq!(engine.consume().unwrap(), "c");
        assert!(matches!(engine.consume(), Err(Error::ConnectionClosed)));
    }

    #[test]
    fn test_consume_skips_pings() {
        let (mut engine, handle) = engine();
        handle.feed("PING :srv\r\n:a!u@h PRIVMSG me :hi\r\n");
        assert_eq!(engine.consume().unwrap(), ":a!u@h PRIVMSG me :hi");
        assert_eq!(handle.written_lines(), vec!["PONG :srv"]);
    }

    #[test]
    fn test_buffer_is_compacted_after_capacity() {
        let (mut engine, handle) = engine();
        let burst: String = (0..199).map(|i| format!("line{i}\r\n")).collect();
        handle.feed(burst);
        for i in 0..199 {
            assert_eq!(engine.consume().unwrap(), format!("line{i}"));
        }
        assert_eq!(engine.buffer().index(), 199);
        handle.feed("fresh\r\n");
        assert_eq!(engine.consume().unwrap(), "fresh");
        assert_eq!(engine.buffer().index(), 1);
        assert_eq!(engine.buffer().len(), 1);
    }

    #[test]
    fn test_unread_lines_survive_compaction() {
        let (mut engine, handle) = engine();
        let burst: String = (0..250).map(|i| format!("line{i}\r\n")).collect();
        handle.feed(burst);
        for i in 0..250 {
            assert_eq!(engine.consume().unwrap(), format!("line{i}"));
        }
    }

    #[test]
    fn test_send_escapes_line_breaks() {
        let (mut engine, handle) = engine();
        engine.send("PRIVMSG #x :one\r\nQUIT").unwrap();
        assert_eq!(handle.written(), "PRIVMSG #x :one\\r\\nQUIT\r\n");
    }

    #[test]
    fn test_send_checked_raises_immediate_error() {
        let (mut engine, handle) = engine();
        handle.feed(":srv 403 me #nope :No such channel\r\n");
        let err = engine.send_checked("PART #nope").unwrap_err();
        assert_eq!(err.protocol_kind(), Some(crate::irc::errors::ErrorKind::NoSuchChannel));
    }

    #[test]
    fn test_send_checked_leaves_other_lines() {
        let (mut engine, handle) = engine();
        handle.feed(":a!u@h PRIVMSG me :hi\r\n");
        engine.send_checked("PRIVMSG a :hello").unwrap();
        assert_eq!(engine.consume().unwrap(), ":a!u@h PRIVMSG me :hi");
    }

    #[test]
    fn test_recv_times_out() {
        let (mut engine, _handle) = engine();
        assert_eq!(engine.recv(Some(Duration::ZERO)).unwrap(), None);
    }

    #[test]
    fn test_recv_skips_noise_to_next_event() {
        let (mut engine, handle) = engine();
        handle.feed(":srv 372 me :- motd\r\n:srv 375 me :- start\r\n:a!u@h QUIT :bye\r\n");
        let event = engine.recv(None).unwrap().unwrap();
        assert_eq!(event.kind(), "QUIT");
    }

    #[test]
    fn test_skipped_lines_are_kept_for_callers() {
        let (mut engine, handle) = engine();
        handle.feed(":srv 001 me :Welcome\r\n:a!u@h PRIVMSG me :hi\r\n");
        assert_eq!(engine.recv(None).unwrap().unwrap().kind(), "PRIVMSG");
        assert_eq!(engine.take_skipped(), vec![":srv 001 me :Welcome"]);
        assert!(engine.take_skipped().is_empty());
    }

    #[test]
    fn test_stepback_after_compaction() {
        let (mut engine, handle) = engine();
        let burst: String = (0..199).map(|i| format!("line{i}\r\n")).collect();
        handle.feed(burst);
        for _ in 0..199 {
            engine.consume().unwrap();
        }
        handle.feed("fresh\r\nnext\r\n");
        assert_eq!(engine.consume().unwrap(), "fresh");
        assert_eq!(engine.buffer().index(), 1);
        assert!(engine.stepback());
        assert_eq!(engine.consume().unwrap(), "fresh");
        assert_eq!(engine.consume().unwrap(), "next");
    }

    #[test]
    fn test_undecodable_line_does_not_drop_later_lines() {
        let (transport, handle) = MemoryTransport::new();
        let config = EngineConfig {
            fallback_encoding: "utf-8".into(),
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(Box::new(transport), "me", &config).unwrap();
        handle.feed(b"ok\r\nbad\xff\r\nafter\r\n".to_vec());
        assert!(matches!(engine.consume(), Err(Error::Encoding { .. })));
        assert_eq!(engine.consume().unwrap(), "ok");
        assert_eq!(engine.consume().unwrap(), "after");
    }

    #[test]
    fn test_recv_surfaces_trailing_noise_as_unknown() {
        let (mut engine, handle) = engine();
        handle.feed(":srv 372 me :- motd\r\n");
        let event = engine.recv(None).unwrap().unwrap();
        assert_eq!(
            event,
            Event::Unknown {
                line: ":srv 372 me :- motd".into()
            }
        );
    }

    #[test]
    fn test_recv_skip_is_bounded() {
        let (transport, handle) = MemoryTransport::new();
        let config = EngineConfig {
            max_skips: 2,
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(Box::new(transport), "me", &config).unwrap();
        handle.feed(":srv 001 me :a\r\n:srv 002 me :b\r\n:srv 003 me :c\r\n");
        let event = engine.recv(None).unwrap().unwrap();
        assert_eq!(
            event,
            Event::Unknown {
                line: ":srv 002 me :b".into()
            }
        );
    }

    #[test]
    fn test_server_error_closes_transport() {
        let (mut engine, handle) = engine();
        handle.feed("ERROR :Closing Link\r\n");
        let event = engine.recv(None).unwrap().unwrap();
        assert_eq!(
            event,
            Event::Error {
                message: "Closing Link".into()
            }
        );
        assert!(engine.is_closed());
        assert!(handle.is_closed());
        assert!(matches!(engine.send("QUIT"), Err(Error::ConnectionClosed)));
    }
}
