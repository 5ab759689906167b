//! Synchronous IRC client engine.
//!
//! A [`Connection`] frames lines off a TCP or TLS stream, answers keepalive
//! pings, turns lines into [`Event`]s while tracking channel state, and lets
//! callers wait for specific replies with [`Connection::expect`].

pub mod config;
pub mod error;
pub mod irc;
pub mod logging;

pub use crate::error::{Error, ProtocolError, Result};
pub use crate::irc::{Connection, Event, ExpectOptions, Reply, Wire};
