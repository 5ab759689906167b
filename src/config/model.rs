//! Configuration data model.
//!
//! Every field has a default, so an empty or partial TOML file is valid.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::nickname::generate_nickname;
use crate::irc::buffer::DEFAULT_CAPACITY;
use crate::irc::framer::DEFAULT_READ_CHUNK;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where to connect and who to be.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub tls: bool,
    #[serde(default)]
    pub accept_invalid_certs: bool,
    #[serde(default = "generate_nickname")]
    pub nickname: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub realname: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub channels: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            tls: true,
            accept_invalid_certs: false,
            nickname: generate_nickname(),
            username: None,
            realname: None,
            password: None,
            channels: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.nickname)
    }

    pub fn realname(&self) -> &str {
        self.realname.as_deref().unwrap_or(&self.nickname)
    }
}

/// Tuning for the line engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Encoding used for outgoing lines and tried first on incoming ones.
    #[serde(default = "default_encoding")]
    pub encoding: String,
    /// Used when a line is not valid in `encoding`.
    #[serde(default = "default_fallback_encoding")]
    pub fallback_encoding: String,
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    #[serde(default = "default_read_chunk")]
    pub read_chunk: usize,
    /// Unrecognized lines skipped per `recv` before one is surfaced.
    #[serde(default = "default_max_skips")]
    pub max_skips: usize,
    #[serde(default = "default_error_check_wait_ms")]
    pub error_check_wait_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            encoding: default_encoding(),
            fallback_encoding: default_fallback_encoding(),
            buffer_capacity: default_buffer_capacity(),
            read_chunk: default_read_chunk(),
            max_skips: default_max_skips(),
            error_check_wait_ms: default_error_check_wait_ms(),
        }
    }
}

impl EngineConfig {
    pub fn error_check_wait(&self) -> Duration {
        Duration::from_millis(self.error_check_wait_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Append message events to daily per-target files.
    #[serde(default)]
    pub transcript: bool,
    #[serde(default = "default_transcript_dir")]
    pub transcript_dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            transcript: false,
            transcript_dir: default_transcript_dir(),
        }
    }
}

impl LoggingConfig {
    /// `transcript_dir` with a leading `~` expanded.
    pub fn transcript_path(&self) -> PathBuf {
        match self.transcript_dir.strip_prefix("~/") {
            Some(rest) => dirs::home_dir()
                .map(|home| home.join(rest))
                .unwrap_or_else(|| PathBuf::from(&self.transcript_dir)),
            None => PathBuf::from(&self.transcript_dir),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "irc.libera.chat".into()
}

fn default_port() -> u16 {
    6697
}

fn default_encoding() -> String {
    "utf-8".into()
}

fn default_fallback_encoding() -> String {
    "windows-1252".into()
}

fn default_buffer_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_read_chunk() -> usize {
    DEFAULT_READ_CHUNK
}

fn default_max_skips() -> usize {
    32
}

fn default_error_check_wait_ms() -> u64 {
    1000
}

fn default_filter() -> String {
    "info".into()
}

fn default_transcript_dir() -> String {
    "~/.local/share/crabline/logs".into()
}
