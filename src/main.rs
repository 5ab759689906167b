use anyhow::{Context, Result};
use crabline::config::nickname::alternate_nickname;
use crabline::config::{self, ServerConfig};
use crabline::irc::ErrorKind;
use crabline::logging::{self, Transcript};
use crabline::{Connection, Error, Event, ExpectOptions};
use std::path::PathBuf;
use tracing::{debug, info, warn};

const MAX_NICK_ATTEMPTS: usize = 5;

fn main() -> Result<()> {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let cfg = config::load_config(config_path.as_deref())?;
    logging::init(&cfg.logging);

    let conn = Connection::connect(&cfg.server, &cfg.engine)
        .with_context(|| format!("Failed to connect to {}:{}", cfg.server.host, cfg.server.port))?;
    register(&conn, &cfg.server)?;

    for channel in &cfg.server.channels {
        if let Err(e) = conn.send_checked(&format!("JOIN {}", channel)) {
            warn!(channel = %channel, error = %e, "Join rejected");
        }
    }

    let mut transcript = Transcript::new(&cfg.logging);
    loop {
        match conn.recv(None) {
            Ok(Some(event)) => {
                for line in conn.take_skipped() {
                    debug!(line = %line, "Skipped line");
                }
                transcript.record(&conn.current_nick(), &event);
                if let Event::Error { message } = &event {
                    info!(message = %message, "Disconnected by server");
                    break;
                }
                log_event(&event);
            }
            Ok(None) => {}
            Err(Error::Protocol(e)) => warn!(error = %e, "Server reported an error"),
            Err(Error::ConnectionClosed) => {
                info!("Connection closed");
                break;
            }
            Err(e) => return Err(e).context("Connection failed"),
        }
    }
    Ok(())
}

/// Send PASS/NICK/USER and wait for the welcome, retrying taken nicks.
fn register(conn: &Connection, server: &ServerConfig) -> Result<()> {
    if let Some(password) = &server.password {
        conn.send(&format!("PASS {}", password))?;
    }
    let mut nick = server.nickname.clone();
    conn.send(&format!("NICK {}", nick))?;
    conn.send(&format!("USER {} 0 * :{}", server.username(), server.realname()))?;

    for attempt in 1..=MAX_NICK_ATTEMPTS {
        match conn.expect(&["001"], ExpectOptions::default()) {
            Ok(_) => {
                conn.set_nick(&nick);
                info!(nick = %nick, "Registered");
                return Ok(());
            }
            Err(e) if matches!(
                e.protocol_kind(),
                Some(ErrorKind::NicknameInUse | ErrorKind::ErroneousNickname)
            ) =>
            {
                nick = alternate_nickname(&nick, attempt);
                warn!(error = %e, next = %nick, "Nickname rejected");
                conn.send(&format!("NICK {}", nick))?;
            }
            Err(e) => return Err(e).context("Registration failed"),
        }
    }
    anyhow::bail!("No acceptable nickname after {} attempts", MAX_NICK_ATTEMPTS)
}

fn log_event(event: &Event) {
    match event {
        Event::Privmsg { who, target, text } => info!("[{}] <{}> {}", target, who.nick(), text),
        Event::Notice { who, target, text } => info!("[{}] -{}- {}", target, who.nick(), text),
        Event::JoinComplete { channel, state } => {
            info!(channel = %channel, users = state.users.len(), topic = %state.topic, "Joined")
        }
        Event::Unknown { line } => debug!(line = %line, "Unhandled line"),
        other => info!(kind = other.kind(), "{:?}", other),
    }
}
