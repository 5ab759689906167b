//! Diagnostics and transcripts.
//!
//! [`init`] installs the `tracing` subscriber. [`Transcript`] writes message
//! events to daily log files per channel or query, named
//! `<target>_<date>.log` under the configured directory.

use crate::config::LoggingConfig;
use crate::irc::event::Event;
use crate::irc::session::same_nick;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` overrides the configured filter.
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter.as_str()));
    // A second call (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

/// Appends message events to per-target daily files. Handles for the
/// current day stay open; earlier days are closed once the date rolls over.
pub struct Transcript {
    enabled: bool,
    dir: PathBuf,
    files: HashMap<String, File>,
}

impl Transcript {
    pub fn new(config: &LoggingConfig) -> Self {
        Self {
            enabled: config.transcript,
            dir: config.transcript_path(),
            files: HashMap::new(),
        }
    }

    /// Record an event seen by `own_nick`. Events without a conversation
    /// target are skipped.
    pub fn record(&mut self, own_nick: &str, event: &Event) {
        if !self.enabled {
            return;
        }
        let Some((target, line)) = transcript_line(own_nick, event) else {
            return;
        };
        if let Err(e) = self.append(&target, &line) {
            warn!(conversation = %target, error = %e, "Transcript write failed");
        }
    }

    fn append(&mut self, target: &str, line: &str) -> io::Result<()> {
        let safe_target: String = target
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let now = chrono::Local::now();
        let date = now.format("%Y-%m-%d").to_string();
        let filename = format!("{}_{}.log", safe_target, date);
        if !self.files.contains_key(&filename) {
            let today = format!("_{}.log", date);
            self.files.retain(|name, _| name.ends_with(&today));
        }

        let file = match self.files.entry(filename) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                fs::create_dir_all(&self.dir)?;
                let path = self.dir.join(entry.key());
                entry.insert(OpenOptions::new().create(true).append(true).open(path)?)
            }
        };
        writeln!(file, "[{}] {}", now.format("%H:%M:%S"), line)
    }
}

const ACTION_PREFIX: &str = "ACTION ";

/// The file a message belongs to and its formatted text. Private messages
/// are filed under the sender.
fn transcript_line(own_nick: &str, event: &Event) -> Option<(String, String)> {
    let conversation = |target: &str, sender: &str| {
        if same_nick(target, own_nick) {
            sender.to_string()
        } else {
            target.to_string()
        }
    };
    let entry = match event {
        Event::Privmsg { who, target, text } => (
            conversation(target, who.nick()),
            format!("<{}> {}", who.nick(), text),
        ),
        Event::Notice { who, target, text } => (
            conversation(target, who.nick()),
            format!("-{}- {}", who.nick(), text),
        ),
        Event::Ctcp {
            who,
            target,
            payload,
            text,
        } => {
            let action = text
                .get(..ACTION_PREFIX.len())
                .filter(|prefix| prefix.eq_ignore_ascii_case(ACTION_PREFIX))
                .map(|_| &text[ACTION_PREFIX.len()..]);
            let line = match action {
                Some(action) => format!("* {} {}", who.nick(), action),
                None => format!("*** {} sent CTCP {}", who.nick(), payload),
            };
            (conversation(target, who.nick()), line)
        }
        Event::Join { who, channel } => (channel.clone(), format!("*** {} joined", who)),
        Event::Part {
            who,
            channel,
            reason,
        } => (
            channel.clone(),
            format!("*** {} left ({})", who.nick(), reason),
        ),
        Event::Kick {
            who,
            channel,
            nick,
            reason,
        } => (
            channel.clone(),
            format!("*** {} was kicked by {} ({})", nick, who.nick(), reason),
        ),
        Event::Topic {
            who,
            channel,
            topic,
        } => (
            channel.clone(),
            format!("*** {} set the topic: {}", who.nick(), topic),
        ),
        _ => return None,
    };
    Some(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::irc::event::Hostmask;

    fn alice() -> Hostmask {
        Hostmask::parse("alice!a@example.org")
    }

    #[test]
    fn test_private_messages_filed_under_sender() {
        let event = Event::Privmsg {
            who: alice(),
            target: "Me".into(),
            text: "hi".into(),
        };
        let (target, line) = transcript_line("me", &event).unwrap();
        assert_eq!(target, "alice");
        assert_eq!(line, "<alice> hi");
    }

    #[test]
    fn test_actions_are_rendered() {
        let event = Event::Ctcp {
            who: alice(),
            target: "#rust".into(),
            payload: "ACTION WAVES HELLO".into(),
            text: "ACTION waves Hello".into(),
        };
        let (target, line) = transcript_line("me", &event).unwrap();
        assert_eq!(target, "#rust");
        assert_eq!(line, "* alice waves Hello");
    }

    #[test]
    fn test_non_message_events_skipped() {
        let event = Event::Unknown { line: "x".into() };
        assert!(transcript_line("me", &event).is_none());
    }

    #[test]
    fn test_writes_daily_file() {
        let dir = std::env::temp_dir().join(format!("crabline-transcript-{}", std::process::id()));
        let config = LoggingConfig {
            transcript: true,
            transcript_dir: dir.to_string_lossy().into_owned(),
            ..LoggingConfig::default()
        };
        let mut transcript = Transcript::new(&config);
        transcript.record(
            "me",
            &Event::Join {
                who: alice(),
                channel: "#rust".into(),
            },
        );
        let date = chrono::Local::now().format("%Y-%m-%d");
        let contents = fs::read_to_string(dir.join(format!("_rust_{}.log", date))).unwrap();
        assert!(contents.contains("*** alice!a@example.org joined"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_previous_days_are_closed() {
        let dir = std::env::temp_dir().join(format!("crabline-rollover-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let config = LoggingConfig {
            transcript: true,
            transcript_dir: dir.to_string_lossy().into_owned(),
            ..LoggingConfig::default()
        };
        let mut transcript = Transcript::new(&config);
        let stale = File::create(dir.join("_rust_2000-01-01.log")).unwrap();
        transcript.files.insert("_rust_2000-01-01.log".into(), stale);
        transcript.record(
            "me",
            &Event::Privmsg {
                who: alice(),
                target: "#rust".into(),
                text: "hi".into(),
            },
        );
        let date = chrono::Local::now().format("%Y-%m-%d");
        let names: Vec<_> = transcript.files.keys().cloned().collect();
        assert_eq!(names, vec![format!("_rust_{}.log", date)]);
        let _ = fs::remove_dir_all(&dir);
    }
}
