//! Structured events produced by the dispatcher.

use crate::irc::session::{ChannelState, Lusers};
use std::fmt;

/// Actor identity from a `nick!user@host` prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hostmask {
    Full {
        nick: String,
        user: String,
        host: String,
    },
    /// Anything not in `nick!user@host` form, typically a server name.
    Raw(String),
}

impl Hostmask {
    pub fn parse(who: &str) -> Self {
        let parsed = who.split_once('@').and_then(|(nick_user, host)| {
            let (nick, user) = nick_user.split_once('!')?;
            Some(Hostmask::Full {
                nick: nick.to_string(),
                user: user.to_string(),
                host: host.to_string(),
            })
        });
        parsed.unwrap_or_else(|| Hostmask::Raw(who.to_string()))
    }

    /// Parse the first token of a line, dropping its leading `:`.
    pub fn from_prefix(token: &str) -> Self {
        Self::parse(token.strip_prefix(':').unwrap_or(token))
    }

    /// The nick, or the raw text for non-user sources.
    pub fn nick(&self) -> &str {
        match self {
            Hostmask::Full { nick, .. } => nick,
            Hostmask::Raw(raw) => raw,
        }
    }
}

impl fmt::Display for Hostmask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hostmask::Full { nick, user, host } => write!(f, "{}!{}@{}", nick, user, host),
            Hostmask::Raw(raw) => f.write_str(raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Join {
        who: Hostmask,
        channel: String,
    },
    /// End of the NAMES burst that follows our own JOIN.
    JoinComplete {
        channel: String,
        state: ChannelState,
    },
    Part {
        who: Hostmask,
        channel: String,
        reason: String,
    },
    Privmsg {
        who: Hostmask,
        target: String,
        text: String,
    },
    Notice {
        who: Hostmask,
        target: String,
        text: String,
    },
    /// CTCP request. `payload` is uppercased for matching; `text` keeps
    /// the case it was sent in.
    Ctcp {
        who: Hostmask,
        target: String,
        payload: String,
        text: String,
    },
    CtcpReply {
        who: Hostmask,
        target: String,
        payload: String,
    },
    ChannelMode {
        who: Hostmask,
        channel: String,
        modes: String,
    },
    UserMode {
        who: Hostmask,
        modes: String,
    },
    Kick {
        who: Hostmask,
        channel: String,
        nick: String,
        reason: String,
    },
    Invite {
        who: Hostmask,
        nick: String,
        channel: String,
    },
    Nick {
        who: Hostmask,
        new_nick: String,
    },
    Topic {
        who: Hostmask,
        channel: String,
        topic: String,
    },
    Quit {
        who: Hostmask,
        message: String,
    },
    /// The full accumulated statistics after a LUSERS-family reply.
    Lusers(Lusers),
    /// Server-initiated disconnect notice.
    Error {
        message: String,
    },
    Unknown {
        line: String,
    },
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Join { .. } => "JOIN",
            Event::JoinComplete { .. } => "JOIN_COMPLETE",
            Event::Part { .. } => "PART",
            Event::Privmsg { .. } => "PRIVMSG",
            Event::Notice { .. } => "NOTICE",
            Event::Ctcp { .. } => "CTCP",
            Event::CtcpReply { .. } => "CTCP_REPLY",
            Event::ChannelMode { .. } | Event::UserMode { .. } => "MODE",
            Event::Kick { .. } => "KICK",
            Event::Invite { .. } => "INVITE",
            Event::Nick { .. } => "NICK",
            Event::Topic { .. } => "TOPIC",
            Event::Quit { .. } => "QUIT",
            Event::Lusers(_) => "LUSERS",
            Event::Error { .. } => "ERROR",
            Event::Unknown { .. } => "UNKNOWN",
        }
    }
}
