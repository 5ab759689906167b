//! Classifies one line into an [`Event`] and applies its effect on the
//! session.

use crate::error::{Error, ProtocolError, Result};
use crate::irc::ctcp;
use crate::irc::errors::ErrorKind;
use crate::irc::event::{Event, Hostmask};
use crate::irc::session::{ChannelState, MemberModes, SessionState};
use ::irc::proto::Mode;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// Outcome of dispatching one line.
#[derive(Debug, PartialEq)]
pub enum Dispatch {
    Event(Event),
    /// Part of a join burst: session updated, nothing to report yet.
    Absorbed,
    /// Server-initiated `ERROR`; the connection must be shut down.
    Shutdown(Event),
    /// No rule matched.
    Unrecognized,
}

/// The remainder of `line` after skipping `n` whitespace-separated fields.
pub(crate) fn rest_after(line: &str, n: usize) -> &str {
    let mut rest = line.trim_start();
    for _ in 0..n {
        match rest.find(char::is_whitespace) {
            Some(i) => rest = rest[i..].trim_start(),
            None => return "",
        }
    }
    rest
}

pub(crate) fn strip_colon(text: &str) -> &str {
    text.strip_prefix(':').unwrap_or(text)
}

/// The token a reply is classified by: the command of a prefixed line, or
/// the first word of an unprefixed one (`ERROR`, `PING`).
pub(crate) fn reply_token(line: &str) -> Option<&str> {
    let mut fields = line.split_whitespace();
    let first = fields.next()?;
    if first.starts_with(':') {
        fields.next()
    } else {
        Some(first)
    }
}

/// Build the typed error for a line carrying a recognized numeric error.
pub(crate) fn protocol_error(line: &str) -> Option<ProtocolError> {
    let code = reply_token(line)?;
    let kind = ErrorKind::from_code(code)?;
    let base = usize::from(line.starts_with(':'));
    // <code> <our nick> [<target>] :<message>
    let target = line
        .split_whitespace()
        .nth(base + 2)
        .filter(|t| !t.starts_with(':'))
        .map(str::to_string);
    let message = line
        .get(1..)
        .and_then(|body| body.split_once(" :"))
        .map(|(_, text)| text.to_string())
        .unwrap_or_default();
    Some(ProtocolError {
        code: code.to_string(),
        kind,
        target,
        message,
    })
}

pub fn dispatch(line: &str, session: &mut SessionState) -> Result<Dispatch> {
    let segments: Vec<&str> = line.split_whitespace().collect();

    if segments.first() == Some(&"ERROR") {
        let message = strip_colon(rest_after(line, 1)).to_string();
        return Ok(Dispatch::Shutdown(Event::Error { message }));
    }
    if let Some(err) = protocol_error(line) {
        return Err(Error::Protocol(err));
    }

    let (Some(source), Some(command)) = (segments.first(), segments.get(1)) else {
        return Ok(Dispatch::Unrecognized);
    };
    let who = Hostmask::from_prefix(source);
    let arg = |i: usize| segments.get(i).copied();

    let event = match *command {
        "JOIN" => {
            let Some(channel) = arg(2).map(strip_colon) else {
                return Ok(Dispatch::Unrecognized);
            };
            if session.channels.contains_key(channel) {
                session.add_member(channel, who.nick(), MemberModes::default());
            } else {
                debug!(channel, "Joined channel, awaiting names");
                session
                    .channels
                    .insert(channel.to_string(), ChannelState::default());
            }
            Event::Join {
                who,
                channel: channel.to_string(),
            }
        }
        "PART" => {
            let Some(channel) = arg(2).map(strip_colon) else {
                return Ok(Dispatch::Unrecognized);
            };
            if session.is_me(who.nick()) {
                debug!(channel, "Left channel");
                session.channels.remove(channel);
            } else {
                session.remove_member(channel, who.nick());
            }
            Event::Part {
                channel: channel.to_string(),
                reason: strip_colon(rest_after(line, 3)).to_string(),
                who,
            }
        }
        "PRIVMSG" | "NOTICE" => {
            let Some(target) = arg(2) else {
                return Ok(Dispatch::Unrecognized);
            };
            let target = target.to_string();
            let text = strip_colon(rest_after(line, 3));
            match (*command, ctcp::is_ctcp(text)) {
                ("PRIVMSG", true) => {
                    let text = ctcp::decode(text);
                    Event::Ctcp {
                        who,
                        target,
                        payload: text.to_uppercase(),
                        text,
                    }
                }
                ("PRIVMSG", false) => Event::Privmsg {
                    who,
                    target,
                    text: text.to_string(),
                },
                (_, true) => Event::CtcpReply {
                    who,
                    target,
                    payload: ctcp::decode(text),
                },
                (_, false) => Event::Notice {
                    who,
                    target,
                    text: text.to_string(),
                },
            }
        }
        "MODE" => {
            let Some(target) = arg(2) else {
                return Ok(Dispatch::Unrecognized);
            };
            let modes = strip_colon(rest_after(line, 3)).to_string();
            if session.is_me(target) {
                Event::UserMode { who, modes }
            } else {
                let pieces: Vec<&str> = modes.split_whitespace().collect();
                match Mode::as_channel_modes(&pieces) {
                    Ok(parsed) => session.apply_channel_modes(target, &parsed),
                    Err(e) => warn!(channel = target, modes = %modes, error = %e, "Unparseable channel modes"),
                }
                Event::ChannelMode {
                    who,
                    channel: target.to_string(),
                    modes,
                }
            }
        }
        "KICK" => {
            let (Some(channel), Some(nick)) = (arg(2), arg(3)) else {
                return Ok(Dispatch::Unrecognized);
            };
            if session.is_me(nick) {
                debug!(channel, by = who.nick(), "Kicked from channel");
                session.channels.remove(channel);
            } else {
                session.remove_member(channel, nick);
            }
            Event::Kick {
                who,
                channel: channel.to_string(),
                nick: nick.to_string(),
                reason: strip_colon(rest_after(line, 4)).to_string(),
            }
        }
        "INVITE" => {
            let (Some(nick), Some(channel)) = (arg(2), arg(3)) else {
                return Ok(Dispatch::Unrecognized);
            };
            Event::Invite {
                who,
                nick: nick.to_string(),
                channel: strip_colon(channel).to_string(),
            }
        }
        "NICK" => {
            let Some(new_nick) = arg(2).map(strip_colon) else {
                return Ok(Dispatch::Unrecognized);
            };
            session.rename(who.nick(), new_nick);
            Event::Nick {
                new_nick: new_nick.to_string(),
                who,
            }
        }
        "TOPIC" => {
            let Some(channel) = arg(2) else {
                return Ok(Dispatch::Unrecognized);
            };
            let topic = strip_colon(rest_after(line, 3)).to_string();
            if let Some(state) = session.channels.get_mut(channel) {
                state.topic = topic.clone();
                state.topic_set_by = Some(who.clone());
                state.topic_set_at = Some(Utc::now());
            }
            Event::Topic {
                who,
                channel: channel.to_string(),
                topic,
            }
        }
        "QUIT" => Event::Quit {
            message: strip_colon(rest_after(line, 2)).to_string(),
            who,
        },
        // RPL_TOPIC: <me> <channel> :<topic>
        "332" => {
            if let Some(channel) = arg(3) {
                if let Some(state) = session.channels.get_mut(channel) {
                    state.topic = strip_colon(rest_after(line, 4)).to_string();
                    debug!(channel, "Topic received");
                }
            }
            return Ok(Dispatch::Absorbed);
        }
        // RPL_TOPICWHOTIME: <me> <channel> <setter> <unix time>
        "333" => {
            if let Some(state) = arg(3).and_then(|c| session.channels.get_mut(c)) {
                state.topic_set_by = arg(4).map(Hostmask::parse);
                state.topic_set_at = arg(5)
                    .and_then(|t| t.parse::<i64>().ok())
                    .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));
            }
            return Ok(Dispatch::Absorbed);
        }
        // RPL_NAMREPLY: <me> [=*@] <channel> :<names>
        "353" => {
            let (channel, names_at) = match arg(3) {
                Some("=" | "*" | "@") => (arg(4), 5),
                other => (other, 4),
            };
            if let Some(channel) = channel {
                for entry in strip_colon(rest_after(line, names_at)).split_whitespace() {
                    let (modes, nick) = MemberModes::from_names_entry(entry);
                    session.add_member(channel, nick, modes);
                }
            }
            return Ok(Dispatch::Absorbed);
        }
        // RPL_ENDOFNAMES: <me> <channel> :End of /NAMES list.
        "366" => {
            let Some(channel) = arg(3) else {
                return Ok(Dispatch::Absorbed);
            };
            match session.channels.get_mut(channel) {
                Some(state) if !state.synced => {
                    state.synced = true;
                    debug!(channel, members = state.users.len(), "Channel synced");
                    Event::JoinComplete {
                        channel: channel.to_string(),
                        state: state.clone(),
                    }
                }
                _ => return Ok(Dispatch::Absorbed),
            }
        }
        code => {
            if session.merge_lusers(code, &segments) {
                Event::Lusers(session.lusers.clone())
            } else {
                return Ok(Dispatch::Unrecognized);
            }
        }
    };
    Ok(Dispatch::Event(event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::irc::session::LuserStat;

    fn session_in(channel: &str, nicks: &[&str]) -> SessionState {
        let mut session = SessionState::new("me");
        session
            .channels
            .insert(channel.to_string(), ChannelState::default());
        for nick in nicks {
            session.add_member(channel, nick, MemberModes::default());
        }
        session
    }

    fn event(line: &str, session: &mut SessionState) -> Event {
        match dispatch(line, session).unwrap() {
            Dispatch::Event(e) => e,
            other => panic!("expected event for {line:?}, got {other:?}"),
        }
    }

    fn full(nick: &str, user: &str, host: &str) -> Hostmask {
        Hostmask::Full {
            nick: nick.into(),
            user: user.into(),
            host: host.into(),
        }
    }

    #[test]
    fn test_rest_after() {
        assert_eq!(rest_after(":a PRIVMSG #x :hi  there", 3), ":hi  there");
        assert_eq!(rest_after(":a PART #x", 3), "");
        assert_eq!(rest_after("QUIT", 1), "");
    }

    #[test]
    fn test_join_known_channel_adds_member() {
        let mut session = session_in("#x", &[]);
        let ev = event(":a!u@h JOIN #x", &mut session);
        assert_eq!(
            ev,
            Event::Join {
                who: full("a", "u", "h"),
                channel: "#x".into()
            }
        );
        assert_eq!(session.channel("#x").unwrap().users["a"], MemberModes::default());
    }

    #[test]
    fn test_join_unknown_channel_creates_placeholder() {
        let mut session = SessionState::new("me");
        event(":me!u@h JOIN :#new", &mut session);
        let state = session.channel("#new").unwrap();
        assert!(!state.synced);
        assert!(state.users.is_empty());
    }

    #[test]
    fn test_part_with_and_without_reason() {
        let mut session = session_in("#x", &["a", "b"]);
        let ev = event(":a!u@h PART #x :gone fishing", &mut session);
        assert!(matches!(ev, Event::Part { ref reason, .. } if reason == "gone fishing"));
        let ev = event(":b!u@h PART #x", &mut session);
        assert!(matches!(ev, Event::Part { ref reason, .. } if reason.is_empty()));
        assert!(session.channel("#x").unwrap().users.is_empty());
    }

    #[test]
    fn test_self_part_removes_channel() {
        let mut session = session_in("#x", &["me"]);
        event(":me!u@h PART #x", &mut session);
        assert!(session.channel("#x").is_none());
    }

    #[test]
    fn test_privmsg_and_ctcp() {
        let mut session = SessionState::new("me");
        let ev = event(":a!u@h PRIVMSG #x :hello world", &mut session);
        assert!(matches!(ev, Event::Privmsg { ref text, .. } if text == "hello world"));

        let ev = event(":a!u@h PRIVMSG me :\x01version\x01", &mut session);
        assert_eq!(
            ev,
            Event::Ctcp {
                who: full("a", "u", "h"),
                target: "me".into(),
                payload: "VERSION".into(),
                text: "version".into(),
            }
        );
    }

    #[test]
    fn test_notice_ctcp_reply_keeps_case() {
        let mut session = SessionState::new("me");
        let ev = event(":a!u@h NOTICE me :\x01VERSION CrabClient 1.0\x01", &mut session);
        assert!(matches!(ev, Event::CtcpReply { ref payload, .. } if payload == "VERSION CrabClient 1.0"));
        let ev = event(":srv NOTICE * :*** Looking up your hostname", &mut session);
        assert!(matches!(ev, Event::Notice { ref who, .. } if *who == Hostmask::Raw("srv".into())));
    }

    #[test]
    fn test_user_mode() {
        let mut session = SessionState::new("me");
        let ev = event(":me MODE me :+iw", &mut session);
        assert_eq!(
            ev,
            Event::UserMode {
                who: Hostmask::Raw("me".into()),
                modes: "+iw".into()
            }
        );
    }

    #[test]
    fn test_channel_mode_updates_roster() {
        let mut session = session_in("#x", &["a", "b"]);
        let ev = event(":op!u@h MODE #x +o-v a b", &mut session);
        assert!(matches!(ev, Event::ChannelMode { ref modes, .. } if modes == "+o-v a b"));
        assert!(session.channel("#x").unwrap().users["a"].op);
    }

    #[test]
    fn test_kick() {
        let mut session = session_in("#x", &["a", "me"]);
        let ev = event(":op!u@h KICK #x a :behave", &mut session);
        assert!(matches!(ev, Event::Kick { ref nick, ref reason, .. } if nick == "a" && reason == "behave"));
        assert!(!session.channel("#x").unwrap().users.contains_key("a"));

        event(":op!u@h KICK #x me :bye", &mut session);
        assert!(session.channel("#x").is_none());
    }

    #[test]
    fn test_invite() {
        let mut session = SessionState::new("me");
        let ev = event(":a!u@h INVITE me :#secret", &mut session);
        assert!(matches!(ev, Event::Invite { ref channel, .. } if channel == "#secret"));
    }

    #[test]
    fn test_nick_moves_roster_and_tracks_self() {
        let mut session = session_in("#x", &["me", "a"]);
        event(":me!u@h NICK :me_", &mut session);
        assert_eq!(session.current_nick, "me_");
        assert!(session.channel("#x").unwrap().users.contains_key("me_"));
        let ev = event(":a!u@h NICK b", &mut session);
        assert!(matches!(ev, Event::Nick { ref new_nick, .. } if new_nick == "b"));
        assert!(session.channel("#x").unwrap().users.contains_key("b"));
    }

    #[test]
    fn test_topic() {
        let mut session = session_in("#x", &[]);
        event(":a!u@h TOPIC #x :new topic here", &mut session);
        let state = session.channel("#x").unwrap();
        assert_eq!(state.topic, "new topic here");
        assert_eq!(state.topic_set_by, Some(full("a", "u", "h")));
    }

    #[test]
    fn test_quit_leaves_roster_alone() {
        let mut session = session_in("#x", &["a"]);
        let ev = event(":a!u@h QUIT :Ping timeout", &mut session);
        assert!(matches!(ev, Event::Quit { ref message, .. } if message == "Ping timeout"));
        assert!(session.channel("#x").unwrap().users.contains_key("a"));
    }

    #[test]
    fn test_lusers_accumulate() {
        let mut session = SessionState::new("me");
        event(
            ":srv 251 me :There are 5 users and 8 invisible on 1 servers",
            &mut session,
        );
        let ev = event(
            ":srv 250 me :Highest connection count: 15 (14 clients) (1234 connections received)",
            &mut session,
        );
        let Event::Lusers(stats) = ev else {
            panic!("expected lusers");
        };
        assert_eq!(stats[&LuserStat::Users], "5");
        assert_eq!(stats[&LuserStat::Invisible], "8");
        assert_eq!(stats[&LuserStat::Servers], "1");
        assert_eq!(stats[&LuserStat::HighestConnections], "15");
        assert_eq!(stats[&LuserStat::TotalConnections], "1234");
    }

    #[test]
    fn test_numeric_error_is_typed() {
        let mut session = SessionState::new("me");
        let err = dispatch(":srv 401 me ghost :No such nick/channel", &mut session).unwrap_err();
        let Error::Protocol(err) = err else {
            panic!("expected protocol error");
        };
        assert_eq!(err.kind, ErrorKind::NoSuchNick);
        assert_eq!(err.target.as_deref(), Some("ghost"));
        assert_eq!(err.message, "No such nick/channel");
    }

    #[test]
    fn test_server_error_shuts_down() {
        let mut session = SessionState::new("me");
        let out = dispatch("ERROR :Closing Link: me (Quit)", &mut session).unwrap();
        assert_eq!(
            out,
            Dispatch::Shutdown(Event::Error {
                message: "Closing Link: me (Quit)".into()
            })
        );
    }

    #[test]
    fn test_unrecognized() {
        let mut session = SessionState::new("me");
        assert_eq!(
            dispatch(":srv 372 me :- message of the day", &mut session).unwrap(),
            Dispatch::Unrecognized
        );
        assert_eq!(dispatch("", &mut session).unwrap(), Dispatch::Unrecognized);
    }

    #[test]
    fn test_join_burst() {
        let mut session = SessionState::new("me");
        event(":me!u@h JOIN #x", &mut session);
        for line in [
            ":srv 332 me #x :Welcome to #x",
            ":srv 333 me #x op!u@h 1700000000",
            ":srv 353 me = #x :@op +voiced me",
        ] {
            assert_eq!(dispatch(line, &mut session).unwrap(), Dispatch::Absorbed);
        }
        let ev = event(":srv 366 me #x :End of /NAMES list.", &mut session);
        let Event::JoinComplete { channel, state } = ev else {
            panic!("expected join completion");
        };
        assert_eq!(channel, "#x");
        assert_eq!(state.topic, "Welcome to #x");
        assert_eq!(state.topic_set_by, Some(full("op", "u", "h")));
        assert_eq!(state.topic_set_at.unwrap().timestamp(), 1_700_000_000);
        assert!(state.users["op"].op);
        assert!(state.users["voiced"].voice);
        assert!(state.synced);

        // A later NAMES listing does not report completion again.
        assert_eq!(
            dispatch(":srv 366 me #x :End of /NAMES list.", &mut session).unwrap(),
            Dispatch::Absorbed
        );
    }
}
