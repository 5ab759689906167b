//! Per-connection session state: our nick, joined channels and their
//! rosters, and aggregate LUSERS statistics.
//!
//! Only the dispatcher mutates this; everything else reads snapshots.

use crate::irc::event::Hostmask;
use ::irc::proto::{ChannelMode, Mode};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::debug;

/// Channel prefix flags of one member. A new member starts with all off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemberModes {
    pub founder: bool,
    pub admin: bool,
    pub op: bool,
    pub halfop: bool,
    pub voice: bool,
}

impl MemberModes {
    /// Split a NAMES entry such as `@+nick` into its flags and the nick.
    pub fn from_names_entry(entry: &str) -> (MemberModes, &str) {
        let mut modes = MemberModes::default();
        let nick = entry.trim_start_matches(|c: char| match c {
            '~' => {
                modes.founder = true;
                true
            }
            '&' => {
                modes.admin = true;
                true
            }
            '@' => {
                modes.op = true;
                true
            }
            '%' => {
                modes.halfop = true;
                true
            }
            '+' => {
                modes.voice = true;
                true
            }
            _ => false,
        });
        (modes, nick)
    }

    /// Highest-ranked prefix character, if any.
    pub fn prefix(&self) -> Option<char> {
        [
            (self.founder, '~'),
            (self.admin, '&'),
            (self.op, '@'),
            (self.halfop, '%'),
            (self.voice, '+'),
        ]
        .into_iter()
        .find_map(|(set, c)| set.then_some(c))
    }

    fn apply(&mut self, mode: &ChannelMode, adding: bool) -> bool {
        let flag = match mode {
            ChannelMode::Founder => &mut self.founder,
            ChannelMode::Admin => &mut self.admin,
            ChannelMode::Oper => &mut self.op,
            ChannelMode::Halfop => &mut self.halfop,
            ChannelMode::Voice => &mut self.voice,
            _ => return false,
        };
        *flag = adding;
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelState {
    pub topic: String,
    pub topic_set_by: Option<Hostmask>,
    pub topic_set_at: Option<DateTime<Utc>>,
    pub users: BTreeMap<String, MemberModes>,
    /// Set once the NAMES burst after our JOIN has ended.
    pub synced: bool,
}

/// Statistic names reported by the LUSERS numerics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LuserStat {
    HighestConnections,
    TotalConnections,
    Users,
    Invisible,
    Servers,
    Operators,
    Unknown,
    Channels,
    Clients,
    LocalServers,
    LocalUsers,
    LocalMax,
    GlobalUsers,
    GlobalMax,
}

pub type Lusers = BTreeMap<LuserStat, String>;

/// Token positions (whitespace-split, source prefix included) carried by
/// each LUSERS numeric.
const LUSERS_FIELDS: &[(&str, &[(usize, LuserStat)])] = &[
    (
        "250",
        &[(6, LuserStat::HighestConnections), (9, LuserStat::TotalConnections)],
    ),
    (
        "251",
        &[(5, LuserStat::Users), (8, LuserStat::Invisible), (11, LuserStat::Servers)],
    ),
    ("252", &[(3, LuserStat::Operators)]),
    ("253", &[(3, LuserStat::Unknown)]),
    ("254", &[(3, LuserStat::Channels)]),
    ("255", &[(5, LuserStat::Clients), (8, LuserStat::LocalServers)]),
    ("265", &[(6, LuserStat::LocalUsers), (8, LuserStat::LocalMax)]),
    ("266", &[(6, LuserStat::GlobalUsers), (8, LuserStat::GlobalMax)]),
];

pub fn lusers_fields(code: &str) -> Option<&'static [(usize, LuserStat)]> {
    LUSERS_FIELDS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, fields)| *fields)
}

/// Nick comparison used for "is this us" checks.
pub fn same_nick(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub current_nick: String,
    pub channels: BTreeMap<String, ChannelState>,
    pub lusers: Lusers,
}

impl SessionState {
    pub fn new(nick: impl Into<String>) -> Self {
        Self {
            current_nick: nick.into(),
            ..Default::default()
        }
    }

    pub fn is_me(&self, nick: &str) -> bool {
        same_nick(&self.current_nick, nick)
    }

    pub fn channel(&self, name: &str) -> Option<&ChannelState> {
        self.channels.get(name)
    }

    pub fn add_member(&mut self, channel: &str, nick: &str, modes: MemberModes) {
        if let Some(state) = self.channels.get_mut(channel) {
            state.users.insert(nick.to_string(), modes);
        }
    }

    pub fn remove_member(&mut self, channel: &str, nick: &str) {
        if let Some(state) = self.channels.get_mut(channel) {
            state.users.remove(nick);
        }
    }

    /// Move a member's flags to a new nick in every channel.
    pub fn rename(&mut self, old: &str, new: &str) {
        if self.is_me(old) {
            debug!(old, new, "Own nick changed");
            self.current_nick = new.to_string();
        }
        for state in self.channels.values_mut() {
            if let Some(modes) = state.users.remove(old) {
                state.users.insert(new.to_string(), modes);
            }
        }
    }

    /// Drop a user from every roster, e.g. after a QUIT.
    pub fn forget_user(&mut self, nick: &str) {
        for state in self.channels.values_mut() {
            state.users.remove(nick);
        }
    }

    /// Apply parsed channel modes to member flags. Non-prefix modes are ignored.
    pub fn apply_channel_modes(&mut self, channel: &str, modes: &[Mode<ChannelMode>]) {
        let Some(state) = self.channels.get_mut(channel) else {
            return;
        };
        for mode in modes {
            let (adding, mode_type, arg) = match mode {
                Mode::Plus(m, a) => (true, m, a),
                Mode::Minus(m, a) => (false, m, a),
                Mode::NoPrefix(_) => continue,
            };
            let Some(nick) = arg else { continue };
            if let Some(member) = state.users.get_mut(nick.as_str()) {
                if member.apply(mode_type, adding) {
                    debug!(channel, nick = %nick, adding, "Member mode changed");
                }
            }
        }
    }

    /// Merge the stats carried by one LUSERS-family reply.
    pub fn merge_lusers(&mut self, code: &str, segments: &[&str]) -> bool {
        let Some(fields) = lusers_fields(code) else {
            return false;
        };
        for (position, stat) in fields {
            if let Some(value) = segments.get(*position) {
                let value = value.trim_matches(|c: char| matches!(c, '(' | ')' | ',' | ':'));
                self.lusers.insert(*stat, value.to_string());
            }
        }
        true
    }
}
