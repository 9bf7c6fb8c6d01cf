//! User records and channel status levels.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

/// Opaque arena id for a user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub(crate) u64);

/// Opaque arena id for a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub(crate) u64);

/// A sighted user.
///
/// Created lazily the first time a nick shows up in a membership context
/// (JOIN on one of our channels, a NAMES or WHO reply, or a command from
/// somebody already known). Dropped when it no longer shares a channel with
/// us, unless it is the bot itself.
#[derive(Clone, Debug)]
pub struct User {
    pub(crate) id: UserId,
    /// Current nickname, case-preserved.
    pub nick: String,
    /// Login (ident), once observed.
    pub login: Option<String>,
    /// Hostname, once observed.
    pub hostname: Option<String>,
    /// Realname / GECOS from WHOIS or WHO.
    pub realname: Option<String>,
    /// Server the user is attached to, from WHOIS/WHO.
    pub server: Option<String>,
    /// Away message, if the user is marked away.
    pub away: Option<String>,
    /// Whether the server flagged the user as an IRC operator.
    pub irc_operator: bool,
    /// Services account, when account-notify/WHOIS tells us.
    pub account: Option<String>,
    /// Last time we saw the user do anything.
    pub last_activity: DateTime<Utc>,
    /// Channels this user shares with us.
    pub(crate) channels: HashSet<ChannelId>,
}

impl User {
    pub(crate) fn new(id: UserId, nick: String) -> Self {
        Self {
            id,
            nick,
            login: None,
            hostname: None,
            realname: None,
            server: None,
            away: None,
            irc_operator: false,
            account: None,
            last_activity: Utc::now(),
            channels: HashSet::new(),
        }
    }

    /// Number of shared channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

/// Channel status level, highest first.
///
/// The letter→level table is learned from `ISUPPORT PREFIX`; the default is
/// `(ov)@+`. Letters outside this set are ignored rather than invented.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UserLevel {
    /// `q` / `~` on most servers.
    Owner,
    /// `a` / `&`.
    SuperOp,
    /// `o` / `@`.
    Op,
    /// `h` / `%`.
    HalfOp,
    /// `v` / `+`.
    Voice,
}

impl UserLevel {
    /// All levels, highest first.
    pub const ALL: [UserLevel; 5] = [
        UserLevel::Owner,
        UserLevel::SuperOp,
        UserLevel::Op,
        UserLevel::HalfOp,
        UserLevel::Voice,
    ];

    /// The status mode letter this level corresponds to.
    pub fn mode(self) -> char {
        match self {
            UserLevel::Owner => 'q',
            UserLevel::SuperOp => 'a',
            UserLevel::Op => 'o',
            UserLevel::HalfOp => 'h',
            UserLevel::Voice => 'v',
        }
    }

    /// Map a status mode letter to a level.
    pub fn from_mode(mode: char) -> Option<Self> {
        match mode {
            'q' => Some(UserLevel::Owner),
            'a' => Some(UserLevel::SuperOp),
            'o' => Some(UserLevel::Op),
            'h' => Some(UserLevel::HalfOp),
            'v' => Some(UserLevel::Voice),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_mode_roundtrip() {
        for level in UserLevel::ALL {
            assert_eq!(UserLevel::from_mode(level.mode()), Some(level));
        }
        assert_eq!(UserLevel::from_mode('b'), None);
    }

    #[test]
    fn test_level_ordering() {
        assert!(UserLevel::Owner < UserLevel::Voice);
        assert!(UserLevel::Op < UserLevel::HalfOp);
    }
}
