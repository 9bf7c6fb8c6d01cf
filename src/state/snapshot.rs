//! Deep-frozen copies of the roster.
//!
//! A snapshot is taken under the roster lock at disconnect (when enabled)
//! and published in the `Disconnect` event. It is plain owned data: nothing
//! in it aliases the live store, so later mutation or `close()` cannot reach
//! it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::user::UserLevel;
use crate::proto::{CaseMapping, Hostmask};

/// Frozen copy of the whole roster.
#[derive(Clone, Debug)]
pub struct RosterSnapshot {
    /// Case mapping in force when the snapshot was taken.
    pub case_mapping: CaseMapping,
    /// All users, bot included.
    pub users: Vec<UserSnapshot>,
    /// All channels.
    pub channels: Vec<ChannelSnapshot>,
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,
}

/// Frozen copy of one user.
#[derive(Clone, Debug)]
pub struct UserSnapshot {
    /// Nickname, case-preserved.
    pub nick: String,
    /// Login (ident), if observed.
    pub login: Option<String>,
    /// Hostname, if observed.
    pub hostname: Option<String>,
    /// Realname / GECOS, if observed.
    pub realname: Option<String>,
    /// Attached server, if observed.
    pub server: Option<String>,
    /// Away message, if away.
    pub away: Option<String>,
    /// IRC operator flag.
    pub irc_operator: bool,
    /// Services account, if known.
    pub account: Option<String>,
    /// Last observed activity.
    pub last_activity: DateTime<Utc>,
    /// Names of shared channels.
    pub channels: Vec<String>,
    /// Whether this user is the bot itself.
    pub is_bot: bool,
}

impl UserSnapshot {
    /// The user's identity as a hostmask.
    pub fn hostmask(&self) -> Hostmask {
        Hostmask::new(
            Some(self.nick.clone()),
            self.login.clone(),
            self.hostname.clone(),
        )
    }
}

/// Frozen copy of one channel.
#[derive(Clone, Debug)]
pub struct ChannelSnapshot {
    /// Canonical name.
    pub name: String,
    /// Topic text, if set.
    pub topic: Option<String>,
    /// Who set the topic.
    pub topic_set_by: Option<Hostmask>,
    /// When the topic was set.
    pub topic_set_at: Option<DateTime<Utc>>,
    /// Creation time from numeric 329.
    pub created_at: Option<DateTime<Utc>>,
    /// Channel key, when known.
    pub key: Option<String>,
    /// Non-status modes.
    pub modes: HashMap<char, Option<String>>,
    /// Members with their level sets.
    pub members: Vec<MemberSnapshot>,
    /// Ban masks.
    pub ban_masks: Vec<String>,
    /// Ban exception masks.
    pub except_masks: Vec<String>,
    /// Invite exception masks.
    pub invite_masks: Vec<String>,
}

/// One membership edge in a channel snapshot.
#[derive(Clone, Debug)]
pub struct MemberSnapshot {
    /// Member nickname.
    pub nick: String,
    /// Status levels on this channel, highest first.
    pub levels: Vec<UserLevel>,
}

impl RosterSnapshot {
    /// Look up a user by nick under the snapshot's case mapping.
    pub fn user(&self, nick: &str) -> Option<&UserSnapshot> {
        self.users.iter().find(|u| self.case_mapping.eq(&u.nick, nick))
    }

    /// Look up a channel by name under the snapshot's case mapping.
    pub fn channel(&self, name: &str) -> Option<&ChannelSnapshot> {
        self.channels
            .iter()
            .find(|c| self.case_mapping.eq(&c.name, name))
    }

    /// The bot's own user.
    pub fn bot(&self) -> Option<&UserSnapshot> {
        self.users.iter().find(|u| u.is_bot)
    }
}

impl ChannelSnapshot {
    /// Members holding `level`.
    pub fn members_with_level(&self, level: UserLevel) -> impl Iterator<Item = &MemberSnapshot> {
        self.members.iter().filter(move |m| m.levels.contains(&level))
    }

    /// The level set of one member, if present.
    pub fn levels_of(&self, nick: &str) -> Option<&[UserLevel]> {
        self.members
            .iter()
            .find(|m| m.nick.eq_ignore_ascii_case(nick))
            .map(|m| m.levels.as_slice())
    }
}
