//! The user/channel relational store.
//!
//! [`Roster`] owns two arenas (users, channels) plus the membership relation
//! between them, all behind one mutex so every operation is atomic and the
//! symmetry invariant (a user is in a channel's member map iff the channel
//! is in the user's channel set) can never be observed broken.
//!
//! The read task performs all protocol-driven mutation; any task may read.
//! Accessors hand out owned snapshots rather than guards, so nothing outside
//! this module can hold the lock.

mod channel;
mod snapshot;
mod user;

pub use channel::{Channel, ListEntry, Topic};
pub use snapshot::{ChannelSnapshot, MemberSnapshot, RosterSnapshot, UserSnapshot};
pub use user::{ChannelId, User, UserId, UserLevel};

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::Utc;

use crate::proto::{CaseMapping, Hostmask};

/// The in-memory model of everything the server has told us about users and
/// channels on this connection.
pub struct Roster {
    inner: Mutex<Inner>,
}

struct Inner {
    users: HashMap<UserId, User>,
    channels: HashMap<ChannelId, Channel>,
    nick_index: HashMap<String, UserId>,
    name_index: HashMap<String, ChannelId>,
    casemap: CaseMapping,
    bot_id: UserId,
    next_user: u64,
    next_channel: u64,
}

impl Inner {
    fn fold(&self, s: &str) -> String {
        self.casemap.lower(s)
    }

    fn user_id(&self, nick: &str) -> Option<UserId> {
        self.nick_index.get(&self.fold(nick)).copied()
    }

    fn channel_id(&self, name: &str) -> Option<ChannelId> {
        self.name_index.get(&self.fold(name)).copied()
    }

    fn alloc_user(&mut self, nick: &str) -> UserId {
        let id = UserId(self.next_user);
        self.next_user += 1;
        self.users.insert(id, User::new(id, nick.to_owned()));
        self.nick_index.insert(self.fold(nick), id);
        id
    }

    fn alloc_channel(&mut self, name: &str) -> ChannelId {
        let id = ChannelId(self.next_channel);
        self.next_channel += 1;
        self.channels.insert(id, Channel::new(id, name.to_owned()));
        self.name_index.insert(self.fold(name), id);
        id
    }

    /// Detach one membership edge from both sides.
    fn detach(&mut self, uid: UserId, cid: ChannelId) {
        if let Some(user) = self.users.get_mut(&uid) {
            user.channels.remove(&cid);
        }
        if let Some(chan) = self.channels.get_mut(&cid) {
            chan.members.remove(&uid);
        }
    }

    /// Drop a user whose channel set emptied, unless it is the bot.
    fn reap_if_orphan(&mut self, uid: UserId) {
        if uid == self.bot_id {
            return;
        }
        let orphaned = self
            .users
            .get(&uid)
            .is_some_and(|u| u.channels.is_empty());
        if orphaned {
            if let Some(user) = self.users.remove(&uid) {
                let key = self.fold(&user.nick);
                self.nick_index.remove(&key);
            }
        }
    }

    fn user_snapshot(&self, user: &User) -> UserSnapshot {
        let mut channels: Vec<String> = user
            .channels
            .iter()
            .filter_map(|cid| self.channels.get(cid).map(|c| c.name.clone()))
            .collect();
        channels.sort();
        UserSnapshot {
            nick: user.nick.clone(),
            login: user.login.clone(),
            hostname: user.hostname.clone(),
            realname: user.realname.clone(),
            server: user.server.clone(),
            away: user.away.clone(),
            irc_operator: user.irc_operator,
            account: user.account.clone(),
            last_activity: user.last_activity,
            channels,
            is_bot: user.id == self.bot_id,
        }
    }

    fn channel_snapshot(&self, chan: &Channel) -> ChannelSnapshot {
        let mut members: Vec<MemberSnapshot> = chan
            .members
            .iter()
            .filter_map(|(uid, levels)| {
                self.users.get(uid).map(|u| {
                    let mut levels: Vec<UserLevel> = levels.iter().copied().collect();
                    levels.sort();
                    MemberSnapshot {
                        nick: u.nick.clone(),
                        levels,
                    }
                })
            })
            .collect();
        members.sort_by(|a, b| a.nick.cmp(&b.nick));
        ChannelSnapshot {
            name: chan.name.clone(),
            topic: chan.topic.as_ref().map(|t| t.text.clone()),
            topic_set_by: chan.topic.as_ref().and_then(|t| t.set_by.clone()),
            topic_set_at: chan.topic.as_ref().and_then(|t| t.set_at),
            created_at: chan.created_at,
            key: chan.key.clone(),
            modes: chan.modes.clone(),
            members,
            ban_masks: chan.ban_masks.iter().map(|e| e.mask.clone()).collect(),
            except_masks: chan.except_masks.iter().map(|e| e.mask.clone()).collect(),
            invite_masks: chan.invite_masks.iter().map(|e| e.mask.clone()).collect(),
        }
    }
}

impl Roster {
    /// Create a roster pre-seeded with the bot's own user.
    pub fn new(bot_nick: &str, bot_login: &str) -> Self {
        let mut inner = Inner {
            users: HashMap::new(),
            channels: HashMap::new(),
            nick_index: HashMap::new(),
            name_index: HashMap::new(),
            casemap: CaseMapping::default(),
            bot_id: UserId(0),
            next_user: 0,
            next_channel: 0,
        };
        let bot_id = inner.alloc_user(bot_nick);
        inner.bot_id = bot_id;
        if let Some(bot) = inner.users.get_mut(&bot_id) {
            bot.login = Some(bot_login.to_owned());
        }
        Self {
            inner: Mutex::new(inner),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("roster lock poisoned")
    }

    /// The case mapping currently in force.
    pub fn case_mapping(&self) -> CaseMapping {
        self.lock().casemap
    }

    /// Switch case mapping (ISUPPORT CASEMAPPING) and re-fold the indexes.
    pub fn set_case_mapping(&self, casemap: CaseMapping) {
        let mut inner = self.lock();
        if inner.casemap == casemap {
            return;
        }
        inner.casemap = casemap;
        inner.nick_index = inner
            .users
            .iter()
            .map(|(id, u)| (casemap.lower(&u.nick), *id))
            .collect();
        inner.name_index = inner
            .channels
            .iter()
            .map(|(id, c)| (casemap.lower(&c.name), *id))
            .collect();
    }

    /// The bot's current nick.
    pub fn bot_nick(&self) -> String {
        let inner = self.lock();
        inner.users[&inner.bot_id].nick.clone()
    }

    /// Whether `nick` names the bot under the current case mapping.
    pub fn is_bot(&self, nick: &str) -> bool {
        let inner = self.lock();
        inner.user_id(nick) == Some(inner.bot_id)
    }

    /// Whether we know a user by this nick.
    pub fn contains_user(&self, nick: &str) -> bool {
        let inner = self.lock();
        inner.user_id(nick).is_some()
    }

    /// Whether we are on a channel of this name.
    pub fn contains_channel(&self, name: &str) -> bool {
        let inner = self.lock();
        inner.channel_id(name).is_some()
    }

    /// Look up a user, promoting the hostmask to a new record if absent.
    ///
    /// Known users get their login/hostname refreshed when the incoming mask
    /// carries them; the latest sighting is authoritative.
    pub fn get_or_create_user(&self, mask: &Hostmask) -> bool {
        let nick = mask.nick_or_wildcard().to_owned();
        let mut inner = self.lock();
        let (uid, created) = match inner.user_id(&nick) {
            Some(uid) => (uid, false),
            None => (inner.alloc_user(&nick), true),
        };
        if let Some(user) = inner.users.get_mut(&uid) {
            if mask.login.is_some() {
                user.login.clone_from(&mask.login);
            }
            if mask.hostname.is_some() {
                user.hostname.clone_from(&mask.hostname);
            }
        }
        created
    }

    /// Refresh an existing user's login/hostname from a sighting.
    ///
    /// Returns false (and stores nothing) if the nick is unknown; this is
    /// the non-membership half of the identity-promotion rule.
    pub fn refresh_user(&self, mask: &Hostmask) -> bool {
        let Some(nick) = mask.nick.as_deref() else {
            return false;
        };
        let mut inner = self.lock();
        let Some(uid) = inner.user_id(nick) else {
            return false;
        };
        if let Some(user) = inner.users.get_mut(&uid) {
            if mask.login.is_some() {
                user.login.clone_from(&mask.login);
            }
            if mask.hostname.is_some() {
                user.hostname.clone_from(&mask.hostname);
            }
            user.last_activity = Utc::now();
        }
        true
    }

    pub(crate) fn update_user(&self, nick: &str, f: impl FnOnce(&mut User)) -> bool {
        let mut inner = self.lock();
        match inner.user_id(nick) {
            Some(uid) => {
                if let Some(user) = inner.users.get_mut(&uid) {
                    f(user);
                }
                true
            }
            None => false,
        }
    }

    pub(crate) fn update_channel(&self, name: &str, f: impl FnOnce(&mut Channel)) -> bool {
        let mut inner = self.lock();
        match inner.channel_id(name) {
            Some(cid) => {
                if let Some(chan) = inner.channels.get_mut(&cid) {
                    f(chan);
                }
                true
            }
            None => false,
        }
    }

    /// Create a channel record for a channel we joined. Idempotent.
    pub fn ensure_channel(&self, name: &str) -> bool {
        let mut inner = self.lock();
        if inner.channel_id(name).is_some() {
            return false;
        }
        inner.alloc_channel(name);
        true
    }

    /// Add a membership edge, creating the user (and channel) as needed.
    /// Idempotent; levels are unioned into the edge.
    pub fn add_user_to_channel(&self, mask: &Hostmask, channel: &str, levels: &[UserLevel]) {
        let nick = mask.nick_or_wildcard().to_owned();
        let mut inner = self.lock();
        let uid = match inner.user_id(&nick) {
            Some(uid) => uid,
            None => inner.alloc_user(&nick),
        };
        if let Some(user) = inner.users.get_mut(&uid) {
            if mask.login.is_some() {
                user.login.clone_from(&mask.login);
            }
            if mask.hostname.is_some() {
                user.hostname.clone_from(&mask.hostname);
            }
            user.last_activity = Utc::now();
        }
        let cid = match inner.channel_id(channel) {
            Some(cid) => cid,
            None => inner.alloc_channel(channel),
        };
        if let Some(user) = inner.users.get_mut(&uid) {
            user.channels.insert(cid);
        }
        if let Some(chan) = inner.channels.get_mut(&cid) {
            chan.members.entry(uid).or_default().extend(levels);
        }
    }

    /// Remove a membership edge. Returns the user's pre-removal snapshot if
    /// the edge existed. A non-bot user left with no channels is dropped.
    pub fn remove_user_from_channel(&self, nick: &str, channel: &str) -> Option<UserSnapshot> {
        let mut inner = self.lock();
        let uid = inner.user_id(nick)?;
        let cid = inner.channel_id(channel)?;
        if !inner.users.get(&uid)?.channels.contains(&cid) {
            return None;
        }
        let snap = inner.user_snapshot(inner.users.get(&uid)?);
        inner.detach(uid, cid);
        inner.reap_if_orphan(uid);
        Some(snap)
    }

    /// Remove a user from everything (QUIT). Returns the pre-removal
    /// snapshot. The bot is detached from channels but never dropped.
    pub fn remove_user(&self, nick: &str) -> Option<UserSnapshot> {
        let mut inner = self.lock();
        let uid = inner.user_id(nick)?;
        let snap = inner.user_snapshot(inner.users.get(&uid)?);
        let cids: Vec<ChannelId> = inner.users.get(&uid)?.channels.iter().copied().collect();
        for cid in cids {
            inner.detach(uid, cid);
        }
        inner.reap_if_orphan(uid);
        Some(snap)
    }

    /// Drop a channel (our PART/KICK), detaching every member. Members left
    /// with no shared channels are dropped too. Returns the pre-removal
    /// channel snapshot.
    pub fn drop_channel(&self, name: &str) -> Option<ChannelSnapshot> {
        let mut inner = self.lock();
        let cid = inner.channel_id(name)?;
        let snap = inner.channel_snapshot(inner.channels.get(&cid)?);
        let uids: Vec<UserId> = inner
            .channels
            .get(&cid)
            .map(|c| c.members.keys().copied().collect())
            .unwrap_or_default();
        for uid in uids {
            inner.detach(uid, cid);
            inner.reap_if_orphan(uid);
        }
        if let Some(chan) = inner.channels.remove(&cid) {
            let key = inner.fold(&chan.name);
            inner.name_index.remove(&key);
        }
        Some(snap)
    }

    /// Re-key a user under a new nick. The record, its memberships, and its
    /// identity survive; only the index entry moves.
    pub fn rename_user(&self, old_nick: &str, new_nick: &str) -> bool {
        let mut inner = self.lock();
        let Some(uid) = inner.user_id(old_nick) else {
            return false;
        };
        let old_key = inner.fold(old_nick);
        let new_key = inner.fold(new_nick);
        inner.nick_index.remove(&old_key);
        inner.nick_index.insert(new_key, uid);
        if let Some(user) = inner.users.get_mut(&uid) {
            user.nick = new_nick.to_owned();
            user.last_activity = Utc::now();
        }
        true
    }

    /// Grant a status level on a membership edge.
    pub fn grant_level(&self, channel: &str, nick: &str, level: UserLevel) -> bool {
        let mut inner = self.lock();
        let (Some(cid), Some(uid)) = (inner.channel_id(channel), inner.user_id(nick)) else {
            return false;
        };
        inner
            .channels
            .get_mut(&cid)
            .and_then(|c| c.members.get_mut(&uid))
            .is_some_and(|levels| levels.insert(level))
    }

    /// Revoke a status level from a membership edge.
    pub fn revoke_level(&self, channel: &str, nick: &str, level: UserLevel) -> bool {
        let mut inner = self.lock();
        let (Some(cid), Some(uid)) = (inner.channel_id(channel), inner.user_id(nick)) else {
            return false;
        };
        inner
            .channels
            .get_mut(&cid)
            .and_then(|c| c.members.get_mut(&uid))
            .is_some_and(|levels| levels.remove(&level))
    }

    /// The level set of one membership edge.
    pub fn member_levels(&self, channel: &str, nick: &str) -> Option<Vec<UserLevel>> {
        let inner = self.lock();
        let cid = inner.channel_id(channel)?;
        let uid = inner.user_id(nick)?;
        let levels = inner.channels.get(&cid)?.members.get(&uid)?;
        let mut levels: Vec<UserLevel> = levels.iter().copied().collect();
        levels.sort();
        Some(levels)
    }

    /// Owned snapshot of one user.
    pub fn get_user(&self, nick: &str) -> Option<UserSnapshot> {
        let inner = self.lock();
        let uid = inner.user_id(nick)?;
        inner.users.get(&uid).map(|u| inner.user_snapshot(u))
    }

    /// Owned snapshot of one channel.
    pub fn get_channel(&self, name: &str) -> Option<ChannelSnapshot> {
        let inner = self.lock();
        let cid = inner.channel_id(name)?;
        inner.channels.get(&cid).map(|c| inner.channel_snapshot(c))
    }

    /// Owned snapshots of every known user, bot included.
    pub fn all_users(&self) -> Vec<UserSnapshot> {
        let inner = self.lock();
        let mut users: Vec<UserSnapshot> = inner
            .users
            .values()
            .map(|u| inner.user_snapshot(u))
            .collect();
        users.sort_by(|a, b| a.nick.cmp(&b.nick));
        users
    }

    /// Owned snapshots of every channel we are on.
    pub fn all_channels(&self) -> Vec<ChannelSnapshot> {
        let inner = self.lock();
        let mut channels: Vec<ChannelSnapshot> = inner
            .channels
            .values()
            .map(|c| inner.channel_snapshot(c))
            .collect();
        channels.sort_by(|a, b| a.name.cmp(&b.name));
        channels
    }

    /// Names of all channels we are on.
    pub fn channel_names(&self) -> Vec<String> {
        let inner = self.lock();
        let mut names: Vec<String> = inner.channels.values().map(|c| c.name.clone()).collect();
        names.sort();
        names
    }

    /// Channel name→key pairs, the shape the reconnect cache wants.
    pub fn channels_with_keys(&self) -> Vec<(String, Option<String>)> {
        let inner = self.lock();
        let mut pairs: Vec<(String, Option<String>)> = inner
            .channels
            .values()
            .map(|c| (c.name.clone(), c.key.clone()))
            .collect();
        pairs.sort();
        pairs
    }

    /// Number of known users, bot included.
    pub fn user_count(&self) -> usize {
        self.lock().users.len()
    }

    /// Number of channels we are on.
    pub fn channel_count(&self) -> usize {
        self.lock().channels.len()
    }

    /// Deep-frozen copy of everything, taken atomically.
    pub fn snapshot(&self) -> RosterSnapshot {
        let inner = self.lock();
        let mut users: Vec<UserSnapshot> = inner
            .users
            .values()
            .map(|u| inner.user_snapshot(u))
            .collect();
        users.sort_by(|a, b| a.nick.cmp(&b.nick));
        let mut channels: Vec<ChannelSnapshot> = inner
            .channels
            .values()
            .map(|c| inner.channel_snapshot(c))
            .collect();
        channels.sort_by(|a, b| a.name.cmp(&b.name));
        RosterSnapshot {
            case_mapping: inner.casemap,
            users,
            channels,
            taken_at: Utc::now(),
        }
    }

    /// Clear every record. The roster is not reusable afterwards; the engine
    /// builds a fresh one per connection attempt.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.users.clear();
        inner.channels.clear();
        inner.nick_index.clear();
        inner.name_index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask(s: &str) -> Hostmask {
        Hostmask::parse(s)
    }

    fn roster() -> Roster {
        Roster::new("bot", "botlogin")
    }

    #[test]
    fn test_bot_preseeded() {
        let r = roster();
        assert_eq!(r.bot_nick(), "bot");
        assert!(r.is_bot("BOT"));
        assert_eq!(r.user_count(), 1);
        let bot = r.get_user("bot").unwrap();
        assert!(bot.is_bot);
        assert_eq!(bot.login.as_deref(), Some("botlogin"));
    }

    #[test]
    fn test_membership_symmetry() {
        let r = roster();
        r.ensure_channel("#test");
        r.add_user_to_channel(&mask("alice!u@h"), "#test", &[UserLevel::Op]);

        let alice = r.get_user("alice").unwrap();
        assert_eq!(alice.channels, vec!["#test".to_owned()]);
        let chan = r.get_channel("#test").unwrap();
        assert_eq!(chan.levels_of("alice"), Some(&[UserLevel::Op][..]));
    }

    #[test]
    fn test_part_cascades_orphan() {
        let r = roster();
        r.ensure_channel("#a");
        r.add_user_to_channel(&mask("alice!u@h"), "#a", &[]);
        let snap = r.remove_user_from_channel("alice", "#a").unwrap();
        assert_eq!(snap.nick, "alice");
        assert!(!r.contains_user("alice"));
    }

    #[test]
    fn test_part_keeps_user_on_other_channels() {
        let r = roster();
        r.ensure_channel("#a");
        r.ensure_channel("#b");
        r.add_user_to_channel(&mask("alice!u@h"), "#a", &[]);
        r.add_user_to_channel(&mask("alice!u@h"), "#b", &[]);
        r.remove_user_from_channel("alice", "#a");
        assert!(r.contains_user("alice"));
        assert_eq!(r.get_user("alice").unwrap().channels, vec!["#b".to_owned()]);
    }

    #[test]
    fn test_quit_cascade() {
        let r = roster();
        r.ensure_channel("#a");
        r.ensure_channel("#b");
        r.add_user_to_channel(&mask("alice!u@h"), "#a", &[]);
        r.add_user_to_channel(&mask("alice!u@h"), "#b", &[]);

        let snap = r.remove_user("alice").unwrap();
        assert_eq!(snap.channels, vec!["#a".to_owned(), "#b".to_owned()]);
        assert!(!r.contains_user("alice"));
        assert_eq!(r.get_channel("#a").unwrap().members.len(), 0);
        assert_eq!(r.get_channel("#b").unwrap().members.len(), 0);
    }

    #[test]
    fn test_bot_never_reaped() {
        let r = roster();
        r.ensure_channel("#a");
        r.add_user_to_channel(&mask("bot!botlogin@h"), "#a", &[]);
        r.remove_user_from_channel("bot", "#a");
        assert!(r.contains_user("bot"));
    }

    #[test]
    fn test_drop_channel_reaps_members() {
        let r = roster();
        r.ensure_channel("#a");
        r.ensure_channel("#b");
        r.add_user_to_channel(&mask("alice!u@h"), "#a", &[]);
        r.add_user_to_channel(&mask("carol!u@h"), "#a", &[]);
        r.add_user_to_channel(&mask("carol!u@h"), "#b", &[]);

        let snap = r.drop_channel("#a").unwrap();
        assert_eq!(snap.members.len(), 2);
        assert!(!r.contains_channel("#a"));
        assert!(!r.contains_user("alice"));
        assert!(r.contains_user("carol"));
    }

    #[test]
    fn test_rename_preserves_identity() {
        let r = roster();
        r.ensure_channel("#a");
        r.add_user_to_channel(&mask("alice!u@h"), "#a", &[UserLevel::Voice]);
        assert!(r.rename_user("alice", "alyce"));

        assert!(!r.contains_user("alice"));
        let renamed = r.get_user("alyce").unwrap();
        assert_eq!(renamed.login.as_deref(), Some("u"));
        assert_eq!(renamed.channels, vec!["#a".to_owned()]);
        assert_eq!(
            r.member_levels("#a", "alyce"),
            Some(vec![UserLevel::Voice])
        );
    }

    #[test]
    fn test_casemapped_lookup() {
        let r = roster();
        r.ensure_channel("#Test[1]");
        r.add_user_to_channel(&mask("Alice!u@h"), "#Test[1]", &[]);
        assert!(r.contains_channel("#test{1}"));
        assert!(r.contains_user("ALICE"));
    }

    #[test]
    fn test_set_case_mapping_refolds() {
        let r = roster();
        r.add_user_to_channel(&mask("nick[1]!u@h"), "#c", &[]);
        assert!(r.contains_user("nick{1}"));
        r.set_case_mapping(CaseMapping::Ascii);
        assert!(!r.contains_user("nick{1}"));
        assert!(r.contains_user("NICK[1]"));
    }

    #[test]
    fn test_get_or_create_refreshes_identity() {
        let r = roster();
        r.ensure_channel("#a");
        r.add_user_to_channel(&mask("alice"), "#a", &[]);
        assert!(r.get_user("alice").unwrap().login.is_none());

        let created = r.get_or_create_user(&mask("alice!ident@real.host"));
        assert!(!created);
        let alice = r.get_user("alice").unwrap();
        assert_eq!(alice.login.as_deref(), Some("ident"));
        assert_eq!(alice.hostname.as_deref(), Some("real.host"));
    }

    #[test]
    fn test_refresh_unknown_is_noop() {
        let r = roster();
        assert!(!r.refresh_user(&mask("ghost!u@h")));
        assert!(!r.contains_user("ghost"));
    }

    #[test]
    fn test_levels_union_idempotent() {
        let r = roster();
        r.add_user_to_channel(&mask("alice!u@h"), "#a", &[UserLevel::Voice]);
        r.add_user_to_channel(&mask("alice!u@h"), "#a", &[UserLevel::Op]);
        assert_eq!(
            r.member_levels("#a", "alice"),
            Some(vec![UserLevel::Op, UserLevel::Voice])
        );
    }

    #[test]
    fn test_grant_revoke_level() {
        let r = roster();
        r.add_user_to_channel(&mask("alice!u@h"), "#a", &[]);
        assert!(r.grant_level("#a", "alice", UserLevel::Op));
        assert!(!r.grant_level("#a", "alice", UserLevel::Op));
        assert!(r.revoke_level("#a", "alice", UserLevel::Op));
        assert_eq!(r.member_levels("#a", "alice"), Some(vec![]));
    }

    #[test]
    fn test_snapshot_is_frozen() {
        let r = roster();
        r.ensure_channel("#a");
        r.add_user_to_channel(&mask("alice!u@h"), "#a", &[UserLevel::Op]);
        r.update_channel("#a", |c| c.apply_mode('k', Some("sekrit".into())));

        let snap = r.snapshot();
        r.remove_user("alice");
        r.drop_channel("#a");
        r.close();

        assert_eq!(snap.users.len(), 2);
        assert!(snap.user("alice").is_some());
        let chan = snap.channel("#a").unwrap();
        assert_eq!(chan.key.as_deref(), Some("sekrit"));
        assert_eq!(chan.levels_of("alice"), Some(&[UserLevel::Op][..]));
    }

    #[test]
    fn test_channels_with_keys() {
        let r = roster();
        r.ensure_channel("#a");
        r.ensure_channel("#b");
        r.update_channel("#a", |c| c.apply_mode('k', Some("k1".into())));
        assert_eq!(
            r.channels_with_keys(),
            vec![
                ("#a".to_owned(), Some("k1".to_owned())),
                ("#b".to_owned(), None)
            ]
        );
    }
}
