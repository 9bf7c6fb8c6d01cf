//! Events the engine emits to the listener bus.
//!
//! One tagged sum instead of an inheritance tree: shared context (timestamp,
//! connection id) lives on the [`Event`] envelope, per-event data on the
//! [`EventKind`] variant, and the old marker-interface queries ("is this
//! about a channel?") are accessor methods over the sum.
//!
//! Events are plain owned data. Whatever roster state an event needs is
//! captured *before* the mutation that made it interesting (a QUIT carries
//! the user as they were, channels included), so listeners never race the
//! live store.

use chrono::{DateTime, Utc};

use crate::proto::Hostmask;
use crate::state::{RosterSnapshot, UserLevel, UserSnapshot};

/// Envelope around one emitted event.
#[derive(Clone, Debug)]
pub struct Event {
    /// When the engine emitted it.
    pub timestamp: DateTime<Utc>,
    /// Which connection attempt of this engine produced it.
    pub connection_id: u32,
    /// The event itself.
    pub kind: EventKind,
}

impl Event {
    pub(crate) fn now(connection_id: u32, kind: EventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            connection_id,
            kind,
        }
    }

    /// The channel this event concerns, if any.
    pub fn channel(&self) -> Option<&str> {
        self.kind.channel()
    }

    /// The user hostmask this event originates from, if any.
    pub fn source(&self) -> Option<&Hostmask> {
        self.kind.source()
    }
}

/// One failed connect candidate: the address tried and the error text.
#[derive(Clone, Debug)]
pub struct ConnectFailure {
    /// `ip:port` (or `host:port` when resolution itself failed).
    pub address: String,
    /// Stringified cause.
    pub error: String,
}

/// CAP subcommand of an inbound CAP line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CapSubcommand {
    /// Server lists its capabilities.
    Ls,
    /// Server acknowledges our request.
    Ack,
    /// Server rejects our request.
    Nak,
    /// Server lists currently-enabled capabilities.
    List,
    /// Server advertises new capabilities (cap-notify).
    New,
    /// Server withdraws capabilities (cap-notify).
    Del,
}

/// Why a JOIN was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinRefusalKind {
    /// 471: channel is full (+l).
    ChannelFull,
    /// 473: invite-only (+i).
    InviteOnly,
    /// 474: banned (+b).
    Banned,
    /// 475: bad channel key (+k).
    BadKey,
}

impl JoinRefusalKind {
    /// The numeric that produced this refusal.
    pub fn code(self) -> u16 {
        match self {
            JoinRefusalKind::ChannelFull => 471,
            JoinRefusalKind::InviteOnly => 473,
            JoinRefusalKind::Banned => 474,
            JoinRefusalKind::BadKey => 475,
        }
    }
}

/// Assembled WHOIS reply, emitted once at end-of-WHOIS (318).
#[derive(Clone, Debug, Default)]
pub struct WhoisInfo {
    /// Queried nick.
    pub nick: String,
    /// Login (ident) from 311.
    pub login: Option<String>,
    /// Hostname from 311.
    pub hostname: Option<String>,
    /// Realname from 311.
    pub realname: Option<String>,
    /// Server from 312.
    pub server: Option<String>,
    /// Server description from 312.
    pub server_info: Option<String>,
    /// Away message from 301.
    pub away: Option<String>,
    /// IRC operator flag from 313.
    pub operator: bool,
    /// Idle seconds from 317.
    pub idle_secs: Option<u64>,
    /// Sign-on time from 317.
    pub signon_at: Option<DateTime<Utc>>,
    /// Channel list from 319, sigils preserved.
    pub channels: Vec<String>,
    /// Whether the server knew the nick at all (401 clears this).
    pub exists: bool,
}

/// One 352 WHO reply row.
#[derive(Clone, Debug)]
pub struct WhoEntry {
    /// Channel column (`*` for mask queries).
    pub channel: String,
    /// Login (ident).
    pub login: String,
    /// Hostname.
    pub hostname: String,
    /// Server.
    pub server: String,
    /// Nick.
    pub nick: String,
    /// Flags column (H/G, `*`, sigils).
    pub flags: String,
    /// Hop count.
    pub hops: u32,
    /// Realname.
    pub realname: String,
}

/// The tagged sum of everything the engine can tell a listener.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum EventKind {
    // -- lifecycle ---------------------------------------------------------
    /// A reconnect-loop iteration is starting.
    ConnectAttemptStart {
        /// In-run attempt number (1-based).
        attempt: u32,
    },
    /// Every candidate address of this iteration failed.
    ConnectAttemptFailed {
        /// Attempts left in the budget; -1 means unbounded.
        remaining: i32,
        /// Failures in the order the candidates were tried.
        failures: Vec<ConnectFailure>,
    },
    /// TCP (or TLS) established, registration about to start.
    SocketConnect {
        /// The `host:port` we reached.
        server: String,
    },
    /// Registration completed (001 received).
    Connect {
        /// The server name from the 001 prefix.
        server: String,
    },
    /// Connection torn down.
    Disconnect {
        /// Frozen roster, when snapshots are enabled.
        snapshot: Option<RosterSnapshot>,
        /// Terminal error, if the disconnect was not clean.
        cause: Option<String>,
    },
    /// A line was written to the socket (masked form when one was given).
    Output {
        /// The line as loggable.
        line: String,
    },
    /// A non-fatal fault (parse error, listener panic) was absorbed.
    Exception {
        /// Stringified cause.
        error: String,
        /// What the engine was doing.
        context: String,
    },

    // -- messaging ---------------------------------------------------------
    /// PRIVMSG to a channel.
    Message {
        /// Target channel.
        channel: String,
        /// Sender.
        source: Hostmask,
        /// Body.
        text: String,
    },
    /// PRIVMSG directly to us.
    PrivateMessage {
        /// Sender.
        source: Hostmask,
        /// Body.
        text: String,
    },
    /// NOTICE to us or a channel.
    Notice {
        /// Sender.
        source: Hostmask,
        /// Target as addressed.
        target: String,
        /// Body.
        text: String,
    },
    /// CTCP ACTION.
    Action {
        /// Sender.
        source: Hostmask,
        /// Target as addressed.
        target: String,
        /// Emote text.
        text: String,
    },
    /// CTCP VERSION request.
    Version {
        /// Sender.
        source: Hostmask,
        /// Target as addressed.
        target: String,
    },
    /// CTCP TIME request.
    Time {
        /// Sender.
        source: Hostmask,
        /// Target as addressed.
        target: String,
    },
    /// CTCP PING request.
    Ping {
        /// Sender.
        source: Hostmask,
        /// Target as addressed.
        target: String,
        /// Opaque token to echo back.
        token: Option<String>,
    },
    /// CTCP FINGER request.
    Finger {
        /// Sender.
        source: Hostmask,
        /// Target as addressed.
        target: String,
    },
    /// CTCP CLIENTINFO request.
    ClientInfo {
        /// Sender.
        source: Hostmask,
        /// Target as addressed.
        target: String,
    },
    /// A CTCP we do not recognize.
    UnknownCtcp {
        /// Sender.
        source: Hostmask,
        /// Target as addressed.
        target: String,
        /// Raw inner payload.
        payload: String,
    },

    // -- membership --------------------------------------------------------
    /// Somebody (possibly us) joined a channel.
    Join {
        /// The channel.
        channel: String,
        /// Who joined.
        user: Hostmask,
    },
    /// Somebody left a channel.
    Part {
        /// The channel.
        channel: String,
        /// Who left, as they were before removal.
        user: UserSnapshot,
        /// Part message.
        reason: Option<String>,
    },
    /// Somebody was kicked.
    Kick {
        /// The channel.
        channel: String,
        /// Who kicked.
        kicker: Hostmask,
        /// Who was kicked, as they were before removal.
        recipient: UserSnapshot,
        /// Kick message.
        reason: Option<String>,
    },
    /// Somebody quit the network.
    Quit {
        /// Who quit, channels included, as they were before removal.
        user: UserSnapshot,
        /// Quit message.
        reason: Option<String>,
    },
    /// Somebody changed nick.
    NickChange {
        /// Previous nick.
        old_nick: String,
        /// New nick.
        new_nick: String,
        /// The user's hostmask under the new nick.
        user: Hostmask,
    },
    /// Topic seen (on join) or changed (live).
    Topic {
        /// The channel.
        channel: String,
        /// Topic text; `None` when cleared.
        topic: Option<String>,
        /// Who set it, when known.
        set_by: Option<Hostmask>,
        /// When it was set, when known.
        set_at: Option<DateTime<Utc>>,
        /// True for a live change, false for the on-join replay.
        changed: bool,
    },
    /// We were invited somewhere.
    Invite {
        /// Who invited us.
        source: Hostmask,
        /// Where to.
        channel: String,
    },
    /// A user's away state changed (away-notify).
    Away {
        /// The user.
        user: Hostmask,
        /// Away message; `None` means back.
        message: Option<String>,
    },
    /// A user's services account changed (account-notify).
    Account {
        /// The user.
        user: Hostmask,
        /// Account name; `None` means logged out.
        account: Option<String>,
    },

    // -- modes -------------------------------------------------------------
    /// Raw mode line on a channel, before per-letter decomposition.
    Mode {
        /// The channel.
        channel: String,
        /// Who set it.
        source: Hostmask,
        /// The mode string and arguments as sent.
        mode_line: String,
    },
    /// A status level was granted or revoked.
    UserLevelChange {
        /// The channel.
        channel: String,
        /// Who changed it.
        source: Hostmask,
        /// Whose level changed.
        recipient: String,
        /// Which level.
        level: UserLevel,
        /// Granted or revoked.
        granted: bool,
    },
    /// A non-status channel mode letter changed.
    ChannelModeChange {
        /// The channel.
        channel: String,
        /// Who changed it.
        source: Hostmask,
        /// The mode letter.
        letter: char,
        /// Set or unset.
        set: bool,
        /// Argument, when the letter takes one.
        argument: Option<String>,
    },

    // -- queries & numerics ------------------------------------------------
    /// End-of-NAMES for a channel; the roster is fully populated.
    UserList {
        /// The channel.
        channel: String,
        /// Member nicks as listed.
        nicks: Vec<String>,
    },
    /// Assembled WHOIS reply.
    Whois(Box<WhoisInfo>),
    /// Assembled WHO reply.
    Who {
        /// The queried target.
        target: String,
        /// Rows in arrival order.
        entries: Vec<WhoEntry>,
    },
    /// Inbound CAP line.
    Cap {
        /// The subcommand.
        subcommand: CapSubcommand,
        /// Capability tokens.
        caps: Vec<String>,
    },
    /// Server MOTD, assembled at 376.
    Motd {
        /// Full MOTD text.
        motd: String,
    },
    /// 433 seen after registration, or during it while alternatives remain.
    NickAlreadyInUse {
        /// The nick that was taken.
        taken: String,
        /// The alternative we switched to, if registering.
        fallback: Option<String>,
    },
    /// 432: the server rejected a nick outright.
    InvalidNick {
        /// The rejected nick.
        nick: String,
        /// Server text.
        reason: String,
    },
    /// 465: we are banned from this server.
    BannedFromServer {
        /// Server text.
        reason: String,
    },
    /// 471/473/474/475: a JOIN was refused.
    JoinRefused {
        /// The channel.
        channel: String,
        /// Which refusal.
        kind: JoinRefusalKind,
        /// Server text.
        text: String,
    },
    /// Any numeric, verbatim, alongside whatever typed handling it got.
    ServerResponse {
        /// The numeric code.
        code: u16,
        /// The raw line.
        raw: String,
    },
    /// A command we do not recognize.
    Unknown {
        /// The raw line.
        line: String,
    },
}

impl EventKind {
    /// The channel this event concerns, if any.
    pub fn channel(&self) -> Option<&str> {
        match self {
            EventKind::Message { channel, .. }
            | EventKind::Join { channel, .. }
            | EventKind::Part { channel, .. }
            | EventKind::Kick { channel, .. }
            | EventKind::Topic { channel, .. }
            | EventKind::Invite { channel, .. }
            | EventKind::Mode { channel, .. }
            | EventKind::UserLevelChange { channel, .. }
            | EventKind::ChannelModeChange { channel, .. }
            | EventKind::UserList { channel, .. }
            | EventKind::JoinRefused { channel, .. } => Some(channel),
            _ => None,
        }
    }

    /// The user hostmask this event originates from, if any.
    pub fn source(&self) -> Option<&Hostmask> {
        match self {
            EventKind::Message { source, .. }
            | EventKind::PrivateMessage { source, .. }
            | EventKind::Notice { source, .. }
            | EventKind::Action { source, .. }
            | EventKind::Version { source, .. }
            | EventKind::Time { source, .. }
            | EventKind::Ping { source, .. }
            | EventKind::Finger { source, .. }
            | EventKind::ClientInfo { source, .. }
            | EventKind::UnknownCtcp { source, .. }
            | EventKind::Invite { source, .. }
            | EventKind::Mode { source, .. }
            | EventKind::UserLevelChange { source, .. }
            | EventKind::ChannelModeChange { source, .. } => Some(source),
            EventKind::Join { user, .. }
            | EventKind::NickChange { user, .. }
            | EventKind::Away { user, .. }
            | EventKind::Account { user, .. } => Some(user),
            EventKind::Kick { kicker, .. } => Some(kicker),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_accessor() {
        let kind = EventKind::Message {
            channel: "#test".into(),
            source: Hostmask::parse("a!u@h"),
            text: "hi".into(),
        };
        assert_eq!(kind.channel(), Some("#test"));
        assert!(kind.source().is_some());

        let kind = EventKind::PrivateMessage {
            source: Hostmask::parse("a!u@h"),
            text: "hi".into(),
        };
        assert_eq!(kind.channel(), None);
    }

    #[test]
    fn test_join_refusal_codes() {
        assert_eq!(JoinRefusalKind::ChannelFull.code(), 471);
        assert_eq!(JoinRefusalKind::InviteOnly.code(), 473);
        assert_eq!(JoinRefusalKind::Banned.code(), 474);
        assert_eq!(JoinRefusalKind::BadKey.code(), 475);
    }
}
