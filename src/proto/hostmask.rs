//! Hostmask identities.
//!
//! A hostmask is the `nick!login@host` triple a server puts in message
//! prefixes. Any part may be unknown: services and servers send bare names,
//! and some ircds omit the login. Equality of *users* is by nick under the
//! server case mapping; the login/host parts are transient.

use std::fmt;

use super::casemap::CaseMapping;

/// A `nick!login@host` triple with optional parts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Hostmask {
    /// Nickname, if the prefix carried one.
    pub nick: Option<String>,
    /// Login (ident) part.
    pub login: Option<String>,
    /// Hostname part.
    pub hostname: Option<String>,
}

impl Hostmask {
    /// Build a hostmask from explicit parts.
    pub fn new(
        nick: impl Into<Option<String>>,
        login: impl Into<Option<String>>,
        hostname: impl Into<Option<String>>,
    ) -> Self {
        Self {
            nick: nick.into(),
            login: login.into(),
            hostname: hostname.into(),
        }
    }

    /// Build a hostmask that only knows the nick.
    pub fn from_nick(nick: impl Into<String>) -> Self {
        Self {
            nick: Some(nick.into()),
            login: None,
            hostname: None,
        }
    }

    /// Parse a raw prefix.
    ///
    /// This is a lenient split on the first `!` and the following `@`.
    /// A bare name containing a dot and no separators is a server name, for
    /// which the whole string becomes the `hostname` and `nick` stays unset.
    pub fn parse(raw: &str) -> Self {
        if let Some((nick, rest)) = raw.split_once('!') {
            let (login, host) = match rest.split_once('@') {
                Some((login, host)) => (Some(login), Some(host)),
                None => (Some(rest), None),
            };
            return Self {
                nick: Some(nick.to_owned()),
                login: login.filter(|s| !s.is_empty()).map(str::to_owned),
                hostname: host.filter(|s| !s.is_empty()).map(str::to_owned),
            };
        }
        if let Some((nick, host)) = raw.split_once('@') {
            return Self {
                nick: Some(nick.to_owned()),
                login: None,
                hostname: Some(host.to_owned()),
            };
        }
        if raw.contains('.') {
            // Dotted bare prefix: a server, not a user.
            Self {
                nick: None,
                login: None,
                hostname: Some(raw.to_owned()),
            }
        } else {
            Self {
                nick: Some(raw.to_owned()),
                login: None,
                hostname: None,
            }
        }
    }

    /// Whether this prefix named a user rather than a server.
    pub fn is_user(&self) -> bool {
        self.nick.is_some()
    }

    /// The nick, or `*` when unknown.
    pub fn nick_or_wildcard(&self) -> &str {
        self.nick.as_deref().unwrap_or("*")
    }

    /// Nick equality under a case mapping.
    pub fn same_nick(&self, other: &str, casemap: CaseMapping) -> bool {
        match &self.nick {
            Some(nick) => casemap.eq(nick, other),
            None => false,
        }
    }
}

impl fmt::Display for Hostmask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.nick, &self.login, &self.hostname) {
            (Some(n), Some(l), Some(h)) => write!(f, "{n}!{l}@{h}"),
            (Some(n), None, Some(h)) => write!(f, "{n}@{h}"),
            (Some(n), _, None) => f.write_str(n),
            (None, _, Some(h)) => f.write_str(h),
            (None, _, None) => f.write_str("*"),
        }
    }
}
