//! CTCP (Client-to-Client Protocol) framing.
//!
//! A PRIVMSG or NOTICE body that begins with `\x01` carries a CTCP request
//! or reply. The first inner token selects the command; everything after the
//! first space is the argument blob.
//!
//! # Reference
//! - <https://modern.ircdocs.horse/ctcp.html>

use std::fmt;

/// The CTCP delimiter byte.
pub const CTCP_DELIM: char = '\x01';

/// Known CTCP commands a client engine cares about.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CtcpKind {
    /// ACTION: `/me` emotes.
    Action,
    /// VERSION: client version probe.
    Version,
    /// TIME: local time probe.
    Time,
    /// PING: round-trip probe carrying an opaque token.
    Ping,
    /// FINGER: legacy user-info probe.
    Finger,
    /// CLIENTINFO: list of supported CTCP commands.
    Clientinfo,
    /// DCC: direct client connection negotiation.
    Dcc,
    /// Anything else; the original command word is preserved.
    Unknown(String),
}

impl CtcpKind {
    /// Map a command word to a kind, case-insensitively.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "ACTION" => Self::Action,
            "VERSION" => Self::Version,
            "TIME" => Self::Time,
            "PING" => Self::Ping,
            "FINGER" => Self::Finger,
            "CLIENTINFO" => Self::Clientinfo,
            "DCC" => Self::Dcc,
            _ => Self::Unknown(name.to_owned()),
        }
    }

    /// Canonical uppercase command word.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Action => "ACTION",
            Self::Version => "VERSION",
            Self::Time => "TIME",
            Self::Ping => "PING",
            Self::Finger => "FINGER",
            Self::Clientinfo => "CLIENTINFO",
            Self::Dcc => "DCC",
            Self::Unknown(s) => s,
        }
    }
}

impl fmt::Display for CtcpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed CTCP payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ctcp<'a> {
    /// The selected command.
    pub kind: CtcpKind,
    /// Argument text after the command word, if any.
    pub params: Option<&'a str>,
}

impl<'a> Ctcp<'a> {
    /// Unwrap a message body.
    ///
    /// Returns `None` if the body is not CTCP-framed. The trailing delimiter
    /// is optional; some clients omit it.
    pub fn parse(text: &'a str) -> Option<Self> {
        let inner = text.strip_prefix(CTCP_DELIM)?;
        let inner = inner.strip_suffix(CTCP_DELIM).unwrap_or(inner);
        if inner.is_empty() {
            return None;
        }
        let (command, params) = match inner.split_once(' ') {
            Some((cmd, rest)) => (cmd, (!rest.is_empty()).then_some(rest)),
            None => (inner, None),
        };
        Some(Self {
            kind: CtcpKind::parse(command),
            params,
        })
    }

    /// Whether a message body is CTCP-framed.
    #[inline]
    pub fn is_ctcp(text: &str) -> bool {
        text.starts_with(CTCP_DELIM)
    }

    /// Frame a command and argument text as a CTCP body.
    pub fn frame(command: &str, params: Option<&str>) -> String {
        match params {
            Some(p) => format!("\x01{command} {p}\x01"),
            None => format!("\x01{command}\x01"),
        }
    }
}

impl fmt::Display for Ctcp<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\x01{}", self.kind)?;
        if let Some(params) = self.params {
            write!(f, " {params}")?;
        }
        write!(f, "\x01")
    }
}
