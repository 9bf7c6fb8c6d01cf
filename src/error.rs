//! Error types for the engine.
//!
//! Three families, matching how failures propagate: [`BotError`] is what
//! [`crate::Bot::start`] terminates with, [`IrcRefusal`] tags a registration
//! refusal by the server, and [`ParseError`] covers the line grammar (these
//! never kill a connection; the read loop surfaces them as `Exception`
//! events and keeps going).

use std::io;

use thiserror::Error;

/// Terminal errors from [`crate::Bot::start`].
#[derive(Debug, Error)]
pub enum BotError {
    /// The retry budget ran out without reaching any configured server.
    #[error("unable to connect to any configured server after {attempts} attempt(s)")]
    ConnectFailed {
        /// Attempts made since the last successful registration.
        attempts: u32,
    },

    /// The server let us connect but refused the registration.
    #[error(transparent)]
    Refused(#[from] IrcRefusal),

    /// Transport-level failure outside the reconnect loop's remit.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A reason-tagged protocol refusal during registration.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IrcRefusal {
    /// 433/437 with the alternative ladder exhausted.
    #[error("nickname {nick} already in use and no alternatives remain")]
    NickAlreadyInUse {
        /// The last nickname we tried.
        nick: String,
    },

    /// 465: banned from the server.
    #[error("banned from server: {reason}")]
    Banned {
        /// Server-supplied ban text.
        reason: String,
    },

    /// ERROR before 001: the server is closing the link on us.
    #[error("server closed the link during registration: {reason}")]
    ClosingLink {
        /// Server-supplied ERROR text.
        reason: String,
    },

    /// `start()` was called while a connection is already up.
    #[error("already connected; disconnect before connecting again")]
    AlreadyConnected,
}

impl IrcRefusal {
    /// Whether the refusal is worth retrying under auto-reconnect.
    ///
    /// Connection throttling is the one refusal servers hand out that goes
    /// away on its own; bans and nick exhaustion do not.
    pub fn is_transient(&self) -> bool {
        match self {
            IrcRefusal::ClosingLink { reason } => {
                let reason = reason.to_ascii_lowercase();
                reason.contains("throttl") || reason.contains("too fast")
            }
            _ => false,
        }
    }
}

/// Line-grammar and framing errors.
#[derive(Debug, Error)]
pub enum ParseError {
    /// A line with nothing on it.
    #[error("empty line")]
    EmptyLine,

    /// A prefix with no command after it.
    #[error("line has no command: {0:?}")]
    MissingCommand(String),

    /// Framed length exceeded `max_line_length`.
    #[error("line exceeds {limit} bytes")]
    LineTooLong {
        /// The configured cap.
        limit: usize,
    },

    /// The configured encoding label is not recognized.
    #[error("unknown encoding label: {0}")]
    UnknownEncoding(String),

    /// Transport error surfaced through the codec.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Configuration builder validation errors.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The server list is empty.
    #[error("at least one server entry is required")]
    NoServers,

    /// A required text field is blank.
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    /// `max_line_length` cannot frame a minimal IRC line.
    #[error("max_line_length must be at least 64 bytes")]
    LineLengthTooSmall,

    /// The encoding label is not recognized by the codec.
    #[error("unknown encoding label: {0}")]
    UnknownEncoding(String),
}
