//! Wire-level protocol pieces: line grammar, identities, CTCP, ISUPPORT.
//!
//! Everything in here is pure (no I/O, no shared state) so the parser and
//! the tests can chew on raw strings directly.

pub mod casemap;
pub mod ctcp;
pub mod hostmask;
pub mod isupport;
pub mod line;

pub use casemap::CaseMapping;
pub use ctcp::{Ctcp, CtcpKind};
pub use hostmask::Hostmask;
pub use isupport::{ChanModeClasses, IsupportEntry, PrefixSpec, parse_tokens};
pub use line::LineCodec;

use crate::error::ParseError;

/// One tokenized server line, borrowed from the input.
///
/// ```text
/// [:prefix] command [params...] [:trailing]
/// ```
///
/// The trailing parameter, when present, is the last element of `params`
/// with its leading `:` removed and internal spaces preserved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawLine<'a> {
    /// The prefix without its leading `:`, if any.
    pub prefix: Option<&'a str>,
    /// The command word or three-digit numeric, as sent.
    pub command: &'a str,
    /// Middle parameters followed by the trailing parameter, if any.
    pub params: Vec<&'a str>,
}

impl<'a> RawLine<'a> {
    /// Tokenize one line. The caller strips CR/LF framing first.
    pub fn parse(input: &'a str) -> Result<Self, ParseError> {
        let mut rest = input.trim_end_matches(['\r', '\n']);
        if rest.is_empty() {
            return Err(ParseError::EmptyLine);
        }

        let prefix = if let Some(tagged) = rest.strip_prefix(':') {
            let (prefix, tail) = tagged
                .split_once(' ')
                .ok_or_else(|| ParseError::MissingCommand(input.to_owned()))?;
            rest = tail.trim_start_matches(' ');
            Some(prefix)
        } else {
            None
        };

        let (command, mut rest) = match rest.split_once(' ') {
            Some((cmd, tail)) => (cmd, tail),
            None => (rest, ""),
        };
        if command.is_empty() {
            return Err(ParseError::MissingCommand(input.to_owned()));
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing);
                break;
            }
            match rest.split_once(' ') {
                Some((param, tail)) => {
                    params.push(param);
                    rest = tail;
                }
                None => {
                    params.push(rest);
                    break;
                }
            }
        }

        Ok(Self {
            prefix,
            command,
            params,
        })
    }

    /// The prefix parsed as a hostmask, if a prefix was present.
    pub fn source(&self) -> Option<Hostmask> {
        self.prefix.map(Hostmask::parse)
    }

    /// The three-digit numeric code, if the command is one.
    pub fn numeric(&self) -> Option<u16> {
        if self.command.len() == 3 && self.command.bytes().all(|b| b.is_ascii_digit()) {
            self.command.parse().ok()
        } else {
            None
        }
    }

    /// Parameter at `idx`, or the empty string.
    pub fn param(&self, idx: usize) -> &'a str {
        self.params.get(idx).copied().unwrap_or("")
    }

    /// The trailing (last) parameter, or the empty string.
    pub fn trailing(&self) -> &'a str {
        self.params.last().copied().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_privmsg() {
        let line = RawLine::parse(":alice!u@h PRIVMSG #chan :Hello, world!\r\n").unwrap();
        assert_eq!(line.prefix, Some("alice!u@h"));
        assert_eq!(line.command, "PRIVMSG");
        assert_eq!(line.params, vec!["#chan", "Hello, world!"]);
        assert_eq!(line.trailing(), "Hello, world!");
    }

    #[test]
    fn test_parse_no_prefix() {
        let line = RawLine::parse("PING :12345").unwrap();
        assert_eq!(line.prefix, None);
        assert_eq!(line.command, "PING");
        assert_eq!(line.params, vec!["12345"]);
    }

    #[test]
    fn test_parse_numeric() {
        let line = RawLine::parse(":irc.example.net 001 bot :Welcome").unwrap();
        assert_eq!(line.numeric(), Some(1));
        assert_eq!(line.param(0), "bot");
    }

    #[test]
    fn test_parse_numeric_only_for_three_digits() {
        let line = RawLine::parse("MODE #chan +o alice").unwrap();
        assert_eq!(line.numeric(), None);
        assert_eq!(line.params, vec!["#chan", "+o", "alice"]);
    }

    #[test]
    fn test_parse_multiple_spaces() {
        let line = RawLine::parse(":srv  005  bot   TOKEN=1  :are supported").unwrap();
        assert_eq!(line.command, "005");
        assert_eq!(line.params, vec!["bot", "TOKEN=1", "are supported"]);
    }

    #[test]
    fn test_parse_empty_trailing() {
        let line = RawLine::parse(":alice!u@h TOPIC #chan :").unwrap();
        assert_eq!(line.params, vec!["#chan", ""]);
        assert_eq!(line.trailing(), "");
    }

    #[test]
    fn test_parse_empty_line() {
        assert!(matches!(RawLine::parse("\r\n"), Err(ParseError::EmptyLine)));
    }

    #[test]
    fn test_parse_prefix_without_command() {
        assert!(matches!(
            RawLine::parse(":only.a.prefix"),
            Err(ParseError::MissingCommand(_))
        ));
    }

    #[test]
    fn test_source_hostmask() {
        let line = RawLine::parse(":alice!u@h NICK :alyce").unwrap();
        let src = line.source().unwrap();
        assert_eq!(src.nick.as_deref(), Some("alice"));
        assert_eq!(src.hostname.as_deref(), Some("h"));
    }
}
