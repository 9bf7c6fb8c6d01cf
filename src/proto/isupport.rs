//! ISUPPORT (numeric 005) token parsing.
//!
//! Servers advertise protocol parameters as `KEY` or `KEY=VALUE` tokens.
//! The pieces the engine interprets structurally are `PREFIX` (status mode →
//! sigil table) and `CHANMODES` (the four argument classes); everything else
//! is kept as raw key/value pairs on [`crate::ServerInfo`].

/// One `KEY` or `KEY=VALUE` token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IsupportEntry<'a> {
    /// Token key, e.g. `NETWORK`.
    pub key: &'a str,
    /// Token value, e.g. `Libera.Chat`; `None` for bare keys.
    pub value: Option<&'a str>,
}

/// Split the parameters of a 005 line into tokens.
///
/// The caller passes the parameters between the target nick and the trailing
/// "are supported by this server" text.
pub fn parse_tokens<'a>(params: &[&'a str]) -> Vec<IsupportEntry<'a>> {
    let mut entries = Vec::with_capacity(params.len());
    for &p in params {
        if p.is_empty() {
            continue;
        }
        let (key, value) = match p.find('=') {
            Some(eq) => (&p[..eq], Some(&p[eq + 1..])),
            None => (p, None),
        };
        entries.push(IsupportEntry { key, value });
    }
    entries
}

/// Parsed `PREFIX` token: status modes and their sigils, highest rank first.
///
/// `PREFIX=(qaohv)~&@%+` maps mode `q` to sigil `~` and so on. The default
/// when a server says nothing is `(ov)@+`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrefixSpec {
    /// Mode letters in rank order, e.g. `ov`.
    pub modes: String,
    /// Sigils in the same order, e.g. `@+`.
    pub sigils: String,
}

impl Default for PrefixSpec {
    fn default() -> Self {
        Self {
            modes: "ov".to_owned(),
            sigils: "@+".to_owned(),
        }
    }
}

impl PrefixSpec {
    /// Parse a `PREFIX` value like `(ov)@+`.
    pub fn parse(s: &str) -> Option<Self> {
        let open = s.find('(')?;
        let close = s[open + 1..].find(')')? + open + 1;
        let modes = &s[open + 1..close];
        let sigils = &s[close + 1..];
        if modes.is_empty() || modes.len() != sigils.len() {
            return None;
        }
        Some(Self {
            modes: modes.to_owned(),
            sigils: sigils.to_owned(),
        })
    }

    /// Whether `mode` is a status mode on this server.
    #[inline]
    pub fn is_status_mode(&self, mode: char) -> bool {
        self.modes.contains(mode)
    }

    /// The sigil for a status mode, e.g. `o` → `@`.
    pub fn sigil_for_mode(&self, mode: char) -> Option<char> {
        self.modes
            .chars()
            .position(|c| c == mode)
            .and_then(|i| self.sigils.chars().nth(i))
    }

    /// The status mode for a sigil, e.g. `+` → `v`.
    pub fn mode_for_sigil(&self, sigil: char) -> Option<char> {
        self.sigils
            .chars()
            .position(|c| c == sigil)
            .and_then(|i| self.modes.chars().nth(i))
    }

    /// Strip leading sigils from a NAMES entry, returning (modes, nick).
    ///
    /// Handles `multi-prefix` stacking: `@+nick` yields modes `ov`.
    pub fn strip_sigils<'a>(&self, entry: &'a str) -> (Vec<char>, &'a str) {
        let mut modes = Vec::new();
        let mut rest = entry;
        while let Some(c) = rest.chars().next() {
            match self.mode_for_sigil(c) {
                Some(mode) => {
                    modes.push(mode);
                    rest = &rest[c.len_utf8()..];
                }
                None => break,
            }
        }
        (modes, rest)
    }
}

/// Parsed `CHANMODES` token: the four argument classes.
///
/// - **A**: list modes (ban/except/invite masks),
/// - **B**: always take an argument,
/// - **C**: argument when set, none when unset,
/// - **D**: never take an argument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChanModeClasses {
    /// Type A list modes.
    pub list: String,
    /// Type B always-argument modes.
    pub always_arg: String,
    /// Type C set-argument modes.
    pub set_arg: String,
    /// Type D boolean modes.
    pub boolean: String,
}

impl Default for ChanModeClasses {
    /// The RFC 1459 baseline most servers extend.
    fn default() -> Self {
        Self {
            list: "b".to_owned(),
            always_arg: "k".to_owned(),
            set_arg: "l".to_owned(),
            boolean: "imnpst".to_owned(),
        }
    }
}

impl ChanModeClasses {
    /// Parse a `CHANMODES` value like `beI,k,l,imnpst`.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.splitn(4, ',');
        Some(Self {
            list: parts.next()?.to_owned(),
            always_arg: parts.next()?.to_owned(),
            set_arg: parts.next()?.to_owned(),
            boolean: parts.next()?.to_owned(),
        })
    }

    /// Whether setting/unsetting `mode` consumes an argument.
    pub fn takes_arg(&self, mode: char, adding: bool) -> bool {
        self.list.contains(mode)
            || self.always_arg.contains(mode)
            || (adding && self.set_arg.contains(mode))
    }

    /// Whether `mode` is a type-A list mode.
    pub fn is_list(&self, mode: char) -> bool {
        self.list.contains(mode)
    }

    /// Whether `mode` appears in any class.
    pub fn is_known(&self, mode: char) -> bool {
        self.list.contains(mode)
            || self.always_arg.contains(mode)
            || self.set_arg.contains(mode)
            || self.boolean.contains(mode)
    }
}
