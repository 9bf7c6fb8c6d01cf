//! What the server has told us about itself.
//!
//! Numeric 004 names the server and its mode alphabets; numeric 005
//! (ISUPPORT) advertises protocol parameters. The parser feeds both in here;
//! everything else reads through the accessors. Raw tokens are kept verbatim
//! in arrival order so listeners can get at parameters the engine does not
//! interpret structurally.

use std::sync::Mutex;

use crate::proto::isupport::{ChanModeClasses, IsupportEntry, PrefixSpec};
use crate::proto::CaseMapping;

/// Capture of 004/005 plus the assembled MOTD.
pub struct ServerInfo {
    inner: Mutex<Info>,
}

#[derive(Default)]
struct Info {
    server_name: Option<String>,
    version: Option<String>,
    user_modes: Option<String>,
    channel_modes_alphabet: Option<String>,
    network: Option<String>,
    chantypes: Option<String>,
    casemapping: Option<CaseMapping>,
    prefix: Option<PrefixSpec>,
    chanmodes: Option<ChanModeClasses>,
    max_targets: Option<u32>,
    excepts_mode: Option<char>,
    invex_mode: Option<char>,
    tokens: Vec<(String, Option<String>)>,
    motd: Option<String>,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerInfo {
    /// Empty capture; defaults apply until the server speaks.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Info::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Info> {
        self.inner.lock().expect("server info lock poisoned")
    }

    /// Feed numeric 004: `<nick> <server> <version> <umodes> <chanmodes>`.
    pub fn apply_my_info(&self, params: &[&str]) {
        let mut info = self.lock();
        if let Some(server) = params.get(1) {
            info.server_name = Some((*server).to_owned());
        }
        if let Some(version) = params.get(2) {
            info.version = Some((*version).to_owned());
        }
        if let Some(umodes) = params.get(3) {
            info.user_modes = Some((*umodes).to_owned());
        }
        if let Some(cmodes) = params.get(4) {
            info.channel_modes_alphabet = Some((*cmodes).to_owned());
        }
    }

    /// Feed the tokens of one 005 line.
    ///
    /// Returns the CASEMAPPING value when this line changed it, so the
    /// caller can re-fold the roster.
    pub fn apply_isupport(&self, entries: &[IsupportEntry<'_>]) -> Option<CaseMapping> {
        let mut info = self.lock();
        let mut new_casemap = None;
        for entry in entries {
            let key = entry.key.to_ascii_uppercase();
            match (key.as_str(), entry.value) {
                ("PREFIX", Some(v)) => {
                    if let Some(spec) = PrefixSpec::parse(v) {
                        info.prefix = Some(spec);
                    }
                }
                ("CHANMODES", Some(v)) => {
                    if let Some(classes) = ChanModeClasses::parse(v) {
                        info.chanmodes = Some(classes);
                    }
                }
                ("CASEMAPPING", Some(v)) => {
                    if let Ok(cm) = v.parse::<CaseMapping>() {
                        if info.casemapping != Some(cm) {
                            info.casemapping = Some(cm);
                            new_casemap = Some(cm);
                        }
                    }
                }
                ("CHANTYPES", Some(v)) => info.chantypes = Some(v.to_owned()),
                ("NETWORK", Some(v)) => info.network = Some(v.to_owned()),
                ("MAXTARGETS", Some(v)) => info.max_targets = v.parse().ok(),
                ("EXCEPTS", v) => {
                    info.excepts_mode = v.and_then(|s| s.chars().next()).or(Some('e'));
                }
                ("INVEX", v) => {
                    info.invex_mode = v.and_then(|s| s.chars().next()).or(Some('I'));
                }
                _ => {}
            }
            info.tokens
                .push((key, entry.value.map(str::to_owned)));
        }
        new_casemap
    }

    /// Append one MOTD body line (372).
    pub fn push_motd_line(&self, line: &str) {
        let mut info = self.lock();
        let motd = info.motd.get_or_insert_with(String::new);
        motd.push_str(line);
        motd.push('\n');
    }

    /// Reset MOTD assembly (375, start of MOTD).
    pub fn clear_motd(&self) {
        self.lock().motd = None;
    }

    /// The assembled MOTD, if 376 has passed.
    pub fn motd(&self) -> Option<String> {
        self.lock().motd.clone()
    }

    /// Server name from 004.
    pub fn server_name(&self) -> Option<String> {
        self.lock().server_name.clone()
    }

    /// Server version from 004.
    pub fn version(&self) -> Option<String> {
        self.lock().version.clone()
    }

    /// User mode alphabet from 004.
    pub fn user_modes(&self) -> Option<String> {
        self.lock().user_modes.clone()
    }

    /// Network name from ISUPPORT.
    pub fn network(&self) -> Option<String> {
        self.lock().network.clone()
    }

    /// The PREFIX table; defaults to `(ov)@+`.
    pub fn prefix(&self) -> PrefixSpec {
        self.lock().prefix.clone().unwrap_or_default()
    }

    /// The CHANMODES classes; defaults to the RFC 1459 baseline.
    pub fn chanmodes(&self) -> ChanModeClasses {
        self.lock().chanmodes.clone().unwrap_or_default()
    }

    /// The advertised case mapping, if any arrived.
    pub fn case_mapping(&self) -> Option<CaseMapping> {
        self.lock().casemapping
    }

    /// Channel-type sigils; defaults to `#&`.
    pub fn chantypes(&self) -> String {
        self.lock()
            .chantypes
            .clone()
            .unwrap_or_else(|| "#&".to_owned())
    }

    /// Whether a message target names a channel.
    pub fn is_channel(&self, target: &str) -> bool {
        target
            .chars()
            .next()
            .is_some_and(|c| self.chantypes().contains(c))
    }

    /// MAXTARGETS, when advertised.
    pub fn max_targets(&self) -> Option<u32> {
        self.lock().max_targets
    }

    /// The ban-exception mode letter, when EXCEPTS was advertised.
    pub fn excepts_mode(&self) -> Option<char> {
        self.lock().excepts_mode
    }

    /// The invite-exception mode letter, when INVEX was advertised.
    pub fn invex_mode(&self) -> Option<char> {
        self.lock().invex_mode
    }

    /// The latest value of any raw ISUPPORT token.
    ///
    /// `Some(None)` means the key was advertised bare.
    pub fn token(&self, key: &str) -> Option<Option<String>> {
        let info = self.lock();
        info.tokens
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::isupport::parse_tokens;

    #[test]
    fn test_apply_my_info() {
        let si = ServerInfo::new();
        si.apply_my_info(&["bot", "irc.example.net", "ircd-2.9", "iow", "beIiklmnt"]);
        assert_eq!(si.server_name().as_deref(), Some("irc.example.net"));
        assert_eq!(si.version().as_deref(), Some("ircd-2.9"));
        assert_eq!(si.user_modes().as_deref(), Some("iow"));
    }

    #[test]
    fn test_apply_isupport() {
        let si = ServerInfo::new();
        let tokens = parse_tokens(&[
            "PREFIX=(qaohv)~&@%+",
            "CHANMODES=beI,k,l,imnpst",
            "CASEMAPPING=ascii",
            "CHANTYPES=#",
            "NETWORK=TestNet",
            "MAXTARGETS=4",
            "EXCEPTS",
            "INVEX=I",
        ]);
        let changed = si.apply_isupport(&tokens);
        assert_eq!(changed, Some(CaseMapping::Ascii));
        assert_eq!(si.prefix().sigil_for_mode('q'), Some('~'));
        assert!(si.chanmodes().is_list('I'));
        assert_eq!(si.network().as_deref(), Some("TestNet"));
        assert_eq!(si.max_targets(), Some(4));
        assert_eq!(si.excepts_mode(), Some('e'));
        assert_eq!(si.invex_mode(), Some('I'));
        assert!(si.is_channel("#chan"));
        assert!(!si.is_channel("&chan"));
        assert_eq!(si.token("NETWORK"), Some(Some("TestNet".to_owned())));
        assert_eq!(si.token("EXCEPTS"), Some(None));
        assert_eq!(si.token("NOSUCH"), None);
    }

    #[test]
    fn test_isupport_casemapping_once() {
        let si = ServerInfo::new();
        let tokens = parse_tokens(&["CASEMAPPING=rfc1459"]);
        assert_eq!(si.apply_isupport(&tokens), Some(CaseMapping::Rfc1459));
        assert_eq!(si.apply_isupport(&tokens), None);
    }

    #[test]
    fn test_defaults() {
        let si = ServerInfo::new();
        assert_eq!(si.prefix().sigil_for_mode('o'), Some('@'));
        assert!(si.chanmodes().takes_arg('k', true));
        assert!(si.is_channel("&chan"));
        assert!(si.case_mapping().is_none());
    }

    #[test]
    fn test_motd_assembly() {
        let si = ServerInfo::new();
        si.clear_motd();
        si.push_motd_line("Welcome");
        si.push_motd_line("Be nice");
        assert_eq!(si.motd().as_deref(), Some("Welcome\nBe nice\n"));
    }
}
