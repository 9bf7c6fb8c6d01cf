//! Numeric reply handling.
//!
//! Numerics mutate the roster/server-info and, where several replies form
//! one logical answer (WHOIS, WHO, NAMES, MOTD), accumulate until the
//! end-of-* numeric seals them into a single event.

use chrono::DateTime;
use tracing::debug;

use crate::error::IrcRefusal;
use crate::events::{EventKind, JoinRefusalKind, WhoEntry, WhoisInfo};
use crate::proto::isupport::parse_tokens;
use crate::proto::{Hostmask, RawLine};
use crate::state::{ListEntry, Topic, UserLevel};

use super::InputParser;

pub(super) const RPL_WELCOME: u16 = 1;
pub(super) const RPL_MYINFO: u16 = 4;
pub(super) const RPL_ISUPPORT: u16 = 5;
pub(super) const RPL_AWAY: u16 = 301;
pub(super) const RPL_UNAWAY: u16 = 305;
pub(super) const RPL_NOWAWAY: u16 = 306;
pub(super) const RPL_WHOISUSER: u16 = 311;
pub(super) const RPL_WHOISSERVER: u16 = 312;
pub(super) const RPL_WHOISOPERATOR: u16 = 313;
pub(super) const RPL_ENDOFWHO: u16 = 315;
pub(super) const RPL_WHOISIDLE: u16 = 317;
pub(super) const RPL_ENDOFWHOIS: u16 = 318;
pub(super) const RPL_WHOISCHANNELS: u16 = 319;
pub(super) const RPL_CHANNELMODEIS: u16 = 324;
pub(super) const RPL_CREATIONTIME: u16 = 329;
pub(super) const RPL_NOTOPIC: u16 = 331;
pub(super) const RPL_TOPIC: u16 = 332;
pub(super) const RPL_TOPICWHOTIME: u16 = 333;
pub(super) const RPL_INVITELIST: u16 = 346;
pub(super) const RPL_ENDOFINVITELIST: u16 = 347;
pub(super) const RPL_EXCEPTLIST: u16 = 348;
pub(super) const RPL_ENDOFEXCEPTLIST: u16 = 349;
pub(super) const RPL_WHOREPLY: u16 = 352;
pub(super) const RPL_NAMREPLY: u16 = 353;
pub(super) const RPL_ENDOFNAMES: u16 = 366;
pub(super) const RPL_BANLIST: u16 = 367;
pub(super) const RPL_ENDOFBANLIST: u16 = 368;
pub(super) const RPL_MOTD: u16 = 372;
pub(super) const RPL_MOTDSTART: u16 = 375;
pub(super) const RPL_ENDOFMOTD: u16 = 376;
pub(super) const ERR_NOSUCHNICK: u16 = 401;
pub(super) const ERR_NOMOTD: u16 = 422;
pub(super) const ERR_ERRONEUSNICKNAME: u16 = 432;
pub(super) const ERR_NICKNAMEINUSE: u16 = 433;
pub(super) const ERR_UNAVAILRESOURCE: u16 = 437;
pub(super) const ERR_YOUREBANNEDCREEP: u16 = 465;
pub(super) const ERR_CHANNELISFULL: u16 = 471;
pub(super) const ERR_INVITEONLYCHAN: u16 = 473;
pub(super) const ERR_BANNEDFROMCHAN: u16 = 474;
pub(super) const ERR_BADCHANNELKEY: u16 = 475;

impl InputParser {
    pub(super) async fn handle_numeric(
        &mut self,
        code: u16,
        parsed: &RawLine<'_>,
    ) -> Result<(), IrcRefusal> {
        match code {
            RPL_WELCOME => self.on_welcome(parsed).await,
            RPL_MYINFO => self.server_info.apply_my_info(&parsed.params),
            RPL_ISUPPORT => self.on_isupport(parsed),
            RPL_AWAY => {
                let nick = parsed.param(1);
                let message = parsed.trailing().to_owned();
                self.roster
                    .update_user(nick, |u| u.away = Some(message.clone()));
                let folded = self.fold(nick);
                if let Some(entry) = self.whois.get_mut(&folded) {
                    entry.away = Some(message);
                }
            }
            RPL_UNAWAY => debug!("server cleared our away state"),
            RPL_NOWAWAY => debug!("server marked us away"),
            RPL_WHOISUSER => self.on_whois_user(parsed),
            RPL_WHOISSERVER => self.on_whois_server(parsed),
            RPL_WHOISOPERATOR => self.on_whois_operator(parsed),
            RPL_WHOISIDLE => self.on_whois_idle(parsed),
            RPL_WHOISCHANNELS => self.on_whois_channels(parsed),
            RPL_ENDOFWHOIS => self.on_whois_end(parsed),
            ERR_NOSUCHNICK => {
                let nick = parsed.param(1);
                let folded = self.fold(nick);
                self.whois
                    .entry(folded)
                    .or_insert_with(|| WhoisInfo {
                        nick: nick.to_owned(),
                        ..WhoisInfo::default()
                    })
                    .exists = false;
            }
            RPL_WHOREPLY => self.on_who_reply(parsed),
            RPL_ENDOFWHO => {
                let target = parsed.param(1).to_owned();
                let entries = std::mem::take(&mut self.who);
                self.emit(EventKind::Who { target, entries });
            }
            RPL_CHANNELMODEIS => {
                let channel = parsed.param(1).to_owned();
                let source = parsed.source().unwrap_or_default();
                let pieces: Vec<&str> = parsed.params.get(2..).unwrap_or(&[]).to_vec();
                self.apply_channel_modes(&channel, &source, &pieces, false);
            }
            RPL_CREATIONTIME => {
                let channel = parsed.param(1);
                if let Some(created) = parsed
                    .param(2)
                    .parse::<i64>()
                    .ok()
                    .and_then(|ts| DateTime::from_timestamp(ts, 0))
                {
                    self.roster
                        .update_channel(channel, |c| c.created_at = Some(created));
                }
            }
            RPL_NOTOPIC => {
                let channel = parsed.param(1);
                self.roster.update_channel(channel, |c| c.topic = None);
            }
            RPL_TOPIC => {
                let channel = parsed.param(1);
                let text = parsed.trailing().to_owned();
                self.roster.update_channel(channel, |c| {
                    c.topic = Some(Topic {
                        text: text.clone(),
                        set_by: None,
                        set_at: None,
                    });
                });
            }
            RPL_TOPICWHOTIME => self.on_topic_whotime(parsed),
            RPL_BANLIST => self.on_list_entry(parsed, 'b'),
            RPL_EXCEPTLIST => self.on_list_entry(parsed, 'e'),
            RPL_INVITELIST => self.on_list_entry(parsed, 'I'),
            RPL_ENDOFBANLIST | RPL_ENDOFEXCEPTLIST | RPL_ENDOFINVITELIST => {
                debug!(channel = parsed.param(1), code, "end of mask list");
            }
            RPL_NAMREPLY => self.on_names(parsed),
            RPL_ENDOFNAMES => {
                let channel = parsed.param(1).to_owned();
                let nicks = self
                    .roster
                    .get_channel(&channel)
                    .map(|c| c.members.iter().map(|m| m.nick.clone()).collect())
                    .unwrap_or_default();
                self.emit(EventKind::UserList { channel, nicks });
            }
            RPL_MOTDSTART => self.server_info.clear_motd(),
            RPL_MOTD => {
                let line = parsed.trailing();
                self.server_info
                    .push_motd_line(line.strip_prefix("- ").unwrap_or(line));
            }
            RPL_ENDOFMOTD => {
                if let Some(motd) = self.server_info.motd() {
                    self.emit(EventKind::Motd { motd });
                }
            }
            ERR_NOMOTD => debug!("server has no MOTD"),
            ERR_ERRONEUSNICKNAME => {
                self.emit(EventKind::InvalidNick {
                    nick: parsed.param(1).to_owned(),
                    reason: parsed.trailing().to_owned(),
                });
            }
            ERR_NICKNAMEINUSE | ERR_UNAVAILRESOURCE => {
                return self.on_nick_in_use(parsed).await;
            }
            ERR_YOUREBANNEDCREEP => {
                let reason = parsed.trailing().to_owned();
                self.emit(EventKind::BannedFromServer {
                    reason: reason.clone(),
                });
                if !self.logged_in {
                    return Err(IrcRefusal::Banned { reason });
                }
            }
            ERR_CHANNELISFULL => self.on_join_refused(parsed, JoinRefusalKind::ChannelFull),
            ERR_INVITEONLYCHAN => self.on_join_refused(parsed, JoinRefusalKind::InviteOnly),
            ERR_BANNEDFROMCHAN => self.on_join_refused(parsed, JoinRefusalKind::Banned),
            ERR_BADCHANNELKEY => self.on_join_refused(parsed, JoinRefusalKind::BadKey),
            _ => {}
        }
        Ok(())
    }

    async fn on_welcome(&mut self, parsed: &RawLine<'_>) {
        // The nick in 001 is authoritative; the server may have mangled
        // what we asked for.
        let actual_nick = parsed.param(0).to_owned();
        let bot_nick = self.roster.bot_nick();
        if !actual_nick.is_empty() && actual_nick != bot_nick {
            self.roster.rename_user(&bot_nick, &actual_nick);
        }
        self.logged_in = true;
        self.attempted_nick = self.roster.bot_nick();
        self.in_run_attempts
            .store(0, std::sync::atomic::Ordering::Relaxed);
        if let Some(hook) = self.on_logged_in.take() {
            hook();
        }

        let server = parsed
            .prefix
            .map(str::to_owned)
            .unwrap_or_else(|| "server".to_owned());
        self.emit(EventKind::Connect { server });

        // Pick the session back up where the last one dropped it.
        let rejoin: Vec<(String, Option<String>)> = self.rejoin.drain().collect();
        for (channel, key) in rejoin {
            let line = match &key {
                Some(key) => format!("JOIN {channel} {key}"),
                None => format!("JOIN {channel}"),
            };
            let _ = self.raw.raw_line(&line).await;
        }
    }

    fn on_isupport(&mut self, parsed: &RawLine<'_>) {
        let Some(mut tokens) = parsed.params.get(1..) else {
            return;
        };
        // The trailing "are supported by this server" is not a token.
        if let Some(last) = tokens.last() {
            if last.contains(' ') {
                tokens = &tokens[..tokens.len() - 1];
            }
        }
        let entries = parse_tokens(tokens);
        if let Some(casemap) = self.server_info.apply_isupport(&entries) {
            self.roster.set_case_mapping(casemap);
        }
    }

    fn whois_entry(&mut self, nick: &str) -> &mut WhoisInfo {
        let folded = self.fold(nick);
        self.whois.entry(folded).or_insert_with(|| WhoisInfo {
            nick: nick.to_owned(),
            ..WhoisInfo::default()
        })
    }

    fn on_whois_user(&mut self, parsed: &RawLine<'_>) {
        let nick = parsed.param(1).to_owned();
        let login = parsed.param(2).to_owned();
        let hostname = parsed.param(3).to_owned();
        let realname = parsed.trailing().to_owned();

        self.roster.update_user(&nick, |u| {
            u.login = Some(login.clone());
            u.hostname = Some(hostname.clone());
            u.realname = Some(realname.clone());
        });

        let entry = self.whois_entry(&nick);
        entry.exists = true;
        entry.login = Some(login);
        entry.hostname = Some(hostname);
        entry.realname = Some(realname);
    }

    fn on_whois_server(&mut self, parsed: &RawLine<'_>) {
        let nick = parsed.param(1).to_owned();
        let server = parsed.param(2).to_owned();
        let server_info = parsed.trailing().to_owned();

        self.roster
            .update_user(&nick, |u| u.server = Some(server.clone()));

        let entry = self.whois_entry(&nick);
        entry.server = Some(server);
        entry.server_info = Some(server_info);
    }

    fn on_whois_operator(&mut self, parsed: &RawLine<'_>) {
        let nick = parsed.param(1).to_owned();
        self.roster.update_user(&nick, |u| u.irc_operator = true);
        self.whois_entry(&nick).operator = true;
    }

    fn on_whois_idle(&mut self, parsed: &RawLine<'_>) {
        let nick = parsed.param(1).to_owned();
        let idle = parsed.param(2).parse::<u64>().ok();
        let signon = parsed
            .param(3)
            .parse::<i64>()
            .ok()
            .and_then(|ts| DateTime::from_timestamp(ts, 0));
        let entry = self.whois_entry(&nick);
        entry.idle_secs = idle;
        entry.signon_at = signon;
    }

    fn on_whois_channels(&mut self, parsed: &RawLine<'_>) {
        let nick = parsed.param(1).to_owned();
        let channels: Vec<String> = parsed
            .trailing()
            .split_whitespace()
            .map(str::to_owned)
            .collect();
        self.whois_entry(&nick).channels = channels;
    }

    fn on_whois_end(&mut self, parsed: &RawLine<'_>) {
        let nick = parsed.param(1);
        let folded = self.fold(nick);
        let info = self.whois.remove(&folded).unwrap_or_else(|| WhoisInfo {
            nick: nick.to_owned(),
            ..WhoisInfo::default()
        });
        self.emit(EventKind::Whois(Box::new(info)));
    }

    fn on_who_reply(&mut self, parsed: &RawLine<'_>) {
        // <me> <channel> <login> <host> <server> <nick> <flags> :<hops> <realname>
        let channel = parsed.param(1).to_owned();
        let login = parsed.param(2).to_owned();
        let hostname = parsed.param(3).to_owned();
        let server = parsed.param(4).to_owned();
        let nick = parsed.param(5).to_owned();
        let flags = parsed.param(6).to_owned();
        let (hops, realname) = match parsed.trailing().split_once(' ') {
            Some((hops, realname)) => (hops.parse().unwrap_or(0), realname.to_owned()),
            None => (0, String::new()),
        };

        let away = flags.contains('G');
        let operator = flags.contains('*');
        let mask = Hostmask::new(
            Some(nick.clone()),
            Some(login.clone()),
            Some(hostname.clone()),
        );

        if channel != "*" && self.roster.contains_channel(&channel) {
            let prefix = self.server_info.prefix();
            let levels: Vec<UserLevel> = flags
                .chars()
                .filter_map(|c| prefix.mode_for_sigil(c))
                .filter_map(UserLevel::from_mode)
                .collect();
            self.roster.add_user_to_channel(&mask, &channel, &levels);
        }

        self.roster.update_user(&nick, |u| {
            u.realname = Some(realname.clone());
            u.server = Some(server.clone());
            u.irc_operator = operator;
            if away {
                u.away.get_or_insert_with(String::new);
            } else {
                u.away = None;
            }
        });

        self.who.push(WhoEntry {
            channel,
            login,
            hostname,
            server,
            nick,
            flags,
            hops,
            realname,
        });
    }

    fn on_topic_whotime(&mut self, parsed: &RawLine<'_>) {
        let channel = parsed.param(1).to_owned();
        let set_by = Hostmask::parse(parsed.param(2));
        let set_at = parsed
            .param(3)
            .parse::<i64>()
            .ok()
            .and_then(|ts| DateTime::from_timestamp(ts, 0));

        let mut text = None;
        self.roster.update_channel(&channel, |c| {
            if let Some(topic) = c.topic.as_mut() {
                topic.set_by = Some(set_by.clone());
                topic.set_at = set_at;
                text = Some(topic.text.clone());
            }
        });

        self.emit(EventKind::Topic {
            channel,
            topic: text,
            set_by: Some(set_by),
            set_at,
            changed: false,
        });
    }

    fn on_list_entry(&mut self, parsed: &RawLine<'_>, letter: char) {
        let channel = parsed.param(1);
        let mask = parsed.param(2).to_owned();
        let set_by = (!parsed.param(3).is_empty()).then(|| parsed.param(3).to_owned());
        let set_at = parsed
            .param(4)
            .parse::<i64>()
            .ok()
            .and_then(|ts| DateTime::from_timestamp(ts, 0));
        self.roster.update_channel(channel, |c| {
            if let Some(list) = c.list_for_mut(letter) {
                if !list.iter().any(|e| e.mask == mask) {
                    list.push(ListEntry {
                        mask: mask.clone(),
                        set_by: set_by.clone(),
                        set_at,
                    });
                }
            }
        });
    }

    fn on_names(&mut self, parsed: &RawLine<'_>) {
        // <me> [=|*|@] <channel> :[sigils]nick [[sigils]nick ...]
        let channel = if parsed.params.len() >= 4 {
            parsed.param(2)
        } else {
            parsed.param(1)
        };
        let prefix = self.server_info.prefix();
        for token in parsed.trailing().split_whitespace() {
            let (mode_chars, rest) = prefix.strip_sigils(token);
            if rest.is_empty() {
                continue;
            }
            let levels: Vec<UserLevel> = mode_chars
                .into_iter()
                .filter_map(UserLevel::from_mode)
                .collect();
            // userhost-in-names hands out full masks; plain NAMES just nicks.
            let mask = Hostmask::parse(rest);
            self.roster.add_user_to_channel(&mask, channel, &levels);
        }
    }

    async fn on_nick_in_use(&mut self, parsed: &RawLine<'_>) -> Result<(), IrcRefusal> {
        let taken = parsed.param(1).to_owned();
        if self.logged_in {
            self.emit(EventKind::NickAlreadyInUse {
                taken,
                fallback: None,
            });
            return Ok(());
        }

        let Some(alternative) = self.config.nick_alternatives.get(self.nick_ladder).cloned()
        else {
            self.emit(EventKind::NickAlreadyInUse {
                taken,
                fallback: None,
            });
            return Err(IrcRefusal::NickAlreadyInUse {
                nick: self.attempted_nick.clone(),
            });
        };
        self.nick_ladder += 1;

        let previous = self.attempted_nick.clone();
        self.attempted_nick = alternative.clone();
        self.roster.rename_user(&previous, &alternative);
        let _ = self
            .raw
            .raw_line_now(&format!("NICK {alternative}"))
            .await;
        self.emit(EventKind::NickAlreadyInUse {
            taken,
            fallback: Some(alternative),
        });
        Ok(())
    }

    fn on_join_refused(&mut self, parsed: &RawLine<'_>, kind: JoinRefusalKind) {
        self.emit(EventKind::JoinRefused {
            channel: parsed.param(1).to_owned(),
            kind,
            text: parsed.trailing().to_owned(),
        });
    }
}
