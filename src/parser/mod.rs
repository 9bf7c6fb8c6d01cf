//! The inbound line dispatcher.
//!
//! One [`InputParser`] lives for one connection attempt. Every server line
//! goes through [`InputParser::handle_line`]: tokenize, update the roster
//! and server info, then emit events, in that order, so listeners always
//! observe post-mutation state. Parse faults never kill the connection;
//! they surface as `Exception` events. The only fatal outcomes are
//! registration refusals, which come back as [`IrcRefusal`].

mod numerics;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicU32;

use chrono::Utc;
use tracing::{debug, warn};

use crate::config::Config;
use crate::dcc::DccRequest;
use crate::error::IrcRefusal;
use crate::events::{CapSubcommand, EventKind, WhoEntry, WhoisInfo};
use crate::listener::Dispatcher;
use crate::output::OutputRaw;
use crate::proto::ctcp::{Ctcp, CtcpKind};
use crate::proto::{Hostmask, RawLine};
use crate::serverinfo::ServerInfo;
use crate::state::{Roster, Topic, UserLevel};

/// Parses and dispatches inbound lines for one connection.
pub struct InputParser {
    config: Arc<Config>,
    roster: Arc<Roster>,
    server_info: Arc<ServerInfo>,
    raw: OutputRaw,
    dispatcher: Arc<Dispatcher>,
    in_run_attempts: Arc<AtomicU32>,

    logged_in: bool,
    /// The nick we are currently trying to register.
    attempted_nick: String,
    /// Index of the next entry of `nick_alternatives` to try on 433.
    nick_ladder: usize,
    /// Channels (name → key) to rejoin after 001, from the last session.
    rejoin: HashMap<String, Option<String>>,
    /// Runs once on 001; the engine hangs its login-time work here.
    on_logged_in: Option<Box<dyn FnOnce() + Send>>,
    /// ERROR text, kept for the Disconnect event.
    disconnect_cause: Option<String>,

    enabled_caps: Vec<String>,
    /// Accumulates a multi-line CAP LS offer.
    cap_offer: Vec<String>,
    cap_end_sent: bool,

    whois: HashMap<String, WhoisInfo>,
    who: Vec<WhoEntry>,
}

impl InputParser {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        config: Arc<Config>,
        roster: Arc<Roster>,
        server_info: Arc<ServerInfo>,
        raw: OutputRaw,
        dispatcher: Arc<Dispatcher>,
        in_run_attempts: Arc<AtomicU32>,
        rejoin: Vec<(String, Option<String>)>,
        on_logged_in: Option<Box<dyn FnOnce() + Send>>,
    ) -> Self {
        let attempted_nick = config.name.clone();
        Self {
            config,
            roster,
            server_info,
            raw,
            dispatcher,
            in_run_attempts,
            logged_in: false,
            attempted_nick,
            nick_ladder: 0,
            rejoin: rejoin.into_iter().collect(),
            on_logged_in,
            disconnect_cause: None,
            enabled_caps: Vec::new(),
            cap_offer: Vec::new(),
            cap_end_sent: false,
            whois: HashMap::new(),
            who: Vec::new(),
        }
    }

    /// Whether 001 has been seen on this connection.
    pub fn logged_in(&self) -> bool {
        self.logged_in
    }

    /// Capabilities the server ACKed.
    pub fn enabled_capabilities(&self) -> &[String] {
        &self.enabled_caps
    }

    /// The ERROR text the server sent, if it sent one.
    pub(crate) fn take_disconnect_cause(&mut self) -> Option<String> {
        self.disconnect_cause.take()
    }

    /// Drop per-connection assembly state. The roster outlives this only to
    /// be snapshotted.
    pub(crate) fn close(&mut self) {
        self.whois.clear();
        self.who.clear();
        self.cap_offer.clear();
        self.rejoin.clear();
    }

    fn emit(&self, kind: EventKind) {
        self.dispatcher.emit(kind);
    }

    fn fold(&self, s: &str) -> String {
        self.roster.case_mapping().lower(s)
    }

    /// Handle one server line. `Err` means the server refused us during
    /// registration and the connection is over.
    pub async fn handle_line(&mut self, line: &str) -> Result<(), IrcRefusal> {
        debug!(line, "<<");
        let parsed = match RawLine::parse(line) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(line, error = %e, "unparseable line");
                self.emit(EventKind::Exception {
                    error: e.to_string(),
                    context: format!("parsing line {line}"),
                });
                return Ok(());
            }
        };

        // Latest sighting of a known user refreshes its identity, whatever
        // the command turns out to be.
        if let Some(source) = parsed.source() {
            if source.is_user() {
                self.roster.refresh_user(&source);
            }
        }

        if let Some(code) = parsed.numeric() {
            self.emit(EventKind::ServerResponse {
                code,
                raw: line.to_owned(),
            });
            return self.handle_numeric(code, &parsed).await;
        }

        self.handle_command(line, &parsed).await
    }

    async fn handle_command(&mut self, line: &str, parsed: &RawLine<'_>) -> Result<(), IrcRefusal> {
        let source = parsed.source().unwrap_or_default();
        match parsed.command.to_ascii_uppercase().as_str() {
            "PING" => {
                // Liveness challenge; answer ahead of the flood queue.
                let reply = format!("PONG :{}", parsed.trailing());
                if let Err(e) = self.raw.raw_line_now(&reply).await {
                    warn!(error = %e, "failed to answer PING");
                }
            }
            "PONG" => debug!(token = parsed.trailing(), "keepalive answered"),
            "PRIVMSG" => self.handle_privmsg(parsed, source),
            "NOTICE" => self.handle_notice(parsed, source),
            "JOIN" => self.handle_join(parsed, source).await,
            "PART" => self.handle_part(parsed, source),
            "KICK" => self.handle_kick(parsed, source),
            "QUIT" => self.handle_quit(parsed, source),
            "NICK" => self.handle_nick(parsed, source),
            "MODE" => self.handle_mode(parsed, source),
            "TOPIC" => self.handle_topic(parsed, source),
            "INVITE" => {
                let channel = parsed.trailing().to_owned();
                self.emit(EventKind::Invite { source, channel });
            }
            "AWAY" => {
                let message =
                    (!parsed.params.is_empty()).then(|| parsed.trailing().to_owned());
                if let Some(nick) = source.nick.as_deref() {
                    self.roster
                        .update_user(nick, |u| u.away.clone_from(&message));
                }
                self.emit(EventKind::Away {
                    user: source,
                    message,
                });
            }
            "ACCOUNT" => {
                let account = match parsed.param(0) {
                    "*" | "" => None,
                    account => Some(account.to_owned()),
                };
                if let Some(nick) = source.nick.as_deref() {
                    self.roster
                        .update_user(nick, |u| u.account.clone_from(&account));
                }
                self.emit(EventKind::Account {
                    user: source,
                    account,
                });
            }
            "CAP" => self.handle_cap(parsed).await?,
            "ERROR" => {
                let reason = parsed.trailing().to_owned();
                if !self.logged_in {
                    return Err(IrcRefusal::ClosingLink { reason });
                }
                // The server will close the socket; just remember why.
                self.disconnect_cause = Some(reason);
            }
            _ => {
                self.emit(EventKind::Unknown {
                    line: line.to_owned(),
                });
            }
        }
        Ok(())
    }

    fn handle_privmsg(&mut self, parsed: &RawLine<'_>, source: Hostmask) {
        let target = parsed.param(0).to_owned();
        let body = parsed.trailing();

        if Ctcp::is_ctcp(body) {
            let Some(ctcp) = Ctcp::parse(body) else {
                return;
            };
            match ctcp.kind {
                CtcpKind::Action => self.emit(EventKind::Action {
                    source,
                    target,
                    text: ctcp.params.unwrap_or("").to_owned(),
                }),
                CtcpKind::Version => self.emit(EventKind::Version { source, target }),
                CtcpKind::Time => self.emit(EventKind::Time { source, target }),
                CtcpKind::Ping => self.emit(EventKind::Ping {
                    source,
                    target,
                    token: ctcp.params.map(str::to_owned),
                }),
                CtcpKind::Finger => self.emit(EventKind::Finger { source, target }),
                CtcpKind::Clientinfo => self.emit(EventKind::ClientInfo { source, target }),
                CtcpKind::Dcc => {
                    let Some(request) = ctcp.params.and_then(DccRequest::parse) else {
                        return;
                    };
                    self.config.dcc_handler.on_request(source, request);
                }
                CtcpKind::Unknown(_) => self.emit(EventKind::UnknownCtcp {
                    source,
                    target,
                    payload: ctcp.to_string(),
                }),
            }
            return;
        }

        if self.server_info.is_channel(&target) {
            // A speaker on one of our channels is a membership sighting.
            if self.roster.contains_channel(&target) {
                self.roster.add_user_to_channel(&source, &target, &[]);
            }
            self.emit(EventKind::Message {
                channel: target,
                source,
                text: body.to_owned(),
            });
        } else {
            self.emit(EventKind::PrivateMessage {
                source,
                text: body.to_owned(),
            });
        }
    }

    fn handle_notice(&mut self, parsed: &RawLine<'_>, source: Hostmask) {
        let target = parsed.param(0).to_owned();
        let body = parsed.trailing();

        if Ctcp::is_ctcp(body) {
            let Some(ctcp) = Ctcp::parse(body) else {
                return;
            };
            match ctcp.kind {
                CtcpKind::Action => self.emit(EventKind::Action {
                    source,
                    target,
                    text: ctcp.params.unwrap_or("").to_owned(),
                }),
                CtcpKind::Dcc => {
                    if let Some(request) = ctcp.params.and_then(DccRequest::parse) {
                        self.config.dcc_handler.on_request(source, request);
                    }
                }
                // CTCP replies arrive as notices; surface them untyped.
                _ => self.emit(EventKind::UnknownCtcp {
                    source,
                    target,
                    payload: ctcp.to_string(),
                }),
            }
            return;
        }

        self.emit(EventKind::Notice {
            source,
            target,
            text: body.to_owned(),
        });
    }

    async fn handle_join(&mut self, parsed: &RawLine<'_>, source: Hostmask) {
        let channel = parsed.param(0).to_owned();
        let we_joined = source
            .nick
            .as_deref()
            .is_some_and(|nick| self.roster.is_bot(nick));

        if we_joined {
            self.roster.ensure_channel(&channel);
            // The echo of our own JOIN carries our hostmask as the server
            // sees it.
            self.roster.get_or_create_user(&source);
            self.roster.add_user_to_channel(&source, &channel, &[]);
            // A key replayed from the last session is spent now.
            let folded = self.fold(&channel);
            self.rejoin.remove(&folded);
            // Prime modes and membership details.
            let _ = self.raw.raw_line(&format!("WHO {channel}")).await;
            let _ = self.raw.raw_line(&format!("MODE {channel}")).await;
        } else {
            self.roster.add_user_to_channel(&source, &channel, &[]);
        }

        self.emit(EventKind::Join {
            channel,
            user: source,
        });
    }

    fn handle_part(&mut self, parsed: &RawLine<'_>, source: Hostmask) {
        let channel = parsed.param(0).to_owned();
        let reason = (parsed.params.len() > 1).then(|| parsed.trailing().to_owned());
        let Some(nick) = source.nick.clone() else {
            return;
        };

        if self.roster.is_bot(&nick) {
            let user = self.roster.get_user(&nick);
            self.roster.drop_channel(&channel);
            if let Some(user) = user {
                self.emit(EventKind::Part {
                    channel,
                    user,
                    reason,
                });
            }
        } else if let Some(user) = self.roster.remove_user_from_channel(&nick, &channel) {
            self.emit(EventKind::Part {
                channel,
                user,
                reason,
            });
        }
    }

    fn handle_kick(&mut self, parsed: &RawLine<'_>, kicker: Hostmask) {
        let channel = parsed.param(0).to_owned();
        let victim = parsed.param(1).to_owned();
        let reason = (parsed.params.len() > 2).then(|| parsed.trailing().to_owned());

        let recipient = if self.roster.is_bot(&victim) {
            let user = self.roster.get_user(&victim);
            self.roster.drop_channel(&channel);
            user
        } else {
            self.roster.remove_user_from_channel(&victim, &channel)
        };

        if let Some(recipient) = recipient {
            self.emit(EventKind::Kick {
                channel,
                kicker,
                recipient,
                reason,
            });
        }
    }

    fn handle_quit(&mut self, parsed: &RawLine<'_>, source: Hostmask) {
        let Some(nick) = source.nick.as_deref() else {
            return;
        };
        if self.roster.is_bot(nick) {
            // Our own QUIT plays out as EOF on the socket.
            return;
        }
        let reason = (!parsed.params.is_empty()).then(|| parsed.trailing().to_owned());
        if let Some(user) = self.roster.remove_user(nick) {
            self.emit(EventKind::Quit { user, reason });
        }
    }

    fn handle_nick(&mut self, parsed: &RawLine<'_>, source: Hostmask) {
        let Some(old_nick) = source.nick.clone() else {
            return;
        };
        let new_nick = parsed.param(0).to_owned();
        if !self.roster.rename_user(&old_nick, &new_nick) {
            return;
        }
        if !self.logged_in && self.roster.is_bot(&new_nick) {
            self.attempted_nick = new_nick.clone();
        }
        let user = Hostmask::new(
            Some(new_nick.clone()),
            source.login.clone(),
            source.hostname.clone(),
        );
        self.emit(EventKind::NickChange {
            old_nick,
            new_nick,
            user,
        });
    }

    fn handle_topic(&mut self, parsed: &RawLine<'_>, source: Hostmask) {
        let channel = parsed.param(0).to_owned();
        let text = parsed.trailing();
        let topic = (!text.is_empty()).then(|| text.to_owned());
        let now = Utc::now();
        self.roster.update_channel(&channel, |c| {
            c.topic = topic.clone().map(|text| Topic {
                text,
                set_by: Some(source.clone()),
                set_at: Some(now),
            });
        });
        self.emit(EventKind::Topic {
            channel,
            topic,
            set_by: Some(source),
            set_at: Some(now),
            changed: true,
        });
    }

    /// Walk a channel mode string against PREFIX and CHANMODES.
    ///
    /// `announce` is false for 324 replies, which describe standing state
    /// rather than a change.
    fn apply_channel_modes(
        &mut self,
        channel: &str,
        source: &Hostmask,
        pieces: &[&str],
        announce: bool,
    ) {
        let Some((mode_word, args)) = pieces.split_first() else {
            return;
        };
        let prefix = self.server_info.prefix();
        let classes = self.server_info.chanmodes();
        let mut args = args.iter();
        let mut adding = true;

        for letter in mode_word.chars() {
            match letter {
                '+' => adding = true,
                '-' => adding = false,
                _ if prefix.is_status_mode(letter) => {
                    let Some(&recipient) = args.next() else {
                        continue;
                    };
                    let Some(level) = UserLevel::from_mode(letter) else {
                        continue;
                    };
                    if adding {
                        self.roster.grant_level(channel, recipient, level);
                    } else {
                        self.roster.revoke_level(channel, recipient, level);
                    }
                    if announce {
                        self.emit(EventKind::UserLevelChange {
                            channel: channel.to_owned(),
                            source: source.clone(),
                            recipient: recipient.to_owned(),
                            level,
                            granted: adding,
                        });
                    }
                }
                _ => {
                    let takes_arg = classes.takes_arg(letter, adding);
                    let argument = takes_arg
                        .then(|| args.next().map(|a| (*a).to_owned()))
                        .flatten();
                    if classes.is_list(letter) {
                        self.roster.update_channel(channel, |c| {
                            if let (Some(list), Some(mask)) =
                                (c.list_for_mut(letter), argument.clone())
                            {
                                if adding {
                                    if !list.iter().any(|e| e.mask == mask) {
                                        list.push(crate::state::ListEntry {
                                            mask,
                                            set_by: None,
                                            set_at: None,
                                        });
                                    }
                                } else {
                                    list.retain(|e| e.mask != mask);
                                }
                            }
                        });
                    } else {
                        self.roster.update_channel(channel, |c| {
                            if adding {
                                c.apply_mode(letter, argument.clone());
                            } else {
                                c.clear_mode(letter);
                            }
                        });
                    }
                    if announce {
                        self.emit(EventKind::ChannelModeChange {
                            channel: channel.to_owned(),
                            source: source.clone(),
                            letter,
                            set: adding,
                            argument,
                        });
                    }
                }
            }
        }
    }

    fn handle_mode(&mut self, parsed: &RawLine<'_>, source: Hostmask) {
        let target = parsed.param(0).to_owned();
        if !self.server_info.is_channel(&target) {
            debug!(target, modes = parsed.param(1), "user mode change");
            return;
        }
        let mode_line = parsed.params[1..].join(" ");
        self.emit(EventKind::Mode {
            channel: target.clone(),
            source: source.clone(),
            mode_line,
        });
        let pieces: Vec<&str> = parsed.params[1..].to_vec();
        self.apply_channel_modes(&target, &source, &pieces, true);
    }

    async fn handle_cap(&mut self, parsed: &RawLine<'_>) -> Result<(), IrcRefusal> {
        // :server CAP <target> <sub> [*] :<caps>
        let sub = parsed.param(1).to_ascii_uppercase();
        let more_coming = parsed.param(2) == "*";
        let caps: Vec<String> = parsed
            .trailing()
            .split_whitespace()
            .map(str::to_owned)
            .collect();

        match sub.as_str() {
            "LS" => {
                self.cap_offer.extend(caps.clone());
                self.emit(EventKind::Cap {
                    subcommand: CapSubcommand::Ls,
                    caps,
                });
                if more_coming {
                    return Ok(());
                }
                let offer = std::mem::take(&mut self.cap_offer);
                let wanted: Vec<String> = self
                    .config
                    .capabilities
                    .iter()
                    .filter(|cap| {
                        // Offers may carry `key=value`; match on the key.
                        offer
                            .iter()
                            .any(|o| o.split('=').next() == Some(cap.as_str()))
                    })
                    .cloned()
                    .collect();
                if wanted.is_empty() {
                    self.finish_cap().await;
                } else {
                    let req = format!("CAP REQ :{}", wanted.join(" "));
                    let _ = self.raw.raw_line_now(&req).await;
                }
            }
            "ACK" => {
                for cap in &caps {
                    let cap = cap.trim_start_matches('-');
                    if !self.enabled_caps.iter().any(|c| c == cap) {
                        self.enabled_caps.push(cap.to_owned());
                    }
                }
                self.emit(EventKind::Cap {
                    subcommand: CapSubcommand::Ack,
                    caps,
                });
                self.finish_cap().await;
            }
            "NAK" => {
                self.emit(EventKind::Cap {
                    subcommand: CapSubcommand::Nak,
                    caps,
                });
                self.finish_cap().await;
            }
            "LIST" => self.emit(EventKind::Cap {
                subcommand: CapSubcommand::List,
                caps,
            }),
            "NEW" => self.emit(EventKind::Cap {
                subcommand: CapSubcommand::New,
                caps,
            }),
            "DEL" => {
                self.enabled_caps.retain(|c| !caps.contains(c));
                self.emit(EventKind::Cap {
                    subcommand: CapSubcommand::Del,
                    caps,
                });
            }
            other => debug!(subcommand = other, "unhandled CAP subcommand"),
        }
        Ok(())
    }

    /// CAP END once, and only while registering.
    async fn finish_cap(&mut self) {
        if self.logged_in || self.cap_end_sent {
            return;
        }
        self.cap_end_sent = true;
        let _ = self.raw.raw_line_now("CAP END").await;
    }
}
