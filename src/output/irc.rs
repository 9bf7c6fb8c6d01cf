//! High-level IRC commands over the raw sink.
//!
//! Stateless: every method serializes one command and hands it to the flood
//! queue. Nothing here waits for the server's answer; replies come back
//! through the event bus.

use std::io;

use crate::proto::ctcp::Ctcp;

use super::raw::OutputRaw;

/// Command façade. Cheap to clone.
#[derive(Clone)]
pub struct OutputIrc {
    raw: OutputRaw,
}

impl OutputIrc {
    pub(crate) fn new(raw: OutputRaw) -> Self {
        Self { raw }
    }

    /// Join a channel.
    pub async fn join(&self, channel: &str) -> io::Result<()> {
        self.raw.raw_line(&format!("JOIN {channel}")).await
    }

    /// Join a keyed channel.
    pub async fn join_with_key(&self, channel: &str, key: &str) -> io::Result<()> {
        self.raw.raw_line(&format!("JOIN {channel} {key}")).await
    }

    /// Leave a channel.
    pub async fn part(&self, channel: &str) -> io::Result<()> {
        self.raw.raw_line(&format!("PART {channel}")).await
    }

    /// Leave a channel with a message.
    pub async fn part_with_reason(&self, channel: &str, reason: &str) -> io::Result<()> {
        self.raw.raw_line(&format!("PART {channel} :{reason}")).await
    }

    /// PRIVMSG a channel or nick.
    pub async fn message(&self, target: &str, text: &str) -> io::Result<()> {
        self.raw.raw_line(&format!("PRIVMSG {target} :{text}")).await
    }

    /// CTCP ACTION (`/me`).
    pub async fn action(&self, target: &str, text: &str) -> io::Result<()> {
        let body = Ctcp::frame("ACTION", Some(text));
        self.message(target, &body).await
    }

    /// NOTICE a channel or nick.
    pub async fn notice(&self, target: &str, text: &str) -> io::Result<()> {
        self.raw.raw_line(&format!("NOTICE {target} :{text}")).await
    }

    /// Send a CTCP request inside a PRIVMSG.
    pub async fn ctcp_request(&self, target: &str, command: &str) -> io::Result<()> {
        let body = Ctcp::frame(&command.to_ascii_uppercase(), None);
        self.message(target, &body).await
    }

    /// Send a CTCP reply inside a NOTICE, per convention.
    pub async fn ctcp_reply(&self, target: &str, command: &str, text: &str) -> io::Result<()> {
        let body = Ctcp::frame(&command.to_ascii_uppercase(), Some(text));
        self.notice(target, &body).await
    }

    /// Change or query modes.
    pub async fn mode(&self, target: &str, mode_line: &str) -> io::Result<()> {
        self.raw.raw_line(&format!("MODE {target} {mode_line}")).await
    }

    /// Kick a user.
    pub async fn kick(&self, channel: &str, nick: &str) -> io::Result<()> {
        self.raw.raw_line(&format!("KICK {channel} {nick}")).await
    }

    /// Kick a user with a reason.
    pub async fn kick_with_reason(
        &self,
        channel: &str,
        nick: &str,
        reason: &str,
    ) -> io::Result<()> {
        self.raw
            .raw_line(&format!("KICK {channel} {nick} :{reason}"))
            .await
    }

    /// Invite a nick to a channel.
    pub async fn invite(&self, nick: &str, channel: &str) -> io::Result<()> {
        self.raw.raw_line(&format!("INVITE {nick} {channel}")).await
    }

    /// Query a channel topic.
    pub async fn topic(&self, channel: &str) -> io::Result<()> {
        self.raw.raw_line(&format!("TOPIC {channel}")).await
    }

    /// Set a channel topic.
    pub async fn set_topic(&self, channel: &str, topic: &str) -> io::Result<()> {
        self.raw.raw_line(&format!("TOPIC {channel} :{topic}")).await
    }

    /// Request a nick change.
    pub async fn nick(&self, new_nick: &str) -> io::Result<()> {
        self.raw.raw_line(&format!("NICK {new_nick}")).await
    }

    /// WHOIS a nick.
    pub async fn whois(&self, nick: &str) -> io::Result<()> {
        self.raw.raw_line(&format!("WHOIS {nick}")).await
    }

    /// WHO a channel or mask.
    pub async fn who(&self, target: &str) -> io::Result<()> {
        self.raw.raw_line(&format!("WHO {target}")).await
    }

    /// NAMES a channel.
    pub async fn names(&self, channel: &str) -> io::Result<()> {
        self.raw.raw_line(&format!("NAMES {channel}")).await
    }

    /// Mark ourselves away.
    pub async fn away(&self, message: &str) -> io::Result<()> {
        self.raw.raw_line(&format!("AWAY :{message}")).await
    }

    /// Clear our away state.
    pub async fn back(&self) -> io::Result<()> {
        self.raw.raw_line("AWAY").await
    }

    /// Quit the server; it will close the link in response.
    pub async fn quit(&self) -> io::Result<()> {
        self.raw.raw_line("QUIT").await
    }

    /// Quit with a message.
    pub async fn quit_with_reason(&self, reason: &str) -> io::Result<()> {
        self.raw.raw_line(&format!("QUIT :{reason}")).await
    }
}
