//! The DCC collaborator seam.
//!
//! The engine does not speak DCC itself; it unwraps `\x01DCC ...\x01`
//! CTCPs and hands them to whatever [`DccHandler`] the configuration names.
//! The handler owns its own sockets and lifetime; the engine only promises
//! to call [`DccHandler::close`] at connection shutdown.

use crate::proto::Hostmask;

/// A parsed `DCC` CTCP request.
///
/// The wire form is `DCC <command> <args...>`, e.g.
/// `DCC SEND <filename> <ip> <port> <size>` or `DCC CHAT chat <ip> <port>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DccRequest {
    /// The subcommand (`SEND`, `CHAT`, `RESUME`, `ACCEPT`, ...), uppercased.
    pub command: String,
    /// Remaining tokens, unparsed.
    pub args: Vec<String>,
}

impl DccRequest {
    /// Split a CTCP DCC argument blob.
    pub fn parse(params: &str) -> Option<Self> {
        let mut tokens = params.split_whitespace();
        let command = tokens.next()?.to_ascii_uppercase();
        Some(Self {
            command,
            args: tokens.map(str::to_owned).collect(),
        })
    }

    /// The filename argument of a SEND/RESUME/ACCEPT.
    pub fn filename(&self) -> Option<&str> {
        match self.command.as_str() {
            "SEND" | "RESUME" | "ACCEPT" => self.args.first().map(String::as_str),
            _ => None,
        }
    }

    /// The (address, port) pair of a SEND/CHAT, decoding the classic
    /// integer-encoded IPv4 form.
    pub fn address(&self) -> Option<(std::net::IpAddr, u16)> {
        let (addr_idx, port_idx) = match self.command.as_str() {
            "SEND" => (1, 2),
            "CHAT" => (1, 2),
            _ => return None,
        };
        let raw_addr = self.args.get(addr_idx)?;
        let port: u16 = self.args.get(port_idx)?.parse().ok()?;
        let addr = if let Ok(packed) = raw_addr.parse::<u32>() {
            std::net::IpAddr::V4(std::net::Ipv4Addr::from(packed))
        } else {
            raw_addr.parse().ok()?
        };
        Some((addr, port))
    }
}

/// Consumes DCC requests the parser unwraps.
pub trait DccHandler: Send + Sync {
    /// An inbound DCC CTCP arrived from `source`.
    fn on_request(&self, source: Hostmask, request: DccRequest);

    /// The connection is shutting down; abort transfers, close sockets.
    fn close(&self);
}

/// Discards every request. The default when no handler is configured.
#[derive(Debug, Default)]
pub struct NullDccHandler;

impl DccHandler for NullDccHandler {
    fn on_request(&self, source: Hostmask, request: DccRequest) {
        tracing::debug!(%source, command = %request.command, "ignoring DCC request");
    }

    fn close(&self) {}
}
