//! Outbound DCC negotiation framing.
//!
//! Serializes the CTCP `DCC` offers and answers the DCC collaborator needs
//! to send; the transfers themselves happen outside the engine.

use std::io;
use std::net::IpAddr;

use crate::proto::ctcp::Ctcp;

use super::raw::OutputRaw;

/// DCC façade. Cheap to clone.
#[derive(Clone)]
pub struct OutputDcc {
    raw: OutputRaw,
}

impl OutputDcc {
    pub(crate) fn new(raw: OutputRaw) -> Self {
        Self { raw }
    }

    fn encode_addr(addr: IpAddr) -> String {
        match addr {
            // Classic DCC carries IPv4 as a decimal u32.
            IpAddr::V4(v4) => u32::from(v4).to_string(),
            IpAddr::V6(v6) => v6.to_string(),
        }
    }

    async fn ctcp(&self, target: &str, payload: &str) -> io::Result<()> {
        let body = Ctcp::frame("DCC", Some(payload));
        self.raw
            .raw_line(&format!("PRIVMSG {target} :{body}"))
            .await
    }

    /// Offer a file transfer.
    pub async fn send_file(
        &self,
        target: &str,
        filename: &str,
        addr: IpAddr,
        port: u16,
        size: u64,
    ) -> io::Result<()> {
        let addr = Self::encode_addr(addr);
        self.ctcp(target, &format!("SEND {filename} {addr} {port} {size}"))
            .await
    }

    /// Offer a DCC chat session.
    pub async fn chat(&self, target: &str, addr: IpAddr, port: u16) -> io::Result<()> {
        let addr = Self::encode_addr(addr);
        self.ctcp(target, &format!("CHAT chat {addr} {port}")).await
    }

    /// Ask to resume an interrupted transfer at `position`.
    pub async fn resume(
        &self,
        target: &str,
        filename: &str,
        port: u16,
        position: u64,
    ) -> io::Result<()> {
        self.ctcp(target, &format!("RESUME {filename} {port} {position}"))
            .await
    }

    /// Accept a resume request at `position`.
    pub async fn accept(
        &self,
        target: &str,
        filename: &str,
        port: u16,
        position: u64,
    ) -> io::Result<()> {
        self.ctcp(target, &format!("ACCEPT {filename} {port} {position}"))
            .await
    }
}
