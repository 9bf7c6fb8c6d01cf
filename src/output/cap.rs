//! CAP negotiation commands.
//!
//! These bypass the flood queue: CAP runs during registration, where the
//! server is waiting on us and delay buys nothing.

use std::io;

use super::raw::OutputRaw;

/// CAP façade. Cheap to clone.
#[derive(Clone)]
pub struct OutputCap {
    raw: OutputRaw,
}

impl OutputCap {
    pub(crate) fn new(raw: OutputRaw) -> Self {
        Self { raw }
    }

    /// Ask for the server's capability list (CAP LS 302).
    pub async fn ls(&self) -> io::Result<()> {
        self.raw.raw_line_now("CAP LS 302").await
    }

    /// Request capabilities from the offer.
    pub async fn req(&self, caps: &[String]) -> io::Result<()> {
        self.raw
            .raw_line_now(&format!("CAP REQ :{}", caps.join(" ")))
            .await
    }

    /// Finish negotiation.
    pub async fn end(&self) -> io::Result<()> {
        self.raw.raw_line_now("CAP END").await
    }
}
