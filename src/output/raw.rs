//! The raw output sink.
//!
//! One writer, one lock, two speeds: [`OutputRaw::raw_line`] queues behind
//! the flood controller, [`OutputRaw::raw_line_now`] jumps it (PONG, the
//! registration handshake). The lock is held across the flood sleep on
//! purpose: that is what makes concurrent senders line up instead of
//! racing the clock.
//!
//! Truncation happens here: a line is encoded, cut to `max_line_length - 2`
//! bytes on a character boundary, and CRLF-framed, so nothing oversized or
//! multi-line can reach the wire no matter which façade produced it.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use encoding_rs::Encoding;
use tokio::io::{AsyncWriteExt, WriteHalf};
use tokio::sync::Mutex;
use tracing::trace;

use crate::events::{Event, EventKind};
use crate::listener::EventBus;
use crate::net::BoxedTransport;

/// The writer half of the current connection, if one is up.
pub(crate) type Writer = WriteHalf<BoxedTransport>;

struct Slot {
    sink: Option<Writer>,
    last_send: Instant,
}

struct Inner {
    slot: Mutex<Slot>,
    message_delay: Duration,
    max_line_length: usize,
    encoding: &'static Encoding,
    bus: Arc<dyn EventBus>,
    connection_id: AtomicU32,
}

/// Shared handle to the raw sink. Cheap to clone.
#[derive(Clone)]
pub struct OutputRaw {
    inner: Arc<Inner>,
}

impl OutputRaw {
    pub(crate) fn new(
        message_delay: Duration,
        max_line_length: usize,
        encoding: &'static Encoding,
        bus: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                slot: Mutex::new(Slot {
                    sink: None,
                    last_send: Instant::now() - message_delay,
                }),
                message_delay,
                max_line_length,
                encoding,
                bus,
                connection_id: AtomicU32::new(0),
            }),
        }
    }

    /// Wire up the writer of a fresh connection.
    pub(crate) async fn attach(&self, writer: Writer, connection_id: u32) {
        self.inner
            .connection_id
            .store(connection_id, Ordering::Relaxed);
        let mut slot = self.inner.slot.lock().await;
        slot.sink = Some(writer);
        slot.last_send = Instant::now() - self.inner.message_delay;
    }

    /// Drop the writer; later sends fail with `NotConnected`.
    pub(crate) async fn detach(&self) {
        self.inner.slot.lock().await.sink = None;
    }

    /// Queue a line behind the flood controller.
    pub async fn raw_line(&self, line: &str) -> io::Result<()> {
        self.send(line, None, false).await
    }

    /// Write a line immediately, bypassing the flood delay.
    pub async fn raw_line_now(&self, line: &str) -> io::Result<()> {
        self.send(line, None, true).await
    }

    /// Write immediately, logging/reporting `masked` instead of the real
    /// line. The wire still carries the secret.
    pub async fn raw_line_now_masked(&self, line: &str, masked: &str) -> io::Result<()> {
        self.send(line, Some(masked), true).await
    }

    /// Queue behind the flood controller, logging `masked`.
    pub async fn raw_line_masked(&self, line: &str, masked: &str) -> io::Result<()> {
        self.send(line, Some(masked), false).await
    }

    async fn send(&self, line: &str, masked: Option<&str>, bypass: bool) -> io::Result<()> {
        let payload = self.encode_framed(line);
        let mut slot = self.inner.slot.lock().await;
        if !bypass {
            let since_last = slot.last_send.elapsed();
            if since_last < self.inner.message_delay {
                tokio::time::sleep(self.inner.message_delay - since_last).await;
            }
        }
        let sink = slot
            .sink
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "not connected"))?;
        sink.write_all(&payload).await?;
        sink.flush().await?;
        slot.last_send = Instant::now();

        let shown = masked.unwrap_or(line);
        trace!(line = shown, bypass, "sent");
        self.inner.bus.on_event(Event::now(
            self.inner.connection_id.load(Ordering::Relaxed),
            EventKind::Output {
                line: shown.to_owned(),
            },
        ));
        Ok(())
    }

    /// Encode, cut to budget on a character boundary, CRLF-frame.
    ///
    /// Embedded line breaks end the line early; a caller can never smuggle
    /// a second command through a text parameter.
    fn encode_framed(&self, line: &str) -> Vec<u8> {
        let line = match line.find(['\r', '\n']) {
            Some(cut) => line[..cut].trim_end(),
            None => line,
        };
        let budget = self.inner.max_line_length.saturating_sub(2);
        let (encoded, _, _) = self.inner.encoding.encode(line);
        let mut bytes = if encoded.len() <= budget {
            encoded.into_owned()
        } else {
            let mut end = line.len();
            loop {
                end -= 1;
                while end > 0 && !line.is_char_boundary(end) {
                    end -= 1;
                }
                let (shorter, _, _) = self.inner.encoding.encode(&line[..end]);
                if shorter.len() <= budget {
                    break shorter.into_owned();
                }
            }
        };
        bytes.extend_from_slice(b"\r\n");
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::ChannelEventBus;

    fn raw_with_bus() -> (OutputRaw, tokio::sync::mpsc::UnboundedReceiver<Event>) {
        let (bus, rx) = ChannelEventBus::new();
        let raw = OutputRaw::new(
            Duration::from_millis(100),
            512,
            encoding_rs::UTF_8,
            Arc::new(bus),
        );
        (raw, rx)
    }

    async fn attach_duplex(raw: &OutputRaw) -> tokio::io::DuplexStream {
        let (ours, theirs) = tokio::io::duplex(4096);
        let transport: BoxedTransport = Box::new(ours);
        let (_read, write) = tokio::io::split(transport);
        raw.attach(write, 1).await;
        theirs
    }

    async fn read_available(peer: &mut tokio::io::DuplexStream) -> Vec<u8> {
        use tokio::io::AsyncReadExt;
        let mut buf = vec![0u8; 4096];
        let n = peer.read(&mut buf).await.unwrap();
        buf.truncate(n);
        buf
    }

    #[tokio::test]
    async fn test_not_connected() {
        let (raw, _rx) = raw_with_bus();
        let err = raw.raw_line_now("PING 1").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[tokio::test]
    async fn test_crlf_framing_and_output_event() {
        let (raw, mut rx) = raw_with_bus();
        let mut peer = attach_duplex(&raw).await;
        raw.raw_line_now("NICK bot").await.unwrap();
        assert_eq!(read_available(&mut peer).await, b"NICK bot\r\n");
        let event = rx.recv().await.unwrap();
        assert!(matches!(event.kind, EventKind::Output { line } if line == "NICK bot"));
    }

    #[tokio::test]
    async fn test_masked_output_event() {
        let (raw, mut rx) = raw_with_bus();
        let mut peer = attach_duplex(&raw).await;
        raw.raw_line_now_masked("PASS hunter2", "PASS ********")
            .await
            .unwrap();
        assert_eq!(read_available(&mut peer).await, b"PASS hunter2\r\n");
        let event = rx.recv().await.unwrap();
        assert!(matches!(event.kind, EventKind::Output { line } if line == "PASS ********"));
    }

    #[tokio::test]
    async fn test_masked_queued_send() {
        let (raw, mut rx) = raw_with_bus();
        let mut peer = attach_duplex(&raw).await;
        raw.raw_line_masked("PRIVMSG x :secret", "PRIVMSG x :********")
            .await
            .unwrap();
        assert_eq!(read_available(&mut peer).await, b"PRIVMSG x :secret\r\n");
        let event = rx.recv().await.unwrap();
        assert!(matches!(event.kind, EventKind::Output { line } if line == "PRIVMSG x :********"));
    }

    #[tokio::test]
    async fn test_strips_embedded_newline() {
        let (raw, _rx) = raw_with_bus();
        let mut peer = attach_duplex(&raw).await;
        raw.raw_line_now("PRIVMSG #a :hi\nQUIT :oops").await.unwrap();
        assert_eq!(read_available(&mut peer).await, b"PRIVMSG #a :hi\r\n");
    }

    #[tokio::test]
    async fn test_truncates_to_budget() {
        let (bus, _rx) = ChannelEventBus::new();
        let raw = OutputRaw::new(
            Duration::from_millis(0),
            32,
            encoding_rs::UTF_8,
            Arc::new(bus),
        );
        let mut peer = attach_duplex(&raw).await;
        let long = format!("PRIVMSG #a :{}", "x".repeat(100));
        raw.raw_line_now(&long).await.unwrap();
        let bytes = read_available(&mut peer).await;
        assert_eq!(bytes.len(), 32);
        assert!(bytes.ends_with(b"\r\n"));
    }

    #[tokio::test]
    async fn test_truncation_respects_char_boundary() {
        let (bus, _rx) = ChannelEventBus::new();
        let raw = OutputRaw::new(
            Duration::from_millis(0),
            20,
            encoding_rs::UTF_8,
            Arc::new(bus),
        );
        let mut peer = attach_duplex(&raw).await;
        raw.raw_line_now("PRIVMSG #a :ééééééé").await.unwrap();
        let bytes = read_available(&mut peer).await;
        assert!(bytes.len() <= 20);
        let text = std::str::from_utf8(&bytes).expect("no split UTF-8 sequence");
        assert!(text.ends_with("\r\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flood_delay_between_queued_sends() {
        let (raw, _rx) = raw_with_bus();
        let mut peer = attach_duplex(&raw).await;

        let started = tokio::time::Instant::now();
        raw.raw_line("PRIVMSG #a :one").await.unwrap();
        raw.raw_line("PRIVMSG #a :two").await.unwrap();
        raw.raw_line("PRIVMSG #a :three").await.unwrap();
        // Two inter-message gaps at 100ms each under paused time (the wall
        // clock contributes an epsilon, hence the margin).
        assert!(started.elapsed() >= Duration::from_millis(190));
        let _ = read_available(&mut peer).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_bypass_skips_flood_delay() {
        let (raw, _rx) = raw_with_bus();
        let mut peer = attach_duplex(&raw).await;

        let started = tokio::time::Instant::now();
        raw.raw_line("PRIVMSG #a :one").await.unwrap();
        raw.raw_line_now("PONG :token").await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(100));
        let _ = read_available(&mut peer).await;
    }
}
