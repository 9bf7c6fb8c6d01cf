//! A scripted in-process IRC server.
//!
//! Tests drive it explicitly: accept a connection, assert on the lines the
//! engine sends, feed back whatever server lines the scenario calls for.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, bail};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

/// A listening mock server.
pub struct MockServer {
    listener: TcpListener,
    addr: SocketAddr,
}

impl MockServer {
    /// Bind on an ephemeral loopback port.
    pub async fn bind() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        Ok(Self { listener, addr })
    }

    /// The bound port.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Accept the next client connection.
    pub async fn accept(&self) -> anyhow::Result<ServerConn> {
        let (stream, _) = tokio::time::timeout(Duration::from_secs(5), self.listener.accept())
            .await
            .context("timed out waiting for the bot to connect")??;
        Ok(ServerConn::new(stream))
    }
}

/// One accepted connection, line-oriented.
pub struct ServerConn {
    lines: Lines<BufReader<OwnedReadHalf>>,
    write: OwnedWriteHalf,
}

impl ServerConn {
    fn new(stream: TcpStream) -> Self {
        let (read, write) = stream.into_split();
        Self {
            lines: BufReader::new(read).lines(),
            write,
        }
    }

    /// Send one server line (CRLF appended).
    pub async fn send(&mut self, line: &str) -> anyhow::Result<()> {
        self.write.write_all(line.as_bytes()).await?;
        self.write.write_all(b"\r\n").await?;
        self.write.flush().await?;
        Ok(())
    }

    /// Receive the next client line.
    pub async fn recv(&mut self) -> anyhow::Result<String> {
        match tokio::time::timeout(Duration::from_secs(5), self.lines.next_line()).await {
            Ok(Ok(Some(line))) => Ok(line),
            Ok(Ok(None)) => bail!("client closed the connection"),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => bail!("timed out waiting for a client line"),
        }
    }

    /// Receive lines until one satisfies the predicate, returning it.
    pub async fn expect(&mut self, pred: impl Fn(&str) -> bool) -> anyhow::Result<String> {
        for _ in 0..64 {
            let line = self.recv().await?;
            if pred(&line) {
                return Ok(line);
            }
        }
        bail!("predicate not satisfied within 64 lines")
    }

    /// Receive lines until one starts with `prefix`.
    pub async fn expect_prefix(&mut self, prefix: &str) -> anyhow::Result<String> {
        self.expect(|l| l.starts_with(prefix)).await
    }

    /// Consume the registration (NICK/USER) and confirm it with 001.
    pub async fn handshake(&mut self, nick: &str) -> anyhow::Result<()> {
        self.expect_prefix("USER ").await?;
        self.send(&format!(
            ":irc.test.example 001 {nick} :Welcome to TestNet {nick}!testlogin@localhost"
        ))
        .await
    }

    /// Drop the connection.
    pub fn close(self) {
        drop(self);
    }
}
