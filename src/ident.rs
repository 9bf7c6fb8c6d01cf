//! Ident (RFC 1413) helper service.
//!
//! Some networks consult an identd on port 113 before accepting a
//! connection. This is an explicit service value the caller constructs and
//! hands to as many engines as it likes. Each engine registers its
//! connection tuple on connect and removes it at shutdown. The service owns
//! the listening socket.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// One registered connection.
#[derive(Clone, Debug, PartialEq, Eq)]
struct IdentEntry {
    remote_addr: IpAddr,
    remote_port: u16,
    local_port: u16,
    login: String,
}

/// A process-level ident responder with a per-connection entry registry.
#[derive(Default)]
pub struct IdentService {
    entries: Mutex<Vec<IdentEntry>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl IdentService {
    /// An unbound service; [`IdentService::bind`] starts the responder.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Bind the listening socket (conventionally `0.0.0.0:113`) and start
    /// answering queries. Returns the bound address.
    pub async fn bind(self: &Arc<Self>, addr: SocketAddr) -> io::Result<SocketAddr> {
        let listener = TcpListener::bind(addr).await?;
        let bound = listener.local_addr()?;
        debug!(%bound, "ident service listening");
        let service = Arc::clone(self);
        let handle = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        let service = Arc::clone(&service);
                        tokio::spawn(async move {
                            if let Err(e) = service.answer(stream).await {
                                debug!(%peer, error = %e, "ident exchange failed");
                            }
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "ident accept failed");
                        break;
                    }
                }
            }
        });
        *self.task.lock().expect("ident lock poisoned") = Some(handle);
        Ok(bound)
    }

    /// Register a connection's tuple.
    pub fn add_entry(&self, remote_addr: IpAddr, remote_port: u16, local_port: u16, login: &str) {
        let mut entries = self.entries.lock().expect("ident lock poisoned");
        entries.push(IdentEntry {
            remote_addr,
            remote_port,
            local_port,
            login: login.to_owned(),
        });
    }

    /// Remove a connection's tuple. Unknown tuples are a no-op.
    pub fn remove_entry(&self, remote_addr: IpAddr, remote_port: u16, local_port: u16) {
        let mut entries = self.entries.lock().expect("ident lock poisoned");
        entries.retain(|e| {
            !(e.remote_addr == remote_addr
                && e.remote_port == remote_port
                && e.local_port == local_port)
        });
    }

    fn lookup(&self, local_port: u16, remote_port: u16) -> Option<String> {
        let entries = self.entries.lock().expect("ident lock poisoned");
        entries
            .iter()
            .find(|e| e.local_port == local_port && e.remote_port == remote_port)
            .map(|e| e.login.clone())
    }

    /// Answer one query: `<local>, <remote>` → `USERID : UNIX : <login>`.
    async fn answer(&self, stream: tokio::net::TcpStream) -> io::Result<()> {
        let (read_half, mut write_half) = stream.into_split();
        let mut line = String::new();
        BufReader::new(read_half).read_line(&mut line).await?;
        let query = line.trim();
        let Some((local, remote)) = query.split_once(',') else {
            return Ok(());
        };
        let (Ok(local_port), Ok(remote_port)) = (
            local.trim().parse::<u16>(),
            remote.trim().parse::<u16>(),
        ) else {
            return Ok(());
        };
        let reply = match self.lookup(local_port, remote_port) {
            Some(login) => format!("{local_port}, {remote_port} : USERID : UNIX : {login}\r\n"),
            None => format!("{local_port}, {remote_port} : ERROR : NO-USER\r\n"),
        };
        write_half.write_all(reply.as_bytes()).await
    }

    /// Stop the responder and clear the registry.
    pub fn shutdown(&self) {
        if let Some(task) = self.task.lock().expect("ident lock poisoned").take() {
            task.abort();
        }
        self.entries.lock().expect("ident lock poisoned").clear();
    }
}
