//! The connection engine.
//!
//! One [`Bot`] owns one outbound connection at a time and drives it through
//! the `INIT → CONNECTED → DISCONNECTED` lifecycle: resolve and fan out
//! over the configured servers, register, run the read loop, tear down,
//! maybe do it all again. The engine is reusable: every iteration builds a
//! fresh roster, server-info capture, and parser.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Weak};

use futures_util::StreamExt;
use tokio::time::timeout;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{BotError, IrcRefusal, ParseError};
use crate::events::{ConnectFailure, EventKind};
use crate::listener::Dispatcher;
use crate::net::Resolver;
use crate::output::{OutputCap, OutputDcc, OutputIrc, OutputRaw};
use crate::parser::InputParser;
use crate::proto::LineCodec;
use crate::serverinfo::ServerInfo;
use crate::state::Roster;

static BOT_COUNT: AtomicU32 = AtomicU32::new(0);

/// Lifecycle phase of the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BotState {
    /// Constructed, or between reconnect iterations.
    Init,
    /// Socket up, registration under way or complete.
    Connected,
    /// Torn down after a connection.
    Disconnected,
}

struct Lifecycle {
    phase: BotState,
    cancel: Option<CancellationToken>,
    session: Option<Session>,
    /// Channel name → key, carried from the last connection for rejoin.
    reconnect_channels: Option<Vec<(String, Option<String>)>>,
    /// `(remote ip, remote port, local port)` registered with identd.
    ident_entry: Option<(std::net::IpAddr, u16, u16)>,
}

struct Session {
    roster: Arc<Roster>,
    server_info: Arc<ServerInfo>,
}

struct BotInner {
    config: Arc<Config>,
    bot_id: u32,
    raw: OutputRaw,
    dispatcher: Arc<Dispatcher>,
    resolver: Resolver,
    state: Mutex<Lifecycle>,
    stop_reconnect: AtomicBool,
    /// Attempts over the whole life of the engine; doubles as connection id.
    attempt_total: AtomicU32,
    /// Attempts since the last successful registration.
    in_run_attempts: Arc<AtomicU32>,
    hook_registered: AtomicBool,
}

/// The engine. Cloning yields another handle to the same engine.
#[derive(Clone)]
pub struct Bot {
    inner: Arc<BotInner>,
}

/// How one connection ended.
enum LoopEnd {
    /// Clean EOF or forced close.
    Eof,
    /// Cancellation token tripped.
    Cancelled,
    /// Transport-level read failure.
    ReadError(String),
    /// The server refused us during registration.
    Refused(IrcRefusal),
}

/// Why one reconnect iteration produced no connection.
enum AttemptError {
    /// Every candidate address failed.
    Candidates(Vec<ConnectFailure>),
    /// Connected, but registration was refused.
    Refused(IrcRefusal),
}

impl Bot {
    /// Build an engine around a validated configuration.
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let encoding = encoding_rs::Encoding::for_label(config.encoding.as_bytes())
            .expect("encoding validated by ConfigBuilder");
        let dispatcher = Arc::new(Dispatcher::new(config.listener.clone()));
        let raw = OutputRaw::new(
            config.message_delay,
            config.max_line_length,
            encoding,
            config.listener.clone(),
        );
        Self {
            inner: Arc::new(BotInner {
                config,
                bot_id: BOT_COUNT.fetch_add(1, Ordering::Relaxed),
                raw,
                dispatcher,
                resolver: Resolver::new(),
                state: Mutex::new(Lifecycle {
                    phase: BotState::Init,
                    cancel: None,
                    session: None,
                    reconnect_channels: None,
                    ident_entry: None,
                }),
                stop_reconnect: AtomicBool::new(false),
                attempt_total: AtomicU32::new(0),
                in_run_attempts: Arc::new(AtomicU32::new(0)),
                hook_registered: AtomicBool::new(false),
            }),
        }
    }

    /// Unique id of this engine within the process.
    pub fn bot_id(&self) -> u32 {
        self.inner.bot_id
    }

    /// Total connection attempts so far; stamps events as `connection_id`.
    pub fn connection_id(&self) -> u32 {
        self.inner.attempt_total.load(Ordering::Relaxed)
    }

    /// Current lifecycle phase.
    pub fn state(&self) -> BotState {
        self.inner.state.lock().expect("state lock poisoned").phase
    }

    /// Whether a connection is currently up.
    pub fn is_connected(&self) -> bool {
        let lifecycle = self.inner.state.lock().expect("state lock poisoned");
        lifecycle.phase == BotState::Connected
    }

    /// The live roster of the current connection, if one is up.
    pub fn roster(&self) -> Option<Arc<Roster>> {
        let lifecycle = self.inner.state.lock().expect("state lock poisoned");
        lifecycle.session.as_ref().map(|s| s.roster.clone())
    }

    /// The server-info capture of the current connection, if one is up.
    pub fn server_info(&self) -> Option<Arc<ServerInfo>> {
        let lifecycle = self.inner.state.lock().expect("state lock poisoned");
        lifecycle.session.as_ref().map(|s| s.server_info.clone())
    }

    /// The bot's current nick (the configured one until a server says
    /// otherwise).
    pub fn nick(&self) -> String {
        self.roster()
            .map(|r| r.bot_nick())
            .unwrap_or_else(|| self.inner.config.name.clone())
    }

    /// Raw line sink.
    pub fn send_raw(&self) -> OutputRaw {
        self.inner.raw.clone()
    }

    /// IRC command façade.
    pub fn send_irc(&self) -> OutputIrc {
        OutputIrc::new(self.inner.raw.clone())
    }

    /// CAP negotiation façade.
    pub fn send_cap(&self) -> OutputCap {
        OutputCap::new(self.inner.raw.clone())
    }

    /// DCC negotiation façade.
    pub fn send_dcc(&self) -> OutputDcc {
        OutputDcc::new(self.inner.raw.clone())
    }

    /// Do not come back after the current connection ends.
    pub fn stop_reconnect(&self) {
        self.inner.stop_reconnect.store(true, Ordering::Relaxed);
    }

    /// Force the socket shut. The read loop observes the cancellation and
    /// the engine tears down as if the server had closed on us.
    pub fn close(&self) {
        let lifecycle = self.inner.state.lock().expect("state lock poisoned");
        if let Some(cancel) = &lifecycle.cancel {
            cancel.cancel();
        }
    }

    /// Run the engine: connect, serve the connection, and, under
    /// auto-reconnect, loop until stopped or out of budget.
    ///
    /// Returns `Ok(())` on clean termination, [`BotError::ConnectFailed`]
    /// when no configured server could be reached within the budget, and
    /// [`BotError::Refused`] when the server turned us away.
    ///
    /// # Panics
    ///
    /// Calling this while a connection is already up is a programming
    /// error and panics.
    pub async fn start(&self) -> Result<(), BotError> {
        self.inner.stop_reconnect.store(false, Ordering::Relaxed);
        let result = self.run_loop().await;
        // The bus owned by this engine's run is done once we stop for good.
        self.inner.config.listener.shutdown();
        result
    }

    async fn run_loop(&self) -> Result<(), BotError> {
        let config = &self.inner.config;
        let budget = config.auto_reconnect_attempts;
        loop {
            let connection_id = self.inner.attempt_total.fetch_add(1, Ordering::Relaxed) + 1;
            let attempt = self.inner.in_run_attempts.fetch_add(1, Ordering::Relaxed) + 1;
            self.inner.dispatcher.set_connection_id(connection_id);
            self.inner
                .dispatcher
                .emit(EventKind::ConnectAttemptStart { attempt });
            if budget < 0 {
                info!(attempt, "starting connect attempt");
            } else {
                info!(attempt, budget, "starting connect attempt");
            }

            match self.connect_once().await {
                Ok(()) => {
                    // Connection ran and ended; Disconnect already emitted.
                    if !config.auto_reconnect {
                        return Ok(());
                    }
                }
                Err(AttemptError::Candidates(failures)) => {
                    let used = self.inner.in_run_attempts.load(Ordering::Relaxed);
                    let remaining = if budget < 0 {
                        -1
                    } else {
                        (budget - used as i32).max(0)
                    };
                    warn!(
                        candidates = failures.len(),
                        remaining, "all connect candidates failed"
                    );
                    self.inner
                        .dispatcher
                        .emit(EventKind::ConnectAttemptFailed {
                            remaining,
                            failures,
                        });
                    if !config.auto_reconnect {
                        return Err(BotError::ConnectFailed { attempts: used });
                    }
                }
                Err(AttemptError::Refused(refusal)) => {
                    if !(config.auto_reconnect && refusal.is_transient()) {
                        return Err(BotError::Refused(refusal));
                    }
                    warn!(%refusal, "transient refusal, will retry");
                }
            }

            if self.inner.stop_reconnect.load(Ordering::Relaxed) {
                debug!("stop_reconnect() called, leaving reconnect loop");
                return Ok(());
            }
            let used = self.inner.in_run_attempts.load(Ordering::Relaxed);
            if budget >= 0 && used >= budget as u32 {
                return Err(BotError::ConnectFailed { attempts: used });
            }
            if !config.auto_reconnect_delay.is_zero() {
                debug!(delay = ?config.auto_reconnect_delay, "pausing before next attempt");
                tokio::time::sleep(config.auto_reconnect_delay).await;
                if self.inner.stop_reconnect.load(Ordering::Relaxed) {
                    return Ok(());
                }
            }
        }
    }

    /// One reconnect iteration: candidate fan-out, registration, read loop,
    /// shutdown.
    async fn connect_once(&self) -> Result<(), AttemptError> {
        let config = &self.inner.config;
        {
            let mut lifecycle = self.inner.state.lock().expect("state lock poisoned");
            assert!(
                lifecycle.phase != BotState::Connected,
                "connect while already connected"
            );
            lifecycle.phase = BotState::Init;
        }

        // Fan out: every address of every server entry, in order. First
        // established socket wins.
        let mut failures = Vec::new();
        let mut established = None;
        'entries: for entry in &config.servers {
            let addrs = match self.inner.resolver.resolve(&entry.hostname).await {
                Ok(addrs) => addrs,
                Err(e) => {
                    failures.push(ConnectFailure {
                        address: format!("{}:{}", entry.hostname, entry.port),
                        error: e.to_string(),
                    });
                    continue;
                }
            };
            for (idx, ip) in addrs.iter().enumerate() {
                let addr = SocketAddr::new(*ip, entry.port);
                debug!(
                    %addr,
                    host = %entry.hostname,
                    candidate = idx + 1,
                    of = addrs.len(),
                    "attempting to connect"
                );
                match timeout(
                    config.socket_connect_timeout,
                    config
                        .socket_factory
                        .connect(addr, &entry.hostname, config.local_address),
                )
                .await
                {
                    Ok(Ok((transport, local_addr))) => {
                        established = Some((transport, local_addr, addr, entry.clone()));
                        break 'entries;
                    }
                    Ok(Err(e)) => {
                        warn!(%addr, error = %e, "connect failed");
                        failures.push(ConnectFailure {
                            address: addr.to_string(),
                            error: e.to_string(),
                        });
                    }
                    Err(_) => {
                        warn!(%addr, "connect timed out");
                        failures.push(ConnectFailure {
                            address: addr.to_string(),
                            error: format!(
                                "connect timed out after {:?}",
                                config.socket_connect_timeout
                            ),
                        });
                    }
                }
            }
        }
        let Some((transport, local_addr, addr, entry)) = established else {
            return Err(AttemptError::Candidates(failures));
        };
        info!(%addr, server = %entry.hostname, "connected to server");

        // Fresh per-connection state.
        let roster = Arc::new(Roster::new(&config.name, &config.login));
        let server_info = Arc::new(ServerInfo::new());
        let cancel = CancellationToken::new();
        let rejoin = {
            let mut lifecycle = self.inner.state.lock().expect("state lock poisoned");
            lifecycle.phase = BotState::Connected;
            lifecycle.cancel = Some(cancel.clone());
            lifecycle.session = Some(Session {
                roster: roster.clone(),
                server_info: server_info.clone(),
            });
            if let (Some(service), Some(local)) = (&config.ident_service, local_addr) {
                service.add_entry(addr.ip(), addr.port(), local.port(), &config.login);
                lifecycle.ident_entry = Some((addr.ip(), addr.port(), local.port()));
            }
            lifecycle.reconnect_channels.take().unwrap_or_default()
        };

        let (read_half, write_half) = tokio::io::split(transport);
        let connection_id = self.inner.attempt_total.load(Ordering::Relaxed);
        self.inner.raw.attach(write_half, connection_id).await;
        self.inner.dispatcher.emit(EventKind::SocketConnect {
            server: format!("{}:{}", entry.hostname, entry.port),
        });

        let mut parser = InputParser::new(
            config.clone(),
            roster,
            server_info,
            self.inner.raw.clone(),
            self.inner.dispatcher.clone(),
            self.inner.in_run_attempts.clone(),
            rejoin,
            self.login_hook(),
        );

        // Registration handshake; a failed write here means the socket
        // died under us and the whole attempt failed.
        if let Err(e) = self.register().await {
            error!(error = %e, "registration writes failed");
            failures.push(ConnectFailure {
                address: addr.to_string(),
                error: e.to_string(),
            });
            self.shutdown(&mut parser, Some(e.to_string())).await;
            return Err(AttemptError::Candidates(failures));
        }

        let end = self.read_loop(read_half, &mut parser, &cancel).await;
        let (refusal, cause) = match end {
            LoopEnd::Refused(refusal) => (Some(refusal.clone()), Some(refusal.to_string())),
            LoopEnd::ReadError(cause) => (None, Some(cause)),
            LoopEnd::Eof | LoopEnd::Cancelled => (None, None),
        };
        // An ERROR line beats a generic read error as the recorded cause.
        let cause = parser.take_disconnect_cause().or(cause);
        self.shutdown(&mut parser, cause).await;

        match refusal {
            Some(refusal) => Err(AttemptError::Refused(refusal)),
            None => Ok(()),
        }
    }

    /// CAP LS, WEBIRC, PASS, NICK, USER, in that order, ahead of the
    /// flood queue.
    async fn register(&self) -> std::io::Result<()> {
        let config = &self.inner.config;
        let raw = &self.inner.raw;

        if config.cap_enabled {
            raw.raw_line_now("CAP LS 302").await?;
        }
        if let Some(web_irc) = &config.web_irc {
            let line = format!(
                "WEBIRC {} {} {} {}",
                web_irc.password, web_irc.username, web_irc.hostname, web_irc.address
            );
            let masked = format!(
                "WEBIRC ******** {} {} {}",
                web_irc.username, web_irc.hostname, web_irc.address
            );
            raw.raw_line_now_masked(&line, &masked).await?;
        }
        if let Some(password) = &config.server_password {
            raw.raw_line_now_masked(&format!("PASS {password}"), "PASS ********")
                .await?;
        }
        raw.raw_line_now(&format!("NICK {}", config.name)).await?;
        raw.raw_line_now(&format!(
            "USER {} 8 * :{}",
            config.login, config.real_name
        ))
        .await?;
        Ok(())
    }

    /// The once-per-process exit hook, handed to the parser to arm on 001.
    fn login_hook(&self) -> Option<Box<dyn FnOnce() + Send>> {
        if !self.inner.config.shutdown_hook_enabled {
            return None;
        }
        let weak: Weak<BotInner> = Arc::downgrade(&self.inner);
        Some(Box::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if inner.hook_registered.swap(true, Ordering::Relaxed) {
                return;
            }
            let weak = Arc::downgrade(&inner);
            drop(inner);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                // Best-effort goodbye; no-op if the engine is gone.
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                inner.stop_reconnect.store(true, Ordering::Relaxed);
                let _ = inner.raw.raw_line_now("QUIT").await;
                let lifecycle = inner.state.lock().expect("state lock poisoned");
                if let Some(cancel) = &lifecycle.cancel {
                    cancel.cancel();
                }
            });
        }))
    }

    /// Pull framed lines until the connection ends one way or another.
    async fn read_loop(
        &self,
        read_half: tokio::io::ReadHalf<crate::net::BoxedTransport>,
        parser: &mut InputParser,
        cancel: &CancellationToken,
    ) -> LoopEnd {
        let config = &self.inner.config;
        let codec = LineCodec::new(&config.encoding, config.max_line_length)
            .expect("encoding validated by ConfigBuilder");
        let mut framed = FramedRead::new(read_half, codec);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("connection cancelled, stopping read loop");
                    return LoopEnd::Cancelled;
                }
                next = timeout(config.socket_timeout, framed.next()) => match next {
                    // Idle: probe liveness, ahead of the flood queue.
                    Err(_) => {
                        let unix = chrono::Utc::now().timestamp();
                        debug!("read idle, sending keepalive PING");
                        if let Err(e) = self.inner.raw.raw_line_now(&format!("PING {unix}")).await {
                            warn!(error = %e, "keepalive write failed");
                            return LoopEnd::Eof;
                        }
                    }
                    Ok(None) => {
                        info!("server closed the connection");
                        return LoopEnd::Eof;
                    }
                    Ok(Some(Err(ParseError::Io(e)))) => {
                        error!(error = %e, "read failed");
                        return LoopEnd::ReadError(e.to_string());
                    }
                    Ok(Some(Err(e))) => {
                        // Codec-level fault (overlong line); already resynced.
                        warn!(error = %e, "dropped inbound line");
                        self.inner.dispatcher.emit(EventKind::Exception {
                            error: e.to_string(),
                            context: "framing inbound line".to_owned(),
                        });
                    }
                    Ok(Some(Ok(line))) => {
                        if let Err(refusal) = parser.handle_line(&line).await {
                            error!(%refusal, "server refused registration");
                            return LoopEnd::Refused(refusal);
                        }
                    }
                }
            }
        }
    }

    /// Tear down the current connection under the state mutex, then emit
    /// the Disconnect event.
    async fn shutdown(&self, parser: &mut InputParser, cause: Option<String>) {
        let config = &self.inner.config;
        let snapshot = {
            let mut lifecycle = self.inner.state.lock().expect("state lock poisoned");
            assert!(
                lifecycle.phase != BotState::Disconnected,
                "shutdown called twice"
            );
            debug!("shutting down connection");
            lifecycle.phase = BotState::Disconnected;
            lifecycle.cancel = None;
            if let Some((ip, remote_port, local_port)) = lifecycle.ident_entry.take() {
                if let Some(service) = &config.ident_service {
                    service.remove_entry(ip, remote_port, local_port);
                }
            }
            match lifecycle.session.take() {
                Some(session) => {
                    lifecycle.reconnect_channels = Some(session.roster.channels_with_keys());
                    let snapshot = config
                        .snapshots_enabled
                        .then(|| session.roster.snapshot());
                    session.roster.close();
                    snapshot
                }
                None => None,
            }
        };

        self.inner.raw.detach().await;
        parser.close();
        config.dcc_handler.close();
        self.inner
            .dispatcher
            .emit(EventKind::Disconnect { snapshot, cause });
        info!("disconnected");
    }
}
