//! Engine configuration.
//!
//! Built once through [`ConfigBuilder`], validated at `build()`, then owned
//! immutably by the engine for its whole life. File formats and CLI parsing
//! live outside the crate; collaborators (listener bus, socket factory, DCC
//! handler, ident service) are passed in as trait objects.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use encoding_rs::Encoding;

use crate::dcc::{DccHandler, NullDccHandler};
use crate::error::ConfigError;
use crate::ident::IdentService;
use crate::listener::{EventBus, TracingBus};
use crate::net::{PlainSocketFactory, SocketFactory};

/// One server to try, in list order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerEntry {
    /// Hostname or literal IP.
    pub hostname: String,
    /// Port.
    pub port: u16,
}

impl ServerEntry {
    /// Convenience constructor.
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
        }
    }
}

/// WEBIRC gateway preamble settings.
#[derive(Clone, Debug)]
pub struct WebIrcConfig {
    /// Gateway password. Masked in logs and Output events.
    pub password: String,
    /// Gateway username.
    pub username: String,
    /// Real client hostname to present.
    pub hostname: String,
    /// Real client address to present.
    pub address: IpAddr,
}

/// Validated engine configuration.
pub struct Config {
    /// Servers to try, in order.
    pub servers: Vec<ServerEntry>,
    /// Nickname to register with.
    pub name: String,
    /// Login (ident).
    pub login: String,
    /// Realname / GECOS.
    pub real_name: String,
    /// Fallback nicks walked on 433/437 during registration.
    pub nick_alternatives: Vec<String>,
    /// PASS before registration, when the server wants one.
    pub server_password: Option<String>,
    /// WEBIRC preamble, when acting as a trusted gateway.
    pub web_irc: Option<WebIrcConfig>,
    /// Negotiate IRCv3 CAP at the start of registration.
    pub cap_enabled: bool,
    /// Capabilities to REQ from the server's LS offer.
    pub capabilities: Vec<String>,
    /// Re-enter the connect loop after a disconnect.
    pub auto_reconnect: bool,
    /// Attempt budget per run; -1 is unbounded.
    pub auto_reconnect_attempts: i32,
    /// Pause between reconnect iterations.
    pub auto_reconnect_delay: Duration,
    /// Per-address connect timeout.
    pub socket_connect_timeout: Duration,
    /// Read idle window; on expiry the engine sends a keepalive PING.
    pub socket_timeout: Duration,
    /// Local address to bind before connecting.
    pub local_address: Option<IpAddr>,
    /// Outbound/inbound character encoding label.
    pub encoding: String,
    /// Maximum line length in bytes, CRLF included.
    pub max_line_length: usize,
    /// Publish a roster snapshot in the Disconnect event.
    pub snapshots_enabled: bool,
    /// Register a process-exit hook on login that quits cleanly.
    pub shutdown_hook_enabled: bool,
    /// Minimum interval between flood-controlled sends.
    pub message_delay: Duration,
    /// Where events go.
    pub listener: Arc<dyn EventBus>,
    /// How sockets get made.
    pub socket_factory: Arc<dyn SocketFactory>,
    /// Who consumes DCC CTCPs.
    pub dcc_handler: Arc<dyn DccHandler>,
    /// Ident service to register with, when one is running.
    pub ident_service: Option<Arc<IdentService>>,
}

impl Config {
    /// Start building a configuration for the given nickname.
    pub fn builder(name: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(name)
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("servers", &self.servers)
            .field("name", &self.name)
            .field("login", &self.login)
            .field("real_name", &self.real_name)
            .field("nick_alternatives", &self.nick_alternatives)
            .field("server_password", &self.server_password)
            .field("web_irc", &self.web_irc)
            .field("cap_enabled", &self.cap_enabled)
            .field("capabilities", &self.capabilities)
            .field("auto_reconnect", &self.auto_reconnect)
            .field("auto_reconnect_attempts", &self.auto_reconnect_attempts)
            .field("auto_reconnect_delay", &self.auto_reconnect_delay)
            .field("socket_connect_timeout", &self.socket_connect_timeout)
            .field("socket_timeout", &self.socket_timeout)
            .field("local_address", &self.local_address)
            .field("encoding", &self.encoding)
            .field("max_line_length", &self.max_line_length)
            .field("snapshots_enabled", &self.snapshots_enabled)
            .field("shutdown_hook_enabled", &self.shutdown_hook_enabled)
            .field("message_delay", &self.message_delay)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Config`].
pub struct ConfigBuilder {
    servers: Vec<ServerEntry>,
    name: String,
    login: Option<String>,
    real_name: Option<String>,
    nick_alternatives: Vec<String>,
    server_password: Option<String>,
    web_irc: Option<WebIrcConfig>,
    cap_enabled: bool,
    capabilities: Vec<String>,
    auto_reconnect: bool,
    auto_reconnect_attempts: i32,
    auto_reconnect_delay: Duration,
    socket_connect_timeout: Duration,
    socket_timeout: Duration,
    local_address: Option<IpAddr>,
    encoding: String,
    max_line_length: usize,
    snapshots_enabled: bool,
    shutdown_hook_enabled: bool,
    message_delay: Duration,
    listener: Option<Arc<dyn EventBus>>,
    socket_factory: Option<Arc<dyn SocketFactory>>,
    dcc_handler: Option<Arc<dyn DccHandler>>,
    ident_service: Option<Arc<IdentService>>,
}

impl ConfigBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            servers: Vec::new(),
            name: name.into(),
            login: None,
            real_name: None,
            nick_alternatives: Vec::new(),
            server_password: None,
            web_irc: None,
            cap_enabled: true,
            capabilities: Vec::new(),
            auto_reconnect: false,
            auto_reconnect_attempts: 5,
            auto_reconnect_delay: Duration::from_secs(5),
            socket_connect_timeout: Duration::from_secs(10),
            socket_timeout: Duration::from_secs(300),
            local_address: None,
            encoding: "utf-8".to_owned(),
            max_line_length: 512,
            snapshots_enabled: true,
            shutdown_hook_enabled: true,
            message_delay: Duration::from_millis(1000),
            listener: None,
            socket_factory: None,
            dcc_handler: None,
            ident_service: None,
        }
    }

    /// Append a server to try.
    pub fn server(mut self, hostname: impl Into<String>, port: u16) -> Self {
        self.servers.push(ServerEntry::new(hostname, port));
        self
    }

    /// Replace the server list.
    pub fn servers(mut self, servers: Vec<ServerEntry>) -> Self {
        self.servers = servers;
        self
    }

    /// Login (ident); defaults to the nickname.
    pub fn login(mut self, login: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self
    }

    /// Realname / GECOS; defaults to the nickname.
    pub fn real_name(mut self, real_name: impl Into<String>) -> Self {
        self.real_name = Some(real_name.into());
        self
    }

    /// Fallback nicks for 433 during registration, tried in order.
    pub fn nick_alternatives(mut self, alternatives: Vec<String>) -> Self {
        self.nick_alternatives = alternatives;
        self
    }

    /// Server PASS.
    pub fn server_password(mut self, password: impl Into<String>) -> Self {
        self.server_password = Some(password.into());
        self
    }

    /// Send a WEBIRC preamble before registration.
    pub fn web_irc(mut self, web_irc: WebIrcConfig) -> Self {
        self.web_irc = Some(web_irc);
        self
    }

    /// Toggle CAP negotiation (default on).
    pub fn cap_enabled(mut self, enabled: bool) -> Self {
        self.cap_enabled = enabled;
        self
    }

    /// Capabilities to REQ when the server offers them.
    pub fn capabilities(mut self, caps: Vec<String>) -> Self {
        self.capabilities = caps;
        self
    }

    /// Toggle the reconnect loop (default off).
    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Reconnect budget; -1 for unbounded (default 5).
    pub fn auto_reconnect_attempts(mut self, attempts: i32) -> Self {
        self.auto_reconnect_attempts = attempts;
        self
    }

    /// Pause between reconnect iterations (default 5s).
    pub fn auto_reconnect_delay(mut self, delay: Duration) -> Self {
        self.auto_reconnect_delay = delay;
        self
    }

    /// Per-address connect timeout (default 10s).
    pub fn socket_connect_timeout(mut self, timeout: Duration) -> Self {
        self.socket_connect_timeout = timeout;
        self
    }

    /// Read idle window before a keepalive PING (default 5min).
    pub fn socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout = timeout;
        self
    }

    /// Bind outgoing sockets to this local address.
    pub fn local_address(mut self, addr: IpAddr) -> Self {
        self.local_address = Some(addr);
        self
    }

    /// Wire encoding label (default `utf-8`).
    pub fn encoding(mut self, label: impl Into<String>) -> Self {
        self.encoding = label.into();
        self
    }

    /// Maximum line length in bytes, CRLF included (default 512).
    pub fn max_line_length(mut self, len: usize) -> Self {
        self.max_line_length = len;
        self
    }

    /// Toggle the Disconnect-event roster snapshot (default on).
    pub fn snapshots_enabled(mut self, enabled: bool) -> Self {
        self.snapshots_enabled = enabled;
        self
    }

    /// Toggle the process-exit quit hook (default on).
    pub fn shutdown_hook_enabled(mut self, enabled: bool) -> Self {
        self.shutdown_hook_enabled = enabled;
        self
    }

    /// Minimum interval between flood-controlled sends (default 1s).
    pub fn message_delay(mut self, delay: Duration) -> Self {
        self.message_delay = delay;
        self
    }

    /// The listener bus (default: log events at debug level).
    pub fn listener(mut self, bus: Arc<dyn EventBus>) -> Self {
        self.listener = Some(bus);
        self
    }

    /// The socket factory (default: plain TCP).
    pub fn socket_factory(mut self, factory: Arc<dyn SocketFactory>) -> Self {
        self.socket_factory = Some(factory);
        self
    }

    /// The DCC handler (default: discard).
    pub fn dcc_handler(mut self, handler: Arc<dyn DccHandler>) -> Self {
        self.dcc_handler = Some(handler);
        self
    }

    /// Register connections with this ident service.
    pub fn ident_service(mut self, service: Arc<IdentService>) -> Self {
        self.ident_service = Some(service);
        self
    }

    /// Validate and freeze.
    pub fn build(self) -> Result<Config, ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyField("name"));
        }
        if self.servers.is_empty() {
            return Err(ConfigError::NoServers);
        }
        for entry in &self.servers {
            if entry.hostname.trim().is_empty() {
                return Err(ConfigError::EmptyField("server hostname"));
            }
        }
        if self.max_line_length < 64 {
            return Err(ConfigError::LineLengthTooSmall);
        }
        if Encoding::for_label(self.encoding.as_bytes()).is_none() {
            return Err(ConfigError::UnknownEncoding(self.encoding));
        }
        let login = self.login.unwrap_or_else(|| self.name.clone());
        if login.trim().is_empty() {
            return Err(ConfigError::EmptyField("login"));
        }
        Ok(Config {
            servers: self.servers,
            real_name: self.real_name.unwrap_or_else(|| self.name.clone()),
            name: self.name,
            login,
            nick_alternatives: self.nick_alternatives,
            server_password: self.server_password,
            web_irc: self.web_irc,
            cap_enabled: self.cap_enabled,
            capabilities: self.capabilities,
            auto_reconnect: self.auto_reconnect,
            auto_reconnect_attempts: self.auto_reconnect_attempts,
            auto_reconnect_delay: self.auto_reconnect_delay,
            socket_connect_timeout: self.socket_connect_timeout,
            socket_timeout: self.socket_timeout,
            local_address: self.local_address,
            encoding: self.encoding,
            max_line_length: self.max_line_length,
            snapshots_enabled: self.snapshots_enabled,
            shutdown_hook_enabled: self.shutdown_hook_enabled,
            message_delay: self.message_delay,
            listener: self.listener.unwrap_or_else(|| Arc::new(TracingBus)),
            socket_factory: self
                .socket_factory
                .unwrap_or_else(|| Arc::new(PlainSocketFactory)),
            dcc_handler: self.dcc_handler.unwrap_or_else(|| Arc::new(NullDccHandler)),
            ident_service: self.ident_service,
        })
    }
}
