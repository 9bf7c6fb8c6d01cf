//! # slirc-bot
//!
//! The stateful core of an IRC client engine for automated participants:
//! connection lifecycle with DNS fan-out and bounded reconnect, an RFC
//! 1459/2812 line dispatcher with IRCv3 CAP and CTCP handling, a relational
//! user/channel model, and a flood-controlled output pipeline.
//!
//! ## Quick start
//!
//! ```no_run
//! use slirc_bot::{Bot, ChannelEventBus, Config, EventKind};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (bus, mut events) = ChannelEventBus::new();
//!     let config = Config::builder("slircbot")
//!         .server("irc.libera.chat", 6667)
//!         .capabilities(vec!["multi-prefix".into()])
//!         .listener(Arc::new(bus))
//!         .build()?;
//!     let bot = Bot::new(config);
//!
//!     let irc = bot.send_irc();
//!     tokio::spawn(async move {
//!         while let Some(event) = events.recv().await {
//!             if let EventKind::Connect { .. } = event.kind {
//!                 let _ = irc.join("#rust").await;
//!             }
//!         }
//!     });
//!
//!     bot.start().await?;
//!     Ok(())
//! }
//! ```
//!
//! Everything protocol-facing funnels through two seams: events out via
//! [`EventBus`], commands in via the [`OutputIrc`]/[`OutputCap`]/
//! [`OutputDcc`] façades over the flood-controlled [`OutputRaw`] sink.

#![deny(clippy::all)]
#![warn(missing_docs)]

mod bot;
pub mod config;
pub mod dcc;
pub mod error;
pub mod events;
pub mod ident;
pub mod listener;
pub mod net;
mod parser;
pub mod output;
pub mod proto;
pub mod serverinfo;
pub mod state;

pub use bot::{Bot, BotState};
pub use config::{Config, ConfigBuilder, ServerEntry, WebIrcConfig};
pub use dcc::{DccHandler, DccRequest, NullDccHandler};
pub use error::{BotError, ConfigError, IrcRefusal, ParseError};
pub use events::{
    CapSubcommand, ConnectFailure, Event, EventKind, JoinRefusalKind, WhoEntry, WhoisInfo,
};
pub use ident::IdentService;
pub use listener::{ChannelEventBus, EventBus, TracingBus};
pub use net::{BoxedTransport, PlainSocketFactory, SocketFactory, TlsSocketFactory, Transport};
pub use output::{OutputCap, OutputDcc, OutputIrc, OutputRaw};
pub use parser::InputParser;
pub use proto::{CaseMapping, Ctcp, CtcpKind, Hostmask, RawLine};
pub use serverinfo::ServerInfo;
pub use state::{
    Channel, ChannelSnapshot, MemberSnapshot, Roster, RosterSnapshot, User, UserLevel,
    UserSnapshot,
};
