//! Shared test harness.

#![allow(dead_code)]

pub mod server;

pub use server::{MockServer, ServerConn};

use std::sync::Arc;
use std::time::Duration;

use slirc_bot::{ChannelEventBus, Config, Event, EventKind};
use tokio::sync::mpsc::UnboundedReceiver;

/// Event stream plus the pieces tests keep poking at.
pub struct TestBus {
    pub rx: UnboundedReceiver<Event>,
}

/// Install a tracing subscriber for test output. Safe to call repeatedly;
/// only the first call wins.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

/// A config builder wired for tests: one server, no CAP, no flood delay,
/// no exit hook, fast reconnect.
pub fn test_config(server: &MockServer, nick: &str) -> (slirc_bot::ConfigBuilder, TestBus) {
    init_tracing();
    let (bus, rx) = ChannelEventBus::new();
    let builder = Config::builder(nick)
        .server("127.0.0.1", server.port())
        .login("testlogin")
        .real_name("Test Bot")
        .cap_enabled(false)
        .message_delay(Duration::from_millis(0))
        .shutdown_hook_enabled(false)
        .auto_reconnect_delay(Duration::from_millis(50))
        .listener(Arc::new(bus));
    (builder, TestBus { rx })
}

impl TestBus {
    /// Next event matching the predicate, skipping everything else.
    pub async fn wait_for(&mut self, pred: impl Fn(&EventKind) -> bool) -> Event {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let event = self.rx.recv().await.expect("bus closed while waiting");
                if pred(&event.kind) {
                    return event;
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    /// Drain whatever is queued right now.
    pub fn drain(&mut self) -> Vec<EventKind> {
        let mut kinds = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            kinds.push(event.kind);
        }
        kinds
    }
}
