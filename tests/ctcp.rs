//! CTCP unwrapping and the DCC collaborator seam.

mod common;

use std::sync::{Arc, Mutex};

use common::{MockServer, test_config};
use slirc_bot::{Bot, DccHandler, DccRequest, EventKind, Hostmask};

#[tokio::test]
async fn test_version_is_typed_not_message() {
    let server = MockServer::bind().await.unwrap();
    let (config, mut bus) = test_config(&server, "bot");
    let bot = Bot::new(config.build().unwrap());

    let runner = {
        let bot = bot.clone();
        tokio::spawn(async move { bot.start().await })
    };

    let mut conn = server.accept().await.unwrap();
    conn.handshake("bot").await.unwrap();
    conn.send(":alice!u@h PRIVMSG bot :\u{1}VERSION\u{1}")
        .await
        .unwrap();
    conn.send(":alice!u@h PRIVMSG bot :\u{1}FOO bar\u{1}")
        .await
        .unwrap();

    let event = bus
        .wait_for(|k| {
            matches!(
                k,
                EventKind::Version { .. }
                    | EventKind::Message { .. }
                    | EventKind::PrivateMessage { .. }
            )
        })
        .await;
    assert!(
        matches!(event.kind, EventKind::Version { ref source, .. }
            if source.nick.as_deref() == Some("alice")),
        "CTCP VERSION must not surface as a message: {:?}",
        event.kind
    );

    bus.wait_for(|k| matches!(k, EventKind::UnknownCtcp { payload, .. } if payload.contains("FOO")))
        .await;

    conn.close();
    runner.await.unwrap().unwrap();
}

#[derive(Default)]
struct RecordingDcc {
    requests: Mutex<Vec<(Hostmask, DccRequest)>>,
    closed: Mutex<bool>,
}

impl DccHandler for RecordingDcc {
    fn on_request(&self, source: Hostmask, request: DccRequest) {
        self.requests.lock().unwrap().push((source, request));
    }

    fn close(&self) {
        *self.closed.lock().unwrap() = true;
    }
}

#[tokio::test]
async fn test_dcc_request_forwarded_to_handler() {
    let server = MockServer::bind().await.unwrap();
    let (config, mut bus) = test_config(&server, "bot");
    let dcc = Arc::new(RecordingDcc::default());
    let bot = Bot::new(config.dcc_handler(dcc.clone()).build().unwrap());

    let runner = {
        let bot = bot.clone();
        tokio::spawn(async move { bot.start().await })
    };

    let mut conn = server.accept().await.unwrap();
    conn.handshake("bot").await.unwrap();
    conn.send(":alice!u@h PRIVMSG bot :\u{1}DCC SEND notes.txt 2130706433 5000 1024\u{1}")
        .await
        .unwrap();
    // Anything after the DCC line proves the parser got that far.
    conn.send("PING :sync").await.unwrap();
    conn.expect(|l| l == "PONG :sync").await.unwrap();

    {
        let requests = dcc.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let (source, request) = &requests[0];
        assert_eq!(source.nick.as_deref(), Some("alice"));
        assert_eq!(request.command, "SEND");
        assert_eq!(request.filename(), Some("notes.txt"));
    }

    conn.close();
    runner.await.unwrap().unwrap();
    bus.wait_for(|k| matches!(k, EventKind::Disconnect { .. }))
        .await;
    assert!(*dcc.closed.lock().unwrap(), "handler closed at shutdown");
}
