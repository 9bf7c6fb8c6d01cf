//! Outbound pipeline properties over a live socket.

mod common;

use std::time::{Duration, Instant};

use common::{MockServer, test_config};
use slirc_bot::{Bot, EventKind};

#[tokio::test]
async fn test_flood_delay_spaces_consecutive_sends() {
    let server = MockServer::bind().await.unwrap();
    let (config, mut bus) = test_config(&server, "bot");
    let bot = Bot::new(
        config
            .message_delay(Duration::from_millis(80))
            .build()
            .unwrap(),
    );

    let runner = {
        let bot = bot.clone();
        tokio::spawn(async move { bot.start().await })
    };

    let mut conn = server.accept().await.unwrap();
    conn.handshake("bot").await.unwrap();
    bus.wait_for(|k| matches!(k, EventKind::Connect { .. })).await;

    let irc = bot.send_irc();
    tokio::spawn(async move {
        for i in 0..3 {
            irc.message("#a", &format!("msg {i}")).await.unwrap();
        }
    });

    let mut stamps = Vec::new();
    while stamps.len() < 3 {
        let line = conn.expect_prefix("PRIVMSG #a").await.unwrap();
        assert!(line.starts_with("PRIVMSG #a :msg "));
        stamps.push(Instant::now());
    }
    for pair in stamps.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(
            gap >= Duration::from_millis(60),
            "consecutive flood-controlled sends only {gap:?} apart"
        );
    }

    conn.close();
    runner.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_outbound_truncation() {
    let server = MockServer::bind().await.unwrap();
    let (config, mut bus) = test_config(&server, "bot");
    let bot = Bot::new(config.max_line_length(64).build().unwrap());

    let runner = {
        let bot = bot.clone();
        tokio::spawn(async move { bot.start().await })
    };

    let mut conn = server.accept().await.unwrap();
    conn.handshake("bot").await.unwrap();
    bus.wait_for(|k| matches!(k, EventKind::Connect { .. })).await;

    let long = "x".repeat(200);
    bot.send_irc().message("#a", &long).await.unwrap();
    let line = conn.expect_prefix("PRIVMSG ").await.unwrap();
    // 64 bytes on the wire including CRLF; the reader strips the CRLF.
    assert_eq!(line.len(), 62);

    conn.close();
    runner.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_pong_bypasses_flood_queue() {
    let server = MockServer::bind().await.unwrap();
    let (config, mut bus) = test_config(&server, "bot");
    let bot = Bot::new(
        config
            .message_delay(Duration::from_millis(500))
            .build()
            .unwrap(),
    );

    let runner = {
        let bot = bot.clone();
        tokio::spawn(async move { bot.start().await })
    };

    let mut conn = server.accept().await.unwrap();
    conn.handshake("bot").await.unwrap();
    bus.wait_for(|k| matches!(k, EventKind::Connect { .. })).await;

    let asked = Instant::now();
    conn.send("PING :probe").await.unwrap();
    conn.expect(|l| l == "PONG :probe").await.unwrap();
    assert!(
        asked.elapsed() < Duration::from_millis(400),
        "PONG must not wait out the flood delay"
    );

    conn.close();
    runner.await.unwrap().unwrap();
}
