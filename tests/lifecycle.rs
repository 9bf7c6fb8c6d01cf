//! Connection lifecycle: registration, keepalive, reconnect, teardown.

mod common;

use std::time::Duration;

use common::{MockServer, test_config};
use slirc_bot::{Bot, BotError, BotState, EventKind};

#[tokio::test]
async fn test_connect_register_and_clean_disconnect() {
    let server = MockServer::bind().await.unwrap();
    let (config, mut bus) = test_config(&server, "bot");
    let bot = Bot::new(config.build().unwrap());

    let runner = {
        let bot = bot.clone();
        tokio::spawn(async move { bot.start().await })
    };

    let mut conn = server.accept().await.unwrap();
    let nick_line = conn.expect_prefix("NICK ").await.unwrap();
    assert_eq!(nick_line, "NICK bot");
    let user_line = conn.expect_prefix("USER ").await.unwrap();
    assert!(user_line.starts_with("USER testlogin 8 * :Test Bot"));
    conn.send(":irc.test.example 001 bot :Welcome bot!testlogin@localhost")
        .await
        .unwrap();

    bus.wait_for(|k| matches!(k, EventKind::ConnectAttemptStart { attempt: 1 }))
        .await;
    bus.wait_for(|k| matches!(k, EventKind::SocketConnect { .. }))
        .await;
    bus.wait_for(|k| matches!(k, EventKind::Connect { .. })).await;
    assert!(bot.is_connected());
    assert_eq!(bot.nick(), "bot");
    assert_eq!(bot.connection_id(), 1);

    // The bot's own user exists from the start.
    let roster = bot.roster().unwrap();
    assert!(roster.get_user("bot").unwrap().is_bot);

    conn.close();
    let result = runner.await.unwrap();
    assert!(result.is_ok(), "expected clean termination: {result:?}");
    assert_eq!(bot.state(), BotState::Disconnected);

    let event = bus
        .wait_for(|k| matches!(k, EventKind::Disconnect { .. }))
        .await;
    match event.kind {
        EventKind::Disconnect { snapshot, cause } => {
            assert!(cause.is_none(), "clean EOF should have no cause: {cause:?}");
            let snapshot = snapshot.expect("snapshots are enabled by default");
            assert!(snapshot.bot().is_some());
        }
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn test_keepalive_ping_on_idle() {
    let server = MockServer::bind().await.unwrap();
    let (config, mut bus) = test_config(&server, "bot");
    let bot = Bot::new(
        config
            .socket_timeout(Duration::from_millis(150))
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

    // Say nothing; the engine must probe.
    let ping = conn.expect_prefix("PING ").await.unwrap();
    let token = ping.strip_prefix("PING ").unwrap();
    assert!(
        token.chars().all(|c| c.is_ascii_digit()),
        "keepalive token should be unix seconds: {ping}"
    );
    assert!(bot.is_connected());

    // And again; the probe must not kill the connection.
    conn.expect_prefix("PING ").await.unwrap();
    assert!(bot.is_connected());

    conn.close();
    runner.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_reconnect_restores_channels_with_keys() {
    let server = MockServer::bind().await.unwrap();
    let (config, mut bus) = test_config(&server, "bot");
    let bot = Bot::new(
        config
            .auto_reconnect(true)
            .auto_reconnect_attempts(-1)
            .build()
            .unwrap(),
    );

    let runner = {
        let bot = bot.clone();
        tokio::spawn(async move { bot.start().await })
    };

    // First connection: get the bot onto #a (keyed) and #b.
    let mut conn = server.accept().await.unwrap();
    conn.handshake("bot").await.unwrap();
    conn.send(":bot!testlogin@localhost JOIN #a").await.unwrap();
    conn.send(":irc.test.example 324 bot #a +k sekrit").await.unwrap();
    conn.send(":bot!testlogin@localhost JOIN #b").await.unwrap();
    bus.wait_for(|k| matches!(k, EventKind::Join { channel, .. } if channel == "#b"))
        .await;
    {
        let roster = bot.roster().unwrap();
        assert_eq!(
            roster.get_channel("#a").unwrap().key.as_deref(),
            Some("sekrit")
        );
    }

    // Drop it; the engine must come back and rejoin.
    conn.close();
    bus.wait_for(|k| matches!(k, EventKind::Disconnect { .. }))
        .await;

    let mut conn2 = server.accept().await.unwrap();
    conn2.handshake("bot").await.unwrap();
    let mut join_a = None;
    let mut join_b = None;
    while join_a.is_none() || join_b.is_none() {
        let line = conn2.expect_prefix("JOIN ").await.unwrap();
        if line.starts_with("JOIN #a") {
            join_a = Some(line);
        } else if line.starts_with("JOIN #b") {
            join_b = Some(line);
        }
    }
    assert_eq!(join_a.as_deref(), Some("JOIN #a sekrit"));
    assert_eq!(join_b.as_deref(), Some("JOIN #b"));

    bot.stop_reconnect();
    conn2.close();
    runner.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_retry_budget_exhaustion() {
    common::init_tracing();
    // Bind then drop, so the port refuses connections.
    let server = MockServer::bind().await.unwrap();
    let port = server.port();
    drop(server);

    let (bus, mut rx) = slirc_bot::ChannelEventBus::new();
    let config = slirc_bot::Config::builder("bot")
        .server("127.0.0.1", port)
        .cap_enabled(false)
        .shutdown_hook_enabled(false)
        .auto_reconnect(true)
        .auto_reconnect_attempts(2)
        .auto_reconnect_delay(Duration::from_millis(10))
        .socket_connect_timeout(Duration::from_millis(500))
        .listener(std::sync::Arc::new(bus))
        .build()
        .unwrap();
    let bot = Bot::new(config);

    let result = bot.start().await;
    match result {
        Err(BotError::ConnectFailed { attempts }) => assert_eq!(attempts, 2),
        other => panic!("expected ConnectFailed, got {other:?}"),
    }

    let mut starts = 0;
    let mut failed_attempts = Vec::new();
    while let Ok(event) = rx.try_recv() {
        match event.kind {
            EventKind::ConnectAttemptStart { .. } => starts += 1,
            EventKind::ConnectAttemptFailed {
                remaining,
                failures,
            } => failed_attempts.push((remaining, failures.len())),
            _ => {}
        }
    }
    assert_eq!(starts, 2);
    assert_eq!(failed_attempts.len(), 2);
    assert_eq!(failed_attempts[0].0, 1);
    assert_eq!(failed_attempts[1].0, 0);
    assert!(failed_attempts.iter().all(|(_, n)| *n >= 1));
}

#[tokio::test]
async fn test_single_attempt_without_auto_reconnect() {
    common::init_tracing();
    let server = MockServer::bind().await.unwrap();
    let port = server.port();
    drop(server);

    let (bus, _rx) = slirc_bot::ChannelEventBus::new();
    let config = slirc_bot::Config::builder("bot")
        .server("127.0.0.1", port)
        .cap_enabled(false)
        .shutdown_hook_enabled(false)
        .socket_connect_timeout(Duration::from_millis(500))
        .listener(std::sync::Arc::new(bus))
        .build()
        .unwrap();
    let bot = Bot::new(config);

    assert!(matches!(
        bot.start().await,
        Err(BotError::ConnectFailed { attempts: 1 })
    ));
}

#[tokio::test]
async fn test_forced_close() {
    let server = MockServer::bind().await.unwrap();
    let (config, mut bus) = test_config(&server, "bot");
    let bot = Bot::new(config.build().unwrap());

    let runner = {
        let bot = bot.clone();
        tokio::spawn(async move { bot.start().await })
    };

    let conn = server.accept().await.unwrap();
    let mut conn = conn;
    conn.handshake("bot").await.unwrap();
    bus.wait_for(|k| matches!(k, EventKind::Connect { .. })).await;

    bot.close();
    runner.await.unwrap().unwrap();
    assert_eq!(bot.state(), BotState::Disconnected);
    bus.wait_for(|k| matches!(k, EventKind::Disconnect { .. }))
        .await;
}

#[tokio::test]
async fn test_error_line_recorded_as_cause() {
    let server = MockServer::bind().await.unwrap();
    let (config, mut bus) = test_config(&server, "bot");
    let bot = Bot::new(config.build().unwrap());

    let runner = {
        let bot = bot.clone();
        tokio::spawn(async move { bot.start().await })
    };

    let mut conn = server.accept().await.unwrap();
    conn.handshake("bot").await.unwrap();
    bus.wait_for(|k| matches!(k, EventKind::Connect { .. })).await;

    conn.send("ERROR :Closing Link: bot (Quit)").await.unwrap();
    conn.close();
    runner.await.unwrap().unwrap();

    let event = bus
        .wait_for(|k| matches!(k, EventKind::Disconnect { .. }))
        .await;
    match event.kind {
        EventKind::Disconnect { cause, .. } => {
            assert_eq!(cause.as_deref(), Some("Closing Link: bot (Quit)"));
        }
        _ => unreachable!(),
    }
}
