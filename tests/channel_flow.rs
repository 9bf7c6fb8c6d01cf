//! Channel membership over a live connection: NAMES, mode edges, quits.

mod common;

use common::{MockServer, test_config};
use slirc_bot::{Bot, EventKind, UserLevel};

#[tokio::test]
async fn test_names_reply_populates_roster() {
    let server = MockServer::bind().await.unwrap();
    let (config, mut bus) = test_config(&server, "bot");
    let bot = Bot::new(config.build().unwrap());

    let runner = {
        let bot = bot.clone();
        tokio::spawn(async move { bot.start().await })
    };

    let mut conn = server.accept().await.unwrap();
    conn.handshake("bot").await.unwrap();
    conn.send(":bot!testlogin@localhost JOIN #test").await.unwrap();
    conn.send(":irc.test.example 353 bot = #test :@alice +bob carol")
        .await
        .unwrap();
    conn.send(":irc.test.example 366 bot #test :End of /NAMES list")
        .await
        .unwrap();
    bus.wait_for(|k| matches!(k, EventKind::UserList { channel, .. } if channel == "#test"))
        .await;

    let roster = bot.roster().unwrap();
    assert_eq!(
        roster.member_levels("#test", "alice"),
        Some(vec![UserLevel::Op])
    );
    assert_eq!(
        roster.member_levels("#test", "bob"),
        Some(vec![UserLevel::Voice])
    );
    assert_eq!(roster.member_levels("#test", "carol"), Some(vec![]));
    for nick in ["alice", "bob", "carol"] {
        assert_eq!(
            roster.get_user(nick).unwrap().channels,
            vec!["#test".to_owned()]
        );
    }

    conn.close();
    runner.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_quit_cascade_removes_orphaned_user() {
    let server = MockServer::bind().await.unwrap();
    let (config, mut bus) = test_config(&server, "bot");
    let bot = Bot::new(config.build().unwrap());

    let runner = {
        let bot = bot.clone();
        tokio::spawn(async move { bot.start().await })
    };

    let mut conn = server.accept().await.unwrap();
    conn.handshake("bot").await.unwrap();
    conn.send(":bot!testlogin@localhost JOIN #a").await.unwrap();
    conn.send(":bot!testlogin@localhost JOIN #b").await.unwrap();
    conn.send(":alice!u@h JOIN #a").await.unwrap();
    conn.send(":alice!u@h JOIN #b").await.unwrap();
    conn.send(":alice!u@h QUIT :bye").await.unwrap();

    let event = bus
        .wait_for(|k| matches!(k, EventKind::Quit { .. }))
        .await;
    match event.kind {
        EventKind::Quit { user, reason } => {
            assert_eq!(user.nick, "alice");
            assert_eq!(user.channels, vec!["#a".to_owned(), "#b".to_owned()]);
            assert_eq!(reason.as_deref(), Some("bye"));
        }
        _ => unreachable!(),
    }

    let roster = bot.roster().unwrap();
    assert!(roster.get_user("alice").is_none());
    assert!(roster.get_channel("#a").is_some());

    conn.close();
    runner.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_mode_changes_update_level_edges() {
    let server = MockServer::bind().await.unwrap();
    let (config, mut bus) = test_config(&server, "bot");
    let bot = Bot::new(config.build().unwrap());

    let runner = {
        let bot = bot.clone();
        tokio::spawn(async move { bot.start().await })
    };

    let mut conn = server.accept().await.unwrap();
    conn.handshake("bot").await.unwrap();
    conn.send(":bot!testlogin@localhost JOIN #a").await.unwrap();
    conn.send(":alice!u@h JOIN #a").await.unwrap();
    conn.send(":op!o@h MODE #a +v alice").await.unwrap();

    bus.wait_for(|k| {
        matches!(
            k,
            EventKind::UserLevelChange {
                level: UserLevel::Voice,
                granted: true,
                ..
            }
        )
    })
    .await;
    assert_eq!(
        bot.roster().unwrap().member_levels("#a", "alice"),
        Some(vec![UserLevel::Voice])
    );

    conn.close();
    runner.await.unwrap().unwrap();
}
