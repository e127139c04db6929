//! End-to-end chat flow tests.

mod common;

use tablechat::chat::{ChatLogRepository, SERVER_NAME};
use tablechat::config::ChatConfig;
use tablechat::{ChatRequest, ServerEvent, SessionInfo};

use common::ChatFixture;

#[tokio::test]
async fn test_broadcast_attempts_each_room_once() {
    let fx = ChatFixture::new().await;
    fx.emitter.connect("s-lobby");
    let t1 = fx.table_with(&["alice"]).await;
    let t2 = fx.table_with(&["bob", "carol"]).await;
    let _empty = fx.table_with(&[]).await;

    let rooms = fx.router.broadcast_from_server("Maintenance in 5 minutes").await;
    assert_eq!(rooms, 4);

    let attempted = fx.emitter.chat_rooms();
    assert_eq!(
        attempted,
        vec![
            "lobby".to_string(),
            t1.room_name().to_string(),
            t2.room_name().to_string(),
            t2.room_name().to_string(),
        ]
    );

    let repo = ChatLogRepository::new(fx.db.pool());
    for room in ["lobby", "table1", "table2", "table3"] {
        assert_eq!(repo.count(room).await.unwrap(), 1, "room {room}");
    }
}

#[tokio::test]
async fn test_failing_recipient_is_isolated() {
    let fx = ChatFixture::new().await;
    let table = fx.table_with(&["alice", "bob", "carol"]).await;
    fx.emitter.fail("s-bob");

    let alice = SessionInfo::new("s-alice", 1, "alice");
    fx.router
        .send(ChatRequest::participant(alice, "gg", table.room_name()))
        .await
        .unwrap();

    assert_eq!(fx.emitter.attempts().len(), 3);
    assert_eq!(fx.emitter.chats_for("s-alice").len(), 1);
    assert_eq!(fx.emitter.chats_for("s-carol")[0].msg, "gg");
    assert!(fx.emitter.chats_for("s-bob").is_empty());
}

#[tokio::test]
async fn test_persisted_history_scenario() {
    let fx = ChatFixture::new().await;
    fx.emitter.connect("s-alice");
    let alice = SessionInfo::new("s-alice", 1, "alice");

    fx.router
        .send(ChatRequest::participant(alice.clone(), "hi", "lobby"))
        .await
        .unwrap();
    fx.router
        .send_from_server("Game starting", "lobby")
        .await
        .unwrap();

    let backlog = fx.history.fetch_persisted("lobby", 10).await.unwrap();
    assert_eq!(backlog.unread, 0);
    assert_eq!(backlog.list.len(), 2);
    assert_eq!(backlog.list[0].who, "alice");
    assert_eq!(backlog.list[0].msg, "hi");
    assert!(!backlog.list[0].is_server());
    assert_eq!(backlog.list[1].msg, "Game starting");
    assert!(backlog.list[1].is_server());

    // The sentinel never leaks to the display name
    assert_ne!(backlog.list[1].who, SERVER_NAME);
}

#[tokio::test]
async fn test_history_returns_most_recent_in_order() {
    let fx = ChatFixture::new().await;
    for i in 0..8 {
        fx.router
            .send_from_server(&format!("notice {i}"), "lobby")
            .await
            .unwrap();
    }

    let backlog = fx.history.fetch_persisted("lobby", 3).await.unwrap();
    let bodies: Vec<_> = backlog.list.iter().map(|m| m.msg.as_str()).collect();
    assert_eq!(bodies, vec!["notice 5", "notice 6", "notice 7"]);

    let all = fx.history.fetch_persisted("lobby", 100).await.unwrap();
    assert_eq!(all.list.len(), 8);
}

#[tokio::test]
async fn test_bridge_message_with_mentions() {
    let fx = ChatFixture::new().await;
    fx.emitter.connect("s-alice");

    let sent = fx
        .router
        .send_from_bridge(
            "dave",
            "&lt;@!123456789012345678&gt; ping &lt;@&amp;223456789012345678&gt; in &lt;#323456789012345678&gt; ||the end||",
        )
        .await
        .unwrap();

    assert_eq!(
        sent.msg,
        "@bob ping @moderators in #general <span class=\"spoiler\">the end</span>"
    );
    assert!(sent.is_external());

    let backlog = fx.history.fetch_persisted("lobby", 1).await.unwrap();
    assert_eq!(backlog.list[0].msg, sent.msg);
    assert_eq!(backlog.list[0].who, "dave");
    assert!(backlog.list[0].is_external());
}

#[tokio::test]
async fn test_private_message_is_not_persisted() {
    let fx = ChatFixture::new().await;
    fx.emitter.connect("s-alice");
    fx.emitter.connect("s-bob");
    let alice = SessionInfo::new("s-alice", 1, "alice");

    fx.router
        .send_private("Your turn", &alice, "table1")
        .unwrap();

    let attempts = fx.emitter.attempts();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].0, "s-alice");
    match &attempts[0].1 {
        ServerEvent::Chat(msg) => {
            assert_eq!(msg.recipient.as_deref(), Some("alice"));
            assert!(msg.is_server());
        }
        other => panic!("unexpected event: {other:?}"),
    }

    let repo = ChatLogRepository::new(fx.db.pool());
    assert_eq!(repo.count("table1").await.unwrap(), 0);
}

#[tokio::test]
async fn test_table_backlog_after_rejoin() {
    let config = ChatConfig {
        table_chat_limit: 5,
        ..ChatConfig::default()
    };
    let fx = ChatFixture::with_config(config).await;
    let table = fx.table_with(&["alice", "bob"]).await;
    let alice = SessionInfo::new("s-alice", 1, "alice");
    let bob = SessionInfo::new("s-bob", 2, "bob");

    for i in 0..3 {
        fx.router
            .send(ChatRequest::participant(alice.clone(), format!("m{i}"), table.room_name()))
            .await
            .unwrap();
    }
    fx.history.mark_read(&table, bob.user_id).await;

    for i in 3..9 {
        fx.router
            .send(ChatRequest::participant(alice.clone(), format!("m{i}"), table.room_name()))
            .await
            .unwrap();
    }

    let backlog = fx.history.fetch_table_backlog(&table, bob.user_id).await;
    let bodies: Vec<_> = backlog.list.iter().map(|m| m.msg.as_str()).collect();
    assert_eq!(bodies, vec!["m4", "m5", "m6", "m7", "m8"]);
    assert_eq!(backlog.unread, 6);

    fx.history.send_past_from_table(&bob, &table).await.unwrap();
    match fx.emitter.attempts().last() {
        Some((id, ServerEvent::ChatList(list))) => {
            assert_eq!(id, "s-bob");
            assert_eq!(list.unread, 6);
        }
        other => panic!("unexpected attempt: {other:?}"),
    }

    fx.history.mark_read(&table, bob.user_id).await;
    assert_eq!(fx.history.fetch_table_backlog(&table, bob.user_id).await.unread, 0);
}

#[tokio::test]
async fn test_removed_table_rejects_messages() {
    let fx = ChatFixture::new().await;
    let table = fx.table_with(&["alice"]).await;
    let room = table.room_name().to_string();
    fx.registry.remove(table.id()).await;

    let err = fx.router.send_from_server("anyone?", &room).await.unwrap_err();
    assert!(matches!(err, tablechat::ChatError::NotFound(_)));

    let rooms = fx.router.broadcast_from_server("hello").await;
    assert_eq!(rooms, 1);
    assert_eq!(fx.emitter.chat_rooms(), Vec::<String>::new());
}
