//! Integration tests for wardend
//!
//! End-to-end flows across the store, lifecycle handlers, evaluator,
//! engine, and IPC plumbing.

use chrono::{DateTime, Local, TimeZone};
use std::sync::Arc;
use warden_api::{Command, Event, EventPayload, Response, ResponsePayload, ResponseResult};
use warden_core::{Engine, eval};
use warden_host_api::{HostCall, MockHost};
use warden_ipc::{IpcClient, IpcServer, ServerMessage};
use warden_state::{SegmentCloseReason, StateStore};
use warden_util::SessionId;

fn monday(h: u32, m: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(2024, 6, 3, h, m, 0).unwrap()
}

fn test_config() -> warden_config::Config {
    warden_config::parse_config(
        r#"
        [default]
        daily_limit = "2h"
        allowed_hours = "09:00-17:00"
        weekend_hours = "10:00-14:00"
        notify_before = ["10m", "5m"]
        lock_screen = true
        enabled = false

        [users.alice]
        daily_limit = "3h"
        enabled = true
    "#,
    )
    .unwrap()
}

#[test]
fn lifecycle_drives_usage_accounting() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path().join("state.json")).unwrap();
    let id = SessionId::new("s1");

    store.handle_login("alice", &id, monday(9, 0));
    store.handle_lock("alice", &id, monday(10, 0));
    store.handle_unlock("alice", &id, monday(11, 0));
    store.handle_logout(&id, monday(12, 0));

    let state = store.snapshot();
    let alice = &state.users["alice"];

    // 9-10 engaged, 10-11 locked, 11-12 engaged
    assert_eq!(alice.seconds_used_today(monday(13, 0)), 2 * 3600);
    assert!(!alice.sessions[0].is_active());
}

#[test]
fn evaluator_sees_handler_written_state() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path().join("state.json")).unwrap();
    let cfg = test_config();

    store.handle_login("alice", &SessionId::new("s1"), monday(9, 0));

    // Fresh session: plenty of time, login permitted
    let snapshot = store.snapshot();
    assert!(eval::permit_login("alice", &snapshot, &cfg, monday(9, 30)));
    assert_eq!(
        eval::time_remaining("alice", &snapshot, &cfg, monday(11, 30)),
        1800
    );

    // Pause flips the answer at the same instant
    store.pause_user("alice").unwrap();
    let snapshot = store.snapshot();
    assert!(!eval::permit_login("alice", &snapshot, &cfg, monday(9, 30)));
}

#[tokio::test]
async fn engine_locks_after_daily_limit_is_spent() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(StateStore::open(dir.path().join("state.json")).unwrap());
    let host = Arc::new(MockHost::new());
    let mut engine = Engine::new(store.clone(), test_config(), host.clone());

    store.handle_login("alice", &SessionId::new("s1"), monday(9, 0));

    // 2h in: under the 3h limit, nothing happens
    engine.tick(monday(11, 0)).await;
    assert!(host.lock_requests().is_empty());

    // 3h in: limit spent, lock requested
    engine.tick(monday(12, 0)).await;
    assert_eq!(host.lock_requests().len(), 1);
}

#[tokio::test]
async fn engine_warns_then_locks_across_a_session() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(StateStore::open(dir.path().join("state.json")).unwrap());
    let host = Arc::new(MockHost::new());
    let mut engine = Engine::new(store.clone(), test_config(), host.clone());

    store.handle_login("alice", &SessionId::new("s1"), monday(9, 0));

    // 10 minutes remaining
    engine.tick(monday(11, 50)).await;
    // 5 minutes remaining
    engine.tick(monday(11, 55)).await;
    // Spent
    engine.tick(monday(12, 0)).await;

    let notifies = host.notify_requests();
    assert_eq!(notifies.len(), 2);
    assert!(matches!(
        &notifies[0],
        HostCall::Notify { body, .. } if body.contains("10m")
    ));
    assert!(matches!(
        &notifies[1],
        HostCall::Notify { body, .. } if body.contains("5m")
    ));
    assert_eq!(host.lock_requests().len(), 1);
}

#[test]
fn state_survives_restart_and_recovery_charges_no_downtime() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    {
        let store = StateStore::open(&path).unwrap();
        store.handle_login("alice", &SessionId::new("s1"), monday(9, 0));
        store.handle_login("bob", &SessionId::new("s2"), monday(9, 30));
    }

    // Restart: users and sessions come back
    let store = StateStore::open(&path).unwrap();
    let state = store.snapshot();
    assert_eq!(state.users.len(), 2);
    assert!(state.users["alice"].sessions[0].is_active());

    // The machine was "down": the gap since the heartbeat exceeds uptime.
    // Sessions close at the heartbeat, not at now.
    let heartbeat = store.last_heartbeat();
    let now = heartbeat + chrono::Duration::hours(2);
    store.recover(now, std::time::Duration::from_secs(600)).unwrap();

    let state = store.snapshot();
    for name in ["alice", "bob"] {
        let session = &state.users[name].sessions[0];
        assert_eq!(session.end, Some(heartbeat));
        assert_eq!(
            session.segments.last().unwrap().reason,
            Some(SegmentCloseReason::DaemonOffline)
        );
    }
}

/// Minimal dispatcher standing in for the daemon: answers every request
/// with Pong.
async fn spawn_pong_responder(server: Arc<IpcServer>) {
    let mut messages = server.take_message_receiver().await.unwrap();
    tokio::spawn(async move {
        while let Some(msg) = messages.recv().await {
            if let ServerMessage::Request {
                client_id, request, ..
            } = msg
            {
                let response = match request.command {
                    Command::SubscribeEvents => Response::success(
                        request.request_id,
                        ResponsePayload::Subscribed {
                            client_id: client_id.clone(),
                        },
                    ),
                    _ => Response::success(request.request_id, ResponsePayload::Pong),
                };
                let _ = server.send_response(&client_id, response).await;
            }
        }
    });
}

#[tokio::test]
async fn ipc_request_response_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("wardend.sock");

    let mut server = IpcServer::new(&socket);
    server.start().await.unwrap();
    let server = Arc::new(server);

    spawn_pong_responder(server.clone()).await;
    let accept = server.clone();
    tokio::spawn(async move {
        let _ = accept.run().await;
    });

    let mut client = IpcClient::connect(&socket).await.unwrap();
    let response = client.send(Command::Ping).await.unwrap();

    assert!(matches!(
        response.result,
        ResponseResult::Ok(ResponsePayload::Pong)
    ));
}

#[tokio::test]
async fn ipc_subscribers_receive_broadcast_events() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("wardend.sock");

    let mut server = IpcServer::new(&socket);
    server.start().await.unwrap();
    let server = Arc::new(server);

    spawn_pong_responder(server.clone()).await;
    let accept = server.clone();
    tokio::spawn(async move {
        let _ = accept.run().await;
    });

    let client = IpcClient::connect(&socket).await.unwrap();
    let mut events = client.subscribe().await.unwrap();

    server.broadcast_event(Event::new(EventPayload::Notification {
        username: "alice".into(),
        summary: "Session time warning".into(),
        body: "5m remaining".into(),
    }));

    let event = tokio::time::timeout(std::time::Duration::from_secs(5), events.next())
        .await
        .unwrap()
        .unwrap();

    assert!(matches!(
        event.payload,
        EventPayload::Notification { username, .. } if username == "alice"
    ));
}
