//! Shared fixtures for server tests.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use waypost_protocol::{Capabilities, Frame, Platform};

use super::AppState;
use crate::config::Config;
use crate::registry::{ControlChannel, Outbound};
use crate::storage::RelayDatabase;

pub(crate) fn test_config() -> Config {
    Config {
        host: "127.0.0.1".into(),
        port: 0,
        database_url: "sqlite::memory:".into(),
        jwt_secret: "test-secret".into(),
        jwt_ttl_secs: 3600,
        allowed_origins: "*".into(),
        stun_servers: vec!["stun:stun.l.google.com:19302".into()],
        turn_url: String::new(),
        turn_tcp_url: String::new(),
        turns_url: String::new(),
        turn_username: String::new(),
        turn_credential: String::new(),
        heartbeat_interval: Duration::from_secs(30),
        heartbeat_timeout: Duration::from_secs(90),
        pending_timeout: Duration::from_secs(30),
    }
}

/// An in-memory state with two seeded users, `u1` and `u2`.
pub(crate) async fn test_state() -> Arc<AppState> {
    let db = RelayDatabase::open_in_memory().await.unwrap();
    db.create_user("u1", "a@x.com", "al", "digest").await.unwrap();
    db.create_user("u2", "b@x.com", "bo", "digest").await.unwrap();
    AppState::new(test_config(), db)
}

/// A connected, unauthenticated control channel.
pub(crate) async fn open_channel(
    state: &Arc<AppState>,
) -> (Arc<ControlChannel>, mpsc::Receiver<Outbound>) {
    let (tx, rx) = mpsc::channel(64);
    let channel = ControlChannel::new(state.channels.next_id(), tx);
    state.channels.insert(channel.clone()).await;
    (channel, rx)
}

/// A connected channel registered as a live machine for `user_id`.
pub(crate) async fn attach_machine_channel(
    state: &Arc<AppState>,
    user_id: &str,
    name: &str,
) -> (Arc<ControlChannel>, mpsc::Receiver<Outbound>) {
    let machine = state
        .machines
        .register(user_id, name, Platform::Linux, &Capabilities::default())
        .await
        .unwrap();

    let (channel, rx) = open_channel(state).await;
    channel.set_authenticated(user_id);
    channel.attach_machine(&machine.id);
    state
        .channels
        .publish_machine(&machine.id, channel.clone())
        .await;

    (channel, rx)
}

/// The next frame queued on a channel, parsed.
pub(crate) async fn next_frame(rx: &mut mpsc::Receiver<Outbound>) -> Frame {
    match tokio::time::timeout(Duration::from_secs(1), rx.recv()).await {
        Ok(Some(Outbound::Frame(text))) => serde_json::from_str(&text).unwrap(),
        other => panic!("expected a frame, got {other:?}"),
    }
}
