//! The periodic stale sweep.
//!
//! Every `heartbeat_interval`: close channels silent past
//! `heartbeat_timeout`, transition their machines offline in storage with
//! an offline fan-out for each, and purge expired sessions.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::AppState;
use crate::storage::unix_timestamp_ms;

pub fn spawn_sweeper(state: Arc<AppState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(state.config.heartbeat_interval);
        // The immediate first tick is a harmless no-op sweep.
        loop {
            ticker.tick().await;
            run_sweep(&state).await;
        }
    })
}

pub(crate) async fn run_sweep(state: &Arc<AppState>) {
    let stale = state
        .channels
        .stale_channels(state.config.heartbeat_timeout)
        .await;
    for channel in stale {
        info!(channel_id = channel.id, "Closing heartbeat-silent channel");
        channel.close().await;
    }

    match state
        .machines
        .sweep_stale(state.config.heartbeat_timeout)
        .await
    {
        Ok(ids) => {
            for machine_id in ids {
                info!(machine_id = %machine_id, "Machine went stale");
                state.presence.broadcast(&machine_id, false, None).await;
            }
        }
        Err(e) => warn!(error = %e, "Stale machine sweep failed"),
    }

    match state.db.delete_expired_sessions(unix_timestamp_ms()).await {
        Ok(purged) if purged > 0 => debug!(purged, "Purged expired sessions"),
        Ok(_) => {}
        Err(e) => debug!(error = %e, "Session purge failed"),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::server::test_helpers::{attach_machine_channel, next_frame, test_state};

    #[tokio::test]
    async fn silent_channel_is_closed_and_machine_swept_offline() {
        let state = test_state().await;

        // The silent machine channel and a second machine channel of the
        // same owner observing presence.
        let (silent, mut silent_rx) = attach_machine_channel(&state, "u1", "laptop").await;
        let (_observer, mut observer_rx) = attach_machine_channel(&state, "u1", "desktop").await;

        let machine_id = silent.machine_id().unwrap();
        silent.backdate_heartbeat(Duration::from_secs(120));
        sqlx::query("UPDATE machines SET last_seen = 0 WHERE id = ?")
            .bind(&machine_id)
            .execute(state.db.pool())
            .await
            .unwrap();

        run_sweep(&state).await;

        // The silent channel was told to close.
        let closed = matches!(
            tokio::time::timeout(Duration::from_secs(1), silent_rx.recv()).await,
            Ok(Some(crate::registry::Outbound::Close))
        );
        assert!(closed);

        // Storage shows the machine offline and the sibling channel heard
        // about it.
        let machine = state.machines.get(&machine_id).await.unwrap().unwrap();
        assert!(!machine.is_online);

        let offline = next_frame(&mut observer_rx).await;
        assert_eq!(offline.kind, "machine_offline");
        assert_eq!(offline.payload["machineId"], machine_id.as_str());
        assert_eq!(offline.payload["name"], "laptop");
    }

    #[tokio::test]
    async fn fresh_channels_survive_the_sweep() {
        let state = test_state().await;
        let (fresh, mut fresh_rx) = attach_machine_channel(&state, "u1", "laptop").await;

        run_sweep(&state).await;

        assert!(fresh_rx.try_recv().is_err());
        let machine = state
            .machines
            .get(&fresh.machine_id().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert!(machine.is_online);
    }
}
