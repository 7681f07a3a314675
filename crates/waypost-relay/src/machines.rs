//! Durable machine registry: upserts, presence flags, stale sweep, and
//! ownership checks.

use std::time::Duration;

use tracing::info;
use waypost_protocol::{Capabilities, MachineInfo, Platform};

use crate::storage::{unix_timestamp_ms, DatabaseError, Machine, RelayDatabase};

#[derive(Clone)]
pub struct MachineRegistry {
    db: RelayDatabase,
}

impl MachineRegistry {
    pub fn new(db: RelayDatabase) -> Self {
        Self { db }
    }

    /// Register a machine for a user. Re-registering the same (owner, name)
    /// refreshes the existing row: platform and capabilities are replaced,
    /// the machine is flipped online and `last_seen` is refreshed.
    pub async fn register(
        &self,
        user_id: &str,
        name: &str,
        platform: Platform,
        capabilities: &Capabilities,
    ) -> Result<Machine, DatabaseError> {
        let caps_json = serde_json::to_string(capabilities).unwrap_or_else(|_| "{}".to_string());
        let machine = self
            .db
            .upsert_machine(
                &uuid::Uuid::new_v4().to_string(),
                user_id,
                name,
                platform.as_str(),
                &caps_json,
            )
            .await?;

        info!(machine_id = %machine.id, name = %machine.name, "Machine registered");

        Ok(machine)
    }

    /// Write the online flag and refresh `last_seen`.
    pub async fn set_online(&self, id: &str, online: bool) -> Result<(), DatabaseError> {
        self.db.set_machine_online(id, online).await
    }

    /// Refresh `last_seen` only.
    pub async fn heartbeat(&self, id: &str) -> Result<(), DatabaseError> {
        self.db.touch_machine(id).await
    }

    /// The user's machines ordered by name, marked `isOwn`.
    pub async fn list_owned(&self, user_id: &str) -> Result<Vec<MachineInfo>, DatabaseError> {
        let machines = self.db.list_machines(user_id).await?;
        Ok(machines.iter().map(|m| m.info(true)).collect())
    }

    pub async fn get(&self, id: &str) -> Result<Option<Machine>, DatabaseError> {
        self.db.get_machine(id).await
    }

    /// Transition every online machine not seen within `timeout` to offline,
    /// returning the affected ids.
    pub async fn sweep_stale(&self, timeout: Duration) -> Result<Vec<String>, DatabaseError> {
        #[allow(clippy::cast_possible_wrap)]
        let cutoff = unix_timestamp_ms() - timeout.as_millis() as i64;
        self.db.mark_stale_offline(cutoff).await
    }

    /// Whether `user_id` may open a peer connection to `machine_id`.
    ///
    /// Ownership only for now; team sharing will extend this check without
    /// touching callers.
    pub async fn can_access(&self, user_id: &str, machine_id: &str) -> Result<bool, DatabaseError> {
        let machine = self.db.get_machine(machine_id).await?;
        Ok(machine.is_some_and(|m| m.user_id == user_id))
    }

    /// Delete a machine, scoped to its owner.
    pub async fn delete(&self, user_id: &str, id: &str) -> Result<bool, DatabaseError> {
        let deleted = self.db.delete_machine(user_id, id).await?;
        if deleted {
            info!(machine_id = %id, "Machine deleted");
        }
        Ok(deleted)
    }

    /// Rename a machine, scoped to its owner.
    pub async fn rename(&self, user_id: &str, id: &str, new_name: &str) -> Result<bool, DatabaseError> {
        self.db.rename_machine(user_id, id, new_name).await
    }
}
