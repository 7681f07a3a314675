//! Parameterized queries for the Waypost relay.

use super::db::{unix_timestamp_ms, DatabaseError, RelayDatabase};
use super::models::{Machine, User, UserProfile};

impl RelayDatabase {
    // =========================================================================
    // User queries
    // =========================================================================

    /// Create a new user. The caller lower-cases the email and hashes the
    /// password.
    pub async fn create_user(
        &self,
        id: &str,
        email: &str,
        username: &str,
        password_hash: &str,
    ) -> Result<User, DatabaseError> {
        let now = unix_timestamp_ms();

        sqlx::query(
            "INSERT INTO users (id, email, username, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(email)
        .bind(username)
        .bind(password_hash)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_one(self.pool())
            .await?;

        Ok(user)
    }

    /// Find a user by email (including the password digest, for login).
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(self.pool())
            .await?;

        Ok(user)
    }

    /// Find a user by id, without the password digest.
    pub async fn get_user_profile(&self, id: &str) -> Result<Option<UserProfile>, DatabaseError> {
        let profile = sqlx::query_as::<_, UserProfile>(
            "SELECT id, email, username, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        Ok(profile)
    }

    // =========================================================================
    // Machine queries
    // =========================================================================

    /// Insert a machine, or on a `(user_id, name)` conflict refresh the
    /// existing row: platform and capabilities are replaced, the machine is
    /// flipped online and `last_seen` is refreshed. Never creates a second
    /// row for the same (owner, name).
    pub async fn upsert_machine(
        &self,
        id: &str,
        user_id: &str,
        name: &str,
        platform: &str,
        capabilities: &str,
    ) -> Result<Machine, DatabaseError> {
        let now = unix_timestamp_ms();

        sqlx::query(
            "INSERT INTO machines (id, user_id, name, platform, last_seen, is_online, capabilities, created_at) \
             VALUES (?, ?, ?, ?, ?, 1, ?, ?) \
             ON CONFLICT(user_id, name) DO UPDATE SET \
                 platform = excluded.platform, \
                 capabilities = excluded.capabilities, \
                 is_online = 1, \
                 last_seen = excluded.last_seen",
        )
        .bind(id)
        .bind(user_id)
        .bind(name)
        .bind(platform)
        .bind(now)
        .bind(capabilities)
        .bind(now)
        .execute(self.pool())
        .await?;

        // The generated id is discarded on conflict; re-read by the unique key.
        let machine = sqlx::query_as::<_, Machine>(
            "SELECT * FROM machines WHERE user_id = ? AND name = ?",
        )
        .bind(user_id)
        .bind(name)
        .fetch_one(self.pool())
        .await?;

        Ok(machine)
    }

    /// Write the online flag and refresh `last_seen`.
    pub async fn set_machine_online(&self, id: &str, online: bool) -> Result<(), DatabaseError> {
        let now = unix_timestamp_ms();

        sqlx::query("UPDATE machines SET is_online = ?, last_seen = ? WHERE id = ?")
            .bind(online)
            .bind(now)
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(())
    }

    /// Refresh `last_seen` only.
    pub async fn touch_machine(&self, id: &str) -> Result<(), DatabaseError> {
        let now = unix_timestamp_ms();

        sqlx::query("UPDATE machines SET last_seen = ? WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(())
    }

    /// List a user's machines ordered by name.
    pub async fn list_machines(&self, user_id: &str) -> Result<Vec<Machine>, DatabaseError> {
        let machines = sqlx::query_as::<_, Machine>(
            "SELECT * FROM machines WHERE user_id = ? ORDER BY name",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        Ok(machines)
    }

    /// Get a machine by id.
    pub async fn get_machine(&self, id: &str) -> Result<Option<Machine>, DatabaseError> {
        let machine = sqlx::query_as::<_, Machine>("SELECT * FROM machines WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        Ok(machine)
    }

    /// Atomically mark every online machine whose `last_seen` is older than
    /// `cutoff` as offline; returns the ids that transitioned.
    pub async fn mark_stale_offline(&self, cutoff: i64) -> Result<Vec<String>, DatabaseError> {
        let rows = sqlx::query_as::<_, (String,)>(
            "UPDATE machines SET is_online = 0 WHERE is_online = 1 AND last_seen < ? RETURNING id",
        )
        .bind(cutoff)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Delete a machine, scoped to its owner. Returns whether a row was
    /// affected.
    pub async fn delete_machine(&self, user_id: &str, id: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM machines WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Rename a machine, scoped to its owner. Returns whether a row was
    /// affected.
    pub async fn rename_machine(
        &self,
        user_id: &str,
        id: &str,
        new_name: &str,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE machines SET name = ? WHERE id = ? AND user_id = ?")
            .bind(new_name)
            .bind(id)
            .bind(user_id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Session queries
    // =========================================================================

    /// Record an issued token. Raw tokens are never stored, only their hash.
    pub async fn create_session(
        &self,
        id: &str,
        user_id: &str,
        token_hash: &str,
        expires_at: i64,
    ) -> Result<(), DatabaseError> {
        let now = unix_timestamp_ms();

        sqlx::query(
            "INSERT INTO sessions (id, user_id, machine_id, token_hash, expires_at, created_at) VALUES (?, ?, NULL, ?, ?, ?)",
        )
        .bind(id)
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .bind(now)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Purge expired sessions. Returns the number of rows removed.
    pub async fn delete_expired_sessions(&self, now: i64) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
            .bind(now)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected())
    }
}
