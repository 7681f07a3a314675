//! Row types for the relay schema.

use serde::{Deserialize, Serialize};
use waypost_protocol::{Capabilities, MachineInfo, Platform, UserView};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    pub fn view(&self) -> UserView {
        UserView {
            id: self.id.clone(),
            email: self.email.clone(),
            username: self.username.clone(),
            created_at: rfc3339_ms(self.created_at),
        }
    }
}

/// `users` row without the password digest.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub username: String,
    pub created_at: i64,
}

impl UserProfile {
    pub fn view(&self) -> UserView {
        UserView {
            id: self.id.clone(),
            email: self.email.clone(),
            username: self.username.clone(),
            created_at: rfc3339_ms(self.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Machine {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub platform: String,
    pub last_seen: i64,
    pub is_online: bool,
    /// JSON-encoded [`Capabilities`].
    pub capabilities: String,
    pub created_at: i64,
}

impl Machine {
    pub fn capabilities(&self) -> Capabilities {
        serde_json::from_str(&self.capabilities).unwrap_or_default()
    }

    pub fn info(&self, is_own: bool) -> MachineInfo {
        MachineInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            platform: Platform::from_db(&self.platform),
            capabilities: self.capabilities(),
            is_online: self.is_online,
            last_seen: rfc3339_ms(self.last_seen),
            is_own,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub machine_id: Option<String>,
    pub token_hash: String,
    pub expires_at: i64,
    pub created_at: i64,
}

/// Epoch milliseconds to the ISO-8601 form used on the wire.
pub fn rfc3339_ms(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .unwrap_or_default()
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
