//! Server configuration, loaded from environment variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Complete relay configuration.
///
/// Defaults suit local development; production deployments MUST set at
/// least `JWT_SECRET`. The timer fields are not environment-driven — they
/// carry the protocol defaults and exist as fields so tests can shorten
/// them.
#[derive(Debug, Clone)]
pub struct Config {
    /// Interface to bind (`HOST`).
    pub host: String,
    /// TCP port (`PORT`).
    pub port: u16,
    /// SQLite URL or file path (`DATABASE_URL`).
    pub database_url: String,
    /// HS256 signing secret (`JWT_SECRET`).
    pub jwt_secret: String,
    /// Token lifetime in seconds (`JWT_EXPIRES_IN`, e.g. `7d`).
    pub jwt_ttl_secs: i64,
    /// Comma-separated CORS allowlist, or `*` (`ALLOWED_ORIGINS`).
    pub allowed_origins: String,
    /// STUN server URLs (`STUN_SERVERS`).
    pub stun_servers: Vec<String>,
    /// TURN relay URLs (`TURN_URL`, `TURN_TCP_URL`, `TURNS_URL`).
    pub turn_url: String,
    pub turn_tcp_url: String,
    pub turns_url: String,
    pub turn_username: String,
    pub turn_credential: String,

    /// Cadence of the periodic sweep.
    pub heartbeat_interval: Duration,
    /// A channel silent for longer than this is closed.
    pub heartbeat_timeout: Duration,
    /// How long a connection request may sit undecided.
    pub pending_timeout: Duration,
}

impl Config {
    /// Load configuration from the environment. A `.env` file is loaded
    /// best-effort first.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let jwt_secret = match std::env::var("JWT_SECRET") {
            Ok(s) if !s.is_empty() => s,
            _ => {
                warn!("JWT_SECRET not set, using a random value (tokens will not survive restarts)");
                uuid::Uuid::new_v4().to_string()
            }
        };

        Self {
            host: env_or("HOST", "0.0.0.0"),
            port: env_or("PORT", "8080").parse().unwrap_or(8080),
            database_url: env_or("DATABASE_URL", "sqlite:waypost.db"),
            jwt_secret,
            jwt_ttl_secs: parse_expiry(&env_or("JWT_EXPIRES_IN", "7d")),
            allowed_origins: env_or("ALLOWED_ORIGINS", "*"),
            stun_servers: env_csv("STUN_SERVERS", &["stun:stun.l.google.com:19302"]),
            turn_url: env_or("TURN_URL", ""),
            turn_tcp_url: env_or("TURN_TCP_URL", ""),
            turns_url: env_or("TURNS_URL", ""),
            turn_username: env_or("TURN_USERNAME", ""),
            turn_credential: env_or("TURN_CREDENTIAL", ""),
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(90),
            pending_timeout: Duration::from_secs(30),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// ICE servers advertised to clients: one entry per STUN url, plus the
    /// configured TURN relays. TURN entries are omitted entirely when no
    /// credential is configured.
    pub fn ice_servers(&self) -> Vec<IceServer> {
        let mut servers: Vec<IceServer> = self
            .stun_servers
            .iter()
            .map(|url| IceServer {
                urls: vec![url.clone()],
                username: None,
                credential: None,
            })
            .collect();

        if !self.turn_credential.is_empty() {
            for url in [&self.turn_url, &self.turn_tcp_url, &self.turns_url] {
                if url.is_empty() {
                    continue;
                }
                servers.push(IceServer {
                    urls: vec![url.clone()],
                    username: Some(self.turn_username.clone()),
                    credential: Some(self.turn_credential.clone()),
                });
            }
        }

        servers
    }
}

/// One entry of the W3C `RTCIceServer` dictionary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_csv(key: &str, defaults: &[&str]) -> Vec<String> {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => v
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => defaults.iter().map(|s| s.to_string()).collect(),
    }
}

/// Parse a token lifetime such as `7d`, `12h`, `30m`, `45s`, or a bare
/// number of seconds. Falls back to 7 days.
fn parse_expiry(value: &str) -> i64 {
    const WEEK: i64 = 7 * 24 * 3600;

    let value = value.trim();
    if value.is_empty() {
        return WEEK;
    }

    let (digits, unit) = match value.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => (&value[..idx], Some(c)),
        _ => (value, None),
    };

    let Ok(n) = digits.parse::<i64>() else {
        return WEEK;
    };

    match unit {
        Some('d') => n * 24 * 3600,
        Some('h') => n * 3600,
        Some('m') => n * 60,
        Some('s') | None => n,
        Some(_) => WEEK,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            host: "127.0.0.1".into(),
            port: 8080,
            database_url: "sqlite::memory:".into(),
            jwt_secret: "test".into(),
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

    #[test]
    fn expiry_shorthand() {
        assert_eq!(parse_expiry("7d"), 7 * 24 * 3600);
        assert_eq!(parse_expiry("12h"), 12 * 3600);
        assert_eq!(parse_expiry("30m"), 1800);
        assert_eq!(parse_expiry("45s"), 45);
        assert_eq!(parse_expiry("3600"), 3600);
        // Garbage falls back to a week.
        assert_eq!(parse_expiry("soon"), 7 * 24 * 3600);
        assert_eq!(parse_expiry(""), 7 * 24 * 3600);
    }

    #[test]
    fn turn_entries_omitted_without_credential() {
        let mut config = base_config();
        config.turn_url = "turn:turn.example.com:3478".into();
        config.turn_username = "user".into();

        let servers = config.ice_servers();
        assert_eq!(servers.len(), 1);
        assert!(servers[0].urls[0].starts_with("stun:"));
    }

    #[test]
    fn turn_entries_present_with_credential() {
        let mut config = base_config();
        config.turn_url = "turn:turn.example.com:3478".into();
        config.turns_url = "turns:turn.example.com:5349".into();
        config.turn_username = "user".into();
        config.turn_credential = "secret".into();

        let servers = config.ice_servers();
        assert_eq!(servers.len(), 3);
        assert_eq!(servers[1].username.as_deref(), Some("user"));
        assert_eq!(servers[2].urls[0], "turns:turn.example.com:5349");

        // Empty TURN slots never produce entries.
        let json = serde_json::to_value(&servers[0]).unwrap();
        assert!(json.get("credential").is_none());
    }
}
