//! View types shared by the control channel and the HTTP API.

use serde::{Deserialize, Serialize};

/// Operating system a machine runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    Macos,
    Linux,
}

impl Platform {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Macos => "macos",
            Self::Linux => "linux",
        }
    }

    /// Parse the stored representation; anything unrecognized maps to Linux.
    pub fn from_db(s: &str) -> Self {
        match s {
            "windows" => Self::Windows,
            "macos" => Self::Macos,
            _ => Self::Linux,
        }
    }
}

/// Tooling available on a machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    #[serde(default)]
    pub has_git: bool,
    #[serde(default)]
    pub has_node: bool,
    #[serde(default)]
    pub has_rust: bool,
    #[serde(default)]
    pub has_python: bool,
}

/// A machine as listed to its owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineInfo {
    pub id: String,
    pub name: String,
    pub platform: Platform,
    pub capabilities: Capabilities,
    pub is_online: bool,
    /// ISO-8601.
    pub last_seen: String,
    pub is_own: bool,
}

/// A user as returned by auth responses and `/auth/me`. Never carries the
/// password digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub username: String,
    /// ISO-8601.
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_roundtrip() {
        let json = serde_json::to_string(&Platform::Macos).unwrap();
        assert_eq!(json, "\"macos\"");
        let parsed: Platform = serde_json::from_str("\"windows\"").unwrap();
        assert_eq!(parsed, Platform::Windows);
        assert_eq!(Platform::from_db("linux"), Platform::Linux);
    }

    #[test]
    fn capabilities_use_camel_case() {
        let caps = Capabilities {
            has_git: true,
            has_python: true,
            ..Default::default()
        };
        let json = serde_json::to_value(&caps).unwrap();
        assert_eq!(json["hasGit"], true);
        assert_eq!(json["hasNode"], false);
        assert_eq!(json["hasPython"], true);
    }

    #[test]
    fn capabilities_default_missing_fields() {
        let caps: Capabilities = serde_json::from_str(r#"{"hasRust":true}"#).unwrap();
        assert!(caps.has_rust);
        assert!(!caps.has_git);
    }
}
