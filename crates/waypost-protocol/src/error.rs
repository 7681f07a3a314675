//! Wire error codes carried in `error` frames.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error codes a client can receive in an `error` frame's `code` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Frame was not valid JSON or was missing required payload fields.
    InvalidMessage,
    /// Frame `type` is not part of the catalogue.
    UnknownMessage,
    /// The message requires an authenticated channel.
    NotAuthenticated,
    /// User registration failed for a non-conflict reason.
    RegistrationFailed,
    /// Caller may not connect to the target machine.
    AccessDenied,
    /// Target machine has no live control channel.
    MachineOffline,
    /// No pending connection with the given id.
    ConnectionNotFound,
    /// Sender is not a participant of the pending connection.
    InvalidConnection,
    /// Pending connection expired before the target decided.
    ConnectionTimeout,
    /// The server failed internally while handling the message.
    InternalError,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidMessage => "INVALID_MESSAGE",
            Self::UnknownMessage => "UNKNOWN_MESSAGE",
            Self::NotAuthenticated => "NOT_AUTHENTICATED",
            Self::RegistrationFailed => "REGISTRATION_FAILED",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::MachineOffline => "MACHINE_OFFLINE",
            Self::ConnectionNotFound => "CONNECTION_NOT_FOUND",
            Self::InvalidConnection => "INVALID_CONNECTION",
            Self::ConnectionTimeout => "CONNECTION_TIMEOUT",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorCode::MachineOffline).unwrap();
        assert_eq!(json, "\"MACHINE_OFFLINE\"");
    }

    #[test]
    fn as_str_matches_serde() {
        for code in [
            ErrorCode::InvalidMessage,
            ErrorCode::UnknownMessage,
            ErrorCode::NotAuthenticated,
            ErrorCode::RegistrationFailed,
            ErrorCode::AccessDenied,
            ErrorCode::MachineOffline,
            ErrorCode::ConnectionNotFound,
            ErrorCode::InvalidConnection,
            ErrorCode::ConnectionTimeout,
            ErrorCode::InternalError,
        ] {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code.as_str()));
        }
    }
}
