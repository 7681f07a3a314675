//! Typed payloads for every catalogued message.
//!
//! Client→server: `auth`, `register_user`, `register_machine`, `heartbeat`,
//! `list_machines`, `delete_machine`, `rename_machine`, `connect_to_machine`,
//! `connection_accepted`, `connection_rejected`, `rtc_offer`, `rtc_answer`,
//! `rtc_ice_candidate`.
//!
//! Server→client: `auth_response`, `register_user_response`,
//! `machine_registered`, `heartbeat_ack`, `machines_list`,
//! `delete_machine_response`, `rename_machine_response`,
//! `connection_request`, `connection_accepted`, `connection_rejected`,
//! `rtc_offer`, `rtc_answer`, `rtc_ice_candidate`, `machine_online`,
//! `machine_offline`, `error`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{Capabilities, MachineInfo, Platform, UserView};

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// `auth` — either a bearer token or email/password credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// `register_user`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

/// `register_machine`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterMachineRequest {
    pub name: String,
    pub platform: Platform,
    #[serde(default)]
    pub capabilities: Capabilities,
}

/// `delete_machine`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMachineRequest {
    pub machine_id: String,
}

/// `rename_machine`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameMachineRequest {
    pub machine_id: String,
    pub new_name: String,
}

/// `connect_to_machine`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    pub target_machine_id: String,
}

/// `connection_accepted` / `connection_rejected` from the target machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDecision {
    pub connection_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// `rtc_offer` / `rtc_answer`. On the way through the relay,
/// `target_machine_id` is rewritten to the sender's stable id so the
/// receiver knows where to direct its reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SdpPayload {
    pub connection_id: String,
    pub target_machine_id: String,
    pub sdp: String,
}

/// `rtc_ice_candidate`. The candidate blob is relayed opaquely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidatePayload {
    pub connection_id: String,
    pub target_machine_id: String,
    #[serde(default)]
    pub candidate: Value,
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// `auth_response` and `register_user_response` (same shape). Also the body
/// of the HTTP login/register endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuthResponse {
    pub fn ok(user: UserView, token: Option<String>) -> Self {
        Self {
            success: true,
            user: Some(user),
            token,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            user: None,
            token: None,
            error: Some(error.into()),
        }
    }
}

/// `machine_registered`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineRegistered {
    pub machine_id: String,
    pub name: String,
}

/// `machines_list`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachinesList {
    pub machines: Vec<MachineInfo>,
}

/// `delete_machine_response`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMachineResponse {
    pub success: bool,
    pub machine_id: String,
}

/// `rename_machine_response`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameMachineResponse {
    pub success: bool,
    pub machine_id: String,
    pub name: String,
}

/// `connection_request`, delivered to the target machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRequest {
    pub from_machine_id: String,
    pub from_machine_name: String,
    pub connection_id: String,
}

/// `connection_accepted`, delivered to the originator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionAccepted {
    pub connection_id: String,
    pub target_machine_id: String,
}

/// `connection_rejected`, delivered to the originator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRejected {
    pub connection_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// `machine_online` / `machine_offline`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEvent {
    pub machine_id: String,
    pub name: String,
}

/// Payload of an `error` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub code: crate::ErrorCode,
    pub message: String,
}
