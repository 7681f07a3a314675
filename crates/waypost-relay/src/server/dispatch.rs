//! Message dispatch for the control channel.
//!
//! Each inbound frame is `{type, id?, payload}`. The `type` is validated
//! first; the payload is then parsed into its typed message. A request that
//! carries an `id` receives exactly one response (or one `error` frame)
//! echoing it. Malformed frames never close the channel.

use std::sync::Arc;

use serde_json::json;
use tracing::{error, warn};
use waypost_protocol::{
    AuthRequest, AuthResponse, ConnectRequest, ConnectionDecision, DeleteMachineRequest,
    DeleteMachineResponse, ErrorCode, Frame, IceCandidatePayload, MachineRegistered,
    MachinesList, RegisterMachineRequest, RegisterUserRequest, RenameMachineRequest,
    RenameMachineResponse, SdpPayload,
};

use super::AppState;
use crate::auth::AuthError;
use crate::registry::ControlChannel;

pub async fn handle_frame(state: &Arc<AppState>, channel: &Arc<ControlChannel>, text: &str) {
    let frame: Frame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(_) => {
            send_error(channel, None, ErrorCode::InvalidMessage).await;
            return;
        }
    };
    let id = frame.id.clone();

    match frame.kind.as_str() {
        "auth" => {
            if let Some(req) = parse(channel, &frame).await {
                handle_auth(state, channel, id, req).await;
            }
        }
        "register_user" => {
            if let Some(req) = parse(channel, &frame).await {
                handle_register_user(state, channel, id, req).await;
            }
        }
        "register_machine" => {
            let Some(user_id) = require_auth(channel, &id).await else {
                return;
            };
            if let Some(req) = parse(channel, &frame).await {
                handle_register_machine(state, channel, id, &user_id, req).await;
            }
        }
        "heartbeat" => handle_heartbeat(state, channel, id).await,
        "list_machines" => {
            let Some(user_id) = require_auth(channel, &id).await else {
                return;
            };
            handle_list_machines(state, channel, id, &user_id).await;
        }
        "delete_machine" => {
            let Some(user_id) = require_auth(channel, &id).await else {
                return;
            };
            if let Some(req) = parse::<DeleteMachineRequest>(channel, &frame).await {
                let success = match state.machines.delete(&user_id, &req.machine_id).await {
                    Ok(affected) => affected,
                    Err(e) => {
                        warn!(machine_id = %req.machine_id, error = %e, "Delete failed");
                        false
                    }
                };
                channel
                    .send(&Frame::response_of(
                        "delete_machine_response",
                        id,
                        &DeleteMachineResponse {
                            success,
                            machine_id: req.machine_id,
                        },
                    ))
                    .await;
            }
        }
        "rename_machine" => {
            let Some(user_id) = require_auth(channel, &id).await else {
                return;
            };
            if let Some(req) = parse::<RenameMachineRequest>(channel, &frame).await {
                let success = match state
                    .machines
                    .rename(&user_id, &req.machine_id, &req.new_name)
                    .await
                {
                    Ok(affected) => affected,
                    Err(e) => {
                        warn!(machine_id = %req.machine_id, error = %e, "Rename failed");
                        false
                    }
                };
                channel
                    .send(&Frame::response_of(
                        "rename_machine_response",
                        id,
                        &RenameMachineResponse {
                            success,
                            machine_id: req.machine_id,
                            name: req.new_name,
                        },
                    ))
                    .await;
            }
        }
        "connect_to_machine" => {
            let Some(user_id) = require_auth(channel, &id).await else {
                return;
            };
            if let Some(req) = parse::<ConnectRequest>(channel, &frame).await {
                if let Err(code) = state.broker.connect(channel, &user_id, req).await {
                    send_error(channel, id, code).await;
                }
            }
        }
        "connection_accepted" => {
            if let Some(req) = parse::<ConnectionDecision>(channel, &frame).await {
                if let Err(code) = state.broker.accept(channel, req).await {
                    send_error(channel, id, code).await;
                }
            }
        }
        "connection_rejected" => {
            if let Some(req) = parse::<ConnectionDecision>(channel, &frame).await {
                state.broker.reject(channel, req).await;
            }
        }
        "rtc_offer" => {
            if let Some(req) = parse::<SdpPayload>(channel, &frame).await {
                if let Err(code) = state.broker.offer(channel, req).await {
                    send_error(channel, id, code).await;
                }
            }
        }
        "rtc_answer" => {
            if let Some(req) = parse::<SdpPayload>(channel, &frame).await {
                if let Err(code) = state.broker.answer(channel, req).await {
                    send_error(channel, id, code).await;
                }
            }
        }
        "rtc_ice_candidate" => {
            if let Some(req) = parse::<IceCandidatePayload>(channel, &frame).await {
                state.broker.ice_candidate(channel, req).await;
            }
        }
        _ => send_error(channel, id, ErrorCode::UnknownMessage).await,
    }
}

async fn handle_auth(
    state: &Arc<AppState>,
    channel: &Arc<ControlChannel>,
    id: Option<String>,
    req: AuthRequest,
) {
    let response = if let Some(token) = req.token.as_deref() {
        match state.auth.verify_token(token) {
            Ok(claims) => match state.auth.user_view(&claims.sub).await {
                Ok(Some(user)) => {
                    channel.set_authenticated(&user.id);
                    AuthResponse::ok(user, None)
                }
                Ok(None) => AuthResponse::failed("user not found"),
                Err(e) => {
                    error!(error = %e, "Token auth lookup failed");
                    AuthResponse::failed("authentication failed")
                }
            },
            Err(_) => AuthResponse::failed("invalid token"),
        }
    } else if let (Some(email), Some(password)) = (req.email.as_deref(), req.password.as_deref()) {
        match state.auth.login(email, password).await {
            Ok((token, user)) => {
                channel.set_authenticated(&user.id);
                AuthResponse::ok(user, Some(token))
            }
            Err(AuthError::AuthFailed) => AuthResponse::failed("invalid credentials"),
            Err(e) => {
                error!(error = %e, "Login failed");
                AuthResponse::failed("authentication failed")
            }
        }
    } else {
        AuthResponse::failed("missing credentials")
    };

    channel
        .send(&Frame::response_of("auth_response", id, &response))
        .await;
}

async fn handle_register_user(
    state: &Arc<AppState>,
    channel: &Arc<ControlChannel>,
    id: Option<String>,
    req: RegisterUserRequest,
) {
    match state
        .auth
        .register(&req.email, &req.username, &req.password)
        .await
    {
        Ok((token, user)) => {
            // A fresh account is immediately attached to this channel.
            channel.set_authenticated(&user.id);
            channel
                .send(&Frame::response_of(
                    "register_user_response",
                    id,
                    &AuthResponse::ok(user, Some(token)),
                ))
                .await;
        }
        Err(AuthError::Conflict) => {
            channel
                .send(&Frame::response_of(
                    "register_user_response",
                    id,
                    &AuthResponse::failed("email already registered"),
                ))
                .await;
        }
        Err(e) => {
            error!(error = %e, "User registration failed");
            send_error(channel, id, ErrorCode::RegistrationFailed).await;
        }
    }
}

async fn handle_register_machine(
    state: &Arc<AppState>,
    channel: &Arc<ControlChannel>,
    id: Option<String>,
    user_id: &str,
    req: RegisterMachineRequest,
) {
    let machine = match state
        .machines
        .register(user_id, &req.name, req.platform, &req.capabilities)
        .await
    {
        Ok(machine) => machine,
        Err(e) => {
            error!(name = %req.name, error = %e, "Machine registration failed");
            send_error(channel, id, ErrorCode::InternalError).await;
            return;
        }
    };

    channel.attach_machine(&machine.id);
    state
        .channels
        .publish_machine(&machine.id, channel.clone())
        .await;

    channel
        .send(&Frame::response_of(
            "machine_registered",
            id,
            &MachineRegistered {
                machine_id: machine.id.clone(),
                name: machine.name.clone(),
            },
        ))
        .await;

    state
        .presence
        .broadcast(&machine.id, true, Some(channel.id))
        .await;
}

async fn handle_heartbeat(state: &Arc<AppState>, channel: &Arc<ControlChannel>, id: Option<String>) {
    channel.touch_heartbeat();

    if let Some(machine_id) = channel.machine_id() {
        if let Err(e) = state.machines.heartbeat(&machine_id).await {
            warn!(machine_id = %machine_id, error = %e, "Heartbeat persist failed");
        }
    }

    channel
        .send(&Frame::response("heartbeat_ack", id, json!({})))
        .await;
}

async fn handle_list_machines(
    state: &Arc<AppState>,
    channel: &Arc<ControlChannel>,
    id: Option<String>,
    user_id: &str,
) {
    match state.machines.list_owned(user_id).await {
        Ok(machines) => {
            channel
                .send(&Frame::response_of(
                    "machines_list",
                    id,
                    &MachinesList { machines },
                ))
                .await;
        }
        Err(e) => {
            error!(error = %e, "Listing machines failed");
            send_error(channel, id, ErrorCode::InternalError).await;
        }
    }
}

/// Parse the frame's payload, replying `INVALID_MESSAGE` when required
/// fields are missing.
async fn parse<T: serde::de::DeserializeOwned>(
    channel: &Arc<ControlChannel>,
    frame: &Frame,
) -> Option<T> {
    match frame.parse_payload() {
        Ok(req) => Some(req),
        Err(_) => {
            send_error(channel, frame.id.clone(), ErrorCode::InvalidMessage).await;
            None
        }
    }
}

/// The authenticated user id, or an error frame and `None`.
async fn require_auth(channel: &Arc<ControlChannel>, id: &Option<String>) -> Option<String> {
    match channel.user_id() {
        Some(user_id) if channel.authenticated() => Some(user_id),
        _ => {
            send_error(channel, id.clone(), ErrorCode::NotAuthenticated).await;
            None
        }
    }
}

async fn send_error(channel: &Arc<ControlChannel>, id: Option<String>, code: ErrorCode) {
    channel.send(&Frame::error(id, code, describe(code))).await;
}

const fn describe(code: ErrorCode) -> &'static str {
    match code {
        ErrorCode::InvalidMessage => "malformed message",
        ErrorCode::UnknownMessage => "unknown message type",
        ErrorCode::NotAuthenticated => "authentication required",
        ErrorCode::RegistrationFailed => "registration failed",
        ErrorCode::AccessDenied => "access denied",
        ErrorCode::MachineOffline => "machine is offline",
        ErrorCode::ConnectionNotFound => "connection not found",
        ErrorCode::InvalidConnection => "not a participant of this connection",
        ErrorCode::ConnectionTimeout => "connection request timed out",
        ErrorCode::InternalError => "internal error",
    }
}
