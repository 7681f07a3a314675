//! The signaling state machine.
//!
//! One pending connection mediates request → accept/reject → SDP exchange →
//! ICE relay → teardown. The broker owns the routing decisions; the channel
//! hub feeds it already-parsed payloads. Errors map straight onto wire
//! codes; edges documented as silent drop return `Ok(())`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use waypost_protocol::{
    ConnectRequest, ConnectionAccepted, ConnectionDecision, ConnectionRejected,
    ConnectionRequest, ErrorCode, Frame, IceCandidatePayload, SdpPayload,
};

use crate::machines::MachineRegistry;
use crate::registry::{ChannelRegistry, ControlChannel, PendingConnection, PendingConnections};

/// Name presented for browser-originated connection requests.
const WEB_CLIENT_NAME: &str = "Web Client";

#[derive(Clone)]
pub struct SignalingBroker {
    channels: Arc<ChannelRegistry>,
    pending: Arc<PendingConnections>,
    machines: MachineRegistry,
    /// How long a connection request may sit undecided.
    pending_timeout: Duration,
}

impl SignalingBroker {
    pub fn new(
        channels: Arc<ChannelRegistry>,
        pending: Arc<PendingConnections>,
        machines: MachineRegistry,
        pending_timeout: Duration,
    ) -> Self {
        Self {
            channels,
            pending,
            machines,
            pending_timeout,
        }
    }

    /// `connect_to_machine`: authorize, resolve the target's live channel,
    /// create the pending entry, deliver `connection_request`, and arm the
    /// decision timeout.
    pub async fn connect(
        &self,
        channel: &Arc<ControlChannel>,
        user_id: &str,
        req: ConnectRequest,
    ) -> Result<(), ErrorCode> {
        let allowed = match self.machines.can_access(user_id, &req.target_machine_id).await {
            Ok(allowed) => allowed,
            Err(e) => {
                // Deny closed on storage failure.
                warn!(error = %e, "Access check failed");
                false
            }
        };
        if !allowed {
            return Err(ErrorCode::AccessDenied);
        }

        let target = self
            .channels
            .machine_channel(&req.target_machine_id)
            .await
            .ok_or(ErrorCode::MachineOffline)?;

        // Originator identity: a machine keeps its stable id and registered
        // name; a browser gets a transient web-client id.
        let (from_client_id, from_name, from_web) = match channel.machine_id() {
            Some(machine_id) => {
                let name = match self.machines.get(&machine_id).await {
                    Ok(Some(machine)) => machine.name,
                    _ => machine_id.clone(),
                };
                (machine_id, name, false)
            }
            None => {
                let web_id = self.channels.mint_web_client(channel.clone()).await;
                (web_id, WEB_CLIENT_NAME.to_string(), true)
            }
        };

        let connection_id = uuid::Uuid::new_v4().to_string();
        self.pending
            .insert(PendingConnection {
                id: connection_id.clone(),
                from_client_id: from_client_id.clone(),
                from_web,
                origin: channel.clone(),
                to_machine_id: req.target_machine_id.clone(),
                created_at: Instant::now(),
            })
            .await;

        info!(
            connection_id = %connection_id,
            from = %from_client_id,
            target_machine_id = %req.target_machine_id,
            "Connection requested"
        );

        target
            .send(&Frame::event_of(
                "connection_request",
                &ConnectionRequest {
                    from_machine_id: from_client_id,
                    from_machine_name: from_name,
                    connection_id: connection_id.clone(),
                },
            ))
            .await;

        self.arm_timeout(connection_id);

        Ok(())
    }

    /// `connection_accepted` from the target machine. The pending entry is
    /// kept to validate the subsequent SDP/ICE exchange.
    pub async fn accept(
        &self,
        channel: &Arc<ControlChannel>,
        req: ConnectionDecision,
    ) -> Result<(), ErrorCode> {
        let pending = self
            .pending
            .get(&req.connection_id)
            .await
            .ok_or(ErrorCode::ConnectionNotFound)?;

        if channel.machine_id().as_deref() != Some(pending.to_machine_id.as_str()) {
            return Err(ErrorCode::InvalidConnection);
        }

        info!(connection_id = %pending.id, "Connection accepted");

        pending
            .origin
            .send(&Frame::event_of(
                "connection_accepted",
                &ConnectionAccepted {
                    connection_id: pending.id.clone(),
                    target_machine_id: pending.to_machine_id.clone(),
                },
            ))
            .await;

        Ok(())
    }

    /// `connection_rejected` from the target machine. Mismatched or unknown
    /// connections are dropped silently.
    pub async fn reject(&self, channel: &Arc<ControlChannel>, req: ConnectionDecision) {
        let Some(pending) = self.pending.get(&req.connection_id).await else {
            return;
        };

        if channel.machine_id().as_deref() != Some(pending.to_machine_id.as_str()) {
            return;
        }

        info!(connection_id = %pending.id, "Connection rejected");

        pending
            .origin
            .send(&Frame::event_of(
                "connection_rejected",
                &ConnectionRejected {
                    connection_id: pending.id.clone(),
                    reason: req.reason,
                },
            ))
            .await;

        self.teardown(&req.connection_id).await;
    }

    /// `rtc_offer`: forward to the addressed machine, rewriting
    /// `targetMachineId` to the sender's stable id so the callee knows where
    /// to direct its answer. Offers are always directed at a machine.
    pub async fn offer(
        &self,
        channel: &Arc<ControlChannel>,
        req: SdpPayload,
    ) -> Result<(), ErrorCode> {
        let pending = self
            .pending
            .get(&req.connection_id)
            .await
            .ok_or(ErrorCode::ConnectionNotFound)?;

        if !Self::is_participant(channel, &pending) {
            return Err(ErrorCode::InvalidConnection);
        }

        let target = self
            .channels
            .machine_channel(&req.target_machine_id)
            .await
            .ok_or(ErrorCode::MachineOffline)?;

        let sender_id = channel
            .machine_id()
            .unwrap_or_else(|| pending.from_client_id.clone());

        target
            .send(&Frame::event_of(
                "rtc_offer",
                &SdpPayload {
                    connection_id: req.connection_id,
                    target_machine_id: sender_id,
                    sdp: req.sdp,
                },
            ))
            .await;

        Ok(())
    }

    /// `rtc_answer`: forward to the originator (machine or web client), then
    /// tear the pending entry down — the handshake is complete as far as the
    /// relay is concerned.
    pub async fn answer(
        &self,
        channel: &Arc<ControlChannel>,
        req: SdpPayload,
    ) -> Result<(), ErrorCode> {
        let pending = self
            .pending
            .get(&req.connection_id)
            .await
            .ok_or(ErrorCode::ConnectionNotFound)?;

        let target = match self.channels.machine_channel(&req.target_machine_id).await {
            Some(target) => target,
            None => self
                .channels
                .web_channel(&req.target_machine_id)
                .await
                .ok_or(ErrorCode::MachineOffline)?,
        };

        // The answerer is always a machine.
        let sender_id = channel
            .machine_id()
            .unwrap_or_else(|| pending.to_machine_id.clone());

        target
            .send(&Frame::event_of(
                "rtc_answer",
                &SdpPayload {
                    connection_id: req.connection_id.clone(),
                    target_machine_id: sender_id,
                    sdp: req.sdp,
                },
            ))
            .await;

        info!(connection_id = %req.connection_id, "Handshake answered");

        self.teardown(&req.connection_id).await;

        Ok(())
    }

    /// `rtc_ice_candidate`: best-effort relay. Candidates can trickle after
    /// the pending entry is gone, and targets can vanish mid-handshake; both
    /// cases drop silently.
    pub async fn ice_candidate(&self, channel: &Arc<ControlChannel>, req: IceCandidatePayload) {
        let pending = self.pending.get(&req.connection_id).await;

        let target = match self.channels.machine_channel(&req.target_machine_id).await {
            Some(target) => Some(target),
            None => self.channels.web_channel(&req.target_machine_id).await,
        };
        let Some(target) = target else {
            debug!(connection_id = %req.connection_id, "Dropping ICE candidate for offline target");
            return;
        };

        let sender_id = channel
            .machine_id()
            .or_else(|| pending.map(|p| p.from_client_id.clone()));
        let Some(sender_id) = sender_id else {
            return;
        };

        target
            .send(&Frame::event_of(
                "rtc_ice_candidate",
                &IceCandidatePayload {
                    connection_id: req.connection_id,
                    target_machine_id: sender_id,
                    candidate: req.candidate,
                },
            ))
            .await;
    }

    fn is_participant(channel: &Arc<ControlChannel>, pending: &PendingConnection) -> bool {
        let is_origin = Arc::ptr_eq(channel, &pending.origin)
            || channel.machine_id().as_deref() == Some(pending.from_client_id.as_str());
        let is_target = channel.machine_id().as_deref() == Some(pending.to_machine_id.as_str());
        is_origin || is_target
    }

    /// Delete the pending entry and, for a web-originated handshake, its
    /// transient web-client registration.
    async fn teardown(&self, connection_id: &str) -> Option<Arc<PendingConnection>> {
        let pending = self.pending.remove(connection_id).await?;
        if pending.from_web {
            self.channels.remove_web(&pending.from_client_id).await;
        }
        Some(pending)
    }

    /// If the target has not decided within the window, delete the pending
    /// entry and tell the originator.
    fn arm_timeout(&self, connection_id: String) {
        let broker = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(broker.pending_timeout).await;
            if let Some(pending) = broker.teardown(&connection_id).await {
                info!(connection_id = %connection_id, "Connection request timed out");
                pending
                    .origin
                    .send(&Frame::error(
                        None,
                        ErrorCode::ConnectionTimeout,
                        "connection request timed out",
                    ))
                    .await;
            }
        });
    }
}
