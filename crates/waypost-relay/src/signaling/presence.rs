//! Presence fan-out: online/offline notifications to the owner's other
//! live machine channels.

use std::sync::Arc;

use tracing::warn;
use waypost_protocol::{Frame, PresenceEvent};

use crate::machines::MachineRegistry;
use crate::registry::{ChannelId, ChannelRegistry};

#[derive(Clone)]
pub struct PresenceFanout {
    channels: Arc<ChannelRegistry>,
    machines: MachineRegistry,
}

impl PresenceFanout {
    pub fn new(channels: Arc<ChannelRegistry>, machines: MachineRegistry) -> Self {
        Self { channels, machines }
    }

    /// Send `machine_online` / `machine_offline` for `machine_id` to every
    /// live machine channel of the same owner, skipping `exclude`.
    ///
    /// Iteration source is the machine-channel index: browser-only channels
    /// do not receive presence updates.
    pub async fn broadcast(&self, machine_id: &str, online: bool, exclude: Option<ChannelId>) {
        let machine = match self.machines.get(machine_id).await {
            Ok(Some(machine)) => machine,
            Ok(None) => return,
            Err(e) => {
                warn!(machine_id = %machine_id, error = %e, "Presence lookup failed");
                return;
            }
        };

        let kind = if online { "machine_online" } else { "machine_offline" };
        let frame = Frame::event_of(
            kind,
            &PresenceEvent {
                machine_id: machine.id.clone(),
                name: machine.name.clone(),
            },
        );

        // Snapshot first so no registry lock is held across sends.
        let targets = self.channels.machine_channels().await;
        for channel in targets {
            if exclude == Some(channel.id) {
                continue;
            }
            if channel.user_id().as_deref() == Some(machine.user_id.as_str()) {
                channel.send(&frame).await;
            }
        }
    }
}
