//! In-memory registry of live control channels.
//!
//! Three tables, each behind its own lock: all connected clients, the
//! machine-id → channel index used for routing, and the transient
//! web-client index (whose monotonic counter shares its lock). Locks are
//! never held across a channel write; sends go through the channel's
//! bounded mpsc and are drained by its writer task, so each channel has at
//! most one in-flight socket write.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};
use waypost_protocol::Frame;

pub type ChannelId = u64;

/// Message handed to a channel's writer task.
#[derive(Debug)]
pub enum Outbound {
    /// A serialized frame to write to the socket.
    Frame(String),
    /// Close the socket and stop the writer.
    Close,
}

#[derive(Debug)]
struct ChannelState {
    authenticated: bool,
    user_id: Option<String>,
    machine_id: Option<String>,
    web_client_id: Option<String>,
    last_heartbeat: Instant,
}

/// One live bidirectional control channel.
pub struct ControlChannel {
    pub id: ChannelId,
    outbound: mpsc::Sender<Outbound>,
    state: Mutex<ChannelState>,
}

impl ControlChannel {
    pub fn new(id: ChannelId, outbound: mpsc::Sender<Outbound>) -> Arc<Self> {
        Arc::new(Self {
            id,
            outbound,
            state: Mutex::new(ChannelState {
                authenticated: false,
                user_id: None,
                machine_id: None,
                web_client_id: None,
                last_heartbeat: Instant::now(),
            }),
        })
    }

    /// Queue a frame for this channel. Send failures are swallowed: the peer
    /// may be mid-close and the channel's own teardown handles cleanup.
    pub async fn send(&self, frame: &Frame) {
        if self.outbound.send(Outbound::Frame(frame.to_text())).await.is_err() {
            debug!(channel_id = self.id, kind = %frame.kind, "Dropped frame for closing channel");
        }
    }

    /// Ask the writer task to close the socket.
    pub async fn close(&self) {
        let _ = self.outbound.send(Outbound::Close).await;
    }

    pub fn authenticated(&self) -> bool {
        self.state.lock().unwrap().authenticated
    }

    pub fn user_id(&self) -> Option<String> {
        self.state.lock().unwrap().user_id.clone()
    }

    pub fn machine_id(&self) -> Option<String> {
        self.state.lock().unwrap().machine_id.clone()
    }

    pub fn web_client_id(&self) -> Option<String> {
        self.state.lock().unwrap().web_client_id.clone()
    }

    /// Mark the channel authenticated as `user_id`.
    pub fn set_authenticated(&self, user_id: &str) {
        let mut state = self.state.lock().unwrap();
        state.authenticated = true;
        state.user_id = Some(user_id.to_string());
    }

    /// Attach a registered machine identity to this channel.
    pub fn attach_machine(&self, machine_id: &str) {
        self.state.lock().unwrap().machine_id = Some(machine_id.to_string());
    }

    fn attach_web_client(&self, web_client_id: &str) {
        self.state.lock().unwrap().web_client_id = Some(web_client_id.to_string());
    }

    /// Record a heartbeat now.
    pub fn touch_heartbeat(&self) {
        self.state.lock().unwrap().last_heartbeat = Instant::now();
    }

    fn heartbeat_age(&self) -> Duration {
        self.state.lock().unwrap().last_heartbeat.elapsed()
    }

    #[cfg(test)]
    pub(crate) fn backdate_heartbeat(&self, age: Duration) {
        self.state.lock().unwrap().last_heartbeat = Instant::now() - age;
    }
}

#[derive(Default)]
struct WebClients {
    channels: HashMap<String, Arc<ControlChannel>>,
    counter: u64,
}

/// Registry of live channels, shared across all connection tasks.
pub struct ChannelRegistry {
    clients: RwLock<HashMap<ChannelId, Arc<ControlChannel>>>,
    machines: RwLock<HashMap<String, Arc<ControlChannel>>>,
    web: RwLock<WebClients>,
    next_channel_id: AtomicU64,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            machines: RwLock::new(HashMap::new()),
            web: RwLock::new(WebClients::default()),
            next_channel_id: AtomicU64::new(1),
        }
    }

    pub fn next_id(&self) -> ChannelId {
        self.next_channel_id.fetch_add(1, Ordering::Relaxed)
    }

    pub async fn insert(&self, channel: Arc<ControlChannel>) {
        self.clients.write().await.insert(channel.id, channel);
    }

    pub async fn remove(&self, id: ChannelId) -> Option<Arc<ControlChannel>> {
        self.clients.write().await.remove(&id)
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Every live channel; used for shutdown.
    pub async fn all_channels(&self) -> Vec<Arc<ControlChannel>> {
        self.clients.read().await.values().cloned().collect()
    }

    /// Channels whose last heartbeat is older than `timeout`.
    pub async fn stale_channels(&self, timeout: Duration) -> Vec<Arc<ControlChannel>> {
        self.clients
            .read()
            .await
            .values()
            .filter(|ch| ch.heartbeat_age() > timeout)
            .cloned()
            .collect()
    }

    /// Make `channel` the routing target for `machine_id`, returning any
    /// replaced channel. A replaced channel stays open until its own close
    /// fires but stops receiving routed frames.
    pub async fn publish_machine(
        &self,
        machine_id: &str,
        channel: Arc<ControlChannel>,
    ) -> Option<Arc<ControlChannel>> {
        let replaced = self
            .machines
            .write()
            .await
            .insert(machine_id.to_string(), channel);
        if replaced.is_some() {
            info!(machine_id = %machine_id, "Machine channel replaced by re-registration");
        }
        replaced
    }

    /// Remove the routing entry for `machine_id`, but only if it still
    /// points at `channel_id` — a replaced channel closing later must not
    /// evict its successor.
    pub async fn remove_machine_if(&self, machine_id: &str, channel_id: ChannelId) -> bool {
        let mut machines = self.machines.write().await;
        match machines.get(machine_id) {
            Some(current) if current.id == channel_id => {
                machines.remove(machine_id);
                true
            }
            _ => false,
        }
    }

    pub async fn machine_channel(&self, machine_id: &str) -> Option<Arc<ControlChannel>> {
        self.machines.read().await.get(machine_id).cloned()
    }

    /// Snapshot of all machine channels, for presence fan-out.
    pub async fn machine_channels(&self) -> Vec<Arc<ControlChannel>> {
        self.machines.read().await.values().cloned().collect()
    }

    /// Mint a fresh `web-client-<n>` id for a browser-originated channel and
    /// index the channel under it.
    pub async fn mint_web_client(&self, channel: Arc<ControlChannel>) -> String {
        let mut web = self.web.write().await;
        web.counter += 1;
        let id = format!("web-client-{}", web.counter);
        channel.attach_web_client(&id);
        web.channels.insert(id.clone(), channel);
        id
    }

    pub async fn web_channel(&self, web_client_id: &str) -> Option<Arc<ControlChannel>> {
        self.web.read().await.channels.get(web_client_id).cloned()
    }

    pub async fn remove_web(&self, web_client_id: &str) -> bool {
        self.web.write().await.channels.remove(web_client_id).is_some()
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
