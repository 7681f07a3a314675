//! The relay's externally visible surface: WebSocket control channels and
//! the HTTP API, plus the periodic sweep.

pub mod dispatch;
pub mod http;
pub mod sweep;
pub mod ws;

#[cfg(test)]
pub(crate) mod test_helpers;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthService, JwtManager};
use crate::config::Config;
use crate::machines::MachineRegistry;
use crate::registry::{ChannelRegistry, PendingConnections};
use crate::signaling::{PresenceFanout, SignalingBroker};
use crate::storage::RelayDatabase;

/// Process-wide state shared by every connection task and HTTP handler.
pub struct AppState {
    pub config: Config,
    pub db: RelayDatabase,
    pub auth: AuthService,
    pub machines: MachineRegistry,
    pub channels: Arc<ChannelRegistry>,
    pub pending: Arc<PendingConnections>,
    pub broker: SignalingBroker,
    pub presence: PresenceFanout,
}

impl AppState {
    pub fn new(config: Config, db: RelayDatabase) -> Arc<Self> {
        let jwt = Arc::new(JwtManager::new(
            config.jwt_secret.as_bytes(),
            config.jwt_ttl_secs,
        ));
        let auth = AuthService::new(db.clone(), jwt);
        let machines = MachineRegistry::new(db.clone());
        let channels = Arc::new(ChannelRegistry::new());
        let pending = Arc::new(PendingConnections::new());
        let broker = SignalingBroker::new(
            channels.clone(),
            pending.clone(),
            machines.clone(),
            config.pending_timeout,
        );
        let presence = PresenceFanout::new(channels.clone(), machines.clone());

        Arc::new(Self {
            config,
            db,
            auth,
            machines,
            channels,
            pending,
            broker,
            presence,
        })
    }
}

/// Build the router serving both the control channel and the HTTP API.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = http::build_cors_layer(&state.config.allowed_origins);

    Router::new()
        .route("/health", get(http::health))
        .route("/ice-servers", get(http::ice_servers))
        .route("/auth/login", post(http::login))
        .route("/auth/register", post(http::register))
        .route("/auth/me", get(http::me))
        .route("/channel", get(ws::channel_ws))
        .layer(cors)
        .layer(middleware::from_fn(http::preflight_no_content))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
