pub mod hub;
pub mod router;
pub(crate) mod session;

use crate::config::GatewayConfig;
use crate::domain::message::Message;
use crate::services::gateway::hub::{ConnectionHub, ConnectionId};
use crate::services::gateway::router::EventRouter;
use crate::services::gateway::session::Session;
use axum::extract::ws::WebSocket;
use opentelemetry::{
    global,
    metrics::{Counter, UpDownCounter},
};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub(crate) struct Metrics {
    pub(crate) active_connections: UpDownCounter<i64>,
    pub(crate) malformed_frames_total: Counter<u64>,
}

impl Metrics {
    #[must_use]
    pub(crate) fn new() -> Self {
        let meter = global::meter("bookswap-server");
        Self {
            active_connections: meter
                .i64_up_down_counter("websocket_active_connections")
                .with_description("Number of active WebSocket connections")
                .build(),
            malformed_frames_total: meter
                .u64_counter("websocket_malformed_frames_total")
                .with_description("Total inbound frames that could not be parsed as a client event")
                .build(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the live connections and routes chat events between them.
#[derive(Clone, Debug)]
pub struct GatewayService {
    hub: Arc<ConnectionHub>,
    router: EventRouter,
    config: GatewayConfig,
    metrics: Metrics,
}

impl GatewayService {
    #[must_use]
    pub fn new(hub: Arc<ConnectionHub>, router: EventRouter, config: GatewayConfig) -> Self {
        Self { hub, router, config, metrics: Metrics::new() }
    }

    #[must_use]
    pub const fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Number of sessions currently registered.
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.hub.len()
    }

    pub async fn handle_socket(
        &self,
        socket: WebSocket,
        user_id: Uuid,
        request_id: String,
        shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) {
        let session = Session {
            connection_id: ConnectionId::new(),
            user_id,
            request_id,
            socket,
            hub: Arc::clone(&self.hub),
            router: self.router.clone(),
            metrics: self.metrics.clone(),
            config: self.config.clone(),
            shutdown_rx,
        };

        session.run().await;
    }

    /// Pushes a message stored outside the gateway (REST) to its participants.
    pub async fn deliver_new(&self, message: &Message) {
        self.router.deliver_new(message, None).await;
    }

    pub async fn deliver_updated(&self, message: &Message) {
        self.router.deliver_updated(message, None).await;
    }

    pub async fn deliver_deleted(&self, message: &Message) {
        self.router.deliver_deleted(message, None).await;
    }
}
