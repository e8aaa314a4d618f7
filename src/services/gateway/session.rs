use crate::config::GatewayConfig;
use crate::domain::events::{ClientEvent, ServerEvent};
use crate::services::gateway::Metrics;
use crate::services::gateway::hub::{ConnectionHub, ConnectionId};
use crate::services::gateway::router::{ConnectionContext, EventRouter};
use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

pub(crate) struct Session {
    pub(crate) connection_id: ConnectionId,
    pub(crate) user_id: Uuid,
    pub(crate) request_id: String,
    pub(crate) socket: WebSocket,
    pub(crate) hub: Arc<ConnectionHub>,
    pub(crate) router: EventRouter,
    pub(crate) metrics: Metrics,
    pub(crate) config: GatewayConfig,
    pub(crate) shutdown_rx: tokio::sync::watch::Receiver<bool>,
}

impl Session {
    #[tracing::instrument(
        name = "websocket_session",
        skip(self),
        fields(
            user_id = %self.user_id,
            request_id = %self.request_id,
            otel.kind = "server",
            ws.connection_id = %self.connection_id
        )
    )]
    pub(crate) async fn run(self) {
        let Self { connection_id, user_id, socket, hub, router, metrics, config, mut shutdown_rx, .. } = self;

        metrics.active_connections.add(1, &[]);
        tracing::info!("WebSocket connected");

        let (mut ws_sink, mut ws_stream) = socket.split();
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerEvent>(config.outbound_buffer_size);
        hub.register(connection_id, outbound_tx);

        let ctx = ConnectionContext { connection_id, user_id };

        loop {
            if *shutdown_rx.borrow() {
                tracing::info!("Shutdown signal received, closing WebSocket");
                let _ = ws_sink
                    .send(WsMessage::Close(Some(axum::extract::ws::CloseFrame {
                        code: axum::extract::ws::close_code::AWAY,
                        reason: "Server shutting down".into(),
                    })))
                    .await;
                break;
            }

            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {}

                msg = ws_stream.next() => {
                    let continue_loop = match msg {
                        Some(Ok(WsMessage::Text(text))) => {
                            match serde_json::from_str::<ClientEvent>(text.as_str()) {
                                // Runs to completion before the next frame is read.
                                Ok(event) => router.dispatch(&ctx, event).await,
                                Err(e) => {
                                    tracing::warn!(error = %e, "Failed to parse client event");
                                    metrics.malformed_frames_total.add(1, &[]);
                                    hub.send_to(connection_id, ServerEvent::error(format!("Malformed event: {e}")));
                                }
                            }
                            true
                        }
                        Some(Ok(WsMessage::Close(_)) | Err(_)) | None => false,
                        Some(Ok(WsMessage::Binary(_))) => {
                            tracing::warn!("Received unexpected binary message");
                            hub.send_to(connection_id, ServerEvent::error("Binary frames are not supported"));
                            true
                        }
                        Some(Ok(WsMessage::Ping(_))) => {
                            tracing::debug!("Received heartbeat ping from client");
                            true
                        }
                        Some(Ok(WsMessage::Pong(_))) => {
                            tracing::debug!("Received heartbeat pong from client");
                            true
                        }
                    };

                    if !continue_loop { break; }
                }

                event = outbound_rx.recv() => {
                    match event {
                        Some(event) => match serde_json::to_string(&event) {
                            Ok(json) => {
                                if ws_sink.send(WsMessage::Text(json.into())).await.is_err() { break; }
                            }
                            Err(e) => tracing::error!(error = %e, event = event.name(), "Failed to encode server event"),
                        },
                        None => break,
                    }
                }
            }
        }

        let _ = ws_sink.close().await;

        router.disconnect(connection_id);

        metrics.active_connections.add(-1, &[]);
        tracing::info!("WebSocket disconnected");
    }
}
