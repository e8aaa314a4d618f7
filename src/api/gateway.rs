use crate::api::AppState;
use crate::error::AppError;
use axum::{
    extract::{Query, State, ws::WebSocketUpgrade},
    http::Extensions,
    response::IntoResponse,
};
use serde::Deserialize;
use tower_http::request_id::RequestId;

#[derive(Deserialize)]
pub struct WsParams {
    token: Option<String>,
}

/// Upgrades an authenticated client to the chat gateway. The access token travels in `?token=`.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    extensions: Extensions,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let request_id = extensions
        .get::<RequestId>()
        .map(|id| id.header_value().to_str().unwrap_or_default().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let Some(token) = params.token else {
        tracing::warn!("WebSocket handshake failed: missing token");
        return AppError::AuthError.into_response();
    };

    match state.auth_service.verify_token(&token) {
        Ok(user_id) => {
            let gateway = state.gateway_service.clone();
            let shutdown_rx = state.shutdown_rx.clone();
            ws.max_message_size(gateway.config().max_frame_bytes)
                .on_upgrade(move |socket| async move {
                    gateway.handle_socket(socket, user_id, request_id, shutdown_rx).await;
                })
                .into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "WebSocket handshake failed: invalid token");
            e.into_response()
        }
    }
}
