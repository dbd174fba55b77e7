//! WebSocket upgrade endpoint.
//!
//! `GET /api/v1/ws/:session_id` upgrades the request and hands the socket to
//! the connection core. The session (mix) id comes from the path and is not
//! renegotiable for the life of the connection.

use crate::ws::{self, MAX_MESSAGE_BYTES};
use crate::AppState;
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use std::sync::Arc;
use uuid::Uuid;

pub async fn ws_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    upgrade: WebSocketUpgrade,
) -> impl IntoResponse {
    let connection_id = Uuid::new_v4().to_string();
    tracing::info!(
        connection_id = %connection_id,
        session_id = %session_id,
        "websocket upgrade"
    );

    upgrade
        .max_message_size(MAX_MESSAGE_BYTES)
        .on_upgrade(move |socket| {
            ws::serve(
                socket,
                connection_id,
                session_id,
                Arc::clone(&state.pool),
                Arc::clone(&state.recipe_service),
            )
        })
}
