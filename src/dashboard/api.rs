//! Dashboard HTTP API
//!
//! REST endpoints for the dashboard frontend.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use super::types::*;
use super::{DashboardState, WebSocketBroadcaster};
use crate::series::normalize;
use crate::view::{export_from_store, EthPriceSummary};

type ApiState = (Arc<DashboardState>, WebSocketBroadcaster);

/// Create the API router with all endpoints
pub fn create_router(state: Arc<DashboardState>, broadcaster: WebSocketBroadcaster) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Datasets
        .route("/api/series", get(get_series))
        .route("/api/tokens", get(get_tokens))
        .route("/api/pairs", get(get_pairs))
        .route("/api/pools", get(get_pools))
        .route("/api/eth-price", get(get_eth_price))
        // Health of each dataset
        .route("/api/status", get(get_status))
        // Pool export download
        .route("/api/export", get(get_export))
        // WebSocket
        .route("/ws", get(websocket_handler))
        // State
        .with_state((state, broadcaster))
        // CORS for frontend
        .layer(ServiceBuilder::new().layer(cors))
}

// ─────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────

/// GET /api/series - Liquidity and volume chart series
async fn get_series(State((state, _)): State<ApiState>) -> impl IntoResponse {
    let result = state.store.day_datas().and_then(|snap| {
        let series = normalize(&snap.value)?;
        Ok(DatasetResponse::from_snapshot(snap, |_| series))
    });
    Json(ApiResponse::from_result(result))
}

/// GET /api/tokens
async fn get_tokens(State((state, _)): State<ApiState>) -> impl IntoResponse {
    let result = state
        .store
        .tokens()
        .map(|snap| DatasetResponse::from_snapshot(snap, |v| v.to_vec()));
    Json(ApiResponse::from_result(result))
}

/// GET /api/pairs
async fn get_pairs(State((state, _)): State<ApiState>) -> impl IntoResponse {
    let result = state
        .store
        .pairs()
        .map(|snap| DatasetResponse::from_snapshot(snap, |v| v.to_vec()));
    Json(ApiResponse::from_result(result))
}

/// GET /api/pools - MasterChef reward pools
async fn get_pools(State((state, _)): State<ApiState>) -> impl IntoResponse {
    let result = state
        .store
        .pools()
        .map(|snap| DatasetResponse::from_snapshot(snap, |v| v.to_vec()));
    Json(ApiResponse::from_result(result))
}

/// GET /api/eth-price - Current price with 1d/7d change
async fn get_eth_price(State((state, _)): State<ApiState>) -> impl IntoResponse {
    Json(ApiResponse::from_result(EthPriceSummary::from_store(&state.store)))
}

/// GET /api/status - Phase, freshness and failures per dataset
async fn get_status(State((state, _)): State<ApiState>) -> impl IntoResponse {
    Json(ApiResponse::success(StatusResponse {
        ticks_issued: state.ticks_issued(),
        datasets: state.store.status(),
        timestamp: chrono::Utc::now().timestamp_millis(),
    }))
}

/// GET /api/export - sushi_pools.json as an attachment
async fn get_export(State((state, _)): State<ApiState>) -> Response {
    match export_from_store(&state.store, state.policy) {
        Ok((artifact, report)) => {
            if !report.skipped.is_empty() {
                warn!(
                    skipped = report.skipped.len(),
                    "export left out pairs with unknown tokens"
                );
            }
            let disposition = artifact.content_disposition();
            (
                [
                    (header::CONTENT_TYPE, artifact.mime.to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                artifact.body,
            )
                .into_response()
        }
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::<()>::error(e.to_string())),
        )
            .into_response(),
    }
}

// ─────────────────────────────────────────────────────────────────
// WebSocket Handler
// ─────────────────────────────────────────────────────────────────

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};

/// WebSocket upgrade handler
async fn websocket_handler(
    ws: WebSocketUpgrade,
    State((state, broadcaster)): State<ApiState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_websocket(socket, state, broadcaster))
}

/// Outgoing message type for WebSocket
enum OutgoingMessage {
    Text(String),
    Pong(Vec<u8>),
}

/// Handle WebSocket connection
async fn handle_websocket(
    socket: WebSocket,
    state: Arc<DashboardState>,
    broadcaster: WebSocketBroadcaster,
) {
    use futures_util::{SinkExt, StreamExt};

    tracing::info!("🖥️ New WebSocket connection");

    let (mut sender, mut receiver) = socket.split();

    // Subscribe before the initial status so no update falls in between
    let mut rx = broadcaster.subscribe();

    let msg = WsMessage::Status(state.store.status());
    if let Ok(json) = serde_json::to_string(&msg) {
        if sender.send(Message::Text(json)).await.is_err() {
            return;
        }
    }

    let (out_tx, mut out_rx) = tokio::sync::mpsc::channel::<OutgoingMessage>(32);

    let send_task = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            let result = match msg {
                OutgoingMessage::Text(text) => sender.send(Message::Text(text)).await,
                OutgoingMessage::Pong(data) => sender.send(Message::Pong(data)).await,
            };
            if result.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            broadcast_msg = rx.recv() => {
                match broadcast_msg {
                    Ok(msg) => {
                        if out_tx.send(OutgoingMessage::Text(msg)).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Ping(data))) => {
                        if out_tx.send(OutgoingMessage::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received WebSocket message: {}", text);
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
        }
    }

    send_task.abort();
    tracing::info!("🖥️ WebSocket connection closed");
}
