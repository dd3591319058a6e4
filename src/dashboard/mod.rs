//! Dashboard Module
//!
//! Provides HTTP/WebSocket API over the query store for the SushiSwap
//! analytics frontend. Only compiled when the `dashboard` feature is enabled.

mod api;
mod types;
mod websocket;

pub use api::create_router;
pub use types::*;
pub use websocket::WebSocketBroadcaster;

use anyhow::Context;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::export::SymbolPolicy;
use crate::store::QueryStore;

const HEARTBEAT_PERIOD: Duration = Duration::from_secs(15);

/// Shared state behind every handler
#[derive(Debug)]
pub struct DashboardState {
    pub store: Arc<QueryStore>,
    /// Symbol policy applied by `/api/export`
    pub policy: SymbolPolicy,
    ticks: Option<Arc<AtomicU64>>,
}

impl DashboardState {
    pub fn new(store: Arc<QueryStore>, policy: SymbolPolicy) -> Self {
        Self {
            store,
            policy,
            ticks: None,
        }
    }

    /// Report scheduler ticks in `/api/status`
    pub fn with_ticks(mut self, ticks: Arc<AtomicU64>) -> Self {
        self.ticks = Some(ticks);
        self
    }

    pub fn ticks_issued(&self) -> Option<u64> {
        self.ticks.as_ref().map(|t| t.load(Ordering::SeqCst))
    }
}

/// Serve the dashboard API on `port` until the task is cancelled
pub async fn start_server(state: DashboardState, port: u16) -> anyhow::Result<()> {
    let broadcaster = WebSocketBroadcaster::default();
    let relay = broadcaster.forward_store_updates(&state.store);
    let heartbeat = broadcaster.spawn_heartbeat(HEARTBEAT_PERIOD);

    let app = create_router(Arc::new(state), broadcaster);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    info!("📊 Dashboard API listening on http://{}", addr);

    let result = axum::serve(listener, app)
        .await
        .context("running dashboard server");

    relay.abort();
    heartbeat.abort();
    result
}
