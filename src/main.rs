//! SushiDash - SushiSwap analytics data service
//!
//! Loads every dashboard dataset, keeps them fresh on a timer and
//! optionally serves them over HTTP/WebSocket.

use anyhow::{Context, Result};
use tracing::info;

use sushidash::config::AppConfig;
use sushidash::sources::default_fetchers;
use sushidash::store::QueryStore;
use sushidash::subgraph::Subgraphs;
use sushidash::view::DashboardView;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;
    sushidash::logging::init(&config.logging);

    info!("🍣 SushiDash v{} starting", env!("CARGO_PKG_VERSION"));
    info!("⚙️ {}", config);

    let subgraphs =
        Subgraphs::from_config(&config.subgraph).context("Failed to build subgraph client")?;
    let fetchers = default_fetchers(&subgraphs, config.subgraph.page_size);

    let store = QueryStore::shared();
    let view = DashboardView::mount(store.clone(), fetchers, &config.refresh)
        .await
        .context("Initial dataset load failed")?;

    let server = spawn_dashboard(&config, &view);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("🛑 Shutdown requested");

    if let Some(server) = server {
        server.abort();
    }
    let stats = view.teardown().await;
    info!(
        batches = stats.batches,
        updated = stats.updated,
        failed = stats.failed,
        panicked = stats.panicked,
        "👋 SushiDash stopped"
    );
    Ok(())
}

#[cfg(feature = "dashboard")]
fn spawn_dashboard(config: &AppConfig, view: &DashboardView) -> Option<tokio::task::JoinHandle<()>> {
    use sushidash::dashboard::{start_server, DashboardState};
    use sushidash::export::SymbolPolicy;

    if !config.dashboard.enabled {
        return None;
    }

    let state = DashboardState::new(
        view.store().clone(),
        SymbolPolicy::from_allow_duplicates(config.export.allow_duplicate_symbols),
    )
    .with_ticks(view.scheduler().tick_counter());
    let port = config.dashboard.port;

    Some(tokio::spawn(async move {
        if let Err(e) = start_server(state, port).await {
            tracing::error!("❌ Dashboard server failed: {:#}", e);
        }
    }))
}

#[cfg(not(feature = "dashboard"))]
fn spawn_dashboard(config: &AppConfig, _view: &DashboardView) -> Option<tokio::task::JoinHandle<()>> {
    if config.dashboard.enabled {
        tracing::warn!("dashboard.enabled is set but this build lacks the `dashboard` feature");
    }
    None
}
