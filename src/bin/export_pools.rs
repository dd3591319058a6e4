//! One-shot export of sushi_pools.json
//!
//! Usage: cargo run --bin export_pools
//!
//! Fetches the current tokens and pairs once, joins them and writes the
//! export into `export.dir`.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use sushidash::config::AppConfig;
use sushidash::export::SymbolPolicy;
use sushidash::sources::{DatasetFetcher, PairsFetcher, TokensFetcher};
use sushidash::store::QueryStore;
use sushidash::subgraph::Subgraphs;
use sushidash::view::{bootstrap, export_from_store};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;
    sushidash::logging::init(&config.logging);

    info!("📦 Exporting pools...");

    let subgraphs =
        Subgraphs::from_config(&config.subgraph).context("Failed to build subgraph client")?;
    let page_size = config.subgraph.page_size;
    let fetchers: Vec<Arc<dyn DatasetFetcher>> = vec![
        Arc::new(TokensFetcher::new(subgraphs.exchange.clone(), page_size)),
        Arc::new(PairsFetcher::new(subgraphs.exchange.clone(), page_size)),
    ];

    let store = QueryStore::default();
    bootstrap(&store, &fetchers)
        .await
        .context("Failed to fetch tokens and pairs")?;

    let policy = SymbolPolicy::from_allow_duplicates(config.export.allow_duplicate_symbols);
    let (artifact, report) = export_from_store(&store, policy).context("Export failed")?;

    for skipped in &report.skipped {
        warn!(
            pair = %skipped.pair,
            symbol = %skipped.unresolved_symbol,
            "pair skipped, token not in lookup"
        );
    }

    let path = artifact
        .write_to(&config.export.dir)
        .await
        .with_context(|| format!("Failed to write export into {}", config.export.dir))?;

    info!("");
    info!("🎉 EXPORT COMPLETE");
    info!("============================");
    info!("Pools exported: {}", report.records.len());
    info!("Pairs skipped: {}", report.skipped.len());
    info!("File: {}", path.display());

    Ok(())
}
