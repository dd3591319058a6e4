//! Dashboard View - Lifetime owner of the refresh machinery
//!
//! Mounting a view loads every dataset once, then starts the scheduler.
//! Readers go through the shared store; `teardown` stops all background
//! work before returning.

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::RefreshConfig;
use crate::error::{AnalyticsError, Result};
use crate::export::{build_export, ExportArtifact, ExportReport, SymbolPolicy};
use crate::scheduler::{RefreshScheduler, RefreshStats, SchedulerHandle};
use crate::series::{normalize, ChartSeries};
use crate::sources::{DatasetFetcher, DatasetRefresher};
use crate::store::{DatasetStatus, QueryStore, BOOTSTRAP_TICK};
use crate::types::{DatasetKey, Pair, RewardPool, Token};

/// Current, 24h-ago and 7d-ago ETH price with relative changes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EthPriceSummary {
    pub current: f64,
    pub one_day_ago: f64,
    pub seven_day_ago: f64,
    /// `None` when the reference price is zero
    pub change_1d_pct: Option<f64>,
    pub change_7d_pct: Option<f64>,
}

impl EthPriceSummary {
    pub fn new(current: f64, one_day_ago: f64, seven_day_ago: f64) -> Self {
        Self {
            current,
            one_day_ago,
            seven_day_ago,
            change_1d_pct: pct_change(current, one_day_ago),
            change_7d_pct: pct_change(current, seven_day_ago),
        }
    }

    /// Read the three price slots of `store`
    pub fn from_store(store: &QueryStore) -> Result<Self> {
        Ok(Self::new(
            store.eth_price(DatasetKey::EthPrice)?.value,
            store.eth_price(DatasetKey::OneDayEthPrice)?.value,
            store.eth_price(DatasetKey::SevenDayEthPrice)?.value,
        ))
    }
}

fn pct_change(current: f64, reference: f64) -> Option<f64> {
    if reference == 0.0 {
        return None;
    }
    Some((current - reference) / reference * 100.0)
}

/// Everything the dashboard page renders, read in one pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub series: ChartSeries,
    pub tokens: Vec<Token>,
    pub pairs: Vec<Pair>,
    pub pools: Vec<RewardPool>,
    pub eth: EthPriceSummary,
    pub datasets: Vec<DatasetStatus>,
}

impl DashboardSnapshot {
    pub fn read(store: &QueryStore) -> Result<Self> {
        Ok(Self {
            series: normalize(&store.day_datas()?.value)?,
            tokens: store.tokens()?.value.to_vec(),
            pairs: store.pairs()?.value.to_vec(),
            pools: store.pools()?.value.to_vec(),
            eth: EthPriceSummary::from_store(store)?,
            datasets: store.status(),
        })
    }
}

/// Fetch every dataset concurrently and publish at the bootstrap tick.
///
/// Any single failure fails the whole load; datasets that did arrive are
/// still published. The first failure, fetch or publish, is returned.
pub async fn bootstrap(store: &QueryStore, fetchers: &[Arc<dyn DatasetFetcher>]) -> Result<()> {
    info!("📥 Loading {} datasets...", fetchers.len());

    let results = join_all(fetchers.iter().map(|fetcher| async move {
        let key = fetcher.key();
        let _in_flight = store.begin_fetch(key);
        (key, fetcher.fetch().await)
    }))
    .await;

    let mut first_error = None;
    for (key, result) in results {
        match result {
            Ok(value) => {
                if let Err(e) = store.publish(key, value, BOOTSTRAP_TICK) {
                    warn!(dataset = %key, error = %e, "initial value rejected");
                    store.record_failure(key, &e);
                    first_error.get_or_insert(e);
                }
            }
            Err(source) => {
                warn!(dataset = %key, error = %source, "initial load failed");
                store.record_failure(key, &source);
                if first_error.is_none() {
                    first_error = Some(AnalyticsError::InitialLoad {
                        dataset: key,
                        source,
                    });
                }
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => {
            info!("✅ All datasets loaded");
            Ok(())
        }
    }
}

/// A mounted dashboard: loaded store plus running scheduler
pub struct DashboardView {
    store: Arc<QueryStore>,
    scheduler: SchedulerHandle,
}

impl DashboardView {
    /// Load all datasets, then start refreshing them every interval
    pub async fn mount(
        store: Arc<QueryStore>,
        fetchers: Vec<Arc<dyn DatasetFetcher>>,
        refresh: &RefreshConfig,
    ) -> Result<Self> {
        if refresh.interval_ms == 0 {
            return Err(AnalyticsError::ZeroInterval);
        }
        bootstrap(&store, &fetchers).await?;

        let scheduler = RefreshScheduler::new(Duration::from_millis(refresh.interval_ms))
            .fire_immediately(refresh.fire_immediately)
            .with_ops(DatasetRefresher::for_all(&fetchers, &store))
            .spawn();

        info!(
            "🔁 Refreshing {} datasets every {}ms",
            fetchers.len(),
            refresh.interval_ms
        );
        Ok(Self { store, scheduler })
    }

    pub fn store(&self) -> &Arc<QueryStore> {
        &self.store
    }

    pub fn scheduler(&self) -> &SchedulerHandle {
        &self.scheduler
    }

    pub fn snapshot(&self) -> Result<DashboardSnapshot> {
        DashboardSnapshot::read(&self.store)
    }

    /// Build `sushi_pools.json` from the current pairs and tokens
    pub fn export(&self, policy: SymbolPolicy) -> Result<(ExportArtifact, ExportReport)> {
        export_from_store(&self.store, policy)
    }

    /// Stop the scheduler and wait for in-flight refreshes to be reaped
    pub async fn teardown(self) -> RefreshStats {
        let stats = self.scheduler.shutdown().await;
        info!(
            batches = stats.batches,
            updated = stats.updated,
            failed = stats.failed,
            "🛑 Dashboard view unmounted"
        );
        stats
    }
}

/// Export from whatever the store currently holds
pub fn export_from_store(
    store: &QueryStore,
    policy: SymbolPolicy,
) -> Result<(ExportArtifact, ExportReport)> {
    let pairs = store.pairs()?;
    let tokens = store.tokens()?;
    let report = build_export(&pairs.value, &tokens.value, policy)?;
    let artifact = ExportArtifact::from_records(&report.records)?;
    Ok((artifact, report))
}
