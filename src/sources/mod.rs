//! Dataset sources (exchange, masterchef and blocks subgraphs)
//!
//! Each fetcher performs one remote read and returns the whole dataset.
//! `DatasetRefresher` turns a fetcher into a scheduler op that writes the
//! query store and never lets a failure escape.

mod eth_price;
mod exchange;
mod masterchef;

pub use eth_price::{EthPriceFetcher, PriceAt};
pub use exchange::{DayDataFetcher, PairsFetcher, TokensFetcher};
pub use masterchef::PoolsFetcher;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::scheduler::{RefreshOp, RefreshOutcome};
use crate::store::QueryStore;
use crate::subgraph::Subgraphs;
use crate::types::{DatasetKey, DatasetValue};

/// Trait for remote dataset fetchers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DatasetFetcher: Send + Sync {
    /// Store slot this fetcher fills
    fn key(&self) -> DatasetKey;

    /// Fetch the current dataset
    async fn fetch(&self) -> Result<DatasetValue, FetchError>;
}

/// One fetcher per dashboard dataset
pub fn default_fetchers(subgraphs: &Subgraphs, page_size: u32) -> Vec<Arc<dyn DatasetFetcher>> {
    vec![
        Arc::new(DayDataFetcher::new(subgraphs.exchange.clone(), page_size)),
        Arc::new(EthPriceFetcher::new(
            subgraphs.exchange.clone(),
            subgraphs.blocks.clone(),
            PriceAt::Now,
        )),
        Arc::new(EthPriceFetcher::new(
            subgraphs.exchange.clone(),
            subgraphs.blocks.clone(),
            PriceAt::OneDayAgo,
        )),
        Arc::new(EthPriceFetcher::new(
            subgraphs.exchange.clone(),
            subgraphs.blocks.clone(),
            PriceAt::SevenDaysAgo,
        )),
        Arc::new(TokensFetcher::new(subgraphs.exchange.clone(), page_size)),
        Arc::new(PairsFetcher::new(subgraphs.exchange.clone(), page_size)),
        Arc::new(PoolsFetcher::new(subgraphs.masterchef.clone(), page_size)),
    ]
}

/// Scheduler op that refreshes one store slot
pub struct DatasetRefresher {
    fetcher: Arc<dyn DatasetFetcher>,
    store: Arc<QueryStore>,
}

impl DatasetRefresher {
    pub fn new(fetcher: Arc<dyn DatasetFetcher>, store: Arc<QueryStore>) -> Self {
        Self { fetcher, store }
    }

    /// Wrap every fetcher as a scheduler op over the same store
    pub fn for_all(
        fetchers: &[Arc<dyn DatasetFetcher>],
        store: &Arc<QueryStore>,
    ) -> Vec<Arc<dyn RefreshOp>> {
        fetchers
            .iter()
            .map(|f| Arc::new(Self::new(f.clone(), store.clone())) as Arc<dyn RefreshOp>)
            .collect()
    }
}

#[async_trait]
impl RefreshOp for DatasetRefresher {
    fn name(&self) -> &'static str {
        self.fetcher.key().as_str()
    }

    async fn refresh(&self, tick: u64) -> RefreshOutcome {
        let key = self.fetcher.key();
        let _in_flight = self.store.begin_fetch(key);

        match self.fetcher.fetch().await {
            Ok(value) => match self.store.publish(key, value, tick) {
                Ok(true) => {
                    debug!(dataset = %key, tick, "dataset refreshed");
                    RefreshOutcome::Updated
                }
                Ok(false) => RefreshOutcome::Superseded,
                Err(e) => {
                    warn!(dataset = %key, tick, error = %e, "fetcher returned the wrong dataset");
                    self.store.record_failure(key, &e);
                    RefreshOutcome::Failed
                }
            },
            Err(e) => {
                warn!(
                    dataset = %key,
                    tick,
                    error = %e,
                    "background refresh failed, keeping last snapshot"
                );
                self.store.record_failure(key, &e);
                RefreshOutcome::Failed
            }
        }
    }
}

/// Parse a BigDecimal string returned by a subgraph
pub(crate) fn parse_decimal(field: &'static str, raw: &str) -> Result<f64, FetchError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| FetchError::BadNumber {
            field,
            value: raw.to_string(),
        })
}
