//! ETH price source - current bundle price and price at a past block
//!
//! Past prices resolve the first block mined after the target timestamp
//! via the blocks subgraph, then read the exchange bundle at that block.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::debug;

use super::{parse_decimal, DatasetFetcher};
use crate::error::FetchError;
use crate::subgraph::SubgraphClient;
use crate::types::{DatasetKey, DatasetValue};

/// Width of the block search window after the target timestamp
const BLOCK_WINDOW_SECS: i64 = 600;
const ONE_DAY_SECS: i64 = 86_400;

/// Point in time the price is read at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceAt {
    Now,
    OneDayAgo,
    SevenDaysAgo,
}

impl PriceAt {
    pub fn key(&self) -> DatasetKey {
        match self {
            PriceAt::Now => DatasetKey::EthPrice,
            PriceAt::OneDayAgo => DatasetKey::OneDayEthPrice,
            PriceAt::SevenDaysAgo => DatasetKey::SevenDayEthPrice,
        }
    }

    /// Seconds before now, `None` for the live price
    pub fn offset_secs(&self) -> Option<i64> {
        match self {
            PriceAt::Now => None,
            PriceAt::OneDayAgo => Some(ONE_DAY_SECS),
            PriceAt::SevenDaysAgo => Some(7 * ONE_DAY_SECS),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BundleData {
    bundle: Option<Bundle>,
}

#[derive(Debug, Deserialize)]
struct Bundle {
    #[serde(rename = "ethPrice")]
    eth_price: String,
}

#[derive(Debug, Deserialize)]
struct BlocksData {
    blocks: Vec<Block>,
}

#[derive(Debug, Deserialize)]
struct Block {
    number: String,
}

pub struct EthPriceFetcher {
    exchange: SubgraphClient,
    blocks: SubgraphClient,
    at: PriceAt,
}

impl EthPriceFetcher {
    pub fn new(exchange: SubgraphClient, blocks: SubgraphClient, at: PriceAt) -> Self {
        Self {
            exchange,
            blocks,
            at,
        }
    }

    async fn block_after(&self, timestamp: i64) -> Result<u64, FetchError> {
        let data: BlocksData = self.blocks.query(&block_query(timestamp)).await?;
        let block = data
            .blocks
            .into_iter()
            .next()
            .ok_or(FetchError::BlockNotFound(timestamp))?;
        block.number.trim().parse().map_err(|_| FetchError::BadNumber {
            field: "number",
            value: block.number,
        })
    }
}

#[async_trait]
impl DatasetFetcher for EthPriceFetcher {
    fn key(&self) -> DatasetKey {
        self.at.key()
    }

    async fn fetch(&self) -> Result<DatasetValue, FetchError> {
        let block = match self.at.offset_secs() {
            Some(offset) => Some(self.block_after(Utc::now().timestamp() - offset).await?),
            None => None,
        };

        let data: BundleData = self.exchange.query(&bundle_query(block)).await?;
        let bundle = data.bundle.ok_or(FetchError::MissingData("bundle"))?;
        let price = parse_decimal("ethPrice", &bundle.eth_price)?;

        debug!(dataset = %self.key(), ?block, price, "fetched ETH price");
        Ok(DatasetValue::EthPrice(price))
    }
}

fn block_query(timestamp: i64) -> String {
    format!(
        r#"{{
            blocks(
                first: 1,
                orderBy: timestamp,
                orderDirection: asc,
                where: {{ timestamp_gt: {from}, timestamp_lt: {to} }}
            ) {{
                id
                number
                timestamp
            }}
        }}"#,
        from = timestamp,
        to = timestamp + BLOCK_WINDOW_SECS
    )
}

fn bundle_query(block: Option<u64>) -> String {
    match block {
        Some(number) => format!(
            r#"{{ bundle(id: 1, block: {{ number: {number} }}) {{ ethPrice }} }}"#
        ),
        None => r#"{ bundle(id: 1) { ethPrice } }"#.to_string(),
    }
}
