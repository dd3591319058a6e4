//! Exchange subgraph sources - day data, tokens, pairs

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use super::DatasetFetcher;
use crate::error::FetchError;
use crate::subgraph::SubgraphClient;
use crate::types::{DatasetKey, DatasetValue, DayAggregate, Pair, Token};

#[derive(Debug, Deserialize)]
struct DayDatasData {
    #[serde(rename = "dayDatas")]
    day_datas: Vec<DayAggregate>,
}

#[derive(Debug, Deserialize)]
struct TokensData {
    tokens: Vec<Token>,
}

#[derive(Debug, Deserialize)]
struct PairsData {
    pairs: Vec<Pair>,
}

/// Protocol-wide daily liquidity and volume, newest first
pub struct DayDataFetcher {
    client: SubgraphClient,
    page_size: u32,
}

impl DayDataFetcher {
    pub fn new(client: SubgraphClient, page_size: u32) -> Self {
        Self { client, page_size }
    }
}

#[async_trait]
impl DatasetFetcher for DayDataFetcher {
    fn key(&self) -> DatasetKey {
        DatasetKey::DayDatas
    }

    async fn fetch(&self) -> Result<DatasetValue, FetchError> {
        let data: DayDatasData = self.client.query(&day_datas_query(self.page_size)).await?;
        debug!(records = data.day_datas.len(), "fetched day datas");
        Ok(DatasetValue::DayDatas(Arc::new(data.day_datas)))
    }
}

/// Top tokens by volume
pub struct TokensFetcher {
    client: SubgraphClient,
    page_size: u32,
}

impl TokensFetcher {
    pub fn new(client: SubgraphClient, page_size: u32) -> Self {
        Self { client, page_size }
    }
}

#[async_trait]
impl DatasetFetcher for TokensFetcher {
    fn key(&self) -> DatasetKey {
        DatasetKey::Tokens
    }

    async fn fetch(&self) -> Result<DatasetValue, FetchError> {
        let data: TokensData = self.client.query(&tokens_query(self.page_size)).await?;
        debug!(records = data.tokens.len(), "fetched tokens");
        Ok(DatasetValue::Tokens(Arc::new(data.tokens)))
    }
}

/// Top pairs by reserve
pub struct PairsFetcher {
    client: SubgraphClient,
    page_size: u32,
}

impl PairsFetcher {
    pub fn new(client: SubgraphClient, page_size: u32) -> Self {
        Self { client, page_size }
    }
}

#[async_trait]
impl DatasetFetcher for PairsFetcher {
    fn key(&self) -> DatasetKey {
        DatasetKey::Pairs
    }

    async fn fetch(&self) -> Result<DatasetValue, FetchError> {
        let data: PairsData = self.client.query(&pairs_query(self.page_size)).await?;
        debug!(records = data.pairs.len(), "fetched pairs");
        Ok(DatasetValue::Pairs(Arc::new(data.pairs)))
    }
}

fn day_datas_query(first: u32) -> String {
    format!(
        r#"{{
            dayDatas(first: {first}, orderBy: date, orderDirection: desc) {{
                id
                date
                liquidityUSD
                volumeUSD
                txCount
            }}
        }}"#
    )
}

fn tokens_query(first: u32) -> String {
    format!(
        r#"{{
            tokens(first: {first}, orderBy: volumeUSD, orderDirection: desc) {{
                id
                symbol
                name
                decimals
                derivedETH
            }}
        }}"#
    )
}

fn pairs_query(first: u32) -> String {
    format!(
        r#"{{
            pairs(first: {first}, orderBy: reserveUSD, orderDirection: desc) {{
                id
                reserveUSD
                volumeUSD
                token0 {{ id symbol name derivedETH }}
                token1 {{ id symbol name derivedETH }}
            }}
        }}"#
    )
}
