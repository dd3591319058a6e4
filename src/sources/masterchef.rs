//! MasterChef subgraph source - SUSHI reward pools

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use super::DatasetFetcher;
use crate::error::FetchError;
use crate::subgraph::SubgraphClient;
use crate::types::{DatasetKey, DatasetValue, RewardPool};

#[derive(Debug, Deserialize)]
struct PoolsData {
    pools: Vec<RewardPool>,
}

pub struct PoolsFetcher {
    client: SubgraphClient,
    page_size: u32,
}

impl PoolsFetcher {
    pub fn new(client: SubgraphClient, page_size: u32) -> Self {
        Self { client, page_size }
    }
}

#[async_trait]
impl DatasetFetcher for PoolsFetcher {
    fn key(&self) -> DatasetKey {
        DatasetKey::Pools
    }

    async fn fetch(&self) -> Result<DatasetValue, FetchError> {
        let data: PoolsData = self.client.query(&pools_query(self.page_size)).await?;
        let pools = active_pools(data.pools);
        debug!(records = pools.len(), "fetched reward pools");
        Ok(DatasetValue::Pools(Arc::new(pools)))
    }
}

/// Pools with no allocation earn nothing and are not shown
fn active_pools(pools: Vec<RewardPool>) -> Vec<RewardPool> {
    pools.into_iter().filter(|p| p.alloc_point > 0).collect()
}

fn pools_query(first: u32) -> String {
    format!(
        r#"{{
            pools(first: {first}, orderBy: allocPoint, orderDirection: desc) {{
                id
                pair
                allocPoint
                slpBalance
                userCount
            }}
        }}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pools_payload_decodes_bigints() {
        let data: PoolsData = serde_json::from_value(serde_json::json!({
            "pools": [
                { "id": "0", "pair": "0x06da", "allocPoint": "1000", "slpBalance": "12.5", "userCount": "77" },
                { "id": "1", "pair": "0x397f", "allocPoint": 0, "slpBalance": "0", "userCount": 3 }
            ]
        }))
        .unwrap();

        assert_eq!(data.pools[0].alloc_point, 1000);
        assert_eq!(data.pools[0].user_count, 77);
        assert_eq!(data.pools[1].alloc_point, 0);
    }

    #[test]
    fn unallocated_pools_are_dropped() {
        let data: PoolsData = serde_json::from_value(serde_json::json!({
            "pools": [
                { "id": "0", "pair": "0x06da", "allocPoint": "1000", "slpBalance": "12.5", "userCount": "77" },
                { "id": "1", "pair": "0x397f", "allocPoint": "0", "slpBalance": "0", "userCount": "3" },
                { "id": "2", "pair": "0xc3d0", "allocPoint": 1, "slpBalance": "1", "userCount": 1 }
            ]
        }))
        .unwrap();

        let ids: Vec<String> = active_pools(data.pools).into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["0", "2"]);
    }

    #[test]
    fn query_orders_by_allocation() {
        let q = pools_query(1000);
        assert!(q.contains("orderBy: allocPoint"));
        assert!(q.contains("first: 1000"));
    }
}
