//! Configuration defaults

/// Refresh period of the dashboard datasets
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 60_000;

pub const DEFAULT_EXCHANGE_SUBGRAPH: &str =
    "https://api.thegraph.com/subgraphs/name/sushiswap/exchange";
pub const DEFAULT_MASTERCHEF_SUBGRAPH: &str =
    "https://api.thegraph.com/subgraphs/name/sushiswap/master-chef";
pub const DEFAULT_BLOCKS_SUBGRAPH: &str =
    "https://api.thegraph.com/subgraphs/name/blocklytics/ethereum-blocks";
