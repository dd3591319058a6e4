//! Core types used throughout SushiDash
//!
//! Subgraph records (day data, tokens, pairs, reward pools) and the keys
//! that name each independently refreshed dataset.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::sync::Arc;

/// Independently refreshed remote datasets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DatasetKey {
    DayDatas,
    EthPrice,
    OneDayEthPrice,
    SevenDayEthPrice,
    Tokens,
    Pairs,
    Pools,
}

impl DatasetKey {
    pub const ALL: [DatasetKey; 7] = [
        DatasetKey::DayDatas,
        DatasetKey::EthPrice,
        DatasetKey::OneDayEthPrice,
        DatasetKey::SevenDayEthPrice,
        DatasetKey::Tokens,
        DatasetKey::Pairs,
        DatasetKey::Pools,
    ];

    /// Stable name used in logs and API payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKey::DayDatas => "day_datas",
            DatasetKey::EthPrice => "eth_price",
            DatasetKey::OneDayEthPrice => "one_day_eth_price",
            DatasetKey::SevenDayEthPrice => "seven_day_eth_price",
            DatasetKey::Tokens => "tokens",
            DatasetKey::Pairs => "pairs",
            DatasetKey::Pools => "pools",
        }
    }

    /// Whether the slot for this key holds an ETH price
    pub fn is_eth_price(&self) -> bool {
        matches!(
            self,
            DatasetKey::EthPrice | DatasetKey::OneDayEthPrice | DatasetKey::SevenDayEthPrice
        )
    }
}

impl fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One day of protocol-wide aggregates.
///
/// Amounts stay as the decimal strings the subgraph returns; a liquidity of
/// exactly `"0"` marks a placeholder day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayAggregate {
    /// Unix timestamp (seconds) of the day start
    pub date: i64,
    #[serde(rename = "liquidityUSD")]
    pub liquidity_usd: String,
    #[serde(rename = "volumeUSD")]
    pub volume_usd: String,
}

/// Chart point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: i64,
    pub value: f64,
}

/// Token from the exchange subgraph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// Canonical token address
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(deserialize_with = "u32_from_str_or_num")]
    pub decimals: u32,
    /// Price in ETH as returned by the subgraph (kept verbatim)
    #[serde(rename = "derivedETH")]
    pub derived_eth: String,
}

/// Token fields embedded in a pair record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRef {
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(rename = "derivedETH")]
    pub derived_eth: String,
}

/// Liquidity pair (pool) joining two tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pair {
    /// Pool address
    pub id: String,
    pub token0: TokenRef,
    pub token1: TokenRef,
    #[serde(rename = "reserveUSD", default, skip_serializing_if = "Option::is_none")]
    pub reserve_usd: Option<String>,
    #[serde(rename = "volumeUSD", default, skip_serializing_if = "Option::is_none")]
    pub volume_usd: Option<String>,
}

/// MasterChef reward pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardPool {
    pub id: String,
    /// Address of the staked LP pair
    pub pair: String,
    #[serde(rename = "allocPoint", deserialize_with = "u64_from_str_or_num")]
    pub alloc_point: u64,
    #[serde(rename = "slpBalance")]
    pub slp_balance: String,
    #[serde(rename = "userCount", deserialize_with = "u64_from_str_or_num")]
    pub user_count: u64,
}

/// Value held by one store slot
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetValue {
    DayDatas(Arc<Vec<DayAggregate>>),
    EthPrice(f64),
    Tokens(Arc<Vec<Token>>),
    Pairs(Arc<Vec<Pair>>),
    Pools(Arc<Vec<RewardPool>>),
}

impl DatasetValue {
    /// Whether this value may be stored under `key`
    pub fn fits(&self, key: DatasetKey) -> bool {
        match self {
            DatasetValue::DayDatas(_) => key == DatasetKey::DayDatas,
            DatasetValue::EthPrice(_) => key.is_eth_price(),
            DatasetValue::Tokens(_) => key == DatasetKey::Tokens,
            DatasetValue::Pairs(_) => key == DatasetKey::Pairs,
            DatasetValue::Pools(_) => key == DatasetKey::Pools,
        }
    }

    /// Short kind name for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            DatasetValue::DayDatas(_) => "day_datas",
            DatasetValue::EthPrice(_) => "eth_price",
            DatasetValue::Tokens(_) => "tokens",
            DatasetValue::Pairs(_) => "pairs",
            DatasetValue::Pools(_) => "pools",
        }
    }

    /// Number of records (1 for scalar prices)
    pub fn len(&self) -> usize {
        match self {
            DatasetValue::DayDatas(v) => v.len(),
            DatasetValue::EthPrice(_) => 1,
            DatasetValue::Tokens(v) => v.len(),
            DatasetValue::Pairs(v) => v.len(),
            DatasetValue::Pools(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The Graph encodes BigInt as a string; accept either form.
fn u32_from_str_or_num<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let n = u64_from_str_or_num(deserializer)?;
    u32::try_from(n).map_err(serde::de::Error::custom)
}

fn u64_from_str_or_num<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StrOrNum {
        Str(String),
        Num(u64),
    }

    match StrOrNum::deserialize(deserializer)? {
        StrOrNum::Num(n) => Ok(n),
        StrOrNum::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
