//! Error types
//!
//! `FetchError` covers a single remote request; `AnalyticsError` covers
//! everything the store, normalizer and exporter can reject.

use thiserror::Error;

use crate::types::DatasetKey;

/// Failure of one subgraph request
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("subgraph errors: {0}")]
    GraphQl(String),
    #[error("subgraph response has no `{0}` field")]
    MissingData(&'static str),
    #[error("no block found after timestamp {0}")]
    BlockNotFound(i64),
    #[error("unparsable number `{value}` in `{field}`")]
    BadNumber { field: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("dataset `{0}` has not been loaded yet")]
    NotLoaded(DatasetKey),

    #[error("initial load of `{dataset}` failed: {source}")]
    InitialLoad {
        dataset: DatasetKey,
        #[source]
        source: FetchError,
    },

    #[error("day {date}: `{field}` is not a number (`{value}`)")]
    DataIntegrity {
        date: i64,
        field: &'static str,
        value: String,
    },

    #[error("symbol `{symbol}` is shared by tokens {first} and {second}")]
    AmbiguousSymbol {
        symbol: String,
        first: String,
        second: String,
    },

    #[error("cannot store a `{found}` value under `{key}`")]
    DatasetMismatch { key: DatasetKey, found: &'static str },

    #[error("refresh interval must be greater than zero")]
    ZeroInterval,

    #[error("failed to serialize export: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write export: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = AnalyticsError> = std::result::Result<T, E>;
