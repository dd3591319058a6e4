//! Dashboard API Types
//!
//! DTOs for HTTP/WebSocket communication with the dashboard frontend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{DatasetStatus, Snapshot, StoreUpdate};

// ─────────────────────────────────────────────────────────────────
// Responses
// ─────────────────────────────────────────────────────────────────

/// One dataset read with its own freshness
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetResponse<T> {
    pub as_of: DateTime<Utc>,
    pub tick: u64,
    pub records: T,
}

impl<T> DatasetResponse<T> {
    pub fn from_snapshot<S>(snap: Snapshot<S>, map: impl FnOnce(S) -> T) -> Self {
        Self {
            as_of: snap.as_of,
            tick: snap.tick,
            records: map(snap.value),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub ticks_issued: Option<u64>,
    pub datasets: Vec<DatasetStatus>,
    pub timestamp: i64,
}

// ─────────────────────────────────────────────────────────────────
// WebSocket Messages
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    /// Per-dataset status (sent on connect)
    Status(Vec<DatasetStatus>),
    /// A dataset was replaced in the store
    DatasetUpdated(StoreUpdate),
    /// Heartbeat (ms timestamp)
    Heartbeat(i64),
}

// ─────────────────────────────────────────────────────────────────
// API Response wrapper
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }

    pub fn from_result<E: std::fmt::Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(data) => Self::success(data),
            Err(e) => Self::error(e.to_string()),
        }
    }
}
