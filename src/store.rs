//! Query Store - Shared cache of the latest snapshot per dataset
//!
//! Only fetchers write; everything else reads. Each slot is replaced
//! atomically and carries its own as-of time and tick, so readers can see
//! one dataset refreshed while another is still in flight.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::{AnalyticsError, Result};
use crate::types::{DatasetKey, DatasetValue, DayAggregate, Pair, RewardPool, Token};

/// Tick number used for writes made before the scheduler starts
pub const BOOTSTRAP_TICK: u64 = 0;

/// A read of one slot
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<T> {
    pub value: T,
    pub as_of: DateTime<Utc>,
    pub tick: u64,
}

/// Lifecycle of one dataset as seen by readers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatasetPhase {
    /// Never fetched
    Idle,
    /// First fetch in flight
    Loading,
    /// Value present, nothing in flight
    Ready,
    /// Value present, background fetch in flight
    Refreshing,
}

/// Broadcast on every accepted write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreUpdate {
    pub key: DatasetKey,
    pub as_of: DateTime<Utc>,
    pub tick: u64,
    pub records: usize,
}

/// Per-dataset health row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStatus {
    pub key: DatasetKey,
    pub phase: DatasetPhase,
    pub as_of: Option<DateTime<Utc>>,
    pub tick: u64,
    pub records: usize,
    pub failures: u64,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct Slot {
    value: Option<DatasetValue>,
    as_of: Option<DateTime<Utc>>,
    tick: u64,
    in_flight: u32,
    failures: u64,
    last_error: Option<String>,
}

impl Slot {
    fn phase(&self) -> DatasetPhase {
        match (self.value.is_some(), self.in_flight > 0) {
            (false, false) => DatasetPhase::Idle,
            (false, true) => DatasetPhase::Loading,
            (true, false) => DatasetPhase::Ready,
            (true, true) => DatasetPhase::Refreshing,
        }
    }
}

/// Shared cache, injected as `Arc<QueryStore>`
#[derive(Debug)]
pub struct QueryStore {
    slots: RwLock<HashMap<DatasetKey, Slot>>,
    updates: broadcast::Sender<StoreUpdate>,
}

impl QueryStore {
    /// Create a store whose update channel buffers `capacity` messages
    pub fn new(capacity: usize) -> Self {
        let (updates, _) = broadcast::channel(capacity);
        Self {
            slots: RwLock::new(HashMap::new()),
            updates,
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Receive one `StoreUpdate` per accepted write
    pub fn subscribe(&self) -> broadcast::Receiver<StoreUpdate> {
        self.updates.subscribe()
    }

    /// Store `value` under `key` as the result of `tick`.
    ///
    /// Returns `Ok(false)` when the slot already holds a value from a later
    /// tick; that write is dropped.
    pub fn publish(&self, key: DatasetKey, value: DatasetValue, tick: u64) -> Result<bool> {
        if !value.fits(key) {
            return Err(AnalyticsError::DatasetMismatch {
                key,
                found: value.kind(),
            });
        }

        let update = {
            let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
            let slot = slots.entry(key).or_default();
            if slot.value.is_some() && slot.tick > tick {
                debug!(
                    dataset = %key,
                    tick,
                    current_tick = slot.tick,
                    "dropping late response from an older tick"
                );
                return Ok(false);
            }

            let as_of = Utc::now();
            let records = value.len();
            slot.value = Some(value);
            slot.as_of = Some(as_of);
            slot.tick = tick;
            slot.last_error = None;
            StoreUpdate {
                key,
                as_of,
                tick,
                records,
            }
        };

        // No subscribers is fine
        let _ = self.updates.send(update);
        Ok(true)
    }

    /// Note a failed fetch; the previous value stays in place
    pub fn record_failure(&self, key: DatasetKey, error: impl ToString) {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let slot = slots.entry(key).or_default();
        slot.failures += 1;
        slot.last_error = Some(error.to_string());
    }

    /// Mark a fetch for `key` as in flight until the guard drops
    pub fn begin_fetch(&self, key: DatasetKey) -> InFlightGuard<'_> {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        slots.entry(key).or_default().in_flight += 1;
        InFlightGuard { store: self, key }
    }

    fn end_fetch(&self, key: DatasetKey) {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = slots.get_mut(&key) {
            slot.in_flight = slot.in_flight.saturating_sub(1);
        }
    }

    /// Raw read of a slot
    pub fn get(&self, key: DatasetKey) -> Result<Snapshot<DatasetValue>> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots
            .get(&key)
            .and_then(|slot| match (&slot.value, slot.as_of) {
                (Some(value), Some(as_of)) => Some(Snapshot {
                    value: value.clone(),
                    as_of,
                    tick: slot.tick,
                }),
                _ => None,
            })
            .ok_or(AnalyticsError::NotLoaded(key))
    }

    pub fn is_loaded(&self, key: DatasetKey) -> bool {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots.get(&key).map_or(false, |slot| slot.value.is_some())
    }

    pub fn phase(&self, key: DatasetKey) -> DatasetPhase {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots.get(&key).map_or(DatasetPhase::Idle, Slot::phase)
    }

    pub fn day_datas(&self) -> Result<Snapshot<Arc<Vec<DayAggregate>>>> {
        let snap = self.get(DatasetKey::DayDatas)?;
        match snap.value {
            DatasetValue::DayDatas(v) => Ok(Snapshot {
                value: v,
                as_of: snap.as_of,
                tick: snap.tick,
            }),
            other => Err(AnalyticsError::DatasetMismatch {
                key: DatasetKey::DayDatas,
                found: other.kind(),
            }),
        }
    }

    pub fn tokens(&self) -> Result<Snapshot<Arc<Vec<Token>>>> {
        let snap = self.get(DatasetKey::Tokens)?;
        match snap.value {
            DatasetValue::Tokens(v) => Ok(Snapshot {
                value: v,
                as_of: snap.as_of,
                tick: snap.tick,
            }),
            other => Err(AnalyticsError::DatasetMismatch {
                key: DatasetKey::Tokens,
                found: other.kind(),
            }),
        }
    }

    pub fn pairs(&self) -> Result<Snapshot<Arc<Vec<Pair>>>> {
        let snap = self.get(DatasetKey::Pairs)?;
        match snap.value {
            DatasetValue::Pairs(v) => Ok(Snapshot {
                value: v,
                as_of: snap.as_of,
                tick: snap.tick,
            }),
            other => Err(AnalyticsError::DatasetMismatch {
                key: DatasetKey::Pairs,
                found: other.kind(),
            }),
        }
    }

    pub fn pools(&self) -> Result<Snapshot<Arc<Vec<RewardPool>>>> {
        let snap = self.get(DatasetKey::Pools)?;
        match snap.value {
            DatasetValue::Pools(v) => Ok(Snapshot {
                value: v,
                as_of: snap.as_of,
                tick: snap.tick,
            }),
            other => Err(AnalyticsError::DatasetMismatch {
                key: DatasetKey::Pools,
                found: other.kind(),
            }),
        }
    }

    /// ETH price stored under one of the three price keys
    pub fn eth_price(&self, key: DatasetKey) -> Result<Snapshot<f64>> {
        let snap = self.get(key)?;
        match snap.value {
            DatasetValue::EthPrice(price) => Ok(Snapshot {
                value: price,
                as_of: snap.as_of,
                tick: snap.tick,
            }),
            other => Err(AnalyticsError::DatasetMismatch {
                key,
                found: other.kind(),
            }),
        }
    }

    /// Status rows for every known dataset, in `DatasetKey::ALL` order
    pub fn status(&self) -> Vec<DatasetStatus> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        DatasetKey::ALL
            .iter()
            .map(|key| match slots.get(key) {
                Some(slot) => DatasetStatus {
                    key: *key,
                    phase: slot.phase(),
                    as_of: slot.as_of,
                    tick: slot.tick,
                    records: slot.value.as_ref().map_or(0, DatasetValue::len),
                    failures: slot.failures,
                    last_error: slot.last_error.clone(),
                },
                None => DatasetStatus {
                    key: *key,
                    phase: DatasetPhase::Idle,
                    as_of: None,
                    tick: 0,
                    records: 0,
                    failures: 0,
                    last_error: None,
                },
            })
            .collect()
    }
}

impl Default for QueryStore {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Keeps a dataset in `Loading`/`Refreshing` while alive
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    store: &'a QueryStore,
    key: DatasetKey,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.store.end_fetch(self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(n: usize) -> DatasetValue {
        let list = (0..n)
            .map(|i| Token {
                id: format!("0x{:040x}", i),
                symbol: format!("T{}", i),
                name: format!("Token {}", i),
                decimals: 18,
                derived_eth: "1".to_string(),
            })
            .collect();
        DatasetValue::Tokens(Arc::new(list))
    }

    #[test]
    fn read_before_load_is_not_loaded() {
        let store = QueryStore::default();
        assert!(matches!(
            store.tokens(),
            Err(AnalyticsError::NotLoaded(DatasetKey::Tokens))
        ));
        assert_eq!(store.phase(DatasetKey::Tokens), DatasetPhase::Idle);
    }

    #[test]
    fn publish_then_read_returns_snapshot() {
        let store = QueryStore::default();
        assert!(store.publish(DatasetKey::Tokens, tokens(3), 1).unwrap());

        let snap = store.tokens().unwrap();
        assert_eq!(snap.value.len(), 3);
        assert_eq!(snap.tick, 1);
        assert!(store.is_loaded(DatasetKey::Tokens));
    }

    #[test]
    fn late_response_from_older_tick_is_dropped() {
        let store = QueryStore::default();
        store.publish(DatasetKey::Tokens, tokens(5), 2).unwrap();

        let accepted = store.publish(DatasetKey::Tokens, tokens(1), 1).unwrap();
        assert!(!accepted);
        assert_eq!(store.tokens().unwrap().value.len(), 5);
        assert_eq!(store.tokens().unwrap().tick, 2);
    }

    #[test]
    fn wrong_value_kind_is_rejected() {
        let store = QueryStore::default();
        let err = store
            .publish(DatasetKey::Pairs, tokens(1), 1)
            .unwrap_err();
        assert!(matches!(
            err,
            AnalyticsError::DatasetMismatch {
                key: DatasetKey::Pairs,
                found: "tokens"
            }
        ));
    }

    #[test]
    fn failure_keeps_previous_value() {
        let store = QueryStore::default();
        store.publish(DatasetKey::Tokens, tokens(2), 1).unwrap();
        store.record_failure(DatasetKey::Tokens, "timeout");

        assert_eq!(store.tokens().unwrap().value.len(), 2);
        let row = store
            .status()
            .into_iter()
            .find(|s| s.key == DatasetKey::Tokens)
            .unwrap();
        assert_eq!(row.failures, 1);
        assert_eq!(row.last_error.as_deref(), Some("timeout"));
    }

    #[test]
    fn phase_follows_in_flight_guard() {
        let store = QueryStore::default();
        {
            let _guard = store.begin_fetch(DatasetKey::Pools);
            assert_eq!(store.phase(DatasetKey::Pools), DatasetPhase::Loading);
        }
        assert_eq!(store.phase(DatasetKey::Pools), DatasetPhase::Idle);

        store
            .publish(DatasetKey::Pools, DatasetValue::Pools(Arc::new(Vec::new())), 1)
            .unwrap();
        assert_eq!(store.phase(DatasetKey::Pools), DatasetPhase::Ready);

        let guard = store.begin_fetch(DatasetKey::Pools);
        assert_eq!(store.phase(DatasetKey::Pools), DatasetPhase::Refreshing);
        drop(guard);
        assert_eq!(store.phase(DatasetKey::Pools), DatasetPhase::Ready);
    }

    #[test]
    fn eth_price_slots_are_independent() {
        let store = QueryStore::default();
        store
            .publish(DatasetKey::EthPrice, DatasetValue::EthPrice(3000.0), 1)
            .unwrap();
        store
            .publish(DatasetKey::OneDayEthPrice, DatasetValue::EthPrice(2900.0), 1)
            .unwrap();

        assert_eq!(store.eth_price(DatasetKey::EthPrice).unwrap().value, 3000.0);
        assert_eq!(
            store.eth_price(DatasetKey::OneDayEthPrice).unwrap().value,
            2900.0
        );
        assert!(store.eth_price(DatasetKey::SevenDayEthPrice).is_err());
    }

    #[tokio::test]
    async fn subscribers_see_accepted_writes_only() {
        let store = QueryStore::default();
        let mut rx = store.subscribe();

        store.publish(DatasetKey::Tokens, tokens(4), 3).unwrap();
        store.publish(DatasetKey::Tokens, tokens(1), 2).unwrap();

        let update = rx.recv().await.unwrap();
        assert_eq!(update.key, DatasetKey::Tokens);
        assert_eq!(update.tick, 3);
        assert_eq!(update.records, 4);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn status_lists_every_dataset() {
        let store = QueryStore::default();
        let status = store.status();
        assert_eq!(status.len(), DatasetKey::ALL.len());
        assert!(status.iter().all(|s| s.phase == DatasetPhase::Idle));
    }
}
