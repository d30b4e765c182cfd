//! Per-domain usage records. One heartbeat tick appends one epoch-millisecond
//! timestamp; `todaySeconds` is a cached count of the timestamps that fall on
//! the current local calendar day, recomputed on every write.

use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    store::{DOMAIN_TIME_RECORDS, KeyValueStore},
    utils::{clock::Clock, time::is_today},
};

/// How far back timestamps are kept. Anything older has no reader (the
/// weekly report looks back 7 days at most) and would otherwise grow without
/// bound.
const RETENTION: Duration = Duration::days(7);

#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DomainTimeRecord {
    pub domain: String,
    pub timestamps: Vec<i64>,
    pub today_seconds: u64,
}

/// Owns the durable record collection. The collection is read whole, mutated
/// in memory and written back whole.
pub struct RecordStore<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: KeyValueStore> RecordStore<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Returns the full record collection. An unreadable store yields an
    /// empty collection instead of an error.
    pub async fn load_records(&self) -> Vec<DomainTimeRecord> {
        let read = match self.store.get(&[DOMAIN_TIME_RECORDS]).await {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to read domain records: {e:?}");
                return vec![];
            }
        };

        parse_records(read)
    }

    /// Attributes one second of active time to `domain`. A failed write
    /// loses this tick, nothing else.
    pub async fn record_tick(&self, domain: &str) -> Result<()> {
        let now = self.clock.time();
        let mut records = self.load_records().await;

        let record = match records.iter_mut().find(|r| r.domain == domain) {
            Some(v) => v,
            None => {
                records.push(DomainTimeRecord {
                    domain: domain.to_string(),
                    timestamps: vec![],
                    today_seconds: 0,
                });
                records.last_mut().unwrap()
            }
        };

        record.timestamps.push(now.timestamp_millis());

        let cutoff = (now - RETENTION).timestamp_millis();
        record.timestamps.retain(|&t| t >= cutoff);
        record.today_seconds = record
            .timestamps
            .iter()
            .filter(|&&t| is_today(t, now))
            .count() as u64;

        self.store
            .set(HashMap::from([(
                DOMAIN_TIME_RECORDS.to_string(),
                serde_json::to_value(&records)?,
            )]))
            .await
    }
}

/// Extracts the record collection from a raw store read, failing open on a
/// missing or malformed value.
pub fn parse_records(mut read: HashMap<String, serde_json::Value>) -> Vec<DomainTimeRecord> {
    let Some(value) = read.remove(DOMAIN_TIME_RECORDS) else {
        return vec![];
    };

    match serde_json::from_value(value) {
        Ok(v) => v,
        Err(e) => {
            warn!("Stored domain records are malformed: {e}");
            vec![]
        }
    }
}
