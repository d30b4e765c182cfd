//! The durable store the whole application shares. It is a plain key-value
//! surface: values are read whole, mutated in memory and written back whole.
//! Two contexts writing the same key concurrently lose one of the updates,
//! which is accepted for best-effort telemetry.

pub mod json_file;
pub mod memory;

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Key under which the domain record collection lives.
pub const DOMAIN_TIME_RECORDS: &str = "domainTimeRecords";
/// Key of the single global "last foregrounded domain" pointer.
pub const CURRENT_ACTIVE_TAB: &str = "currentActiveTab";
/// Key of the per-domain budget configuration.
pub const TIME_CONFIG: &str = "timeConfig";

/// Narrow port over the durable key-value store. Keys that are absent are
/// simply missing from the returned map.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>>;

    /// Writes the given entries, leaving unrelated keys untouched.
    async fn set(&self, entries: HashMap<String, Value>) -> Result<()>;
}
