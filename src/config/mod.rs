//! Per-domain time budgets. Patterns are either exact hosts or `*.suffix`
//! wildcards; matching scans the list in stored order and the first hit wins,
//! with no specificity rule on top.

use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::store::{KeyValueStore, TIME_CONFIG};

pub const DEFAULT_TIME_LIMIT_MS: u64 = 60 * MINUTE_MS;
const MINUTE_MS: u64 = 60_000;

#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DomainConfig {
    pub domain: String,
    pub time_limit: u64,
    pub enabled: bool,
}

#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TimeConfig {
    pub default_time_limit: u64,
    pub domain_configs: Vec<DomainConfig>,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            default_time_limit: DEFAULT_TIME_LIMIT_MS,
            domain_configs: vec![],
        }
    }
}

impl TimeConfig {
    /// Budget for `domain`, if any. First matching entry in stored order
    /// decides; a disabled entry means "no limit" even though it matched.
    pub fn time_limit_for(&self, domain: &str) -> Option<u64> {
        self.domain_configs
            .iter()
            .find(|dc| pattern_matches(&dc.domain, domain))
            .filter(|dc| dc.enabled)
            .map(|dc| dc.time_limit)
    }
}

/// `*.suffix` matches the suffix itself and any subdomain of it, on label
/// boundaries only ("*.youtube.com" must not capture "notyoutube.com").
fn pattern_matches(pattern: &str, domain: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(suffix) => {
            domain == suffix
                || domain
                    .strip_suffix(suffix)
                    .is_some_and(|head| head.ends_with('.'))
        }
        None => pattern == domain,
    }
}

/// Extracts the config from a raw store read, failing open to the default on
/// a missing or malformed value.
pub fn parse_time_config(mut read: HashMap<String, serde_json::Value>) -> TimeConfig {
    let Some(value) = read.remove(TIME_CONFIG) else {
        return TimeConfig::default();
    };

    match serde_json::from_value(value) {
        Ok(v) => v,
        Err(e) => {
            warn!("Stored time config is malformed: {e}");
            TimeConfig::default()
        }
    }
}

/// Owns the durable [TimeConfig]. Every mutation takes the caller's view of
/// the config, produces a new one and persists it immediately.
pub struct TimeConfigController<S> {
    store: Arc<S>,
}

impl<S: KeyValueStore> TimeConfigController<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Returns the stored config, or the default (1 hour, no domain entries)
    /// when the store is unreadable or the value malformed.
    pub async fn load(&self) -> TimeConfig {
        let read = match self.store.get(&[TIME_CONFIG]).await {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to read time config: {e:?}");
                return TimeConfig::default();
            }
        };

        parse_time_config(read)
    }

    async fn save(&self, config: &TimeConfig) {
        // A lost config write is diagnostic-only, same as a lost tick.
        if let Err(e) = self.try_save(config).await {
            error!("Failed to save time config: {e:?}");
        }
    }

    async fn try_save(&self, config: &TimeConfig) -> Result<()> {
        self.store
            .set(HashMap::from([(
                TIME_CONFIG.to_string(),
                serde_json::to_value(config)?,
            )]))
            .await
    }

    /// Adds a budget of `minutes` for `domain`, replacing any entry with the
    /// exact same trimmed domain. The new entry is always enabled, so
    /// re-adding a disabled domain re-enables it.
    pub async fn add_domain_config(
        &self,
        mut config: TimeConfig,
        domain: &str,
        minutes: u64,
    ) -> TimeConfig {
        let domain = domain.trim();
        if domain.is_empty() {
            return config;
        }

        config.domain_configs.retain(|dc| dc.domain != domain);
        config.domain_configs.push(DomainConfig {
            domain: domain.to_string(),
            time_limit: minutes * MINUTE_MS,
            enabled: true,
        });

        self.save(&config).await;
        config
    }

    pub async fn remove_domain_config(&self, mut config: TimeConfig, domain: &str) -> TimeConfig {
        config.domain_configs.retain(|dc| dc.domain != domain);
        self.save(&config).await;
        config
    }

    pub async fn toggle_domain_config(&self, mut config: TimeConfig, domain: &str) -> TimeConfig {
        for dc in &mut config.domain_configs {
            if dc.domain == domain {
                dc.enabled = !dc.enabled;
            }
        }
        self.save(&config).await;
        config
    }

    pub async fn update_domain_time_limit(
        &self,
        mut config: TimeConfig,
        domain: &str,
        minutes: u64,
    ) -> TimeConfig {
        for dc in &mut config.domain_configs {
            if dc.domain == domain {
                dc.time_limit = minutes * MINUTE_MS;
            }
        }
        self.save(&config).await;
        config
    }
}
