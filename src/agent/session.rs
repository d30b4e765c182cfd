use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::{
    page::PageContext,
    records::RecordStore,
    store::{CURRENT_ACTIVE_TAB, KeyValueStore},
    utils::clock::Clock,
};

/// Last domain observed as foregrounded, by any context. A single global
/// slot: every heartbeat overwrites it whole, nothing ever clears it.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CurrentActiveTab {
    pub domain: String,
}

/// Extracts the active-tab pointer from a raw store read; absent or
/// malformed means no pointer.
pub fn parse_active_tab(mut read: HashMap<String, serde_json::Value>) -> Option<CurrentActiveTab> {
    let value = read.remove(CURRENT_ACTIVE_TAB)?;
    match serde_json::from_value(value) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Stored active tab pointer is malformed: {e}");
            None
        }
    }
}

/// Heartbeat state machine of one browsing context. While the page is
/// foregrounded every tick attributes one second to its domain and claims
/// the global active-tab slot; while backgrounded it does neither and the
/// slot goes stale. Contexts do not coordinate: two foregrounded contexts
/// overwrite each other and the last writer wins.
pub struct SessionTracker<S> {
    records: RecordStore<S>,
    store: Arc<S>,
    page: Box<dyn PageContext>,
    shutdown: CancellationToken,
    heartbeat: Duration,
    clock: Arc<dyn Clock>,
}

impl<S: KeyValueStore> SessionTracker<S> {
    pub fn new(
        store: Arc<S>,
        page: Box<dyn PageContext>,
        shutdown: CancellationToken,
        heartbeat: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            records: RecordStore::new(store.clone(), clock.clone()),
            store,
            page,
            shutdown,
            heartbeat,
            clock,
        }
    }

    async fn tick(&mut self) -> Result<()> {
        if !self.page.is_visible()? {
            debug!("Page backgrounded, skipping tick");
            return Ok(());
        }

        let domain = self.page.hostname();
        self.records.record_tick(&domain).await?;

        self.store
            .set(HashMap::from([(
                CURRENT_ACTIVE_TAB.to_string(),
                serde_json::to_value(CurrentActiveTab {
                    domain: domain.to_string(),
                })?,
            )]))
            .await
    }

    /// Executes the heartbeat loop until the owning context is torn down.
    pub async fn run(mut self) -> Result<()> {
        let mut tick_point = self.clock.instant();
        loop {
            tick_point += self.heartbeat;

            // A failed tick loses one second of telemetry, nothing more.
            if let Err(e) = self.tick().await {
                error!("Heartbeat tick failed {e:?}");
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                _ = self.clock.sleep_until(tick_point) => ()
            }
        }
    }
}
