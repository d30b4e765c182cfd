//! Wiring for one browsing context: a 1-second heartbeat tracker and a
//! 10-second limit monitor over the same durable store, both cancelled
//! together when the context goes away.

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::{
    agent::{
        monitor::LimitMonitor,
        notify::{NotificationController, NotificationPresenter},
        session::SessionTracker,
    },
    page::PageContext,
    store::KeyValueStore,
    utils::clock::{Clock, DefaultClock},
};

pub mod monitor;
pub mod notify;
pub mod session;
pub mod shutdown;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);
const CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// Runs the agent for one page until Ctrl-C. Dismiss events come from
/// whatever affordance the presenter exposes to the user.
pub async fn run_agent<S: KeyValueStore, P: NotificationPresenter>(
    store: Arc<S>,
    page: Box<dyn PageContext>,
    presenter: P,
    dismissals: mpsc::Receiver<()>,
) -> Result<()> {
    let shutdown_token = CancellationToken::new();
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);

    let hostname = page.hostname();
    let tracker = create_tracker(store.clone(), page, &shutdown_token, clock.clone());
    let monitor = create_monitor(
        store,
        hostname,
        presenter,
        dismissals,
        &shutdown_token,
        clock,
    );

    let (_, tracking_result, monitoring_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        tracker.run(),
        monitor.run(),
    );

    if let Err(tracking_result) = tracking_result {
        error!("Session tracker got an error {:?}", tracking_result);
    }

    if let Err(monitoring_result) = monitoring_result {
        error!("Limit monitor got an error {:?}", monitoring_result);
    }

    Ok(())
}

fn create_tracker<S: KeyValueStore>(
    store: Arc<S>,
    page: Box<dyn PageContext>,
    shutdown_token: &CancellationToken,
    clock: Arc<dyn Clock>,
) -> SessionTracker<S> {
    SessionTracker::new(
        store,
        page,
        shutdown_token.clone(),
        HEARTBEAT_INTERVAL,
        clock,
    )
}

fn create_monitor<S: KeyValueStore, P: NotificationPresenter>(
    store: Arc<S>,
    hostname: Arc<str>,
    presenter: P,
    dismissals: mpsc::Receiver<()>,
    shutdown_token: &CancellationToken,
    clock: Arc<dyn Clock>,
) -> LimitMonitor<S, P> {
    let notifier = NotificationController::new(presenter, clock.clone());
    LimitMonitor::new(
        store,
        hostname,
        notifier,
        dismissals,
        shutdown_token.clone(),
        CHECK_INTERVAL,
        clock,
    )
}

#[cfg(test)]
mod agent_tests {
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
        time::Duration,
    };

    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::{DateTime, Local, TimeZone, Utc};
    use tokio::{sync::mpsc, time::Instant};
    use tokio_util::sync::CancellationToken;

    use crate::{
        agent::{
            create_monitor, create_tracker,
            notify::{NotificationHandle, NotificationPresenter},
            session::parse_active_tab,
        },
        config::{DomainConfig, TimeConfig},
        page::MockPageContext,
        records::RecordStore,
        store::{CURRENT_ACTIVE_TAB, KeyValueStore, TIME_CONFIG, memory::MemoryStore},
        utils::{clock::Clock, logging::TEST_LOGGING},
    };

    /// Wall clock pinned to a fixed noon so virtual time never crosses a
    /// local midnight mid-test.
    #[derive(Clone)]
    struct TestClock {
        start_time: DateTime<Utc>,
        reference: Instant,
    }

    impl TestClock {
        fn at_noon() -> Self {
            Self {
                start_time: Local
                    .with_ymd_and_hms(2024, 3, 15, 12, 0, 0)
                    .unwrap()
                    .to_utc(),
                reference: Instant::now(),
            }
        }
    }

    #[async_trait]
    impl Clock for TestClock {
        fn time(&self) -> DateTime<Utc> {
            self.start_time + self.reference.elapsed()
        }

        fn instant(&self) -> Instant {
            Instant::now()
        }

        async fn sleep(&self, duration: Duration) {
            tokio::time::sleep(duration).await;
        }

        async fn sleep_until(&self, instant: Instant) {
            tokio::time::sleep_until(instant).await;
        }
    }

    #[derive(Default, Clone)]
    struct CountingPresenter {
        shows: Arc<Mutex<u64>>,
    }

    impl NotificationPresenter for CountingPresenter {
        fn show(&mut self) -> Result<NotificationHandle> {
            let mut shows = self.shows.lock().unwrap();
            *shows += 1;
            Ok(NotificationHandle(*shows))
        }

        fn begin_dismiss(&mut self, _handle: NotificationHandle) -> Result<()> {
            Ok(())
        }

        fn remove(&mut self, _handle: NotificationHandle) -> Result<()> {
            Ok(())
        }
    }

    /// Smoke test for the whole context: a minute-long budget, an always
    /// foregrounded page and enough virtual time to exhaust the budget.
    #[tokio::test(start_paused = true)]
    async fn smoke_test_agent() -> Result<()> {
        *TEST_LOGGING;
        let store = Arc::new(MemoryStore::new());
        store
            .set(HashMap::from([(
                TIME_CONFIG.to_string(),
                serde_json::to_value(TimeConfig {
                    domain_configs: vec![DomainConfig {
                        domain: "example.com".into(),
                        time_limit: 60_000,
                        enabled: true,
                    }],
                    ..TimeConfig::default()
                })?,
            )]))
            .await?;

        let mut page = MockPageContext::new();
        page.expect_hostname().returning(|| "example.com".into());
        page.expect_is_visible().returning(|| Ok(true));

        let shutdown_token = CancellationToken::new();
        let clock: Arc<dyn Clock> = Arc::new(TestClock::at_noon());
        let (_dismiss_tx, dismiss_rx) = mpsc::channel(1);

        let presenter = CountingPresenter::default();
        let tracker = create_tracker(
            store.clone(),
            Box::new(page),
            &shutdown_token,
            clock.clone(),
        );
        let monitor = create_monitor(
            store.clone(),
            "example.com".into(),
            presenter.clone(),
            dismiss_rx,
            &shutdown_token,
            clock.clone(),
        );

        let (_, tracking_result, monitoring_result) = tokio::join!(
            async {
                tokio::time::sleep(Duration::from_millis(75_500)).await;
                shutdown_token.cancel()
            },
            tracker.run(),
            monitor.run(),
        );

        tracking_result?;
        monitoring_result?;

        let records = RecordStore::new(store.clone(), clock).load_records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].domain, "example.com");
        assert!(records[0].today_seconds >= 70);

        let tab = parse_active_tab(store.get(&[CURRENT_ACTIVE_TAB]).await?);
        assert_eq!(tab.unwrap().domain, "example.com");

        assert!(*presenter.shows.lock().unwrap() >= 1);
        Ok(())
    }
}
