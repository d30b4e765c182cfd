use std::{sync::Arc, time::Duration};

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::{
    agent::{
        notify::{NotificationController, NotificationPresenter},
        session::parse_active_tab,
    },
    config::parse_time_config,
    records::parse_records,
    store::{CURRENT_ACTIVE_TAB, DOMAIN_TIME_RECORDS, KeyValueStore, TIME_CONFIG},
    utils::clock::Clock,
};

/// Periodically compares this context's usage against its budget and drives
/// the warning state machine. Runs in the page context whose domain it
/// evaluates; user dismissals arrive on a channel from the presenter side.
pub struct LimitMonitor<S, P> {
    store: Arc<S>,
    hostname: Arc<str>,
    notifier: NotificationController<P>,
    dismissals: mpsc::Receiver<()>,
    shutdown: CancellationToken,
    check_interval: Duration,
    clock: Arc<dyn Clock>,
}

impl<S: KeyValueStore, P: NotificationPresenter> LimitMonitor<S, P> {
    pub fn new(
        store: Arc<S>,
        hostname: Arc<str>,
        notifier: NotificationController<P>,
        dismissals: mpsc::Receiver<()>,
        shutdown: CancellationToken,
        check_interval: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            hostname,
            notifier,
            dismissals,
            shutdown,
            check_interval,
            clock,
        }
    }

    /// One monitor run. Guards apply in order: no record or no enabled
    /// matching budget means nothing to do; a foreign active-tab pointer
    /// means this domain is backgrounded and never warned, even over budget.
    async fn check_limit(&mut self) -> Result<()> {
        let read = self
            .store
            .get(&[DOMAIN_TIME_RECORDS, CURRENT_ACTIVE_TAB, TIME_CONFIG])
            .await?;

        let records = parse_records(read.clone());
        let active_tab = parse_active_tab(read.clone());
        let config = parse_time_config(read);

        let Some(record) = records.iter().find(|r| r.domain == *self.hostname) else {
            return Ok(());
        };
        let Some(time_limit) = config.time_limit_for(&self.hostname) else {
            return Ok(());
        };

        if let Some(tab) = active_tab {
            if tab.domain != *self.hostname {
                return Ok(());
            }
        }

        if record.today_seconds * 1000 > time_limit {
            debug!(
                "Budget for {} exhausted ({}s used)",
                self.hostname, record.today_seconds
            );
            self.notifier.trigger_show()?;
        }

        Ok(())
    }

    /// Executes the monitor loop until the owning context is torn down.
    pub async fn run(mut self) -> Result<()> {
        let mut check_point = self.clock.instant();
        let mut dismissals_open = true;
        loop {
            check_point += self.check_interval;

            if let Err(e) = self.check_limit().await {
                error!("Limit check failed {e:?}");
            }

            loop {
                tokio::select! {
                    _ = self.shutdown.cancelled() => {
                        return Ok(())
                    }
                    received = self.dismissals.recv(), if dismissals_open => match received {
                        Some(()) => {
                            if let Err(e) = self.notifier.dismiss().await {
                                error!("Failed to dismiss warning {e:?}");
                            }
                        }
                        None => dismissals_open = false,
                    },
                    _ = self.clock.sleep_until(check_point) => break,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
        time::Duration,
    };

    use anyhow::Result;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use crate::{
        agent::{
            monitor::LimitMonitor,
            notify::{NotificationController, NotificationHandle, NotificationPresenter},
            session::CurrentActiveTab,
        },
        config::{DomainConfig, TimeConfig},
        records::DomainTimeRecord,
        store::{
            CURRENT_ACTIVE_TAB, DOMAIN_TIME_RECORDS, KeyValueStore, TIME_CONFIG,
            memory::MemoryStore,
        },
        utils::clock::DefaultClock,
    };

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

    async fn seed(
        store: &MemoryStore,
        today_seconds: u64,
        active_domain: Option<&str>,
        configs: Vec<DomainConfig>,
    ) -> Result<()> {
        let mut entries = HashMap::from([
            (
                DOMAIN_TIME_RECORDS.to_string(),
                serde_json::to_value(vec![DomainTimeRecord {
                    domain: "x.com".into(),
                    timestamps: vec![],
                    today_seconds,
                }])?,
            ),
            (
                TIME_CONFIG.to_string(),
                serde_json::to_value(TimeConfig {
                    domain_configs: configs,
                    ..TimeConfig::default()
                })?,
            ),
        ]);
        if let Some(domain) = active_domain {
            entries.insert(
                CURRENT_ACTIVE_TAB.to_string(),
                serde_json::to_value(CurrentActiveTab {
                    domain: domain.into(),
                })?,
            );
        }
        store.set(entries).await
    }

    fn hour_limit(domain: &str, enabled: bool) -> DomainConfig {
        DomainConfig {
            domain: domain.into(),
            time_limit: 3_600_000,
            enabled,
        }
    }

    fn monitor(
        store: Arc<MemoryStore>,
        presenter: CountingPresenter,
        dismissals: mpsc::Receiver<()>,
        shutdown: &CancellationToken,
    ) -> LimitMonitor<MemoryStore, CountingPresenter> {
        let clock = Arc::new(DefaultClock);
        LimitMonitor::new(
            store,
            "x.com".into(),
            NotificationController::new(presenter, clock.clone()),
            dismissals,
            shutdown.clone(),
            Duration::from_secs(10),
            clock,
        )
    }

    async fn check_once(store: Arc<MemoryStore>, presenter: CountingPresenter) -> Result<()> {
        let (_tx, rx) = mpsc::channel(1);
        let shutdown = CancellationToken::new();
        let mut monitor = monitor(store, presenter, rx, &shutdown);
        monitor.check_limit().await
    }

    #[tokio::test]
    async fn over_budget_active_domain_is_warned() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        seed(&store, 3601, Some("x.com"), vec![hour_limit("x.com", true)]).await?;

        let presenter = CountingPresenter::default();
        check_once(store, presenter.clone()).await?;

        assert_eq!(*presenter.shows.lock().unwrap(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn foreign_active_tab_suppresses_the_warning() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        seed(&store, 3601, Some("y.com"), vec![hour_limit("x.com", true)]).await?;

        let presenter = CountingPresenter::default();
        check_once(store, presenter.clone()).await?;

        assert_eq!(*presenter.shows.lock().unwrap(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn absent_active_tab_does_not_suppress() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        seed(&store, 3601, None, vec![hour_limit("x.com", true)]).await?;

        let presenter = CountingPresenter::default();
        check_once(store, presenter.clone()).await?;

        assert_eq!(*presenter.shows.lock().unwrap(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn within_budget_is_quiet() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        seed(&store, 3600, Some("x.com"), vec![hour_limit("x.com", true)]).await?;

        let presenter = CountingPresenter::default();
        check_once(store, presenter.clone()).await?;

        assert_eq!(*presenter.shows.lock().unwrap(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn missing_or_disabled_budget_is_quiet() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        seed(&store, 3601, Some("x.com"), vec![]).await?;
        let presenter = CountingPresenter::default();
        check_once(store.clone(), presenter.clone()).await?;
        assert_eq!(*presenter.shows.lock().unwrap(), 0);

        seed(&store, 3601, Some("x.com"), vec![hour_limit("x.com", false)]).await?;
        check_once(store, presenter.clone()).await?;
        assert_eq!(*presenter.shows.lock().unwrap(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn wildcard_budget_applies_to_subdomain_context() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        store
            .set(HashMap::from([
                (
                    DOMAIN_TIME_RECORDS.to_string(),
                    serde_json::to_value(vec![DomainTimeRecord {
                        domain: "music.youtube.com".into(),
                        timestamps: vec![],
                        today_seconds: 3601,
                    }])?,
                ),
                (
                    TIME_CONFIG.to_string(),
                    serde_json::to_value(TimeConfig {
                        domain_configs: vec![hour_limit("*.youtube.com", true)],
                        ..TimeConfig::default()
                    })?,
                ),
            ]))
            .await?;

        let (_tx, rx) = mpsc::channel(1);
        let shutdown = CancellationToken::new();
        let presenter = CountingPresenter::default();
        let clock = Arc::new(DefaultClock);
        let mut monitor = LimitMonitor::new(
            store,
            "music.youtube.com".into(),
            NotificationController::new(presenter.clone(), clock.clone()),
            rx,
            shutdown,
            Duration::from_secs(10),
            clock,
        );
        monitor.check_limit().await?;

        assert_eq!(*presenter.shows.lock().unwrap(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn repeated_checks_keep_a_single_warning() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        seed(&store, 3601, Some("x.com"), vec![hour_limit("x.com", true)]).await?;

        let (_tx, rx) = mpsc::channel(1);
        let shutdown = CancellationToken::new();
        let presenter = CountingPresenter::default();
        let mut monitor = monitor(store, presenter.clone(), rx, &shutdown);

        monitor.check_limit().await?;
        monitor.check_limit().await?;
        monitor.check_limit().await?;

        assert_eq!(*presenter.shows.lock().unwrap(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn dismissed_warning_reappears_within_one_period() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        seed(&store, 3601, Some("x.com"), vec![hour_limit("x.com", true)]).await?;

        let (dismiss_tx, dismiss_rx) = mpsc::channel(1);
        let shutdown = CancellationToken::new();
        let presenter = CountingPresenter::default();
        let monitor = monitor(store, presenter.clone(), dismiss_rx, &shutdown);

        let (_, run_result) = tokio::join!(
            async {
                // Let the first check show the warning, dismiss it, then let
                // one more polling period elapse.
                tokio::time::sleep(Duration::from_secs(1)).await;
                dismiss_tx.send(()).await.unwrap();
                tokio::time::sleep(Duration::from_secs(15)).await;
                shutdown.cancel()
            },
            monitor.run(),
        );
        run_result?;

        assert_eq!(*presenter.shows.lock().unwrap(), 2);
        Ok(())
    }
}
