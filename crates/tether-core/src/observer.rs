//! Foreground observer strategies
//!
//! Two interchangeable producers feeding the shared [`DecisionPipeline`]:
//! the event-driven observer rides the host's window-change notifications,
//! the polling observer runs its own interval loop. The controller starts
//! none, one, or both depending on the session's effective tier; under
//! Maximum both run concurrently and their reports are OR-ed through the
//! pipeline, never ranked.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tether_api::{ObserverEvent, ObserverEventKind};
use tether_host_api::{HostAdapter, HostEvent};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::DecisionPipeline;

/// Reacts per-event to the host's foreground-change notifications
pub struct EventDrivenObserver;

impl EventDrivenObserver {
    pub fn spawn(
        host: Arc<dyn HostAdapter>,
        pipeline: Arc<Mutex<DecisionPipeline>>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let mut events = host.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    event = events.recv() => match event {
                        Some(HostEvent::ForegroundChanged { app, timestamp }) => {
                            let event = ObserverEvent {
                                app,
                                timestamp,
                                kind: ObserverEventKind::FocusChanged,
                            };
                            pipeline.lock().unwrap().observe(&event);
                        }
                        // Alarm firings belong to the boundary watcher
                        Some(HostEvent::AlarmFired { .. }) => {}
                        None => break,
                    },
                }
            }
            debug!("Event-driven observer stopped");
        })
    }
}

/// Periodically inspects the current foreground identity.
///
/// Queries the primary mechanism and falls back to the secondary one when
/// the primary is unavailable; when both fail the tick is skipped and the
/// next one retries.
pub struct PollingObserver;

impl PollingObserver {
    pub fn spawn(
        host: Arc<dyn HostAdapter>,
        pipeline: Arc<Mutex<DecisionPipeline>>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {
                        let app = match host.foreground_app().await {
                            Ok(app) => app,
                            Err(primary) => match host.foreground_app_fallback().await {
                                Ok(app) => {
                                    debug!(error = %primary, "Primary foreground query unavailable, used fallback");
                                    app
                                }
                                Err(fallback) => {
                                    debug!(
                                        primary = %primary,
                                        fallback = %fallback,
                                        "No foreground mechanism available this tick"
                                    );
                                    continue;
                                }
                            },
                        };

                        let event = ObserverEvent {
                            app,
                            timestamp: tether_util::now(),
                            kind: ObserverEventKind::Poll,
                        };
                        pipeline.lock().unwrap().observe(&event);
                    }
                }
            }
            debug!("Polling observer stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ActuationScheduler, BringBackActuator};
    use std::sync::atomic::Ordering;
    use tether_host_api::MockHost;
    use tether_util::AppId;

    fn make_pipeline(
        host: &Arc<MockHost>,
        target: &str,
    ) -> (Arc<Mutex<DecisionPipeline>>, Arc<ActuationScheduler>) {
        let scheduler =
            ActuationScheduler::new(host.clone() as Arc<dyn HostAdapter>, AppId::new(target));
        let actuator = BringBackActuator::new(AppId::new(target), vec![], vec![]);
        (
            Arc::new(Mutex::new(DecisionPipeline::new(actuator, scheduler.clone()))),
            scheduler,
        )
    }

    #[tokio::test]
    async fn event_observer_reacts_to_focus_change() {
        let host = Arc::new(MockHost::new());
        host.set_foreground(AppId::new("org.example.reader"));
        let (pipeline, _scheduler) = make_pipeline(&host, "org.example.reader");
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = EventDrivenObserver::spawn(
            host.clone() as Arc<dyn HostAdapter>,
            pipeline,
            shutdown_rx,
        );

        host.set_foreground(AppId::new("intruder"));
        tokio::time::sleep(Duration::from_millis(300)).await;

        // Intruder observed and refocused
        assert!(!host.refocus_attempts().is_empty());
        assert_eq!(host.foreground(), AppId::new("org.example.reader"));

        shutdown_tx.send(true).unwrap();
        let _ = handle.await;
    }

    #[tokio::test]
    async fn polling_observer_detects_without_events() {
        let host = Arc::new(MockHost::new());
        let (pipeline, _scheduler) = make_pipeline(&host, "org.example.reader");
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // Bypass the notification path: change foreground silently
        let handle = PollingObserver::spawn(
            host.clone() as Arc<dyn HostAdapter>,
            pipeline,
            Duration::from_millis(50),
            shutdown_rx,
        );

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(!host.refocus_attempts().is_empty());

        shutdown_tx.send(true).unwrap();
        let _ = handle.await;
    }

    #[tokio::test]
    async fn polling_observer_uses_fallback_query() {
        let host = Arc::new(MockHost::new());
        host.fail_primary_query.store(true, Ordering::SeqCst);
        host.set_foreground(AppId::new("intruder"));

        let (pipeline, _scheduler) = make_pipeline(&host, "org.example.reader");
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = PollingObserver::spawn(
            host.clone() as Arc<dyn HostAdapter>,
            pipeline,
            Duration::from_millis(50),
            shutdown_rx,
        );

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(!host.refocus_attempts().is_empty());

        shutdown_tx.send(true).unwrap();
        let _ = handle.await;
    }

    #[tokio::test]
    async fn both_queries_failing_skips_the_tick() {
        let host = Arc::new(MockHost::new());
        host.fail_primary_query.store(true, Ordering::SeqCst);
        host.fail_fallback_query.store(true, Ordering::SeqCst);
        host.set_foreground(AppId::new("intruder"));

        let (pipeline, _scheduler) = make_pipeline(&host, "org.example.reader");
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = PollingObserver::spawn(
            host.clone() as Arc<dyn HostAdapter>,
            pipeline,
            Duration::from_millis(50),
            shutdown_rx,
        );

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(host.refocus_attempts().is_empty());

        shutdown_tx.send(true).unwrap();
        let _ = handle.await;
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop() {
        let host = Arc::new(MockHost::new());
        let (pipeline, _scheduler) = make_pipeline(&host, "org.example.reader");
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = PollingObserver::spawn(
            host.clone() as Arc<dyn HostAdapter>,
            pipeline,
            Duration::from_millis(50),
            shutdown_rx,
        );

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("observer did not stop")
            .unwrap();
    }
}
