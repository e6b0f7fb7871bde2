//! Periodic drain tick

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::core::Scheduler;

/// Run drain ticks every configured interval until shutdown
///
/// Ticks never overlap: the next one is not scheduled until the current
/// tick, including every promotion and the aging pass, has finished.
pub async fn run_drain_loop(scheduler: Arc<Scheduler>, mut shutdown: broadcast::Receiver<()>) {
    let period = scheduler.config().drain_interval();
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(?period, "Drain loop started");

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                info!("Drain loop stopping");
                break;
            }
            _ = ticker.tick() => {
                let report = scheduler.drain_tick().await;
                if report.promoted > 0 || report.aged > 0 {
                    let in_flight = scheduler.in_flight().await;
                    info!(
                        promoted = report.promoted,
                        aged = report.aged,
                        users = report.users,
                        in_flight,
                        "Drain tick"
                    );
                } else {
                    debug!("Drain tick: nothing queued");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Request;
    use crate::scheduler::{SchedulerConfig, SubmitResult};
    use reqwest::Url;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn test_drain_loop_future_is_send() {
        let (dispatch_tx, _dispatch_rx) = mpsc::unbounded_channel();
        let scheduler = Arc::new(Scheduler::new(SchedulerConfig::default(), dispatch_tx));
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let drain = run_drain_loop(scheduler, shutdown_rx);
        assert_send(&drain);
    }

    #[tokio::test]
    async fn test_drain_loop_promotes_on_tick_and_stops() {
        let (dispatch_tx, mut dispatch_rx) = mpsc::unbounded_channel();
        let config = SchedulerConfig {
            drain_interval_secs: 1,
            ..Default::default()
        };
        let scheduler = Arc::new(Scheduler::new(config, dispatch_tx));

        let url = Url::parse("https://api.example.com/slow").unwrap();
        let result = scheduler.submit(Request::new(5, url, 1, 0)).await;
        assert!(matches!(result, SubmitResult::Queued { .. }));

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(run_drain_loop(Arc::clone(&scheduler), shutdown_rx));

        let job = tokio::time::timeout(Duration::from_secs(3), dispatch_rx.recv())
            .await
            .expect("drain tick did not fire")
            .expect("dispatch channel closed");
        assert_eq!(job.endpoint_key, "/slow");

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("drain loop did not stop")
            .unwrap();
    }
}
