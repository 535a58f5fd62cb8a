use coach_hold::SeatLockManager;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info};

use crate::metrics::Metrics;

/// Periodically deletes expired seat locks until `shutdown` flips to true.
///
/// Holds also sweep before planning, so this loop only bounds how long
/// dead rows linger between requests.
pub async fn start_sweeper(
    holds: Arc<SeatLockManager>,
    metrics: Arc<Metrics>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Lock sweeper started, running every {:?}", every);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match holds.sweep().await {
                    Ok(swept) => metrics.locks_swept.inc_by(swept),
                    Err(e) => error!("Lock sweep failed: {}", e),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("Lock sweeper stopped");
}
