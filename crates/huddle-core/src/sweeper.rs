use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::{CoreResult, RoomCoordinator};

/// What one sweep removed or delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub sessions_purged: usize,
    pub attendees_purged: usize,
    pub messages_dispatched: usize,
}

/// Background task that purges dead sessions and posts due scheduled messages.
///
/// Runs on an interval, independent of requests. Every step is idempotent
/// against concurrent explicit leaves and other sweepers.
pub async fn run_sweeper(coordinator: RoomCoordinator, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let worker = coordinator.clone();
        match tokio::task::spawn_blocking(move || sweep_once(&worker, Utc::now())).await {
            Ok(Ok(report)) if report != SweepReport::default() => {
                debug!(?report, "sweep finished");
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!(error = %e, "sweep failed"),
            Err(e) => warn!(error = %e, "sweep task panicked"),
        }
    }
}

/// One pass of the sweeper as of `now`.
pub fn sweep_once(coordinator: &RoomCoordinator, now: DateTime<Utc>) -> CoreResult<SweepReport> {
    let (sessions_purged, attendees_purged) = coordinator.purge_stale_sessions(now)?;
    let messages_dispatched = coordinator.dispatch_due_messages(now)?;
    Ok(SweepReport {
        sessions_purged,
        attendees_purged,
        messages_dispatched,
    })
}
