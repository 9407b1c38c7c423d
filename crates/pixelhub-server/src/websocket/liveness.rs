//! Periodic liveness probing.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use pixelhub_core::ConnError;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use super::connection::Connection;
use crate::metrics::WS_PROBE_FAILURES_TOTAL;

/// Outcome of the liveness loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LivenessResult {
    /// A probe could not be written; the monitor stopped.
    ProbeFailed(ConnError),
    /// The connection closed.
    Cancelled,
}

/// Probe `connection` every `interval` until a probe fails or it closes.
///
/// The monitor never evicts. A failed probe only ends the monitor; eviction
/// follows from the next failed receive or send. The first probe goes out
/// one full interval after start.
pub async fn run_liveness(
    connection: Arc<Connection>,
    interval: Duration,
    probe_timeout: Duration,
) -> LivenessResult {
    let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = connection.probe(probe_timeout).await {
                    if e.is_clean_close() {
                        return LivenessResult::Cancelled;
                    }
                    warn!(conn_id = %connection.id(), error = %e, "liveness probe failed");
                    counter!(WS_PROBE_FAILURES_TOTAL).increment(1);
                    return LivenessResult::ProbeFailed(e);
                }
                debug!(conn_id = %connection.id(), "probe sent");
            }
            () = connection.closed() => {
                return LivenessResult::Cancelled;
            }
        }
    }
}
