use std::ops::AddAssign;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use super::Backlog;
use super::queue::EventQueue;
use crate::sink::EventSink;

/// Delivery outcome counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryStats {
    pub delivered: u64,
    /// Failed priority submissions that were queued again.
    pub retried: u64,
    /// Location events lost to sink failures.
    pub dropped: u64,
}

impl AddAssign for DeliveryStats {
    fn add_assign(&mut self, other: Self) {
        self.delivered += other.delivered;
        self.retried += other.retried;
        self.dropped += other.dropped;
    }
}

/// Drains `queue` into the sink until it is closed and empty.
///
/// Priority events are retried until the sink accepts them; default events get one attempt.
pub(crate) fn run(
    id: usize,
    queue: Arc<EventQueue>,
    sink: Arc<dyn EventSink>,
    backlog: Backlog,
    idle: Duration,
) -> DeliveryStats {
    let mut stats = DeliveryStats::default();
    while let Some(event) = queue.pop(idle) {
        match sink.submit(&event.key, &event.payload, &event.collection) {
            Ok(()) => {
                stats.delivered += 1;
                backlog.release();
            }
            Err(e) if event.priority => {
                stats.retried += 1;
                warn!(
                    "worker {id}: {} {} failed, retrying: {e}",
                    event.collection, event.key
                );
                queue.requeue_front(event);
            }
            Err(e) => {
                stats.dropped += 1;
                backlog.release();
                debug!("worker {id}: dropped {} {}: {e}", event.collection, event.key);
            }
        }
    }
    debug!("worker {id} drained: {stats:?}");
    stats
}
