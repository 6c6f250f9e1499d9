//! Delivery of one line to every registered session.

use tracing::debug;

use crate::registry::SessionRegistry;

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Writes lines to every session in a registry snapshot.
#[derive(Clone)]
pub struct Broadcaster {
    registry: SessionRegistry,
}

impl Broadcaster {
    pub fn new(registry: SessionRegistry) -> Self {
        Self { registry }
    }

    /// Sends `line` to every session registered at snapshot time.
    ///
    /// The registry lock is released before the first write. A failed
    /// write is counted and logged, never returned: the failing peer's own
    /// read loop notices the broken connection and tears the session down.
    pub async fn broadcast(&self, line: &str) -> BroadcastReport {
        let recipients = self.registry.snapshot().await;
        let mut report = BroadcastReport::default();

        for session in &recipients {
            match session.writer.write_line(line).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    debug!(
                        connection = %session.id,
                        username = %session.username,
                        error = %e,
                        "Failed to deliver broadcast"
                    );
                    report.failed += 1;
                }
            }
        }

        debug!(
            delivered = report.delivered,
            failed = report.failed,
            "Broadcast complete"
        );
        report
    }
}
