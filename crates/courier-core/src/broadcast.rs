use serde::Serialize;
use tracing::{info, warn};

use crate::dispatch::{DeliveryRequest, DispatchEngine};
use crate::limiter::CompositeLimiter;
use crate::types::ChatTarget;

/// Outcome of a broadcast.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BroadcastSummary {
    pub sent: usize,
    pub failed: usize,
}

impl DispatchEngine {
    /// Sends `text` to every target in turn.
    ///
    /// A failed target is counted and skipped; the broadcast itself never
    /// fails. Throughput is governed entirely by `limiter`.
    pub async fn broadcast(
        &self,
        targets: &[ChatTarget],
        text: &str,
        limiter: &CompositeLimiter,
    ) -> BroadcastSummary {
        let mut summary = BroadcastSummary::default();
        for target in targets {
            match self
                .deliver(DeliveryRequest::text(target.clone(), text), limiter)
                .await
            {
                Ok(_) => summary.sent += 1,
                Err(e) => {
                    warn!(chat = %target, error = %e, "Broadcast delivery failed");
                    summary.failed += 1;
                }
            }
        }
        info!(sent = summary.sent, failed = summary.failed, "Broadcast finished");
        summary
    }
}
