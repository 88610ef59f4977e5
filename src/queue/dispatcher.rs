use crate::api::{ApiError, MediaItem, QueueBackend, QueuePosition};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Pacing between add calls when applying a playlist or marathon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingConfig {
    /// Wait after every dispatched item
    pub item_delay: Duration,
    /// Every n-th attempted item gets the longer burst cooldown instead
    pub burst_every: usize,
    /// Burst cooldown as a multiple of `item_delay`
    pub burst_multiplier: u32,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            item_delay: Duration::from_millis(3000),
            burst_every: 5,
            burst_multiplier: 2,
        }
    }
}

impl PacingConfig {
    /// No waiting at all; for tests and local backends
    pub fn immediate() -> Self {
        Self {
            item_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Delay to await after the `attempt`-th item (1-based)
    pub fn delay_after(&self, attempt: usize) -> Duration {
        if self.burst_every > 0 && attempt > 0 && attempt % self.burst_every == 0 {
            self.item_delay * self.burst_multiplier
        } else {
            self.item_delay
        }
    }
}

/// Sends items to the remote queue one call at a time.
///
/// Performs exactly one network attempt per item; retry policy, if any,
/// belongs to the caller.
#[derive(Clone)]
pub struct RateLimitedDispatcher {
    backend: Arc<dyn QueueBackend>,
    pacing: PacingConfig,
}

impl RateLimitedDispatcher {
    pub fn new(backend: Arc<dyn QueueBackend>, pacing: PacingConfig) -> Self {
        Self { backend, pacing }
    }

    pub fn pacing(&self) -> &PacingConfig {
        &self.pacing
    }

    pub fn backend(&self) -> &Arc<dyn QueueBackend> {
        &self.backend
    }

    pub async fn send_one(&self, item: &MediaItem, position: QueuePosition) -> Result<(), ApiError> {
        if item.id.is_empty() {
            return Err(ApiError::InvalidInput(format!(
                "item '{}' has no video id",
                item.title
            )));
        }

        debug!("Adding {} ({}) at {:?}", item.id, item.title, position);
        let result = self.backend.add_to_queue(&item.id, position).await;
        if let Err(e) = &result {
            warn!("✗ Failed to add {} to queue: {}", item.id, e);
        }
        result
    }

    /// Wait out the pacing delay for the `attempt`-th item.
    /// Returns early if `cancel` fires; the caller re-checks the token.
    pub async fn pace(&self, attempt: usize, cancel: &CancellationToken) {
        let delay = self.pacing.delay_after(attempt);
        if delay.is_zero() {
            return;
        }

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => {
                debug!("Pacing interrupted by cancellation");
            }
        }
    }
}
