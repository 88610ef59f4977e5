// # Queue Application Controller
//
// Applies a playlist or marathon to the shared queue:
// resolve → optional shuffle → optional clear → sequential paced dispatch.
//
// Per-item failures are recorded in the progress store, never returned.
// Only an empty resolution, a failed clear, or an already-running run abort
// the call with an error.

use crate::api::MediaItem;
use crate::queue::dispatcher::RateLimitedDispatcher;
use crate::queue::progress::ProgressStore;
use crate::queue::resolver::{ItemResolver, Resolution};
use crate::queue::types::{ApplicationRequest, ApplySummary, QueueError, QueueMode, QueueOptions};
use rand::Rng;
use tracing::{error, info};

#[derive(Clone)]
pub struct QueueController {
    resolver: ItemResolver,
    dispatcher: RateLimitedDispatcher,
    progress: ProgressStore,
}

impl QueueController {
    pub fn new(
        resolver: ItemResolver,
        dispatcher: RateLimitedDispatcher,
        progress: ProgressStore,
    ) -> Self {
        Self {
            resolver,
            dispatcher,
            progress,
        }
    }

    /// The store this controller writes to
    pub fn progress(&self) -> &ProgressStore {
        &self.progress
    }

    /// Request cancellation of the active run
    pub fn cancel(&self) {
        self.progress.cancel_queue();
    }

    pub async fn apply(
        &self,
        request: ApplicationRequest,
        options: QueueOptions,
    ) -> Result<ApplySummary, QueueError> {
        // Reserved until this call returns; an early exit leaves the previous record untouched
        let claim = self.progress.claim_run()?;

        // 1. Resolve
        let Resolution { mut items, skipped } = self.resolver.resolve(request).await?;
        info!(
            "Applying {} items to queue (mode: {:?}, shuffle: {}, delay {:?})",
            items.len(),
            options.mode,
            options.shuffle,
            self.dispatcher.pacing().item_delay
        );

        // 2. Shuffle
        if options.shuffle {
            shuffle_items(&mut items, &mut rand::thread_rng());
        }

        // 3. Destructive clear, before anything counts as started
        if options.mode == QueueMode::Replace {
            if let Err(e) = self.dispatcher.backend().clear_queue().await {
                error!("Failed to clear queue, nothing was sent: {}", e);
                return Err(QueueError::ClearFailed(e));
            }
            info!("Queue cleared");
        }

        // 4. Start the run
        let ticket = claim.start(items.len());

        // 5. Sequential dispatch
        let position = options.mode.position();
        let mut completed = 0;

        for item in &items {
            if ticket.is_cancelled() {
                info!(
                    "Stopping after {} of {} items (cancelled)",
                    completed,
                    items.len()
                );
                break;
            }

            let newly_failed = match self.dispatcher.send_one(item, position).await {
                Ok(()) => Vec::new(),
                Err(_) => vec![item.id.clone()],
            };
            completed += 1;

            self.progress
                .update_progress(&ticket, completed, &newly_failed);
            self.dispatcher.pace(completed, ticket.token()).await;
        }

        // 6. Finalize
        let cancelled = ticket.is_cancelled();
        self.progress.complete_queue(&ticket);

        let progress = self.progress.snapshot();
        info!(
            "Queue apply finished: {}/{} processed, {} failed, status {:?}",
            progress.completed,
            progress.total,
            progress.failed.len(),
            progress.status
        );

        Ok(ApplySummary {
            progress,
            skipped,
            cancelled,
        })
    }
}

/// Unbiased in-place shuffle (Durstenfeld's Fisher–Yates)
pub fn shuffle_items<R: Rng + ?Sized>(items: &mut [MediaItem], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}
