// # Send Path
//
// Lightweight "send to queue" used from catalog and playlist browsing:
// one video, or one playlist's items, with faster pacing and failures tracked
// locally instead of in the shared progress store.

use crate::api::{MediaItem, PlaylistFetcher, QueueBackend, QueuePosition};
use crate::queue::types::QueueError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc as tokio_mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// User-facing send actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendAction {
    Append,
    /// Insert right after the currently playing item
    Next,
    /// Clear the queue, then append
    Replace,
}

impl SendAction {
    fn position(self) -> QueuePosition {
        match self {
            SendAction::Next => QueuePosition::Next,
            SendAction::Append | SendAction::Replace => QueuePosition::End,
        }
    }
}

impl std::str::FromStr for SendAction {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "append" => Ok(SendAction::Append),
            "next" => Ok(SendAction::Next),
            "replace" => Ok(SendAction::Replace),
            other => Err(QueueError::InvalidAction(format!(
                "unknown send action '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendPacing {
    /// Wait between two dispatches (not after the last one)
    pub item_delay: Duration,
    /// Wait after clearing the queue in Replace mode
    pub clear_settle: Duration,
}

impl Default for SendPacing {
    fn default() -> Self {
        Self {
            item_delay: Duration::from_millis(500),
            clear_settle: Duration::from_millis(500),
        }
    }
}

impl SendPacing {
    pub fn immediate() -> Self {
        Self {
            item_delay: Duration::ZERO,
            clear_settle: Duration::ZERO,
        }
    }

    /// Estimated time to send `remaining` more items
    pub fn eta(&self, remaining: usize) -> Duration {
        self.item_delay
            .saturating_mul(u32::try_from(remaining).unwrap_or(u32::MAX))
    }
}

/// Emitted after each attempted item
#[derive(Debug, Clone, PartialEq)]
pub struct SendProgress {
    pub processed: usize,
    pub total: usize,
    pub current_title: String,
    /// Remaining items times the per-item delay
    pub eta: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SendFailure {
    pub title: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    Success,
    PartialFailure { failed: usize },
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct SendReport {
    pub total: usize,
    pub processed: usize,
    pub failures: Vec<SendFailure>,
    pub cancelled: bool,
}

impl SendReport {
    pub fn outcome(&self) -> SendOutcome {
        if self.cancelled {
            SendOutcome::Cancelled
        } else if self.failures.is_empty() {
            SendOutcome::Success
        } else {
            SendOutcome::PartialFailure {
                failed: self.failures.len(),
            }
        }
    }
}

#[derive(Clone)]
pub struct QueueSender {
    backend: Arc<dyn QueueBackend>,
    pacing: SendPacing,
    progress_tx: Option<tokio_mpsc::UnboundedSender<SendProgress>>,
}

impl QueueSender {
    pub fn new(backend: Arc<dyn QueueBackend>, pacing: SendPacing) -> Self {
        Self {
            backend,
            pacing,
            progress_tx: None,
        }
    }

    /// Report per-item progress on `tx`
    pub fn with_progress(mut self, tx: tokio_mpsc::UnboundedSender<SendProgress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    /// Add a single catalog video. Replace is not offered for single videos.
    pub async fn send_video(&self, video_id: &str, action: SendAction) -> Result<(), QueueError> {
        if action == SendAction::Replace {
            return Err(QueueError::InvalidAction(
                "replace is only available for playlists".to_string(),
            ));
        }
        if video_id.is_empty() {
            return Err(QueueError::InvalidAction("missing video id".to_string()));
        }

        self.backend
            .add_to_queue(video_id, action.position())
            .await?;
        info!("✓ Added {} to queue ({:?})", video_id, action);
        Ok(())
    }

    /// Fetch a playlist and send its items
    pub async fn send_playlist(
        &self,
        fetcher: &dyn PlaylistFetcher,
        playlist_id: &str,
        action: SendAction,
        cancel: &CancellationToken,
    ) -> Result<SendReport, QueueError> {
        let playlist = fetcher.get_playlist(playlist_id).await?;
        if playlist.items.is_empty() {
            warn!("Playlist '{}' is empty", playlist.name);
            return Err(QueueError::NothingToEnqueue);
        }

        self.send_items(&playlist.items, action, cancel).await
    }

    /// Send `items` one by one, collecting failures.
    ///
    /// For `Next` the items are dispatched in reverse so that the queue ends up
    /// holding them in their original order right after the current item.
    pub async fn send_items(
        &self,
        items: &[MediaItem],
        action: SendAction,
        cancel: &CancellationToken,
    ) -> Result<SendReport, QueueError> {
        if items.is_empty() {
            return Err(QueueError::NothingToEnqueue);
        }

        if action == SendAction::Replace {
            self.backend
                .clear_queue()
                .await
                .map_err(QueueError::ClearFailed)?;
            info!("Queue cleared");
            self.wait(self.pacing.clear_settle, cancel).await;
        }

        let mut ordered: Vec<&MediaItem> = items.iter().collect();
        if action == SendAction::Next {
            ordered.reverse();
        }

        let total = ordered.len();
        let position = action.position();
        let mut report = SendReport {
            total,
            processed: 0,
            failures: Vec::new(),
            cancelled: false,
        };

        for (index, item) in ordered.into_iter().enumerate() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let result = if item.id.is_empty() {
                Err("Missing video ID".to_string())
            } else {
                self.backend
                    .add_to_queue(&item.id, position)
                    .await
                    .map_err(|e| e.to_string())
            };

            if let Err(error) = result {
                warn!("✗ Failed to add '{}': {}", item.title, error);
                report.failures.push(SendFailure {
                    title: item.title.clone(),
                    error,
                });
            }

            report.processed = index + 1;
            self.emit(SendProgress {
                processed: report.processed,
                total,
                current_title: item.title.clone(),
                eta: self.pacing.eta(total - report.processed),
            });

            if report.processed < total {
                self.wait(self.pacing.item_delay, cancel).await;
            }
        }

        match report.outcome() {
            SendOutcome::Success => info!("✓ Added {} items to queue", report.processed),
            SendOutcome::PartialFailure { failed } => {
                warn!("Processed {} items with {} errors", report.processed, failed)
            }
            SendOutcome::Cancelled => info!(
                "Queue addition cancelled after {} of {} items",
                report.processed, total
            ),
        }

        Ok(report)
    }

    fn emit(&self, progress: SendProgress) {
        if let Some(tx) = &self.progress_tx {
            let _ = tx.send(progress);
        }
    }

    async fn wait(&self, delay: Duration, cancel: &CancellationToken) {
        if delay.is_zero() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => {}
        }
    }
}
