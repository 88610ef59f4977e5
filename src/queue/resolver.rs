use crate::api::{MediaItem, PlaylistFetcher};
use crate::queue::types::{ApplicationRequest, QueueError, SkippedPlaylist};
use std::sync::Arc;
use tracing::{info, warn};

/// Flattened item list for one run, plus the playlists that could not be loaded
#[derive(Debug, Clone)]
pub struct Resolution {
    pub items: Vec<MediaItem>,
    pub skipped: Vec<SkippedPlaylist>,
}

/// Expands an application request into the ordered items to enqueue
#[derive(Clone)]
pub struct ItemResolver {
    fetcher: Arc<dyn PlaylistFetcher>,
}

impl ItemResolver {
    pub fn new(fetcher: Arc<dyn PlaylistFetcher>) -> Self {
        Self { fetcher }
    }

    /// Resolve `request` into a non-empty item list.
    ///
    /// Marathon playlists are fetched one after another in their stored order.
    /// A playlist that fails to load contributes nothing and is reported in
    /// `skipped`; only an empty result is an error.
    pub async fn resolve(&self, request: ApplicationRequest) -> Result<Resolution, QueueError> {
        let resolution = match request {
            ApplicationRequest::Playlist { items } => Resolution {
                items,
                skipped: Vec::new(),
            },
            ApplicationRequest::Marathon { playlist_refs } => {
                let mut items = Vec::new();
                let mut skipped = Vec::new();

                for playlist_ref in playlist_refs {
                    match self.fetcher.get_playlist(&playlist_ref.playlist_id).await {
                        Ok(playlist) => {
                            info!(
                                "Resolved playlist '{}' ({} items)",
                                playlist_ref.name,
                                playlist.items.len()
                            );
                            items.extend(playlist.items);
                        }
                        Err(e) => {
                            let missing = e.is_not_found();
                            if missing {
                                warn!("Playlist '{}' no longer exists, skipping", playlist_ref.name);
                            } else {
                                warn!("Could not load playlist '{}': {}", playlist_ref.name, e);
                            }
                            skipped.push(SkippedPlaylist {
                                playlist_id: playlist_ref.playlist_id,
                                name: playlist_ref.name,
                                error: e.to_string(),
                                missing,
                            });
                        }
                    }
                }

                Resolution { items, skipped }
            }
        };

        if resolution.items.is_empty() {
            return Err(QueueError::NothingToEnqueue);
        }

        Ok(resolution)
    }
}
