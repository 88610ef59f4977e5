// Test support utilities for both unit and integration tests

use crate::api::{ApiError, MediaItem, PlaylistDetail, PlaylistFetcher, QueueBackend, QueuePosition};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

type AddHook = Box<dyn Fn(usize) + Send + Sync>;

/// In-memory stand-in for the shared queue.
///
/// Models the items after the current one: `End` appends, `Next` inserts at
/// the front, clearing empties it.
#[derive(Default)]
pub struct MockQueueBackend {
    upcoming: Mutex<VecDeque<String>>,
    added: Mutex<Vec<(String, QueuePosition)>>,
    attempts: Mutex<Vec<String>>,
    clear_calls: Mutex<usize>,
    fail_ids: HashSet<String>,
    fail_clear: bool,
    on_add: Option<AddHook>,
    add_delay: Duration,
}

impl MockQueueBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every add call for `video_id` fail
    pub fn fail_on(mut self, video_id: &str) -> Self {
        self.fail_ids.insert(video_id.to_string());
        self
    }

    /// Start with `video_ids` already queued after the current item
    pub fn with_upcoming(self, video_ids: &[&str]) -> Self {
        self.upcoming
            .lock()
            .unwrap()
            .extend(video_ids.iter().map(|id| id.to_string()));
        self
    }

    pub fn fail_clear(mut self) -> Self {
        self.fail_clear = true;
        self
    }

    /// Make each add call take `delay` before it answers
    pub fn with_add_delay(mut self, delay: Duration) -> Self {
        self.add_delay = delay;
        self
    }

    /// Run `hook` after each add attempt with the number of attempts so far
    pub fn on_add<F>(mut self, hook: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.on_add = Some(Box::new(hook));
        self
    }

    /// Successful adds, in call order
    pub fn added(&self) -> Vec<(String, QueuePosition)> {
        self.added.lock().unwrap().clone()
    }

    pub fn added_ids(&self) -> Vec<String> {
        self.added().into_iter().map(|(id, _)| id).collect()
    }

    /// Every id an add was attempted for, failed or not
    pub fn attempted_ids(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn add_attempts(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    pub fn clear_calls(&self) -> usize {
        *self.clear_calls.lock().unwrap()
    }

    /// Items queued after the current one
    pub fn upcoming(&self) -> Vec<String> {
        self.upcoming.lock().unwrap().iter().cloned().collect()
    }
}

#[async_trait::async_trait]
impl QueueBackend for MockQueueBackend {
    async fn add_to_queue(&self, video_id: &str, position: QueuePosition) -> Result<(), ApiError> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            attempts.push(video_id.to_string());
            attempts.len()
        };

        if !self.add_delay.is_zero() {
            tokio::time::sleep(self.add_delay).await;
        }

        let result = if self.fail_ids.contains(video_id) {
            Err(ApiError::Api {
                status: 502,
                code: "CHANNEL_ERROR".to_string(),
                message: format!("Could not add {}", video_id),
            })
        } else {
            let mut upcoming = self.upcoming.lock().unwrap();
            match position {
                QueuePosition::End => upcoming.push_back(video_id.to_string()),
                QueuePosition::Next => upcoming.push_front(video_id.to_string()),
            }
            self.added
                .lock()
                .unwrap()
                .push((video_id.to_string(), position));
            Ok(())
        };

        if let Some(hook) = &self.on_add {
            hook(attempt);
        }

        result
    }

    async fn clear_queue(&self) -> Result<(), ApiError> {
        *self.clear_calls.lock().unwrap() += 1;
        if self.fail_clear {
            return Err(ApiError::Api {
                status: 503,
                code: "CHANNEL_UNAVAILABLE".to_string(),
                message: "Channel is not connected".to_string(),
            });
        }
        self.upcoming.lock().unwrap().clear();
        Ok(())
    }
}

/// In-memory playlist source; unknown ids answer 404
#[derive(Default)]
pub struct MockPlaylistFetcher {
    playlists: HashMap<String, PlaylistDetail>,
    unavailable: HashSet<String>,
    requested: Mutex<Vec<String>>,
    delay: Duration,
}

impl MockPlaylistFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a playlist whose items have the given video ids
    pub fn with_playlist(mut self, playlist_id: &str, video_ids: &[&str]) -> Self {
        let items = video_ids
            .iter()
            .map(|id| MediaItem::new(*id, format!("Title {}", id), 60))
            .collect();

        self.playlists.insert(
            playlist_id.to_string(),
            PlaylistDetail {
                playlist_id: playlist_id.to_string(),
                name: format!("Playlist {}", playlist_id),
                visibility: None,
                owner: None,
                items,
                created_at: None,
                updated_at: None,
            },
        );
        self
    }

    /// Answer 503 for `playlist_id` instead of 404
    pub fn unavailable(mut self, playlist_id: &str) -> Self {
        self.unavailable.insert(playlist_id.to_string());
        self
    }

    /// Make each lookup take `delay` before it answers
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Playlist ids requested so far, in order
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl PlaylistFetcher for MockPlaylistFetcher {
    async fn get_playlist(&self, playlist_id: &str) -> Result<PlaylistDetail, ApiError> {
        self.requested
            .lock()
            .unwrap()
            .push(playlist_id.to_string());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.unavailable.contains(playlist_id) {
            return Err(ApiError::Api {
                status: 503,
                code: "SERVICE_UNAVAILABLE".to_string(),
                message: "Playlist service unavailable".to_string(),
            });
        }

        self.playlists
            .get(playlist_id)
            .cloned()
            .ok_or_else(|| ApiError::Api {
                status: 404,
                code: "NOT_FOUND".to_string(),
                message: "Playlist not found".to_string(),
            })
    }
}
