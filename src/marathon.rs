// # Marathons
//
// A marathon is a named, ordered list of playlist references that is
// flattened into a single item sequence when applied to the queue.
// Saved marathons live in a JSON file owned by `MarathonLibrary`.

use crate::api::PlaylistRef;
use crate::queue::{ApplicationRequest, PlaylistReference};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum MarathonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarathonPlaylist {
    pub id: String,
    pub playlist: PlaylistRef,
    pub order: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Marathon {
    pub id: String,
    pub name: String,
    pub playlists: Vec<MarathonPlaylist>,
    pub total_items: u64,
    pub total_duration_seconds: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Marathon {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            playlists: Vec::new(),
            total_items: 0,
            total_duration_seconds: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.playlists.is_empty()
    }

    /// Append a playlist. Returns false if it is already part of the marathon.
    pub fn add_playlist(&mut self, playlist: PlaylistRef) -> bool {
        if self
            .playlists
            .iter()
            .any(|p| p.playlist.playlist_id == playlist.playlist_id)
        {
            debug!(
                "Playlist {} already in marathon '{}'",
                playlist.playlist_id, self.name
            );
            return false;
        }

        self.total_items += playlist.item_count;
        self.total_duration_seconds += playlist.total_duration_seconds.unwrap_or(0);
        self.playlists.push(MarathonPlaylist {
            id: Uuid::new_v4().to_string(),
            order: self.playlists.len(),
            playlist,
        });
        self.touch();
        true
    }

    /// Remove a playlist by its playlist id. Returns false if it was not present.
    pub fn remove_playlist(&mut self, playlist_id: &str) -> bool {
        let Some(index) = self
            .playlists
            .iter()
            .position(|p| p.playlist.playlist_id == playlist_id)
        else {
            return false;
        };

        let removed = self.playlists.remove(index);
        self.total_items = self.total_items.saturating_sub(removed.playlist.item_count);
        self.total_duration_seconds = self
            .total_duration_seconds
            .saturating_sub(removed.playlist.total_duration_seconds.unwrap_or(0));
        self.renumber();
        self.touch();
        true
    }

    /// Move the playlist at `old_index` to `new_index`
    pub fn reorder_playlists(&mut self, old_index: usize, new_index: usize) -> bool {
        if old_index >= self.playlists.len() || new_index >= self.playlists.len() {
            return false;
        }

        let moved = self.playlists.remove(old_index);
        self.playlists.insert(new_index, moved);
        self.renumber();
        self.touch();
        true
    }

    /// The marathon as a queue request, playlists in their order
    pub fn to_request(&self) -> ApplicationRequest {
        let mut playlists: Vec<&MarathonPlaylist> = self.playlists.iter().collect();
        playlists.sort_by_key(|p| p.order);

        ApplicationRequest::Marathon {
            playlist_refs: playlists
                .into_iter()
                .map(|p| {
                    PlaylistReference::new(p.playlist.playlist_id.clone(), p.playlist.name.clone())
                })
                .collect(),
        }
    }

    fn renumber(&mut self) {
        for (i, p) in self.playlists.iter_mut().enumerate() {
            p.order = i;
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Saved marathons, persisted as a JSON array
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarathonLibrary {
    marathons: Vec<Marathon>,
}

impl MarathonLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `path`; a missing file yields an empty library
    pub fn load(path: &Path) -> Result<Self, MarathonError> {
        if !path.exists() {
            debug!("No marathon library at {}", path.display());
            return Ok(Self::new());
        }

        let data = std::fs::read_to_string(path)?;
        let marathons: Vec<Marathon> = serde_json::from_str(&data)?;
        info!(
            "Loaded {} saved marathons from {}",
            marathons.len(),
            path.display()
        );
        Ok(Self { marathons })
    }

    pub fn persist(&self, path: &Path) -> Result<(), MarathonError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(&self.marathons)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    pub fn marathons(&self) -> &[Marathon] {
        &self.marathons
    }

    /// Insert or replace by id. Empty marathons are not saved.
    pub fn save(&mut self, marathon: &Marathon) -> bool {
        if marathon.is_empty() {
            return false;
        }

        match self.marathons.iter_mut().find(|m| m.id == marathon.id) {
            Some(existing) => *existing = marathon.clone(),
            None => self.marathons.push(marathon.clone()),
        }
        true
    }

    pub fn get(&self, id: &str) -> Option<&Marathon> {
        self.marathons.iter().find(|m| m.id == id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Marathon> {
        self.marathons
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
    }

    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.marathons.len();
        self.marathons.retain(|m| m.id != id);
        self.marathons.len() != before
    }
}
