use crate::api::{ApiError, MediaItem, QueuePosition};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("No items to add to queue")]
    NothingToEnqueue,
    #[error("Failed to clear queue: {0}")]
    ClearFailed(#[source] ApiError),
    #[error("A queue run is already in progress")]
    AlreadyRunning,
    #[error("Invalid action: {0}")]
    InvalidAction(String),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// How applied items are placed in the remote queue
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QueueMode {
    /// Add to the tail
    #[default]
    Append,
    /// Clear the remote queue first, then add to the tail
    Replace,
    /// Each item requests "play next", in processing order
    Insert,
}

impl QueueMode {
    pub fn position(self) -> QueuePosition {
        match self {
            QueueMode::Insert => QueuePosition::Next,
            QueueMode::Append | QueueMode::Replace => QueuePosition::End,
        }
    }
}

impl std::str::FromStr for QueueMode {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "append" => Ok(QueueMode::Append),
            "replace" => Ok(QueueMode::Replace),
            "insert" => Ok(QueueMode::Insert),
            other => Err(QueueError::InvalidAction(format!(
                "unknown queue mode '{}'",
                other
            ))),
        }
    }
}

/// Caller-supplied options, fixed for the duration of one run
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueOptions {
    pub mode: QueueMode,
    pub shuffle: bool,
}

/// A remote playlist to be expanded at apply time
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistReference {
    pub playlist_id: String,
    /// Display name, used when reporting a playlist that failed to load
    pub name: String,
}

impl PlaylistReference {
    pub fn new(playlist_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            playlist_id: playlist_id.into(),
            name: name.into(),
        }
    }
}

/// What to apply to the queue
#[derive(Debug, Clone, PartialEq)]
pub enum ApplicationRequest {
    /// A playlist whose items the caller already loaded
    Playlist { items: Vec<MediaItem> },
    /// An ordered list of playlists, fetched and flattened at apply time
    Marathon { playlist_refs: Vec<PlaylistReference> },
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Completed,
    Error,
}

impl RunStatus {
    /// Completed and Error runs accept no further mutation until reset
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Error)
    }
}

/// Progress of the current (or last) queue run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunProgress {
    pub total: usize,
    pub completed: usize,
    /// Ids of items whose add call failed, in dispatch order
    pub failed: Vec<String>,
    pub status: RunStatus,
}

impl RunProgress {
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.completed * 100) / self.total).min(100) as u8
    }
}

/// A marathon playlist that could not be loaded and contributed no items
#[derive(Debug, Clone)]
pub struct SkippedPlaylist {
    pub playlist_id: String,
    pub name: String,
    pub error: String,
    /// The playlist no longer exists, as opposed to a transient load failure
    pub missing: bool,
}

/// Result of a finished (or cancelled) apply call
#[derive(Debug, Clone)]
pub struct ApplySummary {
    pub progress: RunProgress,
    pub skipped: Vec<SkippedPlaylist>,
    pub cancelled: bool,
}
