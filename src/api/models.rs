use serde::{Deserialize, Serialize};

/// One playable catalog entry, as returned inside playlist detail responses
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaItem {
    #[serde(rename = "video_id")]
    pub id: String,
    pub title: String,
    /// Unknown for some catalog entries (absent or null)
    #[serde(default)]
    pub duration_seconds: Option<u64>,
}

impl MediaItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>, duration_seconds: u64) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            duration_seconds: Some(duration_seconds),
        }
    }
}

/// Where an added item lands in the remote queue
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QueuePosition {
    End,
    Next,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Private,
    Shared,
    Public,
}

/// Playlist summary from the playlist index
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaylistRef {
    pub playlist_id: String,
    pub name: String,
    #[serde(default)]
    pub item_count: u64,
    #[serde(default)]
    pub total_duration_seconds: Option<u64>,
}

/// Full playlist as returned by `GET /playlists/{id}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaylistDetail {
    pub playlist_id: String,
    pub name: String,
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub items: Vec<MediaItem>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl PlaylistDetail {
    /// Summary with item count and summed duration; unknown durations count as zero
    pub fn summary(&self) -> PlaylistRef {
        PlaylistRef {
            playlist_id: self.playlist_id.clone(),
            name: self.name.clone(),
            item_count: self.items.len() as u64,
            total_duration_seconds: Some(
                self.items
                    .iter()
                    .filter_map(|i| i.duration_seconds)
                    .sum(),
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueMedia {
    pub id: String,
    pub title: String,
    pub seconds: u64,
    #[serde(rename = "type")]
    pub media_type: String,
}

/// An entry of the remote queue, identified by its channel-assigned uid
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueEntry {
    pub uid: String,
    pub media: QueueMedia,
    pub queueby: String,
    pub temp: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueueCurrent {
    pub uid: Option<String>,
    pub id: Option<String>,
    pub title: Option<String>,
    pub seconds: Option<u64>,
    pub current_time: Option<f64>,
    pub paused: bool,
}

/// Snapshot of the remote queue from `GET /queue`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueState {
    pub items: Vec<QueueEntry>,
    pub current: Option<QueueCurrent>,
    pub total_seconds: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct AddToQueueRequest<'a> {
    pub video_id: &'a str,
    pub position: QueuePosition,
}

#[derive(Debug, Serialize)]
pub(crate) struct MoveQueueItemRequest<'a> {
    pub uid: &'a str,
    pub after_uid: Option<&'a str>,
}

/// Error envelope used by the API for non-2xx responses
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorEnvelope {
    #[serde(default)]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    pub code: Option<String>,
    pub message: Option<String>,
}
