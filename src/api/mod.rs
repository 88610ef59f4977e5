// # API Module
//
// REST client for the playlist and shared-queue endpoints, plus the async
// traits the queue engine depends on instead of the concrete client.

mod client;
pub mod models;

pub use client::{ApiClient, ApiError, PlaylistFetcher, QueueBackend};
pub use models::{
    MediaItem, PlaylistDetail, PlaylistRef, QueueEntry, QueuePosition, QueueState, Visibility,
};
