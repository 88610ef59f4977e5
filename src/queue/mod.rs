// # Queue Module
//
// Queue-application engine with focused, testable components:
//
// - **ItemResolver**: Expands a playlist or marathon into ordered items
// - **RateLimitedDispatcher**: One add call at a time, paced with a burst cooldown
// - **QueueController**: Orchestrates resolve → shuffle → clear → dispatch
// - **ProgressStore**: Observable run progress with cancellation tickets
// - **QueueSender**: Faster send path for single playlists and videos
//
// Public API:
// - `QueueController::apply`: Apply a request with `QueueOptions`
// - `ProgressStore`: Subscribe to `RunProgress`, cancel or reset runs
// - `QueueSender`: Send items with `SendAction`

mod controller;
mod dispatcher;
mod progress;
mod resolver;
mod send;
mod types;

pub use controller::{shuffle_items, QueueController};
pub use dispatcher::{PacingConfig, RateLimitedDispatcher};
pub use progress::{ProgressStore, RunClaim, RunTicket};
pub use resolver::{ItemResolver, Resolution};
pub use send::{
    QueueSender, SendAction, SendFailure, SendOutcome, SendPacing, SendProgress, SendReport,
};
pub use types::{
    ApplicationRequest, ApplySummary, PlaylistReference, QueueError, QueueMode, QueueOptions,
    RunProgress, RunStatus, SkippedPlaylist,
};
