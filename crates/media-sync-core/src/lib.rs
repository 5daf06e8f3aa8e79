pub mod episode_lookup;
pub mod error;
pub mod events;
pub mod list_collection;
pub mod plugins;
pub mod rate;
pub mod resolver;
pub mod retry;
pub mod scrobbler;
pub mod summary;
pub mod sync;
pub mod trakt_state;
pub mod walker;
pub mod watch_state;
pub mod watchlist;
pub mod write_queue;

#[cfg(test)]
mod testing;

pub use error::SyncError;
pub use events::{Event, EventDispatcher, EventFilter, EventHandler, EventKind, PlayState};
pub use rate::RateGovernor;
pub use resolver::{MediaPair, Resolver};
pub use retry::RetryPolicy;
pub use scrobbler::ScrobbleRegistry;
pub use summary::WriteSummary;
pub use sync::{SyncOptions, SyncOrchestrator, SyncResult};
pub use walker::{WalkFilters, WalkProgress, WalkStats};
pub use watch_state::{PlaybackUpdate, WatchStateUpdater};
pub use write_queue::{QueueHandle, TraktWriter, WriteQueue};
