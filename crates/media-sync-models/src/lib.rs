pub mod batch;
pub mod guid;
pub mod list;
pub mod media;
pub mod media_ids;
pub mod progress;
pub mod rating;
pub mod trakt_item;
pub mod watch_history;
pub mod watchlist;

pub use batch::{
    EpisodeNumber, NotFound, PayloadEntry, ScrobbleAction, SeasonEntry, SyncOp, SyncPayload,
    SyncResponse, TypeCounts,
};
pub use guid::{is_imdb_id, sort_guids, Guid, Provider};
pub use list::{ListEntry, ListRef, TraktList};
pub use media::{MediaType, PlexItem};
pub use media_ids::MediaIds;
pub use progress::PlaybackProgress;
pub use rating::{Rating, RatingSource};
pub use trakt_item::TraktItem;
pub use watch_history::ShowEpisodes;
pub use watchlist::{PlexWatchlistItem, WatchlistItem};
