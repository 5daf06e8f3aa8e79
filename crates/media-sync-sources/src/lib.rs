pub mod error;
pub mod http_cache;
pub mod plex;
pub mod traits;
pub mod trakt;

pub use error::{SourceError, SourceResult};
pub use http_cache::HttpCache;
pub use plex::{
    HistoryEntry, NotificationStream, Page, PlexHttpClient, PlexPlaylist, PlexSession,
    RawNotification, Section, XbmcFallback,
};
pub use traits::{PlexServer, TraktApi};
pub use trakt::TraktClient;
