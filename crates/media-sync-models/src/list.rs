use serde::{Deserialize, Serialize};
use crate::trakt_item::TraktItem;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListEntry {
    pub rank: u32,
    pub item: TraktItem,
}

/// A Trakt list (liked public list or the user's watchlist rendered as one)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraktList {
    pub trakt_id: u64,
    pub name: String,
    #[serde(default)]
    pub items: Vec<ListEntry>,
}

/// A list reference without its items, as returned by the liked-lists listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListRef {
    pub trakt_id: u64,
    pub name: String,
    /// Owner slug, needed to address the list items
    pub owner: Option<String>,
}
