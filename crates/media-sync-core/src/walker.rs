use async_trait::async_trait;
use media_sync_models::{MediaType, PlexItem};
use media_sync_sources::{PlexServer, Section};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::resolver::{MediaPair, Resolver};

/// What a sync run should walk
#[derive(Debug, Clone)]
pub struct WalkFilters {
    pub libraries: Vec<String>,
    pub shows: Vec<String>,
    pub movies: Vec<String>,
    /// Plex rating keys
    pub ids: Vec<u64>,
    pub walk_movies: bool,
    pub walk_shows: bool,
    pub walk_watchlist: bool,
}

impl Default for WalkFilters {
    fn default() -> Self {
        Self {
            libraries: Vec::new(),
            shows: Vec::new(),
            movies: Vec::new(),
            ids: Vec::new(),
            walk_movies: true,
            walk_shows: true,
            walk_watchlist: true,
        }
    }
}

impl WalkFilters {
    pub fn has_filters(&self) -> bool {
        !self.libraries.is_empty() || !self.shows.is_empty() || !self.movies.is_empty() || !self.ids.is_empty()
    }

    /// Plugins that need the whole library (clearing the collection,
    /// liked lists) skip partial walks
    pub fn is_partial(&self) -> bool {
        self.has_filters() || !self.walk_movies || !self.walk_shows || !self.walk_watchlist
    }
}

/// Ordered selection of what to walk
#[derive(Debug, Clone, Default)]
pub struct WalkPlan {
    pub movie_sections: Vec<Section>,
    pub show_sections: Vec<Section>,
    pub movies: Vec<PlexItem>,
    pub shows: Vec<PlexItem>,
    pub episodes: Vec<PlexItem>,
}

impl WalkPlan {
    pub fn is_empty(&self) -> bool {
        self.movie_sections.is_empty()
            && self.show_sections.is_empty()
            && self.movies.is_empty()
            && self.shows.is_empty()
            && self.episodes.is_empty()
    }
}

/// Turn filters into a [`WalkPlan`]
///
/// Unknown libraries, titles and ids are configuration errors.
pub async fn plan(plex: &dyn PlexServer, filters: &WalkFilters, excluded: &[String]) -> SyncResult<WalkPlan> {
    let mut plan = WalkPlan::default();
    let sections = plex.sections().await?;

    if !filters.libraries.is_empty() {
        for name in &filters.libraries {
            let matched: Vec<&Section> = sections.iter().filter(|s| &s.title == name).collect();
            if matched.is_empty() {
                return Err(SyncError::Config(format!("Library '{}' not found", name)));
            }
            for section in matched {
                push_section(&mut plan, filters, section);
            }
        }
    } else if !filters.has_filters() {
        for section in &sections {
            if excluded.iter().any(|e| e == &section.title) {
                info!("Skipping excluded library '{}'", section.title);
                continue;
            }
            push_section(&mut plan, filters, section);
        }
    }

    if filters.walk_movies {
        for title in &filters.movies {
            let found = plex.search(title, MediaType::Movie).await?;
            if found.is_empty() {
                return Err(SyncError::Config(format!("Movie '{}' not found", title)));
            }
            plan.movies.extend(found);
        }
    }

    if filters.walk_shows {
        for title in &filters.shows {
            let found = plex.search(title, MediaType::Show).await?;
            if found.is_empty() {
                return Err(SyncError::Config(format!("Show '{}' not found", title)));
            }
            plan.shows.extend(found);
        }
    }

    for id in &filters.ids {
        let item = plex
            .fetch_item(*id)
            .await
            .map_err(|e| SyncError::Config(format!("Unable to fetch item {}: {}", id, e)))?
            .ok_or_else(|| SyncError::Config(format!("Item {} not found", id)))?;
        match item.media_type {
            MediaType::Show => plan.shows.push(item),
            MediaType::Movie => plan.movies.push(item),
            MediaType::Episode => plan.episodes.push(item),
            MediaType::Season => {
                return Err(SyncError::Config(format!(
                    "Item {} is a season, pass its show or an episode",
                    id
                )))
            }
        }
    }

    debug!(
        "Walk plan: {} movie sections, {} show sections, {} movies, {} shows, {} episodes",
        plan.movie_sections.len(),
        plan.show_sections.len(),
        plan.movies.len(),
        plan.shows.len(),
        plan.episodes.len()
    );
    Ok(plan)
}

fn push_section(plan: &mut WalkPlan, filters: &WalkFilters, section: &Section) {
    match section.media_type {
        MediaType::Movie if filters.walk_movies => plan.movie_sections.push(section.clone()),
        MediaType::Show if filters.walk_shows => plan.show_sections.push(section.clone()),
        _ => {}
    }
}

/// Receives every resolved pair in walk order
#[async_trait]
pub trait WalkVisitor: Send {
    async fn visit_movie(&mut self, pair: &MediaPair) -> SyncResult<()>;

    async fn visit_episode(&mut self, pair: &MediaPair) -> SyncResult<()>;
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct WalkStats {
    pub walked: usize,
    pub resolved: usize,
    pub skipped: usize,
}

pub type WalkProgress = Arc<dyn Fn(&WalkStats, &str) + Send + Sync>;

/// Walks a [`WalkPlan`], resolving each item before handing it to the visitor
///
/// Sections are paged so only one page of items is held at a time. Show
/// pairs are resolved once and shared by their episodes.
pub struct Walker {
    plex: Arc<dyn PlexServer>,
    resolver: Arc<Resolver>,
    page_size: u32,
    shows: HashMap<u64, Option<Arc<MediaPair>>>,
    stats: WalkStats,
    progress: Option<WalkProgress>,
}

impl Walker {
    pub fn new(plex: Arc<dyn PlexServer>, resolver: Arc<Resolver>, page_size: u32) -> Self {
        Self {
            plex,
            resolver,
            page_size: page_size.max(1),
            shows: HashMap::new(),
            stats: WalkStats::default(),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: WalkProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn stats(&self) -> WalkStats {
        self.stats
    }

    pub async fn walk(&mut self, plan: &WalkPlan, visitor: &mut dyn WalkVisitor) -> SyncResult<WalkStats> {
        for section in &plan.movie_sections {
            info!("Walking movie library '{}'", section.title);
            self.walk_section(section, MediaType::Movie, visitor).await?;
        }
        for movie in &plan.movies {
            self.visit(movie, visitor).await?;
        }

        for section in &plan.show_sections {
            info!("Walking show library '{}'", section.title);
            self.walk_section(section, MediaType::Episode, visitor).await?;
        }
        for show in &plan.shows {
            let episodes = self.plex.show_episodes(show.rating_key).await?;
            debug!("{}: {} episodes", show.label(), episodes.len());
            for episode in &episodes {
                self.visit(episode, visitor).await?;
            }
        }
        for episode in &plan.episodes {
            self.visit(episode, visitor).await?;
        }

        Ok(self.stats)
    }

    async fn walk_section(
        &mut self,
        section: &Section,
        media_type: MediaType,
        visitor: &mut dyn WalkVisitor,
    ) -> SyncResult<()> {
        let mut start = 0;
        loop {
            let page = match media_type {
                MediaType::Episode => {
                    self.plex
                        .section_episodes(section, start, self.page_size)
                        .await?
                }
                _ => self.plex.section_items(section, start, self.page_size).await?,
            };
            let fetched = page.items.len() as u32;
            for item in &page.items {
                self.visit(item, visitor).await?;
            }
            start += fetched;
            if fetched == 0 || start >= page.total {
                return Ok(());
            }
        }
    }

    async fn visit(&mut self, item: &PlexItem, visitor: &mut dyn WalkVisitor) -> SyncResult<()> {
        self.stats.walked += 1;
        let pair = match item.media_type {
            MediaType::Movie => self.resolve(item, None).await?,
            MediaType::Episode => {
                let parent = match item.show_key {
                    Some(show_key) => self.show_pair(show_key).await?,
                    None => None,
                };
                self.resolve(item, parent).await?
            }
            _ => None,
        };

        if let Some(pair) = &pair {
            match pair.plex.media_type {
                MediaType::Episode => visitor.visit_episode(pair).await?,
                _ => visitor.visit_movie(pair).await?,
            }
        }

        if let Some(progress) = &self.progress {
            progress(&self.stats, &item.label());
        }
        Ok(())
    }

    async fn resolve(&mut self, item: &PlexItem, parent: Option<Arc<MediaPair>>) -> SyncResult<Option<MediaPair>> {
        match self.resolver.resolve(item, parent).await {
            Ok(Some(pair)) => {
                self.stats.resolved += 1;
                Ok(Some(pair))
            }
            Ok(None) => {
                self.stats.skipped += 1;
                Ok(None)
            }
            Err(e) if !e.is_fatal() => {
                warn!("{}: lookup failed, skipping: {}", item.label(), e);
                self.stats.skipped += 1;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Pair of the show with `show_key`, resolved once per walk
    async fn show_pair(&mut self, show_key: u64) -> SyncResult<Option<Arc<MediaPair>>> {
        if let Some(pair) = self.shows.get(&show_key) {
            return Ok(pair.clone());
        }

        let pair = match self.plex.fetch_item(show_key).await? {
            Some(show) => match self.resolver.resolve(&show, None).await {
                Ok(pair) => pair.map(Arc::new),
                Err(e) if !e.is_fatal() => {
                    warn!("{}: lookup failed: {}", show.label(), e);
                    None
                }
                Err(e) => return Err(e),
            },
            None => None,
        };
        if pair.is_none() {
            debug!("Show {} did not resolve, episodes are looked up on their own", show_key);
        }
        self.shows.insert(show_key, pair.clone());
        Ok(pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use crate::testing::{episode, movie, plex_episode, plex_movie, plex_show, show, FakePlex, FakeTrakt};
    use media_sync_models::Provider;

    #[derive(Default)]
    struct Collect {
        movies: Vec<u64>,
        episodes: Vec<(u64, Option<u64>)>,
    }

    #[async_trait]
    impl WalkVisitor for Collect {
        async fn visit_movie(&mut self, pair: &MediaPair) -> SyncResult<()> {
            self.movies.push(pair.trakt.trakt_id);
            Ok(())
        }

        async fn visit_episode(&mut self, pair: &MediaPair) -> SyncResult<()> {
            self.episodes.push((pair.trakt.trakt_id, pair.show_id()));
            Ok(())
        }
    }

    fn library() -> FakePlex {
        let plex = FakePlex::default();
        plex.add_section(
            1,
            "Movies",
            MediaType::Movie,
            vec![plex_movie(10, "Heat", "tt0113277"), plex_movie(11, "Ronin", "tt0122690")],
        );
        plex.add_section(2, "TV", MediaType::Show, vec![plex_show(20, "Show", "tt0000007")]);
        plex.add_episodes(
            2,
            vec![
                plex_episode(21, 20, 1, 1, "tt0000071"),
                plex_episode(22, 20, 1, 2, "tt0000072"),
            ],
        );
        plex.add_section(3, "Home Videos", MediaType::Movie, vec![]);
        plex
    }

    #[tokio::test]
    async fn test_full_plan_skips_excluded() {
        let plex = library();
        let plan = plan(&plex, &WalkFilters::default(), &["Home Videos".to_string()])
            .await
            .unwrap();
        assert_eq!(plan.movie_sections.len(), 1);
        assert_eq!(plan.show_sections.len(), 1);
        assert!(!WalkFilters::default().is_partial());
    }

    #[tokio::test]
    async fn test_filters_restrict_plan() {
        let plex = library();
        let filters = WalkFilters {
            movies: vec!["Heat".to_string()],
            ..Default::default()
        };
        let plan = plan(&plex, &filters, &[]).await.unwrap();
        assert!(plan.movie_sections.is_empty());
        assert!(plan.show_sections.is_empty());
        assert_eq!(plan.movies.len(), 1);
        assert!(filters.is_partial());

        let filters = WalkFilters {
            libraries: vec!["Home Videos".to_string()],
            ..Default::default()
        };
        let plan = super::plan(&plex, &filters, &["Home Videos".to_string()]).await.unwrap();
        assert_eq!(plan.movie_sections[0].key, 3);

        let filters = WalkFilters {
            ids: vec![22],
            ..Default::default()
        };
        let plan = super::plan(&plex, &filters, &[]).await.unwrap();
        assert_eq!(plan.episodes[0].rating_key, 22);
    }

    #[tokio::test]
    async fn test_unknown_filters_are_fatal() {
        let plex = library();
        for filters in [
            WalkFilters {
                libraries: vec!["Anime".to_string()],
                ..Default::default()
            },
            WalkFilters {
                shows: vec!["Missing".to_string()],
                ..Default::default()
            },
            WalkFilters {
                ids: vec![999],
                ..Default::default()
            },
        ] {
            let err = plan(&plex, &filters, &[]).await.unwrap_err();
            assert!(matches!(err, SyncError::Config(_)));
        }
    }

    #[tokio::test]
    async fn test_walk_pages_and_shares_show_pair() {
        let plex = Arc::new(library());
        let trakt = FakeTrakt::default();
        trakt.add_search(Provider::Imdb, "tt0113277", movie(100, "Heat"));
        trakt.add_search(Provider::Imdb, "tt0000007", show(200, "Show"));
        trakt.add_episodes(
            200,
            vec![episode(200, 201, 1, 1, "tt0000071"), episode(200, 202, 1, 2, "tt0000072")],
        );
        let trakt = Arc::new(trakt);
        let resolver = Arc::new(Resolver::new(trakt.clone(), RetryPolicy::default()));

        let plan = plan(plex.as_ref(), &WalkFilters::default(), &[]).await.unwrap();
        let mut walker = Walker::new(plex, resolver, 1);
        let mut visitor = Collect::default();
        let stats = walker.walk(&plan, &mut visitor).await.unwrap();

        assert_eq!(visitor.movies, vec![100]);
        assert_eq!(visitor.episodes, vec![(201, Some(200)), (202, Some(200))]);
        assert_eq!(
            stats,
            WalkStats {
                walked: 4,
                resolved: 3,
                skipped: 1
            }
        );
        let show_searches = trakt
            .search_calls()
            .into_iter()
            .filter(|c| c.starts_with("imdb:tt0000007"))
            .count();
        assert_eq!(show_searches, 1);
    }
}
