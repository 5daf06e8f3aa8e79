use super::*;
use crate::error::SyncError;
use crate::testing::{movie, plex_movie, FakePlex, FakeTrakt, PlexCall};
use chrono::{TimeZone, Utc};
use media_sync_models::{MediaType, Provider, Rating, RatingSource, SyncOp};

fn orchestrator(plex: &Arc<FakePlex>, trakt: &Arc<FakeTrakt>, config: Config) -> SyncOrchestrator {
    SyncOrchestrator::new(plex.clone(), trakt.clone(), config)
}

fn heat() -> media_sync_models::PlexItem {
    let mut heat = plex_movie(1, "Heat", "tt0113277");
    heat.year = Some(1995);
    heat
}

#[tokio::test(start_paused = true)]
async fn test_new_movie_is_collected_watched_and_rated() {
    let viewed = Utc.with_ymd_and_hms(2024, 1, 10, 20, 0, 0).unwrap();
    let mut item = heat();
    item.view_count = 1;
    item.last_viewed_at = Some(viewed);
    item.user_rating = Some(8.0);

    let plex = Arc::new(FakePlex::default());
    plex.add_section(1, "Movies", MediaType::Movie, vec![item]);
    let trakt = Arc::new(FakeTrakt::default());
    trakt.add_search(Provider::Imdb, "tt0113277", movie(500, "Heat"));

    let mut config = Config::default();
    config.sync.rating_priority = RatingSource::None;
    let result = orchestrator(&plex, &trakt, config)
        .sync(&SyncOptions::default())
        .await
        .unwrap();

    assert_eq!(result.walked, 1);
    assert_eq!(result.resolved, 1);
    assert_eq!(result.writes.added.movies, 3);

    let collected = trakt.syncs_for(SyncOp::AddCollection);
    assert_eq!(collected.len(), 1);
    assert_eq!(collected[0].movies[0].ids.trakt, Some(500));

    let history = trakt.syncs_for(SyncOp::AddHistory);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].movies[0].watched_at, Some(viewed));

    let ratings = trakt.syncs_for(SyncOp::AddRatings);
    assert_eq!(ratings.len(), 1);
    assert_eq!(ratings[0].movies[0].rating, Some(8));

    assert!(plex.writes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_conflicting_rating_follows_trakt_priority() {
    let mut item = heat();
    item.user_rating = Some(6.0);
    let plex = Arc::new(FakePlex::default());
    plex.add_section(1, "Movies", MediaType::Movie, vec![item]);

    let trakt = Arc::new(FakeTrakt::default());
    trakt.add_search(Provider::Imdb, "tt0113277", movie(500, "Heat"));
    trakt.collected_movies.lock().unwrap().push(movie(500, "Heat"));
    trakt.ratings.lock().unwrap().push(Rating {
        trakt_id: 500,
        media_type: MediaType::Movie,
        rating: 9,
        rated_at: None,
    });

    let mut config = Config::default();
    config.sync.rating_priority = RatingSource::Trakt;
    orchestrator(&plex, &trakt, config)
        .sync(&SyncOptions::default())
        .await
        .unwrap();

    assert_eq!(plex.writes(), vec![PlexCall::Rate(1, Some(9))]);
    assert!(trakt.sync_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_clear_collected_removes_unbacked_movies() {
    let plex = Arc::new(FakePlex::default());
    plex.add_section(
        1,
        "Movies",
        MediaType::Movie,
        vec![plex_movie(1, "A", "tt0000001"), plex_movie(3, "C", "tt0000003")],
    );
    let trakt = Arc::new(FakeTrakt::default());
    trakt.add_search(Provider::Imdb, "tt0000001", movie(101, "A"));
    trakt.add_search(Provider::Imdb, "tt0000003", movie(103, "C"));
    trakt
        .collected_movies
        .lock()
        .unwrap()
        .extend([movie(101, "A"), movie(102, "B"), movie(103, "C")]);

    let mut config = Config::default();
    config.sync.plex_to_trakt.clear_collected = true;
    let result = orchestrator(&plex, &trakt, config)
        .sync(&SyncOptions::default())
        .await
        .unwrap();

    assert!(result.plugins.contains(&"ClearCollected".to_string()));
    let removed = trakt.syncs_for(SyncOp::RemoveCollection);
    assert_eq!(removed.len(), 1);
    let ids: Vec<Option<u64>> = removed[0].movies.iter().map(|m| m.ids.trakt).collect();
    assert_eq!(ids, vec![Some(102)]);
    assert!(trakt.syncs_for(SyncOp::AddCollection).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_dry_run_submits_nothing() {
    let mut item = heat();
    item.view_count = 1;
    let plex = Arc::new(FakePlex::default());
    plex.add_section(1, "Movies", MediaType::Movie, vec![item]);
    let trakt = Arc::new(FakeTrakt::default());
    trakt.add_search(Provider::Imdb, "tt0113277", movie(500, "Heat"));
    trakt.watched_movies.lock().unwrap().push(movie(501, "Other"));

    let options = SyncOptions {
        dry_run: true,
        ..Default::default()
    };
    let result = orchestrator(&plex, &trakt, Config::default())
        .sync(&options)
        .await
        .unwrap();

    assert!(result.dry_run);
    assert_eq!(result.writes.queued_total(), 2);
    assert!(trakt.sync_calls().is_empty());
    assert!(plex.writes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unknown_library_aborts() {
    let plex = Arc::new(FakePlex::default());
    plex.add_section(1, "Movies", MediaType::Movie, vec![heat()]);
    let trakt = Arc::new(FakeTrakt::default());

    let options = SyncOptions {
        filters: WalkFilters {
            libraries: vec!["Anime".to_string()],
            ..Default::default()
        },
        dry_run: false,
    };
    let err = orchestrator(&plex, &trakt, Config::default())
        .sync(&options)
        .await
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<SyncError>(), Some(SyncError::Config(_))));
    assert!(trakt.search_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_partial_walk_skips_full_view_plugins() {
    let plex = Arc::new(FakePlex::default());
    plex.add_section(1, "Movies", MediaType::Movie, vec![heat()]);
    let trakt = Arc::new(FakeTrakt::default());
    trakt.add_search(Provider::Imdb, "tt0113277", movie(500, "Heat"));
    trakt.collected_movies.lock().unwrap().push(movie(999, "Elsewhere"));

    let mut config = Config::default();
    config.sync.plex_to_trakt.clear_collected = true;
    let options = SyncOptions {
        filters: WalkFilters {
            movies: vec!["Heat".to_string()],
            ..Default::default()
        },
        dry_run: false,
    };
    let result = orchestrator(&plex, &trakt, config).sync(&options).await.unwrap();

    assert!(result.partial);
    assert!(!result.plugins.contains(&"ClearCollected".to_string()));
    assert!(!result.plugins.contains(&"LikedLists".to_string()));
    assert!(trakt.syncs_for(SyncOp::RemoveCollection).is_empty());
    assert_eq!(trakt.syncs_for(SyncOp::AddCollection).len(), 1);
}

#[test]
fn test_result_serializes_duration_in_millis() {
    let result = SyncResult {
        walked: 2,
        resolved: 1,
        skipped: 1,
        plugins: vec!["AddCollection".to_string()],
        partial: false,
        dry_run: false,
        writes: WriteSummary::default(),
        duration: Duration::from_millis(1500),
    };
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["duration_ms"], 1500);
    assert_eq!(json["skipped"], 1);
}
