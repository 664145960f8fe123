mod common;

use common::{spotify_track, topic_video, transport_error, video, ScriptedProvider};
use playlist_match::providers::meta;
use playlist_match::types::{Field, PlaylistRow, ERROR_LINK, FALSE_TOKEN, MISSING_TOKEN};
use playlist_match::{
    create_search_channel, Candidate, MemoryStore, RowSource, SearchEvent, SearcherConfig,
    TrackRequest, TrackSearcher,
};

fn row(key: usize, artist: &str, title: &str) -> PlaylistRow {
    PlaylistRow::new(key)
        .with(Field::Artist, artist)
        .with(Field::Title, title)
}

fn video_config() -> SearcherConfig {
    SearcherConfig::video().without_delays()
}

fn metadata_config() -> SearcherConfig {
    SearcherConfig::metadata().without_delays()
}

#[test_log::test(tokio::test)]
async fn test_links_run_writes_every_outcome() {
    let provider = ScriptedProvider::new(|query| {
        if query.starts_with("Ed Sheeran Shape of You") {
            Ok(vec![
                video(
                    "Ed Sheeran - Shape of You (Official Music Video)",
                    "Ed Sheeran",
                    "JGwWNGJdvx8",
                ),
                topic_video("Shape of You", "Ed Sheeran", "_dK2tDK9grQ"),
            ])
        } else if query.starts_with("Stromae") {
            Err(transport_error())
        } else {
            Ok(vec![])
        }
    })
    .with_channel("Ed Sheeran", "Ed Sheeran");

    let rows = vec![
        row(0, "Ed Sheeran", "Shape of You"),
        PlaylistRow::new(1).with(Field::Artist, "Angèle"),
        row(2, "Nobody Knows", "Unreleased Demo"),
        row(3, "Stromae", "Alors on danse"),
    ];
    let mut store = MemoryStore::new(rows.clone());
    let mut searcher = TrackSearcher::new(provider, video_config()).unwrap();

    let summary = searcher.process_rows(&rows, &mut store).await.unwrap();

    assert_eq!(summary.processed, 4);
    assert_eq!(summary.matched, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.not_found, 1);
    assert_eq!(summary.failed, 1);

    let matched = store.row(0).unwrap();
    assert_eq!(
        matched.get(Field::Link),
        Some("https://www.youtube.com/watch?v=_dK2tDK9grQ")
    );
    assert_eq!(matched.get(Field::Confidence), Some("3"));
    assert_eq!(matched.get(Field::Downloaded), Some(FALSE_TOKEN));

    let skipped = store.row(1).unwrap();
    assert_eq!(skipped.values["LIEN"], MISSING_TOKEN);
    assert!(skipped.needs_link());

    assert_eq!(store.row(2).unwrap().values["LIEN"], MISSING_TOKEN);
    assert_eq!(store.row(3).unwrap().get(Field::Link), Some(ERROR_LINK));
    assert!(store.row(3).unwrap().needs_link());

    // 4 rows with save_every = 5: only the final save
    assert_eq!(store.save_count(), 1);
}

#[test_log::test(tokio::test)]
async fn test_video_fallback_phrasing_when_first_is_below_threshold() {
    let provider = ScriptedProvider::new(|query| {
        if query.ends_with("audio") {
            Ok(vec![topic_video("Tout oublier", "Angèle", "audio1")])
        } else {
            Ok(vec![video("Tout oublier (Live)", "Fan Uploads", "fan1")])
        }
    });

    let mut searcher = TrackSearcher::new(provider, video_config()).unwrap();
    let result = searcher
        .find(&TrackRequest::new("Angèle & Roméo Elvis", "Tout oublier"))
        .await;

    assert_eq!(result.score, 3);
    assert_eq!(result.url(), Some("https://www.youtube.com/watch?v=audio1"));
    assert_eq!(
        *searcher.provider().queries.borrow(),
        vec![
            "Angèle Roméo Elvis Tout oublier",
            "Angèle Roméo Elvis Tout oublier audio",
        ]
    );
    assert_eq!(*searcher.provider().channel_lookups.borrow(), vec!["Angèle"]);
}

#[test_log::test(tokio::test)]
async fn test_below_threshold_video_is_not_written() {
    let provider =
        ScriptedProvider::new(|_| Ok(vec![video("Shape of You", "Ed Sheeran", "official")]));
    let rows = vec![row(0, "Ed Sheeran", "Shape of You")];
    let mut store = MemoryStore::new(rows.clone());

    let mut searcher = TrackSearcher::new(provider, video_config()).unwrap();
    searcher.process_rows(&rows, &mut store).await.unwrap();

    // exact channel without the auto-generated flag scores 2 < 3
    assert_eq!(store.row(0).unwrap().values["LIEN"], MISSING_TOKEN);

    let provider =
        ScriptedProvider::new(|_| Ok(vec![video("Shape of You", "Ed Sheeran", "official")]));
    let mut lenient = TrackSearcher::new(provider, video_config().with_threshold(2)).unwrap();
    lenient.process_rows(&rows, &mut store).await.unwrap();
    assert_eq!(
        store.row(0).unwrap().get(Field::Link),
        Some("https://www.youtube.com/watch?v=official")
    );
}

#[test_log::test(tokio::test)]
async fn test_metadata_run_fills_fields() {
    let provider = ScriptedProvider::new(|query| {
        if query == "artist:\"Ed Sheeran\" track:\"Shape of You\"" {
            Ok(vec![spotify_track("Shape of You", &["Ed Sheeran"], Some(87))
                .with_metadata(meta::ALBUM, "÷ (Deluxe)")
                .with_metadata(meta::RELEASE_DATE, "2017-03-03")
                .with_metadata(meta::EXPLICIT, FALSE_TOKEN)])
        } else {
            Ok(vec![])
        }
    });

    let rows = vec![row(0, "Ed Sheeran feat. Nobody", "Shape of You"), row(1, "X", "Y")];
    let mut store = MemoryStore::new(rows.clone());
    let mut searcher = TrackSearcher::new(provider, metadata_config()).unwrap();

    let summary = searcher.process_rows(&rows, &mut store).await.unwrap();
    assert_eq!(summary.matched, 1);
    assert_eq!(summary.not_found, 1);

    let enriched = store.row(0).unwrap();
    assert_eq!(enriched.get(Field::Album), Some("÷ (Deluxe)"));
    assert_eq!(enriched.get(Field::ReleaseDate), Some("2017-03-03"));
    assert_eq!(enriched.get(Field::Popularity), Some("87"));
    assert_eq!(enriched.get(Field::Explicit), Some(FALSE_TOKEN));
    assert!(!enriched.needs_metadata());
    assert!(store.row(1).unwrap().needs_metadata());

    // X - Y tried every phrasing
    assert_eq!(searcher.provider().query_count(), 1 + 3);
    assert!(searcher.provider().channel_lookups.borrow().is_empty());
}

#[test_log::test(tokio::test)]
async fn test_metadata_falls_through_to_looser_phrasing() {
    let provider = ScriptedProvider::new(|query| {
        if query.starts_with("artist:") {
            // title-only agreement scores 1
            Ok(vec![spotify_track("Blinding Lights", &["Cover Band"], Some(10))])
        } else {
            Ok(vec![spotify_track("Blinding Lights", &["The Weeknd"], Some(92))])
        }
    });

    let mut searcher = TrackSearcher::new(provider, metadata_config()).unwrap();
    let result = searcher
        .find(&TrackRequest::new("Weeknd", "Blinding Lights (feat. X)"))
        .await;

    assert_eq!(result.score, 3);
    assert_eq!(
        result.candidate.as_ref().map(|c| c.primary_label.as_str()),
        Some("The Weeknd")
    );
    assert_eq!(
        *searcher.provider().queries.borrow(),
        vec![
            "artist:\"Weeknd\" track:\"Blinding Lights\"",
            "Weeknd Blinding Lights",
        ]
    );
}

#[test_log::test(tokio::test)]
async fn test_repeated_track_is_served_from_cache() {
    let provider =
        ScriptedProvider::new(|_| Ok(vec![spotify_track("Shape of You", &["Ed Sheeran"], None)]));
    let mut searcher = TrackSearcher::new(provider, metadata_config()).unwrap();

    let first = searcher
        .find(&TrackRequest::new("Ed Sheeran", "Shape of You"))
        .await;
    let second = searcher
        .find(&TrackRequest::new("ed sheeran", "Shape Of You!"))
        .await;

    assert_eq!(first, second);
    assert_eq!(searcher.provider().query_count(), 1);
    assert_eq!(searcher.cache().len(), 1);
}

#[test_log::test(tokio::test)]
async fn test_failed_tracks_are_not_cached() {
    let provider = ScriptedProvider::new(|_| Err(transport_error()));
    let mut searcher = TrackSearcher::new(provider, metadata_config()).unwrap();

    let request = TrackRequest::new("Ed Sheeran", "Shape of You");
    assert!(!searcher.find(&request).await.is_match());
    assert!(!searcher.find(&request).await.is_match());

    assert_eq!(searcher.provider().query_count(), 6);
    assert!(searcher.cache().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failure_burst_cools_down_between_rows() {
    let provider = ScriptedProvider::new(|_| Err(transport_error()));
    let config = SearcherConfig::metadata()
        .without_delays()
        .with_cooldown(3, playlist_match::config::DelayRange::new(2.0, 5.0));
    let (sender, mut receiver) = create_search_channel();
    let mut searcher = TrackSearcher::new(provider, config)
        .unwrap()
        .with_events(sender)
        .with_seed(7);

    let rows = vec![row(0, "A", "one")];
    let mut store = MemoryStore::new(rows.clone());

    let start = tokio::time::Instant::now();
    searcher.process_rows(&rows, &mut store).await.unwrap();
    assert!(start.elapsed() >= std::time::Duration::from_secs(2));

    let mut cooldowns = 0;
    let mut resolved = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        match event {
            SearchEvent::CooldownStarted { failures, .. } => {
                assert_eq!(failures, 3);
                cooldowns += 1;
            }
            SearchEvent::TrackResolved { row, score, url, .. } => resolved.push((row, score, url)),
            _ => {}
        }
    }
    assert_eq!(cooldowns, 1);
    assert_eq!(resolved, vec![(0, 0, None)]);
}

#[test_log::test(tokio::test)]
async fn test_periodic_saves() {
    let provider = ScriptedProvider::new(|_| Ok(vec![]));
    let rows: Vec<PlaylistRow> = (0..12).map(|i| row(i, "A", &format!("song {i}"))).collect();
    let mut store = MemoryStore::new(rows.clone());

    let mut searcher = TrackSearcher::new(provider, metadata_config()).unwrap();
    searcher.process_rows(&rows, &mut store).await.unwrap();

    // save_every = 10: once after row 10, once at the end
    assert_eq!(store.save_count(), 2);
    assert_eq!(store.rows_where(PlaylistRow::needs_metadata).len(), 12);
}

#[test_log::test(tokio::test)]
async fn test_empty_results_never_panic() {
    let provider = ScriptedProvider::new(|_| Ok(Vec::<Candidate>::new()));
    let mut searcher = TrackSearcher::new(provider, video_config()).unwrap();
    let result = searcher.find(&TrackRequest::new("", "")).await;
    assert!(!result.is_match());
    assert_eq!(result.score, 0);
}

#[test_log::test(tokio::test)]
async fn test_rejected_credentials_fail_the_row_without_cooldown() {
    let provider = ScriptedProvider::new(|_| {
        Err(playlist_match::MatchError::Auth("invalid access token".to_string()))
    });
    let (sender, mut receiver) = create_search_channel();
    let mut searcher = TrackSearcher::new(provider, metadata_config())
        .unwrap()
        .with_events(sender);

    let rows = vec![row(0, "Ed Sheeran", "Shape of You"), row(1, "Angèle", "Balance ton quoi")];
    let mut store = MemoryStore::new(rows.clone());
    let summary = searcher.process_rows(&rows, &mut store).await.unwrap();

    assert_eq!(summary.failed, 2);
    assert!(searcher.cache().is_empty());
    while let Ok(event) = receiver.try_recv() {
        assert!(!matches!(event, SearchEvent::CooldownStarted { .. }));
    }
}
