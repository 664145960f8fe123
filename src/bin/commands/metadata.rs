use super::utils::{apply_limit, connect_spotify, load_config, print_summary, spawn_event_printer};
use playlist_match::types::PlaylistRow;
use playlist_match::{JsonFileStore, RowSource, SearcherConfig, TrackSearcher};
use std::path::Path;

/// Enrich rows with Spotify album, release date, popularity and explicit flag.
pub async fn handle_metadata(
    rows_path: &Path,
    config_path: Option<&Path>,
    credentials_path: Option<&Path>,
    threshold: Option<u8>,
    limit: usize,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(SearcherConfig::metadata(), config_path, threshold)?;

    let mut store = JsonFileStore::open(rows_path)?;
    let pending = apply_limit(store.rows_where(PlaylistRow::needs_metadata), limit);
    if pending.is_empty() {
        println!("✅ Every row already has metadata");
        return Ok(());
    }
    println!("🎵 Enriching {} of {} rows", pending.len(), store.len());

    let provider = connect_spotify(credentials_path).await?;
    let mut searcher =
        TrackSearcher::new(provider, config)?.with_events(spawn_event_printer(verbose));

    let summary = searcher.process_rows(&pending, &mut store).await?;
    print_summary(&summary);
    println!("💾 Saved {}", store.path().display());
    Ok(())
}
