use super::utils::{apply_limit, load_config, print_summary, spawn_event_printer};
use playlist_match::config::youtube_api_key;
use playlist_match::types::PlaylistRow;
use playlist_match::{JsonFileStore, RowSource, SearcherConfig, TrackSearcher, YoutubeProvider};
use std::path::Path;

/// Resolve video links for every row that still needs one.
pub async fn handle_links(
    rows_path: &Path,
    config_path: Option<&Path>,
    threshold: Option<u8>,
    limit: usize,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(SearcherConfig::video(), config_path, threshold)?;
    let api_key = youtube_api_key()?;

    let mut store = JsonFileStore::open(rows_path)?;
    let pending = apply_limit(store.rows_where(PlaylistRow::needs_link), limit);
    if pending.is_empty() {
        println!("✅ Every row already has a link");
        return Ok(());
    }
    println!(
        "🔎 Resolving links for {} of {} rows (threshold {})",
        pending.len(),
        store.len(),
        config.scoring.threshold
    );

    let http_client = http_client::native::NativeClient::new();
    let provider = YoutubeProvider::new(Box::new(http_client), api_key);
    let mut searcher =
        TrackSearcher::new(provider, config)?.with_events(spawn_event_printer(verbose));

    let summary = searcher.process_rows(&pending, &mut store).await?;
    print_summary(&summary);
    println!("💾 Saved {}", store.path().display());
    Ok(())
}
