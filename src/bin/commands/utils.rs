use playlist_match::{
    create_search_channel, ProcessSummary, SearchEvent, SearchEventSender, SearcherConfig,
    SpotifyCredentials, SpotifyProvider,
};
use std::path::Path;

/// Layer the config file and environment over a preset, then apply CLI overrides.
pub fn load_config(
    preset: SearcherConfig,
    config_path: Option<&Path>,
    threshold: Option<u8>,
) -> Result<SearcherConfig, Box<dyn std::error::Error>> {
    let mut config = SearcherConfig::load(preset, config_path)?;
    if let Some(threshold) = threshold {
        config = config.with_threshold(threshold);
    }
    Ok(config)
}

/// Authenticate against Spotify with file or environment credentials.
pub async fn connect_spotify(
    credentials_path: Option<&Path>,
) -> Result<SpotifyProvider, Box<dyn std::error::Error>> {
    let credentials = match SpotifyCredentials::resolve(credentials_path) {
        Ok(credentials) => credentials,
        Err(e) => {
            eprintln!("❌ Error: {e}");
            eprintln!();
            eprintln!("Either pass --credentials <file.json> or set:");
            eprintln!("  SPOTIFY_CLIENT_ID=your_client_id");
            eprintln!("  SPOTIFY_CLIENT_SECRET=your_client_secret");
            return Err(e.into());
        }
    };

    let http_client = http_client::native::NativeClient::new();
    let provider = SpotifyProvider::connect(
        Box::new(http_client),
        &credentials.client_id,
        &credentials.client_secret,
    )
    .await?;
    Ok(provider)
}

/// Print pauses and cooldowns as they happen.
pub fn spawn_event_printer(verbose: bool) -> SearchEventSender {
    let (sender, mut receiver) = create_search_channel();
    tokio::spawn(async move {
        while let Ok(event) = receiver.recv().await {
            match event {
                SearchEvent::CooldownStarted {
                    delay_ms, failures, ..
                } => {
                    println!(
                        "⏸️  {failures} failed searches in a row, cooling down {:.0}s",
                        delay_ms as f64 / 1000.0
                    );
                }
                SearchEvent::Paused {
                    delay_ms,
                    tier: Some(every),
                    ..
                } if verbose => {
                    println!(
                        "⏳ Every-{every} pause: {:.1}s",
                        delay_ms as f64 / 1000.0
                    );
                }
                SearchEvent::TrackResolved { row, score, url, .. } if verbose => match url {
                    Some(url) => println!("✅ Row {row}: {url} (confidence {score})"),
                    None => println!("➖ Row {row}: no match"),
                },
                _ => {}
            }
        }
    });
    sender
}

/// Keep at most `limit` items (0 keeps everything).
pub fn apply_limit<T>(mut items: Vec<T>, limit: usize) -> Vec<T> {
    if limit > 0 {
        items.truncate(limit);
    }
    items
}

pub fn print_summary(summary: &ProcessSummary) {
    println!();
    println!("📊 Processed {} rows", summary.processed);
    println!("   ✅ matched:   {}", summary.matched);
    println!("   ➖ not found: {}", summary.not_found);
    println!("   ❌ failed:    {}", summary.failed);
    println!("   ⚠️  skipped:   {}", summary.skipped);
    println!("   🌐 requests:  {}", summary.requests);
}
