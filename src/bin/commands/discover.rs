use super::utils::connect_spotify;
use playlist_match::discovery::append_tracks;
use playlist_match::{DiscoveryConfig, JsonFileStore, PlaylistDiscovery, RowSource};
use std::path::Path;

/// List (and optionally append) popular tracks from playlists matching `query`.
pub async fn handle_discover(
    rows_path: &Path,
    query: &str,
    count: usize,
    playlist: &str,
    apply: bool,
    credentials_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    if count == 0 {
        return Err("--count must be positive".into());
    }

    let mut store = JsonFileStore::open(rows_path)?;
    let provider = connect_spotify(credentials_path).await?;
    let mut discovery = PlaylistDiscovery::new(provider, DiscoveryConfig::default());

    println!("🔎 Searching {count} popular tracks for '{query}'...");
    let tracks = discovery.discover(query, count, &store.rows()).await?;

    if tracks.is_empty() {
        println!("No tracks found. Try another keyword.");
        return Ok(());
    }

    println!("{} tracks found for '{query}':", tracks.len());
    for (index, track) in tracks.iter().enumerate() {
        println!("{:>4}. {track}", index + 1);
    }

    if apply {
        let keys = append_tracks(&mut store, playlist, &tracks)?;
        println!(
            "💾 Added {} tracks to '{playlist}' in {}",
            keys.len(),
            store.path().display()
        );
    } else {
        println!();
        println!("Nothing written. Re-run with --apply to append these tracks.");
    }
    Ok(())
}
