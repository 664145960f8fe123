use super::DiscoveredTrack;
use crate::normalize::compact;
use crate::types::{Field, PlaylistRow};
use std::collections::HashSet;

/// Comparison key for an `(artist, title)` pair.
pub fn track_key(artist: &str, title: &str) -> (String, String) {
    (compact(artist), compact(title))
}

/// Keys of every row that already has both an artist and a title.
pub fn present_keys(rows: &[PlaylistRow]) -> HashSet<(String, String)> {
    rows.iter()
        .filter_map(|row| Some(track_key(row.get(Field::Artist)?, row.get(Field::Title)?)))
        .collect()
}

/// Drop repeats and tracks already present in the row store.
///
/// The first occurrence of a track is kept, so the order of discovery is
/// preserved for the stable popularity sort that follows.
pub fn filter_new_tracks(
    discovered: Vec<DiscoveredTrack>,
    present: &HashSet<(String, String)>,
) -> Vec<DiscoveredTrack> {
    let mut seen = HashSet::new();
    let before = discovered.len();

    let filtered: Vec<DiscoveredTrack> = discovered
        .into_iter()
        .filter(|track| {
            let key = track_key(&track.artist, &track.title);
            !present.contains(&key) && seen.insert(key)
        })
        .collect();

    log::debug!(
        "Kept {} of {} discovered tracks after removing duplicates and known rows",
        filtered.len(),
        before
    );
    filtered
}

/// Sort by popularity, most popular first, and keep `count` tracks.
pub fn top_by_popularity(mut tracks: Vec<DiscoveredTrack>, count: usize) -> Vec<DiscoveredTrack> {
    tracks.sort_by(|a, b| b.popularity.cmp(&a.popularity));
    tracks.truncate(count);
    tracks
}

/// Path separators are not allowed in names that become file names downstream.
pub fn sanitize_name(name: &str) -> String {
    name.replace(['/', '\\'], "_")
}
