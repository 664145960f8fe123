use super::common::{filter_new_tracks, present_keys, sanitize_name, top_by_popularity, track_key};
use super::DiscoveredTrack;
use crate::config::{CooldownConfig, DelayPolicy, DelayRange};
use crate::events::SearchEventSender;
use crate::provider::PlaylistSource;
use crate::providers::meta;
use crate::query_loop::QueryLoop;
use crate::store::ResultSink;
use crate::types::{Candidate, Field, FieldMap, PlaylistRow, RowKey};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Tuning for [`PlaylistDiscovery`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Playlists fetched per search call
    pub playlists_per_page: u32,
    /// Stop after this many playlists even if not enough tracks were found
    pub max_playlists: u32,
    /// Collect `count * oversample` tracks before ranking by popularity
    pub oversample: usize,
    pub delays: DelayPolicy,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            playlists_per_page: 1,
            max_playlists: 50,
            oversample: 2,
            delays: DelayPolicy::metadata(),
        }
    }
}

/// Finds popular tracks in playlists matching a keyword.
///
/// Playlists are walked one page at a time. Tracks are de-duplicated and
/// checked against the rows already in the store as they arrive; popularity
/// comes from the playlist listing, or from a catalog lookup when the listing
/// lacks it. Every call is paced like a search.
pub struct PlaylistDiscovery<S> {
    source: S,
    config: DiscoveryConfig,
    query_loop: QueryLoop,
}

impl<S: PlaylistSource> PlaylistDiscovery<S> {
    pub fn new(source: S, config: DiscoveryConfig) -> Self {
        let cooldown = CooldownConfig {
            failure_burst: 0,
            pause: DelayRange::zero(),
        };
        Self {
            source,
            query_loop: QueryLoop::new(config.delays.clone(), cooldown, 1),
            config,
        }
    }

    pub fn with_events(mut self, events: SearchEventSender) -> Self {
        self.query_loop = self.query_loop.with_events(events);
        self
    }

    /// External calls issued so far.
    pub fn request_count(&self) -> u64 {
        self.query_loop.state().request_count
    }

    /// The `count` most popular new tracks for `keyword`.
    ///
    /// Fails only when the playlist search itself fails; a playlist whose
    /// tracks cannot be fetched is skipped.
    pub async fn discover(
        &mut self,
        keyword: &str,
        count: usize,
        existing: &[PlaylistRow],
    ) -> Result<Vec<DiscoveredTrack>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let wanted = count.saturating_mul(self.config.oversample.max(1));
        let per_page = self.config.playlists_per_page.max(1);
        let present = present_keys(existing);
        let mut collected: Vec<DiscoveredTrack> = Vec::new();
        let mut unknown_popularity = HashSet::new();
        let mut offset = 0;

        log::info!("Looking for {count} popular tracks in playlists matching '{keyword}'");

        while collected.len() < wanted && offset < self.config.max_playlists {
            self.query_loop.pace().await;
            let playlists = self
                .source
                .search_playlists(keyword, per_page, offset)
                .await?;
            if playlists.is_empty() {
                log::info!("No more playlists for '{keyword}' after {offset}");
                break;
            }
            offset += per_page;

            for playlist in playlists {
                self.query_loop.pace().await;
                let tracks = match self.source.playlist_tracks(&playlist.id).await {
                    Ok(tracks) => tracks,
                    Err(error) => {
                        log::warn!("Skipping playlist '{}': {error}", playlist.name);
                        continue;
                    }
                };
                log::info!("Playlist '{}': {} tracks", playlist.name, tracks.len());

                for candidate in tracks {
                    let (track, known) = discovered_track(&candidate);
                    if !known {
                        unknown_popularity.insert(track_key(&track.artist, &track.title));
                    }
                    collected.push(track);
                }
                collected = filter_new_tracks(collected, &present);
            }
        }

        for track in collected.iter_mut() {
            if unknown_popularity.remove(&track_key(&track.artist, &track.title)) {
                track.popularity = self.lookup_popularity(&track.artist, &track.title).await;
            }
        }

        let top = top_by_popularity(collected, count);
        log::info!("Discovered {} tracks for '{keyword}'", top.len());
        Ok(top)
    }

    async fn lookup_popularity(&mut self, artist: &str, title: &str) -> u32 {
        self.query_loop.pace().await;
        match self.source.track_popularity(artist, title).await {
            Ok(popularity) => popularity.unwrap_or(0),
            Err(error) => {
                log::warn!("Popularity lookup failed for '{artist} - {title}': {error}");
                0
            }
        }
    }
}

/// Convert a playlist entry; the flag says whether popularity was known.
///
/// Artists keep the provider's credit order when it is available.
fn discovered_track(candidate: &Candidate) -> (DiscoveredTrack, bool) {
    let artist = match candidate.metadata(meta::ARTISTS) {
        Some(credited) if !credited.trim().is_empty() => credited.to_string(),
        _ => {
            let primary = candidate.primary_label.as_str();
            let artists: Vec<&str> = std::iter::once(primary)
                .chain(
                    candidate
                        .secondary_labels
                        .iter()
                        .map(String::as_str)
                        .filter(|label| *label != primary),
                )
                .filter(|label| !label.trim().is_empty())
                .collect();
            artists.join(", ")
        }
    };

    let popularity = candidate
        .metadata(meta::POPULARITY)
        .and_then(|p| p.parse::<u32>().ok());

    let track = DiscoveredTrack {
        artist: sanitize_name(&artist),
        title: sanitize_name(&candidate.title),
        popularity: popularity.unwrap_or(0),
    };
    (track, popularity.is_some())
}

/// Append discovered tracks under `playlist` and save; returns the new keys.
///
/// New rows get an empty link so link resolution picks them up.
pub fn append_tracks<S: ResultSink>(
    sink: &mut S,
    playlist: &str,
    tracks: &[DiscoveredTrack],
) -> Result<Vec<RowKey>> {
    let mut keys = Vec::with_capacity(tracks.len());
    for track in tracks {
        let mut fields = FieldMap::new();
        fields.insert(Field::Playlist, playlist.to_string());
        fields.insert(Field::Artist, track.artist.clone());
        fields.insert(Field::Title, track.title.clone());
        fields.insert(Field::Link, String::new());
        keys.push(sink.append(&fields)?);
    }
    sink.save()?;
    log::info!("Added {} tracks to playlist '{playlist}'", keys.len());
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovered_track_lists_primary_artist_first() {
        let candidate = Candidate::new("AC/DC Tribute", "Zaz")
            .with_label("Angèle")
            .with_label("Zaz")
            .with_metadata(meta::POPULARITY, "71");
        let (track, known) = discovered_track(&candidate);
        assert!(known);
        assert_eq!(track.artist, "Zaz, Angèle");
        assert_eq!(track.title, "AC_DC Tribute");
        assert_eq!(track.popularity, 71);
    }

    #[test]
    fn test_discovered_track_keeps_credit_order() {
        let candidate = Candidate::new("Bruxelles arrive", "Stromae")
            .with_label("Stromae")
            .with_label("Orelsan")
            .with_label("Angèle")
            .with_metadata(meta::ARTISTS, "Stromae, Orelsan, Angèle");
        let (track, _) = discovered_track(&candidate);
        assert_eq!(track.artist, "Stromae, Orelsan, Angèle");
    }

    #[test]
    fn test_discovered_track_without_popularity() {
        let (track, known) = discovered_track(&Candidate::new("Alors on danse", "Stromae"));
        assert!(!known);
        assert_eq!(track.popularity, 0);
    }
}
