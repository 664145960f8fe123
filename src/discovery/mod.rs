//! Playlist discovery: collect popular tracks from public playlists matching a
//! keyword and append the ones the row store does not know yet.

pub mod common;
pub mod playlist;

pub use common::{filter_new_tracks, present_keys, top_by_popularity};
pub use playlist::{append_tracks, DiscoveryConfig, PlaylistDiscovery};

use serde::{Deserialize, Serialize};
use std::fmt;

/// A track found in a playlist, with its catalog popularity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredTrack {
    /// Every credited artist, joined with ", "
    pub artist: String,
    pub title: String,
    /// 0 to 100, 0 when unknown
    pub popularity: u32,
}

impl fmt::Display for DiscoveredTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} (popularity {})",
            self.artist, self.title, self.popularity
        )
    }
}
