use crate::providers::PlaylistSummary;
use crate::types::{Candidate, ResultKind};
use crate::Result;
use async_trait::async_trait;

/// The injected search function the query loop calls out to.
///
/// Implementations talk to one external service. They return results in the
/// service's own ranking order and report transport problems as errors; the
/// query loop decides what an error means for the current track.
///
/// # Mocking Support
///
/// When the `mock` feature is enabled, this crate provides
/// `MockSearchProvider` generated by the `mockall` library.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait(?Send)]
pub trait SearchProvider {
    /// Short name used in log lines ("spotify", "youtube").
    fn name(&self) -> &'static str;

    /// Run one query and return at most `limit` results.
    async fn search(&self, query: &str, kind: ResultKind, limit: u32) -> Result<Vec<Candidate>>;

    /// Resolve the name of an artist's official channel, if the service has
    /// such a notion.
    async fn lookup_channel(&self, artist: &str) -> Result<Option<String>> {
        log::debug!("{} has no channel lookup for '{artist}'", self.name());
        Ok(None)
    }
}

#[async_trait(?Send)]
impl<P: SearchProvider + ?Sized> SearchProvider for Box<P> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn search(&self, query: &str, kind: ResultKind, limit: u32) -> Result<Vec<Candidate>> {
        (**self).search(query, kind, limit).await
    }

    async fn lookup_channel(&self, artist: &str) -> Result<Option<String>> {
        (**self).lookup_channel(artist).await
    }
}

/// A catalog that exposes public playlists, used by playlist discovery.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait(?Send)]
pub trait PlaylistSource {
    /// Playlists matching `keyword`, `limit` at a time from `offset`.
    async fn search_playlists(
        &self,
        keyword: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<PlaylistSummary>>;

    /// Every track of one playlist.
    async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Candidate>>;

    /// Popularity (0 to 100) of the best catalog hit for a track.
    async fn track_popularity(&self, artist: &str, title: &str) -> Result<Option<u32>>;
}
