//! HTTP implementations of [`SearchProvider`](crate::SearchProvider).
//!
//! Both providers take any [`http_client::HttpClient`] so the transport can be
//! swapped (curl, wasm, or a recording client in tests).

pub mod spotify;
pub mod youtube;

pub use spotify::{PlaylistSummary, SpotifyProvider};
pub use youtube::YoutubeProvider;

use crate::{MatchError, Result};
use http_types::Response;

/// Keys of [`Candidate::source_metadata`](crate::Candidate) filled in by the providers.
pub mod meta {
    pub const ALBUM: &str = "album";
    pub const RELEASE_DATE: &str = "release_date";
    pub const POPULARITY: &str = "popularity";
    pub const EXPLICIT: &str = "explicit";
    pub const DESCRIPTION: &str = "description";
    pub const PUBLISHED_TIME: &str = "published_time";
    /// Every credited artist in credit order, joined with ", "
    pub const ARTISTS: &str = "artists";
}

/// Seconds to wait when a 429 carries no usable `Retry-After`.
const DEFAULT_RETRY_AFTER: u64 = 60;

/// Read a response body, mapping error statuses onto [`MatchError`].
pub(crate) async fn read_body(mut response: Response) -> Result<String> {
    let status: u16 = response.status().into();

    if status == 429 {
        let retry_after = response
            .header("Retry-After")
            .and_then(|values| values.as_str().trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER);
        return Err(MatchError::RateLimit { retry_after });
    }

    let body = response
        .body_string()
        .await
        .map_err(|e| MatchError::Http(e.to_string()))?;

    match status {
        200..=299 => Ok(body),
        401 => Err(MatchError::Auth(error_excerpt(&body))),
        _ => Err(MatchError::Http(format!(
            "status {status}: {}",
            error_excerpt(&body)
        ))),
    }
}

fn error_excerpt(body: &str) -> String {
    body.chars().take(200).collect()
}
