//! Query phrasings, in the order they are tried.
//!
//! Each builder turns a request into one phrasing. The first phrasing is the
//! strictest; later ones loosen the query for services whose search ranks
//! exact field matches poorly.

use crate::normalize::sanitize;
use crate::scoring::ScoringPolicy;
use crate::types::{NormalizedTrack, Query, ResultKind, TrackRequest};

/// Builds one query text from the raw request and its normalized form.
pub type QueryBuilder = fn(&TrackRequest, &NormalizedTrack) -> String;

/// `artist:"Ed Sheeran" track:"Shape of You"`
fn field_filtered(_: &TrackRequest, target: &NormalizedTrack) -> String {
    format!(
        "artist:\"{}\" track:\"{}\"",
        sanitize(target.main_artist()),
        sanitize(&target.title)
    )
}

/// `Ed Sheeran Shape of You`
fn artist_then_title(_: &TrackRequest, target: &NormalizedTrack) -> String {
    format!("{} {}", sanitize(target.main_artist()), sanitize(&target.title))
}

/// `"Shape of You" Ed Sheeran`
fn quoted_title_first(_: &TrackRequest, target: &NormalizedTrack) -> String {
    format!("\"{}\" {}", sanitize(&target.title), sanitize(target.main_artist()))
}

/// Every credited artist, then the title as written in the row.
fn all_artists_raw_title(request: &TrackRequest, target: &NormalizedTrack) -> String {
    format!("{} {}", target.artist_names.join(" "), request.title_raw.trim())
}

/// Same as [`all_artists_raw_title`], biased towards audio-only uploads.
fn all_artists_raw_title_audio(request: &TrackRequest, target: &NormalizedTrack) -> String {
    format!("{} audio", all_artists_raw_title(request, target))
}

/// The ordered phrasing builders for a policy.
pub fn builders(policy: ScoringPolicy) -> &'static [QueryBuilder] {
    match policy {
        ScoringPolicy::Metadata => &[field_filtered, artist_then_title, quoted_title_first],
        ScoringPolicy::Video => &[all_artists_raw_title, all_artists_raw_title_audio],
    }
}

/// The result kind searched for under a policy.
pub fn result_kind(policy: ScoringPolicy) -> ResultKind {
    match policy {
        ScoringPolicy::Metadata => ResultKind::Track,
        ScoringPolicy::Video => ResultKind::Video,
    }
}

/// Build the phrasings for a request, capped at `max_phrasings`.
pub fn build_queries(
    policy: ScoringPolicy,
    request: &TrackRequest,
    target: &NormalizedTrack,
    limit: u32,
    max_phrasings: usize,
) -> Vec<Query> {
    builders(policy)
        .iter()
        .take(max_phrasings)
        .map(|build| Query::new(build(request, target), result_kind(policy), limit))
        .collect()
}
