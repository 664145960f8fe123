//! Confidence scoring of search candidates against a normalized track.
//!
//! Two policies share the same containment rules:
//!
//! * [`ScoringPolicy::Metadata`] for music-service track searches: artist and
//!   title agreement, 0 to 3, accepted from 2.
//! * [`ScoringPolicy::Video`] for video searches: title agreement plus channel
//!   provenance, 0 to 4, accepted from 3. Auto-generated "Topic" uploads rank
//!   one tier above ordinary uploads.
//!
//! These are heuristics. False positives and negatives are expected.

use crate::normalize::compact;
use crate::types::{Candidate, MatchResult, NormalizedTrack};
use serde::{Deserialize, Serialize};

/// Substrings marking an upload as coming from an automated label pipeline.
pub const AUTO_GENERATED_MARKERS: [&str; 3] = ["- Topic", "Auto-generated", "Provided to YouTube"];

/// Which scoring rules to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringPolicy {
    /// Music-service metadata search
    Metadata,
    /// Video search with provenance signal
    Video,
}

impl ScoringPolicy {
    /// The empirically chosen acceptance threshold for this policy.
    pub fn default_threshold(&self) -> u8 {
        match self {
            ScoringPolicy::Metadata => 2,
            ScoringPolicy::Video => 3,
        }
    }
}

/// Scores candidates for one target under one policy.
///
/// # Examples
///
/// ```rust
/// use playlist_match::normalize::normalize;
/// use playlist_match::scoring::{Matcher, ScoringPolicy};
/// use playlist_match::Candidate;
///
/// let target = normalize("Ed Sheeran", "Shape of You");
/// let matcher = Matcher::for_policy(ScoringPolicy::Metadata);
/// let result = matcher.best_match(&[Candidate::new("Shape of You", "Ed Sheeran")], &target);
/// assert_eq!(result.score, 3);
/// assert!(result.is_match());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matcher {
    policy: ScoringPolicy,
    threshold: u8,
    artist_channel: Option<String>,
}

impl Matcher {
    /// Create a matcher with an explicit threshold (at least 1).
    pub fn new(policy: ScoringPolicy, threshold: u8) -> Self {
        Self {
            policy,
            threshold: threshold.max(1),
            artist_channel: None,
        }
    }

    /// Create a matcher with the policy's default threshold.
    pub fn for_policy(policy: ScoringPolicy) -> Self {
        Self::new(policy, policy.default_threshold())
    }

    /// Set the artist's official channel name used for exact channel matches.
    pub fn with_artist_channel(mut self, channel: Option<&str>) -> Self {
        self.artist_channel = channel.map(compact).filter(|c| !c.is_empty());
        self
    }

    pub fn policy(&self) -> ScoringPolicy {
        self.policy
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn accepts(&self, score: u8) -> bool {
        score >= self.threshold
    }

    /// Confidence score of a single candidate.
    pub fn score(&self, candidate: &Candidate, target: &NormalizedTrack) -> u8 {
        match self.policy {
            ScoringPolicy::Metadata => metadata_score(candidate, target),
            ScoringPolicy::Video => self.video_score(candidate, target),
        }
    }

    /// Pick the highest-scoring candidate; the first one wins ties.
    ///
    /// Returns [`MatchResult::none`] when the list is empty or the best score
    /// is below the threshold.
    pub fn best_match(&self, candidates: &[Candidate], target: &NormalizedTrack) -> MatchResult {
        let mut best_score = 0;
        let mut best: Option<&Candidate> = None;

        for candidate in candidates {
            let score = self.score(candidate, target);
            log::debug!("Scored {score} for '{candidate}' against '{target}'");
            if score > best_score {
                best_score = score;
                best = Some(candidate);
            }
        }

        match best {
            Some(candidate) if self.accepts(best_score) => MatchResult {
                score: best_score,
                candidate: Some(candidate.clone()),
            },
            _ => MatchResult::none(),
        }
    }

    fn video_score(&self, candidate: &Candidate, target: &NormalizedTrack) -> u8 {
        if !title_matches(&candidate.title, target) {
            return 0;
        }

        let channel = compact(&candidate.primary_label);
        let expected_channel = self
            .artist_channel
            .clone()
            .unwrap_or_else(|| compact(target.main_artist()));
        let exact_channel = !channel.is_empty() && channel == expected_channel;
        let channel_contains_artist = target.artist_names.iter().any(|artist| {
            let artist = compact(artist);
            !artist.is_empty() && channel.contains(&artist)
        });

        match (is_auto_generated(candidate), exact_channel, channel_contains_artist) {
            (true, true, _) => 4,
            (true, false, true) => 3,
            (false, true, _) => 2,
            (false, false, true) => 1,
            _ => 0,
        }
    }
}

fn metadata_score(candidate: &Candidate, target: &NormalizedTrack) -> u8 {
    match (
        artist_matches(candidate, target),
        title_matches(&candidate.title, target),
    ) {
        (true, true) => 3,
        (true, false) => 2,
        (false, true) => 1,
        (false, false) => 0,
    }
}

/// Whether either string contains the other. Empty strings never match.
pub fn contains_either(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a.contains(b) || b.contains(a))
}

/// Whether the target's main artist and any candidate label contain one another.
pub fn artist_matches(candidate: &Candidate, target: &NormalizedTrack) -> bool {
    let main_artist = compact(target.main_artist());
    candidate
        .labels()
        .any(|label| contains_either(&main_artist, &compact(label)))
}

/// Whether the target title and a candidate title contain one another.
pub fn title_matches(candidate_title: &str, target: &NormalizedTrack) -> bool {
    contains_either(&compact(&target.title), &compact(candidate_title))
}

/// Whether a candidate looks like an auto-generated label upload.
pub fn is_auto_generated(candidate: &Candidate) -> bool {
    std::iter::once(candidate.primary_label.as_str())
        .chain(candidate.source_metadata.values().map(String::as_str))
        .any(|text| AUTO_GENERATED_MARKERS.iter().any(|marker| text.contains(marker)))
}
