//! Data types shared by the normalizer, the scorer and the track searcher.
//!
//! This module contains the request/candidate/result structures that flow
//! through a single matching call, plus the row and field vocabulary used to
//! talk to the row store.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// ================================================================================================
// REQUESTS AND CANDIDATES
// ================================================================================================

/// A raw `(artist, title)` pair as it appears in one playlist row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackRequest {
    /// The artist cell, possibly listing several artists ("A feat. B")
    pub artist_raw: String,
    /// The title cell, possibly carrying a featuring clause
    pub title_raw: String,
}

impl TrackRequest {
    pub fn new(artist: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            artist_raw: artist.into(),
            title_raw: title.into(),
        }
    }
}

impl fmt::Display for TrackRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.artist_raw, self.title_raw)
    }
}

/// The canonical form of a [`TrackRequest`].
///
/// Produced by [`crate::normalize::normalize`]. Artist names keep their
/// original order; the first one is the main artist used for lookups.
///
/// # Examples
///
/// ```rust
/// use playlist_match::normalize::normalize;
///
/// let track = normalize("Ed Sheeran feat. Beyoncé", "Perfect Duet");
/// assert_eq!(track.artist_names, vec!["Ed Sheeran", "Beyoncé"]);
/// assert_eq!(track.main_artist(), "Ed Sheeran");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NormalizedTrack {
    /// One entry per artist, in the order they were listed
    pub artist_names: Vec<String>,
    /// Title with any featuring clause removed
    pub title: String,
}

impl NormalizedTrack {
    /// The first listed artist, or an empty string when there is none.
    pub fn main_artist(&self) -> &str {
        self.artist_names.first().map(String::as_str).unwrap_or("")
    }
}

impl fmt::Display for NormalizedTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.artist_names.join(", "), self.title)
    }
}

/// A single search result being evaluated against a target track.
///
/// Music-service tracks put the first credited artist in `primary_label` and
/// every credited artist in `secondary_labels`; video hits put the channel
/// name in `primary_label`. Anything else the provider knows about the result
/// goes in `source_metadata`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Candidate {
    /// Provider-side identifier, if any
    pub id: Option<String>,
    /// Display title of the result
    pub title: String,
    /// Artist (music service) or channel (video service) name
    pub primary_label: String,
    /// Additional artist names
    pub secondary_labels: BTreeSet<String>,
    /// Extra provider fields (description, album, popularity, ...)
    pub source_metadata: BTreeMap<String, String>,
    /// Link written back to the row when this candidate wins
    pub url: Option<String>,
}

impl Candidate {
    pub fn new(title: impl Into<String>, primary_label: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            primary_label: primary_label.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.secondary_labels.insert(label.into());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        self.source_metadata.insert(key.to_string(), value.into());
        self
    }

    /// Look up an extra provider field.
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.source_metadata.get(key).map(String::as_str)
    }

    /// Primary label followed by every secondary label.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary_label.as_str())
            .chain(self.secondary_labels.iter().map(String::as_str))
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.primary_label, self.title)?;
        if let Some(url) = &self.url {
            write!(f, " <{url}>")?;
        }
        Ok(())
    }
}

/// Outcome of scoring a candidate list against a target.
///
/// `candidate` is present if and only if `score` reached the threshold of the
/// policy that produced this result. A score of 0 with no candidate means
/// nothing acceptable was found, which is a normal outcome.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MatchResult {
    pub score: u8,
    pub candidate: Option<Candidate>,
}

impl MatchResult {
    /// The "nothing acceptable" result.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_match(&self) -> bool {
        self.candidate.is_some()
    }

    /// Link of the accepted candidate, if any.
    pub fn url(&self) -> Option<&str> {
        self.candidate.as_ref().and_then(|c| c.url.as_deref())
    }
}

// ================================================================================================
// QUERIES
// ================================================================================================

/// Which kind of object a search should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultKind {
    /// Music-service track
    Track,
    /// Video upload
    Video,
    /// Video channel
    Channel,
}

impl ResultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultKind::Track => "track",
            ResultKind::Video => "video",
            ResultKind::Channel => "channel",
        }
    }
}

/// One query phrasing sent to a search provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    pub kind: ResultKind,
    pub limit: u32,
}

impl Query {
    pub fn new(text: impl Into<String>, kind: ResultKind, limit: u32) -> Self {
        Self {
            text: text.into(),
            kind,
            limit,
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{} x{}]", self.text, self.kind.as_str(), self.limit)
    }
}

// ================================================================================================
// ROWS AND FIELDS
// ================================================================================================

/// Position of a row in the row store (0-based, header excluded).
pub type RowKey = usize;

/// Token written for boolean `true` cells.
pub const TRUE_TOKEN: &str = "VRAI";
/// Token written for boolean `false` cells.
pub const FALSE_TOKEN: &str = "FAUX";
/// Token written when a value could not be found.
pub const MISSING_TOKEN: &str = "NaN";
/// Link placeholder written when a track failed with an error.
pub const ERROR_LINK: &str = "Erreur";
/// Link placeholder left by older runs for tracks that were not found.
pub const NOT_FOUND_LINK: &str = "Non trouvé";

/// Render a boolean the way the playlist workbook expects it.
pub fn bool_token(value: bool) -> &'static str {
    if value {
        TRUE_TOKEN
    } else {
        FALSE_TOKEN
    }
}

/// The fixed vocabulary of columns this crate reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Field {
    Playlist,
    Artist,
    Title,
    Link,
    Confidence,
    Downloaded,
    Album,
    ReleaseDate,
    Popularity,
    Explicit,
}

impl Field {
    /// Column header used in the playlist workbook.
    pub fn column_name(&self) -> &'static str {
        match self {
            Field::Playlist => "PLAYLIST",
            Field::Artist => "ARTISTE",
            Field::Title => "TITRE",
            Field::Link => "LIEN",
            Field::Confidence => "CONFIANCE",
            Field::Downloaded => "TELECHARGEMENT",
            Field::Album => "ALBUM",
            Field::ReleaseDate => "SORTIE",
            Field::Popularity => "POPULARITE",
            Field::Explicit => "EXPLICITE",
        }
    }

    /// Columns filled in by metadata enrichment.
    pub fn metadata_fields() -> [Field; 4] {
        [
            Field::Album,
            Field::ReleaseDate,
            Field::Popularity,
            Field::Explicit,
        ]
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// Field updates for a single row, rendered as plain strings.
pub type FieldMap = BTreeMap<Field, String>;

/// One row of the playlist, keyed by column header.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaylistRow {
    pub key: RowKey,
    pub values: BTreeMap<String, String>,
}

impl PlaylistRow {
    pub fn new(key: RowKey) -> Self {
        Self {
            key,
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        self.values
            .insert(field.column_name().to_string(), value.into());
        self
    }

    /// The trimmed value of a column, treating blank cells and `NaN` as absent.
    pub fn get(&self, field: Field) -> Option<&str> {
        self.values
            .get(field.column_name())
            .map(|v| v.trim())
            .filter(|v| !v.is_empty() && *v != MISSING_TOKEN)
    }

    /// Build the search request for this row.
    ///
    /// Rows without an artist or a title cannot be searched and are reported
    /// as [`MatchError::MalformedRow`](crate::MatchError::MalformedRow).
    pub fn track_request(&self) -> crate::Result<TrackRequest> {
        let artist = self
            .get(Field::Artist)
            .ok_or_else(|| crate::MatchError::MalformedRow {
                row: self.key,
                reason: "missing artist".to_string(),
            })?;
        let title = self
            .get(Field::Title)
            .ok_or_else(|| crate::MatchError::MalformedRow {
                row: self.key,
                reason: "missing title".to_string(),
            })?;
        Ok(TrackRequest::new(artist, title))
    }

    /// Whether the link column still needs to be resolved.
    pub fn needs_link(&self) -> bool {
        match self.get(Field::Link) {
            None => true,
            Some(link) => link == NOT_FOUND_LINK || link == ERROR_LINK,
        }
    }

    /// Whether any metadata column is still empty.
    pub fn needs_metadata(&self) -> bool {
        Field::metadata_fields()
            .iter()
            .any(|field| self.get(*field).is_none())
    }

    /// Copy field updates into this row.
    pub fn apply(&mut self, updates: &FieldMap) {
        for (field, value) in updates {
            self.values
                .insert(field.column_name().to_string(), value.clone());
        }
    }
}
