//! Canonicalization of artist and title cells.
//!
//! Playlist rows come from hand-edited spreadsheets and streaming-service
//! exports, so the same track shows up as "Drake ft. Future", "Drake & Future"
//! or "Drake; Future". Everything here is pure and idempotent.

use crate::types::{NormalizedTrack, TrackRequest};
use once_cell::sync::Lazy;
use regex::Regex;

/// Parenthesized asides in artist cells: "Drake (feat. remix)".
static PARENTHESIZED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(.*?\)").unwrap());

/// Separators between credited artists, replaced by a comma in order.
static ARTIST_SEPARATORS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)\s+feat\.?\s+").unwrap(),
        Regex::new(r"(?i)\s+ft\.?\s+").unwrap(),
        Regex::new(r"(?i)\s+avec\s+").unwrap(),
        Regex::new(r"(?i)\s+et\s+").unwrap(),
        Regex::new(r"\s*&\s*").unwrap(),
        Regex::new(r"\s*;\s*").unwrap(),
    ]
});

/// Start of a featuring clause in a title: "Song (feat. X)", "Song - with Y".
static TITLE_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*[\(\[\-]?\s*\b(?:feat|ft|with|avec|et)\b").unwrap()
});

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s\-]").unwrap());

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Normalize a raw `(artist, title)` pair.
///
/// # Examples
///
/// ```rust
/// use playlist_match::normalize::normalize;
///
/// let track = normalize("Drake (OVO) ft. Future", "Life Is Good (feat. Future)");
/// assert_eq!(track.artist_names, vec!["Drake", "Future"]);
/// assert_eq!(track.title, "Life Is Good");
/// ```
pub fn normalize(raw_artist: &str, raw_title: &str) -> NormalizedTrack {
    NormalizedTrack {
        artist_names: normalize_artists(raw_artist),
        title: normalize_title(raw_title),
    }
}

/// Normalize a whole [`TrackRequest`].
pub fn normalize_request(request: &TrackRequest) -> NormalizedTrack {
    normalize(&request.artist_raw, &request.title_raw)
}

/// Split an artist cell into the ordered list of credited artists.
///
/// With no separator the list holds exactly one element, the trimmed cell.
pub fn normalize_artists(raw_artist: &str) -> Vec<String> {
    let mut artist = PARENTHESIZED.replace_all(raw_artist, "").into_owned();
    for separator in ARTIST_SEPARATORS.iter() {
        artist = separator.replace_all(&artist, ",").into_owned();
    }
    let artist = artist.trim();

    if !artist.contains(',') {
        return vec![collapse_whitespace(artist)];
    }

    let names: Vec<String> = artist
        .split(',')
        .map(collapse_whitespace)
        .filter(|name| !name.is_empty())
        .collect();

    if names.is_empty() {
        vec![String::new()]
    } else {
        names
    }
}

/// Strip a trailing featuring clause from a title.
///
/// A marker word opening the title ("With or Without You", "Et si tu
/// n'existais pas") is part of the name; only a later marker starts the
/// clause.
pub fn normalize_title(raw_title: &str) -> String {
    let title = raw_title.trim();
    let cut = TITLE_MARKER
        .find_iter(title)
        .map(|m| m.start())
        .find(|&start| start > 0)
        .unwrap_or(title.len());
    let kept = collapse_whitespace(&title[..cut]);
    if kept.is_empty() {
        collapse_whitespace(title)
    } else {
        kept
    }
}

/// Drop punctuation (everything but word characters, whitespace and hyphens)
/// and collapse whitespace.
pub fn sanitize(s: &str) -> String {
    collapse_whitespace(&NON_WORD.replace_all(s, ""))
}

/// The comparison key: sanitized, without any whitespace, lower-cased.
///
/// ```rust
/// use playlist_match::normalize::compact;
///
/// assert_eq!(compact("The Weeknd!"), "theweeknd");
/// ```
pub fn compact(s: &str) -> String {
    sanitize(s)
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn collapse_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parenthesized_asides_removed_from_artist() {
        assert_eq!(normalize_artists("Drake (feat. remix)"), vec!["Drake"]);
        assert_eq!(
            normalize_artists("Stromae (live) & Angèle (solo)"),
            vec!["Stromae", "Angèle"]
        );
    }

    #[test]
    fn test_separator_forms() {
        for raw in ["A feat. B", "A feat B", "A ft B", "A ft. B", "A FEAT. B", "A & B", "A&B", "A et B", "A avec B", "A; B", "A;B"] {
            assert_eq!(normalize_artists(raw), vec!["A", "B"], "input: {raw}");
        }
    }

    #[test]
    fn test_separator_needs_word_boundaries() {
        // "et" inside a name is not a separator
        assert_eq!(normalize_artists("Petit Biscuit"), vec!["Petit Biscuit"]);
        assert_eq!(normalize_artists("Mafeat Band"), vec!["Mafeat Band"]);
    }

    #[test]
    fn test_comma_lists_keep_order() {
        assert_eq!(
            normalize_artists(" Drake,  Travis Scott , Future "),
            vec!["Drake", "Travis Scott", "Future"]
        );
    }

    #[test]
    fn test_single_artist_is_one_element() {
        assert_eq!(normalize_artists("  Ed Sheeran "), vec!["Ed Sheeran"]);
        assert_eq!(normalize_artists(""), vec![""]);
    }

    #[test]
    fn test_title_featuring_clause_removed() {
        assert_eq!(normalize_title("Blinding Lights (feat. X)"), "Blinding Lights");
        assert_eq!(normalize_title("Bad Habits [ft. Someone]"), "Bad Habits");
        assert_eq!(normalize_title("Peaches - with Daniel Caesar"), "Peaches");
        assert_eq!(normalize_title("Tout va bien avec Orelsan"), "Tout va bien");
        assert_eq!(normalize_title("Shape of You"), "Shape of You");
    }

    #[test]
    fn test_title_marker_inside_word_is_kept() {
        assert_eq!(normalize_title("Left Outside Alone"), "Left Outside Alone");
        assert_eq!(normalize_title("Soft Cell"), "Soft Cell");
    }

    #[test]
    fn test_title_starting_with_marker_is_kept() {
        assert_eq!(normalize_title("With or Without You"), "With or Without You");
        assert_eq!(
            normalize_title("Et si tu n'existais pas (feat. X)"),
            "Et si tu n'existais pas"
        );
        assert_eq!(normalize_title("With You - with Someone"), "With You");
    }

    #[test]
    fn test_idempotence() {
        let inputs = [
            ("Drake (OVO) ft. Future & Young Thug", "Life Is Good (feat. Future)"),
            ("Ed Sheeran", "Shape of You"),
            ("Angèle; Roméo Elvis", "Tout oublier - avec Roméo"),
            ("The Weeknd", "With or Without You"),
        ];
        for (artist, title) in inputs {
            let once = normalize(artist, title);
            let twice = normalize(&once.artist_names.join(", "), &once.title);
            assert_eq!(once, twice, "input: {artist} / {title}");
        }
    }

    #[test]
    fn test_sanitize_and_compact() {
        assert_eq!(sanitize("  Don't   Stop (Me Now)! "), "Dont Stop Me Now");
        assert_eq!(sanitize("Jay-Z"), "Jay-Z");
        assert_eq!(compact("Don't Stop Me Now"), "dontstopmenow");
        assert_eq!(compact("Beyoncé"), "beyoncé");
        assert_eq!(compact(&compact("The Weeknd")), compact("The Weeknd"));
    }
}
