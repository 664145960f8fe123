use crate::normalize::compact;
use crate::types::{MatchResult, NormalizedTrack};
use lru::LruCache;
use std::num::NonZeroUsize;

/// Cache key: compact main artist and compact title.
pub type MatchKey = (String, String);

/// Build the cache key for a normalized track.
pub fn match_key(track: &NormalizedTrack) -> MatchKey {
    (compact(track.main_artist()), compact(&track.title))
}

/// Bounded least-recently-used cache of match results.
///
/// A capacity of 0 disables the cache: lookups always miss and inserts are
/// dropped. Both hits and "nothing found" outcomes are cached.
pub struct MatchCache {
    entries: Option<LruCache<MatchKey, MatchResult>>,
}

impl MatchCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(LruCache::new),
        }
    }

    pub fn get(&mut self, track: &NormalizedTrack) -> Option<MatchResult> {
        let entries = self.entries.as_mut()?;
        entries.get(&match_key(track)).cloned()
    }

    pub fn insert(&mut self, track: &NormalizedTrack, result: MatchResult) {
        if let Some(entries) = self.entries.as_mut() {
            entries.put(match_key(track), result);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, LruCache::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for MatchCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchCache")
            .field("len", &self.len())
            .field("capacity", &self.entries.as_ref().map(|e| e.cap().get()))
            .finish()
    }
}

/// Bounded cache of resolved artist channel names, keyed by compact artist.
///
/// Stores `None` too, so an artist without a channel is looked up once.
pub struct ChannelCache {
    entries: Option<LruCache<String, Option<String>>>,
}

impl ChannelCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(LruCache::new),
        }
    }

    /// `Some(channel)` on a hit, where `channel` may itself be `None`.
    pub fn get(&mut self, artist: &str) -> Option<Option<String>> {
        let entries = self.entries.as_mut()?;
        entries.get(&compact(artist)).cloned()
    }

    pub fn insert(&mut self, artist: &str, channel: Option<String>) {
        if let Some(entries) = self.entries.as_mut() {
            entries.put(compact(artist), channel);
        }
    }
}

impl std::fmt::Debug for ChannelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelCache")
            .field("len", &self.entries.as_ref().map_or(0, LruCache::len))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::types::Candidate;

    fn hit(score: u8) -> MatchResult {
        MatchResult {
            score,
            candidate: Some(Candidate::new("t", "a")),
        }
    }

    #[test]
    fn test_key_ignores_formatting() {
        assert_eq!(
            match_key(&normalize("Ed Sheeran", "Shape of You")),
            match_key(&normalize("ed  sheeran", "Shape Of You!"))
        );
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let mut cache = MatchCache::new(2);
        let a = normalize("A", "one");
        let b = normalize("B", "two");
        let c = normalize("C", "three");

        cache.insert(&a, hit(3));
        cache.insert(&b, hit(2));
        // touch `a` so `b` becomes the eviction candidate
        assert!(cache.get(&a).is_some());
        cache.insert(&c, MatchResult::none());

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&b).is_none());
        assert_eq!(cache.get(&a).unwrap().score, 3);
        assert_eq!(cache.get(&c), Some(MatchResult::none()));
    }

    #[test]
    fn test_zero_capacity_disables_cache() {
        let mut cache = MatchCache::new(0);
        let a = normalize("A", "one");
        cache.insert(&a, hit(3));
        assert!(cache.get(&a).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_channel_cache_remembers_misses() {
        let mut cache = ChannelCache::new(4);
        assert_eq!(cache.get("Ed Sheeran"), None);
        cache.insert("Ed Sheeran", None);
        assert_eq!(cache.get("ed sheeran"), Some(None));
        cache.insert("Stromae", Some("Stromae".to_string()));
        assert_eq!(cache.get("Stromae"), Some(Some("Stromae".to_string())));
    }
}
