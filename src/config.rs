//! Searcher configuration and credentials.
//!
//! Every tunable of the matching pipeline lives in [`SearcherConfig`], which is
//! passed to [`TrackSearcher`](crate::TrackSearcher) at construction time. The
//! thresholds and delay tiers are empirical defaults; two presets mirror the
//! quotas of the two services the searcher talks to.

use crate::scoring::ScoringPolicy;
use crate::{MatchError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ================================================================================================
// DELAYS
// ================================================================================================

/// Longest pause any delay range may ask for, in seconds.
pub const MAX_DELAY_SECS: f64 = 3600.0;

/// A randomized pause, in seconds, drawn uniformly from `min_secs..=max_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_secs: f64,
    pub max_secs: f64,
}

impl DelayRange {
    pub const fn new(min_secs: f64, max_secs: f64) -> Self {
        Self { min_secs, max_secs }
    }

    /// A range that never pauses.
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0)
    }

    pub fn is_zero(&self) -> bool {
        self.max_secs <= 0.0
    }

    /// Reject ranges that are inverted, negative, non-finite or longer than
    /// [`MAX_DELAY_SECS`].
    pub fn validate(&self, name: &str) -> Result<()> {
        let bounds_ok = self.min_secs.is_finite()
            && self.max_secs.is_finite()
            && self.min_secs >= 0.0
            && self.min_secs <= self.max_secs
            && self.max_secs <= MAX_DELAY_SECS;
        if !bounds_ok {
            return Err(MatchError::Config(format!(
                "{name}: invalid range {}..{} (expected 0 <= min <= max <= {MAX_DELAY_SECS})",
                self.min_secs, self.max_secs
            )));
        }
        Ok(())
    }
}

/// A pause applied when the request counter is a multiple of `every`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayTier {
    pub every: u64,
    pub pause: DelayRange,
}

impl DelayTier {
    pub const fn new(every: u64, min_secs: f64, max_secs: f64) -> Self {
        Self {
            every,
            pause: DelayRange::new(min_secs, max_secs),
        }
    }
}

/// Pauses applied before each external call, keyed on the request counter.
///
/// When several tiers divide the counter, the one with the largest `every`
/// wins. When none does, `base` applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayPolicy {
    pub base: DelayRange,
    pub tiers: Vec<DelayTier>,
}

impl DelayPolicy {
    /// Spotify Web API pacing.
    pub fn metadata() -> Self {
        Self {
            base: DelayRange::new(0.1, 0.3),
            tiers: vec![DelayTier::new(20, 1.0, 2.0), DelayTier::new(100, 5.0, 10.0)],
        }
    }

    /// Video search pacing, slower to avoid 403 blocks.
    pub fn video() -> Self {
        Self {
            base: DelayRange::new(0.5, 1.5),
            tiers: vec![DelayTier::new(10, 2.0, 4.0), DelayTier::new(50, 10.0, 15.0)],
        }
    }

    /// No pauses at all.
    pub fn disabled() -> Self {
        Self {
            base: DelayRange::zero(),
            tiers: vec![],
        }
    }
}

/// Extended pause after a burst of consecutive transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CooldownConfig {
    /// Consecutive failed calls that trigger the cooldown
    pub failure_burst: u32,
    pub pause: DelayRange,
}

/// Batch pacing and periodic saving while processing rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Rows per batch (0 disables batching)
    pub batch_size: usize,
    /// Pause between batches
    pub pause: DelayRange,
    /// Save the row store every N processed rows (0 saves only at the end)
    pub save_every: usize,
}

/// Capacities of the in-memory LRU caches (0 disables a cache).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub match_capacity: usize,
    pub channel_capacity: usize,
}

/// Scoring policy and its acceptance threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub policy: ScoringPolicy,
    pub threshold: u8,
}

impl ScoringConfig {
    pub fn for_policy(policy: ScoringPolicy) -> Self {
        Self {
            policy,
            threshold: policy.default_threshold(),
        }
    }
}

// ================================================================================================
// SEARCHER CONFIGURATION
// ================================================================================================

/// Unified configuration for a [`TrackSearcher`](crate::TrackSearcher).
///
/// # Examples
///
/// ```rust
/// use playlist_match::config::{DelayPolicy, SearcherConfig};
///
/// let config = SearcherConfig::video()
///     .with_threshold(2)
///     .with_delay_policy(DelayPolicy::disabled())
///     .with_max_query_phrasings(1);
/// assert_eq!(config.scoring.threshold, 2);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearcherConfig {
    pub scoring: ScoringConfig,
    pub delays: DelayPolicy,
    pub cooldown: CooldownConfig,
    pub batch: BatchConfig,
    pub cache: CacheConfig,
    /// Upper bound on phrasings tried per track
    pub max_query_phrasings: usize,
    /// Results requested per phrasing
    pub search_limit: u32,
}

impl Default for SearcherConfig {
    fn default() -> Self {
        Self::metadata()
    }
}

impl SearcherConfig {
    /// Preset for music-service metadata enrichment.
    pub fn metadata() -> Self {
        Self {
            scoring: ScoringConfig::for_policy(ScoringPolicy::Metadata),
            delays: DelayPolicy::metadata(),
            cooldown: CooldownConfig {
                failure_burst: 3,
                pause: DelayRange::new(2.0, 5.0),
            },
            batch: BatchConfig {
                batch_size: 0,
                pause: DelayRange::zero(),
                save_every: 10,
            },
            cache: CacheConfig {
                match_capacity: 1000,
                channel_capacity: 0,
            },
            max_query_phrasings: 3,
            search_limit: 10,
        }
    }

    /// Preset for video link resolution.
    pub fn video() -> Self {
        Self {
            scoring: ScoringConfig::for_policy(ScoringPolicy::Video),
            delays: DelayPolicy::video(),
            cooldown: CooldownConfig {
                failure_burst: 3,
                pause: DelayRange::new(30.0, 60.0),
            },
            batch: BatchConfig {
                batch_size: 10,
                pause: DelayRange::new(3.0, 5.0),
                save_every: 5,
            },
            cache: CacheConfig {
                match_capacity: 500,
                channel_capacity: 500,
            },
            max_query_phrasings: 2,
            search_limit: 3,
        }
    }

    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.scoring.threshold = threshold;
        self
    }

    pub fn with_delay_policy(mut self, delays: DelayPolicy) -> Self {
        self.delays = delays;
        self
    }

    pub fn with_cooldown(mut self, failure_burst: u32, pause: DelayRange) -> Self {
        self.cooldown = CooldownConfig {
            failure_burst,
            pause,
        };
        self
    }

    pub fn with_batch(mut self, batch: BatchConfig) -> Self {
        self.batch = batch;
        self
    }

    pub fn with_cache_capacity(mut self, match_capacity: usize, channel_capacity: usize) -> Self {
        self.cache = CacheConfig {
            match_capacity,
            channel_capacity,
        };
        self
    }

    pub fn with_max_query_phrasings(mut self, max: usize) -> Self {
        self.max_query_phrasings = max;
        self
    }

    pub fn with_search_limit(mut self, limit: u32) -> Self {
        self.search_limit = limit;
        self
    }

    /// Strip every pause, for dry runs and tests.
    pub fn without_delays(mut self) -> Self {
        self.delays = DelayPolicy::disabled();
        self.cooldown.pause = DelayRange::zero();
        self.batch.pause = DelayRange::zero();
        self
    }

    /// Reject values the searcher cannot work with.
    pub fn validate(&self) -> Result<()> {
        let ranges = std::iter::once(("delays.base", &self.delays.base))
            .chain(self.delays.tiers.iter().map(|t| ("delays.tiers", &t.pause)))
            .chain(std::iter::once(("cooldown.pause", &self.cooldown.pause)))
            .chain(std::iter::once(("batch.pause", &self.batch.pause)));
        for (name, range) in ranges {
            range.validate(name)?;
        }
        if self.delays.tiers.iter().any(|t| t.every == 0) {
            return Err(MatchError::Config(
                "delays.tiers: `every` must be positive".to_string(),
            ));
        }
        if self.max_query_phrasings == 0 {
            return Err(MatchError::Config(
                "max_query_phrasings must be at least 1".to_string(),
            ));
        }
        if self.search_limit == 0 {
            return Err(MatchError::Config("search_limit must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Layer a config file and `PLAYLIST_MATCH__*` environment overrides on
    /// top of a preset.
    ///
    /// Without an explicit path the default file
    /// (`~/.config/playlist-match/config.toml`) is used when it exists.
    pub fn load(preset: SearcherConfig, path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder().add_source(config::Config::try_from(&preset)?);

        match path {
            Some(path) => {
                builder = builder.add_source(config::File::from(path).required(true));
            }
            None => {
                if let Some(default_path) = Self::default_path().filter(|p| p.exists()) {
                    log::debug!("Using config file {}", default_path.display());
                    builder = builder.add_source(config::File::from(default_path));
                }
            }
        }

        let loaded: SearcherConfig = builder
            .add_source(
                config::Environment::with_prefix("PLAYLIST_MATCH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// `~/.config/playlist-match/config.toml` (platform equivalent).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("playlist-match").join("config.toml"))
    }
}

// ================================================================================================
// CREDENTIALS
// ================================================================================================

/// Client-credentials pair for the Spotify Web API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl SpotifyCredentials {
    /// Read `SPOTIFY_CLIENT_ID` / `SPOTIFY_CLIENT_SECRET`.
    pub fn from_env() -> Result<Self> {
        let client_id = std::env::var("SPOTIFY_CLIENT_ID")
            .map_err(|_| MatchError::Config("SPOTIFY_CLIENT_ID is not set".to_string()))?;
        let client_secret = std::env::var("SPOTIFY_CLIENT_SECRET")
            .map_err(|_| MatchError::Config("SPOTIFY_CLIENT_SECRET is not set".to_string()))?;
        Ok(Self {
            client_id,
            client_secret,
        })
    }

    /// Read a `{"client_id": .., "client_secret": ..}` JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let credentials: Self = serde_json::from_str(&json)?;
        Ok(credentials)
    }

    /// Prefer the file when given, otherwise the environment.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::from_env(),
        }
    }
}

/// Read `YOUTUBE_API_KEY`.
pub fn youtube_api_key() -> Result<String> {
    std::env::var("YOUTUBE_API_KEY")
        .map_err(|_| MatchError::Config("YOUTUBE_API_KEY is not set".to_string()))
}
