pub mod cache;
pub mod config;
pub mod discovery;
pub mod error;
pub mod events;
pub mod normalize;
pub mod provider;
pub mod providers;
pub mod queries;
pub mod query_loop;
pub mod rate_limit;
pub mod scoring;
pub mod searcher;
pub mod store;
pub mod types;

pub use cache::{ChannelCache, MatchCache};
pub use config::{DelayPolicy, SearcherConfig, SpotifyCredentials};
pub use discovery::{DiscoveredTrack, DiscoveryConfig, PlaylistDiscovery};
pub use error::MatchError;
pub use events::{create_search_channel, SearchEvent, SearchEventReceiver, SearchEventSender};
pub use normalize::normalize;
pub use provider::{PlaylistSource, SearchProvider};
pub use providers::{SpotifyProvider, YoutubeProvider};
pub use query_loop::{Attempt, QueryLoop};
pub use scoring::{Matcher, ScoringPolicy};
pub use searcher::{ProcessSummary, RowOutcome, RowStatus, TrackSearcher};
pub use store::{JsonFileStore, MemoryStore, ResultSink, RowSource};
pub use types::{Candidate, MatchResult, NormalizedTrack, Query, ResultKind, TrackRequest};

// Re-export mock types when mock feature is enabled
#[cfg(feature = "mock")]
pub use provider::{MockPlaylistSource, MockSearchProvider};

pub type Result<T> = std::result::Result<T, MatchError>;
