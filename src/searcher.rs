use crate::cache::{ChannelCache, MatchCache};
use crate::config::SearcherConfig;
use crate::events::{SearchEventEmitter, SearchEventSender};
use crate::normalize::normalize_request;
use crate::provider::SearchProvider;
use crate::providers::meta;
use crate::queries::build_queries;
use crate::query_loop::QueryLoop;
use crate::rate_limit::Pacer;
use crate::scoring::{Matcher, ScoringPolicy};
use crate::store::ResultSink;
use crate::types::{
    bool_token, Field, FieldMap, MatchResult, NormalizedTrack, PlaylistRow, RowKey, TrackRequest,
    ERROR_LINK, MISSING_TOKEN,
};
use crate::Result;
use serde::{Deserialize, Serialize};

/// How one row ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowStatus {
    /// A candidate reached the threshold
    Matched(MatchResult),
    /// Searched, nothing acceptable
    NotFound,
    /// Every call for this row failed at the transport level
    Failed,
    /// The row lacked an artist or a title
    Skipped(String),
}

/// Per-row outcome handed to the persistence sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowOutcome {
    pub row: RowKey,
    pub status: RowStatus,
}

impl RowOutcome {
    pub fn result(&self) -> Option<&MatchResult> {
        match &self.status {
            RowStatus::Matched(result) => Some(result),
            _ => None,
        }
    }
}

/// Counters for one [`TrackSearcher::process_rows`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSummary {
    pub processed: usize,
    pub matched: usize,
    pub not_found: usize,
    pub failed: usize,
    pub skipped: usize,
    /// External calls issued, channel lookups included
    pub requests: u64,
}

impl ProcessSummary {
    fn record(&mut self, status: &RowStatus) {
        self.processed += 1;
        match status {
            RowStatus::Matched(_) => self.matched += 1,
            RowStatus::NotFound => self.not_found += 1,
            RowStatus::Failed => self.failed += 1,
            RowStatus::Skipped(_) => self.skipped += 1,
        }
    }
}

/// Resolves playlist rows one at a time against a search provider.
///
/// For each row: normalize the request, check the match cache, send the
/// policy's query phrasings through the [`QueryLoop`] until the [`Matcher`]
/// accepts a candidate, and turn the outcome into field updates for a
/// [`ResultSink`]. Rows are processed strictly in order.
///
/// # Examples
///
/// ```rust,no_run
/// # use playlist_match::store::{JsonFileStore, RowSource};
/// # use playlist_match::{SearcherConfig, TrackSearcher, YoutubeProvider};
/// # use playlist_match::types::PlaylistRow;
/// # tokio_test::block_on(async {
/// let http_client = http_client::native::NativeClient::new();
/// let provider = YoutubeProvider::new(Box::new(http_client), "api-key");
/// let mut searcher = TrackSearcher::new(provider, SearcherConfig::video())?;
///
/// let mut store = JsonFileStore::open("rows.json")?;
/// let pending = store.rows_where(PlaylistRow::needs_link);
/// let summary = searcher.process_rows(&pending, &mut store).await?;
/// println!("{} of {} rows matched", summary.matched, summary.processed);
/// # Ok::<(), playlist_match::MatchError>(())
/// # });
/// ```
pub struct TrackSearcher<P> {
    provider: P,
    config: SearcherConfig,
    query_loop: QueryLoop,
    cache: MatchCache,
    channels: ChannelCache,
    batch_pacer: Pacer,
    events: Option<SearchEventSender>,
}

impl<P: SearchProvider> TrackSearcher<P> {
    pub fn new(provider: P, config: SearcherConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            provider,
            query_loop: QueryLoop::from_config(&config),
            cache: MatchCache::new(config.cache.match_capacity),
            channels: ChannelCache::new(config.cache.channel_capacity),
            batch_pacer: Pacer::new(),
            events: None,
            config,
        })
    }

    pub fn with_events(mut self, events: SearchEventSender) -> Self {
        self.query_loop = self.query_loop.with_events(events.clone());
        self.events = Some(events);
        self
    }

    /// Make every randomized pause reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.query_loop = self.query_loop.with_pacer(Pacer::seeded(seed));
        self.batch_pacer = Pacer::seeded(seed.wrapping_add(1));
        self
    }

    pub fn config(&self) -> &SearcherConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn policy(&self) -> ScoringPolicy {
        self.config.scoring.policy
    }

    /// External calls issued so far.
    pub fn request_count(&self) -> u64 {
        self.query_loop.state().request_count
    }

    pub fn cache(&self) -> &MatchCache {
        &self.cache
    }

    /// Find the best acceptable candidate for a request.
    ///
    /// Never fails: transport errors and empty results both end as
    /// [`MatchResult::none`].
    pub async fn find(&mut self, request: &TrackRequest) -> MatchResult {
        let target = normalize_request(request);
        match self.search_target(request, &target).await {
            RowStatus::Matched(result) => result,
            _ => MatchResult::none(),
        }
    }

    async fn search_target(&mut self, request: &TrackRequest, target: &NormalizedTrack) -> RowStatus {
        if let Some(cached) = self.cache.get(target) {
            log::debug!("Cache hit for '{target}'");
            return status_of(cached);
        }

        let channel = match self.policy() {
            ScoringPolicy::Video => self.artist_channel(target.main_artist()).await,
            ScoringPolicy::Metadata => None,
        };
        let matcher = Matcher::new(self.policy(), self.config.scoring.threshold)
            .with_artist_channel(channel.as_deref());

        let queries = build_queries(
            self.policy(),
            request,
            target,
            self.config.search_limit,
            self.config.max_query_phrasings,
        );
        let requests_before = self.request_count();
        let failures_before = self.query_loop.failed_requests();

        let mut best = MatchResult::none();
        self.query_loop
            .search_with_backoff(&self.provider, &queries, |candidates| {
                let result = matcher.best_match(candidates, target);
                let accepted = result.is_match();
                if accepted {
                    best = result;
                }
                accepted
            })
            .await;

        if best.is_match() {
            log::info!("Matched '{target}' (confidence {}): {:?}", best.score, best.url());
            self.cache.insert(target, best.clone());
            return RowStatus::Matched(best);
        }

        // Transport failures are not cached
        let issued = self.request_count() - requests_before;
        let failed = self.query_loop.failed_requests() - failures_before;
        if issued > 0 && failed >= issued {
            log::warn!("All searches failed for '{target}'");
            return RowStatus::Failed;
        }

        log::info!("No acceptable match for '{target}'");
        self.cache.insert(target, MatchResult::none());
        RowStatus::NotFound
    }

    async fn artist_channel(&mut self, artist: &str) -> Option<String> {
        if artist.is_empty() {
            return None;
        }
        if let Some(channel) = self.channels.get(artist) {
            return channel;
        }
        let channel = self.query_loop.lookup_channel(&self.provider, artist).await;
        self.channels.insert(artist, channel.clone());
        channel
    }

    /// Resolve one row, catching everything at the row boundary.
    pub async fn process_row(&mut self, row: &PlaylistRow) -> RowOutcome {
        let status = match row.track_request() {
            Ok(request) => {
                let target = normalize_request(&request);
                self.search_target(&request, &target).await
            }
            Err(error) => {
                log::warn!("Skipping row {}: {error}", row.key);
                RowStatus::Skipped(error.to_string())
            }
        };
        RowOutcome {
            row: row.key,
            status,
        }
    }

    /// The field updates written for an outcome under the active policy.
    pub fn field_updates(&self, outcome: &RowOutcome) -> FieldMap {
        match self.policy() {
            ScoringPolicy::Video => link_updates(&outcome.status),
            ScoringPolicy::Metadata => metadata_updates(outcome.result()),
        }
    }

    /// Process rows in order and write each outcome to `sink`.
    ///
    /// Pauses between batches, saves every `save_every` rows and once at the
    /// end, and cools down after failure bursts. Only sink errors abort the
    /// run.
    pub async fn process_rows<S: ResultSink>(
        &mut self,
        rows: &[PlaylistRow],
        sink: &mut S,
    ) -> Result<ProcessSummary> {
        let batch = self.config.batch;
        let mut summary = ProcessSummary::default();
        log::info!("Processing {} rows with the {:?} policy", rows.len(), self.policy());

        for (index, row) in rows.iter().enumerate() {
            if batch.batch_size > 0 && index > 0 && index % batch.batch_size == 0 {
                let pause = self.batch_pacer.sample(&batch.pause);
                log::info!(
                    "Finished batch {} of {} rows, pausing {:.1}s",
                    index / batch.batch_size,
                    batch.batch_size,
                    pause.as_secs_f64()
                );
                if !pause.is_zero() {
                    self.events.emit_paused(pause.as_millis() as u64, None);
                    tokio::time::sleep(pause).await;
                }
            }

            let outcome = self.process_row(row).await;
            sink.update(outcome.row, &self.field_updates(&outcome))?;
            summary.record(&outcome.status);

            let result = outcome.result();
            self.events.emit_track_resolved(
                outcome.row,
                result.map_or(0, |r| r.score),
                result.and_then(|r| r.url()).map(str::to_string),
            );

            if batch.save_every > 0 && (index + 1) % batch.save_every == 0 {
                log::debug!("Saving after {} rows", index + 1);
                sink.save()?;
            }

            self.query_loop.cooldown_if_needed().await;
        }

        sink.save()?;
        summary.requests = self.request_count();
        log::info!(
            "Done: {} matched, {} not found, {} failed, {} skipped",
            summary.matched,
            summary.not_found,
            summary.failed,
            summary.skipped
        );
        Ok(summary)
    }
}

fn status_of(result: MatchResult) -> RowStatus {
    if result.is_match() {
        RowStatus::Matched(result)
    } else {
        RowStatus::NotFound
    }
}

fn link_updates(status: &RowStatus) -> FieldMap {
    let (link, confidence) = match status {
        RowStatus::Matched(result) => (
            result.url().unwrap_or(MISSING_TOKEN).to_string(),
            result.score.to_string(),
        ),
        RowStatus::Failed => (ERROR_LINK.to_string(), MISSING_TOKEN.to_string()),
        RowStatus::NotFound | RowStatus::Skipped(_) => {
            (MISSING_TOKEN.to_string(), MISSING_TOKEN.to_string())
        }
    };

    let mut fields = FieldMap::new();
    fields.insert(Field::Link, link);
    fields.insert(Field::Confidence, confidence);
    fields.insert(Field::Downloaded, bool_token(false).to_string());
    fields
}

fn metadata_updates(result: Option<&MatchResult>) -> FieldMap {
    let candidate = result.and_then(|r| r.candidate.as_ref());
    [
        (Field::Album, meta::ALBUM),
        (Field::ReleaseDate, meta::RELEASE_DATE),
        (Field::Popularity, meta::POPULARITY),
        (Field::Explicit, meta::EXPLICIT),
    ]
    .into_iter()
    .map(|(field, key)| {
        let value = candidate
            .and_then(|c| c.metadata(key))
            .unwrap_or(MISSING_TOKEN);
        (field, value.to_string())
    })
    .collect()
}
