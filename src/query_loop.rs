use crate::config::{CooldownConfig, DelayPolicy, SearcherConfig};
use crate::events::{SearchEventEmitter, SearchEventSender};
use crate::provider::SearchProvider;
use crate::rate_limit::{select_pause, Pacer, PauseTier, RateState};
use crate::types::{Candidate, Query};
use crate::MatchError;
use chrono::Utc;
use std::time::Duration;

/// Longest `Retry-After` we are willing to honor, in seconds.
const MAX_RETRY_AFTER: u64 = 300;

/// Outcome of sending one phrasing to a provider.
#[derive(Debug)]
pub enum Attempt {
    /// The provider returned at least one result
    Found(Vec<Candidate>),
    /// The provider answered with nothing
    NotFound,
    /// The call failed; treated as "no candidates for this phrasing"
    TransportError(MatchError),
}

impl Attempt {
    pub fn candidates(&self) -> &[Candidate] {
        match self {
            Attempt::Found(candidates) => candidates,
            _ => &[],
        }
    }
}

/// Sends query phrasings to a provider one at a time, pacing every call.
///
/// Owns the [`RateState`] for one external service: a request counter that
/// picks the pause before each call, and a count of consecutive transport
/// failures that triggers a cooldown between tracks.
#[derive(Debug)]
pub struct QueryLoop {
    delays: DelayPolicy,
    cooldown: CooldownConfig,
    max_phrasings: usize,
    state: RateState,
    pacer: Pacer,
    consecutive_failures: u32,
    failed_requests: u64,
    events: Option<SearchEventSender>,
}

impl QueryLoop {
    pub fn new(delays: DelayPolicy, cooldown: CooldownConfig, max_phrasings: usize) -> Self {
        Self {
            delays,
            cooldown,
            max_phrasings: max_phrasings.max(1),
            state: RateState::default(),
            pacer: Pacer::new(),
            consecutive_failures: 0,
            failed_requests: 0,
            events: None,
        }
    }

    pub fn from_config(config: &SearcherConfig) -> Self {
        Self::new(
            config.delays.clone(),
            config.cooldown,
            config.max_query_phrasings,
        )
    }

    /// Use a specific random source for pause lengths.
    pub fn with_pacer(mut self, pacer: Pacer) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn with_events(mut self, events: SearchEventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn state(&self) -> &RateState {
        &self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Calls that ended in an error of any kind, since the loop was created.
    pub fn failed_requests(&self) -> u64 {
        self.failed_requests
    }

    /// Count an external call made outside [`attempt`](Self::attempt) and
    /// apply its pause.
    pub async fn pace(&mut self) -> Duration {
        self.throttle().await
    }

    /// Count the call and apply the pause the delay policy picks for it.
    async fn throttle(&mut self) -> Duration {
        self.state.request_count += 1;
        let (tier, range) = select_pause(&self.delays, self.state.request_count);
        let delay = self.pacer.sample(&range);

        if !delay.is_zero() {
            let tier = match tier {
                PauseTier::Base => None,
                PauseTier::Every(every) => {
                    log::info!(
                        "Request {} hit the every-{every} tier, pausing {:.1}s",
                        self.state.request_count,
                        delay.as_secs_f64()
                    );
                    Some(every)
                }
            };
            self.events.emit_paused(delay.as_millis() as u64, tier);
            tokio::time::sleep(delay).await;
        }

        self.state.last_request_time = Some(Utc::now());
        delay
    }

    /// Only transport errors count towards the cooldown burst.
    fn record_failure(&mut self, query: &str, error: &MatchError) {
        self.failed_requests += 1;
        if !error.is_transport() {
            log::warn!("Search for '{query}' failed: {error}");
            self.events.emit_transport_failed(
                query,
                &error.to_string(),
                self.consecutive_failures,
            );
            return;
        }
        self.consecutive_failures += 1;
        log::warn!(
            "Search for '{query}' failed ({} in a row): {error}",
            self.consecutive_failures
        );
        self.events
            .emit_transport_failed(query, &error.to_string(), self.consecutive_failures);
    }

    /// Send one phrasing to the provider.
    pub async fn attempt<P: SearchProvider + ?Sized>(
        &mut self,
        provider: &P,
        query: &Query,
    ) -> Attempt {
        self.throttle().await;
        self.events
            .emit_request_issued(self.state.request_count, &query.text);
        log::debug!("{} search #{}: {query}", provider.name(), self.state.request_count);

        match provider.search(&query.text, query.kind, query.limit).await {
            Ok(candidates) if candidates.is_empty() => {
                self.consecutive_failures = 0;
                Attempt::NotFound
            }
            Ok(candidates) => {
                self.consecutive_failures = 0;
                log::debug!("'{}' returned {} candidates", query.text, candidates.len());
                Attempt::Found(candidates)
            }
            Err(error) => {
                self.record_failure(&query.text, &error);
                if let MatchError::RateLimit { retry_after } = &error {
                    let wait = (*retry_after).min(MAX_RETRY_AFTER);
                    log::info!("{} asked us to wait {wait}s", provider.name());
                    self.events.emit_paused(wait * 1000, None);
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                }
                Attempt::TransportError(error)
            }
        }
    }

    /// Resolve an artist's channel through the provider, paced like a search.
    ///
    /// Failures are logged and reported as "no channel".
    pub async fn lookup_channel<P: SearchProvider + ?Sized>(
        &mut self,
        provider: &P,
        artist: &str,
    ) -> Option<String> {
        self.throttle().await;
        match provider.lookup_channel(artist).await {
            Ok(channel) => {
                self.consecutive_failures = 0;
                channel
            }
            Err(error) => {
                self.record_failure(artist, &error);
                None
            }
        }
    }

    /// Try phrasings in priority order until `accept` approves a result set.
    ///
    /// Returns the candidates of the first accepted phrasing, or an empty
    /// `Vec` when no phrasing produced an acceptable result. Transport errors
    /// never abort the loop; at most `max_query_phrasings` phrasings are sent.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use playlist_match::{QueryLoop, Query, ResultKind, SearcherConfig};
    /// # async fn run(provider: &dyn playlist_match::SearchProvider) {
    /// let mut query_loop = QueryLoop::from_config(&SearcherConfig::metadata());
    /// let queries = vec![
    ///     Query::new("artist:\"Ed Sheeran\" track:\"Shape of You\"", ResultKind::Track, 10),
    ///     Query::new("Ed Sheeran Shape of You", ResultKind::Track, 10),
    /// ];
    /// let accepted = query_loop
    ///     .search_with_backoff(provider, &queries, |candidates| !candidates.is_empty())
    ///     .await;
    /// # }
    /// ```
    pub async fn search_with_backoff<P, F>(
        &mut self,
        provider: &P,
        queries: &[Query],
        mut accept: F,
    ) -> Vec<Candidate>
    where
        P: SearchProvider + ?Sized,
        F: FnMut(&[Candidate]) -> bool,
    {
        for (index, query) in queries.iter().take(self.max_phrasings).enumerate() {
            match self.attempt(provider, query).await {
                Attempt::Found(candidates) => {
                    if accept(&candidates) {
                        log::debug!("Phrasing {} accepted: {query}", index + 1);
                        return candidates;
                    }
                    log::debug!("Phrasing {} had no acceptable candidate: {query}", index + 1);
                }
                Attempt::NotFound => {
                    log::debug!("Phrasing {} found nothing: {query}", index + 1);
                }
                Attempt::TransportError(_) => {}
            }
        }
        Vec::new()
    }

    /// Whether enough consecutive failures piled up to warrant a cooldown.
    pub fn needs_cooldown(&self) -> bool {
        self.cooldown.failure_burst > 0 && self.consecutive_failures >= self.cooldown.failure_burst
    }

    /// Sleep through the cooldown pause if a failure burst happened.
    ///
    /// Resets the failure count; returns the pause length when one was taken.
    pub async fn cooldown_if_needed(&mut self) -> Option<Duration> {
        if !self.needs_cooldown() {
            return None;
        }
        let failures = self.consecutive_failures;
        let delay = self.pacer.sample(&self.cooldown.pause);
        log::warn!(
            "{failures} consecutive search failures, cooling down for {:.0}s",
            delay.as_secs_f64()
        );
        self.events
            .emit_cooldown_started(delay.as_millis() as u64, failures);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.consecutive_failures = 0;
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DelayRange, DelayTier};
    use crate::types::ResultKind;
    use crate::Result;
    use async_trait::async_trait;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    struct ScriptedProvider {
        responses: RefCell<VecDeque<Result<Vec<Candidate>>>>,
        queries: RefCell<Vec<String>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<Result<Vec<Candidate>>>) -> Self {
            Self {
                responses: RefCell::new(responses.into()),
                queries: RefCell::new(Vec::new()),
            }
        }
    }

    #[async_trait(?Send)]
    impl SearchProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn search(&self, query: &str, _kind: ResultKind, _limit: u32) -> Result<Vec<Candidate>> {
            self.queries.borrow_mut().push(query.to_string());
            self.responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn queries(texts: &[&str]) -> Vec<Query> {
        texts
            .iter()
            .map(|t| Query::new(*t, ResultKind::Track, 10))
            .collect()
    }

    fn quiet_loop(max_phrasings: usize) -> QueryLoop {
        QueryLoop::new(
            DelayPolicy::disabled(),
            CooldownConfig {
                failure_burst: 2,
                pause: DelayRange::new(30.0, 60.0),
            },
            max_phrasings,
        )
        .with_pacer(Pacer::seeded(3))
    }

    #[tokio::test]
    async fn test_stops_at_first_accepted_phrasing() {
        let provider = ScriptedProvider::new(vec![
            Ok(vec![Candidate::new("Perfect", "Ed Sheeran")]),
            Ok(vec![Candidate::new("Shape of You", "Ed Sheeran")]),
            Ok(vec![Candidate::new("never", "reached")]),
        ]);
        let mut query_loop = quiet_loop(3);

        let accepted = query_loop
            .search_with_backoff(&provider, &queries(&["exact", "loose", "title first"]), |c| {
                c.iter().any(|c| c.title == "Shape of You")
            })
            .await;

        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].title, "Shape of You");
        assert_eq!(*provider.queries.borrow(), vec!["exact", "loose"]);
        assert_eq!(query_loop.state().request_count, 2);
        assert!(query_loop.state().last_request_time.is_some());
    }

    #[tokio::test]
    async fn test_transport_error_does_not_abort_loop() {
        let provider = ScriptedProvider::new(vec![
            Err(MatchError::Http("503 Service Unavailable".to_string())),
            Ok(vec![Candidate::new("Shape of You", "Ed Sheeran")]),
        ]);
        let mut query_loop = quiet_loop(3);

        let accepted = query_loop
            .search_with_backoff(&provider, &queries(&["exact", "loose"]), |c| !c.is_empty())
            .await;

        assert_eq!(accepted.len(), 1);
        assert_eq!(query_loop.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn test_nothing_accepted_returns_empty() {
        let provider = ScriptedProvider::new(vec![
            Ok(vec![]),
            Err(MatchError::Parse("bad json".to_string())),
            Ok(vec![Candidate::new("Perfect", "Ed Sheeran")]),
        ]);
        let mut query_loop = quiet_loop(3);

        let accepted = query_loop
            .search_with_backoff(&provider, &queries(&["a", "b", "c"]), |_| false)
            .await;

        assert!(accepted.is_empty());
        assert_eq!(provider.queries.borrow().len(), 3);
    }

    #[tokio::test]
    async fn test_max_phrasings_caps_calls() {
        let provider = ScriptedProvider::new(vec![]);
        let mut query_loop = quiet_loop(2);

        query_loop
            .search_with_backoff(&provider, &queries(&["a", "b", "c"]), |_| true)
            .await;

        assert_eq!(*provider.queries.borrow(), vec!["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_burst_triggers_cooldown() {
        let provider = ScriptedProvider::new(vec![
            Err(MatchError::Http("403 Forbidden".to_string())),
            Err(MatchError::Http("403 Forbidden".to_string())),
        ]);
        let mut query_loop = quiet_loop(2);

        query_loop
            .search_with_backoff(&provider, &queries(&["a", "b"]), |_| true)
            .await;
        assert!(query_loop.needs_cooldown());

        let start = tokio::time::Instant::now();
        let pause = query_loop.cooldown_if_needed().await.unwrap();
        assert!(pause >= Duration::from_secs(30));
        assert!(start.elapsed() >= Duration::from_secs(30));
        assert_eq!(query_loop.consecutive_failures(), 0);
        assert!(query_loop.cooldown_if_needed().await.is_none());
    }

    #[tokio::test]
    async fn test_credential_errors_do_not_start_a_cooldown() {
        let provider = ScriptedProvider::new(vec![
            Err(MatchError::Auth("invalid access token".to_string())),
            Err(MatchError::Auth("invalid access token".to_string())),
            Err(MatchError::Http("status 500: oops".to_string())),
        ]);
        let mut query_loop = quiet_loop(3);

        query_loop
            .search_with_backoff(&provider, &queries(&["a", "b", "c"]), |_| true)
            .await;

        assert_eq!(query_loop.failed_requests(), 3);
        assert_eq!(query_loop.consecutive_failures(), 1);
        assert!(!query_loop.needs_cooldown());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tiered_pauses_follow_request_counter() {
        let provider = ScriptedProvider::new(vec![]);
        let delays = DelayPolicy {
            base: DelayRange::zero(),
            tiers: vec![DelayTier::new(3, 5.0, 5.0)],
        };
        let (sender, mut receiver) = crate::events::create_search_channel();
        let mut query_loop = QueryLoop::new(
            delays,
            CooldownConfig {
                failure_burst: 0,
                pause: DelayRange::zero(),
            },
            1,
        )
        .with_events(sender);

        let start = tokio::time::Instant::now();
        for _ in 0..3 {
            query_loop
                .attempt(&provider, &Query::new("q", ResultKind::Track, 1))
                .await;
        }
        assert!(start.elapsed() >= Duration::from_secs(5));

        let mut pauses = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            if let crate::events::SearchEvent::Paused { delay_ms, tier, .. } = event {
                pauses.push((delay_ms, tier));
            }
        }
        assert_eq!(pauses, vec![(5000, Some(3))]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_error_waits_retry_after() {
        let provider = ScriptedProvider::new(vec![Err(MatchError::RateLimit { retry_after: 7 })]);
        let mut query_loop = quiet_loop(1);

        let start = tokio::time::Instant::now();
        let attempt = query_loop
            .attempt(&provider, &Query::new("q", ResultKind::Track, 1))
            .await;
        assert!(matches!(attempt, Attempt::TransportError(MatchError::RateLimit { .. })));
        assert!(start.elapsed() >= Duration::from_secs(7));
    }
}
