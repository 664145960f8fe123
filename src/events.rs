//! # Search Events
//!
//! A broadcast channel of events emitted by the query loop and the track
//! searcher, so a front end can show progress or react to pauses without the
//! library printing anything itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events emitted while searching for tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SearchEvent {
    /// An external search call is about to be issued.
    RequestIssued {
        timestamp: DateTime<Utc>,
        /// Value of the request counter for this call (1-based)
        request_count: u64,
        /// The phrasing being sent
        query: String,
    },
    /// A rate-limiting pause is starting.
    Paused {
        timestamp: DateTime<Utc>,
        /// Pause length in milliseconds
        delay_ms: u64,
        /// Interval of the tier that triggered the pause, `None` for the base pause
        tier: Option<u64>,
    },
    /// A search call failed; the phrasing counts as having no candidates.
    TransportFailed {
        timestamp: DateTime<Utc>,
        query: String,
        error: String,
        /// Consecutive failures so far, including this one
        consecutive_failures: u32,
    },
    /// A burst of failures triggered an extended cooldown.
    CooldownStarted {
        timestamp: DateTime<Utc>,
        delay_ms: u64,
        failures: u32,
    },
    /// A track finished processing.
    TrackResolved {
        timestamp: DateTime<Utc>,
        /// Row key of the track
        row: usize,
        /// Confidence score, 0 when nothing was accepted
        score: u8,
        /// Link of the accepted candidate
        url: Option<String>,
    },
}

/// A handle for receiving search events.
///
/// # Examples
///
/// ```rust
/// use playlist_match::events::{create_search_channel, SearchEvent};
/// use tokio::sync::broadcast::error::RecvError;
///
/// # tokio_test::block_on(async {
/// let (sender, mut receiver) = create_search_channel();
/// // hand `sender` to a TrackSearcher via `with_events(sender)`
/// # drop(sender);
/// loop {
///     match receiver.recv().await {
///         Ok(SearchEvent::Paused { delay_ms, .. }) => println!("sleeping {delay_ms}ms"),
///         Ok(SearchEvent::TrackResolved { row, score, .. }) => {
///             println!("row {row}: confidence {score}")
///         }
///         Ok(_) => {}
///         Err(RecvError::Closed) => break,
///         Err(RecvError::Lagged(skipped)) => println!("{skipped} events skipped"),
///     }
/// }
/// # });
/// ```
pub type SearchEventReceiver = broadcast::Receiver<SearchEvent>;

/// A handle for sending search events.
pub type SearchEventSender = broadcast::Sender<SearchEvent>;

/// Creates a new broadcast channel for search events with room for 100 events.
pub fn create_search_channel() -> (SearchEventSender, SearchEventReceiver) {
    broadcast::channel(100)
}

/// Helper trait for emitting search events.
pub trait SearchEventEmitter {
    fn emit_request_issued(&self, request_count: u64, query: &str);

    fn emit_paused(&self, delay_ms: u64, tier: Option<u64>);

    fn emit_transport_failed(&self, query: &str, error: &str, consecutive_failures: u32);

    fn emit_cooldown_started(&self, delay_ms: u64, failures: u32);

    fn emit_track_resolved(&self, row: usize, score: u8, url: Option<String>);
}

impl SearchEventEmitter for Option<SearchEventSender> {
    fn emit_request_issued(&self, request_count: u64, query: &str) {
        self.send_event(SearchEvent::RequestIssued {
            timestamp: Utc::now(),
            request_count,
            query: query.to_string(),
        });
    }

    fn emit_paused(&self, delay_ms: u64, tier: Option<u64>) {
        self.send_event(SearchEvent::Paused {
            timestamp: Utc::now(),
            delay_ms,
            tier,
        });
    }

    fn emit_transport_failed(&self, query: &str, error: &str, consecutive_failures: u32) {
        self.send_event(SearchEvent::TransportFailed {
            timestamp: Utc::now(),
            query: query.to_string(),
            error: error.to_string(),
            consecutive_failures,
        });
    }

    fn emit_cooldown_started(&self, delay_ms: u64, failures: u32) {
        self.send_event(SearchEvent::CooldownStarted {
            timestamp: Utc::now(),
            delay_ms,
            failures,
        });
    }

    fn emit_track_resolved(&self, row: usize, score: u8, url: Option<String>) {
        self.send_event(SearchEvent::TrackResolved {
            timestamp: Utc::now(),
            row,
            score,
            url,
        });
    }
}

trait SendEvent {
    fn send_event(&self, event: SearchEvent);
}

impl SendEvent for Option<SearchEventSender> {
    fn send_event(&self, event: SearchEvent) {
        if let Some(sender) = self {
            let _ = sender.send(event); // Ignore send errors (no receivers)
        }
    }
}
