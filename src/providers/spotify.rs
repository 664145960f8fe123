use super::{meta, read_body};
use crate::config::SpotifyCredentials;
use crate::provider::{PlaylistSource, SearchProvider};
use crate::types::{bool_token, Candidate, ResultKind};
use crate::{MatchError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use http_client::{HttpClient, Request};
use http_types::{Method, Url};
use serde::Deserialize;
use std::cell::RefCell;

pub const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const API_BASE_URL: &str = "https://api.spotify.com/v1";
/// Market used for every catalog search.
pub const SEARCH_MARKET: &str = "FR";
/// Largest page size the playlist endpoints accept.
const PAGE_SIZE: u32 = 50;
/// Refresh the access token this many seconds before it expires.
const TOKEN_EXPIRY_MARGIN_SECS: u64 = 60;
/// Longest token lifetime we take at face value.
const MAX_TOKEN_LIFETIME_SECS: u64 = 86_400;

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Spotify Web API client, authenticated with the client-credentials flow.
///
/// Implements [`SearchProvider`] for [`ResultKind::Track`] searches and adds
/// the playlist calls used by [`PlaylistDiscovery`](crate::PlaylistDiscovery).
///
/// A provider built with [`connect`](Self::connect) keeps its credentials and
/// requests a new access token when the current one expires, or once when the
/// API rejects it with a 401.
pub struct SpotifyProvider {
    client: Box<dyn HttpClient>,
    api_base: String,
    credentials: Option<SpotifyCredentials>,
    token: RefCell<AccessToken>,
}

impl SpotifyProvider {
    /// Request an access token and build a provider around it.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::Auth`] when the credentials are rejected.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use playlist_match::{SearchProvider, ResultKind, SpotifyProvider};
    /// # tokio_test::block_on(async {
    /// let http_client = http_client::native::NativeClient::new();
    /// let spotify = SpotifyProvider::connect(Box::new(http_client), "client-id", "client-secret").await?;
    /// let hits = spotify.search("Ed Sheeran Shape of You", ResultKind::Track, 5).await?;
    /// println!("{} hits", hits.len());
    /// # Ok::<(), playlist_match::MatchError>(())
    /// # });
    /// ```
    pub async fn connect(
        client: Box<dyn HttpClient>,
        client_id: &str,
        client_secret: &str,
    ) -> Result<Self> {
        let provider = Self {
            client,
            api_base: API_BASE_URL.to_string(),
            credentials: Some(SpotifyCredentials {
                client_id: client_id.to_string(),
                client_secret: client_secret.to_string(),
            }),
            token: RefCell::new(AccessToken {
                value: String::new(),
                expires_at: None,
            }),
        };
        provider.refresh_token().await?;
        Ok(provider)
    }

    /// Build a provider from an already issued access token.
    ///
    /// The token is used as is and never refreshed.
    pub fn with_token(client: Box<dyn HttpClient>, access_token: impl Into<String>) -> Self {
        Self {
            client,
            api_base: API_BASE_URL.to_string(),
            credentials: None,
            token: RefCell::new(AccessToken {
                value: access_token.into(),
                expires_at: None,
            }),
        }
    }

    /// Point the provider at another API root.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    async fn refresh_token(&self) -> Result<()> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            MatchError::Auth("no client credentials to refresh the access token".to_string())
        })?;
        let form_string = format!(
            "grant_type=client_credentials&client_id={}&client_secret={}",
            urlencoding::encode(&credentials.client_id),
            urlencoding::encode(&credentials.client_secret)
        );

        let mut request = Request::new(Method::Post, parse_url(TOKEN_URL)?);
        request.insert_header("Content-Type", "application/x-www-form-urlencoded");
        request.set_body(form_string);

        let response = self
            .client
            .send(request)
            .await
            .map_err(|e| MatchError::Http(e.to_string()))?;
        let body = match read_body(response).await {
            Err(MatchError::Http(message)) if message.starts_with("status 400") => {
                return Err(MatchError::Auth(message));
            }
            other => other?,
        };

        let grant = parse_token_response(&body)?;
        let expires_at = grant.expires_in.map(|secs| {
            let lifetime = secs
                .min(MAX_TOKEN_LIFETIME_SECS)
                .saturating_sub(TOKEN_EXPIRY_MARGIN_SECS);
            Utc::now() + Duration::seconds(lifetime as i64)
        });
        match grant.expires_in {
            Some(secs) => log::info!("Obtained Spotify access token, valid for {secs}s"),
            None => log::info!("Obtained Spotify access token"),
        }
        *self.token.borrow_mut() = AccessToken {
            value: grant.access_token,
            expires_at,
        };
        Ok(())
    }

    async fn get(&self, url: &str) -> Result<String> {
        let expired = self.token.borrow().is_expired(Utc::now());
        if expired && self.credentials.is_some() {
            log::info!("Spotify access token expired, refreshing");
            self.refresh_token().await?;
        }

        match self.send_get(url).await {
            Err(MatchError::Auth(message)) if self.credentials.is_some() => {
                log::warn!("Spotify rejected the access token ({message}), refreshing");
                self.refresh_token().await?;
                self.send_get(url).await
            }
            other => other,
        }
    }

    async fn send_get(&self, url: &str) -> Result<String> {
        let token = self.token.borrow().value.clone();
        let mut request = Request::new(Method::Get, parse_url(url)?);
        request.insert_header("Authorization", format!("Bearer {token}"));
        request.insert_header("Accept", "application/json");

        let response = self
            .client
            .send(request)
            .await
            .map_err(|e| MatchError::Http(e.to_string()))?;
        read_body(response).await
    }

    /// Catalog track search.
    pub async fn search_tracks(&self, query: &str, limit: u32) -> Result<Vec<Candidate>> {
        let url = format!(
            "{}/search?q={}&type=track&limit={}&market={}",
            self.api_base,
            urlencoding::encode(query),
            limit,
            SEARCH_MARKET
        );
        parse_track_search(&self.get(&url).await?)
    }

    /// Public playlists matching a keyword, starting at `offset`.
    pub async fn search_playlists(
        &self,
        query: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<PlaylistSummary>> {
        let url = format!(
            "{}/search?q={}&type=playlist&limit={}&offset={}",
            self.api_base,
            urlencoding::encode(query),
            limit.min(PAGE_SIZE),
            offset
        );
        parse_playlist_search(&self.get(&url).await?)
    }

    /// Every track of a playlist, following pagination.
    pub async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Candidate>> {
        let mut next = Some(format!(
            "{}/playlists/{}/tracks?limit={}",
            self.api_base,
            urlencoding::encode(playlist_id),
            PAGE_SIZE
        ));
        let mut tracks = Vec::new();

        while let Some(url) = next {
            let (page, next_url) = parse_playlist_tracks(&self.get(&url).await?)?;
            log::debug!("Playlist {playlist_id}: {} tracks on this page", page.len());
            tracks.extend(page);
            next = next_url;
        }

        Ok(tracks)
    }

    /// Popularity of the first catalog hit for `title` by `artist`.
    pub async fn track_popularity(&self, artist: &str, title: &str) -> Result<Option<u32>> {
        let query = format!("track:{title} artist:{artist}");
        let hits = self.search_tracks(&query, 1).await?;
        Ok(hits
            .first()
            .and_then(|hit| hit.metadata(meta::POPULARITY))
            .and_then(|p| p.parse().ok()))
    }
}

#[async_trait(?Send)]
impl SearchProvider for SpotifyProvider {
    fn name(&self) -> &'static str {
        "spotify"
    }

    async fn search(&self, query: &str, kind: ResultKind, limit: u32) -> Result<Vec<Candidate>> {
        match kind {
            ResultKind::Track => self.search_tracks(query, limit).await,
            other => Err(MatchError::Config(format!(
                "spotify cannot search for {}",
                other.as_str()
            ))),
        }
    }
}

#[async_trait(?Send)]
impl PlaylistSource for SpotifyProvider {
    async fn search_playlists(
        &self,
        keyword: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<PlaylistSummary>> {
        SpotifyProvider::search_playlists(self, keyword, limit, offset).await
    }

    async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Candidate>> {
        SpotifyProvider::playlist_tracks(self, playlist_id).await
    }

    async fn track_popularity(&self, artist: &str, title: &str) -> Result<Option<u32>> {
        SpotifyProvider::track_popularity(self, artist, title).await
    }
}

/// A playlist returned by a playlist search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistSummary {
    pub id: String,
    pub name: String,
    pub track_count: Option<u32>,
}

// =============================================================================
// Response parsing
// =============================================================================

/// A client-credentials token grant.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    /// Lifetime in seconds
    pub expires_in: Option<u64>,
}

#[derive(Deserialize)]
struct Paging<T> {
    #[serde(default = "Vec::new")]
    items: Vec<Option<T>>,
    next: Option<String>,
}

#[derive(Deserialize)]
struct TrackSearchResponse {
    tracks: Paging<ApiTrack>,
}

#[derive(Deserialize)]
struct PlaylistSearchResponse {
    playlists: Paging<ApiPlaylist>,
}

#[derive(Deserialize)]
struct ApiPlaylist {
    id: String,
    name: String,
    tracks: Option<ApiTrackCount>,
}

#[derive(Deserialize)]
struct ApiTrackCount {
    total: u32,
}

#[derive(Deserialize)]
struct ApiPlaylistItem {
    track: Option<ApiTrack>,
}

#[derive(Deserialize)]
struct ApiTrack {
    id: Option<String>,
    name: String,
    #[serde(default)]
    artists: Vec<ApiArtist>,
    album: Option<ApiAlbum>,
    popularity: Option<u32>,
    explicit: Option<bool>,
    external_urls: Option<ApiExternalUrls>,
}

#[derive(Deserialize)]
struct ApiArtist {
    name: String,
}

#[derive(Deserialize)]
struct ApiAlbum {
    name: String,
    release_date: Option<String>,
}

#[derive(Deserialize)]
struct ApiExternalUrls {
    spotify: Option<String>,
}

impl From<ApiTrack> for Candidate {
    fn from(track: ApiTrack) -> Self {
        let primary = track
            .artists
            .first()
            .map(|a| a.name.clone())
            .unwrap_or_default();
        let mut candidate = Candidate::new(track.name, primary);

        if !track.artists.is_empty() {
            let credited: Vec<&str> = track.artists.iter().map(|a| a.name.as_str()).collect();
            candidate = candidate.with_metadata(meta::ARTISTS, credited.join(", "));
        }
        for artist in track.artists {
            candidate = candidate.with_label(artist.name);
        }
        if let Some(id) = track.id {
            candidate = candidate.with_id(id);
        }
        if let Some(url) = track.external_urls.and_then(|u| u.spotify) {
            candidate = candidate.with_url(url);
        }
        if let Some(album) = track.album {
            candidate = candidate.with_metadata(meta::ALBUM, album.name);
            if let Some(date) = album.release_date {
                candidate = candidate.with_metadata(meta::RELEASE_DATE, date);
            }
        }
        if let Some(popularity) = track.popularity {
            candidate = candidate.with_metadata(meta::POPULARITY, popularity.to_string());
        }
        if let Some(explicit) = track.explicit {
            candidate = candidate.with_metadata(meta::EXPLICIT, bool_token(explicit));
        }
        candidate
    }
}

fn parse_url(url: &str) -> Result<Url> {
    url.parse::<Url>()
        .map_err(|e| MatchError::Http(format!("invalid URL {url}: {e}")))
}

pub fn parse_token_response(json: &str) -> Result<TokenGrant> {
    serde_json::from_str(json).map_err(|e| MatchError::Parse(e.to_string()))
}

pub fn parse_track_search(json: &str) -> Result<Vec<Candidate>> {
    let response: TrackSearchResponse =
        serde_json::from_str(json).map_err(|e| MatchError::Parse(e.to_string()))?;
    Ok(response
        .tracks
        .items
        .into_iter()
        .flatten()
        .map(Candidate::from)
        .collect())
}

pub fn parse_playlist_search(json: &str) -> Result<Vec<PlaylistSummary>> {
    let response: PlaylistSearchResponse =
        serde_json::from_str(json).map_err(|e| MatchError::Parse(e.to_string()))?;
    Ok(response
        .playlists
        .items
        .into_iter()
        .flatten()
        .map(|p| PlaylistSummary {
            id: p.id,
            name: p.name,
            track_count: p.tracks.map(|t| t.total),
        })
        .collect())
}

/// One page of playlist items plus the URL of the next page.
pub fn parse_playlist_tracks(json: &str) -> Result<(Vec<Candidate>, Option<String>)> {
    let page: Paging<ApiPlaylistItem> =
        serde_json::from_str(json).map_err(|e| MatchError::Parse(e.to_string()))?;
    let tracks = page
        .items
        .into_iter()
        .flatten()
        .filter_map(|item| item.track)
        .map(Candidate::from)
        .collect();
    Ok((tracks, page.next))
}
