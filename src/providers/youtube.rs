use super::{meta, read_body};
use crate::provider::SearchProvider;
use crate::types::{Candidate, ResultKind};
use crate::{MatchError, Result};
use async_trait::async_trait;
use http_client::{HttpClient, Request};
use http_types::{Method, Url};
use serde::Deserialize;

pub const API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";
pub const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

/// YouTube Data API v3 search client.
pub struct YoutubeProvider {
    client: Box<dyn HttpClient>,
    api_base: String,
    api_key: String,
}

impl YoutubeProvider {
    pub fn new(client: Box<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_base: API_BASE_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    async fn search_raw(&self, query: &str, kind: &str, limit: u32) -> Result<String> {
        let url = format!(
            "{}/search?part=snippet&type={}&q={}&maxResults={}&key={}",
            self.api_base,
            kind,
            urlencoding::encode(query),
            limit,
            urlencoding::encode(&self.api_key)
        );
        let request = Request::new(
            Method::Get,
            url.parse::<Url>()
                .map_err(|e| MatchError::Http(format!("invalid search URL: {e}")))?,
        );

        let response = self
            .client
            .send(request)
            .await
            .map_err(|e| MatchError::Http(e.to_string()))?;
        read_body(response).await
    }
}

#[async_trait(?Send)]
impl SearchProvider for YoutubeProvider {
    fn name(&self) -> &'static str {
        "youtube"
    }

    async fn search(&self, query: &str, kind: ResultKind, limit: u32) -> Result<Vec<Candidate>> {
        match kind {
            ResultKind::Video | ResultKind::Channel => {
                parse_search_response(&self.search_raw(query, kind.as_str(), limit).await?)
            }
            other => Err(MatchError::Config(format!(
                "youtube cannot search for {}",
                other.as_str()
            ))),
        }
    }

    /// Title of the first channel found for `"{artist} official channel"`.
    async fn lookup_channel(&self, artist: &str) -> Result<Option<String>> {
        let query = format!("{artist} official channel");
        let channels =
            parse_search_response(&self.search_raw(&query, ResultKind::Channel.as_str(), 1).await?)?;
        let channel = channels.into_iter().next().map(|c| c.primary_label);
        log::debug!("Channel for '{artist}': {channel:?}");
        Ok(channel)
    }
}

// =============================================================================
// Response parsing
// =============================================================================

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    id: ItemId,
    snippet: Snippet,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemId {
    video_id: Option<String>,
    channel_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: String,
    channel_title: String,
    #[serde(default)]
    description: String,
    published_at: Option<String>,
}

/// Turn a `search` response into candidates.
///
/// Videos get a watch URL and the channel as primary label. Channels use
/// their own title as primary label.
pub fn parse_search_response(json: &str) -> Result<Vec<Candidate>> {
    let response: SearchResponse =
        serde_json::from_str(json).map_err(|e| MatchError::Parse(e.to_string()))?;

    Ok(response
        .items
        .into_iter()
        .map(|item| {
            let snippet = item.snippet;
            let mut candidate = match (item.id.video_id, item.id.channel_id) {
                (Some(video_id), _) => {
                    Candidate::new(unescape_html(&snippet.title), unescape_html(&snippet.channel_title))
                        .with_url(format!("{WATCH_URL}{video_id}"))
                        .with_id(video_id)
                }
                (None, channel_id) => {
                    let title = unescape_html(&snippet.title);
                    let candidate = Candidate::new(title.clone(), title);
                    match channel_id {
                        Some(id) => candidate.with_id(id),
                        None => candidate,
                    }
                }
            };
            candidate = candidate.with_metadata(meta::DESCRIPTION, unescape_html(&snippet.description));
            if let Some(published) = snippet.published_at {
                candidate = candidate.with_metadata(meta::PUBLISHED_TIME, published);
            }
            candidate
        })
        .collect())
}

/// The search API returns titles with HTML entities escaped.
fn unescape_html(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
