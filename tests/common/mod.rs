#![allow(dead_code)]
use async_trait::async_trait;
use playlist_match::providers::meta;
use playlist_match::providers::PlaylistSummary;
use playlist_match::{
    Candidate, MatchError, PlaylistSource, ResultKind, Result, SearchProvider,
};
use std::cell::RefCell;
use std::collections::HashMap;

type Responder = Box<dyn Fn(&str) -> Result<Vec<Candidate>>>;

/// A search provider answering from a closure, recording every call.
pub struct ScriptedProvider {
    respond: Responder,
    channels: HashMap<String, String>,
    pub queries: RefCell<Vec<String>>,
    pub channel_lookups: RefCell<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(respond: impl Fn(&str) -> Result<Vec<Candidate>> + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            channels: HashMap::new(),
            queries: RefCell::new(Vec::new()),
            channel_lookups: RefCell::new(Vec::new()),
        }
    }

    pub fn with_channel(mut self, artist: &str, channel: &str) -> Self {
        self.channels.insert(artist.to_string(), channel.to_string());
        self
    }

    pub fn query_count(&self) -> usize {
        self.queries.borrow().len()
    }
}

#[async_trait(?Send)]
impl SearchProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn search(&self, query: &str, _kind: ResultKind, _limit: u32) -> Result<Vec<Candidate>> {
        self.queries.borrow_mut().push(query.to_string());
        (self.respond)(query)
    }

    async fn lookup_channel(&self, artist: &str) -> Result<Option<String>> {
        self.channel_lookups.borrow_mut().push(artist.to_string());
        Ok(self.channels.get(artist).cloned())
    }
}

pub fn video(title: &str, channel: &str, id: &str) -> Candidate {
    Candidate::new(title, channel)
        .with_id(id)
        .with_url(format!("https://www.youtube.com/watch?v={id}"))
}

pub fn topic_video(title: &str, artist: &str, id: &str) -> Candidate {
    video(title, &format!("{artist} - Topic"), id).with_metadata(
        meta::DESCRIPTION,
        format!("Provided to YouTube by Universal Music Group {title} · {artist}"),
    )
}

pub fn spotify_track(title: &str, artists: &[&str], popularity: Option<u32>) -> Candidate {
    let mut candidate = Candidate::new(title, artists.first().copied().unwrap_or_default())
        .with_metadata(meta::ARTISTS, artists.join(", "));
    for artist in artists {
        candidate = candidate.with_label(*artist);
    }
    if let Some(popularity) = popularity {
        candidate = candidate.with_metadata(meta::POPULARITY, popularity.to_string());
    }
    candidate
}

pub fn transport_error() -> MatchError {
    MatchError::Http("status 503: backend unavailable".to_string())
}

/// An in-memory playlist catalog.
#[derive(Default)]
pub struct FakeCatalog {
    pub playlists: Vec<(PlaylistSummary, Vec<Candidate>)>,
    pub popularity: HashMap<(String, String), u32>,
    pub popularity_lookups: RefCell<Vec<(String, String)>>,
    pub failing_playlists: Vec<String>,
}

impl FakeCatalog {
    pub fn with_playlist(mut self, id: &str, tracks: Vec<Candidate>) -> Self {
        let summary = PlaylistSummary {
            id: id.to_string(),
            name: format!("Playlist {id}"),
            track_count: Some(tracks.len() as u32),
        };
        self.playlists.push((summary, tracks));
        self
    }

    pub fn with_popularity(mut self, artist: &str, title: &str, popularity: u32) -> Self {
        self.popularity
            .insert((artist.to_string(), title.to_string()), popularity);
        self
    }

    pub fn failing(mut self, id: &str) -> Self {
        self.failing_playlists.push(id.to_string());
        self
    }
}

#[async_trait(?Send)]
impl PlaylistSource for FakeCatalog {
    async fn search_playlists(
        &self,
        _keyword: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<PlaylistSummary>> {
        Ok(self
            .playlists
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|(summary, _)| summary.clone())
            .collect())
    }

    async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Candidate>> {
        if self.failing_playlists.iter().any(|id| id == playlist_id) {
            return Err(transport_error());
        }
        Ok(self
            .playlists
            .iter()
            .find(|(summary, _)| summary.id == playlist_id)
            .map(|(_, tracks)| tracks.clone())
            .unwrap_or_default())
    }

    async fn track_popularity(&self, artist: &str, title: &str) -> Result<Option<u32>> {
        let key = (artist.to_string(), title.to_string());
        self.popularity_lookups.borrow_mut().push(key.clone());
        Ok(self.popularity.get(&key).copied())
    }
}
