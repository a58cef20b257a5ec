/// Catalog scraping and source resolution module
///
/// This module turns pages from an anime catalog site into structured records:
/// search listings, title metadata, episode lists, hosting servers and playable sources.

pub mod cache;
pub mod cascade;
pub mod episodes;
pub mod fetch;
pub mod identifier;
pub mod info;
pub mod language;
pub mod scraper;
pub mod search;
pub mod servers;
pub mod sources;

// Re-export main types
pub use cache::{CacheStats, CacheStore};
pub use cascade::{Cascade, Extract};
pub use fetch::{HttpFetcher, PageFetcher};
pub use identifier::extract_id_from_url;
pub use language::{detect_languages, Language};
pub use self::scraper::AnimeWorldScraper;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Link target the origin uses for inert tabs and toggles
pub const PLACEHOLDER_LINK: &str = "javascript:void(0)";

/// Whether a title is a single movie or an episodic series
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ContentType {
    Movie,
    Series,
}

impl ContentType {
    /// Prefix that marks a movie in a canonical content ID
    pub const MOVIE_PREFIX: &'static str = "movie-";

    /// Derive the content type from a canonical content ID
    pub fn from_id(id: &str) -> Self {
        if id.starts_with(Self::MOVIE_PREFIX) {
            ContentType::Movie
        } else {
            ContentType::Series
        }
    }

    /// Interpret a `movie`/`series` path discriminator; anything but `movie` is a series
    pub fn from_discriminator(value: &str) -> Self {
        if value.eq_ignore_ascii_case("movie") {
            ContentType::Movie
        } else {
            ContentType::Series
        }
    }

    /// Infer the type of a catalog link from its path
    pub fn from_link(link: &str) -> Self {
        if link.contains("/movie") {
            ContentType::Movie
        } else {
            ContentType::Series
        }
    }

    /// Build the canonical content ID for a bare ID of this type
    pub fn full_id(&self, id: &str) -> String {
        match self {
            ContentType::Movie if !id.starts_with(Self::MOVIE_PREFIX) => {
                format!("{}{}", Self::MOVIE_PREFIX, id)
            }
            _ => id.to_string(),
        }
    }

    /// Path segment of the title page (`/movie/<id>` or `/series/<id>`)
    pub fn title_segment(&self) -> &'static str {
        match self {
            ContentType::Movie => "movie",
            ContentType::Series => "series",
        }
    }

    /// Path segment of a watchable page (`/movie/<id>` or `/episode/<id>`)
    pub fn episode_segment(&self) -> &'static str {
        match self {
            ContentType::Movie => "movie",
            ContentType::Series => "episode",
        }
    }

    /// Lowercase discriminator used in cache keys
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Movie => "movie",
            ContentType::Series => "series",
        }
    }
}

/// Title metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnimeInfo {
    /// Canonical content ID as requested
    pub id: String,
    pub title: String,
    pub image: String,
    pub description: String,
    /// Genre names in page order, possibly empty
    pub genres: Vec<String>,
    pub status: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    /// `N/A` when the origin does not publish one
    pub rating: String,
    pub release_date: String,
    /// Never empty, `[Unknown]` at worst
    pub languages: Vec<Language>,
    /// Page the record was extracted from
    pub url: String,
}

/// A single watchable entry of a title
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Episode {
    pub id: String,
    pub number: u32,
    pub title: String,
    pub languages: Vec<Language>,
    pub url: String,
}

/// Episodes of a title, sorted by number and unique by id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeList {
    pub episodes: Vec<Episode>,
    pub total_episodes: usize,
}

impl EpisodeList {
    pub fn new(episodes: Vec<Episode>) -> Self {
        let total_episodes = episodes.len();
        Self {
            episodes,
            total_episodes,
        }
    }
}

/// A hosting option for an episode
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Server {
    pub id: String,
    /// Plain text, at most 50 characters
    pub name: String,
    pub language: Language,
    /// Direct media URL, external embed URL or internal ajax endpoint
    pub url: String,
}

/// Quality marker of a resolved source
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Auto,
    Error,
}

/// A playable reference produced by the source resolver
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub url: String,
    pub quality: Quality,
    #[serde(rename = "isM3U8")]
    pub is_m3u8: bool,
    pub is_embed: bool,
    pub is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Source {
    /// A direct media file; flagged HLS when the URL is an `.m3u8` playlist
    pub fn direct(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            is_m3u8: url.contains(".m3u8"),
            url,
            quality: Quality::Auto,
            is_embed: false,
            is_error: false,
            error: None,
        }
    }

    /// A third-party player page
    pub fn embed(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            quality: Quality::Auto,
            is_m3u8: false,
            is_embed: true,
            is_error: false,
            error: None,
        }
    }

    /// Direct when the URL points at a media file, embed otherwise
    pub fn classify(url: impl Into<String>) -> Self {
        let url = url.into();
        if is_media_url(&url) {
            Self::direct(url)
        } else {
            Self::embed(url)
        }
    }

    /// Error marker; carries an empty URL
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            url: String::new(),
            quality: Quality::Error,
            is_m3u8: false,
            is_embed: false,
            is_error: true,
            error: Some(message.into()),
        }
    }

    /// True when the source can be handed to a player
    pub fn is_usable(&self) -> bool {
        !self.is_error && !self.url.is_empty()
    }
}

/// True for URLs that reference an HLS playlist or MP4 file
pub fn is_media_url(url: &str) -> bool {
    url.contains(".m3u8") || url.contains(".mp4")
}

/// Summary record of a search listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub id: String,
    pub title: String,
    pub image: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub languages: Vec<Language>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    pub url: String,
}

/// One page of search results
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub results: Vec<SearchResult>,
    pub current_page: u32,
    pub has_next_page: bool,
    pub total_results: usize,
}

/// Search outcome; failures are reported here instead of being returned as errors
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<SearchPage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchResponse {
    pub fn ok(page: SearchPage) -> Self {
        Self {
            success: true,
            data: Some(page),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Cache key and lifetime for one logical request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    pub key: String,
    pub ttl: Duration,
}

impl CacheOptions {
    pub fn new(key: impl Into<String>, ttl_seconds: u64) -> Self {
        Self {
            key: key.into(),
            ttl: Duration::from_secs(ttl_seconds),
        }
    }

    pub fn search(query: &str, page: u32, ttl_seconds: u64) -> Self {
        Self::new(format!("search:{}:{}", query, page), ttl_seconds)
    }

    pub fn info(full_id: &str, ttl_seconds: u64) -> Self {
        Self::new(format!("info:{}", full_id), ttl_seconds)
    }

    pub fn episodes(content_type: ContentType, id: &str, page: u32, ttl_seconds: u64) -> Self {
        Self::new(
            format!("episodes:{}:{}:{}", content_type.as_str(), id, page),
            ttl_seconds,
        )
    }

    pub fn servers(content_type: ContentType, episode_id: &str, ttl_seconds: u64) -> Self {
        Self::new(
            format!("servers:{}:{}", content_type.as_str(), episode_id),
            ttl_seconds,
        )
    }

    pub fn sources(content_type: ContentType, episode_id: &str, server_id: &str, ttl_seconds: u64) -> Self {
        Self::new(
            format!("sources:{}:{}:{}", content_type.as_str(), episode_id, server_id),
            ttl_seconds,
        )
    }

    /// Key the source resolver uses for its own server lookup
    pub fn server_lookup(content_type: ContentType, episode_id: &str, ttl_seconds: u64) -> Self {
        Self::new(
            format!("{}-{}-servers", content_type.as_str(), episode_id),
            ttl_seconds,
        )
    }
}
