/// Anime Source Resolver
///
/// Scrapes an anime catalog site into structured records and resolves playable
/// stream sources for its episodes, memoizing every origin round-trip.

pub mod catalog;
pub mod config;
pub mod error;

// Re-export main types for easy access
pub use crate::catalog::{
    AnimeInfo, AnimeWorldScraper, CacheOptions, CacheStore, Cascade, ContentType, Episode,
    EpisodeList, HttpFetcher, Language, PageFetcher, SearchPage, SearchResponse, SearchResult,
    Server, Source,
};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{Result, ScrapeError};
