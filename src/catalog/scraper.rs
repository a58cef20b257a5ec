/// Cached entry points over the catalog origin
use super::cache::CacheStore;
use super::episodes::{episodes_url, parse_episodes};
use super::fetch::{HttpFetcher, PageFetcher};
use super::info::{info_url, parse_anime_info};
use super::language::merge_languages;
use super::search::{parse_search_page, search_url};
use super::servers::{default_server, episode_page_url, parse_servers};
use super::sources::{self, find_server, Resolution};
use super::{
    AnimeInfo, CacheOptions, ContentType, EpisodeList, Language, SearchResponse, SearchResult,
    Server, Source,
};
use crate::config::Config;
use crate::error::{Result, ScrapeError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Scraper for the anime-world catalog.
///
/// Cheap to clone: clones share the fetcher and the cache. Every entry point is
/// memoized under the caller-supplied cache key.
#[derive(Clone)]
pub struct AnimeWorldScraper {
    base_url: String,
    fetcher: Arc<dyn PageFetcher>,
    cache: Arc<CacheStore>,
    server_lookup_ttl: Duration,
}

impl AnimeWorldScraper {
    /// Server lookups done on behalf of source resolution are kept this long by default
    pub const DEFAULT_SERVER_LOOKUP_TTL: Duration = Duration::from_secs(60 * 60);

    pub fn new(base_url: impl Into<String>, fetcher: Arc<dyn PageFetcher>, cache: Arc<CacheStore>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            fetcher,
            cache,
            server_lookup_ttl: Self::DEFAULT_SERVER_LOOKUP_TTL,
        }
    }

    pub fn with_server_lookup_ttl(mut self, ttl: Duration) -> Self {
        self.server_lookup_ttl = ttl;
        self
    }

    /// Build a scraper talking HTTP to the configured origin with a fresh cache
    pub fn from_config(config: &Config) -> Result<Self> {
        let fetcher = HttpFetcher::from_config(&config.origin)?;
        Ok(Self::new(
            config.origin.base_url.clone(),
            Arc::new(fetcher),
            Arc::new(CacheStore::new()),
        )
        .with_server_lookup_ttl(Duration::from_secs(config.cache.server_lookup_ttl_seconds)))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// Search the catalog. Failures come back as `success: false` and are not cached.
    pub async fn search(&self, query: &str, page: u32, options: &CacheOptions) -> SearchResponse {
        let page = page.max(1);
        let this = self.clone();
        let query = query.to_string();

        let outcome = self
            .cache
            .get_or_set(&options.key, options.ttl, move || async move {
                let url = search_url(&this.base_url, &query, page);
                info!("📄 Searching: {}", url);
                let html = this.fetcher.fetch_page(&url).await?;
                Ok(parse_search_page(&html, page))
            })
            .await;

        match outcome {
            Ok(page) => SearchResponse::ok(page),
            Err(e) => {
                log_failure("Search failed", &e);
                SearchResponse::failed(e.to_string())
            }
        }
    }

    /// Title metadata for a canonical content ID
    pub async fn get_anime_info(&self, full_id: &str, options: &CacheOptions) -> Result<AnimeInfo> {
        let this = self.clone();
        let full_id = full_id.to_string();

        self.cache
            .get_or_set(&options.key, options.ttl, move || async move {
                let url = info_url(&this.base_url, &full_id);
                info!("📄 Fetching info: {}", url);
                let html = this.fetcher.fetch_page(&url).await?;
                Ok(parse_anime_info(&html, &full_id, &url))
            })
            .await
    }

    /// Episodes of a title.
    ///
    /// The origin lists every episode on the title page, so `page` only distinguishes
    /// cache entries.
    pub async fn get_episodes(
        &self,
        content_type: ContentType,
        anime_id: &str,
        page: u32,
        options: &CacheOptions,
    ) -> Result<EpisodeList> {
        let this = self.clone();
        let anime_id = anime_id.to_string();

        self.cache
            .get_or_set(&options.key, options.ttl, move || async move {
                let url = episodes_url(&this.base_url, content_type, &anime_id);
                info!("📄 Fetching episodes (page {}): {}", page, url);
                let html = this.fetcher.fetch_page(&url).await?;
                Ok(EpisodeList::new(parse_episodes(&html, &anime_id, &url)))
            })
            .await
    }

    /// Hosting servers of an episode; a failed lookup yields one default server
    pub async fn get_episode_servers(
        &self,
        content_type: ContentType,
        episode_id: &str,
        options: &CacheOptions,
    ) -> Vec<Server> {
        match self.lookup_servers(content_type, episode_id, options).await {
            Ok(servers) => servers,
            Err(e) => {
                log_failure(&format!("Server lookup for {} failed, using default server", episode_id), &e);
                let page_url = episode_page_url(&self.base_url, content_type, episode_id);
                vec![default_server(episode_id, &page_url)]
            }
        }
    }

    async fn lookup_servers(
        &self,
        content_type: ContentType,
        episode_id: &str,
        options: &CacheOptions,
    ) -> Result<Vec<Server>> {
        let this = self.clone();
        let episode_id = episode_id.to_string();

        self.cache
            .get_or_set(&options.key, options.ttl, move || async move {
                let url = episode_page_url(&this.base_url, content_type, &episode_id);
                info!("📄 Fetching servers: {}", url);
                let html = this.fetcher.fetch_page(&url).await?;
                Ok(parse_servers(&html, &this.base_url, &episode_id, &url))
            })
            .await
    }

    /// Playable sources for one server of an episode.
    ///
    /// Never fails: errors come back as a single error-flagged source, which is not cached.
    pub async fn get_episode_sources(
        &self,
        content_type: ContentType,
        episode_id: &str,
        server_id: &str,
        options: &CacheOptions,
    ) -> Vec<Source> {
        if episode_id.trim().is_empty() || server_id.trim().is_empty() {
            warn!("❌ Source request is missing an episode or server id");
            return vec![Source::failed(ScrapeError::MissingParameters.to_string())];
        }

        let this = self.clone();
        let episode_id = episode_id.to_string();
        let server_id = server_id.to_string();

        let outcome = self
            .cache
            .get_or_set(&options.key, options.ttl, move || async move {
                this.resolve_sources(content_type, &episode_id, &server_id).await
            })
            .await;

        match outcome {
            Ok(sources) => sources,
            Err(e) => {
                log_failure("Source resolution failed", &e);
                vec![Source::failed(e.to_string())]
            }
        }
    }

    async fn resolve_sources(
        &self,
        content_type: ContentType,
        episode_id: &str,
        server_id: &str,
    ) -> Result<Vec<Source>> {
        info!("🎬 Resolving sources for {} on server {}", episode_id, server_id);
        let page_url = episode_page_url(&self.base_url, content_type, episode_id);

        let lookup = CacheOptions::server_lookup(content_type, episode_id, self.server_lookup_ttl.as_secs());
        let servers = match self.lookup_servers(content_type, episode_id, &lookup).await {
            Ok(servers) => servers,
            Err(e) => {
                warn!("Server lookup failed, falling back to the episode page: {}", e);
                vec![default_server(server_id, &page_url)]
            }
        };

        let server = find_server(&servers, server_id, episode_id)?;
        info!("Using server {} ({})", server.id, server.url);

        let sources = sources::resolve(
            self.fetcher.as_ref(),
            Resolution {
                base_url: &self.base_url,
                page_url: &page_url,
                server,
            },
        )
        .await?;

        info!("✅ Resolved {} source(s) for {}", sources.len(), episode_id);
        Ok(sources)
    }

    /// Languages of a title: its own plus those of every listed episode
    pub async fn get_languages(
        &self,
        content_type: ContentType,
        anime_id: &str,
        ttl_seconds: u64,
    ) -> Result<Vec<Language>> {
        let full_id = content_type.full_id(anime_id);
        let info = self
            .get_anime_info(&full_id, &CacheOptions::info(&full_id, ttl_seconds))
            .await?;
        let episodes = self
            .get_episodes(
                content_type,
                anime_id,
                1,
                &CacheOptions::episodes(content_type, anime_id, 1, ttl_seconds),
            )
            .await?;

        let mut languages = info.languages;
        for episode in &episodes.episodes {
            merge_languages(&mut languages, &episode.languages);
        }

        Ok(languages)
    }

    /// First search hit for a title, if any
    pub async fn find_by_title(&self, title: &str, ttl_seconds: u64) -> Option<SearchResult> {
        let response = self
            .search(title, 1, &CacheOptions::search(title, 1, ttl_seconds))
            .await;

        response
            .data
            .and_then(|page| page.results.into_iter().next())
    }
}

/// Warn on origin failures, error on anything else
fn log_failure(context: &str, e: &ScrapeError) {
    if e.is_network() {
        warn!("❌ {}: {}", context, e);
    } else {
        error!("❌ {}: {}", context, e);
    }
}
