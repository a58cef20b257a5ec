/// Playable source resolution for an episode server
///
/// Resolution is a waterfall: each stage either produces a source or hands over to
/// the next one. Stages that talk to the origin swallow their own failures; only a
/// fully exhausted waterfall is reported as an error.
use super::fetch::PageFetcher;
use super::identifier::{absolutize, is_external};
use super::{is_media_url, Server, Source};
use crate::error::{Result, ScrapeError};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

const AJAX_SERVER_PATH: &str = "/ajax/server";

static PAGE_M3U8: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"(?i)["']([^"']*?\.m3u8[^"']*?)["']"#).ok());
static PAGE_MP4: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"(?i)["'](https?://[^"']*?\.mp4[^"']*?)["']"#).ok());
static PAGE_IFRAME: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"(?i)<iframe[^>]*src=["']([^"']+)["'][^>]*>"#).ok());

/// Pick the requested server.
///
/// Exact id first, then a loose substring match in either direction, then the first
/// server listed. The reverse direction only applies to server ids longer than three
/// characters, but the forward direction has no such guard: `"1"` matches `"server-12"`.
pub fn find_server<'a>(servers: &'a [Server], server_id: &str, episode_id: &str) -> Result<&'a Server> {
    if let Some(server) = servers.iter().find(|s| s.id == server_id) {
        return Ok(server);
    }

    if let Some(server) = servers
        .iter()
        .find(|s| s.id.contains(server_id) || (server_id.contains(s.id.as_str()) && s.id.len() > 3))
    {
        debug!("Server {} matched loosely by {}", server_id, server.id);
        return Ok(server);
    }

    match servers.first() {
        Some(server) => {
            info!("Server {} not found, using first available server {}", server_id, server.id);
            Ok(server)
        }
        None => Err(ScrapeError::NoServersAvailable(episode_id.to_string())),
    }
}

/// Inputs of one waterfall run
pub struct Resolution<'a> {
    pub base_url: &'a str,
    /// Episode page; ajax referer and target of the re-scrape stage
    pub page_url: &'a str,
    pub server: &'a Server,
}

/// Run the waterfall for one server
pub async fn resolve(fetcher: &dyn PageFetcher, resolution: Resolution<'_>) -> Result<Vec<Source>> {
    let Resolution {
        base_url,
        page_url,
        server,
    } = resolution;
    let server_url = server.url.as_str();

    debug!("Resolving server {} ({})", server.id, server_url);

    if is_media_url(server_url) {
        debug!(stage = "direct-media", "source stage matched");
        return Ok(vec![Source::direct(server_url)]);
    }

    if is_external(server_url, base_url) {
        debug!(stage = "external-embed", "source stage matched");
        return Ok(vec![Source::embed(server_url)]);
    }

    if server_url.contains(AJAX_SERVER_PATH) {
        if let Some(source) = ajax_stage(fetcher, base_url, server_url, page_url).await {
            debug!(stage = "ajax", "source stage matched");
            return Ok(vec![source]);
        }
    }

    let page_error = match fetcher.fetch_page(page_url).await {
        Ok(html) => {
            if let Some(source) = scan_page(&html) {
                debug!(stage = "page-rescrape", "source stage matched");
                return Ok(vec![source]);
            }
            debug!(stage = "page-rescrape", "no media found in episode page");
            None
        }
        Err(e) => {
            warn!("Failed to fetch {} for sources: {}", page_url, e);
            Some(e)
        }
    };

    fallback(server_url, page_url, page_error).map(|source| vec![source])
}

/// Ask the internal ajax endpoint for the player URL; any failure means "not applicable"
async fn ajax_stage(
    fetcher: &dyn PageFetcher,
    base_url: &str,
    server_url: &str,
    page_url: &str,
) -> Option<Source> {
    let ajax_url = absolutize(base_url, server_url);

    match fetcher.fetch_ajax(&ajax_url, page_url).await {
        Ok(payload) => {
            let url = payload
                .get("url")
                .and_then(|value| value.as_str())
                .filter(|url| !url.is_empty());
            if url.is_none() {
                debug!("Ajax response from {} carried no url: {}", ajax_url, payload);
            }
            url.map(Source::classify)
        }
        Err(e) => {
            warn!("Ajax lookup {} failed: {}", ajax_url, e);
            None
        }
    }
}

/// Scan raw episode HTML for an HLS playlist, then an MP4 file, then an iframe
pub fn scan_page(html: &str) -> Option<Source> {
    if let Some(url) = capture(&PAGE_M3U8, html) {
        return Some(Source {
            is_m3u8: true,
            ..Source::direct(url)
        });
    }

    if let Some(url) = capture(&PAGE_MP4, html) {
        return Some(Source {
            is_m3u8: false,
            ..Source::direct(url)
        });
    }

    capture(&PAGE_IFRAME, html).map(Source::embed)
}

fn capture(pattern: &Lazy<Option<Regex>>, text: &str) -> Option<String> {
    pattern
        .as_ref()?
        .captures(text)?
        .get(1)
        .map(|m| m.as_str().to_string())
        .filter(|url| !url.is_empty())
}

/// Last stage: hand back what we have as an embed.
///
/// When the only candidate is the episode page and that page could not be fetched,
/// there is nothing to hand back and the fetch error is returned instead.
fn fallback(server_url: &str, page_url: &str, page_error: Option<ScrapeError>) -> Result<Source> {
    let candidate = if server_url.is_empty() { page_url } else { server_url };

    match page_error {
        Some(error) if candidate == page_url => Err(error),
        _ => {
            debug!(stage = "fallback", "returning {} as embed", candidate);
            Ok(Source::embed(candidate))
        }
    }
}
