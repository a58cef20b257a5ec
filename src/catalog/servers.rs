/// Hosting server extraction for an episode page
use super::cascade::Cascade;
use super::identifier::is_absolute_http;
use super::language::primary_language;
use super::{ContentType, Language, Server};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, info};

const SERVER_ITEMS: &str = ".server-item, .servers-list .server, .player-options .option, \
     [class*=\"server\"], [class*=\"player\"], [class*=\"option\"], [data-server], \
     a[href*=\"player\"], a[href*=\"watch\"], [class*=\"play-button\"]";

/// Names longer than this are replaced with a positional one
const MAX_NAME_CHARS: usize = 50;

static ITEM_SELECTOR: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse(SERVER_ITEMS).ok());
static IFRAME_SELECTOR: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse("iframe").ok());
static SCRIPT_SELECTOR: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse("script").ok());

static TAGS: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"<[^>]*>").ok());
static WHITESPACE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\s+").ok());
static SOURCE_ASSIGNMENT: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"(?i)source\s*:\s*["']([^"']+)["']"#).ok());
static MEDIA_LITERALS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#"['"](https?://[^"']+\.m3u8[^"']*)['"]"#,
        r#"['"](https?://[^"']+\.mp4[^"']*)['"]"#,
    ]
    .into_iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

struct ServerCascades {
    id: Cascade,
    name: Cascade,
    url: Cascade,
}

static FIELDS: Lazy<ServerCascades> = Lazy::new(|| ServerCascades {
    id: Cascade::new("server.id")
        .own_attr("data-id")
        .own_attr("data-server")
        .own_attr("data-option")
        .own_attr("id"),
    name: Cascade::new("server.name").own_text().own_attr("title"),
    url: Cascade::new("server.url").own_attr("data-src").own_attr("href"),
});

/// Episode page for an episode identifier.
///
/// Identifiers that already carry an `episode/` path are used as-is.
pub fn episode_page_url(base_url: &str, content_type: ContentType, episode_id: &str) -> String {
    if episode_id.contains("episode/") {
        format!("{}/{}", base_url, episode_id)
    } else {
        format!("{}/{}/{}", base_url, content_type.episode_segment(), episode_id)
    }
}

/// Internal endpoint that resolves a server id to a player URL
pub fn ajax_server_url(base_url: &str, server_id: &str) -> String {
    format!("{}/ajax/server?id={}", base_url, server_id)
}

/// Single server pointing at the episode page, used when nothing better is known
pub fn default_server(id: &str, page_url: &str) -> Server {
    Server {
        id: id.to_string(),
        name: "Default Server".to_string(),
        language: Language::Unknown,
        url: page_url.to_string(),
    }
}

/// Extract hosting servers from an episode page; never returns an empty list
pub fn parse_servers(html: &str, base_url: &str, episode_id: &str, page_url: &str) -> Vec<Server> {
    let document = Html::parse_document(html);

    let mut servers = server_items(&document, base_url);

    if servers.is_empty() {
        debug!("No server elements for {}, looking for iframes", episode_id);
        servers = iframe_embeds(&document);
    }

    if servers.is_empty() {
        debug!("No iframes for {}, scanning inline scripts", episode_id);
        servers = script_sources(&document);
    }

    if servers.is_empty() {
        debug!("No servers found for {}, using the episode page", episode_id);
        servers.push(default_server(episode_id, page_url));
    }

    info!("🖥️ Found {} servers for {}", servers.len(), episode_id);
    servers
}

/// Tier 1: server, player and option elements
fn server_items(document: &Html, base_url: &str) -> Vec<Server> {
    let Some(selector) = ITEM_SELECTOR.as_ref() else {
        return Vec::new();
    };

    document
        .select(selector)
        .enumerate()
        .map(|(i, item)| {
            let id = FIELDS.id.first_or(item, format!("server-{}", i));
            let name = FIELDS
                .name
                .first(item)
                .map(|raw| clean_name(&raw))
                .filter(|name| !name.is_empty() && name.chars().count() <= MAX_NAME_CHARS)
                .unwrap_or_else(|| format!("Server {}", i + 1));
            let url = FIELDS
                .url
                .first(item)
                .unwrap_or_else(|| ajax_server_url(base_url, &id));

            debug!("Found server '{}' ({})", name, id);
            Server {
                language: primary_language(&name),
                id,
                name,
                url,
            }
        })
        .collect()
}

/// Tier 2: iframes with an absolute source
fn iframe_embeds(document: &Html) -> Vec<Server> {
    let Some(selector) = IFRAME_SELECTOR.as_ref() else {
        return Vec::new();
    };

    document
        .select(selector)
        .enumerate()
        .filter_map(|(i, iframe)| {
            let src = iframe.value().attr("src")?.trim();
            if !is_absolute_http(src) {
                return None;
            }

            debug!("Found iframe embed {}", src);
            Some(Server {
                id: format!("iframe-{}", i),
                name: format!("Embed {}", i + 1),
                language: Language::Unknown,
                url: src.to_string(),
            })
        })
        .collect()
}

/// Tier 3: player sources assigned or embedded in inline scripts
fn script_sources(document: &Html) -> Vec<Server> {
    let Some(selector) = SCRIPT_SELECTOR.as_ref() else {
        return Vec::new();
    };

    let mut servers = Vec::new();
    for (i, script) in document.select(selector).enumerate() {
        let body = script.inner_html();

        if let Some(url) = SOURCE_ASSIGNMENT.as_ref().and_then(|re| first_capture(re, &body)) {
            debug!("Found source assignment in script: {}", url);
            servers.push(Server {
                id: format!("script-{}", i),
                name: format!("Source {}", i + 1),
                language: Language::Unknown,
                url,
            });
        } else if let Some(url) = MEDIA_LITERALS.iter().find_map(|re| first_capture(re, &body)) {
            debug!("Found media URL in script: {}", url);
            servers.push(Server {
                id: format!("script-{}", i),
                name: format!("HLS {}", i + 1),
                language: Language::Unknown,
                url,
            });
        }
    }

    servers
}

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)?
        .get(1)
        .map(|m| m.as_str().to_string())
        .filter(|value| !value.is_empty())
}

/// Strip markup and collapse whitespace
fn clean_name(raw: &str) -> String {
    let without_tags = match TAGS.as_ref() {
        Some(tags) => tags.replace_all(raw, "").into_owned(),
        None => raw.to_string(),
    };

    match WHITESPACE.as_ref() {
        Some(whitespace) => whitespace.replace_all(&without_tags, " ").trim().to_string(),
        None => without_tags.trim().to_string(),
    }
}
