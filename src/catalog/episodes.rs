/// Episode list extraction
///
/// Four tiers are tried in order and the first that yields anything wins:
/// episode-like list items, season tabs, episode-looking anchors, and finally the
/// page itself as a single entry. The result is then filtered, sorted and deduplicated.
use super::cascade::{element_text, Cascade, Extract};
use super::identifier::extract_id_from_url;
use super::language::detect_languages;
use super::{ContentType, Episode, Language, PLACEHOLDER_LINK};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::{debug, info};

const EPISODE_ITEMS: &str = ".episodes-list li, .episodes li, .episodios li, .ep-item, .episode-item, \
     .episode, [class*=\"episode\"], .season-list li, .seasons li, .temporadas li, .chapters li, .capitulos li";

const SEASON_CONTAINERS: &str = ".seasons, .temporadas, .tabs, select[id*=\"season\"]";

static ITEM_SELECTOR: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse(EPISODE_ITEMS).ok());
static SEASON_SELECTOR: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse(SEASON_CONTAINERS).ok());
static ANCHOR_SELECTOR: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse("a").ok());
static EPISODE_CODE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"[sS]\d+[eE]\d+").ok());

struct ItemCascades {
    number: Cascade,
    title: Cascade,
    link: Cascade,
    id: Cascade,
    season_title: Cascade,
    page_title: Cascade,
}

static FIELDS: Lazy<ItemCascades> = Lazy::new(|| {
    let mut number = Cascade::new("episode.number").text(".number, .num, .ep-num");
    if let Ok(pattern) = Regex::new(r"(?i)(?:Episode|Ep|E)\s*(\d+)") {
        number = number.own(Extract::Capture(pattern));
    }

    ItemCascades {
        number,
        title: Cascade::new("episode.title").text(".title, .name").own_attr("title"),
        link: Cascade::new("episode.link").attr("a", "href").own_attr("data-href"),
        id: Cascade::new("episode.id").own_attr("id").own_attr("data-id"),
        season_title: Cascade::new("season.title").text(".season-title, .title"),
        page_title: Cascade::new("page.title").text("h1, .entry-title, .title"),
    }
});

/// Page listing the episodes of a title
pub fn episodes_url(base_url: &str, content_type: ContentType, anime_id: &str) -> String {
    format!("{}/{}/{}", base_url, content_type.title_segment(), anime_id)
}

/// Extract the episode list of `anime_id` from its title page
pub fn parse_episodes(html: &str, anime_id: &str, page_url: &str) -> Vec<Episode> {
    let document = Html::parse_document(html);

    let mut episodes = episode_items(&document, anime_id, page_url);

    if episodes.is_empty() {
        debug!("No episode items for {}, checking season tabs", anime_id);
        episodes = season_tabs(&document);
    }

    if episodes.is_empty() {
        debug!("No season tabs for {}, scanning episode links", anime_id);
        episodes = episode_links(&document, anime_id);
    }

    if episodes.is_empty() {
        debug!("No episode links for {}, using the page itself", anime_id);
        episodes.push(whole_content(&document, anime_id, page_url));
    }

    let found = episodes.len();
    let episodes = post_process(episodes, anime_id);
    info!(
        "📺 Found {} episodes for {} ({} before filtering)",
        episodes.len(),
        anime_id,
        found
    );

    episodes
}

/// Tier 1: list items that look like episodes
fn episode_items(document: &Html, anime_id: &str, page_url: &str) -> Vec<Episode> {
    let Some(selector) = ITEM_SELECTOR.as_ref() else {
        return Vec::new();
    };

    let mut episodes = Vec::new();
    for (i, item) in document.select(selector).enumerate() {
        let position = i as u32 + 1;
        let number = FIELDS
            .number
            .first(item)
            .and_then(|raw| parse_number(&raw))
            .unwrap_or(position);

        let title = FIELDS
            .title
            .first(item)
            .unwrap_or_else(|| format!("Episode {}", number));

        let link = FIELDS.link.first(item);
        let id = match &link {
            Some(link) => extract_id_from_url(link),
            None => FIELDS
                .id
                .first(item)
                .unwrap_or_else(|| format!("{}-{}", anime_id, position)),
        };

        if id.is_empty() {
            continue;
        }

        debug!("Found episode {} '{}' ({})", number, title, id);
        episodes.push(Episode {
            id,
            number,
            title,
            languages: detect_languages(&element_text(item)),
            url: link.unwrap_or_else(|| page_url.to_string()),
        });
    }

    episodes
}

/// Tier 2: one entry per season tab; tabs carry no link of their own
fn season_tabs(document: &Html) -> Vec<Episode> {
    let Some(selector) = SEASON_SELECTOR.as_ref() else {
        return Vec::new();
    };

    document
        .select(selector)
        .enumerate()
        .map(|(i, season)| {
            let number = i as u32 + 1;
            let title = FIELDS
                .season_title
                .first_or(season, format!("Season {}", number));
            debug!("Found season tab '{}'", title);

            Episode {
                id: PLACEHOLDER_LINK.to_string(),
                number,
                title,
                languages: vec![Language::Unknown],
                url: PLACEHOLDER_LINK.to_string(),
            }
        })
        .collect()
}

/// Tier 3: anchors whose target looks like an episode of this title
fn episode_links(document: &Html, anime_id: &str) -> Vec<Episode> {
    let Some(selector) = ANCHOR_SELECTOR.as_ref() else {
        return Vec::new();
    };

    let own_path = format!("/{}/", anime_id);
    let mut seen = HashSet::new();
    let mut episodes = Vec::new();

    for (i, anchor) in document.select(selector).enumerate() {
        let href = anchor.value().attr("href").unwrap_or("");
        if href.is_empty() || !looks_like_episode(href, &own_path) {
            continue;
        }
        if !seen.insert(href.to_string()) {
            continue;
        }

        let title = Some(element_text(anchor))
            .filter(|text| !text.is_empty())
            .or_else(|| anchor.value().attr("title").map(str::to_string))
            .unwrap_or_else(|| format!("Episode {}", i + 1));

        episodes.push(Episode {
            id: extract_id_from_url(href),
            number: i as u32 + 1,
            title,
            languages: vec![Language::Unknown],
            url: href.to_string(),
        });
    }

    episodes
}

fn looks_like_episode(href: &str, own_path: &str) -> bool {
    href.contains("/episode/")
        || href.contains("/watch/")
        || EPISODE_CODE
            .as_ref()
            .map_or(false, |code| code.is_match(href))
        || href.contains(own_path)
}

/// Tier 4: the title page as a single watchable entry
fn whole_content(document: &Html, anime_id: &str, page_url: &str) -> Episode {
    let root = document.root_element();
    let body_text = Selector::parse("body")
        .ok()
        .and_then(|body| document.select(&body).next())
        .map(element_text)
        .unwrap_or_default();

    Episode {
        id: anime_id.to_string(),
        number: 1,
        title: FIELDS.page_title.first_or(root, "Full Movie/Series"),
        languages: detect_languages(&body_text),
        url: page_url.to_string(),
    }
}

/// Digits of `raw` as a positive episode number
fn parse_number(raw: &str) -> Option<u32> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    digits.parse::<u32>().ok().filter(|n| *n > 0)
}

/// Drop placeholders and entries of other titles, sort by number, keep the first of each id
pub fn post_process(episodes: Vec<Episode>, anime_id: &str) -> Vec<Episode> {
    let mut valid: Vec<Episode> = episodes
        .into_iter()
        .filter(|episode| episode.url != PLACEHOLDER_LINK && episode.id != PLACEHOLDER_LINK)
        .filter(|episode| episode.url.contains(anime_id) || episode.id.contains(anime_id))
        .collect();

    valid.sort_by_key(|episode| episode.number);

    let mut seen = HashSet::new();
    valid.retain(|episode| seen.insert(episode.id.clone()));
    valid
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_URL: &str = "https://anime-world.co/series/naruto";

    fn episode(id: &str, number: u32, url: &str) -> Episode {
        Episode {
            id: id.to_string(),
            number,
            title: format!("Episode {}", number),
            languages: vec![Language::Unknown],
            url: url.to_string(),
        }
    }

    #[test]
    fn test_episode_items() {
        let html = r#"
            <html><body><ul class="list">
                <li class="ep-item"><span class="num">2</span><a href="/episode/naruto-1x2"><span class="title">Hindi: The Return</span></a></li>
                <li class="ep-item"><span class="num">1</span><a href="/episode/naruto-1x1"><span class="title">Homecoming</span></a></li>
                <li class="ep-item"><a href="/episode/naruto-1x3">Episode 3 Tamil</a></li>
            </ul></body></html>
        "#;
        let episodes = parse_episodes(html, "naruto", PAGE_URL);

        let ids: Vec<_> = episodes.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["naruto-1x1", "naruto-1x2", "naruto-1x3"]);
        assert_eq!(episodes[0].title, "Homecoming");
        assert_eq!(episodes[1].languages, vec![Language::Hindi]);
        assert_eq!(episodes[2].number, 3);
        assert_eq!(episodes[2].title, "Episode 3");
        assert_eq!(episodes[2].languages, vec![Language::Tamil]);
        assert_eq!(episodes[2].url, "/episode/naruto-1x3");
    }

    #[test]
    fn test_episode_like_container_is_taken_as_an_item() {
        // `[class*="episode"]` also matches the list itself; it sorts first and keeps
        // the first episode's id, so that entry carries every language on the list
        let html = r#"
            <html><body><ul class="episodes">
                <li class="ep-item"><a href="/episode/naruto-1x1">One Hindi</a></li>
                <li class="ep-item"><a href="/episode/naruto-1x2">Two Tamil</a></li>
            </ul></body></html>
        "#;
        let episodes = parse_episodes(html, "naruto", PAGE_URL);

        let ids: Vec<_> = episodes.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["naruto-1x1", "naruto-1x2"]);
        assert_eq!(episodes[0].number, 1);
        assert_eq!(episodes[0].title, "Episode 1");
        assert_eq!(episodes[0].languages, vec![Language::Hindi, Language::Tamil]);
        // Positions count the container too
        assert_eq!(episodes[1].number, 3);
        assert_eq!(episodes[1].languages, vec![Language::Tamil]);
    }

    #[test]
    fn test_item_without_link_uses_element_id() {
        let html = r#"
            <html><body>
                <div class="ep-item" data-id="naruto-ep-9">Ep 9</div>
                <div class="ep-item">no number here</div>
            </body></html>
        "#;
        let episodes = parse_episodes(html, "naruto", PAGE_URL);

        assert_eq!(episodes.len(), 2);
        assert_eq!(episodes[0].id, "naruto-2");
        assert_eq!(episodes[0].number, 2);
        assert_eq!(episodes[0].url, PAGE_URL);
        assert_eq!(episodes[1].id, "naruto-ep-9");
        assert_eq!(episodes[1].number, 9);
    }

    #[test]
    fn test_season_tabs_are_filtered_out() {
        let html = r#"
            <html><body>
                <div class="tabs"><span class="title">Season 1</span></div>
                <a href="/episode/naruto-1x1">1</a>
            </body></html>
        "#;

        // Season tabs win over anchors but never survive filtering
        assert!(parse_episodes(html, "naruto", PAGE_URL).is_empty());
    }

    #[test]
    fn test_episode_links_fallback() {
        let html = r#"
            <html><body>
                <a href="/">Home</a>
                <a href="/watch/naruto-s01e02">Second</a>
                <a href="/watch/naruto-s01e02">Second again</a>
                <a href="/series/naruto/s1" title="Season one"></a>
                <a href="/watch/bleach-s01e01">Other show</a>
            </body></html>
        "#;
        let episodes = parse_episodes(html, "naruto", PAGE_URL);

        assert_eq!(episodes.len(), 2);
        assert_eq!(episodes[0].id, "naruto-s01e02");
        assert_eq!(episodes[0].number, 2);
        assert_eq!(episodes[0].title, "Second");
        assert_eq!(episodes[1].url, "/series/naruto/s1");
        assert_eq!(episodes[1].title, "Season one");
    }

    #[test]
    fn test_whole_content_fallback() {
        let html = r#"<html><body><h1>Suzume (Hindi)</h1><p>English subtitles</p></body></html>"#;
        let episodes = parse_episodes(html, "suzume", "https://anime-world.co/movie/suzume");

        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].id, "suzume");
        assert_eq!(episodes[0].number, 1);
        assert_eq!(episodes[0].title, "Suzume (Hindi)");
        assert_eq!(episodes[0].languages, vec![Language::Hindi, Language::English]);
    }

    #[test]
    fn test_whole_content_default_title() {
        let episodes = parse_episodes("<html><body></body></html>", "x", "https://o/movie/x");
        assert_eq!(episodes[0].title, "Full Movie/Series");
    }

    #[test]
    fn test_post_process_invariants() {
        let raw = vec![
            episode("naruto-3", 3, "/episode/naruto-3"),
            episode(PLACEHOLDER_LINK, 1, PLACEHOLDER_LINK),
            episode("naruto-1", 1, "/episode/naruto-1"),
            episode("bleach-1", 1, "/episode/bleach-1"),
            episode("naruto-1", 2, "/episode/naruto-1-dup"),
            episode("ep-7", 7, "/series/naruto/ep-7"),
        ];
        let episodes = post_process(raw, "naruto");

        let ids: Vec<_> = episodes.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["naruto-1", "naruto-3", "ep-7"]);
        assert!(episodes.windows(2).all(|pair| pair[0].number <= pair[1].number));
        assert_eq!(episodes[0].url, "/episode/naruto-1");
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("Ep. 12"), Some(12));
        assert_eq!(parse_number("0"), None);
        assert_eq!(parse_number("none"), None);
    }
}
