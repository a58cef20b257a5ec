/// Catalog search listing extraction
use super::cascade::{element_text, Cascade, Extract};
use super::identifier::extract_id_from_url;
use super::{ContentType, Language, SearchPage, SearchResult};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, info};

const RESULT_CARDS: &str =
    "article, .post, .item, div[class*=\"result\"], .card, .show-card, .movie-card";

/// Path fragments of title pages, used when no result card is recognized
const CONTENT_PATHS: [&str; 4] = ["/series/", "/movie/", "/anime/", "/shows/"];

static CARD_SELECTOR: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse(RESULT_CARDS).ok());
static ANCHOR_SELECTOR: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse("a").ok());
static PAGINATION_SELECTOR: Lazy<Option<Selector>> =
    Lazy::new(|| Selector::parse(".pagination, .nav-links, .page-numbers").ok());
static NEXT_CONTROL_SELECTOR: Lazy<Option<Selector>> =
    Lazy::new(|| Selector::parse("a, .next, .nextpostslink").ok());

struct CardCascades {
    title: Cascade,
    image: Cascade,
    link: Cascade,
    year: Cascade,
    anchor_image: Cascade,
}

static FIELDS: Lazy<CardCascades> = Lazy::new(|| {
    let mut year = Cascade::new("result.year");
    if let Ok(pattern) = Regex::new(r"(\d{4})") {
        year = year.query(".year, .date, time, .meta", Extract::Capture(pattern));
    }

    CardCascades {
        title: Cascade::new("result.title")
            .text("h2, h3, .title, .name, .post-title, .entry-title")
            .own_attr("title")
            .own_attr("data-title"),
        image: Cascade::new("result.image")
            .attr("img", "src")
            .attr("img", "data-src")
            .query(".poster, .thumbnail, .image", Extract::BackgroundUrl),
        link: Cascade::new("result.link").attr("a", "href").own_attr("data-href"),
        year,
        anchor_image: Cascade::new("result.image").attr("img", "src"),
    }
});

/// Search page URL; the page parameter is only sent past the first page
pub fn search_url(base_url: &str, query: &str, page: u32) -> String {
    let mut url = format!("{}/?s={}", base_url, urlencoding::encode(query));
    if page > 1 {
        url.push_str(&format!("&page={}", page));
    }
    url
}

/// Extract one page of search results
pub fn parse_search_page(html: &str, page: u32) -> SearchPage {
    let document = Html::parse_document(html);

    let mut results = result_cards(&document);
    if results.is_empty() {
        debug!("No result cards recognized, scanning content links");
        results = content_links(&document);
    }

    let has_next_page = has_next_page(&document);
    info!(
        "🔍 Found {} results on page {} (next page: {})",
        results.len(),
        page,
        has_next_page
    );

    SearchPage {
        total_results: results.len(),
        results,
        current_page: page,
        has_next_page,
    }
}

fn result_cards(document: &Html) -> Vec<SearchResult> {
    let Some(selector) = CARD_SELECTOR.as_ref() else {
        return Vec::new();
    };

    document
        .select(selector)
        .filter_map(|card| {
            let title = FIELDS.title.first(card)?;
            let link = FIELDS.link.first(card)?;

            debug!("Found result '{}' -> {}", title, link);
            Some(SearchResult {
                id: extract_id_from_url(&link),
                title,
                image: FIELDS.image.first_or(card, ""),
                content_type: ContentType::from_link(&link),
                languages: vec![Language::Unknown],
                year: FIELDS.year.first(card),
                url: link,
            })
        })
        .collect()
}

fn content_links(document: &Html) -> Vec<SearchResult> {
    let Some(selector) = ANCHOR_SELECTOR.as_ref() else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut results = Vec::new();

    for anchor in document.select(selector) {
        let href = anchor.value().attr("href").unwrap_or("");
        if href.is_empty() || !CONTENT_PATHS.iter().any(|path| href.contains(path)) {
            continue;
        }

        let title = Some(element_text(anchor))
            .filter(|text| !text.is_empty())
            .or_else(|| anchor.value().attr("title").map(str::to_string));
        let Some(title) = title else {
            continue;
        };
        if !seen.insert(href.to_string()) {
            continue;
        }

        results.push(SearchResult {
            id: extract_id_from_url(href),
            title,
            image: FIELDS.anchor_image.first_or(anchor, ""),
            content_type: ContentType::from_link(href),
            languages: vec![Language::Unknown],
            year: None,
            url: href.to_string(),
        });
    }

    results
}

fn has_next_page(document: &Html) -> bool {
    let (Some(areas), Some(controls)) = (PAGINATION_SELECTOR.as_ref(), NEXT_CONTROL_SELECTOR.as_ref())
    else {
        return false;
    };

    document
        .select(areas)
        .flat_map(|area| area.select(controls))
        .any(is_next_control)
}

fn is_next_control(control: ElementRef<'_>) -> bool {
    let element = control.value();
    element.classes().any(|class| class == "next" || class == "nextpostslink")
        || (element.name() == "a" && element_text(control).contains("Next"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_url() {
        let base = "https://anime-world.co";
        assert_eq!(search_url(base, "naruto", 1), "https://anime-world.co/?s=naruto");
        assert_eq!(
            search_url(base, "one piece", 3),
            "https://anime-world.co/?s=one%20piece&page=3"
        );
    }

    #[test]
    fn test_result_cards() {
        let html = r#"
            <html><body>
                <div class="item">
                    <a href="https://anime-world.co/series/naruto/"><img src="/n.jpg"></a>
                    <h3>Naruto</h3>
                    <span class="year">2002</span>
                </div>
                <div class="item" data-title="Suzume">
                    <a href="https://anime-world.co/movie/suzume/"></a>
                    <div class="poster" style="background-image:url('/s.jpg')"></div>
                </div>
                <div class="item"><h3>No link here</h3></div>
            </body></html>
        "#;
        let page = parse_search_page(html, 1);

        assert_eq!(page.total_results, 2);
        assert_eq!(page.current_page, 1);
        assert!(!page.has_next_page);

        let naruto = &page.results[0];
        assert_eq!(naruto.id, "naruto");
        assert_eq!(naruto.title, "Naruto");
        assert_eq!(naruto.image, "/n.jpg");
        assert_eq!(naruto.content_type, ContentType::Series);
        assert_eq!(naruto.year.as_deref(), Some("2002"));

        let suzume = &page.results[1];
        assert_eq!(suzume.id, "suzume");
        assert_eq!(suzume.title, "Suzume");
        assert_eq!(suzume.image, "/s.jpg");
        assert_eq!(suzume.content_type, ContentType::Movie);
        assert_eq!(suzume.year, None);
        assert_eq!(suzume.languages, vec![Language::Unknown]);
    }

    #[test]
    fn test_content_link_fallback() {
        let html = r#"
            <html><body>
                <a href="/series/bleach/">Bleach</a>
                <a href="/series/bleach/">Bleach again</a>
                <a href="/shows/mob" title="Mob Psycho"></a>
                <a href="/about">About</a>
                <a href="/movie/akira/"></a>
            </body></html>
        "#;
        let page = parse_search_page(html, 2);

        let titles: Vec<_> = page.results.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Bleach", "Mob Psycho"]);
        assert_eq!(page.results[1].id, "mob");
        assert_eq!(page.current_page, 2);
    }

    #[test]
    fn test_next_page_detection() {
        let by_text = r#"<html><body><div class="nav-links"><a href="?page=2">Next &raquo;</a></div></body></html>"#;
        assert!(parse_search_page(by_text, 1).has_next_page);

        let by_class = r#"<html><body><div class="pagination"><span class="nextpostslink">&gt;</span></div></body></html>"#;
        assert!(parse_search_page(by_class, 1).has_next_page);

        let last_page = r#"<html><body><div class="pagination"><a href="?page=1">Previous</a></div></body></html>"#;
        assert!(!parse_search_page(last_page, 2).has_next_page);
    }
}
