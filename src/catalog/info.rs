/// Title metadata extraction
use super::cascade::{Cascade, Extract};
use super::language::detect_languages;
use super::{AnimeInfo, ContentType};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use tracing::{debug, info};

struct InfoCascades {
    title: Cascade,
    image: Cascade,
    description: Cascade,
    genres: Cascade,
    release_date: Cascade,
}

static FIELDS: Lazy<InfoCascades> = Lazy::new(|| {
    let mut release_date = Cascade::new("releaseDate")
        .text(".released, .year, .date, time, [class*=\"year\"]");
    if let Ok(year) = Regex::new(r"(\d{4})") {
        release_date = release_date.query(".meta", Extract::Capture(year));
    }

    InfoCascades {
        title: Cascade::new("title")
            .text("h1, .entry-title, .title, .post-title")
            .attr("meta[property=\"og:title\"]", "content")
            .text("title"),
        image: Cascade::new("image")
            .attr(".poster img, .thumbnail img, .featured-image img", "src")
            .attr("meta[property=\"og:image\"]", "content")
            .attr(".wp-post-image", "src"),
        description: Cascade::new("description")
            .text(".description, .synopsis, .plot, .entry-content > p, [class*=\"content\"] > p")
            .attr("meta[property=\"og:description\"]", "content"),
        genres: Cascade::new("genres").text(".genres a, .tags a, .categories a, .genre"),
        release_date,
    }
});

/// Origin page of a title: `/movie/<id>` for movie-prefixed IDs, `/series/<id>` otherwise
pub fn info_url(base_url: &str, full_id: &str) -> String {
    let content_type = ContentType::from_id(full_id);
    let bare_id = full_id
        .strip_prefix(ContentType::MOVIE_PREFIX)
        .unwrap_or(full_id);
    format!("{}/{}/{}", base_url, content_type.title_segment(), bare_id)
}

/// Extract title metadata from a title page
pub fn parse_anime_info(html: &str, full_id: &str, url: &str) -> AnimeInfo {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let title = FIELDS.title.first_or(root, "");
    let image = FIELDS.image.first_or(root, "");
    let description = FIELDS.description.first_or(root, "");
    let genres = FIELDS.genres.all(root);
    let release_date = FIELDS.release_date.first_or(root, "Unknown");
    let languages = detect_languages(&format!("{} {}", title, description));

    debug!(
        "Extracted info for {}: title={:?}, {} genres, {} description chars",
        full_id,
        title,
        genres.len(),
        description.len()
    );
    info!("✅ Found title '{}' ({:?})", title, languages);

    AnimeInfo {
        id: full_id.to_string(),
        title,
        image,
        description,
        genres,
        status: "Unknown".to_string(),
        content_type: ContentType::from_id(full_id),
        rating: "N/A".to_string(),
        release_date,
        languages,
        url: url.to_string(),
    }
}
