/// Ordered extraction strategies evaluated until one yields a value
///
/// Every field pulled out of an origin page goes through a [`Cascade`]: a list of
/// `(query, extract)` pairs ordered from the most specific markup to the most generic
/// fallback (meta tags, page title, own attributes). The first strategy whose result
/// is non-empty after trimming wins.
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Selector};
use tracing::{debug, warn};

static BACKGROUND_URL: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"url\(\s*['"]?(.*?)['"]?\s*\)"#).ok());

/// How a value is read from a matched element
#[derive(Debug, Clone)]
pub enum Extract {
    /// Concatenated text of the element and its descendants
    Text,
    /// Value of the named attribute
    Attr(&'static str),
    /// URL inside a CSS `background-image: url(...)` in the `style` attribute
    BackgroundUrl,
    /// First capture group (or whole match) of a pattern applied to the element text
    Capture(Regex),
}

#[derive(Debug)]
enum Target {
    /// The element the cascade is evaluated against
    Scope,
    /// First descendant matching the selector
    Css(Selector),
}

#[derive(Debug)]
struct Strategy {
    label: String,
    target: Target,
    extract: Extract,
}

/// Ordered list of extraction strategies for one field
#[derive(Debug)]
pub struct Cascade {
    field: &'static str,
    strategies: Vec<Strategy>,
}

impl Cascade {
    /// Create an empty cascade for the named field
    pub fn new(field: &'static str) -> Self {
        Self {
            field,
            strategies: Vec::new(),
        }
    }

    /// Append a strategy querying `css` below the scope.
    ///
    /// A selector that does not parse is skipped, leaving the rest of the cascade intact.
    pub fn query(mut self, css: &str, extract: Extract) -> Self {
        match Selector::parse(css) {
            Ok(selector) => self.strategies.push(Strategy {
                label: format!("{} -> {}", css, describe(&extract)),
                target: Target::Css(selector),
                extract,
            }),
            Err(e) => warn!("Skipping unparseable selector for {}: {} ({:?})", self.field, css, e),
        }
        self
    }

    /// Append a text strategy on the first element matching `css`
    pub fn text(self, css: &str) -> Self {
        self.query(css, Extract::Text)
    }

    /// Append an attribute strategy on the first element matching `css`
    pub fn attr(self, css: &str, name: &'static str) -> Self {
        self.query(css, Extract::Attr(name))
    }

    /// Append a strategy reading the scope element itself
    pub fn own(mut self, extract: Extract) -> Self {
        self.strategies.push(Strategy {
            label: format!(":scope -> {}", describe(&extract)),
            target: Target::Scope,
            extract,
        });
        self
    }

    pub fn own_text(self) -> Self {
        self.own(Extract::Text)
    }

    pub fn own_attr(self, name: &'static str) -> Self {
        self.own(Extract::Attr(name))
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// First non-empty value in strategy order
    pub fn first(&self, scope: ElementRef<'_>) -> Option<String> {
        for strategy in &self.strategies {
            let target = match &strategy.target {
                Target::Scope => Some(scope),
                Target::Css(selector) => scope.select(selector).next(),
            };

            if let Some(value) = target.and_then(|element| apply(&strategy.extract, element)) {
                debug!(field = self.field, strategy = %strategy.label, "cascade matched");
                return Some(value);
            }
        }

        debug!(field = self.field, "cascade exhausted");
        None
    }

    /// First non-empty value, or `default` when every strategy comes up empty
    pub fn first_or(&self, scope: ElementRef<'_>, default: impl Into<String>) -> String {
        self.first(scope).unwrap_or_else(|| default.into())
    }

    /// Every non-empty value of the first strategy that yields any
    pub fn all(&self, scope: ElementRef<'_>) -> Vec<String> {
        for strategy in &self.strategies {
            let values: Vec<String> = match &strategy.target {
                Target::Scope => apply(&strategy.extract, scope).into_iter().collect(),
                Target::Css(selector) => scope
                    .select(selector)
                    .filter_map(|element| apply(&strategy.extract, element))
                    .collect(),
            };

            if !values.is_empty() {
                debug!(field = self.field, strategy = %strategy.label, count = values.len(), "cascade matched");
                return values;
            }
        }

        debug!(field = self.field, "cascade exhausted");
        Vec::new()
    }
}

/// Full text of an element with whitespace trimmed
pub fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn apply(extract: &Extract, element: ElementRef<'_>) -> Option<String> {
    let raw = match extract {
        Extract::Text => Some(element.text().collect::<String>()),
        Extract::Attr(name) => element.value().attr(name).map(str::to_string),
        Extract::BackgroundUrl => element
            .value()
            .attr("style")
            .and_then(background_url),
        Extract::Capture(re) => {
            let text = element.text().collect::<String>();
            re.captures(&text).and_then(|caps| {
                caps.get(1)
                    .or_else(|| caps.get(0))
                    .map(|m| m.as_str().to_string())
            })
        }
    }?;

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Pull the URL out of an inline `background-image: url(...)` declaration
pub fn background_url(style: &str) -> Option<String> {
    BACKGROUND_URL
        .as_ref()?
        .captures(style)?
        .get(1)
        .map(|m| m.as_str().to_string())
        .filter(|url| !url.is_empty())
}

fn describe(extract: &Extract) -> String {
    match extract {
        Extract::Text => "text".to_string(),
        Extract::Attr(name) => format!("@{}", name),
        Extract::BackgroundUrl => "background-url".to_string(),
        Extract::Capture(re) => format!("/{}/", re.as_str()),
    }
}
