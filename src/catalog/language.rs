/// Audio/subtitle language detection from free text
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Languages the catalog labels its releases with
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Language {
    Hindi,
    Tamil,
    Telugu,
    English,
    Japanese,
    Unknown,
}

impl Language {
    pub fn name(&self) -> &'static str {
        match self {
            Language::Hindi => "Hindi",
            Language::Tamil => "Tamil",
            Language::Telugu => "Telugu",
            Language::English => "English",
            Language::Japanese => "Japanese",
            Language::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// Declaration order is the output order.
static SIGNATURES: Lazy<Vec<(Language, Regex)>> = Lazy::new(|| {
    [
        (Language::Hindi, r"(?i)hindi|हिन्दी|हिंदी"),
        (Language::Tamil, r"(?i)tamil|தமிழ்"),
        (Language::Telugu, r"(?i)telugu|తెలుగు"),
        (Language::English, r"(?i)english|eng"),
        (Language::Japanese, r"(?i)japanese|jp|jpn"),
    ]
    .into_iter()
    .filter_map(|(language, pattern)| Regex::new(pattern).ok().map(|re| (language, re)))
    .collect()
});

/// Detect every known language mentioned anywhere in `text`.
///
/// Matches come back in signature order without duplicates. Text with no
/// recognizable signature yields exactly `[Unknown]`.
pub fn detect_languages(text: &str) -> Vec<Language> {
    let detected: Vec<Language> = SIGNATURES
        .iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(language, _)| *language)
        .collect();

    if detected.is_empty() {
        vec![Language::Unknown]
    } else {
        detected
    }
}

/// First detected language, `Unknown` when nothing matches
pub fn primary_language(text: &str) -> Language {
    detect_languages(text)
        .into_iter()
        .next()
        .unwrap_or(Language::Unknown)
}

/// Append `incoming` to `languages`, skipping ones already present and any `Unknown`
/// once a real language is known
pub fn merge_languages(languages: &mut Vec<Language>, incoming: &[Language]) {
    for language in incoming {
        if !languages.contains(language) {
            languages.push(*language);
        }
    }

    if languages.len() > 1 {
        languages.retain(|language| *language != Language::Unknown);
    }
}
