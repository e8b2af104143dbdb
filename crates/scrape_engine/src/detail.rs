use engine_logging::{engine_debug, engine_warn};
use scraper::{Html, Selector};

use crate::listing::{compile, strings, ExtractorError};
use crate::text::flatten_text;

pub const DEFAULT_CONTENT_BUDGET: usize = 1_500;
pub const TRUNCATION_MARKER: &str = "...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailSettings {
    /// Content block candidates; the first selector with a match wins.
    pub content_selectors: Vec<String>,
    /// Maximum content length in characters, marker excluded.
    pub content_budget: usize,
    pub truncation_marker: String,
}

impl Default for DetailSettings {
    fn default() -> Self {
        Self {
            content_selectors: strings(&[
                "#content_views",
                ".markdown_views",
                ".htmledit_views",
                "article",
                ".blog-content-box",
                ".article-content",
            ]),
            content_budget: DEFAULT_CONTENT_BUDGET,
            truncation_marker: TRUNCATION_MARKER.to_string(),
        }
    }
}

pub struct DetailExtractor {
    selectors: Vec<(String, Selector)>,
    budget: usize,
    marker: String,
}

impl DetailExtractor {
    pub fn new(settings: &DetailSettings) -> Result<Self, ExtractorError> {
        let selectors = settings
            .content_selectors
            .iter()
            .map(|s| compile(s).map(|sel| (s.clone(), sel)))
            .collect::<Result<_, _>>()?;
        Ok(Self {
            selectors,
            budget: settings.content_budget,
            marker: settings.truncation_marker.clone(),
        })
    }

    /// Normalized, budget-bounded article text; empty when no content block matched.
    pub fn extract(&self, body: &str) -> String {
        let doc = Html::parse_document(body);
        let hit = self
            .selectors
            .iter()
            .find_map(|(name, selector)| doc.select(selector).next().map(|el| (name, el)));
        match hit {
            Some((name, element)) => {
                let text = flatten_text(element);
                engine_debug!(
                    "Content selector {:?} matched, {} chars",
                    name,
                    text.chars().count()
                );
                truncate_chars(text, self.budget, &self.marker)
            }
            None => {
                engine_warn!("No content selector matched on detail page");
                String::new()
            }
        }
    }
}

/// Cut `text` to `budget` characters and append `marker` when anything was cut.
pub fn truncate_chars(mut text: String, budget: usize, marker: &str) -> String {
    match text.char_indices().nth(budget) {
        Some((cut, _)) => {
            text.truncate(cut);
            text.push_str(marker);
            text
        }
        None => text,
    }
}
