use std::sync::LazyLock;

use engine_logging::{engine_debug, engine_info, engine_warn};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::text::{inline_text, resolve_url};
use crate::ArticleRecord;

static DIGIT_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d[\d,]*").expect("digit run pattern is valid")
});

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExtractorError {
    #[error("invalid selector {selector:?}: {message}")]
    InvalidSelector { selector: String, message: String },
    #[error("invalid base url {url:?}: {message}")]
    InvalidBaseUrl { url: String, message: String },
}

pub(crate) fn compile(selector: &str) -> Result<Selector, ExtractorError> {
    Selector::parse(selector).map_err(|err| ExtractorError::InvalidSelector {
        selector: selector.to_string(),
        message: err.to_string(),
    })
}

fn compile_all(selectors: &[String]) -> Result<Vec<(String, Selector)>, ExtractorError> {
    selectors
        .iter()
        .map(|s| compile(s).map(|compiled| (s.clone(), compiled)))
        .collect()
}

/// Selector chains for listing pages, each tried in order until one hits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingSelectors {
    /// Article container candidates; the first selector with any match wins.
    pub containers: Vec<String>,
    /// Title/link strategies: heading anchor, title-class anchor, first anchor.
    pub title_links: Vec<String>,
    pub published_at: Vec<String>,
    /// Elements scanned for read/like/comment counts.
    pub stats: String,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            containers: strings(&[
                "div.article-item-box",
                "div.blog-list-box",
                "article",
                r#"div[class*="article"]"#,
                r#"div[class*="blog"]"#,
            ]),
            title_links: strings(&[
                "h1 a[href], h2 a[href], h3 a[href], h4 a[href]",
                r#"a.title[href], a[class*="title"][href]"#,
                "a[href]",
            ]),
            published_at: strings(&["span.date", "time", ".date", "span.time"]),
            stats: "span".to_string(),
        }
    }
}

pub(crate) fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stat {
    Read,
    Like,
    Comment,
}

const READ_KEYWORDS: &[&str] = &["阅读", "read", "view"];
const LIKE_KEYWORDS: &[&str] = &["点赞", "赞", "like", "praise", "👍"];
const COMMENT_KEYWORDS: &[&str] = &["评论", "comment"];

fn classify_stat(label: &str) -> Option<Stat> {
    let label = label.to_lowercase();
    let has = |keywords: &[&str]| keywords.iter().any(|k| label.contains(k));
    if has(READ_KEYWORDS) {
        Some(Stat::Read)
    } else if has(COMMENT_KEYWORDS) {
        Some(Stat::Comment)
    } else if has(LIKE_KEYWORDS) {
        Some(Stat::Like)
    } else {
        None
    }
}

/// First run of digits in `text`, thousands separators ignored.
fn first_number(text: &str) -> Option<u64> {
    let run = DIGIT_RUN.find(text)?;
    run.as_str().replace(',', "").parse().ok()
}

pub struct ListingExtractor {
    base_url: Url,
    containers: Vec<(String, Selector)>,
    title_links: Vec<(String, Selector)>,
    published_at: Vec<Selector>,
    stats: Selector,
}

impl ListingExtractor {
    pub fn new(base_url: &str) -> Result<Self, ExtractorError> {
        Self::with_selectors(base_url, &ListingSelectors::default())
    }

    pub fn with_selectors(
        base_url: &str,
        selectors: &ListingSelectors,
    ) -> Result<Self, ExtractorError> {
        let base_url = Url::parse(base_url).map_err(|err| ExtractorError::InvalidBaseUrl {
            url: base_url.to_string(),
            message: err.to_string(),
        })?;
        Ok(Self {
            base_url,
            containers: compile_all(&selectors.containers)?,
            title_links: compile_all(&selectors.title_links)?,
            published_at: compile_all(&selectors.published_at)?
                .into_iter()
                .map(|(_, sel)| sel)
                .collect(),
            stats: compile(&selectors.stats)?,
        })
    }

    /// Records found on a listing page, in page order, with empty `content`.
    ///
    /// An empty result means no container selector matched; that is not an error here.
    pub fn extract(&self, body: &str) -> Vec<ArticleRecord> {
        let doc = Html::parse_document(body);
        let Some((selector, containers)) = self.locate(&doc) else {
            engine_warn!(
                "No listing container matched; page may be blocked, changed, or past the end"
            );
            return Vec::new();
        };
        engine_info!(
            "Listing selector {:?} matched {} containers",
            selector,
            containers.len()
        );

        let total = containers.len();
        let records: Vec<_> = containers
            .into_iter()
            .enumerate()
            .filter_map(|(index, container)| {
                let record = self.extract_entry(container);
                if record.is_none() {
                    engine_debug!("Dropping container #{index}: no title/link pair");
                }
                record
            })
            .collect();
        if records.len() < total {
            engine_info!("Kept {} of {} containers", records.len(), total);
        }
        records
    }

    fn locate<'a>(&self, doc: &'a Html) -> Option<(&str, Vec<ElementRef<'a>>)> {
        self.containers.iter().find_map(|(name, selector)| {
            let hits: Vec<_> = doc.select(selector).collect();
            (!hits.is_empty()).then_some((name.as_str(), hits))
        })
    }

    fn extract_entry(&self, container: ElementRef<'_>) -> Option<ArticleRecord> {
        let (title, url) = self.title_link(container)?;
        let published_at = self.published_at(container);
        let (read_count, like_count, comment_count) = self.stats(container);
        Some(ArticleRecord {
            title,
            url: url.into(),
            published_at,
            read_count,
            like_count,
            comment_count,
            content: String::new(),
        })
    }

    fn title_link(&self, container: ElementRef<'_>) -> Option<(String, Url)> {
        self.title_links.iter().find_map(|(_, selector)| {
            container.select(selector).find_map(|anchor| {
                let title = inline_text(anchor);
                if title.is_empty() {
                    return None;
                }
                let url = resolve_url(anchor.value().attr("href")?, &self.base_url)?;
                Some((title, url))
            })
        })
    }

    fn published_at(&self, container: ElementRef<'_>) -> String {
        self.published_at
            .iter()
            .find_map(|selector| {
                container.select(selector).find_map(|el| {
                    let text = inline_text(el);
                    if !text.is_empty() {
                        return Some(text);
                    }
                    el.value()
                        .attr("datetime")
                        .map(str::trim)
                        .filter(|v| !v.is_empty())
                        .map(str::to_string)
                })
            })
            .unwrap_or_default()
    }

    fn stats(&self, container: ElementRef<'_>) -> (u64, u64, u64) {
        let (mut read, mut like, mut comment) = (None, None, None);
        for span in container.select(&self.stats) {
            let text = inline_text(span);
            let Some(count) = first_number(&text) else {
                continue;
            };
            // Class names are shared between counters on some variants; the text decides.
            let stat = classify_stat(&text)
                .or_else(|| span.value().attr("class").and_then(classify_stat));
            let slot = match stat {
                Some(Stat::Read) => &mut read,
                Some(Stat::Like) => &mut like,
                Some(Stat::Comment) => &mut comment,
                None => continue,
            };
            slot.get_or_insert(count);
        }
        (
            read.unwrap_or(0),
            like.unwrap_or(0),
            comment.unwrap_or(0),
        )
    }
}
