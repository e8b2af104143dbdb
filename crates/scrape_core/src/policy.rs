use serde::{Deserialize, Serialize};

/// Tunable pagination limits.
///
/// The low-yield values are a blocking heuristic tuned for one blog host; they
/// are not expected to carry over to other targets unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationPolicy {
    /// Page ceiling; `None` paginates until another condition stops the run.
    pub max_pages: Option<u32>,
    /// A page yielding fewer records than this counts as low-yield.
    pub low_yield_threshold: usize,
    /// Consecutive low-yield pages (past page 1) that halt pagination; 0 acts as 1.
    pub low_yield_streak: u32,
}

impl Default for PaginationPolicy {
    fn default() -> Self {
        Self {
            max_pages: Some(5),
            low_yield_threshold: 5,
            low_yield_streak: 2,
        }
    }
}

impl PaginationPolicy {
    pub fn unbounded() -> Self {
        Self {
            max_pages: None,
            ..Self::default()
        }
    }

    pub fn with_max_pages(mut self, max_pages: Option<u32>) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub(crate) fn streak_limit(&self) -> u32 {
        self.low_yield_streak.max(1)
    }

    pub(crate) fn page_limit_reached(&self, page: u32) -> bool {
        self.max_pages.is_some_and(|max| page >= max)
    }
}
