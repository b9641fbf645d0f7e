//! Filter pipeline: accept/reject predicates and in-place comic transforms.
//!
//! A [`Filter`] inspects a comic and returns `false` to reject it; filters may
//! also prune the comic in place (see [`ChapterFilter`]). A [`Handler`]
//! transforms an accepted comic (see [`crate::dedup::Dedup`]).

use log::info;

use crate::comic::Comic;
use crate::error::Result;
use crate::log_scope::LogScope;
use crate::types::PageWarning;

/// A predicate over a comic. Returning `false` rejects the comic.
pub trait Filter: Send + Sync {
    fn name(&self) -> &'static str;

    fn filter(&self, comic: &mut Comic) -> bool;
}

/// A fallible in-place comic transform run after the filters accepted.
///
/// Returns the page-level problems it recovered from.
pub trait Handler: Send + Sync {
    fn name(&self) -> &'static str;

    fn handle(&self, comic: &mut Comic) -> Result<Vec<PageWarning>>;
}

/// Rejects comics that are too short or padded with near-empty chapters.
#[derive(Debug, Clone)]
pub struct ComicFilter {
    pub min_chapters: Option<usize>,
    pub min_total_pages: Option<usize>,
    pub min_pages: Option<usize>,
    pub min_pages_ratio: Option<f64>,
    scope: LogScope,
}

impl ComicFilter {
    pub fn new(
        min_chapters: Option<usize>,
        min_total_pages: Option<usize>,
        min_pages: Option<usize>,
        min_pages_ratio: Option<f64>,
        scope: LogScope,
    ) -> Self {
        Self {
            min_chapters,
            min_total_pages,
            min_pages,
            min_pages_ratio,
            scope,
        }
    }

    /// Page count of the chapter at rank `floor(chapters * ratio)` after sorting ascending.
    ///
    /// The rank is clamped to the last chapter; an empty comic has rank count 0.
    pub fn ranked_page_count(comic: &Comic, ratio: f64) -> usize {
        let mut counts: Vec<usize> = comic.chapters.iter().map(|c| c.page_count()).collect();
        if counts.is_empty() {
            return 0;
        }
        counts.sort_unstable();
        let rank = ((counts.len() as f64) * ratio).floor() as usize;
        counts[rank.min(counts.len() - 1)]
    }
}

impl Filter for ComicFilter {
    fn name(&self) -> &'static str {
        "comic"
    }

    fn filter(&self, comic: &mut Comic) -> bool {
        if let Some(min_chapters) = self.min_chapters {
            if comic.chapter_count() < min_chapters {
                info!(
                    "{} Too few chapters: {} ({} chapters)",
                    self.scope,
                    comic.title,
                    comic.chapter_count()
                );
                return false;
            }
        }

        if let Some(min_total_pages) = self.min_total_pages {
            let total = comic.total_pages();
            if total < min_total_pages {
                info!("{} Too few pages: {} ({} pages)", self.scope, comic.title, total);
                return false;
            }
        }

        if let (Some(min_pages), Some(ratio)) = (self.min_pages, self.min_pages_ratio) {
            if ratio >= 0.0 {
                let ranked = Self::ranked_page_count(comic, ratio);
                if ranked < min_pages {
                    info!(
                        "{} Too many short chapters: {} ({}/{} chapters)",
                        self.scope,
                        comic.title,
                        ranked,
                        comic.chapter_count()
                    );
                    return false;
                }
            }
        }

        true
    }
}

/// Drops chapters longer than `max_pages`. Never rejects.
#[derive(Debug, Clone)]
pub struct ChapterFilter {
    pub max_pages: Option<usize>,
    scope: LogScope,
}

impl ChapterFilter {
    pub fn new(max_pages: Option<usize>, scope: LogScope) -> Self {
        Self { max_pages, scope }
    }
}

impl Filter for ChapterFilter {
    fn name(&self) -> &'static str {
        "chapter"
    }

    fn filter(&self, comic: &mut Comic) -> bool {
        let Some(max_pages) = self.max_pages else {
            return true;
        };
        let title = comic.title.clone();
        comic.chapters.retain(|chapter| {
            let keep = chapter.page_count() <= max_pages;
            if !keep {
                info!("{} Chapter too long: {} in {}", self.scope, chapter.title, title);
            }
            keep
        });
        true
    }
}

/// Ordered filters evaluated with early exit on the first rejection.
#[derive(Default)]
pub struct FilterPipeline {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, filter: impl Filter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn push(&mut self, filter: impl Filter + 'static) -> &mut Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Runs every filter in order. Filters after a rejection are not run.
    pub fn accept(&self, comic: &mut Comic) -> bool {
        self.filters.iter().all(|f| f.filter(comic))
    }
}

/// Ordered handlers applied to an accepted comic.
#[derive(Default)]
pub struct ProcessPipeline {
    handlers: Vec<Box<dyn Handler>>,
}

impl ProcessPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, handler: impl Handler + 'static) -> &mut Self {
        self.handlers.push(Box::new(handler));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn run(&self, comic: &mut Comic) -> Result<Vec<PageWarning>> {
        let mut warnings = Vec::new();
        for handler in &self.handlers {
            warnings.extend(handler.handle(comic)?);
        }
        Ok(warnings)
    }
}
