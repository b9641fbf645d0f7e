//! In-memory comic model: an ordered tree of [`Comic`] → [`Chapter`] → [`Page`].
//!
//! The model never holds image data. A [`Page`] only references its source
//! file; bytes are read on demand at packaging time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Title given to the synthetic chapter that collects duplicated pages.
pub const COPYRIGHT_CHAPTER_TITLE: &str = "copyright";

/// Fixed-size perceptual fingerprint of a page's visual content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageHash(pub u64);

impl fmt::Display for ImageHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// A single page image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Sort rank, not required to be contiguous.
    pub order: f64,
    pub title: String,
    pub source_path: PathBuf,
    /// Assigned by the dedup engine.
    #[serde(default)]
    pub content_hash: Option<ImageHash>,
}

impl Page {
    pub fn new(order: f64, title: impl Into<String>, source_path: impl Into<PathBuf>) -> Self {
        Self {
            order,
            title: title.into(),
            source_path: source_path.into(),
            content_hash: None,
        }
    }
}

/// An ordered run of pages. `pages` is the reading order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub order: f64,
    pub title: String,
    pub pages: Vec<Page>,
}

impl Chapter {
    pub fn new(order: f64, title: impl Into<String>, pages: Vec<Page>) -> Self {
        Self {
            order,
            title: title.into(),
            pages,
        }
    }

    /// The trailing chapter that holds one representative per duplicated page.
    /// Its order is `+inf` so it always sorts last.
    pub fn copyright() -> Self {
        Self::new(f64::INFINITY, COPYRIGHT_CHAPTER_TITLE, Vec::new())
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// A comic and its descriptive metadata. `chapters` is the reading order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comic {
    pub title: String,
    pub cover_path: Option<PathBuf>,
    pub chapters: Vec<Chapter>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub subjects: Vec<String>,
    pub publisher: Option<String>,
    pub description: Option<String>,
}

impl Comic {
    pub fn new(title: impl Into<String>, chapters: Vec<Chapter>) -> Self {
        Self {
            title: title.into(),
            chapters,
            ..Default::default()
        }
    }

    /// Copies the title, cover and metadata into a new comic owning `chapters`.
    pub fn with_chapters(&self, title: String, chapters: Vec<Chapter>) -> Self {
        Self {
            title,
            cover_path: self.cover_path.clone(),
            chapters,
            authors: self.authors.clone(),
            subjects: self.subjects.clone(),
            publisher: self.publisher.clone(),
            description: self.description.clone(),
        }
    }

    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    pub fn total_pages(&self) -> usize {
        self.chapters.iter().map(Chapter::page_count).sum()
    }

    /// Iterates every page in reading order, chapter by chapter.
    pub fn pages(&self) -> impl Iterator<Item = &Page> {
        self.chapters.iter().flat_map(|c| c.pages.iter())
    }
}

/// Renders a chapter order as an integer when it is a whole number.
pub fn format_order(order: f64) -> String {
    if order.is_finite() && order.fract() == 0.0 {
        format!("{}", order as i64)
    } else {
        format!("{}", order)
    }
}
