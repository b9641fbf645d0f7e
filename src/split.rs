//! Split engine: partitions one [`Comic`] into several.
//!
//! Splitting never mutates the input. Every resulting comic owns its own
//! chapter list (a copy of a consecutive run of the original chapters) and a
//! copy of the original metadata. Pages inside a chapter are never reordered.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::comic::{Chapter, Comic, format_order};

lazy_static! {
    /// Matches `{name}` placeholders in title and label templates.
    static ref PLACEHOLDER_REGEX: Regex = Regex::new(r"\{(\w+)\}").unwrap();
}

/// Default title template for both split modes.
pub const DEFAULT_SPLIT_TITLE_FORMAT: &str = "{title}-{index}";

/// How a comic is partitioned into output archives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SplitPolicy {
    /// Consecutive runs of `chapters_per_group` chapters; `{index}` is 1-based.
    Fixed {
        chapters_per_group: usize,
        replace_cover: bool,
        title_format: String,
    },
    /// A new group starts before each chapter whose order is a breakpoint; `{index}` is 0-based.
    Manual {
        breakpoints: Vec<f64>,
        replace_cover: bool,
        title_format: String,
    },
}

impl SplitPolicy {
    pub fn fixed(chapters_per_group: usize) -> Self {
        SplitPolicy::Fixed {
            chapters_per_group,
            replace_cover: false,
            title_format: DEFAULT_SPLIT_TITLE_FORMAT.to_string(),
        }
    }

    pub fn manual(breakpoints: Vec<f64>) -> Self {
        SplitPolicy::Manual {
            breakpoints,
            replace_cover: false,
            title_format: DEFAULT_SPLIT_TITLE_FORMAT.to_string(),
        }
    }
}

/// Substitutes `{name}` placeholders in a single pass.
///
/// Unknown placeholders are left as written, and substituted values are never
/// re-scanned, so a chapter title containing `{index}` stays literal.
pub fn fill_template(template: &str, values: &[(&str, String)]) -> String {
    PLACEHOLDER_REGEX
        .replace_all(template, |caps: &Captures| {
            let key = &caps[1];
            values
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| value.clone())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Splits `comic` according to `policy`.
pub fn split(comic: &Comic, policy: &SplitPolicy) -> Vec<Comic> {
    match policy {
        SplitPolicy::Fixed {
            chapters_per_group,
            replace_cover,
            title_format,
        } => fixed_split(comic, *chapters_per_group, *replace_cover, title_format),
        SplitPolicy::Manual {
            breakpoints,
            replace_cover,
            title_format,
        } => manual_split(comic, breakpoints, *replace_cover, title_format),
    }
}

/// Groups chapters into consecutive runs of `chapters_per_group`; the last run may be shorter.
///
/// # Panics
///
/// Panics if `chapters_per_group` is zero.
pub fn fixed_split(
    comic: &Comic,
    chapters_per_group: usize,
    replace_cover: bool,
    title_format: &str,
) -> Vec<Comic> {
    assert!(chapters_per_group > 0, "fixed split needs at least one chapter per group");

    comic
        .chapters
        .chunks(chapters_per_group)
        .enumerate()
        .map(|(i, chapters)| build_group(comic, chapters.to_vec(), i + 1, replace_cover, title_format))
        .collect()
}

/// Starts a new group immediately before every chapter whose order equals a breakpoint.
///
/// A breakpoint that would open an empty group is ignored, so a breakpoint on
/// the first chapter, or repeated breakpoints, never produce zero-chapter groups.
/// With no matching breakpoint all chapters land in a single group.
pub fn manual_split(
    comic: &Comic,
    breakpoints: &[f64],
    replace_cover: bool,
    title_format: &str,
) -> Vec<Comic> {
    if comic.chapters.is_empty() {
        return Vec::new();
    }

    let mut groups: Vec<Vec<Chapter>> = Vec::new();
    let mut current: Vec<Chapter> = Vec::new();
    for chapter in &comic.chapters {
        let is_break = breakpoints.iter().any(|b| *b == chapter.order);
        if is_break && !current.is_empty() {
            groups.push(std::mem::take(&mut current));
        }
        current.push(chapter.clone());
    }
    groups.push(current);

    groups
        .into_iter()
        .enumerate()
        .map(|(i, chapters)| build_group(comic, chapters, i, replace_cover, title_format))
        .collect()
}

fn build_group(
    comic: &Comic,
    chapters: Vec<Chapter>,
    index: usize,
    replace_cover: bool,
    title_format: &str,
) -> Comic {
    let (first, last) = match (chapters.first(), chapters.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return comic.with_chapters(comic.title.clone(), chapters),
    };

    let title = fill_template(
        title_format,
        &[
            ("title", comic.title.clone()),
            ("index", index.to_string()),
            ("first_ord", format_order(first.order)),
            ("last_ord", format_order(last.order)),
            ("first_title", first.title.clone()),
            ("last_title", last.title.clone()),
        ],
    );

    let cover_path = if replace_cover {
        first
            .pages
            .first()
            .map(|p| p.source_path.clone())
            .or_else(|| comic.cover_path.clone())
    } else {
        comic.cover_path.clone()
    };

    let mut group = comic.with_chapters(title, chapters);
    group.cover_path = cover_path;
    group
}
