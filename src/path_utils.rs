//! Path utilities for output naming and source ordering.
//!
//! This module provides helpers for turning comic titles into safe file names,
//! deriving the on-disk location of an output archive, and ordering source
//! files the way a human reads numbered names.

use lazy_static::lazy_static;
use regex::Regex;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

lazy_static! {
    /// Splits a name into alternating runs of digits and non-digits.
    static ref NATURAL_CHUNK_REGEX: Regex = Regex::new(r"\d+|\D+").unwrap();
}

/// Suffix of an archive that is still being written.
pub const PARTIAL_SUFFIX: &str = ".part";

/// Gets the file name from a path with fallback to lossy conversion.
pub fn get_file_name_lossy(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Converts a path to a string with fallback to lossy conversion.
pub fn path_to_string_lossy(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Checks if a filename starts with a dot (hidden file).
pub fn is_hidden_file(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

/// Sanitizes a filename by replacing invalid characters with safe alternatives.
///
/// Trailing dots and spaces are trimmed, and an empty result becomes `_`.
pub fn sanitize_filename(filename: &str) -> String {
    let sanitized: String = filename
        .chars()
        .map(|c| match c {
            '<' | '>' | '"' | '|' | '?' | '*' => '-',
            ':' => '-',
            '/' | '\\' => '-',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = sanitized.trim_end_matches(['.', ' ']);
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Location of the archive for `title`.
///
/// With `separate_folder`, split results are grouped under a folder named
/// after the comic they were split from.
pub fn output_target(
    output_dir: &Path,
    original_title: &str,
    title: &str,
    extension: &str,
    separate_folder: bool,
) -> PathBuf {
    let file_name = format!("{}.{}", sanitize_filename(title), extension);
    if separate_folder {
        output_dir.join(sanitize_filename(original_title)).join(file_name)
    } else {
        output_dir.join(file_name)
    }
}

/// Sibling path an archive is written to before it is complete.
pub fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Compares two names chunk by chunk, numbers by value and text case-insensitively.
///
/// `2.jpg` sorts before `10.jpg`; ties fall back to plain string order so the
/// result is total.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = NATURAL_CHUNK_REGEX.find_iter(a);
    let mut right = NATURAL_CHUNK_REGEX.find_iter(b);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let (x, y) = (x.as_str(), y.as_str());
                let ord = match (x.parse::<u128>(), y.parse::<u128>()) {
                    (Ok(nx), Ok(ny)) => nx.cmp(&ny),
                    _ => x.to_lowercase().cmp(&y.to_lowercase()),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// [`natural_cmp`] over file names.
pub fn compare_paths_naturally(a: &Path, b: &Path) -> Ordering {
    natural_cmp(&get_file_name_lossy(a), &get_file_name_lossy(b))
}
