//! Generator module provides the packager trait and its archive backends.
//!
//! A generator owns exactly one output file. Pages are added in reading order
//! and every identifier is assigned from call order, so one handle must never
//! be driven concurrently. `save` consumes the handle, which makes adding a
//! page after finalization impossible.

use crate::error::Result;
use crate::log_scope::LogScope;
use crate::types::{Direction, EbookMetadata};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::path::Path;

pub mod cbz;
pub mod epub;

lazy_static! {
    /// Matches `%name%` placeholders in the bundled templates.
    static ref TEMPLATE_PLACEHOLDER_REGEX: Regex = Regex::new(r"%(\w+)%").unwrap();
}

/// Fixed-layout rendering parameters shared by all pages of one archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorOptions {
    pub view_width: u32,
    pub view_height: u32,
    pub reading_direction: Direction,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            view_width: 848,
            view_height: 1200,
            reading_direction: Direction::Ltr,
        }
    }
}

/// One page handed to a generator.
#[derive(Debug, Clone, Default)]
pub struct PageEntry {
    pub data: Vec<u8>,
    /// Image extension, with or without the leading dot.
    pub extension: String,
    pub chapter_label: Option<String>,
    pub page_label: Option<String>,
    pub is_cover: bool,
    /// Table-of-contents label pointing at this page.
    pub nav_label: Option<String>,
}

impl PageEntry {
    pub fn new(data: Vec<u8>, extension: impl Into<String>) -> Self {
        Self {
            data,
            extension: extension.into(),
            ..Default::default()
        }
    }

    pub fn cover(data: Vec<u8>, extension: impl Into<String>) -> Self {
        Self {
            is_cover: true,
            page_label: Some("cover".to_string()),
            ..Self::new(data, extension)
        }
    }

    pub fn labeled(mut self, chapter: impl Into<String>, page: impl Into<String>) -> Self {
        self.chapter_label = Some(chapter.into());
        self.page_label = Some(page.into());
        self
    }

    pub fn with_nav_label(mut self, label: impl Into<String>) -> Self {
        self.nav_label = Some(label.into());
        self
    }
}

/// Common interface for all archive generators.
///
/// The `Generator` trait defines a consistent API for packagers that create
/// different file formats (CBZ, EPUB) from already encoded page images.
#[async_trait]
pub trait Generator {
    /// Creates the output file and writes any leading entries.
    ///
    /// # Parameters
    /// * `output_file` - Path of the archive to create; parent directories are created
    /// * `metadata` - Descriptive metadata embedded on save
    /// * `options` - Fixed-layout viewport and reading direction
    /// * `scope` - Logging context of the comic being packaged
    fn new(
        output_file: &Path,
        metadata: &EbookMetadata,
        options: &GeneratorOptions,
        scope: LogScope,
    ) -> Result<Self>
    where
        Self: Sized;

    /// Appends a page in reading order.
    ///
    /// # Returns
    /// * `Result<&mut Self>` - Self reference for method chaining, or an error if failed
    async fn add_page(&mut self, page: PageEntry) -> Result<&mut Self>
    where
        Self: Sized;

    /// Writes the metadata documents and finishes the archive.
    async fn save(self) -> Result<()>;
}

/// Escapes the five XML special characters.
pub fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Fills `%name%` placeholders in a single pass; unknown names are left as written.
pub fn render_template(template: &str, values: &[(&str, &str)]) -> String {
    TEMPLATE_PLACEHOLDER_REGEX
        .replace_all(template, |caps: &Captures| {
            values
                .iter()
                .find(|(name, _)| *name == &caps[1])
                .map(|(_, value)| value.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Opens `output_file` for writing, creating its parent directories.
fn create_output(output_file: &Path) -> Result<std::fs::File> {
    if let Some(parent) = output_file.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    // A partial archive belongs to exactly one writer.
    Ok(std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(output_file)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_xml() {
        assert_eq!(
            escape_xml(r#"Tom & "Jerry" <'s>"#),
            "Tom &amp; &quot;Jerry&quot; &lt;&apos;s&gt;"
        );
    }

    #[test]
    fn test_render_template_single_pass() {
        let out = render_template(
            r#"<a width="100%" t="%title%">%body% %missing%</a>"#,
            &[("title", "%body%"), ("body", "x")],
        );
        assert_eq!(out, r#"<a width="100%" t="%body%">x %missing%</a>"#);
    }
}
