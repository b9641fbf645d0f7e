//! Core enums, metadata, and reports for the Tankobon packing library.
//!
//! This module defines:
//! - Configuration selectors (`FileFormat`, `Direction`, `HashAlgorithm`, `ResizeKernel`,
//!   `ImageKind`, `SourceFormat`, `DedupFailurePolicy`)
//! - Archive metadata (`EbookMetadata`)
//! - Reporting types (`PackOutcome`, `PageWarning`, `ComicReport`, `RunReport`)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::comic::Comic;
use crate::error::{Error, Result};

/// Output archive format.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    #[default]
    Epub,
    Cbz,
}

impl FileFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Epub => "epub",
            FileFormat::Cbz => "cbz",
        }
    }
}

impl FromStr for FileFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "epub" => Ok(FileFormat::Epub),
            "cbz" => Ok(FileFormat::Cbz),
            other => Err(Error::Config(format!("Invalid output format {}", other))),
        }
    }
}

/// Reading direction of a fixed-layout EPUB.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Ltr,
    Rtl,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Ltr => write!(f, "ltr"),
            Direction::Rtl => write!(f, "rtl"),
        }
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ltr" => Ok(Direction::Ltr),
            "rtl" => Ok(Direction::Rtl),
            other => Err(Error::Config(format!("Invalid reading order {}", other))),
        }
    }
}

/// Perceptual hash family used for duplicate detection.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// Mean hash over an 8x8 thumbnail.
    AHash,
    /// Gradient hash over a 9x8 thumbnail.
    DHash,
    /// DCT hash over a 32x32 thumbnail.
    #[default]
    PHash,
    /// Haar wavelet hash over a 64x64 thumbnail.
    WHash,
}

impl FromStr for HashAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ahash" => Ok(HashAlgorithm::AHash),
            "dhash" => Ok(HashAlgorithm::DHash),
            "phash" => Ok(HashAlgorithm::PHash),
            "whash" => Ok(HashAlgorithm::WHash),
            other => Err(Error::Config(format!("Invalid hash method {}", other))),
        }
    }
}

/// Resampling kernel used when downsampling.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResizeKernel {
    Nearest,
    Linear,
    #[default]
    Cubic,
    Gaussian,
    Lanczos,
}

impl ResizeKernel {
    pub fn filter_type(&self) -> image::imageops::FilterType {
        use image::imageops::FilterType;
        match self {
            ResizeKernel::Nearest => FilterType::Nearest,
            ResizeKernel::Linear => FilterType::Triangle,
            ResizeKernel::Cubic => FilterType::CatmullRom,
            ResizeKernel::Gaussian => FilterType::Gaussian,
            ResizeKernel::Lanczos => FilterType::Lanczos3,
        }
    }
}

impl FromStr for ResizeKernel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "nearest" => Ok(ResizeKernel::Nearest),
            "linear" | "bilinear" => Ok(ResizeKernel::Linear),
            "cubic" | "bicubic" => Ok(ResizeKernel::Cubic),
            "gaussian" => Ok(ResizeKernel::Gaussian),
            "lanczos" => Ok(ResizeKernel::Lanczos),
            other => Err(Error::Config(format!("Invalid interpolation {}", other))),
        }
    }
}

/// Image encodings the image pipeline can write.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Jpeg,
    Png,
    Webp,
    Avif,
}

impl ImageKind {
    /// Parses an extension with or without its leading dot.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match normalize_extension(ext).as_str() {
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            "png" => Some(ImageKind::Png),
            "webp" => Some(ImageKind::Webp),
            "avif" => Some(ImageKind::Avif),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
            ImageKind::Webp => "webp",
            ImageKind::Avif => "avif",
        }
    }
}

impl FromStr for ImageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ImageKind::from_extension(s)
            .ok_or_else(|| Error::Config(format!("Unsupported format {}", s)))
    }
}

/// Directory layout understood by the bundled parsers.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    #[default]
    General,
    Tachiyomi,
    DmzjBackup,
    ZmhBackup,
    Bcdown,
}

impl FromStr for SourceFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "general" => Ok(SourceFormat::General),
            "tachiyomi" => Ok(SourceFormat::Tachiyomi),
            "dmzjbackup" => Ok(SourceFormat::DmzjBackup),
            "zmhbackup" => Ok(SourceFormat::ZmhBackup),
            "bcdown" => Ok(SourceFormat::Bcdown),
            other => Err(Error::Config(format!("Invalid source format: {}", other))),
        }
    }
}

/// What the dedup engine does when a page cannot be hashed.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum DedupFailurePolicy {
    /// Leave the page in place, exclude it from dedup, and warn.
    #[default]
    Skip,
    /// Fail the whole comic.
    Abort,
}

impl FromStr for DedupFailurePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(DedupFailurePolicy::Skip),
            "abort" => Ok(DedupFailurePolicy::Abort),
            other => Err(Error::Config(format!("Invalid dedup failure policy {}", other))),
        }
    }
}

/// Lowercases an extension and strips its leading dot.
pub fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_ascii_lowercase()
}

/// Determines the canonical extension and MIME type of a page extension.
///
/// # Supported formats
///
/// - JPEG/JPG: image/jpeg
/// - PNG: image/png
/// - WebP: image/webp
/// - AVIF: image/avif
/// - GIF: image/gif
/// - BMP: image/bmp
pub fn get_file_info(ext: &str) -> Result<(&'static str, &'static str)> {
    match normalize_extension(ext).as_str() {
        "jpg" | "jpeg" => Ok(("jpg", "image/jpeg")),
        "png" => Ok(("png", "image/png")),
        "webp" => Ok(("webp", "image/webp")),
        "avif" => Ok(("avif", "image/avif")),
        "gif" => Ok(("gif", "image/gif")),
        "bmp" => Ok(("bmp", "image/bmp")),
        other => Err(Error::Unsupported(format!("Image format {:?}", other))),
    }
}

/// Metadata embedded into one output archive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EbookMetadata {
    pub title: String,
    pub authors: Vec<String>,
    pub publisher: Option<String>,
    pub description: Option<String>,
    pub subjects: Vec<String>, // General tags/subjects
    pub language: String,      // e.g., "en", "ja"
    pub identifier: String,    // e.g., urn:uuid:...
    pub modified: DateTime<Utc>,
}

impl EbookMetadata {
    /// Builds the metadata of an archive from its comic, with a fresh identifier.
    pub fn from_comic(comic: &Comic, language: &str) -> Self {
        Self {
            title: comic.title.clone(),
            authors: comic.authors.clone(),
            publisher: comic.publisher.clone(),
            description: comic.description.clone(),
            subjects: comic.subjects.clone(),
            language: language.to_string(),
            identifier: format!("urn:uuid:{}", uuid::Uuid::new_v4()),
            modified: Utc::now(),
        }
    }

    pub fn default_with_title(title: String) -> Self {
        Self {
            title,
            language: "en".to_string(),
            identifier: format!("urn:uuid:{}", uuid::Uuid::new_v4()),
            modified: Utc::now(),
            ..Default::default()
        }
    }
}

/// A recovered page-level problem that did not abort its comic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageWarning {
    pub chapter: Option<String>,
    pub page: String,
    pub message: String,
}

impl fmt::Display for PageWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.chapter {
            Some(chapter) => write!(f, "{}: {} in {}", self.message, self.page, chapter),
            None => write!(f, "{}: {}", self.message, self.page),
        }
    }
}

/// Final state of one output archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PackOutcome {
    Written,
    SkippedExists,
    Rejected,
    Failed(String),
}

impl fmt::Display for PackOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackOutcome::Written => write!(f, "written"),
            PackOutcome::SkippedExists => write!(f, "skipped - already exists"),
            PackOutcome::Rejected => write!(f, "rejected by filter"),
            PackOutcome::Failed(reason) => write!(f, "failed - {}", reason),
        }
    }
}

/// Report for one output archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComicReport {
    pub title: String,
    pub output_path: Option<PathBuf>,
    pub outcome: PackOutcome,
    pub warnings: Vec<PageWarning>,
}

impl ComicReport {
    pub fn new(title: impl Into<String>, output_path: Option<PathBuf>, outcome: PackOutcome) -> Self {
        Self {
            title: title.into(),
            output_path,
            outcome,
            warnings: Vec::new(),
        }
    }
}

/// Summary of a run over many comics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub comics: Vec<ComicReport>,
}

impl RunReport {
    fn count(&self, pred: impl Fn(&PackOutcome) -> bool) -> usize {
        self.comics.iter().filter(|c| pred(&c.outcome)).count()
    }

    pub fn written(&self) -> usize {
        self.count(|o| *o == PackOutcome::Written)
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| *o == PackOutcome::SkippedExists)
    }

    pub fn rejected(&self) -> usize {
        self.count(|o| *o == PackOutcome::Rejected)
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, PackOutcome::Failed(_)))
    }

    pub fn warnings(&self) -> impl Iterator<Item = (&str, &PageWarning)> {
        self.comics
            .iter()
            .flat_map(|c| c.warnings.iter().map(move |w| (c.title.as_str(), w)))
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} written, {} skipped, {} rejected, {} failed",
            self.written(),
            self.skipped(),
            self.rejected(),
            self.failed()
        )
    }
}
