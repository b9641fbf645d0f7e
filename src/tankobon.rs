use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, spawn_blocking};

use crate::comic::Comic;
use crate::dedup::Dedup;
use crate::error::{Error, Result};
use crate::filter::{ChapterFilter, ComicFilter, FilterPipeline, ProcessPipeline};
use crate::generator::{Generator, GeneratorOptions, PageEntry, cbz::Cbz, epub::EPub};
use crate::image_pipeline::{DownSample, EncodeOptions, ImagePipeline, ThresholdCrop};
use crate::log_scope::LogScope;
use crate::parser::parser_for;
use crate::path_utils::{
    compare_paths_naturally, get_file_name_lossy, is_hidden_file, output_target, partial_path,
};
use crate::source::{extension_of, read_page};
use crate::split::{DEFAULT_SPLIT_TITLE_FORMAT, fill_template, fixed_split, manual_split};
use crate::types::{
    ComicReport, DedupFailurePolicy, Direction, EbookMetadata, FileFormat, HashAlgorithm,
    ImageKind, PackOutcome, PageWarning, ResizeKernel, RunReport, SourceFormat,
};

/// Manual split entry for one comic title.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManualSplit {
    /// Chapter orders that open a new volume.
    pub breakpoints: Vec<f64>,
    /// Overrides [`TankobonConfig::manual_replace_cover`] for this title.
    #[serde(default)]
    pub replace_cover: Option<bool>,
}

/// The Tankobon run configuration, built declaratively using the builder pattern.
///
/// A configured instance packs comics into archives in `output_path`:
///
/// - [`convert_from_source`](TankobonConfig::convert_from_source): parses every comic directory below `source_path`
/// - [`pack`](TankobonConfig::pack): packs comics the caller already has in memory
///
/// ```rust,no_run
/// # use tankobon::prelude::*;
/// # use std::path::PathBuf;
/// # #[tokio::main]
/// # async fn main() -> tankobon::error::Result<()> {
/// let config = TankobonConfig::builder()
///     .source_path(PathBuf::from("./raw"))
///     .output_path(PathBuf::from("./epubs"))
///     .output_format(FileFormat::Epub)
///     .fixed_split(10usize)
///     .enable_dedup(true)
///     .build()?;
///
/// let report = config.convert_from_source().await?;
/// println!("{}", report);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, derive_builder::Builder, Serialize)]
#[builder(setter(into, strip_option), build_fn(validate = "Self::validate"))]
pub struct TankobonConfig {
    // --- Paths and formats ---
    /// Directory holding one sub-directory per comic.
    #[builder(default)]
    pub source_path: PathBuf,

    /// Directory the archives are written to. Created by [`preflight_check`](TankobonConfig::preflight_check).
    #[builder(default = "PathBuf::from(\"./output\")")]
    pub output_path: PathBuf,

    #[builder(default)]
    pub source_format: SourceFormat,

    /// Parser tried when `source_format` fails on a directory.
    #[builder(default)]
    pub secondary_source_format: Option<SourceFormat>,

    #[builder(default)]
    pub output_format: FileFormat,

    /// Chapter label template. `{title}` and the 1-based `{index}`.
    #[builder(default = "\"{title}\".to_string()")]
    pub chapter_format: String,

    /// Page label template. `{title}` and the 0-based `{index}` inside the chapter.
    #[builder(default = "\"{title}\".to_string()")]
    pub page_format: String,

    /// Language recorded in archive metadata.
    #[builder(default = "\"en\".to_string()")]
    pub language: String,

    // --- Fixed layout ---
    #[builder(default = "848")]
    pub view_width: u32,

    #[builder(default = "1200")]
    pub view_height: u32,

    #[builder(default)]
    pub reading_direction: Direction,

    // --- Splitting ---
    /// Per-title breakpoints. A matching title takes precedence over `fixed_split`.
    #[builder(default)]
    pub manual_splits: HashMap<String, ManualSplit>,

    #[builder(default)]
    pub manual_replace_cover: bool,

    #[builder(default)]
    pub manual_separate_folder: bool,

    #[builder(default = "DEFAULT_SPLIT_TITLE_FORMAT.to_string()")]
    pub manual_title_format: String,

    /// Chapters per volume. Unset packs every comic whole.
    #[builder(default)]
    pub fixed_split: Option<usize>,

    #[builder(default)]
    pub fixed_replace_cover: bool,

    #[builder(default)]
    pub fixed_separate_folder: bool,

    #[builder(default = "DEFAULT_SPLIT_TITLE_FORMAT.to_string()")]
    pub fixed_title_format: String,

    // --- Filters ---
    #[builder(default)]
    pub min_chapters: Option<usize>,

    #[builder(default)]
    pub min_pages: Option<usize>,

    #[builder(default)]
    pub min_pages_ratio: Option<f64>,

    #[builder(default)]
    pub min_total_pages: Option<usize>,

    /// Chapters with more pages are dropped.
    #[builder(default)]
    pub max_pages: Option<usize>,

    // --- Dedup ---
    #[builder(default)]
    pub enable_dedup: bool,

    #[builder(default)]
    pub dedup_method: HashAlgorithm,

    #[builder(default)]
    pub dedup_failure_policy: DedupFailurePolicy,

    // --- Image pipeline ---
    #[builder(default)]
    pub enable_image_pipeline: bool,

    /// Output extension forced on every page, e.g. `"webp"`.
    #[builder(default)]
    pub fixed_ext: Option<String>,

    /// Ceiling for JPEG quality.
    #[builder(default)]
    pub jpeg_quality: Option<u8>,

    #[builder(default = "85")]
    pub avif_quality: u8,

    #[builder(default = "6")]
    pub avif_speed: u8,

    #[builder(default = "95.0")]
    pub webp_quality: f32,

    #[builder(default = "4")]
    pub webp_method: u8,

    #[builder(default)]
    pub webp_lossless: bool,

    #[builder(default = "1")]
    pub png_compression: u8,

    #[builder(default)]
    pub enable_crop: bool,

    #[builder(default = "0")]
    pub crop_lower_threshold: u8,

    #[builder(default = "255")]
    pub crop_upper_threshold: u8,

    #[builder(default)]
    pub enable_downsample: bool,

    #[builder(default = "1264")]
    pub screen_width: u32,

    #[builder(default = "1680")]
    pub screen_height: u32,

    #[builder(default)]
    pub interpolation: ResizeKernel,

    // --- Execution ---
    /// Archives written at the same time.
    #[builder(default = "num_cpus::get().min(4)")]
    pub max_concurrent_comics: usize,

    /// Page jobs kept in flight inside one archive.
    #[builder(default = "num_cpus::get()")]
    pub page_concurrency: usize,

    /// Budget for reading and re-encoding one page.
    #[builder(default)]
    pub page_timeout: Option<Duration>,
}

/// One archive waiting to be written.
struct PackJob {
    comic: Comic,
    target: PathBuf,
    scope: LogScope,
}

/// Report slot of one archive, in input order.
enum Pending {
    Done(ComicReport),
    Running(String, PathBuf, JoinHandle<ComicReport>),
}

/// A page of the archive together with its labels.
struct PageJob {
    path: PathBuf,
    chapter: Option<String>,
    entry: PageEntry,
}

impl TankobonConfig {
    /// Creates a new builder for configuring `TankobonConfig`.
    pub fn builder() -> TankobonConfigBuilder {
        TankobonConfigBuilder::default()
    }

    /// Checks runtime preconditions and creates the output directory.
    ///
    /// `convert_from_source` and `pack` call this automatically.
    pub async fn preflight_check(&self) -> Result<&Self> {
        if self.output_path.as_os_str().is_empty() {
            return Err(Error::Config("Output path is required".to_string()));
        }
        if self.output_path.exists() && !self.output_path.is_dir() {
            return Err(Error::InvalidPath(
                self.output_path.clone(),
                "Output path is not a directory.".to_string(),
            ));
        }
        fs::create_dir_all(&self.output_path).await?;
        Ok(self)
    }

    fn validate_source(&self) -> Result<()> {
        if self.source_path.as_os_str().is_empty() {
            return Err(Error::Config("`source_path` must be set".to_string()));
        }
        if !self.source_path.exists() {
            return Err(Error::NotFound(format!(
                "Source path does not exist: {:?}",
                self.source_path
            )));
        }
        if !self.source_path.is_dir() {
            return Err(Error::InvalidPath(
                self.source_path.clone(),
                "Source path is not a directory.".to_string(),
            ));
        }
        Ok(())
    }

    /// The forced output format, if any.
    pub fn fixed_kind(&self) -> Result<Option<ImageKind>> {
        self.fixed_ext
            .as_deref()
            .filter(|ext| !ext.is_empty())
            .map(str::parse::<ImageKind>)
            .transpose()
    }

    /// Builds the per-page image pipeline this configuration describes.
    pub fn image_pipeline(&self) -> Result<ImagePipeline> {
        let options = EncodeOptions {
            jpeg_quality: self.jpeg_quality,
            avif_quality: self.avif_quality,
            avif_speed: self.avif_speed,
            webp_quality: self.webp_quality,
            webp_method: self.webp_method,
            webp_lossless: self.webp_lossless,
            png_compression: self.png_compression,
        };
        let mut pipeline = ImagePipeline::new(self.fixed_kind()?, options);
        if self.enable_crop {
            pipeline.push(ThresholdCrop::new(
                self.crop_lower_threshold,
                self.crop_upper_threshold,
            ));
        }
        if self.enable_downsample {
            pipeline.push(DownSample::new(
                self.screen_width,
                self.screen_height,
                self.interpolation,
            ));
        }
        Ok(pipeline)
    }

    /// The filters applied to each archive before it is written.
    pub fn filter_pipeline(&self, scope: &LogScope) -> FilterPipeline {
        FilterPipeline::new()
            .with(ComicFilter::new(
                self.min_chapters,
                self.min_total_pages,
                self.min_pages,
                self.min_pages_ratio,
                scope.clone(),
            ))
            .with(ChapterFilter::new(self.max_pages, scope.clone()))
    }

    /// Splits a parsed comic into the comics that become archives.
    ///
    /// Returns the parts and whether they go to a folder named after `comic`.
    pub fn split_comic(&self, comic: &Comic) -> (Vec<Comic>, bool) {
        if let Some(manual) = self.manual_splits.get(&comic.title) {
            let replace_cover = manual.replace_cover.unwrap_or(self.manual_replace_cover);
            let parts = manual_split(
                comic,
                &manual.breakpoints,
                replace_cover,
                &self.manual_title_format,
            );
            (parts, self.manual_separate_folder)
        } else if let Some(size) = self.fixed_split {
            let parts = fixed_split(comic, size, self.fixed_replace_cover, &self.fixed_title_format);
            (parts, self.fixed_separate_folder)
        } else {
            (vec![comic.clone()], false)
        }
    }

    // --- Core conversion entry points ---

    /// Parses every comic directory below `source_path` and packs it.
    ///
    /// Directories that fail to parse are reported as failed comics; the run
    /// goes on with the rest.
    pub async fn convert_from_source(&self) -> Result<RunReport> {
        self.validate_source()?;
        self.preflight_check().await?;
        let scope = LogScope::new_run();

        let mut entries = fs::read_dir(&self.source_path).await?;
        let mut dirs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !is_hidden_file(&path) && entry.file_type().await?.is_dir() {
                dirs.push(path);
            }
        }
        dirs.sort_by(|a, b| compare_paths_naturally(a, b));

        let mut comics = Vec::with_capacity(dirs.len());
        let mut parse_failures = Vec::new();
        for dir in dirs {
            match self.parse_comic(&dir, &scope).await {
                Ok(comic) => comics.push(comic),
                Err(e) => {
                    error!("{} Parsing failed: {}, path: {:?}", scope, e, dir);
                    parse_failures.push(ComicReport::new(
                        get_file_name_lossy(&dir),
                        None,
                        PackOutcome::Failed(e.to_string()),
                    ));
                }
            }
        }

        let mut report = self.pack_with_scope(comics, scope).await?;
        parse_failures.append(&mut report.comics);
        report.comics = parse_failures;
        Ok(report)
    }

    async fn parse_comic(&self, dir: &Path, scope: &LogScope) -> Result<Comic> {
        let primary = parser_for(self.source_format).parse(dir).await;
        match (primary, self.secondary_source_format) {
            (Ok(comic), _) => Ok(comic),
            (Err(e), Some(secondary)) => {
                warn!("{} Primary source format parsing failed: {}", scope, e);
                warn!("{} Switching to secondary source format", scope);
                parser_for(secondary).parse(dir).await
            }
            (Err(e), None) => Err(e),
        }
    }

    /// Packs comics that are already in memory.
    pub async fn pack(&self, comics: Vec<Comic>) -> Result<RunReport> {
        self.preflight_check().await?;
        self.pack_with_scope(comics, LogScope::new_run()).await
    }

    async fn pack_with_scope(&self, comics: Vec<Comic>, scope: LogScope) -> Result<RunReport> {
        let config = Arc::new(self.clone());
        let pipeline = Arc::new(self.image_pipeline()?);
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_comics));

        info!("{} Start packing {} comics", scope, comics.len());

        let mut pending: Vec<Pending> = Vec::new();
        let mut claimed = HashSet::new();
        for comic in comics {
            for job in self.plan(&comic, &scope, &mut claimed) {
                let job = match job {
                    Ok(job) => job,
                    Err(report) => {
                        pending.push(Pending::Done(report));
                        continue;
                    }
                };
                let title = job.comic.title.clone();
                let target = job.target.clone();
                let config = Arc::clone(&config);
                let pipeline = Arc::clone(&pipeline);
                let semaphore = Arc::clone(&semaphore);
                let task = tokio::spawn(async move {
                    match semaphore.acquire().await {
                        Ok(_permit) => write_archive(&config, &pipeline, job).await,
                        Err(e) => ComicReport::new(
                            job.comic.title,
                            Some(job.target),
                            PackOutcome::Failed(e.to_string()),
                        ),
                    }
                });
                pending.push(Pending::Running(title, target, task));
            }
        }

        let mut report = RunReport::default();
        for item in pending {
            let comic_report = match item {
                Pending::Done(done) => done,
                Pending::Running(title, target, task) => match task.await {
                    Ok(done) => done,
                    Err(e) => {
                        error!("{} Packing task for {} failed: {}", scope, title, e);
                        ComicReport::new(title, Some(target), PackOutcome::Failed(e.to_string()))
                    }
                },
            };
            report.comics.push(comic_report);
        }

        info!("{} Finished: {}", scope, report);
        Ok(report)
    }

    /// Splits `comic` and decides, per part, whether it gets written.
    ///
    /// Parts whose archive exists, whose target an earlier part of this run
    /// already claimed, or that the filters reject are returned as finished
    /// reports.
    fn plan(
        &self,
        comic: &Comic,
        scope: &LogScope,
        claimed: &mut HashSet<PathBuf>,
    ) -> Vec<std::result::Result<PackJob, ComicReport>> {
        let (parts, separate_folder) = self.split_comic(comic);
        parts
            .into_iter()
            .map(|mut part| {
                let target = output_target(
                    &self.output_path,
                    &comic.title,
                    &part.title,
                    self.output_format.extension(),
                    separate_folder,
                );
                let scope = scope.for_comic(&part.title);
                if target.exists() || claimed.contains(&target) {
                    info!("{} {} exists", scope, get_file_name_lossy(&target));
                    return Err(ComicReport::new(
                        part.title,
                        Some(target),
                        PackOutcome::SkippedExists,
                    ));
                }
                if !self.filter_pipeline(&scope).accept(&mut part) {
                    return Err(ComicReport::new(part.title, Some(target), PackOutcome::Rejected));
                }
                claimed.insert(target.clone());
                Ok(PackJob {
                    comic: part,
                    target,
                    scope,
                })
            })
            .collect()
    }

    fn generator_options(&self) -> GeneratorOptions {
        GeneratorOptions {
            view_width: self.view_width,
            view_height: self.view_height,
            reading_direction: self.reading_direction,
        }
    }

    /// Cover first, then every page in reading order with its labels.
    fn page_jobs(&self, comic: &Comic) -> Vec<PageJob> {
        let mut jobs = Vec::with_capacity(comic.total_pages() + 1);
        if let Some(cover) = &comic.cover_path {
            jobs.push(PageJob {
                path: cover.clone(),
                chapter: None,
                entry: PageEntry::cover(Vec::new(), extension_of(cover)),
            });
        }
        for (chapter_index, chapter) in comic.chapters.iter().enumerate() {
            let chapter_label = fill_template(
                &self.chapter_format,
                &[
                    ("title", chapter.title.clone()),
                    ("index", (chapter_index + 1).to_string()),
                ],
            );
            for (page_index, page) in chapter.pages.iter().enumerate() {
                let page_label = fill_template(
                    &self.page_format,
                    &[("title", page.title.clone()), ("index", page_index.to_string())],
                );
                let mut entry = PageEntry::new(Vec::new(), extension_of(&page.source_path))
                    .labeled(chapter_label.clone(), page_label);
                if page_index == 0 {
                    entry = entry.with_nav_label(chapter.title.clone());
                }
                jobs.push(PageJob {
                    path: page.source_path.clone(),
                    chapter: Some(chapter.title.clone()),
                    entry,
                });
            }
        }
        jobs
    }
}

/// Writes one archive and reports how it went. Never panics on failure.
async fn write_archive(
    config: &TankobonConfig,
    pipeline: &Arc<ImagePipeline>,
    job: PackJob,
) -> ComicReport {
    let PackJob {
        comic,
        target,
        scope,
    } = job;
    let title = comic.title.clone();
    let partial = partial_path(&target);
    if partial.exists() {
        warn!("{} Removing stale {:?}", scope, partial);
        if let Err(e) = fs::remove_file(&partial).await {
            return ComicReport::new(title, Some(target), PackOutcome::Failed(e.to_string()));
        }
    }

    let result = match config.output_format {
        FileFormat::Epub => build_archive::<EPub>(config, pipeline, comic, &partial, &scope).await,
        FileFormat::Cbz => build_archive::<Cbz>(config, pipeline, comic, &partial, &scope).await,
    };
    let result = match result {
        Ok(warnings) => finalize(&partial, &target).await.map(|_| warnings),
        Err(e) => Err(e),
    };

    match result {
        Ok(warnings) => {
            info!("{} Packed {}", scope, get_file_name_lossy(&target));
            let mut report = ComicReport::new(title, Some(target), PackOutcome::Written);
            report.warnings = warnings;
            report
        }
        Err(e) => {
            if partial.exists() {
                if let Err(remove_err) = fs::remove_file(&partial).await {
                    warn!("{} Could not remove {:?}: {}", scope, partial, remove_err);
                }
            }
            if let Error::OutputExists(_) = e {
                info!("{} {} exists", scope, get_file_name_lossy(&target));
                return ComicReport::new(title, Some(target), PackOutcome::SkippedExists);
            }
            error!("{} {}", scope, e);
            ComicReport::new(title, Some(target), PackOutcome::Failed(e.to_string()))
        }
    }
}

/// Moves a finished partial archive to `target`, never replacing an existing file.
async fn finalize(partial: &Path, target: &Path) -> Result<()> {
    match fs::hard_link(partial, target).await {
        Ok(()) => {
            fs::remove_file(partial).await?;
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            Err(Error::OutputExists(target.to_path_buf()))
        }
        // Filesystems without hard links.
        Err(_) => {
            if fs::try_exists(target).await? {
                return Err(Error::OutputExists(target.to_path_buf()));
            }
            fs::rename(partial, target).await?;
            Ok(())
        }
    }
}

/// Runs the process handlers, then streams every page through the image
/// pipeline into a `G` archive at `partial`.
async fn build_archive<G>(
    config: &TankobonConfig,
    pipeline: &Arc<ImagePipeline>,
    comic: Comic,
    partial: &Path,
    scope: &LogScope,
) -> Result<Vec<PageWarning>>
where
    G: Generator + Send,
{
    let (comic, mut warnings) = if config.enable_dedup {
        let dedup = Dedup::new(config.dedup_method, config.dedup_failure_policy, scope.clone());
        spawn_blocking(move || -> Result<(Comic, Vec<PageWarning>)> {
            let mut comic = comic;
            let mut processing = ProcessPipeline::new();
            processing.push(dedup);
            let warnings = processing.run(&mut comic)?;
            Ok((comic, warnings))
        })
        .await
        .map_err(|e| Error::AsyncTaskError(e.to_string()))??
    } else {
        (comic, Vec::new())
    };

    let metadata = EbookMetadata::from_comic(&comic, &config.language);
    let mut generator = G::new(partial, &metadata, &config.generator_options(), scope.clone())?;

    let image_pipeline = config.enable_image_pipeline.then(|| Arc::clone(pipeline));
    let timeout = config.page_timeout;
    let mut pages = stream::iter(config.page_jobs(&comic))
        .map(|job| {
            let image_pipeline = image_pipeline.clone();
            async move {
                let loaded = load_page(job.path.clone(), image_pipeline, timeout).await;
                (job, loaded)
            }
        })
        .buffered(config.page_concurrency.max(1));

    let mut written = 0usize;
    // Toc label of a skipped chapter opener, waiting for the next page of that chapter.
    let mut carried_nav: Option<(Option<String>, String)> = None;
    while let Some((mut job, loaded)) = pages.next().await {
        if let Some((chapter, label)) = carried_nav.take() {
            if chapter == job.chapter && job.entry.nav_label.is_none() {
                job.entry.nav_label = Some(label);
            }
        }
        let nav_label = job.entry.nav_label.clone();
        let page_title = job.entry.page_label.clone().unwrap_or_default();
        let added = match loaded {
            Ok((data, extension)) => {
                let is_cover = job.entry.is_cover;
                let entry = PageEntry {
                    data,
                    extension,
                    ..job.entry
                };
                generator.add_page(entry).await.map(|_| is_cover)
            }
            Err(e) => Err(e),
        };
        match added {
            Ok(is_cover) => {
                if !is_cover {
                    written += 1;
                }
                debug!("{} Page {} done", scope, page_title);
            }
            Err(e) if e.is_page_recoverable() => {
                if let Some(label) = nav_label {
                    carried_nav = Some((job.chapter.clone(), label));
                }
                let warning = PageWarning {
                    chapter: job.chapter,
                    page: file_title(&job.path),
                    message: e.to_string(),
                };
                warn!("{} {}", scope, warning);
                warnings.push(warning);
            }
            Err(e) => return Err(e),
        }
    }

    if written == 0 {
        return Err(Error::Other(format!("{} has no pages to pack", comic.title)));
    }
    generator.save().await?;
    Ok(warnings)
}

fn file_title(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| get_file_name_lossy(path))
}

/// Reads one page and, if a pipeline is given, re-encodes it off the runtime.
async fn load_page(
    path: PathBuf,
    pipeline: Option<Arc<ImagePipeline>>,
    timeout: Option<Duration>,
) -> Result<(Vec<u8>, String)> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, read_and_process(&path, pipeline))
            .await
            .map_err(|_| Error::Timeout(format!("{:?} after {:?}", path, limit)))?,
        None => read_and_process(&path, pipeline).await,
    }
}

async fn read_and_process(
    path: &Path,
    pipeline: Option<Arc<ImagePipeline>>,
) -> Result<(Vec<u8>, String)> {
    let data = read_page(path).await?;
    let extension = extension_of(path);
    match pipeline {
        None => Ok((data, extension)),
        Some(pipeline) => spawn_blocking(move || pipeline.process(&data, &extension))
            .await
            .map_err(|e| Error::AsyncTaskError(e.to_string()))?,
    }
}

impl TankobonConfigBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        if let Some(Some(ext)) = &self.fixed_ext {
            if !ext.is_empty() && ImageKind::from_extension(ext).is_none() {
                return Err(format!("Unsupported fixed_ext: {}", ext));
            }
        }

        let lower = self.crop_lower_threshold.unwrap_or(0);
        let upper = self.crop_upper_threshold.unwrap_or(255);
        if lower > upper {
            return Err(format!(
                "crop_lower_threshold ({}) must not exceed crop_upper_threshold ({})",
                lower, upper
            ));
        }

        for (name, value) in [
            ("view_width", self.view_width),
            ("view_height", self.view_height),
            ("screen_width", self.screen_width),
            ("screen_height", self.screen_height),
        ] {
            if value == Some(0) {
                return Err(format!("{} must be greater than 0", name));
            }
        }

        if let Some(Some(0)) = self.fixed_split {
            return Err("fixed_split must be at least 1".to_string());
        }
        if let Some(Some(ratio)) = self.min_pages_ratio {
            if !(0.0..=1.0).contains(&ratio) {
                return Err("min_pages_ratio must be between 0 and 1".to_string());
            }
        }

        if let Some(Some(q)) = self.jpeg_quality {
            if !(1..=100).contains(&q) {
                return Err("jpeg_quality must be between 1 and 100".to_string());
            }
        }
        if let Some(q) = self.avif_quality {
            if !(1..=100).contains(&q) {
                return Err("avif_quality must be between 1 and 100".to_string());
            }
        }
        if let Some(speed) = self.avif_speed {
            if !(1..=10).contains(&speed) {
                return Err("avif_speed must be between 1 and 10".to_string());
            }
        }
        if let Some(q) = self.webp_quality {
            if !(0.0..=100.0).contains(&q) {
                return Err("webp_quality must be between 0 and 100".to_string());
            }
        }
        if let Some(method) = self.webp_method {
            if method > 6 {
                return Err("webp_method must be between 0 and 6".to_string());
            }
        }
        if let Some(level) = self.png_compression {
            if level > 9 {
                return Err("png_compression must be between 0 and 9".to_string());
            }
        }

        if self.max_concurrent_comics == Some(0) {
            return Err("max_concurrent_comics must be at least 1".to_string());
        }

        Ok(())
    }
}
