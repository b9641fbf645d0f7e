//! Source parsers that build a [`Comic`] from a directory tree.
//!
//! [`GeneralParser`] and [`TachiyomiParser`] expect the same layout:
//!
//! ```text
//! <comic dir>/
//!   cover.jpg          optional, any supported image extension
//!   <chapter dir>/     one per chapter, natural-sorted
//!     001.jpg          pages, natural-sorted
//! ```
//!
//! [`TachiyomiParser`] additionally reads descriptive metadata from any
//! `*.json` file in the comic directory.
//!
//! The backup-tool layouts list their chapters in TOML files instead:
//!
//! - [`DmzjBackupParser`]: `details.json` plus `info.toml` with a `chapter_list` of directory names.
//! - [`ZmhBackupParser`]: `details.json` plus `info.toml` with a `chapter_id_list`; each chapter
//!   directory has a `meta.toml` with its `id` and `img_list`.
//! - [`BcdownParser`]: a `meta.toml` with the comic `title`; each chapter directory has a
//!   `meta.toml` with `ord`, `title` and the page `paths`. Chapters are sorted by `ord`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::fs::read_dir;

use crate::comic::{Chapter, Comic, Page};
use crate::error::{Error, Result};
use crate::path_utils::{compare_paths_naturally, get_file_name_lossy, is_hidden_file};
use crate::source::extension_of;
use crate::types::SourceFormat;

/// Extensions accepted as page or cover images, lowercased and without the dot.
pub const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "webp", "avif", "gif", "bmp"];

lazy_static! {
    /// Separators inside a descriptor's author string.
    static ref AUTHOR_SEPARATOR_REGEX: Regex = Regex::new(r"[,;]").unwrap();
}

/// Builds a comic model from a source directory.
#[async_trait]
pub trait ComicParser: Send + Sync {
    async fn parse(&self, path: &Path) -> Result<Comic>;
}

/// Returns the parser for a source layout.
pub fn parser_for(format: SourceFormat) -> Box<dyn ComicParser> {
    match format {
        SourceFormat::General => Box::new(GeneralParser),
        SourceFormat::Tachiyomi => Box::new(TachiyomiParser),
        SourceFormat::DmzjBackup => Box::new(DmzjBackupParser),
        SourceFormat::ZmhBackup => Box::new(ZmhBackupParser),
        SourceFormat::Bcdown => Box::new(BcdownParser),
    }
}

/// Plain directory layout. The comic title is the directory name.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeneralParser;

/// Tachiyomi download layout with a JSON descriptor next to the chapters.
#[derive(Debug, Default, Clone, Copy)]
pub struct TachiyomiParser;

/// Dmzj backup export: chapters listed by directory name in `info.toml`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DmzjBackupParser;

/// ZMH backup export: chapters listed by id, pages listed per chapter.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZmhBackupParser;

/// Bcdown export: TOML metadata for the comic and every chapter.
#[derive(Debug, Default, Clone, Copy)]
pub struct BcdownParser;

#[derive(Deserialize)]
struct DmzjInfo {
    chapter_list: Vec<String>,
}

#[derive(Deserialize)]
struct ZmhInfo {
    chapter_id_list: Vec<toml::Value>,
}

#[derive(Deserialize)]
struct ZmhChapterMeta {
    id: toml::Value,
    #[serde(default)]
    img_list: Vec<String>,
}

#[derive(Deserialize)]
struct BcdownComicMeta {
    title: String,
}

#[derive(Deserialize)]
struct BcdownChapterMeta {
    ord: f64,
    title: String,
    #[serde(default)]
    paths: Vec<String>,
}

#[async_trait]
impl ComicParser for GeneralParser {
    async fn parse(&self, path: &Path) -> Result<Comic> {
        let listing = list_comic_dir(path).await?;
        let mut comic = Comic::new(get_file_name_lossy(path), Vec::new());
        comic.cover_path = find_cover(&listing.files);
        comic.chapters = collect_chapters(listing.dirs).await?;
        Ok(comic)
    }
}

#[async_trait]
impl ComicParser for TachiyomiParser {
    async fn parse(&self, path: &Path) -> Result<Comic> {
        let listing = list_comic_dir(path).await?;
        let mut comic = Comic::new(String::new(), Vec::new());
        comic.cover_path = find_cover(&listing.files);

        for descriptor in listing.files.iter().filter(|f| extension_of(f) == "json") {
            let text = tokio::fs::read_to_string(descriptor).await?;
            let value: Value = serde_json::from_str(&text)?;
            apply_descriptor(&mut comic, &value);
        }
        if comic.title.is_empty() {
            comic.title = get_file_name_lossy(path);
        }

        comic.chapters = collect_chapters(listing.dirs).await?;
        Ok(comic)
    }
}

#[async_trait]
impl ComicParser for DmzjBackupParser {
    async fn parse(&self, path: &Path) -> Result<Comic> {
        let listing = list_comic_dir(path).await?;
        let mut comic = backup_comic(path, &listing).await?;
        let info: DmzjInfo = read_toml(&path.join("info.toml")).await?;

        for chapter_title in info.chapter_list {
            let dir = path.join(&chapter_title);
            if !dir.is_dir() {
                warn!("missing chapter {} in {}", chapter_title, comic.title);
                continue;
            }
            let pages = collect_pages(&dir).await?;
            let order = (comic.chapters.len() + 1) as f64;
            comic.chapters.push(Chapter::new(order, chapter_title, pages));
        }
        Ok(comic)
    }
}

#[async_trait]
impl ComicParser for ZmhBackupParser {
    async fn parse(&self, path: &Path) -> Result<Comic> {
        let listing = list_comic_dir(path).await?;
        let mut comic = backup_comic(path, &listing).await?;
        let info: ZmhInfo = read_toml(&path.join("info.toml")).await?;

        let mut by_id: Vec<(String, PathBuf, ZmhChapterMeta)> = Vec::new();
        for dir in listing.dirs {
            let meta_path = dir.join("meta.toml");
            if !meta_path.is_file() {
                warn!("missing chapter meta: {} in {}", get_file_name_lossy(&dir), comic.title);
                continue;
            }
            let meta: ZmhChapterMeta = read_toml(&meta_path).await?;
            by_id.push((toml_key(&meta.id), dir, meta));
        }

        for id in info.chapter_id_list.iter().map(toml_key) {
            let Some((_, dir, meta)) = by_id.iter().find(|(key, _, _)| *key == id) else {
                warn!("missing chapter {} in {}", id, comic.title);
                continue;
            };
            let chapter_title = get_file_name_lossy(dir);
            let mut pages = Vec::new();
            for file_name in &meta.img_list {
                let file = dir.join(file_name);
                if !file.is_file() {
                    warn!(
                        "missing page {} in chapter {} of {}",
                        file_name, chapter_title, comic.title
                    );
                    continue;
                }
                if !is_image(&file) {
                    continue;
                }
                pages.push(Page::new((pages.len() + 1) as f64, file_stem(&file), file));
            }
            let order = (comic.chapters.len() + 1) as f64;
            comic.chapters.push(Chapter::new(order, chapter_title, pages));
        }
        Ok(comic)
    }
}

#[async_trait]
impl ComicParser for BcdownParser {
    async fn parse(&self, path: &Path) -> Result<Comic> {
        let listing = list_comic_dir(path).await?;
        let meta: BcdownComicMeta = read_toml(&path.join("meta.toml")).await?;
        let mut comic = Comic::new(meta.title, Vec::new());
        comic.cover_path = find_cover(&listing.files);

        for dir in listing.dirs {
            let meta: BcdownChapterMeta = read_toml(&dir.join("meta.toml")).await?;
            // Recorded paths may point anywhere; only the file name is kept.
            let pages = meta
                .paths
                .iter()
                .filter_map(|p| Path::new(p).file_name())
                .enumerate()
                .map(|(index, name)| Page::new(index as f64, format!("{:04}", index), dir.join(name)))
                .collect();
            comic.chapters.push(Chapter::new(meta.ord, meta.title, pages));
        }
        comic.chapters.sort_by(|a, b| a.order.total_cmp(&b.order));
        Ok(comic)
    }
}

/// Comic shell of a backup export: cover plus the required `details.json`.
async fn backup_comic(path: &Path, listing: &Listing) -> Result<Comic> {
    let text = tokio::fs::read_to_string(path.join("details.json")).await?;
    let value: Value = serde_json::from_str(&text)?;
    let mut comic = Comic::new(get_file_name_lossy(path), Vec::new());
    comic.cover_path = find_cover(&listing.files);
    apply_descriptor(&mut comic, &value);
    Ok(comic)
}

async fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = tokio::fs::read_to_string(path).await?;
    Ok(toml::from_str(&text)?)
}

/// Chapter ids are integers in some exports and strings in others.
fn toml_key(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Copies title, author, description and genre from a Tachiyomi descriptor.
fn apply_descriptor(comic: &mut Comic, meta: &Value) {
    if let Some(title) = meta.get("title").and_then(Value::as_str) {
        comic.title = title.to_string();
    }
    if let Some(author) = meta.get("author").and_then(Value::as_str) {
        comic.authors = AUTHOR_SEPARATOR_REGEX
            .split(author)
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(String::from)
            .collect();
    }
    if let Some(description) = meta.get("description").and_then(Value::as_str) {
        comic.description = Some(description.to_string());
    }
    if let Some(genres) = meta.get("genre").and_then(Value::as_array) {
        let mut subjects: Vec<String> = Vec::new();
        for genre in genres.iter().filter_map(Value::as_str) {
            if !subjects.iter().any(|s| s == genre) {
                subjects.push(genre.to_string());
            }
        }
        comic.subjects = subjects;
    }
}

struct Listing {
    dirs: Vec<PathBuf>,
    files: Vec<PathBuf>,
}

/// Lists the visible entries of `path`, each group natural-sorted.
async fn list_dir(path: &Path) -> Result<Listing> {
    let mut entries = read_dir(path).await?;
    let mut dirs = Vec::new();
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let entry_path = entry.path();
        if is_hidden_file(&entry_path) {
            continue;
        }
        if entry.file_type().await?.is_dir() {
            dirs.push(entry_path);
        } else {
            files.push(entry_path);
        }
    }
    dirs.sort_by(|a, b| compare_paths_naturally(a, b));
    files.sort_by(|a, b| compare_paths_naturally(a, b));
    Ok(Listing { dirs, files })
}

async fn list_comic_dir(path: &Path) -> Result<Listing> {
    if !path.exists() {
        return Err(Error::NotFound(format!("Source directory does not exist: {:?}", path)));
    }
    if !path.is_dir() {
        return Err(Error::InvalidPath(
            path.to_path_buf(),
            "Source path is not a directory.".to_string(),
        ));
    }
    list_dir(path).await
}

fn is_image(path: &Path) -> bool {
    IMAGE_EXTENSIONS.contains(&extension_of(path).as_str())
}

/// `cover.<ext>` in the comic directory, in [`IMAGE_EXTENSIONS`] order.
fn find_cover(files: &[PathBuf]) -> Option<PathBuf> {
    IMAGE_EXTENSIONS.iter().find_map(|ext| {
        files
            .iter()
            .find(|f| {
                extension_of(f) == *ext
                    && f.file_stem().is_some_and(|stem| stem.eq_ignore_ascii_case("cover"))
            })
            .cloned()
    })
}

/// One chapter per directory, 1-based order; pages are the image files inside, 1-based order.
async fn collect_chapters(dirs: Vec<PathBuf>) -> Result<Vec<Chapter>> {
    let mut chapters = Vec::with_capacity(dirs.len());
    for (chapter_index, dir) in dirs.into_iter().enumerate() {
        let pages = collect_pages(&dir).await?;
        chapters.push(Chapter::new(
            (chapter_index + 1) as f64,
            get_file_name_lossy(&dir),
            pages,
        ));
    }
    Ok(chapters)
}

/// The natural-sorted image files of a chapter directory, 1-based order.
async fn collect_pages(dir: &Path) -> Result<Vec<Page>> {
    let listing = list_dir(dir).await?;
    let pages: Vec<Page> = listing
        .files
        .into_iter()
        .filter(|f| is_image(f))
        .enumerate()
        .map(|(page_index, file)| Page::new((page_index + 1) as f64, file_stem(&file), file))
        .collect();
    debug!("Collected {} pages from {:?}", pages.len(), dir);
    Ok(pages)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("tankobon-parser-{}", rand::random::<u64>()))
            .join(name)
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[tokio::test]
    async fn test_general_layout() {
        let root = temp_dir("My Comic");
        touch(&root.join("cover.png"));
        touch(&root.join("notes.txt"));
        touch(&root.join("Chapter 10/1.jpg"));
        touch(&root.join("Chapter 2/10.jpg"));
        touch(&root.join("Chapter 2/2.jpg"));
        touch(&root.join("Chapter 2/.thumb.jpg"));
        touch(&root.join("Chapter 2/info.txt"));
        fs::create_dir_all(root.join("Empty")).unwrap();

        let comic = GeneralParser.parse(&root).await.unwrap();
        assert_eq!(comic.title, "My Comic");
        assert_eq!(comic.cover_path, Some(root.join("cover.png")));

        let titles: Vec<&str> = comic.chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Chapter 2", "Chapter 10", "Empty"]);
        assert_eq!(comic.chapters[0].order, 1.0);
        assert_eq!(comic.chapters[2].order, 3.0);

        let pages = &comic.chapters[0].pages;
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].title, "2");
        assert_eq!(pages[0].order, 1.0);
        assert_eq!(pages[1].title, "10");
        assert_eq!(pages[1].order, 2.0);
        assert!(comic.chapters[2].pages.is_empty());

        fs::remove_dir_all(root.parent().unwrap()).ok();
    }

    #[tokio::test]
    async fn test_tachiyomi_descriptor() {
        let root = temp_dir("folder-name");
        touch(&root.join("ch1/01.webp"));
        fs::write(
            root.join("details.json"),
            r#"{"title": "Real Title", "author": "Ann; Bob,Cy", "description": "About",
                "genre": ["Action", "Drama", "Action"]}"#,
        )
        .unwrap();

        let comic = TachiyomiParser.parse(&root).await.unwrap();
        assert_eq!(comic.title, "Real Title");
        assert_eq!(comic.authors, vec!["Ann", "Bob", "Cy"]);
        assert_eq!(comic.description.as_deref(), Some("About"));
        assert_eq!(comic.subjects, vec!["Action", "Drama"]);
        assert_eq!(comic.cover_path, None);
        assert_eq!(comic.total_pages(), 1);

        fs::remove_dir_all(root.parent().unwrap()).ok();
    }

    #[tokio::test]
    async fn test_dmzj_backup_follows_chapter_list() {
        let root = temp_dir("dmzj");
        touch(&root.join("cover.jpg"));
        touch(&root.join("Vol 2/01.jpg"));
        touch(&root.join("Vol 1/2.jpg"));
        touch(&root.join("Vol 1/10.jpg"));
        touch(&root.join("Unlisted/01.jpg"));
        fs::write(
            root.join("details.json"),
            r#"{"title": "Dmzj", "author": "Ann,Bob", "description": "", "genre": ["Comedy"]}"#,
        )
        .unwrap();
        fs::write(
            root.join("info.toml"),
            "chapter_list = [\"Vol 2\", \"Gone\", \"Vol 1\"]\n",
        )
        .unwrap();

        let comic = DmzjBackupParser.parse(&root).await.unwrap();
        assert_eq!(comic.title, "Dmzj");
        assert_eq!(comic.authors, vec!["Ann", "Bob"]);
        assert_eq!(comic.cover_path, Some(root.join("cover.jpg")));
        let titles: Vec<&str> = comic.chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Vol 2", "Vol 1"]);
        assert_eq!(comic.chapters[1].order, 2.0);
        let pages: Vec<&str> = comic.chapters[1].pages.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(pages, vec!["2", "10"]);

        fs::remove_dir_all(root.parent().unwrap()).ok();
    }

    #[tokio::test]
    async fn test_zmh_backup_resolves_chapter_ids() {
        let root = temp_dir("zmh");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("details.json"), r#"{"title": "Zmh", "author": "Cy"}"#).unwrap();
        fs::write(root.join("info.toml"), "chapter_id_list = [202, 101, 303]\n").unwrap();
        touch(&root.join("first/b.png"));
        touch(&root.join("first/a.png"));
        fs::write(
            root.join("first/meta.toml"),
            "id = 101\nimg_list = [\"b.png\", \"a.png\", \"lost.png\"]\n",
        )
        .unwrap();
        touch(&root.join("second/1.jpg"));
        fs::write(root.join("second/meta.toml"), "id = 202\nimg_list = [\"1.jpg\"]\n").unwrap();
        touch(&root.join("no-meta/1.jpg"));

        let comic = ZmhBackupParser.parse(&root).await.unwrap();
        let titles: Vec<&str> = comic.chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["second", "first"]);
        let pages: Vec<&str> = comic.chapters[1].pages.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(pages, vec!["b", "a"]);
        assert_eq!(comic.chapters[1].pages[1].order, 2.0);

        fs::remove_dir_all(root.parent().unwrap()).ok();
    }

    #[tokio::test]
    async fn test_bcdown_sorts_chapters_by_ord() {
        let root = temp_dir("bcdown");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("meta.toml"), "title = \"Bilibili Title\"\n").unwrap();
        fs::create_dir_all(root.join("9001")).unwrap();
        fs::write(
            root.join("9001/meta.toml"),
            "ord = 2.5\ntitle = \"Extra\"\npaths = [\"/remote/x/0.jpg\", \"1.jpg\"]\n",
        )
        .unwrap();
        fs::create_dir_all(root.join("9000")).unwrap();
        fs::write(root.join("9000/meta.toml"), "ord = 1\ntitle = \"Start\"\npaths = []\n").unwrap();

        let comic = BcdownParser.parse(&root).await.unwrap();
        assert_eq!(comic.title, "Bilibili Title");
        let titles: Vec<&str> = comic.chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Start", "Extra"]);
        let extra = &comic.chapters[1];
        assert_eq!(extra.order, 2.5);
        assert_eq!(extra.pages[0].title, "0000");
        assert_eq!(extra.pages[0].source_path, root.join("9001").join("0.jpg"));
        assert_eq!(extra.pages[1].title, "0001");

        let bare = root.parent().unwrap().join("bare");
        fs::create_dir_all(&bare).unwrap();
        assert!(BcdownParser.parse(&bare).await.is_err());

        fs::remove_dir_all(root.parent().unwrap()).ok();
    }

    #[tokio::test]
    async fn test_missing_source() {
        let err = GeneralParser.parse(Path::new("/nonexistent/tankobon")).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
