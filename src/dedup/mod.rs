//! Dedup engine: collapses pages repeated across a comic into a trailing
//! "copyright" chapter.
//!
//! Pages are compared by exact equality of their perceptual hash. Every page
//! whose hash occurs more than once anywhere in the comic is removed from its
//! chapter, and one representative per duplicated hash is appended to the
//! synthetic chapter, in order of first discovery.

pub mod hash;

use std::collections::{HashMap, HashSet};
use std::path::Path;

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::comic::{Chapter, Comic, ImageHash, Page};
use crate::error::{Error, Result};
use crate::filter::Handler;
use crate::log_scope::LogScope;
use crate::types::{DedupFailurePolicy, HashAlgorithm, PageWarning};

pub use hash::hash_image;

/// Decodes the image at `path` and hashes it.
pub fn hash_file(path: &Path, algorithm: HashAlgorithm) -> Result<ImageHash> {
    let img = image::ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| Error::CorruptImage(format!("{}: {}", path.display(), e)))?;
    Ok(hash_image(&img, algorithm))
}

pub struct Dedup {
    algorithm: HashAlgorithm,
    failure_policy: DedupFailurePolicy,
    scope: LogScope,
}

impl Dedup {
    pub fn new(algorithm: HashAlgorithm, failure_policy: DedupFailurePolicy, scope: LogScope) -> Self {
        Self {
            algorithm,
            failure_policy,
            scope,
        }
    }

    /// Assigns `content_hash` to every page it can read.
    ///
    /// Unreadable pages keep `content_hash == None` under [`DedupFailurePolicy::Skip`]
    /// and are reported; under [`DedupFailurePolicy::Abort`] the first failure is returned.
    fn assign_hashes(&self, comic: &mut Comic) -> Result<Vec<PageWarning>> {
        let algorithm = self.algorithm;
        let results: Vec<Vec<Result<ImageHash>>> = comic
            .chapters
            .par_iter()
            .map(|chapter| {
                chapter
                    .pages
                    .par_iter()
                    .map(|page| hash_file(&page.source_path, algorithm))
                    .collect()
            })
            .collect();

        let mut warnings = Vec::new();
        for (chapter, hashes) in comic.chapters.iter_mut().zip(results) {
            for (page, hash) in chapter.pages.iter_mut().zip(hashes) {
                match hash {
                    Ok(hash) => page.content_hash = Some(hash),
                    Err(e) if self.failure_policy == DedupFailurePolicy::Skip => {
                        warn!(
                            "{} Excluded from dedup: {} in {} ({})",
                            self.scope, page.title, chapter.title, e
                        );
                        page.content_hash = None;
                        warnings.push(PageWarning {
                            chapter: Some(chapter.title.clone()),
                            page: page.title.clone(),
                            message: format!("excluded from dedup: {}", e),
                        });
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(warnings)
    }

    /// Moves duplicated pages into the copyright chapter based on the assigned hashes.
    ///
    /// Pages without a hash are always kept in place. The copyright chapter is
    /// only appended when at least one hash is duplicated.
    pub fn collapse_duplicates(&self, comic: &mut Comic) {
        let mut counts: HashMap<ImageHash, usize> = HashMap::new();
        for hash in comic.pages().filter_map(|p| p.content_hash) {
            *counts.entry(hash).or_insert(0) += 1;
        }

        let mut seen: HashSet<ImageHash> = HashSet::new();
        let mut copyright = Chapter::copyright();
        for chapter in &mut comic.chapters {
            let pages = std::mem::take(&mut chapter.pages);
            for page in pages {
                let Some(hash) = page.content_hash.filter(|h| counts[h] > 1) else {
                    chapter.pages.push(page);
                    continue;
                };
                if seen.insert(hash) {
                    let n = seen.len();
                    debug!(
                        "{} Duplicate {} first seen at {} in {}",
                        self.scope, hash, page.title, chapter.title
                    );
                    let mut representative =
                        Page::new(n as f64, format!("{:04}", n), page.source_path.clone());
                    representative.content_hash = Some(hash);
                    copyright.pages.push(representative);
                }
            }
        }

        if !copyright.pages.is_empty() {
            info!(
                "{} Collapsed {} duplicated page groups in {}",
                self.scope,
                copyright.page_count(),
                comic.title
            );
            comic.chapters.push(copyright);
        }
    }
}

impl Handler for Dedup {
    fn name(&self) -> &'static str {
        "dedup"
    }

    fn handle(&self, comic: &mut Comic) -> Result<Vec<PageWarning>> {
        let warnings = self.assign_hashes(comic)?;
        self.collapse_duplicates(comic);
        Ok(warnings)
    }
}
