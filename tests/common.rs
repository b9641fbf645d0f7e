//! Common test utilities and constants for the Tankobon crate.
//!
//! Provides per-test random directories, dummy page images, and helpers to
//! look inside the produced archives.

use image::{Rgb, RgbImage};
use rand::{Rng, distributions::Alphanumeric};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tankobon::error::{Error, Result};
use tokio::fs;

#[allow(dead_code)]
pub const TEST_TMP_DIR: &str = "tests/tmp";
#[allow(dead_code)]
pub const TEST_TIMEOUT: Duration = Duration::from_secs(30);
#[allow(dead_code)]
pub const LONG_TEST_TIMEOUT: Duration = Duration::from_secs(120);

#[allow(dead_code)]
pub struct TestDirs {
    pub base: PathBuf,
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
}

/// Creates a fresh `tests/tmp/<name>-<random>/{source,output}` tree.
#[allow(dead_code)]
pub async fn setup_test_dirs(sub_path: &str) -> TestDirs {
    let rand_string: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    let base = PathBuf::from(TEST_TMP_DIR).join(format!("{}-{}", sub_path, rand_string));
    if base.exists() {
        fs::remove_dir_all(&base).await.unwrap();
    }
    let source_dir = base.join("source");
    let output_dir = base.join("output");
    fs::create_dir_all(&source_dir).await.unwrap();
    fs::create_dir_all(&output_dir).await.unwrap();

    TestDirs {
        base,
        source_dir,
        output_dir,
    }
}

#[allow(dead_code)]
pub async fn cleanup(dirs: &TestDirs) {
    let _ = fs::remove_dir_all(&dirs.base).await;
}

/// Writes a solid-color image; the format follows the file extension.
#[allow(dead_code)]
pub async fn create_dummy_image(path: &Path, color: Rgb<u8>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let img = RgbImage::from_pixel(64, 96, color);
    let path_clone = path.to_path_buf();
    tokio::task::spawn_blocking(move || img.save(path_clone))
        .await
        .map_err(|e| Error::AsyncTaskError(e.to_string()))?
        .map_err(Error::Image)?;
    Ok(())
}

/// Writes one of four structurally different patterns, picked by `seed % 4`,
/// so their perceptual hashes stay apart.
#[allow(dead_code)]
pub async fn create_pattern_image(path: &Path, seed: u8) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let img = RgbImage::from_fn(64, 96, |x, y| {
        let dark = match seed % 4 {
            0 => x < 32,
            1 => y < 48,
            2 => ((x / 16) + (y / 16)) % 2 == 0,
            _ => x * 3 / 2 > y,
        };
        if dark { Rgb([20, 20, 20]) } else { Rgb([240, 240, 240]) }
    });
    let path_clone = path.to_path_buf();
    tokio::task::spawn_blocking(move || img.save(path_clone))
        .await
        .map_err(|e| Error::AsyncTaskError(e.to_string()))?
        .map_err(Error::Image)?;
    Ok(())
}

/// Entry names of a ZIP archive (CBZ or EPUB), in archive order.
#[allow(dead_code)]
pub fn zip_entry_names(path: &Path) -> Vec<String> {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

/// Reads one text entry of a ZIP archive.
#[allow(dead_code)]
pub fn read_zip_text(path: &Path, entry: &str) -> String {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut file = archive.by_name(entry).unwrap();
    let mut content = String::new();
    file.read_to_string(&mut content).unwrap();
    content
}
