//! Reading page bytes from disk.

use std::path::{Path, PathBuf};

use memmap2::MmapOptions;
use tokio::task::spawn_blocking;

use crate::error::{Error, Result};
use crate::path_utils::path_to_string_lossy;

/// Lowercased extension of `path`, without the dot. Empty if there is none.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

/// Reads a source image through a read-only memory map.
///
/// A missing or unreadable file is an I/O error (the comic cannot be
/// packaged); an empty file is a corrupt page.
pub async fn read_page(path: &Path) -> Result<Vec<u8>> {
    let file = tokio::fs::File::open(path).await.map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!(
                "Failed to open image file '{}': {}",
                path_to_string_lossy(path),
                e
            ),
        ))
    })?;
    let file_std = file.into_std().await;
    let owned: PathBuf = path.to_path_buf();

    spawn_blocking(move || -> Result<Vec<u8>> {
        if file_std.metadata()?.len() == 0 {
            return Err(Error::CorruptImage(format!(
                "{} is empty",
                path_to_string_lossy(&owned)
            )));
        }
        // SAFETY: the map is read-only and dropped before this closure returns.
        let mmap = unsafe { MmapOptions::new().map(&file_std)? };
        Ok(mmap.to_vec())
    })
    .await
    .map_err(|e| Error::AsyncTaskError(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_page_contents_and_failures() {
        let dir = std::env::temp_dir().join(format!("tankobon-source-{}", rand::random::<u64>()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("page.JPG"), b"bytes").unwrap();
        std::fs::write(dir.join("empty.png"), b"").unwrap();

        assert_eq!(read_page(&dir.join("page.JPG")).await.unwrap(), b"bytes");
        assert_eq!(extension_of(&dir.join("page.JPG")), "jpg");

        let empty = read_page(&dir.join("empty.png")).await.unwrap_err();
        assert!(matches!(empty, Error::CorruptImage(_)));

        let missing = read_page(&dir.join("missing.png")).await.unwrap_err();
        assert!(matches!(missing, Error::Io(_)));
        assert!(!missing.is_page_recoverable());

        std::fs::remove_dir_all(dir).ok();
    }
}
