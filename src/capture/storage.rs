//! Output location collaborator and file naming.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Local};
use image::RgbaImage;
use log::info;

use super::RecordError;

/// Where recordings and images go, and who hears about finished files.
pub trait Storage: Send + Sync {
    /// Resolve (and create if needed) the output directory.
    fn output_directory(&self) -> io::Result<PathBuf>;

    /// A finished file is ready for indexing or sharing.
    fn notify_file_ready(&self, path: &Path);
}

/// Storage rooted in a plain directory.
#[derive(Debug)]
pub struct DirectoryStorage {
    dir: PathBuf,
    ready: Mutex<Vec<PathBuf>>,
}

impl DirectoryStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ready: Mutex::new(Vec::new()),
        }
    }

    /// Files reported through [`Storage::notify_file_ready`], oldest first.
    pub fn ready_files(&self) -> Vec<PathBuf> {
        match self.ready.lock() {
            Ok(ready) => ready.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Storage for DirectoryStorage {
    fn output_directory(&self) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        Ok(self.dir.clone())
    }

    fn notify_file_ready(&self, path: &Path) {
        info!("File ready: {}", path.display());
        let mut ready = match self.ready.lock() {
            Ok(ready) => ready,
            Err(poisoned) => poisoned.into_inner(),
        };
        ready.push(path.to_path_buf());
    }
}

/// `<prefix>_<yyyyMMdd_hhmmss><suffix>.<ext>`
pub fn output_file_name(prefix: &str, time: DateTime<Local>, suffix: &str, ext: &str) -> String {
    format!("{}_{}{}.{}", prefix, time.format("%Y%m%d_%H%M%S"), suffix, ext)
}

/// Write a PNG named `IMG_<timestamp><suffix>.png` and announce it.
pub fn write_image(
    storage: &dyn Storage,
    image: &RgbaImage,
    suffix: &str,
) -> Result<PathBuf, RecordError> {
    let dir = storage
        .output_directory()
        .map_err(RecordError::StorageUnavailable)?;
    let path = dir.join(output_file_name("IMG", Local::now(), suffix, "png"));
    image.save(&path)?;
    storage.notify_file_ready(&path);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn test_output_file_name() {
        let time = Local.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).unwrap();
        assert_eq!(
            output_file_name("VID", time, "_seq", "gif"),
            "VID_20240307_090502_seq.gif"
        );
        assert_eq!(output_file_name("IMG", time, "", "png"), "IMG_20240307_090502.png");
    }

    #[test]
    fn test_directory_storage_creates_dir() {
        let dir = tempdir().unwrap();
        let storage = DirectoryStorage::new(dir.path().join("a/b"));
        let out = storage.output_directory().unwrap();
        assert!(out.is_dir());
    }

    #[test]
    fn test_write_image() {
        let dir = tempdir().unwrap();
        let storage = DirectoryStorage::new(dir.path());
        let path = write_image(&storage, &RgbaImage::new(6, 4), "_x").unwrap();

        assert!(path.exists());
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("IMG_") && name.ends_with("_x.png"));
        assert_eq!(storage.ready_files(), vec![path]);
    }

    #[test]
    fn test_unavailable_directory() {
        let storage = DirectoryStorage::new("/dev/null/spiral-fun");
        assert!(matches!(
            write_image(&storage, &RgbaImage::new(2, 2), ""),
            Err(RecordError::StorageUnavailable(_))
        ));
    }
}
