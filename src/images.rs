use std::path::{Component, Path, PathBuf};

use chrono::NaiveDate;
use tracing::warn;

use crate::error::{Result, ReviewError};
use crate::filename;
use crate::models::SubmissionRecord;

/// Access to uploaded classroom photos.
pub trait ImageStore {
    fn image_exists(&self, path: &str) -> bool;
    fn read_image_bytes(&self, path: &str) -> Result<Vec<u8>>;
    fn file_size_bytes(&self, path: &str) -> Result<u64>;
}

/// Size in KiB rounded to two decimals, the unit shown next to each photo.
pub fn size_kib(bytes: u64) -> f64 {
    (bytes as f64 / 1024.0 * 100.0).round() / 100.0
}

/// What the heuristics need to know about one record's photo.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoFacts {
    pub basename: String,
    pub file_date: Option<NaiveDate>,
    pub size_kib: f64,
}

impl PhotoFacts {
    /// Facts for the stored path exactly as recorded. Returns `None` when the
    /// photo cannot be accessed; such records are invisible to the scorer.
    pub fn inspect(record: &SubmissionRecord, images: &impl ImageStore) -> Option<Self> {
        Self::inspect_at(&record.class_pic, images)
    }

    pub fn inspect_at(path: &str, images: &impl ImageStore) -> Option<Self> {
        if !images.image_exists(path) {
            return None;
        }
        let bytes = match images.file_size_bytes(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(path, "image unreadable: {err}");
                return None;
            }
        };
        let basename = filename::basename(path.trim()).to_string();
        Some(Self {
            file_date: filename::extract_date(&basename),
            basename,
            size_kib: size_kib(bytes),
        })
    }

    /// An unparseable filename date never counts as a mismatch.
    pub fn date_mismatch(&self, recorded: NaiveDate) -> bool {
        self.file_date.is_some_and(|date| date != recorded)
    }

    pub fn is_screenshot(&self) -> bool {
        filename::is_screenshot(&self.basename)
    }

    pub fn is_live_capture(&self) -> bool {
        filename::is_live_capture(&self.basename)
    }

    pub fn is_empty(&self) -> bool {
        self.size_kib == 0.0
    }
}

/// Reads images from the local filesystem. Relative paths resolve against
/// `root` when one is configured, otherwise against the working directory.
#[derive(Debug, Clone, Default)]
pub struct FsImageStore {
    root: Option<PathBuf>,
}

impl FsImageStore {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        let joined = match (&self.root, path.is_absolute()) {
            (Some(root), false) => root.join(path),
            _ => path.to_path_buf(),
        };
        normalize(&joined)
    }

    fn checked(&self, path: &str) -> Result<PathBuf> {
        if path.trim().is_empty() {
            return Err(ReviewError::InvalidInput("empty image path".to_string()));
        }
        Ok(self.resolve(path))
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

impl ImageStore for FsImageStore {
    fn image_exists(&self, path: &str) -> bool {
        self.resolve(path).is_file()
    }

    fn read_image_bytes(&self, path: &str) -> Result<Vec<u8>> {
        Ok(std::fs::read(self.checked(path)?)?)
    }

    fn file_size_bytes(&self, path: &str) -> Result<u64> {
        Ok(std::fs::metadata(self.checked(path)?)?.len())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_rounds_to_hundredths_of_kib() {
        assert_eq!(size_kib(0), 0.0);
        assert_eq!(size_kib(5), 0.0);
        assert_eq!(size_kib(6), 0.01);
        assert_eq!(size_kib(2048), 2.0);
    }

    #[test]
    fn filesystem_store_reads_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("uploads")).unwrap();
        std::fs::write(dir.path().join("uploads/IMG1.jpg"), b"jpegdata").unwrap();

        let store = FsImageStore::new(Some(dir.path().to_path_buf()));
        assert!(store.image_exists("uploads/./IMG1.jpg"));
        assert!(!store.image_exists(" uploads/IMG1.jpg "));
        assert!(!store.image_exists("uploads/missing.jpg"));
        assert!(!store.image_exists("uploads"));
        assert_eq!(store.file_size_bytes("uploads/IMG1.jpg").unwrap(), 8);
        assert_eq!(store.read_image_bytes("uploads/../uploads/IMG1.jpg").unwrap(), b"jpegdata");
        assert!(store.file_size_bytes("uploads/missing.jpg").is_err());
        assert!(matches!(
            store.read_image_bytes("  "),
            Err(ReviewError::InvalidInput(_))
        ));
    }

    #[test]
    fn padded_paths_only_resolve_once_trimmed() {
        let images = memory::MemoryImageStore::default().with("a.jpg", 2048);
        let record = SubmissionRecord {
            school_id: 1,
            class: "5".to_string(),
            section: "A".to_string(),
            uploaded_by: "Ravi".to_string(),
            timestamp: chrono::NaiveDate::from_ymd_opt(2025, 3, 5)
                .and_then(|d| d.and_hms_opt(9, 0, 0))
                .unwrap(),
            class_pic: " a.jpg ".to_string(),
            films: [None, None, None],
        };
        assert_eq!(PhotoFacts::inspect(&record, &images), None);
        let facts = PhotoFacts::inspect_at(record.class_pic.trim(), &images).unwrap();
        assert_eq!(facts.basename, "a.jpg");
        assert_eq!(facts.size_kib, 2.0);
    }
}
