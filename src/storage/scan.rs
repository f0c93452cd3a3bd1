//! Dataset Scanning
//!
//! Recursive enumeration of image files under a dataset root.

use ignore::WalkBuilder;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::warn;

use crate::error::{Error, Result};

/// Image file found under the dataset root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedImage {
    /// Root-relative path with `/` separators
    pub id: String,
    /// Full path on disk
    pub path: PathBuf,
}

/// Part of the dataset that could not be listed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFailure {
    /// Path the walker failed on
    pub path: PathBuf,
    /// Root-relative prefix of the unlisted subtree; `None` means the
    /// failure could not be pinned below the root
    pub prefix: Option<String>,
    pub reason: String,
}

impl ScanFailure {
    /// Whether the item `id` lives in the subtree this failure hid
    pub fn covers(&self, id: &str) -> bool {
        match &self.prefix {
            None => true,
            Some(prefix) => {
                id == prefix
                    || (id.starts_with(prefix.as_str())
                        && id.as_bytes().get(prefix.len()) == Some(&b'/'))
            }
        }
    }
}

/// Result of walking a dataset root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetScan {
    /// Image files found, sorted by file name within each directory
    pub images: Vec<ScannedImage>,
    /// Subtrees the walker could not list
    pub failures: Vec<ScanFailure>,
}

impl DatasetScan {
    /// Whether `id` sits under a subtree that could not be listed
    pub fn is_unlisted(&self, id: &str) -> bool {
        self.failures.iter().any(|f| f.covers(id))
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Check `path` against `extensions`, ignoring case and leading dots
pub fn has_image_extension(path: &Path, extensions: &[String]) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    extensions
        .iter()
        .any(|want| want.trim_start_matches('.').eq_ignore_ascii_case(ext))
}

/// Stable identifier for `path` relative to `root`
pub fn item_id(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Innermost path attached to a walker error
fn error_path(err: &ignore::Error) -> Option<&Path> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path),
        ignore::Error::WithDepth { err, .. } => error_path(err),
        ignore::Error::WithLineNumber { err, .. } => error_path(err),
        ignore::Error::Loop { child, .. } => Some(child),
        _ => None,
    }
}

/// Enumerate image files under `root`, recursively.
///
/// Entries come back sorted by file name within each directory, so two
/// scans of an unchanged tree agree on order. Hidden files and ignore
/// files get no special treatment. A root that cannot be listed is an
/// `Io` error; subdirectories that cannot be listed are returned as
/// failures alongside the images.
pub fn scan_images(root: &Path, extensions: &[String]) -> Result<DatasetScan> {
    if !root.is_dir() {
        return Err(Error::DatasetRootMissing(root.to_path_buf()));
    }
    fs::read_dir(root)?;

    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    let mut scan = DatasetScan::default();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = error_path(&e).unwrap_or(root).to_path_buf();
                warn!(path = %path.display(), error = %e, "Could not list dataset entry");
                scan.failures.push(ScanFailure {
                    prefix: item_id(root, &path),
                    path,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let path = entry.path();
        if !path.is_file() || !has_image_extension(path, extensions) {
            continue;
        }

        match item_id(root, path) {
            Some(id) => scan.images.push(ScannedImage {
                id,
                path: path.to_path_buf(),
            }),
            None => warn!(path = %path.display(), "Skipping image with non UTF-8 path"),
        }
    }

    Ok(scan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn default_extensions() -> Vec<String> {
        vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()]
    }

    fn ids_of(scan: &DatasetScan) -> Vec<String> {
        scan.images.iter().map(|img| img.id.clone()).collect()
    }

    #[test]
    fn test_extension_match_ignores_case() {
        let exts = default_extensions();
        assert!(has_image_extension(Path::new("a.JPG"), &exts));
        assert!(has_image_extension(Path::new("a.Jpeg"), &exts));
        assert!(has_image_extension(Path::new("dir/a.png"), &exts));
        assert!(!has_image_extension(Path::new("a.gif"), &exts));
        assert!(!has_image_extension(Path::new("png"), &exts));
        assert!(has_image_extension(Path::new("a.png"), &[".PNG".to_string()]));
    }

    #[test]
    fn test_item_id_relative() {
        let root = Path::new("/data/set");
        assert_eq!(
            item_id(root, Path::new("/data/set/animals/cat.png")).as_deref(),
            Some("animals/cat.png")
        );
        assert_eq!(item_id(root, Path::new("/elsewhere/cat.png")), None);
        assert_eq!(item_id(root, root), None);
    }

    #[test]
    fn test_scan_recursive_sorted() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("sub/deeper")).unwrap();
        fs::write(root.join("b.PNG"), b"x").unwrap();
        fs::write(root.join("a.jpg"), b"x").unwrap();
        fs::write(root.join("notes.txt"), b"x").unwrap();
        fs::write(root.join(".hidden.jpeg"), b"x").unwrap();
        fs::write(root.join("sub/c.jpeg"), b"x").unwrap();
        fs::write(root.join("sub/deeper/d.png"), b"x").unwrap();
        fs::create_dir_all(root.join("folder.jpg")).unwrap();

        let scan = scan_images(root, &default_extensions()).unwrap();
        assert!(scan.is_complete());
        let ids = ids_of(&scan);

        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(
            sorted,
            vec![".hidden.jpeg", "a.jpg", "b.PNG", "sub/c.jpeg", "sub/deeper/d.png"]
        );

        let again = scan_images(root, &default_extensions()).unwrap();
        assert_eq!(ids, ids_of(&again));
    }

    #[test]
    fn test_scan_missing_root() {
        let dir = tempdir().unwrap();
        let err = scan_images(&dir.path().join("nope"), &default_extensions()).unwrap_err();
        assert!(matches!(err, Error::DatasetRootMissing(_)));
    }

    #[test]
    fn test_failure_covers_subtree_only() {
        let failure = ScanFailure {
            path: PathBuf::from("/data/sub"),
            prefix: Some("sub".to_string()),
            reason: "permission denied".to_string(),
        };
        assert!(failure.covers("sub/kept.png"));
        assert!(failure.covers("sub/deeper/x.jpg"));
        assert!(!failure.covers("subway.png"));
        assert!(!failure.covers("top.png"));

        let whole = ScanFailure {
            path: PathBuf::from("/data"),
            prefix: None,
            reason: "permission denied".to_string(),
        };
        assert!(whole.covers("top.png"));

        let scan = DatasetScan {
            images: Vec::new(),
            failures: vec![failure],
        };
        assert!(scan.is_unlisted("sub/kept.png"));
        assert!(!scan.is_unlisted("top.png"));
        assert!(!scan.is_complete());
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_reports_unlistable_subdirectory() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("top.png"), b"x").unwrap();
        fs::write(root.join("sub/kept.png"), b"x").unwrap();

        let sub = root.join("sub");
        fs::set_permissions(&sub, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read_dir(&sub).is_ok() {
            // privileged user, permissions are not enforced
            fs::set_permissions(&sub, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let scan = scan_images(root, &default_extensions());
        fs::set_permissions(&sub, fs::Permissions::from_mode(0o755)).unwrap();
        let scan = scan.unwrap();

        assert_eq!(ids_of(&scan), vec!["top.png"]);
        assert_eq!(scan.failures.len(), 1);
        assert!(scan.is_unlisted("sub/kept.png"));
        assert!(!scan.is_unlisted("top.png"));
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_unlistable_root_is_error() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let root = dir.path().join("data");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("top.png"), b"x").unwrap();

        fs::set_permissions(&root, fs::Permissions::from_mode(0o311)).unwrap();
        if fs::read_dir(&root).is_ok() {
            fs::set_permissions(&root, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let result = scan_images(&root, &default_extensions());
        fs::set_permissions(&root, fs::Permissions::from_mode(0o755)).unwrap();
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
