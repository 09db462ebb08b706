//! Where downloads land, and whether we may write there.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::constants::{DOWNLOADS_RELATIVE_PATH, PICTURES_RELATIVE_PATH};

/// Directory layout of shared and app-private storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    /// Root of shared storage (public `Download/` and `Pictures/` live here).
    pub public_dir: PathBuf,
    /// App-specific directory, always writable by the app.
    pub app_dir: PathBuf,
    /// Shared storage is written through the media store only.
    pub scoped: bool,
}

impl StorageLayout {
    /// Creates a layout.
    pub fn new(public_dir: impl Into<PathBuf>, app_dir: impl Into<PathBuf>, scoped: bool) -> Self {
        Self {
            public_dir: public_dir.into(),
            app_dir: app_dir.into(),
            scoped,
        }
    }

    #[must_use]
    pub fn public_downloads(&self) -> PathBuf {
        self.public_dir.join(DOWNLOADS_RELATIVE_PATH)
    }

    #[must_use]
    pub fn public_pictures(&self) -> PathBuf {
        self.public_dir.join(PICTURES_RELATIVE_PATH)
    }

    #[must_use]
    pub fn app_downloads(&self) -> PathBuf {
        self.app_dir.join(DOWNLOADS_RELATIVE_PATH)
    }

    /// Directory whose write access gates dispatching.
    ///
    /// With scoped storage the app never needs write access to shared
    /// storage, only to its own directory.
    #[must_use]
    pub fn gated_dir(&self) -> PathBuf {
        if self.scoped {
            self.app_dir.clone()
        } else {
            self.public_downloads()
        }
    }
}

/// Storage permission check run before every dispatch.
pub trait StoragePermission: Send + Sync {
    fn is_granted(&self, layout: &StorageLayout) -> bool;
}

/// Grants access when the gated directory exists (or can be created) and is
/// not read-only.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilesystemPermission;

impl StoragePermission for FilesystemPermission {
    fn is_granted(&self, layout: &StorageLayout) -> bool {
        let dir = layout.gated_dir();
        let granted = is_writable_dir(&dir);
        debug!(dir = %dir.display(), granted, "storage permission check");
        granted
    }
}

fn is_writable_dir(dir: &Path) -> bool {
    if std::fs::create_dir_all(dir).is_err() {
        return false;
    }
    std::fs::metadata(dir).is_ok_and(|meta| meta.is_dir() && !meta.permissions().readonly())
}

/// Fixed answer, for embedders that track permission themselves.
#[derive(Debug, Clone, Copy)]
pub struct StaticPermission(pub bool);

impl StoragePermission for StaticPermission {
    fn is_granted(&self, _layout: &StorageLayout) -> bool {
        self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout_paths() {
        let layout = StorageLayout::new("/shared", "/app", true);
        assert_eq!(layout.public_downloads(), PathBuf::from("/shared/Download"));
        assert_eq!(layout.public_pictures(), PathBuf::from("/shared/Pictures"));
        assert_eq!(layout.app_downloads(), PathBuf::from("/app/Download"));
        assert_eq!(layout.gated_dir(), PathBuf::from("/app"));

        let legacy = StorageLayout::new("/shared", "/app", false);
        assert_eq!(legacy.gated_dir(), PathBuf::from("/shared/Download"));
    }

    #[test]
    fn test_filesystem_permission_creates_missing_dir() {
        let temp = TempDir::new().unwrap();
        let layout = StorageLayout::new(temp.path().join("shared"), temp.path().join("app"), false);
        assert!(FilesystemPermission.is_granted(&layout));
        assert!(layout.public_downloads().is_dir());
    }

    #[test]
    fn test_filesystem_permission_denied_when_path_is_a_file() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("shared");
        std::fs::write(&blocker, b"not a dir").unwrap();
        let layout = StorageLayout::new(&blocker, temp.path().join("app"), false);
        assert!(!FilesystemPermission.is_granted(&layout));
    }
}
