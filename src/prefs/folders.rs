//! Well-known user folders used as directory defaults.

use anyhow::{anyhow, Result};
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownFolder {
    Pictures,
    Desktop,
    Documents,
    Downloads,
}

impl KnownFolder {
    /// Folder name used under the home directory when the OS query fails.
    pub fn literal_name(&self) -> &'static str {
        match self {
            KnownFolder::Pictures => "Pictures",
            KnownFolder::Desktop => "Desktop",
            KnownFolder::Documents => "Documents",
            KnownFolder::Downloads => "Downloads",
        }
    }
}

/// Answers known-folder queries. May fail.
pub trait FolderLocator {
    fn locate(&self, folder: KnownFolder) -> Result<PathBuf>;

    fn home(&self) -> PathBuf;
}

/// Queries the host through the `dirs` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemFolders;

impl FolderLocator for SystemFolders {
    fn locate(&self, folder: KnownFolder) -> Result<PathBuf> {
        let path = match folder {
            KnownFolder::Pictures => dirs::picture_dir(),
            KnownFolder::Desktop => dirs::desktop_dir(),
            KnownFolder::Documents => dirs::document_dir(),
            KnownFolder::Downloads => dirs::download_dir(),
        };
        path.ok_or_else(|| anyhow!("no known folder path for {}", folder.literal_name()))
    }

    fn home(&self) -> PathBuf {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Resolves a known folder, asking the OS first and only then
/// substituting `<home>/<literal name>`.
pub fn known_folder(locator: &dyn FolderLocator, folder: KnownFolder) -> PathBuf {
    match locator.locate(folder) {
        Ok(path) => path,
        Err(e) => {
            let fallback = locator.home().join(folder.literal_name());
            warn!("{}; using {}", e, fallback.display());
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenLocator;

    impl FolderLocator for BrokenLocator {
        fn locate(&self, _folder: KnownFolder) -> Result<PathBuf> {
            Err(anyhow!("shell folder query failed"))
        }

        fn home(&self) -> PathBuf {
            PathBuf::from("/home/test")
        }
    }

    struct LocalizedLocator;

    impl FolderLocator for LocalizedLocator {
        fn locate(&self, folder: KnownFolder) -> Result<PathBuf> {
            match folder {
                KnownFolder::Pictures => Ok(PathBuf::from("/home/test/Afbeeldingen")),
                _ => Err(anyhow!("unknown")),
            }
        }

        fn home(&self) -> PathBuf {
            PathBuf::from("/home/test")
        }
    }

    #[test]
    fn test_failed_query_uses_literal_path() {
        assert_eq!(
            known_folder(&BrokenLocator, KnownFolder::Downloads),
            PathBuf::from("/home/test/Downloads")
        );
    }

    #[test]
    fn test_os_answer_beats_literal_path() {
        assert_eq!(
            known_folder(&LocalizedLocator, KnownFolder::Pictures),
            PathBuf::from("/home/test/Afbeeldingen")
        );
        assert_eq!(
            known_folder(&LocalizedLocator, KnownFolder::Desktop),
            PathBuf::from("/home/test/Desktop")
        );
    }
}
