use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// Finds image files below each directory, sorted by path.
///
/// Sidecar files (`a.jpg:description.json`) never match because their
/// extension is `json`. Missing directories are skipped with a warning.
pub fn discover_images(
    directories: &[PathBuf],
    extensions: &[String],
    recurse: bool,
) -> Vec<PathBuf> {
    let mut images = Vec::new();

    for directory in directories {
        if !directory.is_dir() {
            warn!("Skipping missing image directory {}", directory.display());
            continue;
        }

        let walker = WalkDir::new(directory).follow_links(false);
        let walker = if recurse { walker } else { walker.max_depth(1) };

        for entry in walker.into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if entry.file_type().is_file() && has_extension(path, extensions) {
                images.push(path.to_path_buf());
            }
        }
    }

    // Sort by path for consistent ordering
    images.sort();
    images.dedup();

    images
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| extensions.iter().any(|e| e.to_lowercase() == ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::tempdir;

    fn extensions() -> Vec<String> {
        vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()]
    }

    #[test]
    fn test_discover_images() {
        let dir = tempdir().unwrap();

        // Create some test files
        File::create(dir.path().join("photo1.jpg")).unwrap();
        File::create(dir.path().join("photo2.PNG")).unwrap();
        File::create(dir.path().join("document.txt")).unwrap();
        File::create(dir.path().join("photo1.jpg:description.json")).unwrap();

        // Create subdirectory with more images
        fs::create_dir(dir.path().join("subdir")).unwrap();
        File::create(dir.path().join("subdir/photo3.jpeg")).unwrap();

        let dirs = vec![dir.path().to_path_buf()];
        assert_eq!(discover_images(&dirs, &extensions(), true).len(), 3);
        assert_eq!(discover_images(&dirs, &extensions(), false).len(), 2);
    }

    #[test]
    fn test_missing_and_overlapping_directories() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("a.jpg")).unwrap();

        let dirs = vec![
            dir.path().join("does-not-exist"),
            dir.path().to_path_buf(),
            dir.path().to_path_buf(),
        ];
        assert_eq!(discover_images(&dirs, &extensions(), true), vec![dir.path().join("a.jpg")]);
    }
}
