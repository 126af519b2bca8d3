//! Typed accessors for the named preferences.

use std::path::{Path, PathBuf};
use tracing::warn;

use super::folders::{known_folder, FolderLocator, KnownFolder};
use super::resolver::{Resolved, Resolver, Scope, ValueSource};
use crate::error::{PreferenceError, PreferenceResult};

pub const LANGUAGE: &str = "AIMetaLanguage";
pub const IMAGE_DIRECTORIES: &str = "ImageDirectories";
pub const FACES_DIRECTORY: &str = "FacesDirectory";
pub const IMAGE_DATABASE_PATH: &str = "ImageDatabasePath";

pub const DEFAULT_LANGUAGE: &str = "English";

/// Languages the description and translation prompts are written for.
pub const SUPPORTED_LANGUAGES: &[&str] = &[
    "Afrikaans", "Arabic", "Bengali", "Bulgarian", "Catalan", "Chinese", "Croatian",
    "Czech", "Danish", "Dutch", "English", "Estonian", "Filipino", "Finnish", "French",
    "German", "Greek", "Hebrew", "Hindi", "Hungarian", "Icelandic", "Indonesian",
    "Italian", "Japanese", "Korean", "Latvian", "Lithuanian", "Malay", "Norwegian",
    "Persian", "Polish", "Portuguese", "Romanian", "Russian", "Serbian", "Slovak",
    "Slovenian", "Spanish", "Swahili", "Swedish", "Thai", "Turkish", "Ukrainian",
    "Urdu", "Vietnamese", "Welsh",
];

/// Canonical spelling of a supported language, matched case-insensitively.
pub fn canonical_language(language: &str) -> Option<&'static str> {
    let wanted = language.trim();
    SUPPORTED_LANGUAGES
        .iter()
        .copied()
        .find(|l| l.eq_ignore_ascii_case(wanted))
}

pub fn language(
    resolver: &mut Resolver<'_>,
    explicit: Option<&str>,
    scope: Scope,
) -> Resolved<String> {
    resolver.resolve(LANGUAGE, explicit, scope, || DEFAULT_LANGUAGE.to_string())
}

pub fn set_language(
    resolver: &mut Resolver<'_>,
    language: Option<&str>,
    scope: Scope,
) -> PreferenceResult<()> {
    let canonical = match language {
        Some(l) if scope != Scope::ClearSession && !l.trim().is_empty() => {
            let found = canonical_language(l)
                .ok_or_else(|| PreferenceError::UnsupportedLanguage(l.to_string()))?;
            Some(found)
        }
        _ => None,
    };
    resolver.apply(LANGUAGE, canonical, scope)
}

/// Default image collection: the user's picture, desktop, document and
/// download folders.
pub fn default_image_directories(folders: &dyn FolderLocator) -> Vec<PathBuf> {
    [
        KnownFolder::Pictures,
        KnownFolder::Desktop,
        KnownFolder::Documents,
        KnownFolder::Downloads,
    ]
    .into_iter()
    .map(|f| known_folder(folders, f))
    .collect()
}

pub fn image_directories(
    resolver: &mut Resolver<'_>,
    folders: &dyn FolderLocator,
    explicit: &[PathBuf],
    scope: Scope,
) -> Resolved<Vec<PathBuf>> {
    if !explicit.is_empty() {
        return Resolved::new(explicit.to_vec(), ValueSource::Explicit);
    }

    if let Some(found) = resolver.lookup(IMAGE_DIRECTORIES, None, scope) {
        if let Some(dirs) = parse_directories(&found.value) {
            return Resolved::new(dirs, found.source);
        }
        // a bad session value must not hide the stored one
        if found.source == ValueSource::Session && scope != Scope::SessionOnly {
            if let Some(stored) = resolver.lookup(IMAGE_DIRECTORIES, None, Scope::StoreOnly) {
                if let Some(dirs) = parse_directories(&stored.value) {
                    return Resolved::new(dirs, stored.source);
                }
            }
        }
    }

    Resolved::new(default_image_directories(folders), ValueSource::Default)
}

fn parse_directories(raw: &str) -> Option<Vec<PathBuf>> {
    match serde_json::from_str::<Vec<PathBuf>>(raw) {
        Ok(dirs) if !dirs.is_empty() => Some(dirs),
        Ok(_) => None,
        Err(e) => {
            warn!("Ignoring unreadable {} value: {}", IMAGE_DIRECTORIES, e);
            None
        }
    }
}

pub fn set_image_directories(
    resolver: &mut Resolver<'_>,
    directories: &[PathBuf],
    scope: Scope,
) -> PreferenceResult<()> {
    if scope == Scope::ClearSession || directories.is_empty() {
        return resolver.apply(IMAGE_DIRECTORIES, None, scope);
    }

    for dir in directories {
        ensure_directory(dir)?;
    }
    let encoded =
        serde_json::to_string(directories).map_err(|source| PreferenceError::InvalidValue {
            name: IMAGE_DIRECTORIES.to_string(),
            source,
        })?;
    resolver.apply(IMAGE_DIRECTORIES, Some(&encoded), scope)
}

pub fn faces_directory(
    resolver: &mut Resolver<'_>,
    folders: &dyn FolderLocator,
    explicit: Option<&Path>,
    scope: Scope,
) -> Resolved<PathBuf> {
    let explicit = explicit.map(|p| p.to_string_lossy().into_owned());
    resolver
        .resolve(FACES_DIRECTORY, explicit.as_deref(), scope, || {
            known_folder(folders, KnownFolder::Pictures)
                .join("Faces")
                .to_string_lossy()
                .into_owned()
        })
        .map(PathBuf::from)
}

pub fn set_faces_directory(
    resolver: &mut Resolver<'_>,
    directory: Option<&Path>,
    scope: Scope,
) -> PreferenceResult<()> {
    set_path(resolver, FACES_DIRECTORY, directory, scope, ensure_directory)
}

pub fn default_image_database_path(folders: &dyn FolderLocator) -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| folders.home().join(".local").join("share"))
        .join("aimeta")
        .join("allimages.meta.db")
}

pub fn image_database_path(
    resolver: &mut Resolver<'_>,
    folders: &dyn FolderLocator,
    explicit: Option<&Path>,
    scope: Scope,
) -> Resolved<PathBuf> {
    let explicit = explicit.map(|p| p.to_string_lossy().into_owned());
    resolver
        .resolve(IMAGE_DATABASE_PATH, explicit.as_deref(), scope, || {
            default_image_database_path(folders).to_string_lossy().into_owned()
        })
        .map(PathBuf::from)
}

pub fn set_image_database_path(
    resolver: &mut Resolver<'_>,
    path: Option<&Path>,
    scope: Scope,
) -> PreferenceResult<()> {
    set_path(resolver, IMAGE_DATABASE_PATH, path, scope, |p| match p.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_directory(parent),
        _ => Ok(()),
    })
}

fn set_path(
    resolver: &mut Resolver<'_>,
    name: &str,
    path: Option<&Path>,
    scope: Scope,
    prepare: impl FnOnce(&Path) -> PreferenceResult<()>,
) -> PreferenceResult<()> {
    let path = path.filter(|p| !p.as_os_str().is_empty());
    match path {
        Some(p) if scope != Scope::ClearSession => {
            prepare(p)?;
            let value = p.to_string_lossy();
            resolver.apply(name, Some(&value), scope)
        }
        _ => resolver.apply(name, None, scope),
    }
}

fn ensure_directory(dir: &Path) -> PreferenceResult<()> {
    std::fs::create_dir_all(dir).map_err(|source| PreferenceError::CreateDirectory {
        path: dir.to_path_buf(),
        source,
    })
}
