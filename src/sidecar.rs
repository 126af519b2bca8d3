//! JSON metadata stored next to an image.
//!
//! Sidecars are addressed as `<image path>:<name>.json`. On NTFS that is an
//! alternate data stream of the image; elsewhere it is a plain file whose
//! name contains a colon.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidecarKind {
    Description,
    /// Superseded by the `keywords` field of the description.
    LegacyKeywords,
    People,
}

impl SidecarKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            SidecarKind::Description => "description.json",
            SidecarKind::LegacyKeywords => "keywords.json",
            SidecarKind::People => "people.json",
        }
    }
}

pub fn sidecar_path(image: &Path, kind: SidecarKind) -> PathBuf {
    let mut name = OsString::from(image.as_os_str());
    name.push(":");
    name.push(kind.file_name());
    PathBuf::from(name)
}

/// LLM-generated description of an image.
///
/// Fields this crate does not interpret (`has_nudity`, `picture_type`, ...)
/// are kept in `extra` and written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Description {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Description {
    /// Folds a newer description into this one.
    ///
    /// Texts the newer one carries replace the current ones. Keywords are
    /// the union of both lists, current ones first. Extra fields are merged
    /// with the newer value winning.
    pub fn absorb(&mut self, newer: Description) {
        if newer.short_description.is_some() {
            self.short_description = newer.short_description;
        }
        if newer.long_description.is_some() {
            self.long_description = newer.long_description;
        }
        if let Some(added) = newer.keywords {
            let keywords = self.keywords.get_or_insert_with(Vec::new);
            for keyword in added {
                if !keywords.contains(&keyword) {
                    keywords.push(keyword);
                }
            }
        }
        self.extra.extend(newer.extra);
    }
}

/// Recognized faces in an image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct People {
    #[serde(default)]
    pub count: u32,

    #[serde(default)]
    pub faces: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LegacyKeywords {
    List(Vec<String>),
    Object { keywords: Vec<String> },
}

impl From<LegacyKeywords> for Vec<String> {
    fn from(legacy: LegacyKeywords) -> Self {
        match legacy {
            LegacyKeywords::List(k) | LegacyKeywords::Object { keywords: k } => k,
        }
    }
}

/// Folds a legacy keyword list into a description.
///
/// Keywords already present on the description are kept as they are.
pub fn merge_legacy_keywords(description: Option<Description>, legacy: Vec<String>) -> Description {
    let mut description = description.unwrap_or_default();
    if description.keywords.is_none() {
        description.keywords = Some(legacy);
    }
    description
}

/// The sidecars found for one image. Unreadable ones count as missing.
#[derive(Debug, Clone, Default)]
pub struct Sidecars {
    pub description: Option<Description>,
    pub legacy_keywords: Option<Vec<String>>,
    pub people: Option<People>,
}

impl Sidecars {
    pub fn load(image: &Path) -> Self {
        Self {
            description: read_sidecar(&sidecar_path(image, SidecarKind::Description)),
            legacy_keywords: read_sidecar::<LegacyKeywords>(&sidecar_path(
                image,
                SidecarKind::LegacyKeywords,
            ))
            .map(Vec::from),
            people: read_sidecar(&sidecar_path(image, SidecarKind::People)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.legacy_keywords.is_none() && self.people.is_none()
    }

    /// Keywords from the description, or the legacy list if not migrated.
    pub fn keywords(&self) -> Vec<String> {
        self.description
            .as_ref()
            .and_then(|d| d.keywords.clone())
            .or_else(|| self.legacy_keywords.clone())
            .unwrap_or_default()
    }

    pub fn face_names(&self) -> &[String] {
        self.people.as_ref().map(|p| p.faces.as_slice()).unwrap_or(&[])
    }
}

/// One-time migration of `keywords.json` into `description.json`.
///
/// Runs only when the description has no keywords of its own. A
/// description file that exists but does not parse is left untouched and
/// blocks the migration. The legacy sidecar is removed once the merged
/// description is on disk.
/// Returns whether a migration happened.
pub fn migrate_legacy_keywords(image: &Path, sidecars: &mut Sidecars) -> Result<bool> {
    let has_own_keywords = sidecars
        .description
        .as_ref()
        .is_some_and(|d| d.keywords.is_some());
    if has_own_keywords || sidecars.legacy_keywords.is_none() {
        return Ok(false);
    }

    let description_path = sidecar_path(image, SidecarKind::Description);
    if sidecars.description.is_none() && description_path.exists() {
        warn!(
            "Not migrating legacy keywords for {}: {} exists but cannot be read",
            image.display(),
            description_path.display()
        );
        return Ok(false);
    }
    let Some(legacy) = sidecars.legacy_keywords.take() else {
        return Ok(false);
    };

    let merged = merge_legacy_keywords(sidecars.description.take(), legacy);
    write_sidecar(&description_path, &merged)?;

    let legacy_path = sidecar_path(image, SidecarKind::LegacyKeywords);
    std::fs::remove_file(&legacy_path)
        .with_context(|| format!("failed to remove {}", legacy_path.display()))?;

    debug!("Migrated legacy keywords for {}", image.display());
    sidecars.description = Some(merged);
    Ok(true)
}

pub fn read_sidecar<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let content = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("Ignoring unreadable sidecar {}: {}", path.display(), e);
            None
        }
    }
}

pub fn write_sidecar<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string(value)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
