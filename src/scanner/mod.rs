pub mod describe;
pub mod discovery;
pub mod filter;

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::ScannerConfig;
use crate::sidecar::{migrate_legacy_keywords, Description, People, Sidecars};

pub use describe::{describe_images, DescribeSummary};
pub use discovery::discover_images;
pub use filter::{ImageFilter, Wildcard};

/// An image together with its sidecar metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageRecord {
    pub path: PathBuf,
    pub description: Option<Description>,
    pub keywords: Vec<String>,
    pub people: Option<People>,
}

impl ImageRecord {
    pub fn from_sidecars(path: &Path, sidecars: Sidecars) -> Self {
        let keywords = sidecars.keywords();
        Self {
            path: path.to_path_buf(),
            description: sidecars.description,
            keywords,
            people: sidecars.people,
        }
    }

    pub fn face_names(&self) -> &[String] {
        self.people.as_ref().map(|p| p.faces.as_slice()).unwrap_or(&[])
    }

    /// The description as compact JSON, which keyword patterns search.
    pub fn description_text(&self) -> Option<String> {
        self.description
            .as_ref()
            .and_then(|d| serde_json::to_string(d).ok())
    }

    pub fn matches(&self, filter: &ImageFilter) -> bool {
        let text = self.description_text();
        filter.matches_keywords(text.as_deref(), &self.keywords)
            && filter.matches_people(self.face_names())
    }
}

pub struct Scanner {
    extensions: Vec<String>,
    recurse: bool,
}

impl Scanner {
    pub fn new(config: &ScannerConfig) -> Self {
        Self {
            extensions: config.image_extensions.clone(),
            recurse: config.recurse,
        }
    }

    pub fn with_recurse(mut self, recurse: bool) -> Self {
        self.recurse = recurse;
        self
    }

    pub fn discover(&self, directories: &[PathBuf]) -> Vec<PathBuf> {
        discover_images(directories, &self.extensions, self.recurse)
    }

    /// Scans `directories` and returns the images passing `filter`.
    ///
    /// Without filters every image with at least one sidecar is returned.
    /// Legacy keyword sidecars are migrated along the way.
    pub fn scan(&self, directories: &[PathBuf], filter: &ImageFilter) -> Vec<ImageRecord> {
        let images = self.discover(directories);
        info!("Scanning {} images in {} directories", images.len(), directories.len());

        let records: Vec<ImageRecord> = images
            .iter()
            .filter_map(|path| inspect_image(path, filter))
            .collect();

        info!("{} images matched", records.len());
        records
    }
}

/// Loads one image's sidecars and applies `filter`.
pub fn inspect_image(path: &Path, filter: &ImageFilter) -> Option<ImageRecord> {
    let mut sidecars = Sidecars::load(path);
    if sidecars.is_empty() {
        return None;
    }

    if let Err(e) = migrate_legacy_keywords(path, &mut sidecars) {
        warn!("Legacy keyword migration failed for {}: {:#}", path.display(), e);
    }

    let record = ImageRecord::from_sidecars(path, sidecars);
    if filter.is_empty() || record.matches(filter) {
        Some(record)
    } else {
        debug!("{} filtered out", path.display());
        None
    }
}
