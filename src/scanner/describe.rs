//! Fills in description sidecars through the LLM.

use std::path::PathBuf;
use tracing::{info, warn};

use super::Scanner;
use crate::llm::LlmClient;
use crate::sidecar::{migrate_legacy_keywords, sidecar_path, write_sidecar, SidecarKind, Sidecars};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescribeSummary {
    pub described: usize,
    pub skipped: usize,
    pub failed: Vec<(PathBuf, String)>,
}

/// Describes every image under `directories` and writes the description
/// sidecars. With `only_new`, images that already have a readable
/// description are left alone. Otherwise pending legacy keywords are
/// migrated first and the reply is merged into the existing description.
/// A failure on one image does not stop the run.
pub fn describe_images(
    scanner: &Scanner,
    client: &LlmClient,
    directories: &[PathBuf],
    language: &str,
    only_new: bool,
) -> DescribeSummary {
    let mut summary = DescribeSummary::default();
    let images = scanner.discover(directories);
    let total = images.len();

    for (index, image) in images.into_iter().enumerate() {
        let mut sidecars = Sidecars::load(&image);
        if only_new && sidecars.description.is_some() {
            summary.skipped += 1;
            continue;
        }
        if let Err(e) = migrate_legacy_keywords(&image, &mut sidecars) {
            warn!("Could not migrate keywords for {}: {:#}", image.display(), e);
        }

        info!("[{}/{}] Describing {}", index + 1, total, image.display());
        let target = sidecar_path(&image, SidecarKind::Description);
        let result = client.describe_image(&image, language).and_then(|reply| {
            let mut description = sidecars.description.take().unwrap_or_default();
            description.absorb(reply);
            write_sidecar(&target, &description)
        });

        match result {
            Ok(()) => summary.described += 1,
            Err(e) => {
                warn!("Could not describe {}: {:#}", image.display(), e);
                summary.failed.push((image, e.to_string()));
            }
        }
    }

    summary
}
