//! Shared helpers for aimeta integration tests.
//!
//! Every command runs with HOME, XDG dirs, config and preference store
//! pointed into one temp directory, so tests never touch the real user
//! profile and can run in parallel.

#![allow(dead_code)]

use assert_cmd::Command;
use std::path::{Path, PathBuf};
pub use tempfile::TempDir;

pub struct TestEnv {
    pub root: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            root: TempDir::new().unwrap(),
        }
    }

    /// Command for the aimeta binary with an isolated environment.
    pub fn aimeta(&self) -> Command {
        let root = self.root.path();
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_aimeta"));
        cmd.current_dir(root)
            .env("HOME", root)
            .env("XDG_CONFIG_HOME", root.join("config"))
            .env("XDG_DATA_HOME", root.join("data"))
            .env("AIMETA_CONFIG", self.config_path())
            .env("AIMETA_PREFERENCES_DB", self.preferences_path())
            .env("AIMETA_LOG", "off");
        cmd
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.path().join("config/aimeta/config.toml")
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.root.path().join("prefs/preferences.db")
    }

    /// Creates an empty image file with a description sidecar.
    pub fn image_with_description(&self, dir: &str, name: &str, description: &str) -> PathBuf {
        let dir = self.root.path().join(dir);
        std::fs::create_dir_all(&dir).unwrap();
        let image = dir.join(name);
        std::fs::write(&image, b"not really a jpeg").unwrap();
        std::fs::write(sidecar(&image, "description.json"), description).unwrap();
        image
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// `<image>:<name>`
pub fn sidecar(image: &Path, name: &str) -> PathBuf {
    let mut os = image.as_os_str().to_owned();
    os.push(":");
    os.push(name);
    PathBuf::from(os)
}
