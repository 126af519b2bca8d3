use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable that points at an alternative config file.
pub const CONFIG_ENV: &str = "AIMETA_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Location of the persistent preference store.
    #[serde(default = "default_preferences_path")]
    pub preferences_path: PathBuf,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub scanner: ScannerConfig,

    #[serde(default)]
    pub gallery: GalleryConfig,
}

/// System defaults for the LLM settings. Preferences and CLI flags
/// override every field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// -1 leaves the limit to the server.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: i32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// GPU offload hint (-2 auto, -1 all layers, 0 off).
    #[serde(default)]
    pub gpu: Option<i32>,

    /// CPU thread count hint.
    #[serde(default)]
    pub cpu: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,

    #[serde(default = "default_recurse")]
    pub recurse: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GalleryConfig {
    /// Where the generated HTML gallery is written. Defaults to the temp dir.
    #[serde(default)]
    pub output_path: Option<PathBuf>,

    /// Browser command used to open the gallery.
    /// If not set, uses system default (xdg-open on Linux, open on macOS)
    #[serde(default)]
    pub browser: Option<String>,
}

fn default_preferences_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("aimeta")
        .join("preferences.db")
}

fn default_llm_endpoint() -> String {
    "http://127.0.0.1:1234/v1".to_string()
}

fn default_llm_model() -> String {
    "qwen2.5-14b-instruct".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_tokens() -> i32 {
    -1
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_image_extensions() -> Vec<String> {
    vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()]
}

fn default_recurse() -> bool {
    true
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            gpu: None,
            cpu: None,
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            image_extensions: default_image_extensions(),
            recurse: default_recurse(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            preferences_path: default_preferences_path(),
            llm: LlmConfig::default(),
            scanner: ScannerConfig::default(),
            gallery: GalleryConfig::default(),
        }
    }
}

impl Config {
    /// Load from `AIMETA_CONFIG` if set, otherwise from the default location.
    /// A default config file is written when none exists yet.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(Self::config_path);
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("failed to parse config {}", path.display()))?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("aimeta")
    }

    fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_config_is_created_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        let config = Config::load_from(&path).unwrap();

        assert!(path.exists());
        assert_eq!(config.llm.endpoint, "http://127.0.0.1:1234/v1");
        assert_eq!(config.scanner.image_extensions, vec!["jpg", "jpeg", "png"]);
        assert!(config.scanner.recurse);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[llm]\nmodel = \"gemma-3-4b\"\ngpu = -1\n").unwrap();

        let config = Config::load_from(&path).unwrap();

        assert_eq!(config.llm.model, "gemma-3-4b");
        assert_eq!(config.llm.gpu, Some(-1));
        assert_eq!(config.llm.timeout_secs, 120);
        assert!(config.gallery.browser.is_none());
    }
}
