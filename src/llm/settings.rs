//! LLM connection and generation settings.
//!
//! Every field resolves like any other preference: flag, session,
//! preference store, then the `[llm]` section of the config file.

use serde::Serialize;
use std::str::FromStr;
use tracing::warn;

use crate::config::LlmConfig;
use crate::error::{PreferenceError, PreferenceResult};
use crate::prefs::{Resolver, Scope, ValueSource};

pub const MODEL: &str = "LLMModel";
pub const ENDPOINT: &str = "LLMEndpoint";
pub const API_KEY: &str = "LLMApiKey";
pub const TEMPERATURE: &str = "LLMTemperature";
pub const MAX_TOKENS: &str = "LLMMaxTokens";
pub const GPU: &str = "LLMGpu";
pub const CPU: &str = "LLMCpu";
pub const TIMEOUT: &str = "LLMTimeout";

pub const ALL_KEYS: [&str; 8] = [
    MODEL,
    ENDPOINT,
    API_KEY,
    TEMPERATURE,
    MAX_TOKENS,
    GPU,
    CPU,
    TIMEOUT,
];

/// Per-call overrides, as given on the command line.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct LlmOverrides {
    /// Model identifier, e.g. qwen2.5-14b-instruct
    #[arg(long)]
    pub model: Option<String>,

    /// OpenAI-compatible base URL, e.g. http://127.0.0.1:1234/v1
    #[arg(long)]
    pub endpoint: Option<String>,

    #[arg(long)]
    pub api_key: Option<String>,

    #[arg(long)]
    pub temperature: Option<f32>,

    /// Maximum tokens in the response (-1 for no limit)
    #[arg(long, allow_hyphen_values = true)]
    pub max_tokens: Option<i32>,

    /// GPU offload (-2 auto, -1 all layers, 0 off)
    #[arg(long, allow_hyphen_values = true)]
    pub gpu: Option<i32>,

    /// CPU threads
    #[arg(long)]
    pub cpu: Option<u32>,

    /// Request timeout in seconds
    #[arg(long = "timeout")]
    pub timeout_secs: Option<u64>,
}

impl LlmOverrides {
    pub fn is_empty(&self) -> bool {
        self.model.is_none()
            && self.endpoint.is_none()
            && self.api_key.is_none()
            && self.temperature.is_none()
            && self.max_tokens.is_none()
            && self.gpu.is_none()
            && self.cpu.is_none()
            && self.timeout_secs.is_none()
    }

    fn pairs(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            (MODEL, self.model.clone()),
            (ENDPOINT, self.endpoint.clone()),
            (API_KEY, self.api_key.clone()),
            (TEMPERATURE, self.temperature.map(|v| v.to_string())),
            (MAX_TOKENS, self.max_tokens.map(|v| v.to_string())),
            (GPU, self.gpu.map(|v| v.to_string())),
            (CPU, self.cpu.map(|v| v.to_string())),
            (TIMEOUT, self.timeout_secs.map(|v| v.to_string())),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LlmSettings {
    pub model: String,
    pub endpoint: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: i32,
    pub timeout_secs: u64,
    pub gpu: Option<i32>,
    pub cpu: Option<u32>,
}

impl From<&LlmConfig> for LlmSettings {
    fn from(config: &LlmConfig) -> Self {
        Self {
            model: config.model.clone(),
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_secs: config.timeout_secs,
            gpu: config.gpu,
            cpu: config.cpu,
        }
    }
}

/// Resolved settings plus where each field came from.
#[derive(Debug, Clone)]
pub struct ResolvedLlmSettings {
    pub settings: LlmSettings,
    pub sources: Vec<(&'static str, ValueSource)>,
}

pub fn resolve_llm_settings(
    resolver: &mut Resolver<'_>,
    defaults: &LlmConfig,
    overrides: &LlmOverrides,
    scope: Scope,
) -> ResolvedLlmSettings {
    let mut sources = Vec::with_capacity(ALL_KEYS.len());
    let mut field = |name: &'static str, explicit: Option<String>| -> Option<String> {
        match resolver.lookup(name, explicit.as_deref(), scope) {
            Some(found) => {
                sources.push((name, found.source));
                Some(found.value)
            }
            None => {
                sources.push((name, ValueSource::Default));
                None
            }
        }
    };

    let model = field(MODEL, overrides.model.clone());
    let endpoint = field(ENDPOINT, overrides.endpoint.clone());
    let api_key = field(API_KEY, overrides.api_key.clone());
    let temperature = field(TEMPERATURE, overrides.temperature.map(|v| v.to_string()));
    let max_tokens = field(MAX_TOKENS, overrides.max_tokens.map(|v| v.to_string()));
    let gpu = field(GPU, overrides.gpu.map(|v| v.to_string()));
    let cpu = field(CPU, overrides.cpu.map(|v| v.to_string()));
    let timeout = field(TIMEOUT, overrides.timeout_secs.map(|v| v.to_string()));

    let settings = LlmSettings {
        model: model.unwrap_or_else(|| defaults.model.clone()),
        endpoint: endpoint.unwrap_or_else(|| defaults.endpoint.clone()),
        api_key: api_key.or_else(|| defaults.api_key.clone()),
        temperature: parse_or(TEMPERATURE, temperature, defaults.temperature),
        max_tokens: parse_or(MAX_TOKENS, max_tokens, defaults.max_tokens),
        timeout_secs: parse_or(TIMEOUT, timeout, defaults.timeout_secs),
        gpu: parse_optional(GPU, gpu).or(defaults.gpu),
        cpu: parse_optional(CPU, cpu).or(defaults.cpu),
    };

    ResolvedLlmSettings { settings, sources }
}

/// Writes every field present in `overrides`. Clearing the session drops
/// all LLM overrides at once.
pub fn apply_llm_settings(
    resolver: &mut Resolver<'_>,
    overrides: &LlmOverrides,
    scope: Scope,
) -> PreferenceResult<()> {
    if scope == Scope::ClearSession {
        for key in ALL_KEYS {
            resolver.apply(key, None, scope)?;
        }
        return Ok(());
    }

    if overrides.is_empty() {
        return Err(PreferenceError::MissingValue {
            parameter: "Model".to_string(),
        });
    }

    for (key, value) in overrides.pairs() {
        if let Some(value) = value {
            resolver.apply(key, Some(&value), scope)?;
        }
    }
    Ok(())
}

fn parse_optional<T: FromStr>(name: &str, raw: Option<String>) -> Option<T> {
    let raw = raw?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring invalid {} value '{}'", name, raw);
            None
        }
    }
}

fn parse_or<T: FromStr>(name: &str, raw: Option<String>, default: T) -> T {
    parse_optional(name, raw).unwrap_or(default)
}
