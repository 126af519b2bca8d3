use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::codecs::jpeg::JpegEncoder;
use image::GenericImageView;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use super::settings::LlmSettings;

/// One chat message in OpenAI wire format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: Vec<ContentPart>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

impl ChatMessage {
    pub fn system(text: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: vec![ContentPart::Text { text: text.to_string() }],
        }
    }

    pub fn user(text: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: vec![ContentPart::Text { text: text.to_string() }],
        }
    }

    pub fn user_with_image(text: &str, data_url: String) -> Self {
        Self {
            role: "user".to_string(),
            content: vec![
                ContentPart::Text { text: text.to_string() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url: data_url },
                },
            ],
        }
    }
}

/// Something that answers chat-completion requests.
pub trait LlmProvider {
    fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Get the provider name for display
    fn provider_name(&self) -> &'static str;
}

// ============================================================================
// OpenAI-compatible provider (works with LM Studio, OpenAI, and compatible APIs)
// ============================================================================

pub struct OpenAICompatibleProvider {
    settings: LlmSettings,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    /// LM Studio load hint; ignored by other servers.
    #[serde(skip_serializing_if = "Option::is_none")]
    gpu_offload: Option<i32>,
    /// LM Studio load hint; ignored by other servers.
    #[serde(skip_serializing_if = "Option::is_none")]
    cpu_threads: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

impl OpenAICompatibleProvider {
    pub fn new(settings: LlmSettings) -> Self {
        Self { settings }
    }

    fn request<'a>(&'a self, messages: &'a [ChatMessage]) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.settings.model,
            messages,
            temperature: self.settings.temperature,
            max_tokens: u32::try_from(self.settings.max_tokens).ok().filter(|n| *n > 0),
            gpu_offload: self.settings.gpu,
            cpu_threads: self.settings.cpu,
        }
    }
}

impl LlmProvider for OpenAICompatibleProvider {
    fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/chat/completions", self.settings.endpoint.trim_end_matches('/'));
        debug!("POST {} (model {})", url, self.settings.model);

        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(self.settings.timeout_secs))
            .build();

        let mut req = agent.post(&url).set("Content-Type", "application/json");

        if let Some(ref api_key) = self.settings.api_key {
            req = req.set("Authorization", &format!("Bearer {}", api_key));
        }

        let response = req
            .send_json(self.request(messages))
            .map_err(|e| anyhow!("LLM request failed: {}", e))?;

        let chat_response: ChatCompletionResponse = response
            .into_json()
            .map_err(|e| anyhow!("Failed to parse LLM response: {}", e))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow!("No response from LLM"))
    }

    fn provider_name(&self) -> &'static str {
        "OpenAI-compatible"
    }
}

/// Load an image, resize if either dimension exceeds `max_dimension`, re-encode as JPEG,
/// and return it as a `data:` URL.
pub fn encode_image_data_url(image_path: &Path, max_dimension: u32) -> Result<String> {
    let img = image::open(image_path)
        .map_err(|e| anyhow!("Failed to open image {}: {}", image_path.display(), e))?;

    let (width, height) = img.dimensions();
    let img = if width > max_dimension || height > max_dimension {
        img.resize(
            max_dimension,
            max_dimension,
            image::imageops::FilterType::Triangle,
        )
    } else {
        img
    };

    let mut buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buf, 85);
    img.to_rgb8()
        .write_with_encoder(encoder)
        .map_err(|e| anyhow!("Failed to encode image as JPEG: {}", e))?;

    Ok(format!("data:image/jpeg;base64,{}", BASE64.encode(buf.into_inner())))
}

/// Extract JSON from a string that might contain markdown code blocks
pub fn extract_json(content: &str) -> String {
    let trimmed = content.trim();

    // Check for markdown code block
    if trimmed.starts_with("```") {
        // Find the end of the code block
        if let Some(start) = trimmed.find('\n') {
            let after_first_line = &trimmed[start + 1..];
            if let Some(end) = after_first_line.rfind("```") {
                return after_first_line[..end].trim().to_string();
            }
        }
    }

    // Fall back to the outermost object
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => trimmed[start..=end].to_string(),
        _ => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;

    #[test]
    fn test_extract_json_from_code_block() {
        let content = "```json\n{\"keywords\": [\"cat\"]}\n```";
        assert_eq!(extract_json(content), "{\"keywords\": [\"cat\"]}");
    }

    #[test]
    fn test_extract_json_from_chatter() {
        let content = "Sure! Here it is: {\"a\": 1} Hope that helps.";
        assert_eq!(extract_json(content), "{\"a\": 1}");
        assert_eq!(extract_json("no json"), "no json");
    }

    #[test]
    fn test_request_omits_unset_hints() {
        let settings = LlmSettings::from(&LlmConfig::default());
        let provider = OpenAICompatibleProvider::new(settings);
        let messages = [ChatMessage::user("hi")];

        let json = serde_json::to_value(provider.request(&messages)).unwrap();
        assert!(json.get("max_tokens").is_none());
        assert!(json.get("gpu_offload").is_none());
        assert_eq!(json["messages"][0]["content"][0]["type"], "text");
    }

    #[test]
    fn test_request_forwards_hints() {
        let mut settings = LlmSettings::from(&LlmConfig::default());
        settings.max_tokens = 256;
        settings.gpu = Some(-1);
        settings.cpu = Some(8);
        let provider = OpenAICompatibleProvider::new(settings);
        let messages = [ChatMessage::system("x")];

        let json = serde_json::to_value(provider.request(&messages)).unwrap();
        assert_eq!(json["max_tokens"], 256);
        assert_eq!(json["gpu_offload"], -1);
        assert_eq!(json["cpu_threads"], 8);
    }
}
