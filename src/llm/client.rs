use anyhow::{anyhow, Result};
use std::path::Path;

use super::prompts::image_description_prompt;
use super::provider::{
    encode_image_data_url, extract_json, ChatMessage, LlmProvider, OpenAICompatibleProvider,
};
use super::settings::LlmSettings;
use crate::sidecar::Description;

/// Longest image side sent to the model.
const MAX_IMAGE_DIMENSION: u32 = 1024;

/// LLM client that wraps a provider implementation
pub struct LlmClient {
    provider: Box<dyn LlmProvider>,
}

impl LlmClient {
    pub fn new(provider: Box<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    pub fn from_settings(settings: &LlmSettings) -> Self {
        Self::new(Box::new(OpenAICompatibleProvider::new(settings.clone())))
    }

    /// Get the provider name
    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    /// Runs `text` through the model with `instructions` as the system prompt.
    pub fn transform_text(&self, instructions: &str, text: &str) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if !instructions.trim().is_empty() {
            messages.push(ChatMessage::system(instructions));
        }
        messages.push(ChatMessage::user(text));

        let response = self.provider.complete(&messages)?;
        Ok(response.trim().to_string())
    }

    /// Asks the model for a description sidecar of the image at `image_path`,
    /// written in `language`.
    pub fn describe_image(&self, image_path: &Path, language: &str) -> Result<Description> {
        let data_url = encode_image_data_url(image_path, MAX_IMAGE_DIMENSION)?;
        let prompt = image_description_prompt(language);
        let messages = [ChatMessage::user_with_image(&prompt, data_url)];

        let content = self.provider.complete(&messages)?;
        parse_description(&content)
    }
}

/// Parses a model reply into a description, normalizing keywords to
/// trimmed lowercase without duplicates.
pub fn parse_description(content: &str) -> Result<Description> {
    let json = extract_json(content);
    let mut description: Description = serde_json::from_str(&json).map_err(|e| {
        anyhow!("Failed to parse description JSON: {} - Response was: {}", e, content)
    })?;

    if let Some(keywords) = description.keywords.take() {
        let mut normalized: Vec<String> = Vec::with_capacity(keywords.len());
        for keyword in keywords {
            let keyword = keyword.trim().to_lowercase();
            if !keyword.is_empty() && !normalized.contains(&keyword) {
                normalized.push(keyword);
            }
        }
        description.keywords = Some(normalized);
    }

    Ok(description)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::ContentPart;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct CannedProvider {
        reply: String,
        seen: Rc<RefCell<Vec<ChatMessage>>>,
    }

    impl LlmProvider for CannedProvider {
        fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
            self.seen.borrow_mut().extend_from_slice(messages);
            Ok(self.reply.clone())
        }

        fn provider_name(&self) -> &'static str {
            "canned"
        }
    }

    fn client(reply: &str) -> (LlmClient, Rc<RefCell<Vec<ChatMessage>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let provider = CannedProvider {
            reply: reply.to_string(),
            seen: Rc::clone(&seen),
        };
        (LlmClient::new(Box::new(provider)), seen)
    }

    #[test]
    fn test_transform_sends_system_and_user_messages() {
        let (client, seen) = client("  Synergy!  \n");

        let out = client.transform_text("Be corporate.", "we failed").unwrap();

        assert_eq!(out, "Synergy!");
        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], ChatMessage::system("Be corporate."));
        assert_eq!(seen[1], ChatMessage::user("we failed"));
    }

    #[test]
    fn test_transform_without_instructions() {
        let (client, seen) = client("ok");
        client.transform_text("", "hello").unwrap();
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn test_describe_image_sends_image_and_parses_reply() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("red.png");
        image::RgbImage::from_pixel(8, 8, image::Rgb([255, 0, 0]))
            .save(&path)
            .unwrap();
        let (client, seen) = client(concat!(
            "```json\n",
            r#"{"short_description":"red square","keywords":["Red"," square ","red"],"#,
            r#""picture_type":"graphic"}"#,
            "\n```",
        ));

        let description = client.describe_image(&path, "English").unwrap();

        assert_eq!(description.short_description.as_deref(), Some("red square"));
        assert_eq!(description.keywords, Some(vec!["red".to_string(), "square".to_string()]));
        assert_eq!(description.extra["picture_type"], "graphic");
        let seen = seen.borrow();
        assert!(matches!(
            &seen[0].content[1],
            ContentPart::ImageUrl { image_url }
                if image_url.url.starts_with("data:image/jpeg;base64,")
        ));
    }

    #[test]
    fn test_unparsable_description_is_an_error() {
        assert!(parse_description("I cannot see images.").is_err());
    }
}
