//! Instruction templates for the text transformations and image description.

use clap::ValueEnum;

/// Canned text transformations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Transformation {
    /// Rewrite blunt text in polished corporate language
    CorporateSpeak,
    /// Translate corporate language into plain, direct words
    FromCorporateSpeak,
    /// Rephrase text diplomatically
    DiplomaticSpeak,
    /// Say plainly what diplomatic text actually means
    FromDiplomaticSpeak,
    /// Sprinkle fitting emoticons into the text
    Emoticons,
    /// List the logical fallacies in the text
    Fallacies,
    /// Suggest movies similar to the given titles
    SimilarMovies,
    /// Turn a script error into a prompt for fixing it
    FixScriptError,
    /// Translate into the configured language
    Translate,
    /// Instructions come entirely from --instructions
    Custom,
}

impl Transformation {
    /// The fixed part of the instructions. `language` only affects
    /// [`Transformation::Translate`].
    pub fn template(&self, language: &str) -> String {
        match self {
            Transformation::CorporateSpeak => {
                "Rewrite the text in professional corporate language. \
                 Soften direct statements, keep every fact, and stay courteous. \
                 Return only the rewritten text."
                    .to_string()
            }
            Transformation::FromCorporateSpeak => {
                "Translate the corporate language in the text into plain, \
                 direct words that say what is really meant. Keep it short and honest. \
                 Return only the rewritten text."
                    .to_string()
            }
            Transformation::DiplomaticSpeak => {
                "Rephrase the text diplomatically. Be tactful and respectful \
                 while keeping the underlying message intact. Return only the rewritten text."
                    .to_string()
            }
            Transformation::FromDiplomaticSpeak => {
                "Explain in blunt, undiplomatic language what the \
                 diplomatic text actually means. Return only the rewritten text."
                    .to_string()
            }
            Transformation::Emoticons => {
                "Add fitting emoticons to the text without changing its wording. \
                 Return only the text with emoticons."
                    .to_string()
            }
            Transformation::Fallacies => {
                "Analyze the text for logical fallacies. For each fallacy found, \
                 quote the passage, name the fallacy and explain briefly why it applies. \
                 If there are none, say so."
                    .to_string()
            }
            Transformation::SimilarMovies => {
                "The text contains one or more movie titles. Suggest similar \
                 movies, one title per line, with the release year in parentheses. \
                 Return only the list."
                    .to_string()
            }
            Transformation::FixScriptError => {
                "The text is the output of a failed script run. Write a \
                 concise prompt for a coding assistant that describes the error, the likely \
                 cause and asks for a fix. Return only the prompt."
                    .to_string()
            }
            Transformation::Translate => format!(
                "Translate the text into {}. Keep formatting, names and code unchanged. \
                 Return only the translation.",
                language
            ),
            Transformation::Custom => String::new(),
        }
    }

    pub fn instructions(&self, language: &str, extra: Option<&str>) -> String {
        build_instructions(&self.template(language), extra)
    }
}

/// Appends the caller's extra instructions to a fixed template.
pub fn build_instructions(base: &str, extra: Option<&str>) -> String {
    match extra.map(str::trim).filter(|e| !e.is_empty()) {
        Some(extra) if base.is_empty() => extra.to_string(),
        Some(extra) => format!("{}\n\nAdditional instructions:\n{}", base, extra),
        None => base.to_string(),
    }
}

/// Prompt for describing one image as a JSON description sidecar.
pub fn image_description_prompt(language: &str) -> String {
    format!(
        "Analyze this image and respond with a single JSON object, no other text, in this format:\n\
         {{\n  \
           \"short_description\": \"<one sentence>\",\n  \
           \"long_description\": \"<a detailed paragraph>\",\n  \
           \"keywords\": [\"<keyword>\", ...],\n  \
           \"has_nudity\": <true|false>,\n  \
           \"has_explicit_content\": <true|false>,\n  \
           \"overall_mood_of_image\": \"<mood>\",\n  \
           \"picture_type\": \"<photo, drawing, screenshot, ...>\",\n  \
           \"style_type\": \"<style>\"\n\
         }}\n\
         Use between 5 and 15 lowercase keywords. Write all text values in {}.",
        language
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extra_instructions_are_appended() {
        let text = build_instructions("Base.", Some("  Be brief.  "));
        assert_eq!(text, "Base.\n\nAdditional instructions:\nBe brief.");
        assert_eq!(build_instructions("Base.", Some("   ")), "Base.");
        assert_eq!(build_instructions("Base.", None), "Base.");
    }

    #[test]
    fn test_custom_uses_extra_only() {
        assert_eq!(Transformation::Custom.instructions("English", Some("Shout.")), "Shout.");
        assert!(Transformation::Custom.instructions("English", None).is_empty());
    }

    #[test]
    fn test_translate_names_language() {
        assert!(Transformation::Translate.template("Dutch").contains("into Dutch"));
        assert!(image_description_prompt("French").contains("in French"));
    }
}
