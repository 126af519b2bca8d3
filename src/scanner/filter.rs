//! Wildcard matching for keyword and people filters.

use anyhow::{Context, Result};
use regex::Regex;

/// A glob-style pattern (`*` any run, `?` one character) matched
/// case-insensitively against the whole input.
#[derive(Debug, Clone)]
pub struct Wildcard {
    pattern: String,
    regex: Regex,
}

impl Wildcard {
    pub fn new(pattern: &str) -> Result<Self> {
        let mut expr = String::with_capacity(pattern.len() + 8);
        expr.push_str("(?is)^");
        for c in pattern.chars() {
            match c {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                _ => expr.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
            }
        }
        expr.push('$');

        let regex = Regex::new(&expr).with_context(|| format!("invalid pattern '{}'", pattern))?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }
}

/// Keyword and people filters for a scan or an index search.
#[derive(Debug, Clone, Default)]
pub struct ImageFilter {
    keywords: Vec<Wildcard>,
    people: Vec<Wildcard>,
}

impl ImageFilter {
    pub fn new(keywords: &[String], people: &[String]) -> Result<Self> {
        let compile = |patterns: &[String]| -> Result<Vec<Wildcard>> {
            patterns
                .iter()
                .filter(|p| !p.trim().is_empty())
                .map(|p| Wildcard::new(p.trim()))
                .collect()
        };
        Ok(Self {
            keywords: compile(keywords)?,
            people: compile(people)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty() && self.people.is_empty()
    }

    /// Any keyword pattern against the description text or any keyword.
    /// Passes when no keyword patterns were given.
    pub fn matches_keywords(&self, description_text: Option<&str>, keywords: &[String]) -> bool {
        if self.keywords.is_empty() {
            return true;
        }
        self.keywords.iter().any(|pattern| {
            description_text.is_some_and(|text| pattern.is_match(text))
                || keywords.iter().any(|k| pattern.is_match(k))
        })
    }

    /// Any people pattern against any recognized face name.
    /// Passes when no people patterns were given.
    pub fn matches_people(&self, faces: &[String]) -> bool {
        if self.people.is_empty() {
            return true;
        }
        self.people
            .iter()
            .any(|pattern| faces.iter().any(|name| pattern.is_match(name)))
    }
}

impl std::fmt::Display for ImageFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let join = |patterns: &[Wildcard]| {
            patterns
                .iter()
                .map(Wildcard::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mut parts = Vec::new();
        if !self.keywords.is_empty() {
            parts.push(format!("keywords {}", join(&self.keywords)));
        }
        if !self.people.is_empty() {
            parts.push(format!("people {}", join(&self.people)));
        }
        write!(f, "{}", parts.join("; "))
    }
}
