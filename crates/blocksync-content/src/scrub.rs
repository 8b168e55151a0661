//! Opt-in removal of volatile fields before hashing
//!
//! Scrubbing is destructive (the written file loses the scrubbed data),
//! so nothing is scrubbed unless rules are configured explicitly.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A configured scrub rule as it appears in user configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrubRule {
    /// Regular expression matched against normalized text
    pub pattern: String,
    /// Replacement text; supports `$1`-style capture references
    #[serde(default)]
    pub replacement: String,
}

impl ScrubRule {
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }

    /// Compile this rule into a [`Scrubber`].
    pub fn compile(&self) -> Result<Scrubber> {
        Scrubber::new(&self.pattern, &self.replacement)
    }
}

/// A compiled pattern/replacement pair.
#[derive(Debug, Clone)]
pub struct Scrubber {
    pattern: Regex,
    replacement: String,
}

impl Scrubber {
    pub fn new(pattern: &str, replacement: &str) -> Result<Self> {
        let compiled = Regex::new(pattern).map_err(|e| Error::InvalidScrubber {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            pattern: compiled,
            replacement: replacement.to_string(),
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Replace every match in `text`.
    pub fn apply(&self, text: &str) -> String {
        self.pattern
            .replace_all(text, self.replacement.as_str())
            .into_owned()
    }
}

/// Compile a list of rules, failing on the first invalid pattern.
pub fn compile_all(rules: &[ScrubRule]) -> Result<Vec<Scrubber>> {
    rules.iter().map(ScrubRule::compile).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrubber_replaces_all_matches() {
        let scrubber = Scrubber::new(r#"Stamp="[^"]*""#, r#"Stamp="""#).unwrap();
        let out = scrubber.apply(r#"<a Stamp="1"/><b Stamp="2"/>"#);
        assert_eq!(out, r#"<a Stamp=""/><b Stamp=""/>"#);
    }

    #[test]
    fn scrubber_supports_capture_groups() {
        let scrubber = Scrubber::new(r"(<Build>)\d+(</Build>)", "${1}0$2").unwrap();
        assert_eq!(scrubber.apply("<Build>4711</Build>"), "<Build>0</Build>");
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let err = ScrubRule::new("(", "").compile().unwrap_err();
        assert!(matches!(err, Error::InvalidScrubber { .. }));
    }

    #[test]
    fn rule_deserializes_without_replacement() {
        let rule: ScrubRule = serde_json::from_str(r#"{"pattern":"x"}"#).unwrap();
        assert_eq!(rule.replacement, "");
    }
}
