use super::error::InvalidPatternError;
use log::warn;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// What to do with a pattern literal the regex engine rejects
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvalidPatternPolicy {
    /// Reject the whole expression
    #[default]
    Fail,
    /// Replace the broken leaf with a matcher that never matches
    NeverMatch,
}

/// Settings applied uniformly to every leaf of an expression
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchOptions {
    /// When false, letters match regardless of case
    pub case_sensitive: bool,
    pub on_invalid_pattern: InvalidPatternPolicy,
}

impl MatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn on_invalid_pattern(mut self, policy: InvalidPatternPolicy) -> Self {
        self.on_invalid_pattern = policy;
        self
    }
}

/// One compiled pattern literal
///
/// Matching is a substring search: the pattern only has to occur somewhere
/// in the subject unless it anchors itself with `^` or `$`.
#[derive(Debug, Clone)]
pub struct Matcher {
    source: String,
    regex: Option<Regex>,
}

impl Matcher {
    /// Compile `source`, honoring the policy in `options` for invalid patterns
    pub fn compile(source: &str, options: &MatchOptions) -> Result<Self, InvalidPatternError> {
        let compiled = RegexBuilder::new(source)
            .case_insensitive(!options.case_sensitive)
            .build();

        match compiled {
            Ok(regex) => Ok(Self {
                source: source.to_string(),
                regex: Some(regex),
            }),
            Err(error) => match options.on_invalid_pattern {
                InvalidPatternPolicy::Fail => Err(InvalidPatternError {
                    pattern: source.to_string(),
                    source: error,
                }),
                InvalidPatternPolicy::NeverMatch => {
                    warn!("pattern \"{source}\" is invalid and will never match: {error}");
                    Ok(Self::never(source))
                }
            },
        }
    }

    /// A matcher that rejects every subject
    pub fn never(source: &str) -> Self {
        Self {
            source: source.to_string(),
            regex: None,
        }
    }

    pub fn matches(&self, subject: &str) -> bool {
        self.regex
            .as_ref()
            .is_some_and(|regex| regex.is_match(subject))
    }

    /// The pattern text this matcher was built from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// False for placeholders substituted under [`InvalidPatternPolicy::NeverMatch`]
    pub fn is_compiled(&self) -> bool {
        self.regex.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substring_semantics() {
        let m = Matcher::compile("cat", &MatchOptions::new()).unwrap();
        assert!(m.matches("a-cat-picture.jpg"));
        assert!(!m.matches("dog.jpg"));
    }

    #[test]
    fn test_anchors_are_respected() {
        let m = Matcher::compile(r"\.html$", &MatchOptions::new()).unwrap();
        assert!(m.matches("index.html"));
        assert!(!m.matches("index.html.bak"));
    }

    #[test]
    fn test_case_sensitivity() {
        let insensitive = Matcher::compile("Cat", &MatchOptions::new()).unwrap();
        let sensitive = Matcher::compile("Cat", &MatchOptions::new().case_sensitive(true)).unwrap();
        assert!(insensitive.matches("CAT.png"));
        assert!(!sensitive.matches("CAT.png"));
        assert!(sensitive.matches("Cat.png"));
    }

    #[test]
    fn test_invalid_pattern_fails_by_default() {
        let err = Matcher::compile("[", &MatchOptions::new()).unwrap_err();
        assert_eq!(err.pattern, "[");
    }

    #[test]
    fn test_invalid_pattern_never_matches_when_opted_in() {
        let options = MatchOptions::new().on_invalid_pattern(InvalidPatternPolicy::NeverMatch);
        let m = Matcher::compile("(unclosed", &options).unwrap();
        assert!(!m.is_compiled());
        assert!(!m.matches("(unclosed"));
        assert_eq!(m.source(), "(unclosed");
    }
}
