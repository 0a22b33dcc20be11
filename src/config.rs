use crate::expr::{DefinitionError, InvalidPatternPolicy, MatchOptions, PatternTable};
use crate::retrieval::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid pattern definition in '{path}': {source}")]
    Pattern {
        path: String,
        #[source]
        source: DefinitionError,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DorepyConfig {
    /// Match letters exactly as written; matching ignores case otherwise.
    pub case_sensitive: bool,
    pub on_invalid_pattern: InvalidPatternPolicy,
    /// Named patterns usable as bare words in expressions.
    pub patterns: PatternTable,
    pub retrieval: RetrievalRules,
}

impl DorepyConfig {
    pub fn match_options(&self) -> MatchOptions {
        MatchOptions::new()
            .case_sensitive(self.case_sensitive)
            .on_invalid_pattern(self.on_invalid_pattern)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalRules {
    /// Fixed pause after a rate-limited response; 0 defers to the server's Retry-After.
    pub wait_secs: u64,
    /// Pause used when the server gives no Retry-After.
    pub default_retry_after_secs: u64,
    pub max_attempts: u32,
}

impl Default for RetrievalRules {
    fn default() -> Self {
        Self {
            wait_secs: 0,
            default_retry_after_secs: 30,
            max_attempts: 5,
        }
    }
}

impl RetrievalRules {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            wait: Duration::from_secs(self.wait_secs),
            default_retry_after: Duration::from_secs(self.default_retry_after_secs),
            max_attempts: self.max_attempts.max(1),
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<DorepyConfig, ConfigError> {
    if let Some(path) = path {
        load_config_from_path(path)
    } else {
        Ok(default_config().clone())
    }
}

pub fn load_config_from_path(path: &Path) -> Result<DorepyConfig, ConfigError> {
    let path_display = path.display().to_string();
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path_display.clone(),
        source,
    })?;

    parse_config(&raw, &path_display)
}

fn parse_config(raw: &str, path_display: &str) -> Result<DorepyConfig, ConfigError> {
    let config = toml::from_str::<DorepyConfig>(raw).map_err(|source| ConfigError::Parse {
        path: path_display.to_string(),
        source,
    })?;
    config
        .patterns
        .validate()
        .map_err(|source| ConfigError::Pattern {
            path: path_display.to_string(),
            source,
        })?;
    Ok(config)
}

pub fn default_config() -> &'static DorepyConfig {
    static DEFAULT_CONFIG: LazyLock<DorepyConfig> = LazyLock::new(DorepyConfig::default);
    &DEFAULT_CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = default_config();
        assert!(!config.case_sensitive);
        assert_eq!(config.on_invalid_pattern, InvalidPatternPolicy::Fail);
        assert!(config.patterns.is_empty());
        assert_eq!(config.retrieval.default_retry_after_secs, 30);
        assert_eq!(config.retrieval.max_attempts, 5);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = parse_config(
            r#"
case_sensitive = true
on_invalid_pattern = "never-match"

[patterns]
pdf = '\.pdf$'

[retrieval]
wait_secs = 2
"#,
            "inline",
        )
        .unwrap();

        assert!(config.case_sensitive);
        assert_eq!(config.on_invalid_pattern, InvalidPatternPolicy::NeverMatch);
        assert_eq!(config.patterns.get("pdf"), Some("\\.pdf$"));
        assert_eq!(config.retrieval.wait_secs, 2);
        assert_eq!(config.retrieval.max_attempts, 5);
        assert!(config.match_options().case_sensitive);
    }

    #[test]
    fn test_keyword_pattern_names_are_rejected() {
        let err = parse_config("[patterns]\nAND = 'x'\n", "inline").unwrap_err();
        assert!(matches!(err, ConfigError::Pattern { .. }));
    }

    #[test]
    fn test_retry_policy_never_allows_zero_attempts() {
        let rules = RetrievalRules {
            max_attempts: 0,
            ..RetrievalRules::default()
        };
        assert_eq!(rules.retry_policy().max_attempts, 1);
    }
}
