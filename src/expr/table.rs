use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;

use super::lexer::{is_keyword, is_word_char};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("Expected 'NAME=PATTERN', got: {0}")]
    MissingSeparator(String),

    #[error("Invalid pattern name '{0}': names are letters, digits and '_'")]
    InvalidName(String),

    #[error("'{0}' is a keyword and cannot name a pattern")]
    ReservedName(String),

    #[error("Pattern '{0}' is empty")]
    EmptyPattern(String),
}

/// Named patterns that bare words in an expression resolve to
///
/// With `X = "cat"` defined, the expression `X AND NOT "dog"` reads exactly
/// like `"cat" AND NOT "dog"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternTable {
    patterns: BTreeMap<String, String>,
}

impl PatternTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (or redefine) a named pattern
    pub fn define(
        &mut self,
        name: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Result<(), DefinitionError> {
        let name = name.into();
        let pattern = pattern.into();
        validate_name(&name)?;
        if pattern.is_empty() {
            return Err(DefinitionError::EmptyPattern(name));
        }
        self.patterns.insert(name, pattern);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.patterns.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.patterns.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Checks every entry, for tables that were deserialized rather than built with `define`
    pub fn validate(&self) -> Result<(), DefinitionError> {
        for (name, pattern) in &self.patterns {
            validate_name(name)?;
            if pattern.is_empty() {
                return Err(DefinitionError::EmptyPattern(name.clone()));
            }
        }
        Ok(())
    }

    /// Copy every entry of `other` into this table, overriding clashes
    pub fn extend_from(&mut self, other: &PatternTable) {
        for (name, pattern) in other.iter() {
            self.patterns.insert(name.to_string(), pattern.to_string());
        }
    }
}

/// A single `NAME=PATTERN` definition, as given on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub name: String,
    pub pattern: String,
}

impl FromStr for Definition {
    type Err = DefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, pattern) = s
            .split_once('=')
            .ok_or_else(|| DefinitionError::MissingSeparator(s.to_string()))?;
        let name = name.trim();
        validate_name(name)?;
        if pattern.is_empty() {
            return Err(DefinitionError::EmptyPattern(name.to_string()));
        }
        Ok(Definition {
            name: name.to_string(),
            pattern: pattern.to_string(),
        })
    }
}

fn validate_name(name: &str) -> Result<(), DefinitionError> {
    if name.is_empty() || !name.chars().all(is_word_char) {
        return Err(DefinitionError::InvalidName(name.to_string()));
    }
    if is_keyword(name) {
        return Err(DefinitionError::ReservedName(name.to_string()));
    }
    Ok(())
}
