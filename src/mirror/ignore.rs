use std::path::Path;

use regex::Regex;

use crate::error::ConfigError;

/// Pattern-based exclusion applied to raw event paths before any action.
///
/// Matching is a regex *search* anywhere in the path string, not a full match.
#[derive(Debug, Clone, Default)]
pub struct IgnoreFilter {
    pattern: Option<Regex>,
}

impl IgnoreFilter {
    /// A filter that ignores nothing.
    pub fn none() -> Self {
        Self::default()
    }

    /// Compile `pattern`. `None` or an empty string yields a filter that ignores nothing.
    pub fn new(pattern: Option<&str>) -> Result<Self, ConfigError> {
        let pattern = match pattern {
            Some(p) if !p.is_empty() => p,
            _ => return Ok(Self::none()),
        };
        let regex = Regex::new(pattern).map_err(|source| ConfigError::InvalidIgnorePattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            pattern: Some(regex),
        })
    }

    pub fn as_str(&self) -> Option<&str> {
        self.pattern.as_ref().map(Regex::as_str)
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        match &self.pattern {
            Some(regex) => regex.is_match(&path.to_string_lossy()),
            None => false,
        }
    }
}
