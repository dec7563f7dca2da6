use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::error::{Result, TubescribeError};

/// Canonical video identifier extracted from a user supplied reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    /// Wrap an already extracted identifier, rejecting empty or non-token input
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(TubescribeError::InvalidReference(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VideoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Tried in order, first match wins.
static REFERENCE_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("watch", r"(?:^|[/.])youtube(?:-nocookie)?\.com/watch/?\?(?:[^#]*&)?v=([0-9A-Za-z_-]+)"),
        ("short-host", r"(?:^|[/.])youtu\.be/([0-9A-Za-z_-]+)"),
        ("embed", r"(?:^|[/.])youtube(?:-nocookie)?\.com/embed/([0-9A-Za-z_-]+)"),
        ("shorts", r"(?:^|[/.])youtube\.com/shorts/([0-9A-Za-z_-]+)"),
        ("live", r"(?:^|[/.])youtube\.com/live/([0-9A-Za-z_-]+)"),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).expect("reference pattern is valid")))
    .collect()
});

/// Extract the video identifier from a watch, short-host or embed URL
pub fn resolve(raw: &str) -> Result<VideoId> {
    let input = raw.trim();

    for (shape, pattern) in REFERENCE_PATTERNS.iter() {
        if let Some(id) = pattern.captures(input).and_then(|c| c.get(1)) {
            debug!("Resolved '{}' as {} reference: {}", input, shape, id.as_str());
            return Ok(VideoId(id.as_str().to_string()));
        }
    }

    Err(TubescribeError::InvalidReference(raw.to_string()))
}
