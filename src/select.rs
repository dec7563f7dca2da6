use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

use crate::catalog::{CaptionTrack, TrackCatalog, language_matches};
use crate::config::SelectionConfig;
use crate::error::{Result, TubescribeError};

/// Caller's language preference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    Auto,
    Explicit(String),
}

impl Language {
    pub fn explicit(&self) -> Option<&str> {
        match self {
            Self::Auto => None,
            Self::Explicit(code) => Some(code.as_str()),
        }
    }
}

impl FromStr for Language {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("auto") {
            Ok(Self::Auto)
        } else {
            Ok(Self::Explicit(s.to_string()))
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Explicit(code) => f.write_str(code),
        }
    }
}

/// Picks one caption track from a catalog
#[derive(Debug, Clone)]
pub struct SelectionPolicy {
    fallback_languages: Vec<String>,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self::from_config(&SelectionConfig::default())
    }
}

impl SelectionPolicy {
    pub fn new(fallback_languages: Vec<String>) -> Self {
        Self { fallback_languages }
    }

    pub fn from_config(config: &SelectionConfig) -> Self {
        Self::new(config.fallback_languages.clone())
    }

    /// Manual track matching `code` if any, else a generated one
    fn find<'a>(catalog: &'a TrackCatalog, code: &str) -> Option<&'a CaptionTrack> {
        catalog
            .manual()
            .iter()
            .find(|t| t.matches_language(code))
            .or_else(|| catalog.generated().iter().find(|t| t.matches_language(code)))
    }

    /// Preferred language, then the fallback languages, then the first track (manual before generated)
    pub fn select<'a>(&self, catalog: &'a TrackCatalog, preferred: &Language) -> Result<&'a CaptionTrack> {
        if catalog.is_empty() {
            return Err(TubescribeError::NoTrackAvailable {
                video_id: catalog.video_id().to_string(),
                preferred: preferred.to_string(),
            });
        }

        if let Some(code) = preferred.explicit() {
            if let Some(track) = Self::find(catalog, code) {
                debug!("Selected {} {} track for preference {}", track.origin, track.language_code, code);
                return Ok(track);
            }
            info!("No {} track for {}, trying fallback languages", code, catalog.video_id());
        }

        for code in &self.fallback_languages {
            if let Some(track) = Self::find(catalog, code) {
                debug!("Selected {} {} track from fallback languages", track.origin, track.language_code);
                return Ok(track);
            }
        }

        let track = catalog.tracks().next().ok_or_else(|| TubescribeError::NoTrackAvailable {
            video_id: catalog.video_id().to_string(),
            preferred: preferred.to_string(),
        })?;
        debug!("Selected first available track: {} {}", track.origin, track.language_code);
        Ok(track)
    }
}

/// True when the track already satisfies an explicit preference
pub fn satisfies(track: &CaptionTrack, preferred: &Language) -> bool {
    match preferred.explicit() {
        Some(code) => language_matches(&track.language_code, code),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TrackOrigin::{Generated, Manual};
    use crate::catalog::fixtures::{track, video};

    fn explicit(code: &str) -> Language {
        Language::Explicit(code.to_string())
    }

    #[test]
    fn test_language_parsing() {
        assert_eq!("auto".parse::<Language>().unwrap(), Language::Auto);
        assert_eq!("AUTO".parse::<Language>().unwrap(), Language::Auto);
        assert_eq!("".parse::<Language>().unwrap(), Language::Auto);
        assert_eq!(" hi ".parse::<Language>().unwrap(), explicit("hi"));
        assert_eq!(explicit("en-US").to_string(), "en-US");
    }

    #[test]
    fn test_manual_preferred_over_generated() {
        let catalog = TrackCatalog::new(video())
            .with_track(track("en", Generated, true))
            .with_track(track("en", Manual, true));

        let selected = SelectionPolicy::default().select(&catalog, &explicit("en")).unwrap();
        assert_eq!(selected.origin, Manual);
    }

    #[test]
    fn test_prefix_match_on_regional_variant() {
        let catalog = TrackCatalog::new(video())
            .with_track(track("de", Manual, true))
            .with_track(track("en-US", Generated, true));

        let selected = SelectionPolicy::default().select(&catalog, &explicit("en")).unwrap();
        assert_eq!(selected.language_code, "en-US");
    }

    #[test]
    fn test_auto_with_only_french_track() {
        let catalog = TrackCatalog::new(video()).with_track(track("fr", Manual, false));

        let selected = SelectionPolicy::default().select(&catalog, &Language::Auto).unwrap();
        assert_eq!(selected.language_code, "fr");
    }

    #[test]
    fn test_missing_preference_falls_back_english_then_hindi() {
        let catalog = TrackCatalog::new(video())
            .with_track(track("fr", Manual, false))
            .with_track(track("hi", Manual, false))
            .with_track(track("en", Generated, false));

        let policy = SelectionPolicy::default();
        let selected = policy.select(&catalog, &explicit("ja")).unwrap();
        assert_eq!(selected.language_code, "en");
        assert_eq!(selected.origin, Generated);

        let no_english = TrackCatalog::new(video())
            .with_track(track("fr", Manual, false))
            .with_track(track("hi", Generated, false));
        assert_eq!(policy.select(&no_english, &explicit("ja")).unwrap().language_code, "hi");
    }

    #[test]
    fn test_last_resort_prefers_first_manual_track() {
        let catalog = TrackCatalog::new(video())
            .with_track(track("ko", Generated, false))
            .with_track(track("fr", Manual, false))
            .with_track(track("de", Manual, false));

        let selected = SelectionPolicy::new(vec![]).select(&catalog, &explicit("ja")).unwrap();
        assert_eq!(selected.language_code, "fr");
    }

    #[test]
    fn test_configured_fallbacks_replace_defaults() {
        let catalog = TrackCatalog::new(video())
            .with_track(track("en", Manual, false))
            .with_track(track("pt-BR", Generated, false));

        let policy = SelectionPolicy::new(vec!["pt".to_string()]);
        assert_eq!(policy.select(&catalog, &Language::Auto).unwrap().language_code, "pt-BR");
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = TrackCatalog::new(video());
        let err = SelectionPolicy::default().select(&catalog, &explicit("en")).unwrap_err();
        match err {
            TubescribeError::NoTrackAvailable { video_id, preferred } => {
                assert_eq!(video_id, "dQw4w9WgXcQ");
                assert_eq!(preferred, "en");
            }
            other => panic!("expected NoTrackAvailable, got {:?}", other),
        }
    }

    #[test]
    fn test_satisfies() {
        let track = track("en-GB", Manual, false);
        assert!(satisfies(&track, &Language::Auto));
        assert!(satisfies(&track, &explicit("en")));
        assert!(!satisfies(&track, &explicit("es")));
    }
}
