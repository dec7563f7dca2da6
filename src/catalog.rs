use serde::{Deserialize, Serialize};
use std::fmt;

use crate::video::VideoId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackOrigin {
    /// Uploaded or human-edited captions
    Manual,
    /// Speech recognition output
    Generated,
}

impl fmt::Display for TrackOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => f.write_str("manual"),
            Self::Generated => f.write_str("auto-generated"),
        }
    }
}

/// One selectable transcript source of a video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionTrack {
    pub video_id: VideoId,
    pub language_code: String,
    pub language_name: String,
    pub origin: TrackOrigin,
    pub is_translatable: bool,
    /// Provider specific locator used to download the track
    pub handle: String,
}

impl CaptionTrack {
    pub fn is_generated(&self) -> bool {
        self.origin == TrackOrigin::Generated
    }

    /// Case-insensitive prefix match, so `en` matches `en-US`
    pub fn matches_language(&self, code: &str) -> bool {
        language_matches(&self.language_code, code)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationLanguage {
    pub code: String,
    pub name: String,
}

/// All caption tracks of one video, split by origin, in provider order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackCatalog {
    video_id: VideoId,
    manual: Vec<CaptionTrack>,
    generated: Vec<CaptionTrack>,
    translation_languages: Vec<TranslationLanguage>,
}

impl TrackCatalog {
    pub fn new(video_id: VideoId) -> Self {
        Self {
            video_id,
            manual: Vec::new(),
            generated: Vec::new(),
            translation_languages: Vec::new(),
        }
    }

    /// Add a track; returns false when its language is already cataloged for that origin
    pub fn insert(&mut self, track: CaptionTrack) -> bool {
        let bucket = match track.origin {
            TrackOrigin::Manual => &mut self.manual,
            TrackOrigin::Generated => &mut self.generated,
        };
        if bucket.iter().any(|t| t.language_code == track.language_code) {
            return false;
        }
        bucket.push(track);
        true
    }

    pub fn with_track(mut self, track: CaptionTrack) -> Self {
        self.insert(track);
        self
    }

    pub fn with_translation_languages(mut self, languages: Vec<TranslationLanguage>) -> Self {
        self.translation_languages = languages;
        self
    }

    pub fn video_id(&self) -> &VideoId {
        &self.video_id
    }

    pub fn manual(&self) -> &[CaptionTrack] {
        &self.manual
    }

    pub fn generated(&self) -> &[CaptionTrack] {
        &self.generated
    }

    pub fn translation_languages(&self) -> &[TranslationLanguage] {
        &self.translation_languages
    }

    /// Manual tracks first, then generated ones
    pub fn tracks(&self) -> impl Iterator<Item = &CaptionTrack> {
        self.manual.iter().chain(self.generated.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.manual.is_empty() && self.generated.is_empty()
    }

    pub fn len(&self) -> usize {
        self.manual.len() + self.generated.len()
    }

    /// Advertised translation target for `code`: exact match first, then prefix match
    pub fn translation_target(&self, code: &str) -> Option<&TranslationLanguage> {
        self.translation_languages
            .iter()
            .find(|l| l.code.eq_ignore_ascii_case(code))
            .or_else(|| self.translation_languages.iter().find(|l| language_matches(&l.code, code)))
    }
}

pub(crate) fn language_matches(language_code: &str, wanted: &str) -> bool {
    !wanted.is_empty() && language_code.to_lowercase().starts_with(&wanted.to_lowercase())
}
