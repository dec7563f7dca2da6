use tracing::{info, warn};

use crate::catalog::{CaptionTrack, TrackCatalog};
use crate::error::{Result, TubescribeError};
use crate::fetch::{Attempt, Retrier};
use crate::normalize::{Normalizer, TranscriptEntry};
use crate::provider::CaptionProvider;
use crate::select::{Language, satisfies};

/// Entries to assemble, and whether they came from a translated track
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationOutcome {
    pub entries: Vec<TranscriptEntry>,
    pub translated: bool,
    pub language_code: String,
    /// Source-language entries, kept only when a translation replaced them
    pub original_entries: Option<Vec<TranscriptEntry>>,
}

impl TranslationOutcome {
    fn original(track: &CaptionTrack, entries: Vec<TranscriptEntry>) -> Self {
        Self {
            entries,
            translated: false,
            language_code: track.language_code.clone(),
            original_entries: None,
        }
    }
}

/// Swaps in a provider-side translation when the selected track is in the wrong language
pub struct TranslationFallback<'a> {
    provider: &'a dyn CaptionProvider,
    retrier: &'a Retrier,
    normalizer: &'a Normalizer,
}

impl<'a> TranslationFallback<'a> {
    pub fn new(provider: &'a dyn CaptionProvider, retrier: &'a Retrier, normalizer: &'a Normalizer) -> Self {
        Self {
            provider,
            retrier,
            normalizer,
        }
    }

    /// Never fails: any translation problem keeps the original entries
    pub async fn maybe_translate(
        &self,
        catalog: &TrackCatalog,
        track: &CaptionTrack,
        entries: Vec<TranscriptEntry>,
        preferred: &Language,
    ) -> TranslationOutcome {
        let Some(wanted) = preferred.explicit() else {
            return TranslationOutcome::original(track, entries);
        };
        if satisfies(track, preferred) {
            return TranslationOutcome::original(track, entries);
        }

        if !track.is_translatable {
            warn!(
                "Track {} of {} is not translatable, keeping it instead of {}",
                track.language_code, track.video_id, wanted
            );
            return TranslationOutcome::original(track, entries);
        }

        let Some(target) = catalog.translation_target(wanted) else {
            warn!(
                "{} is not an advertised translation language for {}, keeping {}",
                wanted, track.video_id, track.language_code
            );
            return TranslationOutcome::original(track, entries);
        };

        match self.translate(track, &target.code, preferred).await {
            Ok(translated) => {
                info!(
                    "Translated {} transcript of {} from {} to {}",
                    track.origin, track.video_id, track.language_code, target.code
                );
                TranslationOutcome {
                    entries: translated,
                    translated: true,
                    language_code: target.code.clone(),
                    original_entries: Some(entries),
                }
            }
            Err(e) => {
                warn!(
                    "Translation of {} to {} failed, keeping {}: {}",
                    track.video_id, target.code, track.language_code, e
                );
                TranslationOutcome::original(track, entries)
            }
        }
    }

    async fn translate(&self, track: &CaptionTrack, target: &str, preferred: &Language) -> Result<Vec<TranscriptEntry>> {
        let provider = self.provider;
        let payload = self
            .retrier
            .run(&track.video_id, preferred, |strategy| async move {
                let result = provider.translate_track(track, target, &strategy).await;
                Attempt::from_provider(result, |source| TubescribeError::FetchFailed {
                    video_id: track.video_id.to_string(),
                    preferred: preferred.to_string(),
                    attempts: 1,
                    source,
                })
            })
            .await?;

        self.normalizer.normalize(&track.video_id, &payload)
    }
}
