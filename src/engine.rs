use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

use crate::assemble::{TranscriptResult, assemble};
use crate::catalog::{CaptionTrack, TrackCatalog};
use crate::config::{BatchConfig, Config};
use crate::error::{Result, TubescribeError};
use crate::fetch::{Attempt, Retrier};
use crate::normalize::Normalizer;
use crate::provider::{CaptionProvider, ProviderFactory};
use crate::select::{Language, SelectionPolicy};
use crate::translate::TranslationFallback;
use crate::video::{VideoId, resolve};

/// Reference in, timestamped transcript out
pub struct TranscriptEngine {
    provider: Box<dyn CaptionProvider>,
    selection: SelectionPolicy,
    retrier: Retrier,
    normalizer: Normalizer,
    batch: BatchConfig,
    default_language: Language,
}

impl TranscriptEngine {
    pub fn new(config: &Config, provider: Box<dyn CaptionProvider>) -> Self {
        Self {
            provider,
            selection: SelectionPolicy::from_config(&config.selection),
            retrier: Retrier::from_config(&config.fetch),
            normalizer: Normalizer::default(),
            batch: config.batch.clone(),
            default_language: config
                .selection
                .default_language
                .parse()
                .unwrap_or(Language::Auto),
        }
    }

    /// Engine backed by the configured provider
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = ProviderFactory::create_default(config.provider.clone())?;
        Ok(Self::new(config, provider))
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Language used when the caller does not pass one
    pub fn default_language(&self) -> &Language {
        &self.default_language
    }

    /// Resolve a reference and list its caption tracks
    pub async fn list_tracks(&self, raw_reference: &str) -> Result<TrackCatalog> {
        let video_id = resolve(raw_reference)?;
        let provider = self.provider.as_ref();
        let id = &video_id;

        self.retrier
            .run_with_setup(
                &video_id,
                &Language::Auto,
                || async move {
                    let result = provider.list_tracks(id).await;
                    Attempt::from_provider(result, |source| TubescribeError::CatalogUnavailable {
                        video_id: id.to_string(),
                        source,
                    })
                },
                |catalog, _strategy| async move { Attempt::Done(catalog) },
            )
            .await
    }

    /// Resolve, select, fetch, normalize, translate if needed, assemble
    pub async fn retrieve(&self, raw_reference: &str, preferred: &Language) -> Result<TranscriptResult> {
        let video_id = resolve(raw_reference)?;
        info!("Retrieving transcript for {} (preferred language: {})", video_id, preferred);

        let provider = self.provider.as_ref();
        let selection = &self.selection;
        let id: &VideoId = &video_id;

        // Catalog and selection once per round; only the download cycles through strategies
        let list_and_select = || async move {
            let catalog = match provider.list_tracks(id).await {
                Ok(catalog) => catalog,
                Err(source) if source.is_permanent() => {
                    return Attempt::Abort(TubescribeError::CatalogUnavailable {
                        video_id: id.to_string(),
                        source,
                    });
                }
                Err(e) => return Attempt::Retry(e),
            };

            match selection.select(&catalog, preferred) {
                Ok(track) => {
                    let track = track.clone();
                    Attempt::Done((catalog, track))
                }
                Err(e) => Attempt::Abort(e),
            }
        };

        let (catalog, track, payload) = self
            .retrier
            .run_with_setup(
                &video_id,
                preferred,
                list_and_select,
                |(catalog, track): (TrackCatalog, CaptionTrack), strategy| async move {
                    let result = provider.fetch_track(&track, &strategy).await;
                    Attempt::from_provider(result.map(|payload| (catalog, track, payload)), |source| {
                        TubescribeError::FetchFailed {
                            video_id: id.to_string(),
                            preferred: preferred.to_string(),
                            attempts: 1,
                            source,
                        }
                    })
                },
            )
            .await?;

        debug!(
            "Fetched {} {} track for {}",
            track.origin, track.language_code, video_id
        );
        let entries = self.normalizer.normalize(&video_id, &payload)?;

        let outcome = TranslationFallback::new(provider, &self.retrier, &self.normalizer)
            .maybe_translate(&catalog, &track, entries, preferred)
            .await;

        let result = assemble(
            outcome.entries,
            &outcome.language_code,
            outcome.translated,
            &track.language_code,
            track.is_generated(),
        )
        .with_original(outcome.original_entries.as_deref());
        info!(
            "Transcript for {} ready: {} entries, {:.1}s, language {}{}",
            video_id,
            result.entries.len(),
            result.duration_seconds,
            result.language_code,
            if result.translated { " (translated)" } else { "" }
        );
        Ok(result)
    }

    async fn retrieve_with_timeout(&self, raw_reference: &str, preferred: &Language) -> Result<TranscriptResult> {
        let limit = self.batch.reference_timeout();
        match tokio::time::timeout(limit, self.retrieve(raw_reference, preferred)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Retrieval of {} timed out after {:?}", raw_reference, limit);
                Err(TubescribeError::TimedOut {
                    reference: raw_reference.to_string(),
                    seconds: limit.as_secs_f64(),
                })
            }
        }
    }

    /// Retrieve several references with bounded concurrency.
    /// Results come back in input order; `progress(done, total)` fires as each one finishes.
    pub async fn retrieve_batch<S, F>(
        &self,
        references: &[S],
        preferred: &Language,
        progress: F,
    ) -> Vec<Result<TranscriptResult>>
    where
        S: AsRef<str>,
        F: Fn(usize, usize),
    {
        let total = references.len();
        let concurrency = self.batch.concurrency.max(1);
        let completed = AtomicUsize::new(0);
        info!("Retrieving {} transcripts with concurrency {}", total, concurrency);

        let mut results: Vec<(usize, Result<TranscriptResult>)> = stream::iter(references.iter().enumerate())
            .map(|(index, reference)| {
                let completed = &completed;
                let progress = &progress;
                async move {
                    let result = self.retrieve_with_timeout(reference.as_ref(), preferred).await;
                    if let Err(e) = &result {
                        warn!("Failed to retrieve {}: {}", reference.as_ref(), e);
                    }
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    progress(done, total);
                    (index, result)
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, result)| result).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TrackOrigin::{Generated, Manual};
    use crate::catalog::fixtures::{targets, track, video};
    use crate::error::{ErrorKind, ProviderError};
    use crate::fetch::{FetchStrategy, RetryPolicy};
    use crate::normalize::RawPayload;
    use crate::provider::MockCaptionProvider;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    fn engine(provider: MockCaptionProvider) -> TranscriptEngine {
        let mut engine = TranscriptEngine::new(&Config::default(), Box::new(provider));
        engine.retrier = Retrier::new(
            RetryPolicy {
                rounds: 3,
                backoff_base: Duration::ZERO,
                max_backoff: Duration::ZERO,
            },
            vec![FetchStrategy::new("default"), FetchStrategy::new("minimal")],
        );
        engine
    }

    fn payload(texts: &[(f64, &str)]) -> RawPayload {
        let records: Vec<_> = texts
            .iter()
            .map(|(start, text)| json!({"start": start, "duration": 2.0, "text": text}))
            .collect();
        RawPayload::Json(json!(records))
    }

    #[tokio::test]
    async fn test_auto_english_track_without_translation() {
        let catalog = TrackCatalog::new(video()).with_track(track("en", Generated, false));

        let mut provider = MockCaptionProvider::new();
        provider
            .expect_list_tracks()
            .times(1)
            .returning(move |_| Ok(catalog.clone()));
        provider
            .expect_fetch_track()
            .times(1)
            .returning(|_, _| Ok(payload(&[(0.0, "hello"), (5.0, "world")])));

        let result = engine(provider)
            .retrieve(URL, &Language::Explicit("hi".to_string()))
            .await
            .unwrap();

        assert_eq!(result.language_code, "en");
        assert_eq!(result.original_language_code, "en");
        assert!(!result.translated);
        assert!(result.is_generated);
        assert_eq!(result.text, "[0:00:00] hello\n[0:00:05] world");
        assert_eq!(result.duration_seconds, 7.0);
        assert!(result.original_text.is_none());
    }

    #[tokio::test]
    async fn test_manual_spanish_track_translated_to_english() {
        let catalog = TrackCatalog::new(video())
            .with_track(track("es", Manual, true))
            .with_translation_languages(targets(&["en", "fr"]));

        let mut provider = MockCaptionProvider::new();
        provider
            .expect_list_tracks()
            .times(1)
            .returning(move |_| Ok(catalog.clone()));
        provider
            .expect_fetch_track()
            .times(1)
            .returning(|_, _| Ok(payload(&[(0.0, "hola")])));
        provider
            .expect_translate_track()
            .withf(|_, target, _| target == "en")
            .times(1)
            .returning(|_, _, _| Ok(payload(&[(0.0, "hello")])));

        let result = engine(provider)
            .retrieve(URL, &Language::Explicit("en".to_string()))
            .await
            .unwrap();

        assert_eq!(result.language_code, "en");
        assert_eq!(result.original_language_code, "es");
        assert!(result.translated);
        assert!(!result.is_generated);
        assert_eq!(result.text, "[0:00:00] hello");
        assert_eq!(result.original_text.as_deref(), Some("[0:00:00] hola"));
    }

    #[tokio::test]
    async fn test_invalid_reference_makes_no_calls() {
        let err = engine(MockCaptionProvider::new())
            .retrieve("https://vimeo.com/12345", &Language::Auto)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClientError);
    }

    #[tokio::test]
    async fn test_captions_disabled_is_not_retried() {
        let mut provider = MockCaptionProvider::new();
        provider
            .expect_list_tracks()
            .times(1)
            .returning(|_| Err(ProviderError::CaptionsDisabled));

        let err = engine(provider).retrieve(URL, &Language::Auto).await.unwrap_err();
        assert!(matches!(
            err,
            TubescribeError::CatalogUnavailable { source: ProviderError::CaptionsDisabled, .. }
        ));
        assert_eq!(err.kind(), ErrorKind::NoTranscript);
    }

    #[tokio::test]
    async fn test_transient_catalog_failure_is_retried() {
        let catalog = TrackCatalog::new(video()).with_track(track("en", Manual, false));
        let calls = Arc::new(AtomicU32::new(0));

        let mut provider = MockCaptionProvider::new();
        provider.expect_list_tracks().times(2).returning({
            let calls = calls.clone();
            move |_| {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ProviderError::RateLimited)
                } else {
                    Ok(catalog.clone())
                }
            }
        });
        provider
            .expect_fetch_track()
            .withf(|_, strategy| strategy.name == "default")
            .times(1)
            .returning(|_, _| Ok(payload(&[(1.0, "recovered")])));

        let result = engine(provider).retrieve(URL, &Language::Auto).await.unwrap();
        assert_eq!(result.text, "[0:00:01] recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhausted_catalog_failures_are_retryable() {
        let mut provider = MockCaptionProvider::new();
        provider
            .expect_list_tracks()
            .times(3)
            .returning(|_| Err(ProviderError::Status(503)));

        let err = engine(provider).retrieve(URL, &Language::Auto).await.unwrap_err();
        match &err {
            TubescribeError::FetchFailed { attempts, source, .. } => {
                assert_eq!(*attempts, 3);
                assert_eq!(*source, ProviderError::Status(503));
            }
            other => panic!("expected FetchFailed, got {:?}", other),
        }
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_catalog_listed_once_per_round() {
        let catalog = TrackCatalog::new(video()).with_track(track("en", Manual, false));

        let mut provider = MockCaptionProvider::new();
        provider
            .expect_list_tracks()
            .times(3)
            .returning(move |_| Ok(catalog.clone()));
        provider
            .expect_fetch_track()
            .times(12)
            .returning(|_, _| Err(ProviderError::Status(403)));

        let mut engine = engine(provider);
        engine.retrier = Retrier::new(
            RetryPolicy {
                rounds: 3,
                backoff_base: Duration::ZERO,
                max_backoff: Duration::ZERO,
            },
            ["default", "consent-cookie", "no-headers", "minimal"]
                .into_iter()
                .map(FetchStrategy::new)
                .collect(),
        );

        let err = engine.retrieve(URL, &Language::Auto).await.unwrap_err();
        assert!(matches!(
            err,
            TubescribeError::FetchFailed { attempts: 12, source: ProviderError::Status(403), .. }
        ));
    }

    #[tokio::test]
    async fn test_malformed_payload() {
        let catalog = TrackCatalog::new(video()).with_track(track("en", Manual, false));

        let mut provider = MockCaptionProvider::new();
        provider
            .expect_list_tracks()
            .returning(move |_| Ok(catalog.clone()));
        provider
            .expect_fetch_track()
            .times(1)
            .returning(|_, _| Ok(RawPayload::Json(json!({"unexpected": true}))));

        let err = engine(provider).retrieve(URL, &Language::Auto).await.unwrap_err();
        assert!(matches!(err, TubescribeError::MalformedPayload { .. }));
        assert_eq!(err.kind(), ErrorKind::Defect);
    }

    #[tokio::test]
    async fn test_list_tracks() {
        let catalog = TrackCatalog::new(video())
            .with_track(track("en", Manual, true))
            .with_track(track("en", Generated, true));

        let mut provider = MockCaptionProvider::new();
        provider
            .expect_list_tracks()
            .withf(|id| id.as_str() == "dQw4w9WgXcQ")
            .times(1)
            .returning(move |_| Ok(catalog.clone()));

        let listed = engine(provider).list_tracks("https://youtu.be/dQw4w9WgXcQ").await.unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[test]
    fn test_default_language_from_config() {
        let mut config = Config::default();
        config.selection.default_language = "hi".to_string();
        let engine = TranscriptEngine::new(&config, Box::new(MockCaptionProvider::new()));
        assert_eq!(engine.default_language(), &Language::Explicit("hi".to_string()));
    }
}
