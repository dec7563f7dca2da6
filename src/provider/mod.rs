// Captions provider abstraction
//
// The engine only talks to the provider through the CaptionProvider trait:
// - list_tracks: catalog of caption tracks for a video
// - fetch_track: download one track using a given request strategy
// - translate_track: download a provider-side translation of a track
//
// Implementations:
// - YouTube: watch page + innertube player API + timedtext downloads
//
// To add a new provider, implement CaptionProvider, add a variant to
// ProviderImplementation and build it in ProviderFactory.

pub mod innertube;
pub mod youtube;

use async_trait::async_trait;

use crate::catalog::{CaptionTrack, TrackCatalog};
use crate::config::ProviderConfig;
use crate::error::{ProviderError, Result};
use crate::fetch::FetchStrategy;
use crate::normalize::RawPayload;
use crate::video::VideoId;

pub use youtube::YouTubeProvider;

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Client side contract of an external captions provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CaptionProvider: Send + Sync {
    /// List every caption track available for a video
    async fn list_tracks(&self, video_id: &VideoId) -> ProviderResult<TrackCatalog>;

    /// Download a track using the given request variant
    async fn fetch_track(&self, track: &CaptionTrack, strategy: &FetchStrategy) -> ProviderResult<RawPayload>;

    /// Download the provider's translation of a track into `target_language`
    async fn translate_track(
        &self,
        track: &CaptionTrack,
        target_language: &str,
        strategy: &FetchStrategy,
    ) -> ProviderResult<RawPayload>;
}

/// Provider implementation type
#[derive(Debug, Clone)]
pub enum ProviderImplementation {
    YouTube,
}

/// Factory for creating provider instances
pub struct ProviderFactory;

impl ProviderFactory {
    pub fn create_provider(
        implementation: ProviderImplementation,
        config: ProviderConfig,
    ) -> Result<Box<dyn CaptionProvider>> {
        match implementation {
            ProviderImplementation::YouTube => Ok(Box::new(YouTubeProvider::new(config)?)),
        }
    }

    pub fn create_default(config: ProviderConfig) -> Result<Box<dyn CaptionProvider>> {
        Self::create_provider(ProviderImplementation::YouTube, config)
    }
}
