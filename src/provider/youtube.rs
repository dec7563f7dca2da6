use async_trait::async_trait;
use reqwest::header::{ACCEPT_LANGUAGE, COOKIE, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{CaptionProvider, ProviderResult, innertube};
use crate::catalog::{CaptionTrack, TrackCatalog};
use crate::config::ProviderConfig;
use crate::error::{ProviderError, Result, TubescribeError};
use crate::fetch::FetchStrategy;
use crate::normalize::RawPayload;
use crate::video::VideoId;

/// Captions provider backed by YouTube's watch page, innertube player API and timedtext endpoint
pub struct YouTubeProvider {
    client: Client,
    config: ProviderConfig,
}

impl YouTubeProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let mut builder = Client::builder().timeout(Duration::from_secs(config.request_timeout_secs));

        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| TubescribeError::Config(format!("Invalid proxy '{}': {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }

        Ok(Self {
            client: builder.build()?,
            config,
        })
    }

    /// Headers every catalog request carries, optionally with an extra cookie
    fn with_default_headers(&self, request: RequestBuilder, extra_cookie: Option<&str>) -> RequestBuilder {
        let request = request
            .header(USER_AGENT, &self.config.user_agent)
            .header(ACCEPT_LANGUAGE, &self.config.accept_language);

        let cookie = match (self.config.cookies.as_deref(), extra_cookie) {
            (Some(configured), Some(extra)) => Some(format!("{}; {}", configured, extra)),
            (Some(configured), None) => Some(configured.to_string()),
            (None, Some(extra)) => Some(extra.to_string()),
            (None, None) => None,
        };

        match cookie {
            Some(cookie) => request.header(COOKIE, cookie),
            None => request,
        }
    }

    fn with_strategy(&self, request: RequestBuilder, strategy: &FetchStrategy) -> RequestBuilder {
        let mut request = if strategy.use_default_headers {
            self.with_default_headers(request, None)
        } else {
            request
        };
        for (name, value) in &strategy.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        request
    }

    async fn send(request: RequestBuilder) -> ProviderResult<Response> {
        let response = request.send().await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited);
        }
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }
        Ok(response)
    }

    async fn fetch_watch_page(&self, video_id: &VideoId) -> ProviderResult<String> {
        let url = self.config.watch_url.replace("{video_id}", video_id.as_str());
        debug!("Fetching watch page: {}", url);

        let html = Self::send(self.with_default_headers(self.client.get(&url), None))
            .await?
            .text()
            .await?;

        if !innertube::is_consent_page(&html) {
            return Ok(html);
        }

        let cookie = innertube::consent_cookie(&html).ok_or(ProviderError::ConsentRejected)?;
        info!("Consent page returned for {}, retrying with consent cookie", video_id);

        let html = Self::send(self.with_default_headers(self.client.get(&url), Some(&cookie)))
            .await?
            .text()
            .await?;

        if innertube::is_consent_page(&html) {
            return Err(ProviderError::ConsentRejected);
        }
        Ok(html)
    }

    async fn fetch_player_response(&self, video_id: &VideoId, api_key: &str) -> ProviderResult<Value> {
        let url = self.config.innertube_url.replace("{api_key}", api_key);
        let body = json!({
            "context": {
                "client": {
                    "clientName": self.config.client_name,
                    "clientVersion": self.config.client_version,
                }
            },
            "videoId": video_id.as_str(),
        });

        let response = Self::send(self.with_default_headers(self.client.post(&url), None).json(&body)).await?;
        response
            .json::<Value>()
            .await
            .map_err(|e| ProviderError::Unparsable(format!("innertube player response: {}", e)))
    }

    async fn download(&self, url: &str, strategy: &FetchStrategy) -> ProviderResult<RawPayload> {
        if url.contains("&exp=xpe") {
            return Err(ProviderError::PoTokenRequired);
        }

        debug!("Downloading track with strategy '{}'", strategy.name);
        let body = Self::send(self.with_strategy(self.client.get(url), strategy))
            .await?
            .text()
            .await?;

        if body.trim().is_empty() {
            // An empty 200 is how the timedtext endpoint rejects request shapes it does not like
            return Err(ProviderError::Unparsable("empty track body".to_string()));
        }
        Ok(RawPayload::from_body(&body))
    }
}

#[async_trait]
impl CaptionProvider for YouTubeProvider {
    async fn list_tracks(&self, video_id: &VideoId) -> ProviderResult<TrackCatalog> {
        let html = self.fetch_watch_page(video_id).await?;
        let api_key = innertube::extract_api_key(&html)?;
        let data = self.fetch_player_response(video_id, &api_key).await?;

        let catalog = innertube::parse_player_response(video_id, &data)?;
        info!(
            "Found {} manual and {} auto-generated tracks for {}",
            catalog.manual().len(),
            catalog.generated().len(),
            video_id
        );
        Ok(catalog)
    }

    async fn fetch_track(&self, track: &CaptionTrack, strategy: &FetchStrategy) -> ProviderResult<RawPayload> {
        self.download(&track.handle, strategy).await
    }

    async fn translate_track(
        &self,
        track: &CaptionTrack,
        target_language: &str,
        strategy: &FetchStrategy,
    ) -> ProviderResult<RawPayload> {
        if !track.is_translatable {
            warn!("Track {} of {} is not translatable", track.language_code, track.video_id);
            return Err(ProviderError::NotTranslatable);
        }
        let url = format!("{}&tlang={}", track.handle, target_language);
        self.download(&url, strategy).await
    }
}
