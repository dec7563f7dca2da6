use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::catalog::CaptionTrack;
use crate::config::{FetchConfig, StrategyConfig};
use crate::error::{ProviderError, Result, TubescribeError};
use crate::normalize::RawPayload;
use crate::provider::CaptionProvider;
use crate::select::Language;
use crate::video::VideoId;

/// One request variant tried when talking to the provider
#[derive(Debug, Clone, PartialEq)]
pub struct FetchStrategy {
    pub name: String,
    pub use_default_headers: bool,
    pub headers: BTreeMap<String, String>,
}

impl FetchStrategy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            use_default_headers: true,
            headers: BTreeMap::new(),
        }
    }
}

impl From<&StrategyConfig> for FetchStrategy {
    fn from(config: &StrategyConfig) -> Self {
        Self {
            name: config.name.clone(),
            use_default_headers: config.use_default_headers,
            headers: config.headers.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub rounds: u32,
    pub backoff_base: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            rounds: 3,
            backoff_base: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Sleep after failed round `round` (0-based): `base * 2^round`, capped
    pub fn backoff_for(&self, round: u32) -> Duration {
        let factor = 2u32.checked_pow(round).unwrap_or(u32::MAX);
        self.backoff_base
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// Outcome of a single strategy try
#[derive(Debug)]
pub enum Attempt<T> {
    /// Accept the value and stop
    Done(T),
    /// Transient failure, move on to the next strategy or round
    Retry(ProviderError),
    /// Permanent failure, surface immediately
    Abort(TubescribeError),
}

impl<T> Attempt<T> {
    /// Classify a provider result; permanent errors abort via `on_permanent`
    pub fn from_provider(
        result: std::result::Result<T, ProviderError>,
        on_permanent: impl FnOnce(ProviderError) -> TubescribeError,
    ) -> Self {
        match result {
            Ok(value) => Self::Done(value),
            Err(e) if e.is_permanent() => Self::Abort(on_permanent(e)),
            Err(e) => Self::Retry(e),
        }
    }
}

/// Runs an operation over every strategy, for a bounded number of backoff rounds
pub struct Retrier {
    policy: RetryPolicy,
    strategies: Vec<FetchStrategy>,
}

impl Retrier {
    pub fn new(policy: RetryPolicy, strategies: Vec<FetchStrategy>) -> Self {
        Self { policy, strategies }
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(
            RetryPolicy {
                rounds: config.rounds,
                backoff_base: config.backoff_base(),
                max_backoff: config.max_backoff(),
            },
            config.strategies.iter().map(FetchStrategy::from).collect(),
        )
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn strategies(&self) -> &[FetchStrategy] {
        &self.strategies
    }

    /// Try `op` with each strategy in order; back off after a round where all of them failed.
    /// Exhaustion yields `FetchFailed` carrying the last error seen.
    pub async fn run<T, F, Fut>(&self, video_id: &VideoId, preferred: &Language, mut op: F) -> Result<T>
    where
        F: FnMut(FetchStrategy) -> Fut,
        Fut: Future<Output = Attempt<T>>,
    {
        self.run_with_setup(
            video_id,
            preferred,
            || async { Attempt::Done(()) },
            |(), strategy| op(strategy),
        )
        .await
    }

    /// Like `run`, but `setup` is awaited once at the start of every round and its value is
    /// handed to each strategy try of that round. A failed setup costs one attempt and ends the round.
    pub async fn run_with_setup<S, T, P, PFut, F, Fut>(
        &self,
        video_id: &VideoId,
        preferred: &Language,
        mut setup: P,
        mut op: F,
    ) -> Result<T>
    where
        S: Clone,
        P: FnMut() -> PFut,
        PFut: Future<Output = Attempt<S>>,
        F: FnMut(S, FetchStrategy) -> Fut,
        Fut: Future<Output = Attempt<T>>,
    {
        let mut attempts = 0u32;
        let mut last_error = ProviderError::NoStrategies;

        if self.strategies.is_empty() {
            return Err(self.exhausted(video_id, preferred, attempts, last_error));
        }

        for round in 0..self.policy.rounds {
            debug!("Round {}/{} for {}", round + 1, self.policy.rounds, video_id);

            match setup().await {
                Attempt::Done(state) => {
                    for strategy in &self.strategies {
                        attempts += 1;
                        debug!("Strategy '{}' for {} (attempt {})", strategy.name, video_id, attempts);

                        match op(state.clone(), strategy.clone()).await {
                            Attempt::Done(value) => {
                                if attempts > 1 {
                                    info!("Strategy '{}' succeeded for {} after {} attempts", strategy.name, video_id, attempts);
                                }
                                return Ok(value);
                            }
                            Attempt::Retry(e) => {
                                warn!("Strategy '{}' failed for {}: {}", strategy.name, video_id, e);
                                last_error = e;
                            }
                            Attempt::Abort(e) => return Err(self.abort(video_id, attempts, e)),
                        }
                    }
                }
                Attempt::Retry(e) => {
                    attempts += 1;
                    warn!("Round {}/{} setup failed for {}: {}", round + 1, self.policy.rounds, video_id, e);
                    last_error = e;
                }
                Attempt::Abort(e) => return Err(self.abort(video_id, attempts + 1, e)),
            }

            if round + 1 < self.policy.rounds {
                let delay = self.policy.backoff_for(round);
                warn!(
                    "Round {}/{} failed for {}, backing off {:?}",
                    round + 1,
                    self.policy.rounds,
                    video_id,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }

        Err(self.exhausted(video_id, preferred, attempts, last_error))
    }

    fn abort(&self, video_id: &VideoId, attempts: u32, mut e: TubescribeError) -> TubescribeError {
        if let TubescribeError::FetchFailed { attempts: reported, .. } = &mut e {
            *reported = attempts;
        }
        warn!("Giving up on {} without further retries: {}", video_id, e);
        e
    }

    fn exhausted(&self, video_id: &VideoId, preferred: &Language, attempts: u32, source: ProviderError) -> TubescribeError {
        TubescribeError::FetchFailed {
            video_id: video_id.to_string(),
            preferred: preferred.to_string(),
            attempts,
            source,
        }
    }

    /// Download a track, cycling strategies and backoff rounds
    pub async fn fetch(
        &self,
        provider: &dyn CaptionProvider,
        track: &CaptionTrack,
        preferred: &Language,
    ) -> Result<RawPayload> {
        self.run(&track.video_id, preferred, |strategy| async move {
            let result = provider.fetch_track(track, &strategy).await;
            Attempt::from_provider(result, |source| TubescribeError::FetchFailed {
                video_id: track.video_id.to_string(),
                preferred: preferred.to_string(),
                attempts: 1,
                source,
            })
        })
        .await
    }
}
