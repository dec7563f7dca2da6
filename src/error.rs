use thiserror::Error;

/// Failures reported by a captions provider for a single request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Captions are disabled for this video")]
    CaptionsDisabled,

    #[error("Video is unavailable: {0}")]
    VideoUnavailable(String),

    #[error("Video is unplayable: {0}")]
    VideoUnplayable(String),

    #[error("Video is age restricted")]
    AgeRestricted,

    #[error("Request was blocked by the provider: {0}")]
    RequestBlocked(String),

    #[error("Rate limited by the provider (HTTP 429)")]
    RateLimited,

    #[error("Consent page could not be bypassed")]
    ConsentRejected,

    #[error("Track requires a proof-of-origin token")]
    PoTokenRequired,

    #[error("Track is not translatable")]
    NotTranslatable,

    #[error("Translation language not available: {0}")]
    TranslationLanguageUnavailable(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unparsable provider response: {0}")]
    Unparsable(String),

    #[error("No fetch strategies configured")]
    NoStrategies,
}

impl ProviderError {
    /// Conditions that neither a different request shape nor waiting can fix.
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::CaptionsDisabled
            | Self::VideoUnavailable(_)
            | Self::VideoUnplayable(_)
            | Self::AgeRestricted
            | Self::PoTokenRequired
            | Self::NotTranslatable
            | Self::TranslationLanguageUnavailable(_)
            | Self::NoStrategies => true,
            Self::Status(code) => matches!(code, 404 | 410),
            Self::RequestBlocked(_)
            | Self::RateLimited
            | Self::ConsentRejected
            | Self::Network(_)
            | Self::Unparsable(_) => false,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) if status.as_u16() == 429 => Self::RateLimited,
            Some(status) => Self::Status(status.as_u16()),
            None => Self::Network(e.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum TubescribeError {
    #[error("Invalid video reference: {0}")]
    InvalidReference(String),

    #[error("Caption catalog unavailable for video {video_id}: {source}")]
    CatalogUnavailable {
        video_id: String,
        #[source]
        source: ProviderError,
    },

    #[error("No caption track available for video {video_id} (preferred language: {preferred})")]
    NoTrackAvailable { video_id: String, preferred: String },

    #[error("Failed to fetch transcript for video {video_id} (preferred language: {preferred}) after {attempts} attempts: {source}")]
    FetchFailed {
        video_id: String,
        preferred: String,
        attempts: u32,
        #[source]
        source: ProviderError,
    },

    #[error("Malformed transcript payload for video {video_id}: {shape}")]
    MalformedPayload { video_id: String, shape: String },

    #[error("Timed out after {seconds:.1}s while retrieving {reference}")]
    TimedOut { reference: String, seconds: f64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification used by callers to map failures onto status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input from the caller, not retryable
    ClientError,
    /// The video has no usable transcript
    NoTranscript,
    /// Safe to retry later
    Transient,
    /// Provider returned something we could not parse
    Defect,
    /// Local failure (configuration, IO)
    Internal,
}

impl TubescribeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidReference(_) => ErrorKind::ClientError,
            Self::CatalogUnavailable { .. } | Self::NoTrackAvailable { .. } => ErrorKind::NoTranscript,
            Self::FetchFailed { source, .. } if source.is_permanent() => ErrorKind::NoTranscript,
            Self::FetchFailed { .. } | Self::TimedOut { .. } | Self::Http(_) => ErrorKind::Transient,
            Self::MalformedPayload { .. } => ErrorKind::Defect,
            Self::Io(_) | Self::Json(_) | Self::Toml(_) | Self::Config(_) => ErrorKind::Internal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

pub type Result<T> = std::result::Result<T, TubescribeError>;
