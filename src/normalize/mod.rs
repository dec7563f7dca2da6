// Transcript normalization
//
// Providers have returned the same logical data in several shapes over time.
// Each shape is handled by a named decoder, tried in priority order:
// - record-sequence: JSON array of {start, duration, text} records
// - attribute-sequence: timedtext XML, fields carried as element attributes
// - wrapped-transcript: JSON object holding a nested `transcript`/`snippets` array
// - json3-events: YouTube json3 `events` with millisecond offsets
//
// To support a new shape, implement PayloadDecoder and register it in
// Normalizer::default(); the pipeline does not change.

pub mod decoders;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

use crate::error::{Result, TubescribeError};
use crate::video::VideoId;

pub use decoders::{AttributeSequenceDecoder, Json3EventsDecoder, RecordSequenceDecoder, WrappedTranscriptDecoder};

/// One normalized caption line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub start: f64,
    pub duration: f64,
    pub text: String,
}

/// Track body as received from the provider
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    Json(Value),
    Xml(String),
}

impl RawPayload {
    /// JSON when the body parses as JSON, otherwise treated as XML
    pub fn from_body(body: &str) -> Self {
        let trimmed = body.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            if let Ok(value) = serde_json::from_str(trimmed) {
                return Self::Json(value);
            }
        }
        Self::Xml(body.to_string())
    }

    /// Short structural description for diagnostics
    pub fn describe(&self) -> String {
        match self {
            Self::Json(value) => format!("json {}", describe_value(value)),
            Self::Xml(body) => {
                let root = body
                    .trim_start()
                    .trim_start_matches("<?xml")
                    .split('<')
                    .nth(1)
                    .and_then(|tag| tag.split(|c: char| c.is_whitespace() || c == '>' || c == '/').next())
                    .filter(|tag| !tag.is_empty())
                    .unwrap_or("?");
                format!("xml document ({} bytes, root <{}>)", body.len(), root)
            }
        }
    }
}

fn describe_value(value: &Value) -> String {
    match value {
        Value::Array(items) => match items.first() {
            Some(first) => format!("array of {} items, first is {}", items.len(), describe_value(first)),
            None => "empty array".to_string(),
        },
        Value::Object(map) => {
            let keys: Vec<&str> = map.keys().map(String::as_str).take(8).collect();
            format!("object with keys [{}]", keys.join(", "))
        }
        Value::String(_) => "string".to_string(),
        Value::Number(_) => "number".to_string(),
        Value::Bool(_) => "bool".to_string(),
        Value::Null => "null".to_string(),
    }
}

/// Converts one payload shape into transcript entries
pub trait PayloadDecoder: Send + Sync {
    fn name(&self) -> &'static str;

    /// `None` when the payload is not in this decoder's shape
    fn decode(&self, payload: &RawPayload) -> Option<Vec<TranscriptEntry>>;
}

pub struct Normalizer {
    decoders: Vec<Box<dyn PayloadDecoder>>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(vec![
            Box::new(RecordSequenceDecoder),
            Box::new(AttributeSequenceDecoder),
            Box::new(WrappedTranscriptDecoder),
            Box::new(Json3EventsDecoder),
        ])
    }
}

impl Normalizer {
    pub fn new(decoders: Vec<Box<dyn PayloadDecoder>>) -> Self {
        Self { decoders }
    }

    pub fn decoder_names(&self) -> Vec<&'static str> {
        self.decoders.iter().map(|d| d.name()).collect()
    }

    /// First decoder producing at least one non-empty entry wins
    pub fn normalize(&self, video_id: &VideoId, payload: &RawPayload) -> Result<Vec<TranscriptEntry>> {
        for decoder in &self.decoders {
            match decoder.decode(payload) {
                Some(entries) if !entries.is_empty() => {
                    debug!("Decoded {} entries for {} with '{}'", entries.len(), video_id, decoder.name());
                    return Ok(entries);
                }
                Some(_) => debug!("Decoder '{}' matched {} but produced no entries", decoder.name(), video_id),
                None => {}
            }
        }

        let shape = payload.describe();
        error!(
            "No decoder could extract entries for {} (tried: {}); payload shape: {}",
            video_id,
            self.decoder_names().join(", "),
            shape
        );
        Err(TubescribeError::MalformedPayload {
            video_id: video_id.to_string(),
            shape,
        })
    }
}
