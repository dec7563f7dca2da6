//! Parsing of the YouTube watch page and innertube player response.
//!
//! Everything here is pure so it can be exercised against captured responses.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::catalog::{CaptionTrack, TrackCatalog, TrackOrigin, TranslationLanguage};
use crate::error::ProviderError;
use crate::video::VideoId;

static API_KEY_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#""INNERTUBE_API_KEY":\s*"([a-zA-Z0-9_-]+)""#,
        r#"innertubeApiKey\s*[=:]\s*"([^"]+)""#,
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("api key pattern is valid"))
    .collect()
});

static CONSENT_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"name="v" value="(.*?)""#).expect("consent pattern is valid"));

const CONSENT_FORM_MARKER: &str = "action=\"https://consent.youtube.com/s\"";

pub fn is_consent_page(html: &str) -> bool {
    html.contains(CONSENT_FORM_MARKER)
}

/// Cookie value that accepts the consent interstitial, if the form carries one
pub fn consent_cookie(html: &str) -> Option<String> {
    CONSENT_VALUE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|v| format!("CONSENT=YES+{}", v.as_str()))
}

pub fn extract_api_key(html: &str) -> Result<String, ProviderError> {
    if html.contains("class=\"g-recaptcha\"") {
        return Err(ProviderError::RequestBlocked("captcha challenge on watch page".to_string()));
    }

    API_KEY_PATTERNS
        .iter()
        .find_map(|re| re.captures(html).and_then(|c| c.get(1)).map(|m| m.as_str().to_string()))
        .ok_or_else(|| ProviderError::Unparsable("innertube API key not found in watch page".to_string()))
}

fn assert_playability(data: &Value) -> Result<(), ProviderError> {
    let Some(playability) = data.get("playabilityStatus") else {
        return Ok(());
    };

    let status = playability.get("status").and_then(Value::as_str).unwrap_or("");
    if status == "OK" {
        return Ok(());
    }
    let reason = playability.get("reason").and_then(Value::as_str).unwrap_or("").to_string();

    match status {
        "LOGIN_REQUIRED" if reason.contains("not a bot") => Err(ProviderError::RequestBlocked(reason)),
        "LOGIN_REQUIRED" if reason.contains("inappropriate") => Err(ProviderError::AgeRestricted),
        "ERROR" if reason.to_lowercase().contains("unavailable") => Err(ProviderError::VideoUnavailable(reason)),
        _ => Err(ProviderError::VideoUnplayable(if reason.is_empty() {
            status.to_string()
        } else {
            reason
        })),
    }
}

/// `{"runs":[{"text":..}]}` or `{"simpleText":..}`
fn display_text(value: Option<&Value>) -> Option<String> {
    let value = value?;
    value
        .get("simpleText")
        .and_then(Value::as_str)
        .or_else(|| {
            value
                .get("runs")
                .and_then(Value::as_array)
                .and_then(|runs| runs.first())
                .and_then(|r| r.get("text"))
                .and_then(Value::as_str)
        })
        .map(str::to_string)
}

/// Build the track catalog from an innertube player response
pub fn parse_player_response(video_id: &VideoId, data: &Value) -> Result<TrackCatalog, ProviderError> {
    assert_playability(data)?;

    let Some(renderer) = data
        .get("captions")
        .and_then(|c| c.get("playerCaptionsTracklistRenderer"))
    else {
        return Err(ProviderError::CaptionsDisabled);
    };

    let translation_languages: Vec<TranslationLanguage> = renderer
        .get("translationLanguages")
        .and_then(Value::as_array)
        .map(|languages| {
            languages
                .iter()
                .filter_map(|l| {
                    let code = l.get("languageCode")?.as_str()?.to_string();
                    let name = display_text(l.get("languageName")).unwrap_or_else(|| code.clone());
                    Some(TranslationLanguage { code, name })
                })
                .collect()
        })
        .unwrap_or_default();

    let mut catalog = TrackCatalog::new(video_id.clone()).with_translation_languages(translation_languages);

    for caption in renderer
        .get("captionTracks")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
    {
        let (Some(code), Some(base_url)) = (
            caption.get("languageCode").and_then(Value::as_str),
            caption.get("baseUrl").and_then(Value::as_str),
        ) else {
            continue;
        };

        let origin = match caption.get("kind").and_then(Value::as_str) {
            Some("asr") => TrackOrigin::Generated,
            _ => TrackOrigin::Manual,
        };

        catalog.insert(CaptionTrack {
            video_id: video_id.clone(),
            language_code: code.to_string(),
            language_name: display_text(caption.get("name")).unwrap_or_else(|| code.to_string()),
            origin,
            is_translatable: caption.get("isTranslatable").and_then(Value::as_bool).unwrap_or(false),
            handle: base_url.replace("&fmt=srv3", ""),
        });
    }

    if catalog.is_empty() {
        return Err(ProviderError::CaptionsDisabled);
    }

    Ok(catalog)
}
