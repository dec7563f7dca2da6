use serde::{Deserialize, Serialize};

use crate::normalize::TranscriptEntry;

/// Final transcript handed back to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptResult {
    pub text: String,
    pub language_code: String,
    pub duration_seconds: f64,
    pub translated: bool,
    pub original_language_code: String,
    pub is_generated: bool,
    pub entries: Vec<TranscriptEntry>,
    /// Timestamped text of the source track, present only for translated results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_text: Option<String>,
}

impl TranscriptResult {
    /// Attach the pre-translation text; ignored unless the result is translated
    pub fn with_original(mut self, original: Option<&[TranscriptEntry]>) -> Self {
        self.original_text = match original {
            Some(entries) if self.translated => Some(render_text(entries)),
            _ => None,
        };
        self
    }
}

/// Build the timestamped text and metadata from normalized entries
pub fn assemble(
    entries: Vec<TranscriptEntry>,
    language_code: &str,
    translated: bool,
    original_language_code: &str,
    is_generated: bool,
) -> TranscriptResult {
    let text = render_text(&entries);
    let duration_seconds = entries.last().map(|e| e.start + e.duration).unwrap_or(0.0);

    TranscriptResult {
        text,
        language_code: language_code.to_string(),
        duration_seconds,
        translated,
        original_language_code: original_language_code.to_string(),
        is_generated,
        entries,
        original_text: None,
    }
}

/// One `[H:MM:SS] text` line per entry
pub fn render_text(entries: &[TranscriptEntry]) -> String {
    entries
        .iter()
        .map(|entry| format!("[{}] {}", format_timestamp(entry.start), entry.text))
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string()
}

/// Format seconds as H:MM:SS, truncating fractions
pub fn format_timestamp(seconds: f64) -> String {
    let total_seconds = seconds.max(0.0) as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    format!("{}:{:02}:{:02}", hours, minutes, secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(start: f64, duration: f64, text: &str) -> TranscriptEntry {
        TranscriptEntry {
            start,
            duration,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "0:00:00");
        assert_eq!(format_timestamp(5.9), "0:00:05");
        assert_eq!(format_timestamp(65.123), "0:01:05");
        assert_eq!(format_timestamp(3661.5), "1:01:01");
        assert_eq!(format_timestamp(36000.0), "10:00:00");
    }

    #[test]
    fn test_assemble_two_entries() {
        let result = assemble(
            vec![entry(0.0, 2.5, "hello"), entry(5.0, 3.0, "world")],
            "en",
            false,
            "en",
            true,
        );

        assert_eq!(result.text, "[0:00:00] hello\n[0:00:05] world");
        assert_eq!(result.duration_seconds, 8.0);
        assert_eq!(result.language_code, "en");
        assert!(!result.translated);
        assert!(result.is_generated);
        assert_eq!(result.entries.len(), 2);
    }

    #[test]
    fn test_assemble_translated_metadata() {
        let result = assemble(vec![entry(1.0, 1.0, "hi")], "en", true, "es", false);
        assert_eq!(result.language_code, "en");
        assert_eq!(result.original_language_code, "es");
        assert!(result.translated);
    }

    #[test]
    fn test_original_text_only_for_translated_results() {
        let source = [entry(0.0, 1.0, "hola"), entry(61.0, 1.0, "adiós")];

        let translated = assemble(vec![entry(0.0, 1.0, "hello")], "en", true, "es", false).with_original(Some(&source));
        assert_eq!(translated.original_text.as_deref(), Some("[0:00:00] hola\n[0:01:01] adiós"));

        let untouched = assemble(vec![entry(0.0, 1.0, "hola")], "es", false, "es", false).with_original(Some(&source));
        assert!(untouched.original_text.is_none());
        let json = serde_json::to_value(&untouched).unwrap();
        assert!(json.get("original_text").is_none());
    }

    #[test]
    fn test_assemble_empty() {
        let result = assemble(Vec::new(), "fr", false, "fr", false);
        assert_eq!(result.text, "");
        assert_eq!(result.duration_seconds, 0.0);
    }

    #[test]
    fn test_result_serializes_to_json() {
        let result = assemble(vec![entry(0.0, 1.0, "a")], "en", false, "en", false);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["language_code"], "en");
        assert_eq!(json["duration_seconds"], 1.0);
        assert_eq!(json["entries"][0]["text"], "a");
    }
}
