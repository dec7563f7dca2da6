use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde_json::{Map, Value};
use std::collections::HashMap;

use super::{PayloadDecoder, RawPayload, TranscriptEntry};

/// Scalar read from a record, before coercion
enum Scalar<'a> {
    Number(f64),
    Text(&'a str),
}

impl Scalar<'_> {
    fn seconds(&self) -> f64 {
        let value = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        };
        if value.is_finite() { value.max(0.0) } else { 0.0 }
    }

    fn text(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.to_string(),
        }
    }
}

/// Uniform view over one transcript item: field-style lookup first, then attribute-style
trait Record {
    fn field(&self, name: &str) -> Option<Scalar<'_>>;
    fn attribute(&self, name: &str) -> Option<Scalar<'_>>;

    fn lookup(&self, names: &[&str]) -> Option<Scalar<'_>> {
        names
            .iter()
            .find_map(|name| self.field(name))
            .or_else(|| names.iter().find_map(|name| self.attribute(name)))
    }

    fn to_entry(&self) -> TranscriptEntry {
        TranscriptEntry {
            start: self.lookup(&["start"]).map(|s| s.seconds()).unwrap_or(0.0),
            duration: self.lookup(&["duration", "dur"]).map(|s| s.seconds()).unwrap_or(0.0),
            text: clean_text(&self.lookup(&["text"]).map(|s| s.text()).unwrap_or_default()),
        }
    }
}

fn scalar(value: &Value) -> Option<Scalar<'_>> {
    match value {
        Value::Number(n) => n.as_f64().map(Scalar::Number),
        Value::String(s) => Some(Scalar::Text(s)),
        _ => None,
    }
}

impl Record for Map<String, Value> {
    fn field(&self, name: &str) -> Option<Scalar<'_>> {
        self.get(name).and_then(scalar)
    }

    fn attribute(&self, name: &str) -> Option<Scalar<'_>> {
        self.get(&format!("@{}", name))
            .or_else(|| self.get("attributes").and_then(|a| a.get(name)))
            .and_then(scalar)
    }
}

/// A `<text>` element: attributes plus its character content
struct Element {
    attributes: HashMap<String, String>,
    content: String,
}

impl Element {
    fn from_start(start: &BytesStart<'_>) -> Self {
        let attributes = start
            .attributes()
            .flatten()
            .filter_map(|attr| {
                let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                let value = attr.unescape_value().ok()?.into_owned();
                Some((key, value))
            })
            .collect();
        Self {
            attributes,
            content: String::new(),
        }
    }
}

impl Record for Element {
    fn field(&self, name: &str) -> Option<Scalar<'_>> {
        (name == "text").then_some(Scalar::Text(&self.content))
    }

    fn attribute(&self, name: &str) -> Option<Scalar<'_>> {
        self.attributes.get(name).map(|v| Scalar::Text(v))
    }
}

/// Entity-decode and trim; entities may be escaped twice in timedtext bodies
fn clean_text(raw: &str) -> String {
    html_escape::decode_html_entities(raw)
        .replace('\n', " ")
        .trim()
        .to_string()
}

fn keep_non_empty(entries: impl IntoIterator<Item = TranscriptEntry>) -> Vec<TranscriptEntry> {
    entries.into_iter().filter(|e| !e.text.is_empty()).collect()
}

/// Array of objects, or `None` if any item is not an object
fn decode_records(items: &[Value]) -> Option<Vec<TranscriptEntry>> {
    let records: Vec<&Map<String, Value>> = items.iter().map(Value::as_object).collect::<Option<_>>()?;
    Some(keep_non_empty(records.into_iter().map(|r| r.to_entry())))
}

/// `[{"start": 0.0, "duration": 1.5, "text": "..."}, ...]`
pub struct RecordSequenceDecoder;

impl PayloadDecoder for RecordSequenceDecoder {
    fn name(&self) -> &'static str {
        "record-sequence"
    }

    fn decode(&self, payload: &RawPayload) -> Option<Vec<TranscriptEntry>> {
        match payload {
            RawPayload::Json(Value::Array(items)) => decode_records(items),
            _ => None,
        }
    }
}

/// `<transcript><text start="0" dur="1.5">...</text></transcript>`
pub struct AttributeSequenceDecoder;

impl PayloadDecoder for AttributeSequenceDecoder {
    fn name(&self) -> &'static str {
        "attribute-sequence"
    }

    fn decode(&self, payload: &RawPayload) -> Option<Vec<TranscriptEntry>> {
        let RawPayload::Xml(xml) = payload else {
            return None;
        };

        let mut reader = Reader::from_str(xml);
        let mut elements = Vec::new();
        let mut current: Option<Element> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) if e.name().as_ref() == b"text" => {
                    current = Some(Element::from_start(e));
                }
                Ok(Event::Empty(ref e)) if e.name().as_ref() == b"text" => {
                    elements.push(Element::from_start(e));
                }
                Ok(Event::Text(ref e)) => {
                    if let Some(element) = current.as_mut() {
                        // Entities quick-xml does not know (`&nbsp;`) are left for clean_text
                        match e.unescape() {
                            Ok(text) => element.content.push_str(&text),
                            Err(_) => element.content.push_str(&String::from_utf8_lossy(e)),
                        }
                    }
                }
                Ok(Event::CData(ref e)) => {
                    if let Some(element) = current.as_mut() {
                        element.content.push_str(&String::from_utf8_lossy(e));
                    }
                }
                Ok(Event::End(ref e)) if e.name().as_ref() == b"text" => {
                    elements.extend(current.take());
                }
                Ok(Event::Eof) => break,
                Err(_) => return None,
                _ => {}
            }
        }

        if elements.is_empty() {
            return None;
        }
        Some(keep_non_empty(elements.iter().map(|e| e.to_entry())))
    }
}

/// `{"transcript": [...]}` or `{"snippets": [...]}`, one level of nesting allowed
pub struct WrappedTranscriptDecoder;

impl WrappedTranscriptDecoder {
    const KEYS: [&'static str; 2] = ["transcript", "snippets"];

    fn find_sequence(object: &Map<String, Value>, depth: usize) -> Option<&Vec<Value>> {
        Self::KEYS.iter().find_map(|key| match object.get(*key)? {
            Value::Array(items) => Some(items),
            Value::Object(inner) if depth == 0 => Self::find_sequence(inner, depth + 1),
            _ => None,
        })
    }
}

impl PayloadDecoder for WrappedTranscriptDecoder {
    fn name(&self) -> &'static str {
        "wrapped-transcript"
    }

    fn decode(&self, payload: &RawPayload) -> Option<Vec<TranscriptEntry>> {
        match payload {
            RawPayload::Json(Value::Object(object)) => decode_records(Self::find_sequence(object, 0)?),
            _ => None,
        }
    }
}

/// YouTube json3: `{"events": [{"tStartMs": 0, "dDurationMs": 1500, "segs": [{"utf8": "..."}]}]}`
pub struct Json3EventsDecoder;

impl Json3EventsDecoder {
    fn millis(event: &Value, key: &str) -> f64 {
        event
            .get(key)
            .and_then(scalar)
            .map(|s| s.seconds() / 1000.0)
            .unwrap_or(0.0)
    }
}

impl PayloadDecoder for Json3EventsDecoder {
    fn name(&self) -> &'static str {
        "json3-events"
    }

    fn decode(&self, payload: &RawPayload) -> Option<Vec<TranscriptEntry>> {
        let RawPayload::Json(value) = payload else {
            return None;
        };
        let events = value.get("events")?.as_array()?;

        let entries = events.iter().filter_map(|event| {
            let segs = event.get("segs")?.as_array()?;
            let raw: String = segs
                .iter()
                .filter_map(|seg| seg.get("utf8").and_then(Value::as_str))
                .collect();
            Some(TranscriptEntry {
                start: Self::millis(event, "tStartMs"),
                duration: Self::millis(event, "dDurationMs"),
                text: clean_text(&raw),
            })
        });
        Some(keep_non_empty(entries))
    }
}
