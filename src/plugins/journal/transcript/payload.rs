//! Shape detection for raw caption payloads.
//!
//! Two shapes are known. A structured transcript holds language tracks under
//! `transcript`, each with `Lines` of `{start, duration, text}`. A cue list is
//! the first array found under one of [`CUE_LIST_FIELDS`], where every field
//! is read through an alias chain. Anything else is empty.

use serde_json::Value;

use super::CaptionSegment;

/// Searched in order; the first array wins.
pub const CUE_LIST_FIELDS: [&str; 5] = ["segments", "cues", "items", "lines", "entries"];

const START_ALIASES: [&str; 3] = ["start", "from", "offset"];
const END_ALIASES: [&str; 2] = ["end", "to"];
const TEXT_ALIASES: [&str; 3] = ["text", "caption", "value"];

/// Applied when a line or cue carries no duration.
pub const DEFAULT_DURATION: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CaptionPayload<'a> {
    Transcript(&'a [Value]),
    CueList {
        field: &'static str,
        items: &'a [Value],
    },
    Empty,
}

impl<'a> CaptionPayload<'a> {
    pub fn detect(raw: &'a Value) -> Self {
        if let Some(tracks) = raw.get("transcript").and_then(Value::as_array) {
            let line_count: usize = tracks.iter().map(|t| track_lines(t).len()).sum();
            if line_count > 0 {
                return CaptionPayload::Transcript(tracks);
            }
        }

        CUE_LIST_FIELDS
            .iter()
            .find_map(|&field| {
                raw.get(field)
                    .and_then(Value::as_array)
                    .map(|items| CaptionPayload::CueList {
                        field,
                        items: items.as_slice(),
                    })
            })
            .unwrap_or(CaptionPayload::Empty)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CaptionPayload::Transcript(_) => "transcript",
            CaptionPayload::CueList { field, .. } => *field,
            CaptionPayload::Empty => "empty",
        }
    }

    /// Candidate segments in payload order. Entries without text are already
    /// skipped; timing is not validated yet.
    pub fn candidates(&self) -> Vec<CaptionSegment> {
        match self {
            CaptionPayload::Transcript(tracks) => tracks.iter().flat_map(transcript_track).collect(),
            CaptionPayload::CueList { items, .. } => items
                .iter()
                .enumerate()
                .filter_map(|(index, item)| cue(item, index))
                .collect(),
            CaptionPayload::Empty => Vec::new(),
        }
    }
}

fn track_lines(track: &Value) -> &[Value] {
    track
        .get("Lines")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn transcript_track(track: &Value) -> Vec<CaptionSegment> {
    let language = track
        .get("LanguageCode")
        .and_then(truthy_label)
        .unwrap_or_else(|| "track".to_string());

    track_lines(track)
        .iter()
        .enumerate()
        .filter_map(|(index, line)| {
            let raw_start = present(line, "start");
            let start = raw_start.map_or(0.0, js_number);
            let duration = present(line, "duration").map_or(DEFAULT_DURATION, js_number);
            let text = present(line, "text").and_then(js_text)?;
            let start_label = raw_start.map_or_else(|| "0".to_string(), js_label);

            Some(CaptionSegment {
                id: format!("{}-{}-{}", language, start_label, index),
                start,
                end: start + duration,
                text,
            })
        })
        .collect()
}

fn cue(item: &Value, index: usize) -> Option<CaptionSegment> {
    let start = first_present(item, &START_ALIASES).map_or(0.0, js_number);
    let end = match first_present(item, &END_ALIASES) {
        Some(end) => js_number(end),
        None => start + present(item, "duration").map_or(DEFAULT_DURATION, js_number),
    };
    let text = first_present(item, &TEXT_ALIASES).and_then(js_text)?;
    let id = item
        .get("id")
        .and_then(truthy_label)
        .unwrap_or_else(|| format!("{}-{}", start, index));

    Some(CaptionSegment {
        id,
        start,
        end,
        text,
    })
}

/// A field counts as present unless it is absent or null.
fn present<'v>(value: &'v Value, key: &str) -> Option<&'v Value> {
    value.get(key).filter(|v| !v.is_null())
}

fn first_present<'v>(value: &'v Value, keys: &[&str]) -> Option<&'v Value> {
    keys.iter().find_map(|key| present(value, key))
}

/// Numeric coercion with loose-typing rules: numeric strings parse, blank
/// strings and null are zero, booleans are 0/1, anything else is NaN.
pub fn js_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse().unwrap_or(f64::NAN)
            }
        }
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Null => 0.0,
        Value::Array(_) | Value::Object(_) => f64::NAN,
    }
}

/// Caption text. Empty strings, zero, false and structured values carry no text.
fn js_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()) => {
            Some(n.to_string())
        }
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

fn js_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.as_f64().map_or_else(|| n.to_string(), |f| f.to_string()),
        other => other.to_string(),
    }
}

fn truthy_label(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()) => {
            Some(js_label(value))
        }
        _ => None,
    }
}
