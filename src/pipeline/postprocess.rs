//! Post-processing: turn a vision model's reply into an [`OcrResponse`].
//!
//! Even a well-prompted model occasionally wraps its JSON in a ```` ```json ````
//! fence, adds a sentence before it, nests the fields under `"fields"`, or
//! answers `"N/A"` instead of `null`. The rules here absorb those quirks so
//! the retry loop only ever sees a clean field map.
//!
//! ## Rule Order
//!
//! 1. Strip outer code fences
//! 2. Cut the outermost `{ … }` out of any surrounding prose
//! 3. Accept both `{"success", "fields": {…}}` and flat field objects
//! 4. Clean each value (invisible characters, whitespace, placeholder words)
//! 5. Normalise identifiers per field (plates, ids, registry and chassis numbers)

use crate::error::IntakeError;
use crate::pipeline::ocr::OcrResponse;
use crate::slot::{
    DocumentKind, FIELD_CHASSIS, FIELD_NATIONAL_ID, FIELD_PLATE, FIELD_REGISTRY_NUMBER,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Keys that describe the reply rather than the document.
const RESERVED_KEYS: &[&str] = &["success", "message", "fields"];

/// Values models emit when a field is unreadable.
const PLACEHOLDERS: &[&str] = &["null", "none", "n/a", "na", "-", "unknown", "not visible"];

/// Parse a raw model reply for a document of `kind`.
pub fn parse_ocr_reply(kind: DocumentKind, reply: &str) -> Result<OcrResponse, IntakeError> {
    let body = strip_code_fences(reply);
    let json = outer_object(&body).ok_or_else(|| IntakeError::MalformedResponse {
        detail: format!("no JSON object in reply: {}", preview(reply)),
    })?;

    let value: Value = serde_json::from_str(json).map_err(|e| IntakeError::MalformedResponse {
        detail: format!("invalid JSON ({e}): {}", preview(json)),
    })?;
    let Value::Object(obj) = value else {
        return Err(IntakeError::MalformedResponse {
            detail: "reply is not a JSON object".to_string(),
        });
    };

    let success = obj.get("success").and_then(Value::as_bool).unwrap_or(true);
    let message = obj
        .get("message")
        .and_then(Value::as_str)
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty());

    let source: &Map<String, Value> = match obj.get("fields") {
        Some(Value::Object(inner)) => inner,
        _ => &obj,
    };

    let mut fields = BTreeMap::new();
    for (key, value) in source {
        if RESERVED_KEYS.contains(&key.as_str()) {
            continue;
        }
        if let Some(text) = scalar_text(value) {
            fields.insert(key.clone(), text);
        }
    }
    normalise_fields(kind, &mut fields);

    Ok(OcrResponse {
        success,
        fields,
        message,
    })
}

// ── Rule 1: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\s*\n(.*?)\n?```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    let trimmed = input.trim();
    match RE_OUTER_FENCES.captures(trimmed) {
        Some(caps) => caps[1].to_string(),
        None => trimmed.to_string(),
    }
}

// ── Rule 2: Outermost object ─────────────────────────────────────────────────

fn outer_object(input: &str) -> Option<&str> {
    let start = input.find('{')?;
    let end = input.rfind('}')?;
    (end > start).then(|| &input[start..=end])
}

// ── Rule 4: Value cleanup ────────────────────────────────────────────────────

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn scalar_text(value: &Value) -> Option<String> {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let visible: String = raw
        .chars()
        .filter(|c| !matches!(c, '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{00AD}'))
        .collect();
    let text = RE_WHITESPACE.replace_all(visible.trim(), " ").to_string();
    if text.is_empty() || PLACEHOLDERS.contains(&text.to_ascii_lowercase().as_str()) {
        None
    } else {
        Some(text)
    }
}

// ── Rule 5: Identifier normalisation ─────────────────────────────────────────

fn alphanumeric_upper(s: &str) -> String {
    s.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

fn normalise_fields(kind: DocumentKind, fields: &mut BTreeMap<String, String>) {
    let identifiers: &[&str] = match kind {
        DocumentKind::License => &[FIELD_NATIONAL_ID],
        DocumentKind::Registration => &[FIELD_PLATE, FIELD_REGISTRY_NUMBER, FIELD_CHASSIS],
        DocumentKind::PoliceReport => &[],
    };
    for key in identifiers {
        if let Some(value) = fields.get_mut(*key) {
            *value = alphanumeric_upper(value);
        }
    }
    fields.retain(|_, v| !v.is_empty());
}

fn preview(s: &str) -> String {
    let cut: String = s.chars().take(80).collect();
    if cut.len() < s.len() {
        format!("{cut}\u{2026}")
    } else {
        cut
    }
}
