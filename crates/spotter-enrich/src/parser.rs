//! Resilient parsing of model output into enriched objects.
//!
//! Stages, in order:
//! 1. strip Markdown code fences and parse against the strict schema;
//! 2. fall back to a plain-text list of names (no boxes);
//! 3. text that looks like JSON but failed stage 1 is rejected as
//!    [`EnrichError::Unparseable`] so fragments never become names.

use spotter_models::{BoundingBox, EnrichedObject};
use tracing::debug;

use crate::error::{EnrichError, EnrichResult};
use crate::types::{RawDetection, RawItem, RawResponse};

/// Scale of Gemini `box_2d` coordinates.
pub const BOX_2D_SCALE: f64 = 1000.0;

/// Shortest accepted item name.
pub const MIN_NAME_LEN: usize = 2;

const REFUSAL_PREFIXES: &[&str] = &[
    "i'm sorry",
    "i am sorry",
    "sorry",
    "i cannot",
    "i can't",
    "i can not",
    "i'm unable",
    "i am unable",
    "unable to",
    "as an ai",
];

const PLACEHOLDER_NAMES: &[&str] = &["none", "n/a", "nothing", "unknown", "null"];

/// Parse raw model text.
pub fn parse_response(text: &str) -> EnrichResult<Vec<EnrichedObject>> {
    let body = strip_code_fences(text);
    if body.is_empty() {
        return Ok(Vec::new());
    }

    match serde_json::from_str::<RawResponse>(body) {
        Ok(response) => {
            let items = response
                .into_items()
                .into_iter()
                .filter_map(convert_item)
                .collect();
            return Ok(items);
        }
        Err(e) => debug!(error = %e, "Strict parse failed, trying plain-text fallback"),
    }

    if body.contains('{') || body.contains('[') {
        return Err(EnrichError::unparseable(truncate(body, 200)));
    }

    Ok(parse_plain_text(body))
}

/// Body of the first ```` ``` ```` / ```` ```json ```` fenced block, or the
/// trimmed text when there is none. Prose around the block is ignored.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(open) = trimmed.find("```") else {
        return trimmed;
    };

    let rest = &trimmed[open + 3..];
    let inner = match rest.find("```") {
        Some(close) => &rest[..close],
        None => rest,
    };

    // Drop the info string (e.g. `json`) on the opening fence line.
    let body = match inner.find('\n') {
        Some(pos) if inner[..pos].trim().chars().all(|c| c.is_ascii_alphanumeric()) => {
            &inner[pos + 1..]
        }
        _ => inner.trim_start_matches("json"),
    };

    body.trim()
}

/// Split free text into bare names.
pub fn parse_plain_text(text: &str) -> Vec<EnrichedObject> {
    text.split(|c| c == ',' || c == '\n' || c == ';')
        .map(clean_token)
        .filter(|name| is_valid_name(name))
        .map(EnrichedObject::named)
        .collect()
}

/// Whether a name is usable: long enough and not refusal or placeholder text.
pub fn is_valid_name(name: &str) -> bool {
    let trimmed = name.trim();
    if trimmed.chars().count() < MIN_NAME_LEN {
        return false;
    }

    let lower = trimmed.to_lowercase();
    if PLACEHOLDER_NAMES.contains(&lower.as_str()) {
        return false;
    }
    !REFUSAL_PREFIXES.iter().any(|p| lower.starts_with(p))
}

fn clean_token(token: &str) -> String {
    let mut t = token.trim();

    t = t.trim_start_matches(|c: char| matches!(c, '-' | '*' | '•' | '·') || c.is_whitespace());

    // Numbering such as `1.` or `12)`
    let digits = t.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &t[digits..];
        if let Some(stripped) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            t = stripped;
        }
    }

    t.trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '.'))
        .trim()
        .to_string()
}

fn convert_item(item: RawItem) -> Option<EnrichedObject> {
    match item {
        RawItem::Bare(name) => {
            let name = name.trim().to_string();
            is_valid_name(&name).then(|| EnrichedObject::named(name))
        }
        RawItem::Detailed(raw) => convert_detection(raw),
    }
}

fn convert_detection(raw: RawDetection) -> Option<EnrichedObject> {
    let name = raw.name.trim().to_string();
    if !is_valid_name(&name) {
        debug!(name = %name, "Dropping invalid item name");
        return None;
    }

    let bbox = raw.box_2d.as_deref().and_then(|coords| match coords {
        [y_min, x_min, y_max, x_max] => {
            BoundingBox::from_scaled([*y_min, *x_min, *y_max, *x_max], BOX_2D_SCALE)
        }
        _ => None,
    });

    Some(EnrichedObject {
        name,
        bbox,
        brand: non_empty(raw.brand),
        color: non_empty(raw.color),
        size: non_empty(raw.size),
        category: non_empty(raw.category),
        confidence: raw
            .confidence
            .filter(|c| c.is_finite())
            .map(|c| c.clamp(0.0, 1.0)),
        ocr_text: raw.text.map(|t| t.into_tokens()).unwrap_or_default(),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("```\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("```json[1]```"), "[1]");
        assert_eq!(strip_code_fences("  [1]  "), "[1]");
        assert_eq!(
            strip_code_fences("Here are the items:\n```json\n[1]\n```\nLet me know!"),
            "[1]"
        );
    }

    #[test]
    fn test_fenced_block_after_prose() {
        let text = "Here are the items:\n```json\n[{\"name\": \"Desk Lamp\"}, {\"name\": \"Mug\"}]\n```";
        let items = parse_response(text).unwrap();
        let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Desk Lamp", "Mug"]);
    }

    #[test]
    fn test_strict_list_with_boxes() {
        let text = r#"```json
[
  {"name": "Glass Wine Bottle", "box_2d": [100, 200, 500, 400], "color": "green", "confidence": 0.92, "text": ["Merlot", " "]},
  {"name": "Cutting Board", "box_2d": [0, 0, 1000]}
]
```"#;
        let items = parse_response(text).unwrap();
        assert_eq!(items.len(), 2);

        let bottle = &items[0];
        assert_eq!(bottle.name, "Glass Wine Bottle");
        let bbox = bottle.bbox.unwrap();
        assert!((bbox.y_min() - 0.1).abs() < 1e-9);
        assert!((bbox.x_max() - 0.4).abs() < 1e-9);
        assert_eq!(bottle.color.as_deref(), Some("green"));
        assert_eq!(bottle.ocr_text, vec!["Merlot".to_string()]);

        // Malformed box is dropped, the item is kept.
        assert!(items[1].bbox.is_none());
    }

    #[test]
    fn test_wrapped_items() {
        let items = parse_response(r#"{"items": [{"name": "Desk Lamp"}]}"#).unwrap();
        assert_eq!(items[0].name, "Desk Lamp");
    }

    #[test]
    fn test_plain_text_fallback() {
        let items = parse_response("1. Red Chair\n2) Floor Lamp\n- \"Toaster\", kettle").unwrap();
        let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Red Chair", "Floor Lamp", "Toaster", "kettle"]);
        assert!(items.iter().all(|i| i.bbox.is_none()));
    }

    #[test]
    fn test_malformed_json_is_unparseable() {
        let err = parse_response(r#"[{"name": "Lamp", "box_2d": [1, 2"#).unwrap_err();
        assert!(matches!(err, EnrichError::Unparseable(_)));

        let err = parse_response("Here you go: {name: lamp}").unwrap_err();
        assert!(matches!(err, EnrichError::Unparseable(_)));
    }

    #[test]
    fn test_refusals_and_short_names_dropped() {
        let items = parse_response("I'm sorry, I cannot identify objects in this image.").unwrap();
        assert!(items.is_empty());

        let items =
            parse_response(r#"[{"name": "x"}, {"name": "I'm unable to see"}, {"name": "Mug"}, "none"]"#)
                .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Mug");
    }

    #[test]
    fn test_empty_response_is_no_items() {
        assert!(parse_response("").unwrap().is_empty());
        assert!(parse_response("```json\n[]\n```").unwrap().is_empty());
    }

    #[test]
    fn test_confidence_clamped() {
        let items = parse_response(r#"[{"name": "Vase", "confidence": 1.7}]"#).unwrap();
        assert_eq!(items[0].confidence, Some(1.0));
    }
}
