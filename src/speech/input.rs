//! Text handed to the engine for playback
//!
//! Callers pass either a single block of text or an ordered list of items
//! (a heading followed by its bullet points, a chat reply split into
//! paragraphs). Items are chunked independently, so a chunk never spans two
//! items.

use serde_json::Value;

/// Input accepted by [`crate::speech::PlaybackController::speak`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechInput {
    /// One block of text
    Text(String),
    /// Ordered items, each chunked on its own
    Items(Vec<String>),
}

impl SpeechInput {
    /// Collect the text of a structured summary payload
    ///
    /// Walks the value depth first, keeping every string in document order.
    /// Numbers, booleans and nulls carry no speakable text and are skipped.
    pub fn from_json(value: &Value) -> Self {
        let mut items = Vec::new();
        collect_strings(value, &mut items);
        SpeechInput::Items(items)
    }

    /// Borrow the items of this input in order
    pub fn items(&self) -> Vec<&str> {
        match self {
            SpeechInput::Text(text) => vec![text.as_str()],
            SpeechInput::Items(items) => items.iter().map(String::as_str).collect(),
        }
    }
}

fn collect_strings(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            if !s.trim().is_empty() {
                out.push(s.clone());
            }
        }
        Value::Array(values) => {
            for v in values {
                collect_strings(v, out);
            }
        }
        Value::Object(map) => {
            for v in map.values() {
                collect_strings(v, out);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

impl From<&str> for SpeechInput {
    fn from(text: &str) -> Self {
        SpeechInput::Text(text.to_string())
    }
}

impl From<String> for SpeechInput {
    fn from(text: String) -> Self {
        SpeechInput::Text(text)
    }
}

impl From<Vec<String>> for SpeechInput {
    fn from(items: Vec<String>) -> Self {
        SpeechInput::Items(items)
    }
}

impl From<Vec<&str>> for SpeechInput {
    fn from(items: Vec<&str>) -> Self {
        SpeechInput::Items(items.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for SpeechInput {
    fn from(items: &[&str]) -> Self {
        SpeechInput::Items(items.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for SpeechInput {
    fn from(items: [&str; N]) -> Self {
        SpeechInput::Items(items.iter().map(|s| s.to_string()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_keeps_document_order() {
        let summary = json!({
            "title": "Renewing a passport",
            "steps": ["Fill in the form.", "Attach a photo."],
            "count": 2,
            "urgent": false,
            "notes": null,
            "extra": { "tip": "Apply early." }
        });

        let input = SpeechInput::from_json(&summary);
        assert_eq!(
            input.items(),
            vec![
                "Renewing a passport",
                "Fill in the form.",
                "Attach a photo.",
                "Apply early."
            ]
        );
    }

    #[test]
    fn test_from_json_skips_blank_strings() {
        let input = SpeechInput::from_json(&json!(["", "   ", "Hi."]));
        assert_eq!(input.items(), vec!["Hi."]);
    }

    #[test]
    fn test_conversions() {
        assert_eq!(SpeechInput::from("a"), SpeechInput::Text("a".into()));
        assert_eq!(
            SpeechInput::from(["a", "b"]),
            SpeechInput::Items(vec!["a".into(), "b".into()])
        );
    }
}
