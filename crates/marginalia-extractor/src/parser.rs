//! Parse LLM output into analysis data
//!
//! Models often wrap their JSON in prose. The object is taken from the first
//! `{` to the last `}`; anything unusable becomes [`Parsed::Empty`], never an
//! error.

use marginalia_domain::{Character, Quote, Sentiment, Theme};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Outcome of parsing a model reply
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed<T> {
    /// The reply contained the expected object
    Value(T),
    /// The reply was unusable; callers substitute the empty default
    Empty,
}

impl<T: Default> Parsed<T> {
    /// The parsed value, or the schema's empty default
    pub fn unwrap_or_default(self) -> T {
        match self {
            Parsed::Value(value) => value,
            Parsed::Empty => T::default(),
        }
    }
}

impl<T> Parsed<T> {
    /// Whether the reply was unusable
    pub fn is_empty(&self) -> bool {
        matches!(self, Parsed::Empty)
    }
}

/// Themes, sentiment and quotes extracted in one reply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThemeReport {
    /// Major themes
    pub themes: Vec<Theme>,
    /// Overall sentiment; empty when absent
    pub sentiment: Sentiment,
    /// Significant quotes
    pub key_quotes: Vec<Quote>,
}

/// Locate the outermost JSON object and require `expected_key` in it
fn extract_object(response: &str, expected_key: &str) -> Option<Map<String, Value>> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if end < start {
        return None;
    }

    let value: Value = match serde_json::from_str(&response[start..=end]) {
        Ok(value) => value,
        Err(e) => {
            debug!("Model reply is not valid JSON: {}", e);
            return None;
        }
    };

    match value {
        Value::Object(map) if map.contains_key(expected_key) => Some(map),
        _ => {
            debug!("Model reply lacks '{}' key", expected_key);
            None
        }
    }
}

/// Parse each element of an array, skipping the malformed ones
fn parse_list<T: DeserializeOwned>(value: Option<&Value>, what: &str) -> Vec<T> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut parsed = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        match serde_json::from_value::<T>(item.clone()) {
            Ok(element) => parsed.push(element),
            Err(e) => warn!("Failed to parse {} {}: {}", what, idx, e),
        }
    }
    parsed
}

/// Parse a character identification reply
pub fn parse_characters(response: &str) -> Parsed<Vec<Character>> {
    match extract_object(response, "characters") {
        Some(map) => Parsed::Value(parse_list(map.get("characters"), "character")),
        None => Parsed::Empty,
    }
}

/// Parse a theme and sentiment reply
pub fn parse_themes(response: &str) -> Parsed<ThemeReport> {
    let Some(map) = extract_object(response, "themes") else {
        return Parsed::Empty;
    };

    let sentiment = map
        .get("sentiment")
        .and_then(|value| serde_json::from_value::<Sentiment>(value.clone()).ok())
        .unwrap_or_default();

    Parsed::Value(ThemeReport {
        themes: parse_list(map.get("themes"), "theme"),
        sentiment,
        key_quotes: parse_list(map.get("key_quotes"), "quote"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_characters_with_surrounding_prose() {
        let response = r#"Here is the analysis you asked for:
{"characters": [
  {"name": "Romeo", "aliases": ["Montague"], "role": "Main",
   "relationships": [{"character": "Juliet", "type": "Lover", "strength": 10}]}
]}
Let me know if you need more."#;

        let Parsed::Value(characters) = parse_characters(response) else {
            panic!("expected characters");
        };
        assert_eq!(characters.len(), 1);
        assert_eq!(characters[0].name, "Romeo");
        assert_eq!(characters[0].relationships[0].character, "Juliet");
    }

    #[test]
    fn test_malformed_replies_are_empty() {
        assert_eq!(parse_characters("No JSON here"), Parsed::Empty);
        assert_eq!(parse_characters("} backwards {"), Parsed::Empty);
        assert_eq!(parse_characters(r#"{"characters": [}"#), Parsed::Empty);
        assert_eq!(parse_characters(r#"{"people": []}"#), Parsed::Empty);
        assert_eq!(parse_themes(r#"{"characters": []}"#), Parsed::Empty);
    }

    #[test]
    fn test_empty_defaults() {
        assert!(parse_characters("nope").unwrap_or_default().is_empty());

        let report = parse_themes("nope").unwrap_or_default();
        assert!(report.themes.is_empty());
        assert_eq!(report.sentiment, Sentiment::default());
        assert!(report.key_quotes.is_empty());
    }

    #[test]
    fn test_malformed_elements_are_skipped() {
        let response = r#"{"characters": [
            {"name": "Tybalt"},
            {"role": "Nameless"},
            "just a string",
            {"name": "Nurse", "role": "Supporting"}
        ]}"#;

        let characters = parse_characters(response).unwrap_or_default();
        let names: Vec<_> = characters.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Tybalt", "Nurse"]);
    }

    #[test]
    fn test_parse_full_theme_report() {
        let response = r#"```json
{
  "themes": [{"name": "Love", "description": "Youthful passion"}],
  "sentiment": {"overall": "mixed", "analysis": "Joy turning to grief"},
  "key_quotes": [{"quote": "A plague o' both your houses!", "speaker": "Mercutio"}]
}
```"#;

        let Parsed::Value(report) = parse_themes(response) else {
            panic!("expected report");
        };
        assert_eq!(report.themes[0].name, "Love");
        assert_eq!(report.sentiment.overall.as_deref(), Some("mixed"));
        assert_eq!(report.key_quotes[0].speaker.as_deref(), Some("Mercutio"));
    }

    #[test]
    fn test_theme_report_missing_optional_sections() {
        let report = parse_themes(r#"{"themes": []}"#).unwrap_or_default();
        assert_eq!(report, ThemeReport::default());
    }

    proptest! {
        #[test]
        fn prop_parsing_never_panics(text in "\\PC{0,200}") {
            let _ = parse_characters(&text);
            let _ = parse_themes(&text);
        }

        #[test]
        fn prop_text_without_braces_is_empty(text in "[^{}]{0,200}") {
            prop_assert!(parse_characters(&text).is_empty());
            prop_assert!(parse_themes(&text).is_empty());
        }

        #[test]
        fn prop_parsing_is_idempotent(names in proptest::collection::vec("[A-Za-z ]{1,12}", 0..6)) {
            let characters: Vec<_> = names
                .iter()
                .map(|name| serde_json::json!({"name": name, "role": "Minor"}))
                .collect();
            let reply = serde_json::json!({"characters": characters}).to_string();

            let first = parse_characters(&reply);
            let second = parse_characters(&reply);
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.unwrap_or_default().len(), names.len());
        }
    }
}
