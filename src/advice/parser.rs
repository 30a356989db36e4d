//! Schema repair for the generator's structured advice.
//!
//! The generator is asked for a `{"sections": [...]}` object but its output is
//! not trusted: it may be wrapped in a code fence, omit topics, repeat them, or
//! not be JSON at all. [`parse_advice`] turns any string into a well-formed
//! [`AdviceResponse`] and never fails.

use super::prompts::expected_keys;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, warn};

pub const ERROR_KEY: &str = "error";
pub const ERROR_TITLE: &str = "Error";
pub const ERROR_CONTENT: &str =
    "We couldn't generate full information at this time. Please try again later.";

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^```(?:json)?\s*(.*?)\s*```$").expect("code fence pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdviceSection {
    pub key: String,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdviceResponse {
    pub sections: Vec<AdviceSection>,
}

impl AdviceSection {
    /// Stand-in for a topic the generator left out.
    pub fn placeholder(key: &str) -> Self {
        Self {
            key: key.to_string(),
            title: title_case(key),
            content: format!("No information available for {}.", key.replace('_', " ")),
        }
    }
}

impl AdviceResponse {
    /// The single-section body returned when no advice could be recovered.
    pub fn unavailable() -> Self {
        Self {
            sections: vec![AdviceSection {
                key: ERROR_KEY.to_string(),
                title: ERROR_TITLE.to_string(),
                content: ERROR_CONTENT.to_string(),
            }],
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.sections.len() == 1 && self.sections[0].key == ERROR_KEY
    }

    pub fn get(&self, key: &str) -> Option<&AdviceSection> {
        self.sections.iter().find(|section| section.key == key)
    }
}

/// Parses raw generator output into the advice schema.
///
/// Supplied sections keep their order (first occurrence wins for repeated
/// keys); every expected topic that is absent is appended as a placeholder.
/// Anything that is not a JSON object of the expected shape yields
/// [`AdviceResponse::unavailable`].
pub fn parse_advice(raw: &str) -> AdviceResponse {
    match try_parse(raw) {
        Ok(response) => response,
        Err(reason) => {
            warn!("Failed to decode advice response: {}", reason);
            AdviceResponse::unavailable()
        }
    }
}

fn try_parse(raw: &str) -> Result<AdviceResponse, String> {
    let cleaned = strip_code_fence(raw);
    let value: Value = serde_json::from_str(cleaned).map_err(|e| e.to_string())?;

    let root = value
        .as_object()
        .ok_or_else(|| "root is not a JSON object".to_string())?;

    let supplied = match root.get("sections") {
        None => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(_) => return Err("`sections` is not an array".to_string()),
    };

    let mut seen = HashSet::new();
    let mut sections = Vec::with_capacity(supplied.len().max(13));

    for item in &supplied {
        let object = item
            .as_object()
            .ok_or_else(|| "section is not a JSON object".to_string())?;
        let Some(section) = read_section(object)? else {
            continue;
        };
        if seen.insert(section.key.clone()) {
            sections.push(section);
        } else {
            debug!("Dropping repeated advice section: {}", section.key);
        }
    }

    for key in expected_keys() {
        if !seen.contains(key) {
            sections.push(AdviceSection::placeholder(key));
        }
    }

    Ok(AdviceResponse { sections })
}

/// Sections without a usable key are skipped; present fields must be strings.
fn read_section(object: &Map<String, Value>) -> Result<Option<AdviceSection>, String> {
    let key = match object.get("key") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(key)) if key.is_empty() => return Ok(None),
        Some(Value::String(key)) => key.clone(),
        Some(_) => return Err("section key is not a string".to_string()),
    };

    let title = match optional_string(object, "title")? {
        Some(title) => title,
        None => title_case(&key),
    };
    let content = match optional_string(object, "content")? {
        Some(content) => content,
        None => AdviceSection::placeholder(&key).content,
    };

    Ok(Some(AdviceSection {
        key,
        title,
        content,
    }))
}

fn optional_string(object: &Map<String, Value>, field: &str) -> Result<Option<String>, String> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(format!("section {} is not a string", field)),
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    CODE_FENCE
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|body| body.as_str())
        .unwrap_or(trimmed)
}

/// `when_to_see_a_doctor` -> `When To See A Doctor`
fn title_case(key: &str) -> String {
    key.replace('_', " ")
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn full_response() -> Value {
        let sections: Vec<_> = expected_keys()
            .map(|key| json!({"key": key, "title": format!("T {}", key), "content": format!("C {}", key)}))
            .collect();
        json!({ "sections": sections })
    }

    #[test]
    fn test_complete_response_is_kept_verbatim() {
        let parsed = parse_advice(&full_response().to_string());

        assert_eq!(parsed.sections.len(), 13);
        for key in expected_keys() {
            let section = parsed.get(key).unwrap();
            assert_eq!(section.title, format!("T {}", key));
            assert_eq!(section.content, format!("C {}", key));
        }
    }

    #[test]
    fn test_single_section_is_padded_with_placeholders() {
        let parsed =
            parse_advice(r#"{"sections":[{"key":"advice","title":"A","content":"Be kind"}]}"#);

        assert_eq!(parsed.sections.len(), 13);
        assert_eq!(parsed.sections[0].content, "Be kind");
        assert_eq!(
            parsed.get("summary").unwrap(),
            &AdviceSection {
                key: "summary".to_string(),
                title: "Summary".to_string(),
                content: "No information available for summary.".to_string(),
            }
        );
    }

    #[test]
    fn test_not_json_yields_error_section() {
        let parsed = parse_advice("not json at all");
        assert_eq!(
            serde_json::to_value(&parsed).unwrap(),
            json!({"sections":[{"key":"error","title":"Error","content":"We couldn't generate full information at this time. Please try again later."}]})
        );
        assert!(parsed.is_unavailable());
    }

    #[rstest]
    #[case::empty("")]
    #[case::whitespace("   \n ")]
    #[case::truncated(r#"{"sections":[{"key":"advice","title":"A""#)]
    #[case::html("<html><body>502 Bad Gateway</body></html>")]
    #[case::array_root(r#"[{"key":"advice"}]"#)]
    #[case::string_root(r#""sections""#)]
    #[case::sections_not_array(r#"{"sections":"advice"}"#)]
    #[case::null_sections(r#"{"sections":null}"#)]
    #[case::section_not_object(r#"{"sections":["advice"]}"#)]
    #[case::numeric_key(r#"{"sections":[{"key":5,"title":"x","content":"y"}]}"#)]
    #[case::numeric_content(r#"{"sections":[{"key":"advice","title":"x","content":7}]}"#)]
    fn test_malformed_input_yields_error_section(#[case] raw: &str) {
        assert_eq!(parse_advice(raw), AdviceResponse::unavailable());
    }

    #[rstest]
    #[case::plain_fence("```\n{\"sections\":[]}\n```")]
    #[case::json_fence("```json\n{\"sections\":[]}\n```")]
    #[case::padded_fence("  ```json\n\n{\"sections\":[]}\n\n```  ")]
    #[case::no_fence("{\"sections\":[]}")]
    fn test_code_fences_are_stripped(#[case] raw: &str) {
        let parsed = parse_advice(raw);
        assert!(!parsed.is_unavailable());
        assert_eq!(parsed.sections.len(), 13);
    }

    #[test]
    fn test_missing_sections_field_gives_all_placeholders() {
        let parsed = parse_advice(r#"{"note":"nothing here"}"#);
        let expected: Vec<_> = expected_keys().map(AdviceSection::placeholder).collect();
        assert_eq!(parsed.sections, expected);
    }

    #[test]
    fn test_first_occurrence_of_repeated_key_wins() {
        let raw = json!({"sections": [
            {"key": "advice", "title": "First", "content": "keep me"},
            {"key": "advice", "title": "Second", "content": "drop me"},
        ]});
        let parsed = parse_advice(&raw.to_string());

        assert_eq!(parsed.sections.len(), 13);
        let advice: Vec<_> = parsed.sections.iter().filter(|s| s.key == "advice").collect();
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].content, "keep me");
    }

    #[test]
    fn test_sections_without_key_are_skipped() {
        let raw = json!({"sections": [
            {"title": "Orphan", "content": "no key"},
            {"key": "", "title": "Blank", "content": "blank key"},
            {"key": null, "title": "Null", "content": "null key"},
        ]});
        let parsed = parse_advice(&raw.to_string());
        let expected: Vec<_> = expected_keys().map(AdviceSection::placeholder).collect();
        assert_eq!(parsed.sections, expected);
    }

    #[test]
    fn test_unexpected_keys_are_preserved() {
        let raw = json!({"sections": [
            {"key": "diet_notes", "title": "Diet", "content": "Drink water"},
        ]});
        let parsed = parse_advice(&raw.to_string());
        assert_eq!(parsed.sections.len(), 14);
        assert_eq!(parsed.get("diet_notes").unwrap().content, "Drink water");
    }

    #[test]
    fn test_missing_title_and_content_are_filled() {
        let parsed = parse_advice(r#"{"sections":[{"key":"habits_to_avoid"}]}"#);
        assert_eq!(
            parsed.get("habits_to_avoid").unwrap(),
            &AdviceSection::placeholder("habits_to_avoid")
        );
    }

    #[test]
    fn test_parse_is_idempotent_on_its_own_output() {
        let once = parse_advice(r#"{"sections":[{"key":"condition","title":"C","content":"Dry skin"}]}"#);
        let twice = parse_advice(&serde_json::to_string(&once).unwrap());
        assert_eq!(once, twice);
    }

    #[rstest]
    #[case("summary", "Summary", "No information available for summary.")]
    #[case(
        "when_to_see_a_doctor",
        "When To See A Doctor",
        "No information available for when to see a doctor."
    )]
    #[case(
        "treatment_options",
        "Treatment Options",
        "No information available for treatment options."
    )]
    fn test_placeholder_text(#[case] key: &str, #[case] title: &str, #[case] content: &str) {
        let section = AdviceSection::placeholder(key);
        assert_eq!(section.title, title);
        assert_eq!(section.content, content);
    }
}
